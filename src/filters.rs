//! Filter <-> URL query serialization.
//!
//! The dashboard filter set lives in the page URL so filtered views are
//! shareable and survive a reload. Parsing is forgiving: absent or
//! unparseable parameters fall back to the defaults rather than erroring,
//! so a hand-edited or stale URL still renders a dashboard.

use url::form_urlencoded;

use crate::types::DashboardFilters;

const PARAM_YEAR: &str = "year";
const PARAM_MONTH: &str = "month";
const PARAM_DOMAIN: &str = "domain";
const PARAM_GOAL: &str = "goal";

/// Parse a filter set from a raw query string (no leading `?`).
///
/// Unknown parameters are ignored; a month outside 1..=12 falls back to
/// the current month. Domain and goal ids are opaque and pass through
/// unvalidated (a dangling id just yields an empty feed).
pub fn filters_from_query(query: &str) -> DashboardFilters {
    let mut filters = DashboardFilters::default();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            PARAM_YEAR => {
                if let Ok(year) = value.parse::<i32>() {
                    filters.year = year;
                }
            }
            PARAM_MONTH => match value.parse::<u32>() {
                Ok(month) if (1..=12).contains(&month) => filters.month = month,
                _ => log::debug!("ignoring out-of-range month parameter: {value}"),
            },
            PARAM_DOMAIN if !value.is_empty() => {
                filters.domain_id = Some(value.into_owned());
            }
            PARAM_GOAL if !value.is_empty() => {
                filters.goal_id = Some(value.into_owned());
            }
            _ => {}
        }
    }
    filters
}

/// Serialize a filter set to a query string (no leading `?`).
///
/// Year and month are always present; domain and goal only when set, so
/// default views produce short stable URLs.
pub fn filters_to_query(filters: &DashboardFilters) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.append_pair(PARAM_YEAR, &filters.year.to_string());
    serializer.append_pair(PARAM_MONTH, &filters.month.to_string());
    if let Some(ref domain_id) = filters.domain_id {
        serializer.append_pair(PARAM_DOMAIN, domain_id);
    }
    if let Some(ref goal_id) = filters.goal_id {
        serializer.append_pair(PARAM_GOAL, goal_id);
    }
    serializer.finish()
}
