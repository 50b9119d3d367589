//! Activity-feed pagination contract.
//!
//! A feed page always travels as items + cursor + has-more together: the
//! three are replaced or appended in one store operation so consumers never
//! observe a fresh list with a stale cursor. The cursor is opaque to the
//! client; only the backend interprets it.

use serde::{Deserialize, Serialize};

use crate::types::ActivityFeedItem;

/// One fetched page of the activity feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<ActivityFeedItem>,
    /// Opaque token for the next page; `None` when exhausted.
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// What the feed footer should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedControl {
    /// Empty feed: show the empty-state message, no footer control at all.
    Empty,
    /// Offer the "load more" control.
    LoadMore,
    /// A page fetch is in flight: control disabled, loading label.
    Loading,
    /// Non-empty feed with nothing left: show the end marker.
    EndOfFeed,
}

/// Resolve the footer control from the current feed state.
///
/// An empty feed suppresses both the load-more control and the end marker
/// regardless of `has_more` — the empty-state message stands alone.
pub fn feed_control(item_count: usize, has_more: bool, is_loading_more: bool) -> FeedControl {
    if item_count == 0 {
        FeedControl::Empty
    } else if is_loading_more {
        FeedControl::Loading
    } else if has_more {
        FeedControl::LoadMore
    } else {
        FeedControl::EndOfFeed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_feed_suppresses_controls_even_with_has_more() {
        assert_eq!(feed_control(0, true, false), FeedControl::Empty);
        assert_eq!(feed_control(0, false, false), FeedControl::Empty);
        assert_eq!(feed_control(0, true, true), FeedControl::Empty);
    }

    #[test]
    fn test_loading_takes_precedence_over_load_more() {
        assert_eq!(feed_control(5, true, true), FeedControl::Loading);
    }

    #[test]
    fn test_load_more_when_more_pages_exist() {
        assert_eq!(feed_control(5, true, false), FeedControl::LoadMore);
    }

    #[test]
    fn test_end_marker_when_exhausted() {
        assert_eq!(feed_control(5, false, false), FeedControl::EndOfFeed);
    }
}
