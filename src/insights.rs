//! Derived insight generation.
//!
//! Pure functions turning the current wheel scores or odyssey plans into
//! short human-readable observations. Deterministic and order-sensitive:
//! callers rely on the first insight being the headline one. Nothing here
//! touches the network or the stores; insights are recomputed per render
//! and never persisted.

use std::collections::HashMap;

use crate::types::{
    Domain, Insight, InsightKind, Plan, Priority, Score, DEFAULT_SCORE,
};

/// Score at or below which a focus domain earns a nudge.
const FOCUS_ATTENTION_THRESHOLD: u8 = 5;

/// Minimum spread between highest and lowest score to call out an imbalance.
const GAP_THRESHOLD: u8 = 4;

/// Plan confidence at or below this reads as a concern.
const LOW_CONFIDENCE_THRESHOLD: u8 = 3;

/// Plan energy at or above this reads as a strength.
const HIGH_ENERGY_THRESHOLD: u8 = 8;

/// Resource-gap rule: energetic but under-resourced.
const RESOURCE_GAP_ENERGY: u8 = 7;
const RESOURCE_GAP_RESOURCES: u8 = 4;

/// Maximum number of odyssey insights surfaced at once.
const MAX_ODYSSEY_INSIGHTS: usize = 4;

/// Derive wheel insights from the current domains, scores, and priorities.
///
/// Rules, in emission order:
/// 1. The highest-scoring domain, whenever any domain has a score. Ties
///    keep the first-encountered domain.
/// 2. The lowest-scoring domain, only when its score differs from the
///    highest (all-equal wheels produce a single insight).
/// 3. A gap call-out when `max - min >= 4`.
/// 4. One nudge per focus-marked domain scoring at or below 5. Domains
///    without a score row count as the default score here.
pub fn wheel_insights(
    domains: &[Domain],
    scores: &[Score],
    priorities: &[Priority],
) -> Vec<Insight> {
    let mut insights = Vec::new();

    let score_by_domain: HashMap<&str, &Score> =
        scores.iter().map(|s| (s.domain_id.as_str(), s)).collect();

    // Domains with an actual score row, in wheel order
    let scored: Vec<(&Domain, u8)> = domains
        .iter()
        .filter_map(|d| score_by_domain.get(d.id.as_str()).map(|s| (d, s.score)))
        .collect();

    if let Some(&(highest_domain, highest)) = scored
        .iter()
        .fold(None::<&(&Domain, u8)>, |best, pair| match best {
            Some(b) if b.1 >= pair.1 => Some(b),
            _ => Some(pair),
        })
    {
        insights.push(Insight::new(
            InsightKind::Highest,
            format!(
                "{} is your strongest area right now ({}/10)",
                highest_domain.name, highest
            ),
        ));

        let &(lowest_domain, lowest) = scored
            .iter()
            .fold(None::<&(&Domain, u8)>, |worst, pair| match worst {
                Some(w) if w.1 <= pair.1 => Some(w),
                _ => Some(pair),
            })
            .unwrap_or(&(highest_domain, highest));

        if lowest != highest {
            insights.push(Insight::new(
                InsightKind::Lowest,
                format!(
                    "{} has the most room to grow ({}/10)",
                    lowest_domain.name, lowest
                ),
            ));
        }

        if highest - lowest >= GAP_THRESHOLD {
            insights.push(Insight::new(
                InsightKind::Gap,
                format!(
                    "There is a {}-point spread between {} and {} — worth rebalancing",
                    highest - lowest,
                    highest_domain.name,
                    lowest_domain.name
                ),
            ));
        }
    }

    // Focus nudges, in priority order
    let mut focus: Vec<&Priority> = priorities.iter().filter(|p| p.is_focus).collect();
    focus.sort_by_key(|p| p.rank);
    for priority in focus {
        let Some(domain) = domains.iter().find(|d| d.id == priority.domain_id) else {
            continue;
        };
        let effective = score_by_domain
            .get(priority.domain_id.as_str())
            .map(|s| s.score)
            .unwrap_or(DEFAULT_SCORE);
        if effective <= FOCUS_ATTENTION_THRESHOLD {
            insights.push(Insight::new(
                InsightKind::Focus,
                format!(
                    "{} is a focus area but sits at {}/10 — plan one small action this week",
                    domain.name, effective
                ),
            ));
        }
    }

    insights
}

/// Derive odyssey insights from the current five-year plans.
///
/// `goal_counts` maps plan id to the number of goals already created from
/// that plan; when provided, a leading plan with no goals earns a prompt to
/// start one. Output is capped at four insights, earlier categories winning
/// on truncation.
pub fn odyssey_insights(
    plans: &[Plan],
    goal_counts: Option<&HashMap<String, usize>>,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    // Leading plan by sub-score average, first-encountered wins ties
    let leader = plans.iter().fold(None::<&Plan>, |best, plan| match best {
        Some(b) if b.average() >= plan.average() => Some(b),
        _ => Some(plan),
    });

    if let Some(leader) = leader {
        insights.push(Insight::new(
            InsightKind::Highest,
            format!(
                "\"{}\" scores best overall ({:.1}/10 across energy, confidence, and resources)",
                leader.title,
                leader.average()
            ),
        ));
    }

    for plan in plans {
        if plan.confidence <= LOW_CONFIDENCE_THRESHOLD {
            insights.push(Insight::new(
                InsightKind::Concern,
                format!(
                    "Confidence in \"{}\" is low ({}/10) — what would make it feel more real?",
                    plan.title, plan.confidence
                ),
            ));
        }
    }

    for plan in plans {
        if plan.energy >= HIGH_ENERGY_THRESHOLD {
            insights.push(Insight::new(
                InsightKind::Strength,
                format!(
                    "\"{}\" clearly energizes you ({}/10)",
                    plan.title, plan.energy
                ),
            ));
        }
    }

    for plan in plans {
        if plan.energy >= RESOURCE_GAP_ENERGY && plan.resources <= RESOURCE_GAP_RESOURCES {
            insights.push(Insight::new(
                InsightKind::Suggestion,
                format!(
                    "\"{}\" excites you but is under-resourced ({}/10) — prototype it small first",
                    plan.title, plan.resources
                ),
            ));
        }
    }

    if let (Some(leader), Some(counts)) = (leader, goal_counts) {
        if counts.get(&leader.id).copied().unwrap_or(0) == 0 {
            insights.push(Insight::new(
                InsightKind::Suggestion,
                format!(
                    "\"{}\" has no goals yet — turn its first milestone into one",
                    leader.title
                ),
            ));
        }
    }

    insights.truncate(MAX_ODYSSEY_INSIGHTS);
    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(id: &str, name: &str, pos: u32) -> Domain {
        Domain {
            id: id.to_string(),
            name: name.to_string(),
            icon: String::new(),
            order_position: pos,
        }
    }

    fn score(domain_id: &str, value: u8) -> Score {
        Score {
            id: format!("s-{domain_id}"),
            domain_id: domain_id.to_string(),
            score: value,
            notes: None,
        }
    }

    fn plan(id: &str, title: &str, energy: u8, confidence: u8, resources: u8) -> Plan {
        Plan {
            id: id.to_string(),
            title: title.to_string(),
            energy,
            confidence,
            resources,
            milestones: vec![],
        }
    }

    // =========================================================================
    // Wheel insights
    // =========================================================================

    #[test]
    fn test_wheel_insights_empty_when_no_scores() {
        let domains = vec![domain("a", "Health", 1)];
        assert!(wheel_insights(&domains, &[], &[]).is_empty());
    }

    #[test]
    fn test_wheel_tie_produces_single_highest() {
        // A and B tied highest at 9, C lowest at 2
        let domains = vec![
            domain("a", "Health", 1),
            domain("b", "Finance", 2),
            domain("c", "Play", 3),
        ];
        let scores = vec![score("a", 9), score("b", 9), score("c", 2)];

        let insights = wheel_insights(&domains, &scores, &[]);

        let highest: Vec<_> = insights
            .iter()
            .filter(|i| i.kind == InsightKind::Highest)
            .collect();
        assert_eq!(highest.len(), 1);
        assert!(highest[0].text.contains("Health"), "first-encountered wins the tie");

        let lowest: Vec<_> = insights
            .iter()
            .filter(|i| i.kind == InsightKind::Lowest)
            .collect();
        assert_eq!(lowest.len(), 1);
        assert!(lowest[0].text.contains("Play"));

        // gap = 7 >= 4
        assert!(insights.iter().any(|i| i.kind == InsightKind::Gap));
    }

    #[test]
    fn test_wheel_all_equal_scores_yield_only_highest() {
        let domains = vec![domain("a", "Health", 1), domain("b", "Finance", 2)];
        let scores = vec![score("a", 7), score("b", 7)];

        let insights = wheel_insights(&domains, &scores, &[]);
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].kind, InsightKind::Highest);
    }

    #[test]
    fn test_wheel_no_gap_below_threshold() {
        let domains = vec![domain("a", "Health", 1), domain("b", "Finance", 2)];
        let scores = vec![score("a", 8), score("b", 5)];

        let insights = wheel_insights(&domains, &scores, &[]);
        assert!(!insights.iter().any(|i| i.kind == InsightKind::Gap));
    }

    #[test]
    fn test_wheel_focus_nudges_per_low_focus_domain() {
        let domains = vec![
            domain("a", "Health", 1),
            domain("b", "Finance", 2),
            domain("c", "Play", 3),
        ];
        let scores = vec![score("a", 3), score("b", 4), score("c", 9)];
        let priorities = vec![
            Priority { domain_id: "a".to_string(), rank: 1, is_focus: true },
            Priority { domain_id: "b".to_string(), rank: 2, is_focus: true },
            Priority { domain_id: "c".to_string(), rank: 3, is_focus: true },
        ];

        let insights = wheel_insights(&domains, &scores, &priorities);
        let focus: Vec<_> = insights
            .iter()
            .filter(|i| i.kind == InsightKind::Focus)
            .collect();
        // a and b are focus with score <= 5; c is focus but scores 9
        assert_eq!(focus.len(), 2);
        assert!(focus[0].text.contains("Health"));
        assert!(focus[1].text.contains("Finance"));
    }

    #[test]
    fn test_wheel_unscored_focus_domain_uses_default() {
        let domains = vec![domain("a", "Health", 1), domain("b", "Finance", 2)];
        let scores = vec![score("b", 8)];
        let priorities = vec![Priority {
            domain_id: "a".to_string(),
            rank: 1,
            is_focus: true,
        }];

        let insights = wheel_insights(&domains, &scores, &priorities);
        // default 5 <= 5 triggers the nudge
        assert!(insights
            .iter()
            .any(|i| i.kind == InsightKind::Focus && i.text.contains("5/10")));
    }

    // =========================================================================
    // Odyssey insights
    // =========================================================================

    #[test]
    fn test_odyssey_empty_plans() {
        assert!(odyssey_insights(&[], None).is_empty());
    }

    #[test]
    fn test_odyssey_leader_first_and_tie_keeps_first() {
        let plans = vec![
            plan("p1", "Stay the course", 6, 6, 6),
            plan("p2", "Move abroad", 6, 6, 6),
        ];
        let insights = odyssey_insights(&plans, None);
        assert_eq!(insights[0].kind, InsightKind::Highest);
        assert!(insights[0].text.contains("Stay the course"));
    }

    #[test]
    fn test_odyssey_rule_thresholds() {
        let plans = vec![plan("p1", "Startup", 8, 3, 4)];
        let insights = odyssey_insights(&plans, None);

        // leader + low confidence + high energy + resource gap
        assert_eq!(insights.len(), 4);
        assert_eq!(insights[0].kind, InsightKind::Highest);
        assert_eq!(insights[1].kind, InsightKind::Concern);
        assert_eq!(insights[2].kind, InsightKind::Strength);
        assert_eq!(insights[3].kind, InsightKind::Suggestion);
    }

    #[test]
    fn test_odyssey_output_capped_at_four() {
        // Every plan matches multiple rules; more than 4 candidates exist
        let plans = vec![
            plan("p1", "Startup", 9, 2, 3),
            plan("p2", "Sabbatical", 8, 3, 4),
            plan("p3", "Teach", 8, 1, 2),
        ];
        let insights = odyssey_insights(&plans, None);
        assert_eq!(insights.len(), 4);
        // Earlier categories win truncation: leader then the three concerns
        assert_eq!(insights[0].kind, InsightKind::Highest);
        assert!(insights[1..].iter().all(|i| i.kind == InsightKind::Concern));
    }

    #[test]
    fn test_odyssey_goal_prompt_for_leader_without_goals() {
        let plans = vec![plan("p1", "Startup", 6, 6, 6)];
        let counts = HashMap::from([("p1".to_string(), 0)]);
        let insights = odyssey_insights(&plans, Some(&counts));
        assert!(insights
            .iter()
            .any(|i| i.kind == InsightKind::Suggestion && i.text.contains("no goals yet")));

        let counts = HashMap::from([("p1".to_string(), 2)]);
        let insights = odyssey_insights(&plans, Some(&counts));
        assert!(!insights.iter().any(|i| i.text.contains("no goals yet")));
    }
}
