//! Deterministic keyword router: the fast path of the planner.
//!
//! Pure function over a rule set and a filename. Rules are evaluated in
//! priority-descending order (stable sort, so equal priorities keep their
//! input order) and the first rule with any case-insensitive substring match
//! wins.

use crate::model::RoutingRule;

/// Confidence assigned to any keyword match. Keyword rules are curated by a
/// human, so matches are treated as reliable rather than probabilistic.
pub const KEYWORD_MATCH_CONFIDENCE: f64 = 0.9;

/// Outcome of routing one filename through the keyword rules.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordRoute {
    pub matched: bool,
    pub target_path: Option<String>,
    pub confidence: f64,
    pub matched_rule_id: Option<String>,
}

impl KeywordRoute {
    fn miss() -> Self {
        KeywordRoute {
            matched: false,
            target_path: None,
            confidence: 0.0,
            matched_rule_id: None,
        }
    }
}

/// Route a filename through the rule set. No I/O, fully deterministic.
pub fn route_by_keywords(file_name: &str, rules: &[RoutingRule]) -> KeywordRoute {
    let mut ordered: Vec<&RoutingRule> = rules.iter().collect();
    ordered.sort_by_key(|rule| std::cmp::Reverse(rule.priority));

    let file_name_lower = file_name.to_lowercase();

    for rule in ordered {
        let hit = rule
            .keywords
            .iter()
            .any(|keyword| file_name_lower.contains(&keyword.to_lowercase()));
        if hit && !rule.target_path.is_empty() {
            return KeywordRoute {
                matched: true,
                target_path: Some(rule.target_path.clone()),
                confidence: KEYWORD_MATCH_CONFIDENCE,
                matched_rule_id: Some(rule.id.clone()),
            };
        }
    }

    KeywordRoute::miss()
}
