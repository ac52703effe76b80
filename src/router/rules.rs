use serde::{Deserialize, Serialize};

/// Predicate over a task's type tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RoutePredicate {
    /// Matches when the task type contains the keyword (case-insensitive)
    Contains(String),
    /// Matches the whole task type (case-insensitive)
    Equals(String),
}

impl RoutePredicate {
    pub fn matches(&self, task_type: &str) -> bool {
        let task_type = task_type.to_lowercase();
        match self {
            RoutePredicate::Contains(keyword) => task_type.contains(&keyword.to_lowercase()),
            RoutePredicate::Equals(tag) => task_type == tag.to_lowercase(),
        }
    }
}

/// One entry in the route table: predicate to target capability tag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub predicate: RoutePredicate,
    pub capability: String,
}

impl RoutingRule {
    /// Rule matching any task type containing `keyword`
    pub fn contains(keyword: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            predicate: RoutePredicate::Contains(keyword.into()),
            capability: capability.into(),
        }
    }

    /// Rule matching the exact task type
    pub fn equals(task_type: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            predicate: RoutePredicate::Equals(task_type.into()),
            capability: capability.into(),
        }
    }
}

/// Ordered, deterministic routing rule table
///
/// Rules are evaluated in declaration order; the first matching rule wins.
/// No rule matching is not an error here — the router decides what a miss
/// means.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RoutingRule>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule; later rules only apply when earlier ones miss
    pub fn push(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
    }

    /// Resolves a task type to a capability tag, first match wins
    pub fn resolve(&self, task_type: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(task_type))
            .map(|rule| rule.capability.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_predicate_matches_substring() {
        let rule = RoutingRule::contains("data", "data");

        assert!(rule.predicate.matches("data_validation"));
        assert!(rule.predicate.matches("big_data_import"));
        assert!(!rule.predicate.matches("text_generation"));
    }

    #[test]
    fn predicates_are_case_insensitive() {
        assert!(RoutePredicate::Contains("Data".to_string()).matches("DATA_validation"));
        assert!(RoutePredicate::Equals("Analysis".to_string()).matches("analysis"));
    }

    #[test]
    fn equals_predicate_requires_full_match() {
        let predicate = RoutePredicate::Equals("analysis".to_string());

        assert!(predicate.matches("analysis"));
        assert!(!predicate.matches("analysis_report"));
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut table = RouteTable::new();
        table.push(RoutingRule::contains("data", "first"));
        table.push(RoutingRule::contains("data", "second"));
        table.push(RoutingRule::contains("validation", "third"));

        assert_eq!(table.resolve("data_validation"), Some("first"));
        assert_eq!(table.resolve("validation_report"), Some("third"));
    }

    #[test]
    fn no_match_resolves_to_none() {
        let mut table = RouteTable::new();
        table.push(RoutingRule::contains("data", "data"));

        assert_eq!(table.resolve("image_render"), None);
        assert_eq!(RouteTable::new().resolve("anything"), None);
    }
}
