//! Per-bucket subscription rules and the matching engine

use serde::{Deserialize, Serialize};

use crate::error::{ProxyError, Result};
use crate::event::EventName;

/// Identifies one delivery queue: (service, id, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId {
    /// Delivery service kind (e.g. "sqs", "sns")
    pub service: String,
    /// Target id within the service
    pub id: String,
    /// Target name within the service
    pub name: String,
}

impl TargetId {
    /// Creates a target identifier.
    pub fn new(service: &str, id: &str, name: &str) -> Self {
        Self {
            service: service.to_string(),
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// The queue key the target's events are appended under.
    pub fn queue_key(&self) -> String {
        format!("{}:{}:{}", self.service, self.id, self.name)
    }
}

/// One subscription entry: event-type filters, optional key prefix/suffix
/// filters, and the targets interested in matching events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRule {
    /// Subscribed event names; wildcard categories allowed
    pub events: Vec<EventName>,
    /// Object-key prefix filter; empty or absent matches every key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Object-key suffix filter; empty or absent matches every key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    /// Delivery targets referenced by this rule
    pub targets: Vec<TargetId>,
}

impl NotificationRule {
    /// Creates a rule with no key filters.
    pub fn new(events: Vec<EventName>, targets: Vec<TargetId>) -> Self {
        Self {
            events,
            prefix: None,
            suffix: None,
            targets,
        }
    }

    /// Sets the key prefix filter.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Sets the key suffix filter.
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string());
        self
    }

    /// True if a subscription in this rule covers the concrete event.
    pub fn matches_event(&self, event: EventName) -> bool {
        self.events.iter().any(|name| name.subsumes(event))
    }

    /// True if the key passes both filters. An unset or empty filter
    /// passes every key.
    pub fn matches_key(&self, key: &str) -> bool {
        if let Some(prefix) = self.prefix.as_deref() {
            if !prefix.is_empty() && !key.starts_with(prefix) {
                return false;
            }
        }
        if let Some(suffix) = self.suffix.as_deref() {
            if !suffix.is_empty() && !key.ends_with(suffix) {
                return false;
            }
        }
        true
    }
}

/// The subscription document a bucket owns: an ordered set of rules.
/// A bucket has at most one document; the last successful write wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketNotificationConfig {
    /// Subscription rules in declaration order
    #[serde(default)]
    pub rules: Vec<NotificationRule>,
}

impl BucketNotificationConfig {
    /// An empty configuration (zero subscribers).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds a rule.
    pub fn with_rule(mut self, rule: NotificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rejects documents a PUT must not store: no rules, or a rule with
    /// no events or no targets.
    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(ProxyError::MalformedDocument {
                reason: "document has no rules".to_string(),
            });
        }
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.events.is_empty() {
                return Err(ProxyError::MalformedDocument {
                    reason: format!("rule {} subscribes to no events", i),
                });
            }
            if rule.targets.is_empty() {
                return Err(ProxyError::MalformedDocument {
                    reason: format!("rule {} has no targets", i),
                });
            }
        }
        Ok(())
    }

    /// Returns the deduplicated set of targets interested in `event` for
    /// object `key`. A target appears at most once even when several
    /// matching rules reference it; first-match order is preserved.
    pub fn targets_for(&self, event: EventName, key: &str) -> Vec<TargetId> {
        let mut matched: Vec<TargetId> = Vec::new();
        for rule in &self.rules {
            if !rule.matches_event(event) || !rule.matches_key(key) {
                continue;
            }
            for target in &rule.targets {
                if !matched.contains(target) {
                    matched.push(target.clone());
                }
            }
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sqs_t1() -> TargetId {
        TargetId::new("sqs", "t1", "q1")
    }

    #[test]
    fn test_queue_key_joins_with_colons() {
        assert_eq!(sqs_t1().queue_key(), "sqs:t1:q1");
    }

    #[test]
    fn test_rule_without_filters_matches_any_key() {
        let rule = NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()]);
        assert!(rule.matches_key(""));
        assert!(rule.matches_key("any/key/at.all"));
    }

    #[test]
    fn test_rule_empty_string_filters_match_any_key() {
        let rule = NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()])
            .with_prefix("")
            .with_suffix("");
        assert!(rule.matches_key("img/a.jpg"));
    }

    #[test]
    fn test_rule_suffix_filter_rejects_other_extensions() {
        let rule = NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()])
            .with_suffix(".jpg");
        assert!(rule.matches_key("img/a.jpg"));
        assert!(!rule.matches_key("img/a.png"));
    }

    #[test]
    fn test_rule_prefix_filter_rejects_other_prefixes() {
        let rule = NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()])
            .with_prefix("img/");
        assert!(rule.matches_key("img/a.jpg"));
        assert!(!rule.matches_key("docs/a.jpg"));
    }

    #[test]
    fn test_wildcard_subscription_matches_concrete_event() {
        let rule = NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()]);
        assert!(rule.matches_event(EventName::ObjectCreatedPut));
        assert!(rule.matches_event(EventName::ObjectCreatedCopy));
        assert!(!rule.matches_event(EventName::ObjectRemovedDelete));
    }

    #[test]
    fn test_targets_deduplicated_across_rules() {
        let config = BucketNotificationConfig::empty()
            .with_rule(NotificationRule::new(
                vec![EventName::ObjectCreatedAll],
                vec![sqs_t1()],
            ))
            .with_rule(NotificationRule::new(
                vec![EventName::ObjectCreatedPut],
                vec![sqs_t1(), TargetId::new("sns", "t2", "topic")],
            ));

        let targets = config.targets_for(EventName::ObjectCreatedPut, "k");
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0], sqs_t1());
        assert_eq!(targets[1], TargetId::new("sns", "t2", "topic"));
    }

    #[test]
    fn test_no_matching_rule_yields_no_targets() {
        let config = BucketNotificationConfig::empty().with_rule(
            NotificationRule::new(vec![EventName::ObjectRemovedAll], vec![sqs_t1()]),
        );
        assert!(config
            .targets_for(EventName::ObjectCreatedPut, "k")
            .is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_document() {
        let config = BucketNotificationConfig::empty();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_rule_without_events() {
        let config = BucketNotificationConfig::empty()
            .with_rule(NotificationRule::new(vec![], vec![sqs_t1()]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_rule_without_targets() {
        let config = BucketNotificationConfig::empty().with_rule(NotificationRule::new(
            vec![EventName::ObjectCreatedAll],
            vec![],
        ));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed_document() {
        let config = BucketNotificationConfig::empty().with_rule(
            NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()])
                .with_suffix(".jpg"),
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_document_json_round_trip() {
        let config = BucketNotificationConfig::empty().with_rule(
            NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()])
                .with_prefix("img/")
                .with_suffix(".jpg"),
        );
        let json = serde_json::to_string(&config).unwrap();
        let back: BucketNotificationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rules.len(), 1);
        assert_eq!(back.rules[0].prefix.as_deref(), Some("img/"));
        assert_eq!(back.rules[0].targets, vec![sqs_t1()]);
    }

    proptest! {
        #[test]
        fn prop_unfiltered_rule_matches_every_key(key in "[a-zA-Z0-9/._-]{0,64}") {
            let rule =
                NotificationRule::new(vec![EventName::ObjectCreatedAll], vec![sqs_t1()]);
            prop_assert!(rule.matches_key(&key));
        }

        #[test]
        fn prop_prefix_filter_agrees_with_starts_with(
            prefix in "[a-z/]{1,8}",
            key in "[a-z/]{0,32}",
        ) {
            let rule = NotificationRule::new(
                vec![EventName::ObjectCreatedAll],
                vec![sqs_t1()],
            )
            .with_prefix(&prefix);
            prop_assert_eq!(rule.matches_key(&key), key.starts_with(&prefix));
        }

        #[test]
        fn prop_suffix_filter_agrees_with_ends_with(
            suffix in "[a-z.]{1,8}",
            key in "[a-z.]{0,32}",
        ) {
            let rule = NotificationRule::new(
                vec![EventName::ObjectCreatedAll],
                vec![sqs_t1()],
            )
            .with_suffix(&suffix);
            prop_assert_eq!(rule.matches_key(&key), key.ends_with(&suffix));
        }
    }
}
