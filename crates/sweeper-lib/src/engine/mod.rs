//! Declarative filter matching
//!
//! The engine answers one question for a filter, an item and a direction:
//! does the item match the configured include/exclude rules? It handles:
//! - The ignore-label override, which short-circuits either direction
//! - Dispatch of each resource kind to its rule section
//! - OR-combination of the name, owner and label criteria, keeping track of
//!   whether any criterion was configured at all

mod rules;

pub use rules::{
    AccessBlock, Direction, FilterConfig, FilterConfigBuilder, FilterDocument, InstanceBlock,
    Property, ProviderBlocks, RuleKey, RuleSection,
};

use crate::models::{CloudItem, Tags};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Engine-wide switches
#[derive(Debug, Clone, Default)]
pub struct MatchSettings {
    /// Tag key that lets an item opt out of normal filtering
    pub ignore_label: Option<String>,
    /// Evaluate rules even on items carrying the ignore label
    pub ignore_label_disabled: bool,
    /// Compare owners by equality instead of prefix
    pub exact_owner_match: bool,
}

/// Result of evaluating one item against the rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchOutcome {
    /// The ignore label fired; no criteria were evaluated
    Overridden,
    /// At least one configured criterion matched
    Matched,
    /// Criteria were configured but none matched
    Unmatched,
    /// No criterion is configured for the item's kind and provider
    NotApplicable,
}

impl MatchOutcome {
    /// Raw match answer for the given direction
    ///
    /// An override forces "no match" under an inclusive filter and "match"
    /// under an exclusive one. Unconfigured items never match.
    pub fn is_match(self, direction: Direction) -> bool {
        match self {
            MatchOutcome::Overridden => !direction.is_inclusive(),
            MatchOutcome::Matched => true,
            MatchOutcome::Unmatched | MatchOutcome::NotApplicable => false,
        }
    }

    /// Whether a filter stage keeps the item
    ///
    /// Inclusive stages keep matching items, exclusive stages keep items that
    /// did not match. Overridden items are dropped by inclusive stages and
    /// kept by exclusive ones.
    pub fn is_included(self, direction: Direction) -> bool {
        match (self, direction) {
            (MatchOutcome::Overridden, Direction::Inclusive) => false,
            (MatchOutcome::Overridden, Direction::Exclusive) => true,
            (outcome, Direction::Inclusive) => outcome.is_match(direction),
            (outcome, Direction::Exclusive) => !outcome.is_match(direction),
        }
    }
}

impl fmt::Display for MatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOutcome::Overridden => write!(f, "overridden"),
            MatchOutcome::Matched => write!(f, "matched"),
            MatchOutcome::Unmatched => write!(f, "unmatched"),
            MatchOutcome::NotApplicable => write!(f, "not-applicable"),
        }
    }
}

/// Matches items against a shared, read-only rule table
#[derive(Debug, Clone, Default)]
pub struct FilterEngine {
    config: Option<Arc<FilterConfig>>,
    settings: MatchSettings,
}

impl FilterEngine {
    pub fn new(config: Option<Arc<FilterConfig>>, settings: MatchSettings) -> Self {
        Self { config, settings }
    }

    pub fn settings(&self) -> &MatchSettings {
        &self.settings
    }

    /// Evaluate an item and report how the decision was reached
    pub fn evaluate(&self, filter: &str, item: &CloudItem, direction: Direction) -> MatchOutcome {
        if self.ignore_label_fires(filter, item.name(), item.tags()) {
            return MatchOutcome::Overridden;
        }

        let Some(config) = self.config.as_deref() else {
            debug!(filter, item = %item.name(), "No filter configuration, item does not match");
            return MatchOutcome::NotApplicable;
        };

        match item {
            CloudItem::Database(database) => {
                if self.ignore_label_fires(filter, &database.name, &database.tags) {
                    return MatchOutcome::Overridden;
                }
            }
            CloudItem::Cluster(cluster) => {
                if self.ignore_label_fires(filter, &cluster.name, &cluster.tags) {
                    return MatchOutcome::Overridden;
                }
            }
            CloudItem::Access(_)
            | CloudItem::Instance(_)
            | CloudItem::Stack(_)
            | CloudItem::Disk(_)
            | CloudItem::Alert(_) => {}
        }

        self.combine_criteria(filter, config, item, direction)
    }

    /// Does the item match the rules of this direction?
    pub fn is_filter_match(&self, filter: &str, item: &CloudItem, direction: Direction) -> bool {
        self.evaluate(filter, item, direction).is_match(direction)
    }

    /// Does a stage applying this direction keep the item?
    pub fn is_included(&self, filter: &str, item: &CloudItem, direction: Direction) -> bool {
        let outcome = self.evaluate(filter, item, direction);
        let included = outcome.is_included(direction);
        if included {
            debug!(filter, item = %item.name(), %outcome, "Item kept by filter config");
        } else {
            debug!(filter, item = %item.name(), %outcome, "Item dropped by filter config");
        }
        included
    }

    fn ignore_label_fires(&self, filter: &str, name: &str, tags: &Tags) -> bool {
        let Some(label) = self.settings.ignore_label.as_deref() else {
            return false;
        };
        if !tags.contains_key(label) {
            return false;
        }
        debug!(filter, item = name, label, "Found ignore label on item");
        if self.settings.ignore_label_disabled {
            debug!(filter, item = name, "Ignore label usage is disabled, applying filter");
            return false;
        }
        true
    }

    fn combine_criteria(
        &self,
        filter: &str,
        config: &FilterConfig,
        item: &CloudItem,
        direction: Direction,
    ) -> MatchOutcome {
        let kind = item.kind();
        let provider = item.provider();
        let mut applied = false;
        let mut matched = false;

        if let Some(names) = config.resolve(direction, kind, provider, Property::Name) {
            debug!(filter, item = %item.name(), ?names, "Filtering item by names");
            applied = true;
            matched |= starts_with_any(item.name(), names);
        }

        if let Some(owners) = config.resolve(direction, kind, provider, Property::Owner) {
            let exact = self.settings.exact_owner_match;
            debug!(filter, item = %item.name(), exact, ?owners, "Filtering item by owners");
            applied = true;
            matched |= if exact {
                equals_any(item.owner(), owners)
            } else {
                starts_with_any(item.owner(), owners)
            };
        }

        if let Some(labels) = config.resolve(direction, kind, provider, Property::Label) {
            debug!(filter, item = %item.name(), ?labels, "Filtering item by labels");
            applied = true;
            matched |= any_tag_key_starts_with(item.tags(), labels);
        }

        let outcome = match (applied, matched) {
            (false, _) => MatchOutcome::NotApplicable,
            (true, true) => MatchOutcome::Matched,
            (true, false) => MatchOutcome::Unmatched,
        };
        debug!(filter, item = %item.name(), %outcome, "Evaluated filter criteria");
        outcome
    }
}

fn starts_with_any(value: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| value.starts_with(p.as_str()))
}

fn equals_any(value: &str, candidates: &[String]) -> bool {
    candidates.iter().any(|c| c == value)
}

fn any_tag_key_starts_with(tags: &Tags, prefixes: &[String]) -> bool {
    tags.keys().any(|key| starts_with_any(key, prefixes))
}
