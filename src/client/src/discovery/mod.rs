pub mod jar_signature;

use scout_common::types::ProcessRecord;

use crate::config_manager::DiscoveryRule;
use jar_signature::JarSignatureStrategy;

/// Classifies a raw discovered record against a known application signature,
/// assigning a display name and a normalized proposed launch command.
pub trait DiscoveryStrategy: Send + Sync {
    /// Pure predicate over the raw command content.
    fn matches(&self, record: &ProcessRecord) -> bool;

    /// If the record matches, sets its name and proposed command and
    /// returns true; otherwise leaves it untouched.
    fn apply(&self, record: &mut ProcessRecord) -> bool;
}

/// Strategies in their configured order; the first match wins. Records
/// nothing matches stay registered, just unclassified.
pub struct DiscoveryRegistry {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl DiscoveryRegistry {
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        DiscoveryRegistry { strategies }
    }

    pub fn from_rules(rules: &[DiscoveryRule]) -> Self {
        Self::new(
            rules
                .iter()
                .map(|rule| {
                    Box::new(JarSignatureStrategy::new(
                        rule.signature.clone(),
                        rule.display_name.clone(),
                    )) as Box<dyn DiscoveryStrategy>
                })
                .collect(),
        )
    }

    pub fn classify(&self, record: &mut ProcessRecord) -> bool {
        self.strategies.iter().any(|strategy| strategy.apply(record))
    }
}
