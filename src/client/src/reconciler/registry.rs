use std::collections::HashMap;

use scout_common::types::{Agent, ProcessRecord};

/// Canonical storage: one record per logical id, plus the agent context all
/// discoveries are attributed to. Always accessed under the reconciler's
/// lock; never pokes at the OS itself.
#[derive(Default)]
pub struct ProcessRegistry {
    pub records: HashMap<String, ProcessRecord>,
    pub agent: Option<Agent>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: ProcessRecord) {
        self.records.insert(record.id.clone(), record);
    }

    pub fn placeholder_record_ids(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|record| record.has_placeholder_id())
            .map(|record| record.id.clone())
            .collect()
    }

    /// Replaces a placeholder key with a backend-issued one, keeping the
    /// record otherwise untouched.
    pub fn rekey(&mut self, old_id: &str, new_id: String) {
        if let Some(mut record) = self.records.remove(old_id) {
            record.id.clone_from(&new_id);
            self.records.insert(new_id, record);
        }
    }
}
