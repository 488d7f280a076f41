pub mod store;

use serde::{Deserialize, Serialize};

use crate::record::UsageRecord;

pub use store::{HistoryError, HistoryStore, JsonHistoryStore};

/// Every record that has already been announced, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    rows: Vec<UsageRecord>,
}

impl History {
    pub fn new(rows: Vec<UsageRecord>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[UsageRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, record: &UsageRecord) -> bool {
        self.rows.iter().any(|row| row == record)
    }

    /// Appends at the tail. Existing rows are never touched.
    pub fn append(&mut self, record: UsageRecord) {
        self.rows.push(record);
    }
}
