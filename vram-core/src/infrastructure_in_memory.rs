use crate::error::StoreError;
use crate::infrastructure::{CollaboratorRecord, RegistryStore};

/// Keeps the last snapshot in process memory. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    records: Vec<CollaboratorRecord>,
    saves: usize,
}

impl InMemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot, as if it had been saved earlier.
    pub fn with_records(records: Vec<CollaboratorRecord>) -> Self {
        Self { records, saves: 0 }
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl RegistryStore for InMemoryRegistryStore {
    fn load(&self) -> Result<Vec<CollaboratorRecord>, StoreError> {
        Ok(self.records.clone())
    }

    fn save(&mut self, records: &[CollaboratorRecord]) -> Result<(), StoreError> {
        self.records = records.to_vec();
        self.saves += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
