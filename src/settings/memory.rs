use std::collections::HashMap;
use std::sync::Mutex;

use super::{SettingsRecord, SettingsStore, StoreError};

/// Settings kept in process memory. Each instance owns its own map, so
/// tests and ephemeral runs never share state.
#[derive(Debug, Default)]
pub struct InMemorySettingsStore {
    rows: Mutex<HashMap<String, SettingsRecord>>,
}

impl SettingsStore for InMemorySettingsStore {
    fn find(&self, user_email: &str) -> Result<Option<SettingsRecord>, StoreError> {
        let rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.get(user_email).cloned())
    }

    fn upsert(&self, record: &SettingsRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        rows.insert(record.user_email.clone(), record.clone());
        Ok(())
    }

    fn delete(&self, user_email: &str) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(rows.remove(user_email).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_instances_are_isolated() {
        let a = InMemorySettingsStore::default();
        let b = InMemorySettingsStore::default();
        a.upsert(&SettingsRecord::empty("alice@example.com", Utc::now())).unwrap();
        assert!(a.find("alice@example.com").unwrap().is_some());
        assert!(b.find("alice@example.com").unwrap().is_none());
    }
}
