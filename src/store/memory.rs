use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{lock, Backend, InstanceId, InstanceRecord};
use crate::error::Result;

/// Keeps records for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<BTreeMap<InstanceId, InstanceRecord>>,
}

impl Backend for MemoryBackend {
    fn load(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
        Ok(lock(&self.records).get(&id).copied())
    }

    fn store(&self, id: InstanceId, record: &InstanceRecord) -> Result<()> {
        lock(&self.records).insert(id, *record);
        Ok(())
    }

    fn delete(&self, id: InstanceId) -> Result<()> {
        lock(&self.records).remove(&id);
        Ok(())
    }

    fn ids(&self) -> Result<Vec<InstanceId>> {
        Ok(lock(&self.records).keys().copied().collect())
    }

    fn update(
        &self,
        id: InstanceId,
        change: &mut dyn FnMut(Option<InstanceRecord>) -> InstanceRecord,
    ) -> Result<InstanceRecord> {
        let mut records = lock(&self.records);
        let record = change(records.get(&id).copied());
        records.insert(id, record);
        Ok(record)
    }
}
