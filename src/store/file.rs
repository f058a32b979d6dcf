use chrono::NaiveDate;
use nix::fcntl::{flock, FlockArg};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use super::{Backend, InstanceId, InstanceRecord};
use crate::error::Result;
use crate::month::YearMonth;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default, rename = "instance")]
    instances: Vec<StateEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateEntry {
    id: InstanceId,
    year: i32,
    month: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selected: Option<NaiveDate>,
}

impl StateEntry {
    fn new(id: InstanceId, record: &InstanceRecord) -> Self {
        StateEntry {
            id,
            year: record.anchor.year(),
            month: record.anchor.month(),
            selected: record.selected,
        }
    }

    fn into_record(self) -> Result<(InstanceId, InstanceRecord)> {
        let anchor = YearMonth::new(self.year, self.month)
            .map_err(|e| e.with_msg(&format!("stored month of instance {}", self.id)))?;

        Ok((
            self.id,
            InstanceRecord {
                anchor,
                selected: self.selected,
            },
        ))
    }
}

/// Holds an advisory lock on the lock file next to the state file. The lock
/// is released when the file is closed.
struct StateLock {
    _file: fs::File,
}

impl StateLock {
    fn acquire(path: &Path, arg: FlockArg) -> Result<Self> {
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        flock(file.as_raw_fd(), arg)?;
        Ok(StateLock { _file: file })
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("state"));
    name.push(suffix);
    path.with_file_name(name)
}

/// Persists all records in one TOML file.
///
/// Every call reads the file again, so several processes can share one
/// state file. Changes are made under an exclusive lock and written through
/// a temporary sibling that is synced and renamed over the original, so a
/// crash leaves either the old or the new state on disk.
pub struct FileBackend {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileBackend {
    /// Opens the state file at `path`, which need not exist yet. Fails if
    /// an existing file cannot be parsed.
    pub fn open(path: &Path) -> Result<Self> {
        let backend = FileBackend {
            path: path.to_owned(),
            lock_path: sibling(path, ".lock"),
        };

        let records = backend.snapshot()?;
        log::debug!(
            "Found {} instance(s) in '{}'",
            records.len(),
            path.display()
        );

        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self, arg: FlockArg) -> Result<StateLock> {
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        StateLock::acquire(&self.lock_path, arg)
    }

    fn read_records(&self) -> Result<BTreeMap<InstanceId, InstanceRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let records: BTreeMap<InstanceId, InstanceRecord> = toml::from_str::<StateFile>(&content)?
            .instances
            .into_iter()
            .map(StateEntry::into_record)
            .inspect(|res| {
                if let Err(e) = res {
                    log::warn!("Skipping entry in '{}': {}", self.path.display(), e)
                }
            })
            .filter_map(Result::ok)
            .collect();

        Ok(records)
    }

    /// Current contents of the file, read under a shared lock.
    fn snapshot(&self) -> Result<BTreeMap<InstanceId, InstanceRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let _lock = self.lock(FlockArg::LockShared)?;
        self.read_records()
    }

    /// Applies `change` to the current contents of the file while holding
    /// the exclusive lock, and writes the result back if anything changed.
    fn transact<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<InstanceId, InstanceRecord>) -> T,
    {
        let _lock = self.lock(FlockArg::LockExclusive)?;

        let mut records = self.read_records()?;
        let before = records.clone();
        let result = change(&mut records);

        if records != before {
            self.persist(&records)?;
        }

        Ok(result)
    }

    fn persist(&self, records: &BTreeMap<InstanceId, InstanceRecord>) -> Result<()> {
        let state = StateFile {
            instances: records
                .iter()
                .map(|(id, record)| StateEntry::new(*id, record))
                .collect(),
        };
        let content = toml::to_string(&state)?;

        let tmp_path = sibling(&self.path, ".tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

impl Backend for FileBackend {
    fn load(&self, id: InstanceId) -> Result<Option<InstanceRecord>> {
        Ok(self.snapshot()?.get(&id).copied())
    }

    fn store(&self, id: InstanceId, record: &InstanceRecord) -> Result<()> {
        self.transact(|records| {
            records.insert(id, *record);
        })
    }

    fn delete(&self, id: InstanceId) -> Result<()> {
        self.transact(|records| {
            records.remove(&id);
        })
    }

    fn ids(&self) -> Result<Vec<InstanceId>> {
        Ok(self.snapshot()?.keys().copied().collect())
    }

    fn update(
        &self,
        id: InstanceId,
        change: &mut dyn FnMut(Option<InstanceRecord>) -> InstanceRecord,
    ) -> Result<InstanceRecord> {
        self.transact(|records| {
            let record = change(records.get(&id).copied());
            records.insert(id, record);
            record
        })
    }
}
