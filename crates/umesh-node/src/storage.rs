//! Key-value persistence for the mesh configuration record.
//!
//! The mesh core checkpoints a small [`ConfigRecord`] (network id and local
//! SID) after every SID assignment. A record that fails its magic/version
//! check is treated as absent and replaced by the erased state, the way a
//! freshly erased flash sector reads back as all ones.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use umesh_core::constants::NETWORK_ID_LEN;
use umesh_core::types::{NetworkId, Sid};

/// Key the configuration record is stored under.
pub const CONFIG_KEY: &str = "umesh";

/// Identifies a umesh configuration record ("umsh").
pub const CONFIG_MAGIC: u32 = 0x756d_7368;

/// Bumped whenever the record layout changes.
pub const CONFIG_VERSION: u8 = 1;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("configuration record corrupt: {0}")]
    ConfigCorrupt(String),

    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("failed to determine storage directory: {0}")]
    Directory(String),
}

/// Byte-oriented key-value store.
pub trait KvStore {
    /// Value stored under `key`, or `None` if it was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` under `key`. With `sync`, the value is durable on return.
    fn set(&mut self, key: &str, value: &[u8], sync: bool) -> Result<(), StorageError>;
}

/// One file per key in a directory, written atomically (`.tmp` then rename).
#[derive(Debug)]
pub struct FileKvStore {
    base_dir: PathBuf,
}

impl FileKvStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed.
    pub fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Open the store at the platform data directory (`<data_dir>/umesh`).
    pub fn default_path() -> Result<Self, StorageError> {
        let data = dirs::data_dir()
            .ok_or_else(|| StorageError::Directory("could not determine data directory".into()))?;
        Self::new(data.join("umesh"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.base_dir.join(key))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn set(&mut self, key: &str, value: &[u8], sync: bool) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp_path = path.with_extension("tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(value)?;
        if sync {
            file.sync_all()?;
        }
        drop(file);
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Volatile store for tests and storage-less nodes.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    values: HashMap<String, Vec<u8>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8], _sync: bool) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Persistent mesh configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub magic_number: u32,
    pub version: u8,
    pub local_sid: u16,
    pub network_id: [u8; NETWORK_ID_LEN],
}

impl ConfigRecord {
    pub fn new(local_sid: Sid, network_id: NetworkId) -> Self {
        Self {
            magic_number: CONFIG_MAGIC,
            version: CONFIG_VERSION,
            local_sid: local_sid.get(),
            network_id: network_id.to_bytes(),
        }
    }

    /// The "no prior configuration" record: every byte 0xff.
    pub const fn erased() -> Self {
        Self {
            magic_number: u32::MAX,
            version: u8::MAX,
            local_sid: u16::MAX,
            network_id: [0xff; NETWORK_ID_LEN],
        }
    }

    /// Whether the magic number and version match this build.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.magic_number == CONFIG_MAGIC && self.version == CONFIG_VERSION
    }

    pub fn local_sid(&self) -> Sid {
        Sid::new(self.local_sid)
    }

    pub fn network_id(&self) -> NetworkId {
        NetworkId::new(self.network_id)
    }

    /// Decode and validate a stored record.
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let record: ConfigRecord = postcard::from_bytes(bytes)
            .map_err(|e| StorageError::ConfigCorrupt(e.to_string()))?;
        if !record.is_valid() {
            return Err(StorageError::ConfigCorrupt(format!(
                "magic 0x{:08x} version {}",
                record.magic_number, record.version
            )));
        }
        Ok(record)
    }

    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|e| StorageError::Serialize(e.to_string()))
    }

    /// Read the record from `store`.
    ///
    /// A missing or corrupt record yields [`ConfigRecord::erased`]; a corrupt
    /// one is logged and overwritten. Only store I/O failures are errors.
    pub fn load(store: &mut impl KvStore) -> Result<Self, StorageError> {
        let Some(bytes) = store.get(CONFIG_KEY)? else {
            tracing::debug!("no stored mesh configuration");
            return Ok(Self::erased());
        };
        match Self::decode(&bytes) {
            Ok(record) => {
                tracing::debug!(sid = %record.local_sid(), "mesh configuration loaded");
                Ok(record)
            }
            Err(e) => {
                tracing::warn!("{e}, resetting to defaults");
                let erased = Self::erased();
                erased.save(store)?;
                Ok(erased)
            }
        }
    }

    pub fn save(&self, store: &mut impl KvStore) -> Result<(), StorageError> {
        store.set(CONFIG_KEY, &self.encode()?, true)
    }
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self::erased()
    }
}
