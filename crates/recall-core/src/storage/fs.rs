use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::{content_digest, StateRecord, StateStorage, StorageError, StorageResult};

/// Directory-backed state storage.
///
/// Layout: `<root>/<record>.json` with a `<record>.digest` sidecar holding
/// the SHA-256 of the JSON. Both files are replaced atomically.
pub struct FsStateStorage {
    root: PathBuf,
}

impl FsStateStorage {
    /// Create storage rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, record: StateRecord) -> PathBuf {
        self.root.join(format!("{}.json", record.stem()))
    }

    fn digest_path(&self, record: StateRecord) -> PathBuf {
        self.root.join(format!("{}.digest", record.stem()))
    }

    // Write to a temp file in the same directory, then rename over the target.
    fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn read_optional(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

fn remove_optional(path: &Path) -> StorageResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Io(e)),
    }
}

impl StateStorage for FsStateStorage {
    fn load(&self, record: StateRecord) -> StorageResult<Option<Vec<u8>>> {
        let Some(data) = read_optional(&self.data_path(record))? else {
            return Ok(None);
        };
        let expected = read_optional(&self.digest_path(record))?
            .map(|d| String::from_utf8_lossy(&d).trim().to_string())
            .ok_or_else(|| StorageError::Corrupt(format!("{record}: digest file missing")))?;

        let actual = content_digest(&data);
        if expected != actual {
            return Err(StorageError::DigestMismatch {
                record,
                expected,
                actual,
            });
        }
        Ok(Some(data))
    }

    fn save(&self, record: StateRecord, data: &[u8]) -> StorageResult<()> {
        // Data first: a crash between the two writes surfaces as a digest
        // mismatch on the next load rather than silently stale data.
        self.write_atomic(&self.data_path(record), data)?;
        self.write_atomic(&self.digest_path(record), content_digest(data).as_bytes())
    }

    fn remove(&self, record: StateRecord) -> StorageResult<()> {
        remove_optional(&self.data_path(record))?;
        remove_optional(&self.digest_path(record))
    }
}
