use crate::core::error::StoreError;
use serde::{Serialize, de::DeserializeOwned};
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::PathBuf;
use tracing::{debug, warn};

/// A single JSON document on disk, read and written as a whole.
pub struct JsonDocument<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Reads the document. A missing or empty file is `Ok(None)`; a file that cannot
    /// be decoded is `StoreError::Corrupt`.
    pub fn read(&self) -> Result<Option<T>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No document at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    /// Replaces the document through a temp file and rename.
    pub fn write(&self, value: &T) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.sibling("tmp");
        fs::write(&tmp, serde_json::to_vec(value)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!("Wrote document {}", self.path.display());
        Ok(())
    }

    /// Moves an undecodable document aside so it is not lost on the next write.
    pub fn quarantine(&self) -> Result<PathBuf, StoreError> {
        let target = self.sibling("corrupt");
        fs::rename(&self.path, &target)?;
        warn!(
            "Moved corrupt document {} to {}",
            self.path.display(),
            target.display()
        );
        Ok(target)
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }
}
