//! File-backed EEPROM image.
//!
//! The whole 512-byte image lives in memory; `commit` rewrites the file via a
//! temporary sibling and a rename so a crash mid-write keeps the old image.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tagbuddy_core::store::{ERASED, STORE_SIZE};
use tagbuddy_core::{MemoryStore, PersistentStore, StoreError};
use tracing::{debug, info, warn};

pub struct FileStore {
    path: PathBuf,
    image: MemoryStore,
}

impl FileStore {
    /// Open the image at `path`, or start from an erased image if it does not
    /// exist yet. The file is only created on the first commit.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let image = match fs::read(&path) {
            Ok(mut bytes) => {
                if bytes.len() != STORE_SIZE {
                    warn!(
                        "EEPROM image {} is {} bytes, resizing to {STORE_SIZE}",
                        path.display(),
                        bytes.len()
                    );
                    bytes.resize(STORE_SIZE, ERASED);
                }
                info!("Loaded EEPROM image from {}", path.display());
                bytes
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No EEPROM image at {}, starting erased", path.display());
                vec![ERASED; STORE_SIZE]
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            image: MemoryStore::from_image(image),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistentStore for FileStore {
    fn size(&self) -> usize {
        self.image.size()
    }

    fn read_byte(&self, addr: usize) -> Result<u8, StoreError> {
        self.image.read_byte(addr)
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), StoreError> {
        self.image.write_byte(addr, value)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, self.image.image())?;
        fs::rename(&tmp, &self.path)?;
        self.image.commit()?;
        debug!("EEPROM committed to {}", self.path.display());
        Ok(())
    }
}
