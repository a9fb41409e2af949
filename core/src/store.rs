//! Byte-addressable persistent store.
//!
//! Mirrors an EEPROM emulation: byte writes land in a working image and only
//! survive a power cycle once [`PersistentStore::commit`] returns.
//!
//! Fixed layout, no header or version tag:
//!
//! | Address            | Content                                 |
//! |--------------------|-----------------------------------------|
//! | `0`                | active slot count (1 byte)              |
//! | `10 + 10*i`        | slot `i` tag UID, length-prefixed       |
//! | `200 + 10*i`       | slot `i` command, length-prefixed       |
//! | `400`              | remove command, length-prefixed         |
//!
//! Each slot region is 10 bytes: one length byte and at most 9 payload bytes.
//! The remove command may run to the end of the store.

use thiserror::Error;

pub const STORE_SIZE: usize = 512;
pub const COUNT_ADDR: usize = 0;
pub const TOKEN_BASE: usize = 10;
pub const COMMAND_BASE: usize = 200;
pub const REMOVE_COMMAND_ADDR: usize = 400;
pub const SLOT_STRIDE: usize = 10;
pub const SLOT_PAYLOAD_MAX: usize = SLOT_STRIDE - 1;
pub const REMOVE_PAYLOAD_MAX: usize = STORE_SIZE - REMOVE_COMMAND_ADDR - 1;

/// Value of a never-written EEPROM byte.
pub const ERASED: u8 = 0xFF;

pub const fn token_addr(slot: usize) -> usize {
    TOKEN_BASE + SLOT_STRIDE * slot
}

pub const fn command_addr(slot: usize) -> usize {
    COMMAND_BASE + SLOT_STRIDE * slot
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bytes {addr}..{end} fall outside the {size}-byte store")]
    OutOfBounds { addr: usize, end: usize, size: usize },

    #[error("store holds {size} bytes, layout needs {required}")]
    Undersized { size: usize, required: usize },

    #[error("payload of {len} bytes exceeds the {max}-byte budget")]
    PayloadTooLong { len: usize, max: usize },

    #[error("length prefix {len} at {addr} exceeds the {max}-byte budget")]
    CorruptPrefix { addr: usize, len: usize, max: usize },

    #[error("string at {addr} is not valid UTF-8")]
    NotUtf8 { addr: usize },

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub trait PersistentStore {
    fn size(&self) -> usize;

    fn read_byte(&self, addr: usize) -> Result<u8, StoreError>;

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), StoreError>;

    /// Make all writes so far durable. Blocks until done.
    fn commit(&mut self) -> Result<(), StoreError>;

    fn check_range(&self, addr: usize, len: usize) -> Result<(), StoreError> {
        let end = addr + len;
        if end > self.size() {
            return Err(StoreError::OutOfBounds { addr, end, size: self.size() });
        }
        Ok(())
    }

    /// Write `payload` as a length byte followed by the bytes themselves.
    fn write_prefixed(
        &mut self,
        addr: usize,
        payload: &[u8],
        max: usize,
    ) -> Result<(), StoreError> {
        let max = max.min(usize::from(u8::MAX));
        if payload.len() > max {
            return Err(StoreError::PayloadTooLong { len: payload.len(), max });
        }
        self.check_range(addr, payload.len() + 1)?;
        self.write_byte(addr, payload.len() as u8)?;
        for (offset, byte) in payload.iter().enumerate() {
            self.write_byte(addr + 1 + offset, *byte)?;
        }
        Ok(())
    }

    fn read_prefixed(&self, addr: usize, max: usize) -> Result<Vec<u8>, StoreError> {
        let len = usize::from(self.read_byte(addr)?);
        if len > max {
            return Err(StoreError::CorruptPrefix { addr, len, max });
        }
        self.check_range(addr, len + 1)?;
        (0..len).map(|offset| self.read_byte(addr + 1 + offset)).collect()
    }

    fn write_str(&mut self, addr: usize, text: &str, max: usize) -> Result<(), StoreError> {
        self.write_prefixed(addr, text.as_bytes(), max)
    }

    fn read_str(&self, addr: usize, max: usize) -> Result<String, StoreError> {
        let bytes = self.read_prefixed(addr, max)?;
        String::from_utf8(bytes).map_err(|_| StoreError::NotUtf8 { addr })
    }
}

impl<S: PersistentStore + ?Sized> PersistentStore for &mut S {
    fn size(&self) -> usize {
        (**self).size()
    }

    fn read_byte(&self, addr: usize) -> Result<u8, StoreError> {
        (**self).read_byte(addr)
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), StoreError> {
        (**self).write_byte(addr, value)
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        (**self).commit()
    }
}

/// RAM-backed store with a separate committed image.
///
/// Writes go to the working image; `commit` copies it to the committed image,
/// which is what survives a simulated power cycle.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    working: Vec<u8>,
    committed: Vec<u8>,
    commits: usize,
}

impl MemoryStore {
    /// Factory-fresh store, every byte erased.
    pub fn new() -> Self {
        Self::from_image(vec![ERASED; STORE_SIZE])
    }

    /// Start from a previously committed image.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            working: image.clone(),
            committed: image,
            commits: 0,
        }
    }

    pub fn image(&self) -> &[u8] {
        &self.working
    }

    pub fn committed_image(&self) -> &[u8] {
        &self.committed
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    /// What the store would read back after losing power now.
    pub fn power_cycle(&self) -> Self {
        Self::from_image(self.committed.clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistentStore for MemoryStore {
    fn size(&self) -> usize {
        self.working.len()
    }

    fn read_byte(&self, addr: usize) -> Result<u8, StoreError> {
        self.working
            .get(addr)
            .copied()
            .ok_or(StoreError::OutOfBounds { addr, end: addr + 1, size: self.working.len() })
    }

    fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), StoreError> {
        let size = self.working.len();
        let byte = self
            .working
            .get_mut(addr)
            .ok_or(StoreError::OutOfBounds { addr, end: addr + 1, size })?;
        *byte = value;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.committed.copy_from_slice(&self.working);
        self.commits += 1;
        Ok(())
    }
}
