//! Tag id to command table.
//!
//! A fixed array of [`MAX_CAPACITY`] slots, of which the first `capacity` are
//! active. Slots past the active range keep their contents, so raising the
//! count again brings them back. Every mutation writes through to the store
//! and commits before returning.

use log::warn;
use thiserror::Error;

use crate::store::{
    COUNT_ADDR, PersistentStore, REMOVE_COMMAND_ADDR, REMOVE_PAYLOAD_MAX, SLOT_PAYLOAD_MAX,
    STORE_SIZE, StoreError, command_addr, token_addr,
};
use crate::token::TokenId;

/// Slot 19's UID region would overlap command slot 0 at address 200.
pub const MAX_CAPACITY: usize = 19;

/// Count used when the stored or requested count is above [`MAX_CAPACITY`].
pub const DEFAULT_CAPACITY: usize = 10;

pub type SlotText = heapless::String<SLOT_PAYLOAD_MAX>;
pub type RemoveText = heapless::String<REMOVE_PAYLOAD_MAX>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    pub token_id: TokenId,
    pub command: SlotText,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("slot {index} is outside the active range 0..{capacity}")]
    IndexOutOfRange { index: usize, capacity: usize },

    #[error("text of {len} bytes exceeds the {max}-byte budget")]
    TextTooLong { len: usize, max: usize },

    #[error("tag {0} is too long to persist")]
    TokenTooLong(TokenId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Registry<S> {
    store: S,
    capacity: usize,
    slots: [Slot; MAX_CAPACITY],
    remove_command: RemoveText,
}

impl<S: PersistentStore> Registry<S> {
    /// Read the table back from the store.
    ///
    /// Unreadable entries (erased flash, garbage prefixes) load as empty.
    pub fn load(store: S) -> Result<Self, RegistryError> {
        if store.size() < STORE_SIZE {
            return Err(StoreError::Undersized { size: store.size(), required: STORE_SIZE }.into());
        }

        let stored = usize::from(store.read_byte(COUNT_ADDR)?);
        let capacity = if stored > MAX_CAPACITY {
            warn!("Stored tag count {stored} out of range, using {DEFAULT_CAPACITY}");
            DEFAULT_CAPACITY
        } else {
            stored
        };

        let slots = core::array::from_fn(|index| decode_slot(&store, index));
        let remove_command = match store.read_str(REMOVE_COMMAND_ADDR, REMOVE_PAYLOAD_MAX) {
            Ok(text) => RemoveText::try_from(text.as_str()).unwrap_or_default(),
            Err(e) => {
                warn!("Remove command unreadable ({e}), starting empty");
                RemoveText::new()
            }
        };

        Ok(Self {
            store,
            capacity,
            slots,
            remove_command,
        })
    }

    /// Command of the first active slot holding `id`.
    pub fn lookup_command(&self, id: &TokenId) -> Option<&str> {
        if id.is_empty() {
            return None;
        }
        self.active_slots()
            .iter()
            .find(|slot| slot.token_id == *id)
            .map(|slot| slot.command.as_str())
    }

    /// Set the active slot count. Negative counts clamp to 0, counts above
    /// [`MAX_CAPACITY`] fall back to [`DEFAULT_CAPACITY`]. Returns the count
    /// actually applied.
    pub fn set_capacity(&mut self, requested: i64) -> Result<usize, RegistryError> {
        let capacity = match usize::try_from(requested) {
            Err(_) => 0,
            Ok(n) if n > MAX_CAPACITY => DEFAULT_CAPACITY,
            Ok(n) => n,
        };
        self.capacity = capacity;
        self.store.write_byte(COUNT_ADDR, capacity as u8)?;
        self.store.commit()?;
        Ok(capacity)
    }

    pub fn capture_token_at(&mut self, index: usize, id: &TokenId) -> Result<(), RegistryError> {
        self.check_index(index)?;
        let raw = id.to_raw();
        if raw.len() > SLOT_PAYLOAD_MAX {
            return Err(RegistryError::TokenTooLong(id.clone()));
        }
        self.slots[index].token_id = id.clone();
        self.store.write_prefixed(token_addr(index), &raw, SLOT_PAYLOAD_MAX)?;
        self.store.commit()?;
        Ok(())
    }

    pub fn set_command_at(&mut self, index: usize, text: &str) -> Result<(), RegistryError> {
        self.check_index(index)?;
        let command = SlotText::try_from(text).map_err(|_| RegistryError::TextTooLong {
            len: text.len(),
            max: SLOT_PAYLOAD_MAX,
        })?;
        self.slots[index].command = command;
        self.store.write_str(command_addr(index), text, SLOT_PAYLOAD_MAX)?;
        self.store.commit()?;
        Ok(())
    }

    pub fn set_remove_command(&mut self, text: &str) -> Result<(), RegistryError> {
        let command = RemoveText::try_from(text).map_err(|_| RegistryError::TextTooLong {
            len: text.len(),
            max: REMOVE_PAYLOAD_MAX,
        })?;
        self.remove_command = command;
        self.store.write_str(REMOVE_COMMAND_ADDR, text, REMOVE_PAYLOAD_MAX)?;
        self.store.commit()?;
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count as currently held by the store.
    pub fn stored_capacity(&self) -> Result<u8, StoreError> {
        self.store.read_byte(COUNT_ADDR)
    }

    pub fn active_slots(&self) -> &[Slot] {
        &self.slots[..self.capacity]
    }

    /// Any slot, active or not.
    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    /// Slot as currently held by the store rather than in memory.
    pub fn stored_slot(&self, index: usize) -> Slot {
        decode_slot(&self.store, index)
    }

    pub fn remove_command(&self) -> &str {
        &self.remove_command
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn check_index(&self, index: usize) -> Result<(), RegistryError> {
        if index >= self.capacity {
            return Err(RegistryError::IndexOutOfRange { index, capacity: self.capacity });
        }
        Ok(())
    }
}

fn decode_slot<S: PersistentStore>(store: &S, index: usize) -> Slot {
    let token_id = match store.read_prefixed(token_addr(index), SLOT_PAYLOAD_MAX) {
        Ok(raw) => TokenId::from_raw(&raw).unwrap_or_default(),
        Err(e) => {
            warn!("Slot {} tag unreadable ({e})", index + 1);
            TokenId::empty()
        }
    };
    let command = match store.read_str(command_addr(index), SLOT_PAYLOAD_MAX) {
        Ok(text) => SlotText::try_from(text.as_str()).unwrap_or_default(),
        Err(e) => {
            warn!("Slot {} command unreadable ({e})", index + 1);
            SlotText::new()
        }
    };
    Slot { token_id, command }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ERASED, MemoryStore};

    fn registry_with(capacity: i64) -> Registry<MemoryStore> {
        let mut registry = Registry::load(MemoryStore::new()).unwrap();
        registry.set_capacity(capacity).unwrap();
        registry
    }

    fn tag(hex: &str) -> TokenId {
        TokenId::parse(hex).unwrap()
    }

    #[test]
    fn erased_store_loads_default_capacity_and_empty_slots() {
        let registry = Registry::load(MemoryStore::new()).unwrap();
        assert_eq!(registry.capacity(), DEFAULT_CAPACITY);
        assert!(registry.active_slots().iter().all(|s| *s == Slot::default()));
        assert_eq!(registry.remove_command(), "");
    }

    #[test]
    fn undersized_store_is_refused() {
        let store = MemoryStore::from_image(vec![ERASED; 64]);
        assert!(matches!(
            Registry::load(store),
            Err(RegistryError::Store(StoreError::Undersized { size: 64, required: 512 }))
        ));
    }

    #[test]
    fn non_utf8_command_loads_as_empty() {
        let mut store = MemoryStore::new();
        store.write_byte(COUNT_ADDR, 2).unwrap();
        store.write_prefixed(command_addr(0), &[0xC3, 0x28], SLOT_PAYLOAD_MAX).unwrap();
        store.write_str(command_addr(1), "OK", SLOT_PAYLOAD_MAX).unwrap();

        let registry = Registry::load(store).unwrap();
        assert_eq!(registry.capacity(), 2);
        assert!(registry.slot(0).unwrap().command.is_empty());
        assert_eq!(registry.slot(1).unwrap().command.as_str(), "OK");
    }

    #[test]
    fn capacity_above_max_falls_back_to_default() {
        let mut registry = registry_with(3);
        assert_eq!(registry.set_capacity(20).unwrap(), DEFAULT_CAPACITY);
        assert_eq!(registry.capacity(), DEFAULT_CAPACITY);
        assert_eq!(registry.stored_capacity().unwrap(), DEFAULT_CAPACITY as u8);

        assert_eq!(registry.set_capacity(MAX_CAPACITY as i64).unwrap(), MAX_CAPACITY);
        assert_eq!(registry.set_capacity(-4).unwrap(), 0);
    }

    #[test]
    fn out_of_range_index_leaves_table_unchanged() {
        let mut registry = registry_with(2);
        let before: Vec<Slot> = registry.active_slots().to_vec();
        let commits = registry.store().commits();

        assert!(matches!(
            registry.capture_token_at(2, &tag("AA11")),
            Err(RegistryError::IndexOutOfRange { index: 2, capacity: 2 })
        ));
        assert!(matches!(
            registry.set_command_at(5, "OPEN"),
            Err(RegistryError::IndexOutOfRange { .. })
        ));
        assert_eq!(registry.active_slots(), before.as_slice());
        assert_eq!(registry.store().commits(), commits);
    }

    #[test]
    fn lookup_scans_active_slots_in_order() {
        let mut registry = registry_with(3);
        registry.capture_token_at(0, &tag("AA11")).unwrap();
        registry.set_command_at(0, "FIRST").unwrap();
        registry.capture_token_at(2, &tag("AA11")).unwrap();
        registry.set_command_at(2, "THIRD").unwrap();

        assert_eq!(registry.lookup_command(&tag("AA11")), Some("FIRST"));
        assert_eq!(registry.lookup_command(&tag("BB22")), None);
        assert_eq!(registry.lookup_command(&TokenId::empty()), None);
    }

    #[test]
    fn slots_beyond_capacity_are_ignored_but_kept() {
        let mut registry = registry_with(2);
        registry.capture_token_at(1, &tag("CAFE0001")).unwrap();
        registry.set_command_at(1, "B").unwrap();

        registry.set_capacity(1).unwrap();
        assert_eq!(registry.lookup_command(&tag("CAFE0001")), None);
        assert_eq!(registry.slot(1).unwrap().command.as_str(), "B");

        registry.set_capacity(2).unwrap();
        assert_eq!(registry.lookup_command(&tag("CAFE0001")), Some("B"));
    }

    #[test]
    fn long_command_is_rejected() {
        let mut registry = registry_with(1);
        registry.set_command_at(0, "SHORT").unwrap();
        assert!(matches!(
            registry.set_command_at(0, "WAYTOOLONG"),
            Err(RegistryError::TextTooLong { len: 10, max: 9 })
        ));
        assert_eq!(registry.slot(0).unwrap().command.as_str(), "SHORT");
        assert_eq!(registry.stored_slot(0).command.as_str(), "SHORT");
    }

    #[test]
    fn seven_byte_uid_persists_as_raw_bytes() {
        let mut registry = registry_with(1);
        let id = tag("045E219A6B1190");
        registry.capture_token_at(0, &id).unwrap();

        let store = registry.store();
        assert_eq!(store.read_byte(token_addr(0)).unwrap(), 7);
        assert_eq!(registry.stored_slot(0).token_id, id);
    }

    #[test]
    fn ten_byte_uid_does_not_fit_a_slot() {
        let mut registry = registry_with(1);
        let id = tag("00112233445566778899");
        assert!(matches!(
            registry.capture_token_at(0, &id),
            Err(RegistryError::TokenTooLong(_))
        ));
        assert!(registry.slot(0).unwrap().token_id.is_empty());
    }

    #[test]
    fn every_mutation_commits() {
        let mut registry = registry_with(2);
        let base = registry.store().commits();
        registry.capture_token_at(0, &tag("AA11")).unwrap();
        registry.set_command_at(0, "OPEN").unwrap();
        registry.set_remove_command("BYE").unwrap();
        assert_eq!(registry.store().commits(), base + 3);

        let reloaded = Registry::load(registry.into_store().power_cycle()).unwrap();
        assert_eq!(reloaded.capacity(), 2);
        assert_eq!(reloaded.lookup_command(&tag("AA11")), Some("OPEN"));
        assert_eq!(reloaded.remove_command(), "BYE");
    }
}
