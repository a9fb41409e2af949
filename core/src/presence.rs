//! Tag presence state machine.
//!
//! Driven by exactly one reader poll per loop iteration:
//!
//! | State   | Poll     | Next    | Event                    |
//! |---------|----------|---------|--------------------------|
//! | Absent  | no tag   | Absent  | -                        |
//! | Absent  | tag `r`  | Present | `Placed(canonical(r))`   |
//! | Present | any tag  | Present | -                        |
//! | Present | no tag   | Absent  | `Removed(last_seen_id)`  |
//!
//! A successful poll while already present is not compared against the
//! current id, so swapping one tag for another without an empty poll in
//! between produces no events.

use core::time::Duration;

use log::info;

use crate::reader::TokenReader;
use crate::token::{RawId, TokenId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Placed(TokenId),
    Removed(TokenId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceState {
    pub present: bool,
    pub current_id: TokenId,
    /// Survives removal so `T<n>` can capture the tag that was just lifted.
    pub last_seen_id: TokenId,
}

#[derive(Debug, Default)]
pub struct PresenceDetector {
    state: PresenceState,
}

impl PresenceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poll the reader once and advance the state machine.
    pub fn poll<R: TokenReader>(
        &mut self,
        reader: &mut R,
        timeout: Duration,
    ) -> Option<PresenceEvent> {
        let polled = reader.poll(timeout);
        self.observe(polled.as_ref())
    }

    /// Advance the state machine with one poll result.
    pub fn observe(&mut self, polled: Option<&RawId>) -> Option<PresenceEvent> {
        match (self.state.present, polled) {
            (false, None) | (true, Some(_)) => None,
            (false, Some(raw)) => {
                let id = TokenId::from(raw);
                info!("Tag placed: {id}");
                self.state.present = true;
                self.state.current_id = id.clone();
                self.state.last_seen_id = id.clone();
                Some(PresenceEvent::Placed(id))
            }
            (true, None) => {
                info!("Tag removed: {}", self.state.last_seen_id);
                self.state.present = false;
                self.state.current_id = TokenId::empty();
                Some(PresenceEvent::Removed(self.state.last_seen_id.clone()))
            }
        }
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn is_present(&self) -> bool {
        self.state.present
    }

    pub fn last_seen_id(&self) -> &TokenId {
        &self.state.last_seen_id
    }
}
