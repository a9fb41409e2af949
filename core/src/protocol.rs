//! Text configuration protocol.
//!
//! One command per line, dispatched on the first character and case
//! sensitive:
//!
//! - `N<count>` set the number of active slots
//! - `T<index>` assign the last seen tag to slot `index` (1-based)
//! - `C<index><text>` set slot `index`'s command; text starts at offset 2
//! - `R<text>` set the remove command
//! - any line containing `HELP` prints the usage text
//!
//! Everything else is ignored. Numbers parse like C `atoi`: garbage reads as 0.

use log::{debug, warn};

use crate::channel::{LineSink, Ports};
use crate::presence::PresenceState;
use crate::registry::{Registry, RegistryError};
use crate::store::{PersistentStore, REMOVE_PAYLOAD_MAX, SLOT_PAYLOAD_MAX, StoreError};

pub const USAGE: &[&str] = &[
    "TAGBUDDY CONFIGURATION",
    "  N<count>        number of active tags (0-19)",
    "  T<slot>         assign the last seen tag to <slot>",
    "  C<slot><cmd>    command sent when the tag in <slot> is placed",
    "  R<cmd>          command sent when a known tag is removed",
    "  HELP            show this text",
];

/// Character offset of the command text in a `C` line.
const COMMAND_TEXT_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand<'a> {
    SetCount(i64),
    /// 1-based slot, as typed.
    CaptureTag(i64),
    SetCommand { slot: i64, text: &'a str },
    SetRemoveCommand(&'a str),
    Help,
    Ignored,
}

impl<'a> ConfigCommand<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.contains("HELP") {
            return Self::Help;
        }
        let Some(prefix) = line.chars().next() else {
            return Self::Ignored;
        };
        let rest = &line[prefix.len_utf8()..];
        match prefix {
            'N' => Self::SetCount(parse_int(rest)),
            'T' => Self::CaptureTag(parse_int(rest)),
            'C' => Self::SetCommand {
                slot: parse_int(rest),
                text: line.get(COMMAND_TEXT_OFFSET..).unwrap_or(""),
            },
            'R' => Self::SetRemoveCommand(rest),
            _ => Self::Ignored,
        }
    }
}

/// Best-effort integer: optional leading whitespace and sign, then digits up
/// to the first non-digit. No digits reads as 0; overflow saturates.
pub fn parse_int(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, d| acc.saturating_mul(10).saturating_add(i64::from(d - b'0')));
    if negative { -magnitude } else { magnitude }
}

/// 1-based slot number to a table index, `None` when it cannot be one.
fn slot_index(slot: i64) -> Option<usize> {
    usize::try_from(slot.checked_sub(1)?).ok()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigProtocol;

impl ConfigProtocol {
    pub fn new() -> Self {
        Self
    }

    /// Parse and apply one line, writing replies to the console and wireless
    /// sinks. Only a failing store commit is reported back as an error.
    pub fn handle_line<S, C, W, F>(
        &self,
        line: &str,
        registry: &mut Registry<S>,
        presence: &PresenceState,
        ports: &mut Ports<C, W, F>,
    ) -> Result<(), StoreError>
    where
        S: PersistentStore,
        C: LineSink,
        W: LineSink,
        F: LineSink,
    {
        let command = ConfigCommand::parse(line);
        debug!("Config line {line:?} -> {command:?}");
        match command {
            ConfigCommand::SetCount(count) => {
                ports.console.write_line(&count.to_string());
                if let Err(e) = registry.set_capacity(count) {
                    return report_rejection(e, ports);
                }
                let stored = registry.stored_capacity()?;
                ports.announce(&format!("NUM TAGS SET TO: {stored}"));
            }
            ConfigCommand::CaptureTag(slot) => {
                let id = presence.last_seen_id.clone();
                match slot_index(slot).map(|index| registry.capture_token_at(index, &id)) {
                    Some(Ok(())) => {}
                    Some(Err(e)) => report_rejection(e, ports)?,
                    None => debug!("T{slot} names no slot, ignored"),
                }
                for index in 0..registry.capacity() {
                    let slot = registry.stored_slot(index);
                    ports.announce(&format!("Index: {} TAG ID: {}", index + 1, slot.token_id));
                }
            }
            ConfigCommand::SetCommand { slot, text } => {
                match slot_index(slot).map(|index| registry.set_command_at(index, text)) {
                    Some(Ok(())) => {}
                    Some(Err(e)) => report_rejection(e, ports)?,
                    None => debug!("C{slot} names no slot, ignored"),
                }
                for index in 0..registry.capacity() {
                    let slot = registry.stored_slot(index);
                    ports.announce(&format!("Index: {} COMMAND: {}", index + 1, slot.command));
                }
            }
            ConfigCommand::SetRemoveCommand(text) => match registry.set_remove_command(text) {
                Ok(()) => ports.announce(&format!("REMOVE COMMAND SET TO: {text}")),
                Err(e) => report_rejection(e, ports)?,
            },
            ConfigCommand::Help => {
                for line in USAGE {
                    ports.announce(line);
                }
            }
            ConfigCommand::Ignored => {}
        }
        Ok(())
    }
}

/// Turn a rejected mutation into user-visible output. Out-of-range slots stay
/// silent so existing configuration scripts behave as before.
fn report_rejection<C, W, F>(
    error: RegistryError,
    ports: &mut Ports<C, W, F>,
) -> Result<(), StoreError>
where
    C: LineSink,
    W: LineSink,
    F: LineSink,
{
    match error {
        RegistryError::IndexOutOfRange { capacity, .. } => {
            debug!("Slot outside 1..={capacity}, ignored");
        }
        RegistryError::TextTooLong { max, .. } if max == SLOT_PAYLOAD_MAX => {
            warn!("{error}");
            ports.announce(&format!("COMMAND TOO LONG (MAX {SLOT_PAYLOAD_MAX})"));
        }
        RegistryError::TextTooLong { .. } => {
            warn!("{error}");
            ports.announce(&format!("REMOVE COMMAND TOO LONG (MAX {REMOVE_PAYLOAD_MAX})"));
        }
        RegistryError::TokenTooLong(id) => {
            warn!("Tag {id} cannot be stored in a slot");
            ports.announce(&format!("TAG ID TOO LONG: {id}"));
        }
        RegistryError::Store(e) => return Err(e),
    }
    Ok(())
}
