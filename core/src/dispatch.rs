//! Edge events to output lines.

use core::str::FromStr;

use log::{debug, info};
use thiserror::Error;

use crate::channel::{LineSink, Ports};
use crate::presence::PresenceEvent;
use crate::registry::Registry;
use crate::store::PersistentStore;

/// Where dispatched tag commands go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// The console channel.
    #[default]
    Local,
    /// The write-only forwarding channel to a second machine.
    Forwarded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown output mode {0:?}, expected \"local\" or \"forwarded\"")]
pub struct ParseOutputModeError(String);

impl FromStr for OutputMode {
    type Err = ParseOutputModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "forwarded" | "forward" => Ok(Self::Forwarded),
            _ => Err(ParseOutputModeError(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Dispatcher {
    mode: OutputMode,
    verbose: bool,
}

impl Dispatcher {
    pub fn new(mode: OutputMode, verbose: bool) -> Self {
        Self { mode, verbose }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Write whatever `event` maps to.
    ///
    /// Placement writes the slot command plus an empty separator line.
    /// Removal writes the remove command when the lifted tag is registered in
    /// any active slot. Diagnostics only appear in verbose mode and always go
    /// to the console.
    pub fn handle<S, C, W, F>(
        &self,
        event: &PresenceEvent,
        registry: &Registry<S>,
        ports: &mut Ports<C, W, F>,
    ) where
        S: PersistentStore,
        C: LineSink,
        W: LineSink,
        F: LineSink,
    {
        match event {
            PresenceEvent::Placed(id) => {
                if self.verbose {
                    ports.console.write_line("Found an ISO14443A card");
                    ports.console.write_line(&format!("  UID Length: {} bytes", id.uid_len()));
                    ports.console.write_line(&format!("TAG ID: {id}"));
                    ports.console.write_line("");
                }
                match registry.lookup_command(id) {
                    Some("") => debug!("Tag {id} registered without a command"),
                    Some(command) => {
                        info!("Tag {id} -> {command}");
                        let out = ports.output(self.mode);
                        out.write_line(command);
                        out.write_line("");
                    }
                    None => {
                        debug!("Tag {id} not registered");
                        if self.verbose {
                            ports.console.write_line("UNKNOWN TAG");
                        }
                    }
                }
            }
            PresenceEvent::Removed(id) => {
                if self.verbose {
                    ports.console.write_line("CARD REMOVED");
                }
                if registry.lookup_command(id).is_none() {
                    return;
                }
                let command = registry.remove_command();
                if command.is_empty() {
                    debug!("Tag {id} removed, no remove command set");
                    return;
                }
                info!("Tag {id} removed -> {command}");
                ports.output(self.mode).write_line(command);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LineBuffer;
    use crate::store::MemoryStore;
    use crate::token::TokenId;

    type TestPorts = Ports<LineBuffer, LineBuffer, LineBuffer>;

    fn ports() -> TestPorts {
        Ports::new(LineBuffer::new(), LineBuffer::new(), LineBuffer::new())
    }

    fn registry() -> Registry<MemoryStore> {
        let mut registry = Registry::load(MemoryStore::new()).unwrap();
        registry.set_capacity(2).unwrap();
        registry.capture_token_at(0, &TokenId::parse("AA11").unwrap()).unwrap();
        registry.set_command_at(0, "OPEN").unwrap();
        registry.set_remove_command("BYE").unwrap();
        registry
    }

    fn placed(hex: &str) -> PresenceEvent {
        PresenceEvent::Placed(TokenId::parse(hex).unwrap())
    }

    fn removed(hex: &str) -> PresenceEvent {
        PresenceEvent::Removed(TokenId::parse(hex).unwrap())
    }

    #[test]
    fn known_tag_writes_command_and_separator() {
        let mut ports = ports();
        Dispatcher::new(OutputMode::Local, false).handle(&placed("AA11"), &registry(), &mut ports);
        assert_eq!(ports.console.written(), ["OPEN", ""]);
        assert!(ports.forward.written().is_empty());
        assert!(ports.wireless.written().is_empty());
    }

    #[test]
    fn forwarded_mode_targets_forward_channel() {
        let mut ports = ports();
        let dispatcher = Dispatcher::new(OutputMode::Forwarded, false);
        let registry = registry();
        dispatcher.handle(&placed("AA11"), &registry, &mut ports);
        dispatcher.handle(&removed("AA11"), &registry, &mut ports);
        assert_eq!(ports.forward.written(), ["OPEN", "", "BYE"]);
        assert!(ports.console.written().is_empty());
    }

    #[test]
    fn unknown_tag_is_silent_unless_verbose() {
        let registry = registry();

        let mut quiet = ports();
        Dispatcher::new(OutputMode::Local, false).handle(&placed("BB22"), &registry, &mut quiet);
        assert!(quiet.console.written().is_empty());

        let mut chatty = ports();
        Dispatcher::new(OutputMode::Local, true).handle(&placed("BB22"), &registry, &mut chatty);
        assert_eq!(
            chatty.console.written(),
            ["Found an ISO14443A card", "  UID Length: 2 bytes", "TAG ID: BB22", "", "UNKNOWN TAG"]
        );
    }

    #[test]
    fn verbose_removal_diagnostic_stays_on_console() {
        let registry = registry();
        let dispatcher = Dispatcher::new(OutputMode::Forwarded, true);
        assert_eq!(dispatcher.mode(), OutputMode::Forwarded);

        let mut known = ports();
        dispatcher.handle(&removed("AA11"), &registry, &mut known);
        assert_eq!(known.console.written(), ["CARD REMOVED"]);
        assert_eq!(known.forward.written(), ["BYE"]);
        assert!(known.wireless.written().is_empty());

        let mut unknown = ports();
        dispatcher.handle(&removed("BB22"), &registry, &mut unknown);
        assert_eq!(unknown.console.written(), ["CARD REMOVED"]);
        assert!(unknown.forward.written().is_empty());
    }

    #[test]
    fn removal_of_unregistered_tag_writes_nothing() {
        let mut ports = ports();
        Dispatcher::new(OutputMode::Local, false).handle(&removed("BB22"), &registry(), &mut ports);
        assert!(ports.console.written().is_empty());
    }

    #[test]
    fn removal_without_remove_command_writes_nothing() {
        let mut registry = registry();
        registry.set_remove_command("").unwrap();
        let mut ports = ports();
        Dispatcher::new(OutputMode::Local, false).handle(&removed("AA11"), &registry, &mut ports);
        assert!(ports.console.written().is_empty());
    }

    #[test]
    fn output_mode_parses_case_insensitively() {
        assert_eq!("Local".parse::<OutputMode>(), Ok(OutputMode::Local));
        assert_eq!("FORWARDED".parse::<OutputMode>(), Ok(OutputMode::Forwarded));
        assert!("serial".parse::<OutputMode>().is_err());
    }
}
