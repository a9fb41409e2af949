//! Console channel on stdin/stdout.
//!
//! Lines starting with `!` never reach the device. They drive the simulated
//! reader instead: `!place <uid-hex>` puts a tag on the antenna and
//! `!remove` takes it off.

use std::io::Write;

use tagbuddy_core::{LineSink, LineSource, RawId, parse_uid};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

/// Loop-side end of the console.
pub struct ConsolePort {
    inbound: mpsc::UnboundedReceiver<String>,
}

impl LineSource for ConsolePort {
    fn read_line(&mut self) -> Option<String> {
        self.inbound.try_recv().ok()
    }
}

impl LineSink for ConsolePort {
    fn write_line(&mut self, line: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            tracing::warn!("console write failed: {e}");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ConsoleInput {
    Line(String),
    Place(RawId),
    Remove,
    BadControl(String),
}

fn classify(line: String) -> ConsoleInput {
    let Some(control) = line.strip_prefix('!') else {
        return ConsoleInput::Line(line);
    };

    let mut words = control.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some("remove"), None, None) => ConsoleInput::Remove,
        (Some("place"), Some(uid), None) => match parse_uid(uid) {
            Ok(raw) if !raw.is_empty() => ConsoleInput::Place(raw),
            Ok(_) => ConsoleInput::BadControl("empty uid".into()),
            Err(e) => ConsoleInput::BadControl(e.to_string()),
        },
        _ => ConsoleInput::BadControl(format!("unknown control {line:?}")),
    }
}

/// Read stdin in the background, splitting device lines from reader controls.
pub fn spawn(antenna: watch::Sender<Option<RawId>>) -> ConsolePort {
    let (tx, inbound) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::info!("console closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!("console read failed: {e}");
                    break;
                }
            };

            match classify(line) {
                ConsoleInput::Line(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                ConsoleInput::Place(raw) => {
                    tracing::debug!("simulated tag placed");
                    antenna.send_replace(Some(raw));
                }
                ConsoleInput::Remove => {
                    tracing::debug!("simulated tag removed");
                    antenna.send_replace(None);
                }
                ConsoleInput::BadControl(reason) => {
                    tracing::warn!("ignoring console control: {reason}");
                }
            }
        }
    });

    ConsolePort { inbound }
}
