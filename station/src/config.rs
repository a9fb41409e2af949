use std::path::PathBuf;
use std::time::Duration;

use tagbuddy_core::{DeviceConfig, OutputMode};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{var}: invalid value {value:?} ({reason})")]
pub struct ConfigError {
    var: &'static str,
    value: String,
    reason: String,
}

/// Which reader the station drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    /// Simulated reader, tags placed with `!place <uid>` on the console.
    Sim,
    /// No reader at all; startup halts.
    None,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: PathBuf,
    pub wireless_addr: String,
    pub forward_addr: String,
    pub reader: ReaderKind,
    pub device: DeviceConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = DeviceConfig::default();

        let output_mode = match lookup("TAGBUDDY_OUTPUT_MODE") {
            Some(value) => value.parse::<OutputMode>().map_err(|e| ConfigError {
                var: "TAGBUDDY_OUTPUT_MODE",
                reason: e.to_string(),
                value,
            })?,
            None => defaults.output_mode,
        };

        let poll_timeout = match lookup("TAGBUDDY_POLL_TIMEOUT_MS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError {
                        var: "TAGBUDDY_POLL_TIMEOUT_MS",
                        value,
                        reason: "expected a positive number of milliseconds".into(),
                    });
                }
            },
            None => defaults.poll_timeout,
        };

        let verbose = match lookup("TAGBUDDY_VERBOSE") {
            Some(value) => parse_flag(&value).ok_or_else(|| ConfigError {
                var: "TAGBUDDY_VERBOSE",
                value: value.clone(),
                reason: "expected 1/0, true/false, yes/no or on/off".into(),
            })?,
            None => defaults.verbose,
        };

        let reader = match lookup("TAGBUDDY_READER").as_deref().map(str::trim) {
            None | Some("sim") => ReaderKind::Sim,
            Some("none") => ReaderKind::None,
            Some(other) => {
                return Err(ConfigError {
                    var: "TAGBUDDY_READER",
                    value: other.to_owned(),
                    reason: "expected \"sim\" or \"none\"".into(),
                });
            }
        };

        Ok(Self {
            store_path: lookup("TAGBUDDY_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("tagbuddy.eeprom")),
            wireless_addr: lookup("TAGBUDDY_WIRELESS_ADDR")
                .unwrap_or_else(|| "127.0.0.1:7878".into()),
            forward_addr: lookup("TAGBUDDY_FORWARD_ADDR")
                .unwrap_or_else(|| "127.0.0.1:7879".into()),
            reader,
            device: DeviceConfig {
                poll_timeout,
                output_mode,
                verbose,
            },
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
