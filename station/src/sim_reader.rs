use std::time::Duration;

use tagbuddy_core::{RawId, TokenReader};
use tokio::sync::watch;

/// PN532, firmware 1.6.
const SIM_FIRMWARE: u32 = 0x3201_0607;

/// Poll interval while a tag sits on the antenna.
const PRESENT_POLL: Duration = Duration::from_millis(5);

/// Reader backed by whatever the console last placed on the antenna.
///
/// Polls block the calling thread like a real reader does, so the device
/// loop must run off the async runtime.
pub struct SimReader {
    antenna: watch::Receiver<Option<RawId>>,
    connected: bool,
}

impl SimReader {
    pub fn present(antenna: watch::Receiver<Option<RawId>>) -> Self {
        Self { antenna, connected: true }
    }

    /// A reader that never answers the firmware query.
    pub fn absent(antenna: watch::Receiver<Option<RawId>>) -> Self {
        Self { antenna, connected: false }
    }
}

impl TokenReader for SimReader {
    fn firmware_version(&mut self) -> Option<u32> {
        self.connected.then_some(SIM_FIRMWARE)
    }

    fn poll(&mut self, timeout: Duration) -> Option<RawId> {
        let tag = self.antenna.borrow_and_update().clone();
        std::thread::sleep(if tag.is_some() { PRESENT_POLL } else { timeout });
        tag
    }
}
