//! UNET beacon payload: a fixed 8-byte structure carried by a `Beacon`-type
//! MAC frame, distinct from (and simpler than) the standard 802.15.4
//! superframe-spec beacon — this network never runs beacon-enabled
//! superframe mode.

use super::FrameError;

const MARKER: [u8; 2] = [0xFF, 0xCF];
const PROTOCOL_ID: u8 = 0xAA;

/// Fixed 8-byte beacon payload: marker(2), zero(2), protocol id(1), profile(1),
/// depth(1), router-capacity flag(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnetBeacon {
    pub profile: u8,
    pub depth: u8,
    pub router_capacity: bool,
}

impl UnetBeacon {
    pub const LEN: usize = 8;

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0] = MARKER[0];
        buf[1] = MARKER[1];
        buf[2] = 0;
        buf[3] = 0;
        buf[4] = PROTOCOL_ID;
        buf[5] = self.profile;
        buf[6] = self.depth;
        buf[7] = self.router_capacity as u8;
    }

    /// Decode and validate: a beacon is only accepted if it carries the
    /// fixed signature bytes and a non-zero depth.
    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < Self::LEN {
            return Err(FrameError::NotEnoughBytes);
        }
        if buf[0..2] != MARKER || buf[2] != 0 || buf[3] != 0 || buf[4] != PROTOCOL_ID {
            return Err(FrameError::IllegalAddressingMode);
        }
        let depth = buf[6];
        if depth == 0 {
            return Err(FrameError::IllegalAddressingMode);
        }
        Ok(Self { profile: buf[5], depth, router_capacity: buf[7] != 0 })
    }
}
