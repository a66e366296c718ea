//! On-air frame layout and the explicit addressing-mode decode state
//! machine: MAC header, NWK/APP headers, beacon and command payloads, all
//! encoded and decoded with explicit shift/mask code rather than bit-field
//! unions.

pub mod header;
pub mod nwk;
pub mod beacon;
pub mod command;
pub mod packet;

pub use header::{AddressingMode, FrameType, MacHeader};
pub use nwk::{Direction, NwkFlags, NwkHeader, AppHeader, PacketType};
pub use beacon::UnetBeacon;
pub use command::MacCommand;
pub use packet::Frame;

/// Errors produced while decoding an on-air frame. Any of these causes the
/// MAC parser to increment `dropped` and discard the remainder of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer bytes were available than the header/payload/footer required.
    NotEnoughBytes,
    /// Addressing mode 0b01 (reserved) was used, or an otherwise illegal
    /// dest/src addressing-mode combination was encountered.
    IllegalAddressingMode,
    /// The payload exceeded the 123-byte on-air cap.
    PayloadTooLarge,
    /// The computed CRC did not match the on-air CRC.
    CrcMismatch,
}

/// Maximum MAC payload length (127 on-air minus 2B frame control, 1B seq,
/// minimum 2B addressing, 2B CRC).
pub const MAX_MAC_PAYLOAD: usize = 123;
