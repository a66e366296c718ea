//! NWK and APP headers carried inside the MAC payload: a fixed 7-byte NWK
//! header followed by an optional fixed 4-byte APP header.

use bitflags::bitflags;

use super::FrameError;

bitflags! {
    /// Parameter flag bits of the NWK header.
    pub struct NwkFlags: u8 {
        const DEST      = 0b0001;
        const DIRECTION = 0b0010;
        const BROADCAST = 0b1000;
    }
}

/// Forwarding direction, encoded across the `DEST`/`DIRECTION` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// `NOT_DEST_UP = 0b0000`: in transit, heading away from the coordinator.
    NotDestUp,
    /// `NOT_DEST_DOWN = 0b0010`: in transit, heading toward the coordinator.
    NotDestDown,
    /// `DEST_UP = 0b0001`: this node is the destination, packet came from upstream.
    DestUp,
    /// `DEST_DOWN = 0b0011`: this node is the destination, packet came from downstream.
    DestDown,
}

impl Direction {
    pub fn from_flags(flags: NwkFlags) -> Self {
        match (flags.contains(NwkFlags::DEST), flags.contains(NwkFlags::DIRECTION)) {
            (false, false) => Direction::NotDestUp,
            (false, true) => Direction::NotDestDown,
            (true, false) => Direction::DestUp,
            (true, true) => Direction::DestDown,
        }
    }

    pub fn is_dest(&self) -> bool {
        matches!(self, Direction::DestUp | Direction::DestDown)
    }

    /// True when the frame should continue moving toward the coordinator.
    pub fn is_down(&self) -> bool {
        matches!(self, Direction::NotDestDown | Direction::DestDown)
    }
}

/// The four kinds of NWK-layer frame this stack exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    DataPing = 0,
    Broadcast = 1,
    Route = 2,
    Address = 3,
}

impl PacketType {
    fn from_u8(v: u8) -> Result<Self, FrameError> {
        match v {
            0 => Ok(PacketType::DataPing),
            1 => Ok(PacketType::Broadcast),
            2 => Ok(PacketType::Route),
            3 => Ok(PacketType::Address),
            _ => Err(FrameError::IllegalAddressingMode),
        }
    }
}

/// 7-byte NWK header: `packet_type, parameter_flags, destination_short(2),
/// source_short(2), packet_life`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NwkHeader {
    pub packet_type: PacketType,
    pub flags: NwkFlags,
    pub destination: u16,
    pub source: u16,
    pub packet_life: u8,
}

impl NwkHeader {
    pub const LEN: usize = 7;

    pub fn direction(&self) -> Direction {
        Direction::from_flags(self.flags)
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.packet_type as u8;
        buf[1] = self.flags.bits();
        buf[2..4].copy_from_slice(&self.destination.to_le_bytes());
        buf[4..6].copy_from_slice(&self.source.to_le_bytes());
        buf[6] = self.packet_life;
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < Self::LEN {
            return Err(FrameError::NotEnoughBytes);
        }
        Ok(Self {
            packet_type: PacketType::from_u8(buf[0])?,
            flags: NwkFlags::from_bits_truncate(buf[1]),
            destination: u16::from_le_bytes([buf[2], buf[3]]),
            source: u16::from_le_bytes([buf[4], buf[5]]),
            packet_life: buf[6],
        })
    }
}

/// 4-byte APP header: `task_id, profile, command, attribute`. Profiles and
/// commands are a small closed numeric enumeration owned by the embedding
/// application; this crate only carries the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppHeader {
    pub task_id: u8,
    pub profile: u8,
    pub command: u8,
    pub attribute: u8,
}

impl AppHeader {
    pub const LEN: usize = 4;

    pub fn encode(&self, buf: &mut [u8]) {
        buf[0] = self.task_id;
        buf[1] = self.profile;
        buf[2] = self.command;
        buf[3] = self.attribute;
    }

    pub fn decode(buf: &[u8]) -> Result<Self, FrameError> {
        if buf.len() < Self::LEN {
            return Err(FrameError::NotEnoughBytes);
        }
        Ok(Self { task_id: buf[0], profile: buf[1], command: buf[2], attribute: buf[3] })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn nwk_header_round_trip() {
        let header = NwkHeader {
            packet_type: PacketType::Route,
            flags: NwkFlags::DEST | NwkFlags::DIRECTION,
            destination: 0x0001,
            source: 0x00aa,
            packet_life: 3,
        };
        let mut buf = [0u8; NwkHeader::LEN];
        header.encode(&mut buf);
        assert_eq!(NwkHeader::decode(&buf).unwrap(), header);
        assert_eq!(header.direction(), Direction::DestDown);
    }

    #[test]
    fn direction_decoding() {
        assert_eq!(Direction::from_flags(NwkFlags::empty()), Direction::NotDestUp);
        assert_eq!(Direction::from_flags(NwkFlags::DIRECTION), Direction::NotDestDown);
        assert_eq!(Direction::from_flags(NwkFlags::DEST), Direction::DestUp);
        assert_eq!(Direction::from_flags(NwkFlags::DEST | NwkFlags::DIRECTION), Direction::DestDown);
    }

    #[test]
    fn app_header_round_trip() {
        let header = AppHeader { task_id: 1, profile: 2, command: 3, attribute: 4 };
        let mut buf = [0u8; AppHeader::LEN];
        header.encode(&mut buf);
        assert_eq!(AppHeader::decode(&buf).unwrap(), header);
    }
}
