//! The MAC header and its explicit addressing-mode decode state machine:
//! frame control, sequence number, and dest/src PAN+address, in that order.
//! Addressing mode `0b01` is reserved and always a parse error; the caller
//! (the MAC parser) continues past the header into payload, CRC, and end.

use ieee802154::mac::{ExtendedAddress, PanId, ShortAddress};

use super::FrameError;

/// 802.15.4-style frame type (3-bit field). Only the four types UNET uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Beacon = 0b000,
    Data = 0b001,
    Ack = 0b010,
    MacCommand = 0b011,
}

impl FrameType {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(FrameType::Beacon),
            0b001 => Some(FrameType::Data),
            0b010 => Some(FrameType::Ack),
            0b011 => Some(FrameType::MacCommand),
            _ => None,
        }
    }
}

/// 2-bit addressing mode field, used independently for source and destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    None = 0b00,
    Reserved = 0b01,
    Short = 0b10,
    Extended = 0b11,
}

impl AddressingMode {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0b00 => AddressingMode::None,
            0b10 => AddressingMode::Short,
            0b11 => AddressingMode::Extended,
            _ => AddressingMode::Reserved,
        }
    }
}

/// A destination or source address, resolved from its addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAddress {
    None,
    Short(ShortAddress),
    Extended(ExtendedAddress),
}

/// The MAC header: frame control bits (flattened) plus resolved addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacHeader {
    pub frame_type: FrameType,
    pub ack_request: bool,
    pub intra_pan: bool,

    pub seq: u8,

    pub dest_pan: PanId,
    pub dest_addr: HeaderAddress,

    pub src_pan: PanId,
    pub src_addr: HeaderAddress,
}

impl MacHeader {
    /// Explicit decode state machine. Returns the decoded header and the
    /// number of bytes consumed, or a [`FrameError`] on any illegal
    /// addressing-mode combination or truncated buffer.
    pub fn decode(buf: &[u8]) -> Result<(MacHeader, usize), FrameError> {
        // start_packet
        if buf.len() < 3 {
            return Err(FrameError::NotEnoughBytes);
        }
        let fc = u16::from_le_bytes([buf[0], buf[1]]);
        let seq = buf[2];
        let mut pos = 3;

        let frame_type = FrameType::from_bits((fc & 0b111) as u8).ok_or(FrameError::IllegalAddressingMode)?;
        let ack_request = (fc >> 5) & 1 != 0;
        let pan_id_compress = (fc >> 6) & 1 != 0;
        let dest_mode = AddressingMode::from_bits(((fc >> 10) & 0b11) as u8);
        let src_mode = AddressingMode::from_bits(((fc >> 14) & 0b11) as u8);

        // dest_mode{00,01,10,11}
        let (dest_pan, dest_addr) = match dest_mode {
            AddressingMode::Reserved => return Err(FrameError::IllegalAddressingMode),
            AddressingMode::None => (PanId::broadcast(), HeaderAddress::None),
            AddressingMode::Short => {
                if buf.len() < pos + 4 {
                    return Err(FrameError::NotEnoughBytes);
                }
                let pan = PanId(u16::from_le_bytes([buf[pos], buf[pos + 1]]));
                let addr = ShortAddress(u16::from_le_bytes([buf[pos + 2], buf[pos + 3]]));
                pos += 4;
                (pan, HeaderAddress::Short(addr))
            }
            AddressingMode::Extended => {
                if buf.len() < pos + 10 {
                    return Err(FrameError::NotEnoughBytes);
                }
                let pan = PanId(u16::from_le_bytes([buf[pos], buf[pos + 1]]));
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[pos + 2..pos + 10]);
                pos += 10;
                (pan, HeaderAddress::Extended(ExtendedAddress(u64::from_le_bytes(raw))))
            }
        };

        // intra_pan: source PAN id is omitted (implied equal to dest PAN) when set.
        // source_000..111: the three bits are (intra_pan, src_mode[1:0]).
        let (src_pan, src_addr) = match (pan_id_compress, src_mode) {
            (_, AddressingMode::Reserved) => return Err(FrameError::IllegalAddressingMode),
            (_, AddressingMode::None) => (dest_pan, HeaderAddress::None),
            (true, AddressingMode::Short) => {
                if buf.len() < pos + 2 {
                    return Err(FrameError::NotEnoughBytes);
                }
                let addr = ShortAddress(u16::from_le_bytes([buf[pos], buf[pos + 1]]));
                pos += 2;
                (dest_pan, HeaderAddress::Short(addr))
            }
            (false, AddressingMode::Short) => {
                if buf.len() < pos + 4 {
                    return Err(FrameError::NotEnoughBytes);
                }
                let pan = PanId(u16::from_le_bytes([buf[pos], buf[pos + 1]]));
                let addr = ShortAddress(u16::from_le_bytes([buf[pos + 2], buf[pos + 3]]));
                pos += 4;
                (pan, HeaderAddress::Short(addr))
            }
            (true, AddressingMode::Extended) => {
                if buf.len() < pos + 8 {
                    return Err(FrameError::NotEnoughBytes);
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[pos..pos + 8]);
                pos += 8;
                (dest_pan, HeaderAddress::Extended(ExtendedAddress(u64::from_le_bytes(raw))))
            }
            (false, AddressingMode::Extended) => {
                if buf.len() < pos + 10 {
                    return Err(FrameError::NotEnoughBytes);
                }
                let pan = PanId(u16::from_le_bytes([buf[pos], buf[pos + 1]]));
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[pos + 2..pos + 10]);
                pos += 10;
                (pan, HeaderAddress::Extended(ExtendedAddress(u64::from_le_bytes(raw))))
            }
        };

        let header = MacHeader { frame_type, ack_request, intra_pan: pan_id_compress, seq, dest_pan, dest_addr, src_pan, src_addr };

        Ok((header, pos))
    }

    /// Encode into `buf`, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> usize {
        let dest_mode = match self.dest_addr {
            HeaderAddress::None => AddressingMode::None,
            HeaderAddress::Short(_) => AddressingMode::Short,
            HeaderAddress::Extended(_) => AddressingMode::Extended,
        };
        let src_mode = match self.src_addr {
            HeaderAddress::None => AddressingMode::None,
            HeaderAddress::Short(_) => AddressingMode::Short,
            HeaderAddress::Extended(_) => AddressingMode::Extended,
        };

        let mut fc: u16 = self.frame_type as u16;
        if self.ack_request {
            fc |= 1 << 5;
        }
        if self.intra_pan {
            fc |= 1 << 6;
        }
        fc |= (dest_mode as u16) << 10;
        fc |= (src_mode as u16) << 14;

        let fc_bytes = fc.to_le_bytes();
        buf[0] = fc_bytes[0];
        buf[1] = fc_bytes[1];
        buf[2] = self.seq;
        let mut pos = 3;

        match self.dest_addr {
            HeaderAddress::None => (),
            HeaderAddress::Short(addr) => {
                buf[pos..pos + 2].copy_from_slice(&self.dest_pan.0.to_le_bytes());
                buf[pos + 2..pos + 4].copy_from_slice(&addr.0.to_le_bytes());
                pos += 4;
            }
            HeaderAddress::Extended(addr) => {
                buf[pos..pos + 2].copy_from_slice(&self.dest_pan.0.to_le_bytes());
                buf[pos + 2..pos + 10].copy_from_slice(&addr.0.to_le_bytes());
                pos += 10;
            }
        }

        match self.src_addr {
            HeaderAddress::None => (),
            HeaderAddress::Short(addr) => {
                if !self.intra_pan {
                    buf[pos..pos + 2].copy_from_slice(&self.src_pan.0.to_le_bytes());
                    pos += 2;
                }
                buf[pos..pos + 2].copy_from_slice(&addr.0.to_le_bytes());
                pos += 2;
            }
            HeaderAddress::Extended(addr) => {
                if !self.intra_pan {
                    buf[pos..pos + 2].copy_from_slice(&self.src_pan.0.to_le_bytes());
                    pos += 2;
                }
                buf[pos..pos + 8].copy_from_slice(&addr.0.to_le_bytes());
                pos += 8;
            }
        }

        pos
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample() -> MacHeader {
        MacHeader {
            frame_type: FrameType::Data,
            ack_request: true,
            intra_pan: true,
            seq: 7,
            dest_pan: PanId(0x4742),
            dest_addr: HeaderAddress::Short(ShortAddress(0x0001)),
            src_pan: PanId(0x4742),
            src_addr: HeaderAddress::Short(ShortAddress(0x0002)),
        }
    }

    #[test]
    fn round_trips_short_intra_pan() {
        let header = sample();
        let mut buf = [0u8; 64];
        let n = header.encode(&mut buf);

        let (decoded, used) = MacHeader::decode(&buf[..n]).unwrap();
        assert_eq!(used, n);
        assert_eq!(decoded, header);
    }

    #[test]
    fn round_trips_extended_inter_pan() {
        let mut header = sample();
        header.intra_pan = false;
        header.dest_addr = HeaderAddress::Extended(ExtendedAddress(0x1122_3344_5566_7788));
        header.src_addr = HeaderAddress::Extended(ExtendedAddress(0x8877_6655_4433_2211));
        header.src_pan = PanId(0x0001);

        let mut buf = [0u8; 64];
        let n = header.encode(&mut buf);

        let (decoded, used) = MacHeader::decode(&buf[..n]).unwrap();
        assert_eq!(used, n);
        assert_eq!(decoded, header);
    }

    #[test]
    fn reserved_dest_mode_is_rejected() {
        // Frame control with dest addressing mode bits set to 0b01 (reserved).
        let fc: u16 = (FrameType::Data as u16) | (0b01 << 10);
        let buf = [fc.to_le_bytes()[0], fc.to_le_bytes()[1], 0];
        assert_eq!(MacHeader::decode(&buf), Err(FrameError::IllegalAddressingMode));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        assert_eq!(MacHeader::decode(&[0, 0]), Err(FrameError::NotEnoughBytes));
    }
}
