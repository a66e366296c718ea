//! MAC command frames handled by the MAC Responder and by the association
//! bootstrap. Command IDs follow the standard IEEE 802.15.4 MAC command
//! frame identifiers.

use super::FrameError;

/// Result status carried in an `AssociationResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationStatus {
    Successful,
    PanAtCapacity,
    PanAccessDenied,
}

impl AssociationStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0x00 => AssociationStatus::Successful,
            0x01 => AssociationStatus::PanAtCapacity,
            _ => AssociationStatus::PanAccessDenied,
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            AssociationStatus::Successful => 0x00,
            AssociationStatus::PanAtCapacity => 0x01,
            AssociationStatus::PanAccessDenied => 0x02,
        }
    }
}

/// MAC command frame content. The requester's 64-bit EUI for
/// `AssociationRequest` is carried in the MAC header's extended source
/// address, not duplicated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacCommand {
    AssociationRequest { capability: u8 },
    AssociationResponse { short_addr: u16, status: AssociationStatus },
    DisassociationNotification,
    DataRequest,
    PanIdConflictNotification,
    OrphanNotification,
    BeaconRequest,
    GtsRequest,
}

impl MacCommand {
    const ID_ASSOCIATION_REQUEST: u8 = 0x01;
    const ID_ASSOCIATION_RESPONSE: u8 = 0x02;
    const ID_DISASSOCIATION_NOTIFICATION: u8 = 0x03;
    const ID_DATA_REQUEST: u8 = 0x04;
    const ID_PAN_ID_CONFLICT_NOTIFICATION: u8 = 0x05;
    const ID_ORPHAN_NOTIFICATION: u8 = 0x06;
    const ID_BEACON_REQUEST: u8 = 0x07;
    const ID_GTS_REQUEST: u8 = 0x09;

    pub fn encode(&self, buf: &mut [u8]) -> usize {
        match *self {
            MacCommand::AssociationRequest { capability } => {
                buf[0] = Self::ID_ASSOCIATION_REQUEST;
                buf[1] = capability;
                2
            }
            MacCommand::AssociationResponse { short_addr, status } => {
                buf[0] = Self::ID_ASSOCIATION_RESPONSE;
                buf[1..3].copy_from_slice(&short_addr.to_le_bytes());
                buf[3] = status.to_u8();
                4
            }
            MacCommand::DisassociationNotification => {
                buf[0] = Self::ID_DISASSOCIATION_NOTIFICATION;
                1
            }
            MacCommand::DataRequest => {
                buf[0] = Self::ID_DATA_REQUEST;
                1
            }
            MacCommand::PanIdConflictNotification => {
                buf[0] = Self::ID_PAN_ID_CONFLICT_NOTIFICATION;
                1
            }
            MacCommand::OrphanNotification => {
                buf[0] = Self::ID_ORPHAN_NOTIFICATION;
                1
            }
            MacCommand::BeaconRequest => {
                buf[0] = Self::ID_BEACON_REQUEST;
                1
            }
            MacCommand::GtsRequest => {
                buf[0] = Self::ID_GTS_REQUEST;
                1
            }
        }
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), FrameError> {
        if buf.is_empty() {
            return Err(FrameError::NotEnoughBytes);
        }
        match buf[0] {
            Self::ID_ASSOCIATION_REQUEST => {
                if buf.len() < 2 {
                    return Err(FrameError::NotEnoughBytes);
                }
                Ok((MacCommand::AssociationRequest { capability: buf[1] }, 2))
            }
            Self::ID_ASSOCIATION_RESPONSE => {
                if buf.len() < 4 {
                    return Err(FrameError::NotEnoughBytes);
                }
                let short_addr = u16::from_le_bytes([buf[1], buf[2]]);
                Ok((MacCommand::AssociationResponse { short_addr, status: AssociationStatus::from_u8(buf[3]) }, 4))
            }
            Self::ID_DISASSOCIATION_NOTIFICATION => Ok((MacCommand::DisassociationNotification, 1)),
            Self::ID_DATA_REQUEST => Ok((MacCommand::DataRequest, 1)),
            Self::ID_PAN_ID_CONFLICT_NOTIFICATION => Ok((MacCommand::PanIdConflictNotification, 1)),
            Self::ID_ORPHAN_NOTIFICATION => Ok((MacCommand::OrphanNotification, 1)),
            Self::ID_BEACON_REQUEST => Ok((MacCommand::BeaconRequest, 1)),
            Self::ID_GTS_REQUEST => Ok((MacCommand::GtsRequest, 1)),
            _ => Err(FrameError::IllegalAddressingMode),
        }
    }
}
