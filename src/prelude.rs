//! Convenience re-exports for embedders wiring up a node.

pub use crate::core::{DeliveredPacket, NetworkCore};
pub use crate::error::UnetError;
pub use crate::mac::{MacEvent, NodeIdentity};
pub use crate::nwk::{NextHop, Origination, RoutingError};
pub use crate::timer::Timer;
pub use crate::{NetConfig, Radio, Role};

pub use ieee802154::mac::{Address, AddressMode, ExtendedAddress, ShortAddress};
