//! UNET: a multi-hop mesh routing core for IEEE 802.15.4-style radios.
//
// https://github.com/rust-iot/rust-lpwan
// Copyright 2021 Ryan Kurte

#![no_std]

#[cfg(test)]
extern crate std;

pub mod timer;

pub mod error;

pub mod stats;

pub mod crc;

pub mod identity;

pub mod channels;

pub mod frame;

pub mod mac;

pub mod nwk;

pub mod tick;

pub mod core;

pub mod prelude;

/// Hop count to the PAN coordinator. 0 on the coordinator itself.
pub type Depth = u8;

/// Depth value meaning "had a route, just lost it, holding an election".
pub const ROUTE_LOST: Depth = 0xFE;
/// Depth value meaning "never had a route".
pub const NO_ROUTE: Depth = 0xFF;

/// Maximum permitted `packet_life` (hop count) before a frame is dropped outright.
pub const NWK_MAX_DEPTH: u8 = 200;

/// Node identity fixed at build time (EUI) plus whatever has been assigned at
/// runtime (short address, PAN id), either persisted, associated, or configured.
#[derive(Clone, Debug, PartialEq)]
pub struct NetConfig {
    pub pan_id: u16,
    pub short_addr: u16,
    pub long_addr: u64,
}

impl NetConfig {
    pub const PAN_UNASSIGNED: u16 = 0xFFFF;
    pub const ADDR_UNASSIGNED: u16 = 0xFFFE;
    pub const ADDR_BROADCAST: u16 = 0xFFFF;

    pub fn is_assigned(&self) -> bool {
        self.short_addr != Self::ADDR_UNASSIGNED && self.pan_id != Self::PAN_UNASSIGNED
    }
}

/// Whether a node is the single PAN coordinator (sink, depth 0) or a router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Coordinator,
    Router,
}

/// Radio interface combining the `radio` crate traits this core depends on.
pub trait Radio<I: radio::ReceiveInfo, E>:
    radio::State<Error = E> + radio::Busy<Error = E> + radio::Transmit<Error = E> + radio::Receive<Info = I, Error = E> + radio::Rssi<Error = E>
{
}

impl<T, I, E> Radio<I, E> for T
where
    T: radio::State<Error = E> + radio::Busy<Error = E> + radio::Transmit<Error = E> + radio::Receive<Info = I, Error = E> + radio::Rssi<Error = E>,
    I: radio::ReceiveInfo,
{
}
