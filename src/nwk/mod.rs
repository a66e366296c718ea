//! The NWK Router: neighbor table, up-route cache, depth maintenance, and
//! the routing state machine.

pub mod neighbor;
pub mod uproute;
pub mod select;
pub mod router;

pub use neighbor::{NeighborEntry, NeighborFlags, NeighborTable};
pub use uproute::{UpRouteCache, UpRouteEntry};
pub use router::{NextHop, NwkRouter, Origination, PingOutcome, RouteAction, RoutingError};

/// `NEIGHBOR_PING_TIME` base period, milliseconds.
pub const NEIGHBOR_PING_TIME_MS: u32 = 1000;
/// Ping period cap multiplier.
pub const MAX_PING_TIME: u32 = 8;
/// Redundant-ping spacing, milliseconds.
pub const PING_TIME_MS: u32 = 10;
/// Redundant pings emitted per scheduling period.
pub const PING_RETRIES: u8 = 3;
/// Per-hop TX-complete wait, milliseconds.
pub const TX_TIMEOUT_MS: u32 = 50;
/// Number of retries per origination before the candidate is blacklisted.
pub const NWK_TX_RETRIES: u8 = 3;
/// Association response wait, milliseconds.
pub const A_RESPONSE_WAIT_TIME_MS: u32 = 492;
/// Radio watchdog timeout, milliseconds.
pub const RADIO_WATCHDOG_TIMEOUT_MS: u32 = 15_000;
/// Depth watchdog timeout, milliseconds.
pub const DEPTH_TIMEOUT_MS: u32 = 20_000;
