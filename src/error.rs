//! Typed error codes for every layer of the stack. There is no exception
//! mechanism; every fallible operation returns a `Result`.

use crate::frame::FrameError;

/// Errors produced by the UNET core, generic over the underlying radio's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum UnetError<E> {
    /// Origination requested a payload larger than the remaining budget.
    PayloadOverflow,

    /// No parent (down-route) or no up-cache entry (up-route) is available.
    NoRouteAvailable,

    /// All retries to one neighbor failed; the caller blacklisted it and may retry another.
    RouteNodeError,

    /// Every candidate neighbor has been blacklisted for this origination.
    RouteAttemptsError,

    /// `packet_life` exceeded `NWK_MAX_DEPTH`; frame dropped silently (counter bumped).
    PacketLifeError,

    /// A malformed frame reached the routing state machine.
    RouteFrameError,

    /// Frame decode failed structurally (bad addressing mode, truncated buffer, bad CRC).
    Frame(FrameError),

    /// The shared RX FIFO had no room for an inbound frame.
    BufferFull,

    /// A TX-complete/ACK wait exceeded its deadline; the radio is assumed wedged.
    TxTimeout,

    /// The radio was still busy completing a previous operation.
    Busy,

    /// Wrapper for unhandled / underlying radio errors.
    Radio(E),
}

impl<E> From<FrameError> for UnetError<E> {
    fn from(e: FrameError) -> Self {
        UnetError::Frame(e)
    }
}

impl<E> From<crate::nwk::RoutingError> for UnetError<E> {
    fn from(e: crate::nwk::RoutingError) -> Self {
        match e {
            crate::nwk::RoutingError::NoRouteAvailable => UnetError::NoRouteAvailable,
            crate::nwk::RoutingError::RouteNodeError => UnetError::RouteNodeError,
            crate::nwk::RoutingError::RouteAttemptsError => UnetError::RouteAttemptsError,
            crate::nwk::RoutingError::PayloadOverflow => UnetError::PayloadOverflow,
        }
    }
}

impl<E> UnetError<E> {
    /// True for errors that should bump a drop counter but never propagate to the caller
    /// of an origination API (they are swallowed by the routing state machine).
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, UnetError::PacketLifeError | UnetError::RouteFrameError | UnetError::Frame(_))
    }
}
