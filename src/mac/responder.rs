//! MAC Responder: association and beacon-request handling.

use log::debug;

use crate::frame::command::AssociationStatus;
use crate::frame::{MacCommand, UnetBeacon};

/// Upper bound of the beacon-request reply jitter, milliseconds.
const BEACON_JITTER_MS: u32 = 34;

/// Deterministic jitter, not a true RNG: mixes time, address, and RSSI
/// rather than drawing from an entropy source, so nodes spread their
/// beacon replies without needing an RNG peripheral.
pub fn beacon_jitter_ms(now_ms: u32, short_addr: u16, last_rssi: i8) -> u32 {
    let mixed = now_ms ^ (short_addr as u32) ^ (last_rssi as u32);
    mixed % BEACON_JITTER_MS
}

/// What the responder wants done next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderAction {
    None,
    /// Reply to a `BEACON_REQUEST` after `delay_ms` of jitter.
    SendBeacon { delay_ms: u32, beacon: UnetBeacon },
    /// Reply to a `DATA_REQUEST` received while associating a requester.
    SendAssociationResponse { short_addr: u16, status: AssociationStatus },
}

/// Owns in-progress association state. Only the coordinator and associated
/// routers run this; leaf nodes never answer association traffic.
pub struct MacResponder {
    association_in_progress: bool,
    requester_eui: Option<u64>,
}

impl MacResponder {
    pub fn new() -> Self {
        Self { association_in_progress: false, requester_eui: None }
    }

    pub fn association_in_progress(&self) -> bool {
        self.association_in_progress
    }

    pub fn requester_eui(&self) -> Option<u64> {
        self.requester_eui
    }

    /// Dispatch one received MAC command. `requester_eui` is the sender's
    /// extended address when the MAC header carried one.
    pub fn handle_command(
        &mut self,
        command: &MacCommand,
        requester_eui: Option<u64>,
        self_depth: u8,
        router_capacity: bool,
        now_ms: u32,
        self_addr: u16,
        last_rssi: i8,
    ) -> ResponderAction {
        match command {
            MacCommand::BeaconRequest => {
                // Only the coordinator and already-associated routers answer;
                // the caller passes `router_capacity = false` for anyone else.
                if !router_capacity {
                    return ResponderAction::None;
                }
                let delay_ms = beacon_jitter_ms(now_ms, self_addr, last_rssi);
                let beacon = UnetBeacon { profile: 0, depth: self_depth, router_capacity };
                ResponderAction::SendBeacon { delay_ms, beacon }
            }
            MacCommand::AssociationRequest { .. } => {
                if !self.association_in_progress {
                    debug!("association request from {:?}", requester_eui);
                    self.association_in_progress = true;
                    self.requester_eui = requester_eui;
                }
                ResponderAction::None
            }
            MacCommand::DataRequest => {
                if self.association_in_progress {
                    // Short-address derivation is the requester's job; the
                    // responder always answers with 0xFFFE.
                    ResponderAction::SendAssociationResponse { short_addr: 0xfffe, status: AssociationStatus::Successful }
                } else {
                    ResponderAction::None
                }
            }
            // ORPHAN_NOTIFICATION, DISASSOCIATION_NOTIFICATION, GTS_REQUEST,
            // PAN_ID_CONFLICT: no-op in this release.
            _ => ResponderAction::None,
        }
    }

    /// The association-response transmit was ACKed: clear the in-progress flag.
    pub fn complete_association(&mut self) {
        self.association_in_progress = false;
        self.requester_eui = None;
    }
}

impl Default for MacResponder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn beacon_request_yields_jittered_beacon() {
        let mut responder = MacResponder::new();
        let action = responder.handle_command(&MacCommand::BeaconRequest, None, 3, true, 1000, 0x0002, -50);
        match action {
            ResponderAction::SendBeacon { delay_ms, beacon } => {
                assert!(delay_ms < BEACON_JITTER_MS);
                assert_eq!(beacon.depth, 3);
                assert!(beacon.router_capacity);
            }
            _ => panic!("expected SendBeacon"),
        }
    }

    #[test]
    fn unassigned_router_does_not_answer_beacon_requests() {
        let mut responder = MacResponder::new();
        let action = responder.handle_command(&MacCommand::BeaconRequest, None, crate::NO_ROUTE, false, 1000, 0x0002, -50);
        assert_eq!(action, ResponderAction::None);
    }

    #[test]
    fn association_request_then_data_request_completes_handshake() {
        let mut responder = MacResponder::new();
        let action = responder.handle_command(&MacCommand::AssociationRequest { capability: 0x80 }, Some(0x1122), 1, true, 0, 0, 0);
        assert_eq!(action, ResponderAction::None);
        assert!(responder.association_in_progress());
        assert_eq!(responder.requester_eui(), Some(0x1122));

        let action = responder.handle_command(&MacCommand::DataRequest, None, 1, true, 0, 0, 0);
        assert_eq!(action, ResponderAction::SendAssociationResponse { short_addr: 0xfffe, status: AssociationStatus::Successful });

        responder.complete_association();
        assert!(!responder.association_in_progress());
    }

    #[test]
    fn data_request_without_association_in_progress_is_ignored() {
        let mut responder = MacResponder::new();
        let action = responder.handle_command(&MacCommand::DataRequest, None, 1, true, 0, 0, 0);
        assert_eq!(action, ResponderAction::None);
    }

    #[test]
    fn orphan_notification_is_a_no_op() {
        let mut responder = MacResponder::new();
        assert_eq!(responder.handle_command(&MacCommand::OrphanNotification, None, 1, true, 0, 0, 0), ResponderAction::None);
    }
}
