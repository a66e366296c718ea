//! The NWK Router: origination, in-transit routing, neighbor ping
//! ingestion, and depth maintenance, tied together over a [`NeighborTable`]
//! and [`UpRouteCache`] owned by one struct with plain methods, not a
//! blocking RTOS task.

use heapless::{consts::U16, Vec};
use log::{debug, warn};

use crate::frame::{NwkFlags, NwkHeader, PacketType};
use crate::{Depth, ROUTE_LOST};

use super::neighbor::{NeighborFlags, NeighborTable, RSSI_THRESHOLD};
use super::select::{select_down_hop, update_depth};
use super::uproute::UpRouteCache;
use crate::frame::packet::PingPayload;

/// Errors specific to route origination and selection: the subset that
/// originates in the NWK layer rather than the radio/MAC layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingError {
    NoRouteAvailable,
    RouteNodeError,
    RouteAttemptsError,
    PayloadOverflow,
}

/// One of the four outbound origination kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origination {
    /// Forward toward the coordinator.
    DownRoute,
    /// Forward toward a specific destination via the reactive up-cache.
    ReactiveUpRoute { destination: u16 },
    /// Direct send to a symmetric neighbor.
    OneHopRoute { destination: u16 },
    /// Flood to every neighbor at `depth + 1`.
    UpBroadcastRoute,
}

/// The next hop an origination should transmit to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextHop {
    Unicast { neighbor_slot: usize, dest_addr: u16 },
    Broadcast,
}

/// Outcome of evaluating an in-transit routed frame against the routing
/// state machine. The caller is responsible for actually driving the
/// indicated next step; this is a pure classification over router state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    /// `packet_life` would exceed `NWK_MAX_DEPTH`: drop silently, bump counter.
    Drop,
    /// `NWK_BROADCAST` is set: forward via `UpBroadcastRoute`, then deliver locally.
    Broadcast,
    /// This node is the named destination: deliver to the application layer.
    CallAppLayer,
    /// The destination is a symmetric neighbor: send directly.
    SendDirect { neighbor_slot: usize },
    /// Not a direct neighbor, heading away from the coordinator: re-originate up.
    RouteUp { destination: u16 },
    /// Not a direct neighbor, heading toward the coordinator: re-originate down.
    RouteDown,
}

/// Result of ingesting one `DATA_PING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingOutcome {
    /// This node's own short address appeared more than once in the ping's
    /// neighbor list: evidence of a duplicate MAC. The caller re-randomizes
    /// its short address (needs an RNG this module does not own).
    pub duplicate_mac: bool,
    /// The neighbor's link was (re)confirmed symmetric by this ping.
    pub became_symmetric: bool,
}

/// Owns the neighbor table, up-route cache, and this node's depth/parent
/// state.
pub struct NwkRouter<const NEIGH: usize, const UP: usize> {
    pub neighbors: NeighborTable<NEIGH>,
    pub up_routes: UpRouteCache<UP>,
    pub depth: Depth,
    pub parent: Option<u16>,
    pub self_addr: u16,
    seq: u8,
    depth_watchdog: u32,
}

impl<const NEIGH: usize, const UP: usize> NwkRouter<NEIGH, UP> {
    pub fn new(self_addr: u16) -> Self {
        Self {
            neighbors: NeighborTable::new(),
            up_routes: UpRouteCache::new(),
            depth: crate::NO_ROUTE,
            parent: None,
            self_addr,
            seq: 0,
            depth_watchdog: 0,
        }
    }

    /// Advance `SequenceNumber`, wrapping `0 -> 1`: sequence 0 is reserved.
    pub fn next_seq(&mut self) -> u8 {
        self.seq = self.seq.wrapping_add(1);
        if self.seq == 0 {
            self.seq = 1;
        }
        self.seq
    }

    /// Resolve an [`Origination`] to the next hop it should transmit to.
    /// `blacklist` is a per-origination retry bitmap owned by the caller,
    /// not by the router.
    pub fn next_hop_for(&self, origination: Origination, blacklist: u32) -> Result<NextHop, RoutingError> {
        match origination {
            Origination::DownRoute => {
                let slot = select_down_hop(&self.neighbors, self.depth, blacklist).map_err(|_| RoutingError::NoRouteAvailable)?;
                let slot = slot.ok_or(RoutingError::RouteAttemptsError)?;
                let dest_addr = self.neighbors.slots()[slot].short_addr;
                Ok(NextHop::Unicast { neighbor_slot: slot, dest_addr })
            }
            Origination::ReactiveUpRoute { destination } => {
                let entry = self.up_routes.find(destination).ok_or(RoutingError::NoRouteAvailable)?;
                match self.neighbors.find(entry.next_hop) {
                    Some(slot) => Ok(NextHop::Unicast { neighbor_slot: slot, dest_addr: entry.next_hop }),
                    // Next hop has since aged out of the neighbor table: the
                    // cache entry is stale, treat it as no route.
                    None => Err(RoutingError::NoRouteAvailable),
                }
            }
            Origination::OneHopRoute { destination } => {
                let slot = self.neighbors.find(destination).ok_or(RoutingError::NoRouteAvailable)?;
                if !self.neighbors.slots()[slot].is_symmetric() {
                    return Err(RoutingError::NoRouteAvailable);
                }
                Ok(NextHop::Unicast { neighbor_slot: slot, dest_addr: destination })
            }
            Origination::UpBroadcastRoute => Ok(NextHop::Broadcast),
        }
    }

    /// Build the NWK header for a fresh origination: type `ROUTE_PACKET` (or
    /// `BROADCAST`), destination, source set to this node, `packet_life`
    /// starting at 0.
    pub fn build_header(&mut self, destination: u16, direction_down: bool, broadcast: bool) -> NwkHeader {
        let mut flags = NwkFlags::empty();
        if direction_down {
            flags.insert(NwkFlags::DIRECTION);
        }
        if broadcast {
            flags.insert(NwkFlags::BROADCAST);
        }
        NwkHeader {
            packet_type: if broadcast { PacketType::Broadcast } else { PacketType::Route },
            flags,
            destination,
            source: self.self_addr,
            packet_life: 0,
        }
    }

    /// Record an entry in the reactive up-route cache from a frame
    /// observed in transit.
    pub fn record_forward(&mut self, source: u16, mac_source: u16, packet_life: u8) {
        self.up_routes.record(source, mac_source, packet_life);
    }

    /// Evaluate an in-transit routed frame against the routing state
    /// machine. Dedup against `last_seq`/`seq_ttl` is the MAC Parser's job
    /// (it already ran before this frame reached the router); this only
    /// handles neighbor-table lookup and direction classification.
    pub fn route_packet(&mut self, nwk: &NwkHeader, mac_source: u16) -> RouteAction {
        if nwk.packet_life as u16 + 1 > crate::NWK_MAX_DEPTH as u16 {
            warn!("dropping frame from {:#06x}: packet_life exceeded", nwk.source);
            return RouteAction::Drop;
        }

        self.record_forward(nwk.source, mac_source, nwk.packet_life);

        if nwk.flags.contains(NwkFlags::BROADCAST) {
            return RouteAction::Broadcast;
        }

        let direction = nwk.direction();
        if direction.is_dest() {
            return RouteAction::CallAppLayer;
        }

        if let Some(slot) = self.neighbors.find(nwk.destination) {
            if self.neighbors.slots()[slot].is_symmetric() {
                return RouteAction::SendDirect { neighbor_slot: slot };
            }
        }

        if direction.is_down() {
            RouteAction::RouteDown
        } else {
            RouteAction::RouteUp { destination: nwk.destination }
        }
    }

    /// Assemble this node's outgoing ping payload: own depth, then every
    /// live neighbor's `(short_addr, rssi)`, capped at the ping payload's
    /// 16-entry budget.
    pub fn build_ping(&self) -> PingPayload {
        let mut neighbors: Vec<(u16, i8), U16> = Vec::new();
        for entry in self.neighbors.iter() {
            if neighbors.push((entry.short_addr, entry.rssi)).is_err() {
                break;
            }
        }
        PingPayload { depth: self.depth, neighbors }
    }

    /// Ingest one received `DATA_PING`: insert-or-refresh the sender's entry
    /// with exponentially-smoothed RSSI `(old*7 + new) / 8`, copy its depth,
    /// scan the ping's neighbor list for this node's own address
    /// (symmetric-link confirmation, duplicate-MAC detection), then rerun
    /// depth maintenance.
    pub fn handle_ping(&mut self, src_addr: u16, measured_rssi: i8, ping: &PingPayload) -> PingOutcome {
        let slot = match self.neighbors.find_or_insert(src_addr) {
            Some(s) => s,
            None => return PingOutcome::default(),
        };

        {
            let entry = &mut self.neighbors.slots_mut()[slot];
            entry.rssi = if entry.rssi == i8::MIN { measured_rssi } else { (((entry.rssi as i16) * 7 + measured_rssi as i16) / 8) as i8 };
            entry.depth = ping.depth;
            // Re-proven on every ping, not sticky: a link confirmed
            // symmetric last cycle but not this one must stop counting as one.
            entry.flags.remove(NeighborFlags::SYMMETRIC);
        }
        self.neighbors.mark_active(slot);

        let mut outcome = PingOutcome::default();
        let mut self_seen = 0u8;
        for &(addr, reported_rssi) in ping.neighbors.iter() {
            if addr == self.self_addr {
                self_seen += 1;
                if self_seen > 1 {
                    warn!("duplicate short address {:#06x} seen in neighbor {:#06x}'s ping", self.self_addr, src_addr);
                    outcome.duplicate_mac = true;
                }
                if measured_rssi > RSSI_THRESHOLD && reported_rssi > RSSI_THRESHOLD {
                    self.neighbors.slots_mut()[slot].flags.insert(NeighborFlags::SYMMETRIC);
                    outcome.became_symmetric = true;
                }
            }
        }

        self.refresh_depth();
        outcome
    }

    /// Rerun depth maintenance over the current table, updating
    /// `depth`/`parent` in place. Returns whether either changed.
    pub fn refresh_depth(&mut self) -> bool {
        let (depth, parent) = update_depth(&self.neighbors, self.depth, self.parent);
        let changed = depth != self.depth || parent != self.parent;
        self.depth = depth;
        self.parent = parent;
        changed
    }

    /// The aging sweep evicted the current parent: drop to `ROUTE_LOST`,
    /// arm the depth watchdog, then immediately rerun depth maintenance in
    /// case another candidate is already in the table.
    pub fn on_parent_lost(&mut self) {
        debug!("parent lost, depth reset to ROUTE_LOST");
        self.depth = ROUTE_LOST;
        self.parent = None;
        self.depth_watchdog = 0;
        self.refresh_depth();
    }

    /// Depth-watchdog tick: a monotonic counter sampled via
    /// `depth_watchdog()`, reset whenever a parent is held.
    pub fn tick_depth_watchdog(&mut self) {
        if self.parent.is_some() {
            self.depth_watchdog = 0;
        } else {
            self.depth_watchdog = self.depth_watchdog.saturating_add(1);
        }
    }

    pub fn depth_watchdog(&self) -> u32 {
        self.depth_watchdog
    }

    /// Periodic aging sweep over both tables. Handles parent loss and
    /// reruns depth maintenance.
    pub fn age_sweep(&mut self) {
        if self.neighbors.age_sweep(self.parent) {
            self.on_parent_lost();
        } else {
            self.refresh_depth();
        }
        self.up_routes.age_sweep();
    }

    pub fn tick_dedup_ttls(&mut self) {
        self.neighbors.tick_dedup_ttls();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn router_with_parent() -> NwkRouter<8, 8> {
        let mut r: NwkRouter<8, 8> = NwkRouter::new(0x0002);
        let slot = r.neighbors.find_or_insert(0x0001).unwrap();
        let e = &mut r.neighbors.slots_mut()[slot];
        e.depth = 0;
        e.rssi = -40;
        e.flags.insert(NeighborFlags::SYMMETRIC);
        r.refresh_depth();
        r
    }

    #[test]
    fn sequence_number_skips_zero() {
        let mut r: NwkRouter<4, 4> = NwkRouter::new(1);
        r.seq = 0xff;
        assert_eq!(r.next_seq(), 1);
    }

    #[test]
    fn down_route_selects_lowest_depth_neighbor() {
        let r = router_with_parent();
        let hop = r.next_hop_for(Origination::DownRoute, 0).unwrap();
        assert_eq!(hop, NextHop::Unicast { neighbor_slot: 0, dest_addr: 0x0001 });
    }

    #[test]
    fn down_route_fails_with_no_route() {
        let r: NwkRouter<4, 4> = NwkRouter::new(1);
        assert_eq!(r.next_hop_for(Origination::DownRoute, 0), Err(RoutingError::NoRouteAvailable));
    }

    #[test]
    fn reactive_up_route_uses_cache() {
        let mut r = router_with_parent();
        let leaf_slot = r.neighbors.find_or_insert(0x0003).unwrap();
        r.neighbors.slots_mut()[leaf_slot].flags.insert(NeighborFlags::SYMMETRIC);
        r.up_routes.record(0x0010, 0x0003, 0);

        let hop = r.next_hop_for(Origination::ReactiveUpRoute { destination: 0x0010 }, 0).unwrap();
        assert_eq!(hop, NextHop::Unicast { neighbor_slot: leaf_slot, dest_addr: 0x0003 });
    }

    #[test]
    fn one_hop_route_requires_symmetric_neighbor() {
        let mut r: NwkRouter<4, 4> = NwkRouter::new(1);
        let slot = r.neighbors.find_or_insert(0x0005).unwrap();
        assert_eq!(r.next_hop_for(Origination::OneHopRoute { destination: 0x0005 }, 0), Err(RoutingError::NoRouteAvailable));

        r.neighbors.slots_mut()[slot].flags.insert(NeighborFlags::SYMMETRIC);
        assert_eq!(
            r.next_hop_for(Origination::OneHopRoute { destination: 0x0005 }, 0).unwrap(),
            NextHop::Unicast { neighbor_slot: slot, dest_addr: 0x0005 }
        );
    }

    #[test]
    fn broadcast_frame_is_forwarded_and_delivered_locally() {
        let mut r = router_with_parent();
        let nwk = NwkHeader { packet_type: PacketType::Broadcast, flags: NwkFlags::BROADCAST, destination: 0xffff, source: 0x0099, packet_life: 0 };
        assert_eq!(r.route_packet(&nwk, 0x0001), RouteAction::Broadcast);
    }

    #[test]
    fn packet_life_overflow_is_dropped() {
        let mut r = router_with_parent();
        let nwk = NwkHeader { packet_type: PacketType::Route, flags: NwkFlags::empty(), destination: 0x0002, source: 0x0099, packet_life: 200 };
        assert_eq!(r.route_packet(&nwk, 0x0001), RouteAction::Drop);
    }

    #[test]
    fn frame_addressed_to_self_goes_to_app_layer() {
        let mut r = router_with_parent();
        let nwk = NwkHeader { packet_type: PacketType::Route, flags: NwkFlags::DEST, destination: 0x0002, source: 0x0099, packet_life: 1 };
        assert_eq!(r.route_packet(&nwk, 0x0001), RouteAction::CallAppLayer);
    }

    #[test]
    fn frame_for_symmetric_neighbor_sends_direct() {
        let mut r = router_with_parent();
        let leaf_slot = r.neighbors.find_or_insert(0x0003).unwrap();
        r.neighbors.slots_mut()[leaf_slot].flags.insert(NeighborFlags::SYMMETRIC);

        let nwk = NwkHeader { packet_type: PacketType::Route, flags: NwkFlags::DIRECTION, destination: 0x0003, source: 0x0099, packet_life: 1 };
        assert_eq!(r.route_packet(&nwk, 0x0001), RouteAction::SendDirect { neighbor_slot: leaf_slot });
    }

    #[test]
    fn upbound_frame_with_no_direct_neighbor_routes_up() {
        let mut r = router_with_parent();
        let nwk = NwkHeader { packet_type: PacketType::Route, flags: NwkFlags::empty(), destination: 0x0044, source: 0x0099, packet_life: 1 };
        assert_eq!(r.route_packet(&nwk, 0x0001), RouteAction::RouteUp { destination: 0x0044 });
    }

    #[test]
    fn downbound_frame_with_no_direct_neighbor_routes_down() {
        let mut r = router_with_parent();
        let nwk = NwkHeader { packet_type: PacketType::Route, flags: NwkFlags::DIRECTION, destination: 0x0044, source: 0x0099, packet_life: 1 };
        assert_eq!(r.route_packet(&nwk, 0x0001), RouteAction::RouteDown);
    }

    #[test]
    fn ping_ingestion_smooths_rssi_and_confirms_symmetry() {
        let mut r: NwkRouter<4, 4> = NwkRouter::new(0x0002);
        let mut neighbors = Vec::new();
        neighbors.push((0x0002, -60)).unwrap();
        let ping = PingPayload { depth: 0, neighbors };

        let outcome = r.handle_ping(0x0001, -50, &ping);
        assert!(outcome.became_symmetric);
        assert!(!outcome.duplicate_mac);

        let slot = r.neighbors.find(0x0001).unwrap();
        assert_eq!(r.neighbors.slots()[slot].rssi, -50);
        assert_eq!(r.depth, 1);
        assert_eq!(r.parent, Some(0x0001));
    }

    #[test]
    fn symmetric_flag_is_cleared_if_not_reconfirmed_this_cycle() {
        let mut r: NwkRouter<4, 4> = NwkRouter::new(0x0002);
        let mut neighbors = Vec::new();
        neighbors.push((0x0002, -60)).unwrap();
        let ping = PingPayload { depth: 0, neighbors };
        r.handle_ping(0x0001, -50, &ping);
        let slot = r.neighbors.find(0x0001).unwrap();
        assert!(r.neighbors.slots()[slot].is_symmetric());

        // A later ping that no longer lists us at all must un-mark the link.
        let ping = PingPayload { depth: 0, neighbors: Vec::new() };
        r.handle_ping(0x0001, -50, &ping);
        assert!(!r.neighbors.slots()[slot].is_symmetric());
    }

    #[test]
    fn ping_ingestion_detects_duplicate_mac() {
        let mut r: NwkRouter<4, 4> = NwkRouter::new(0x0002);
        let mut neighbors = Vec::new();
        neighbors.push((0x0002, -60)).unwrap();
        neighbors.push((0x0002, -61)).unwrap();
        let ping = PingPayload { depth: 0, neighbors };

        let outcome = r.handle_ping(0x0001, -50, &ping);
        assert!(outcome.duplicate_mac);
    }

    #[test]
    fn parent_loss_triggers_route_lost_then_reelection() {
        let mut r = router_with_parent();
        assert_eq!(r.parent, Some(0x0001));

        let second_slot = r.neighbors.find_or_insert(0x0005).unwrap();
        let e = &mut r.neighbors.slots_mut()[second_slot];
        e.depth = 0;
        e.rssi = -30;
        e.flags.insert(NeighborFlags::SYMMETRIC);

        r.neighbors.evict(0);
        r.on_parent_lost();

        assert_eq!(r.parent, Some(0x0005));
        assert_eq!(r.depth, 1);
    }

    #[test]
    fn depth_watchdog_resets_while_parented_and_counts_while_lost() {
        let mut r = router_with_parent();
        r.tick_depth_watchdog();
        assert_eq!(r.depth_watchdog(), 0);

        // Evict the only neighbor first so `on_parent_lost`'s re-election
        // pass has no candidate and the node actually stays lost.
        r.neighbors.evict(0);
        r.on_parent_lost();
        r.tick_depth_watchdog();
        r.tick_depth_watchdog();
        assert_eq!(r.depth_watchdog(), 2);
    }
}
