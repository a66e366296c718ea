//! The portable core: owns the Radio Reactor, MAC Parser/Responder, NWK
//! Router, and Timer Tick, and exposes `poll()` for the embedder's main
//! loop to call on every wake. Everything lives behind one struct with
//! plain methods; there is no ISR context and no module-level state.

use heapless::{consts::U128, consts::U4, consts::U256, Vec};
use ieee802154::mac::{ExtendedAddress, PanId, ShortAddress};
use log::{debug, warn};

use crate::error::UnetError;
use crate::frame::{Frame, FrameType, HeaderAddress, MacCommand, MacHeader, NwkHeader};
use crate::mac::{FrameIter, MacEvent, MacParser, MacResponder, NodeIdentity, RadioReactor, ResponderAction, TxOutcome};
use crate::nwk::{NextHop, NwkRouter, Origination, RouteAction, NWK_TX_RETRIES, TX_TIMEOUT_MS};
use crate::stats::NodeStats;
use crate::tick::{TickEvents, TimerTick};
use crate::timer::Timer;
use crate::{NetConfig, Role};

const ENCODE_BUF: usize = 160;

/// One frame fully routed to this node and handed to the application layer.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredPacket {
    pub source: u16,
    pub payload: Vec<u8, U128>,
}

/// An origination in flight: the encoded frame plus the retry/blacklist
/// state the routing state machine needs to try another candidate neighbor
/// after a TX failure.
struct PendingTx {
    frame: Vec<u8, U256>,
    origination: Origination,
    blacklist: u32,
    /// Candidate currently selected by `next_hop_for`, so a TX timeout can
    /// tell "still retrying this neighbor" from "moved on to the next one".
    current_slot: Option<usize>,
    /// Attempts made against `current_slot` so far; reset whenever it changes.
    attempt: u8,
    wait_ms: u32,
}

/// Ties the per-layer pieces into one polled object.
pub struct NetworkCore<const NEIGH: usize, const UP: usize> {
    pub role: Role,
    pub config: NetConfig,
    pub router: NwkRouter<NEIGH, UP>,
    pub stats: NodeStats,
    pub reactor: RadioReactor,
    parser: MacParser,
    responder: MacResponder,
    tick: TimerTick,
    last_timer_ms: u32,
    last_rssi: i8,
    pending: Option<PendingTx>,
    radio_reset_requested: bool,
}

impl<const NEIGH: usize, const UP: usize> NetworkCore<NEIGH, UP> {
    pub fn new(role: Role, config: NetConfig) -> Self {
        let self_addr = config.short_addr;
        Self {
            role,
            config,
            router: NwkRouter::new(self_addr),
            stats: NodeStats::new(),
            reactor: RadioReactor::new(),
            parser: MacParser::new(),
            responder: MacResponder::new(),
            tick: TimerTick::new(),
            last_timer_ms: 0,
            last_rssi: i8::MIN,
            pending: None,
            radio_reset_requested: false,
        }
    }

    fn identity(&self) -> NodeIdentity {
        NodeIdentity { pan_id: self.config.pan_id, short_addr: self.config.short_addr, eui: self.config.long_addr, is_associated: self.config.is_assigned() }
    }

    /// Whether the embedder should power-cycle/reinit the transceiver; the
    /// radio watchdog having fired is the only source of this. Clears the
    /// flag once read.
    pub fn take_radio_reset_request(&mut self) -> bool {
        core::mem::replace(&mut self.radio_reset_requested, false)
    }

    fn unicast_header(&mut self, dest: u16, ack_request: bool) -> MacHeader {
        MacHeader {
            frame_type: FrameType::Data,
            ack_request,
            intra_pan: true,
            seq: self.router.next_seq(),
            dest_pan: PanId(self.config.pan_id),
            dest_addr: HeaderAddress::Short(ShortAddress(dest)),
            src_pan: PanId(self.config.pan_id),
            src_addr: HeaderAddress::Short(ShortAddress(self.config.short_addr)),
        }
    }

    fn broadcast_header(&mut self, frame_type: FrameType) -> MacHeader {
        MacHeader {
            frame_type,
            ack_request: false,
            intra_pan: true,
            seq: self.router.next_seq(),
            dest_pan: PanId(self.config.pan_id),
            dest_addr: HeaderAddress::Short(ShortAddress(0xffff)),
            src_pan: PanId(self.config.pan_id),
            src_addr: HeaderAddress::Short(ShortAddress(self.config.short_addr)),
        }
    }

    /// Submit an application payload to `destination`. Picks the cheapest
    /// origination kind the router currently has evidence for: a direct
    /// neighbor, then the reactive up-cache, falling back to routing toward
    /// the coordinator. The application never names an origination kind
    /// itself; NWK picks one.
    pub fn send<R, E>(&mut self, radio: &mut R, destination: u16, payload: &[u8]) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        let origination = if self.router.neighbors.find(destination).is_some() {
            Origination::OneHopRoute { destination }
        } else if self.router.up_routes.find(destination).is_some() {
            Origination::ReactiveUpRoute { destination }
        } else {
            Origination::DownRoute
        };
        self.originate(radio, origination, destination, payload)
    }

    /// Flood `payload` to every neighbor at `depth + 1`.
    pub fn broadcast<R, E>(&mut self, radio: &mut R, payload: &[u8]) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        self.originate(radio, Origination::UpBroadcastRoute, 0xffff, payload)
    }

    fn originate<R, E>(&mut self, radio: &mut R, origination: Origination, destination: u16, payload: &[u8]) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        if self.pending.is_some() {
            return Err(UnetError::Busy);
        }

        let broadcast = matches!(origination, Origination::UpBroadcastRoute);
        let direction_down = matches!(origination, Origination::DownRoute);
        let nwk = self.router.build_header(destination, direction_down, broadcast);

        let header = if broadcast { self.broadcast_header(FrameType::Data) } else { self.unicast_header(destination, true) };
        let frame = Frame::routed(header, nwk, None, payload)?;

        let mut buf = [0u8; ENCODE_BUF];
        let n = frame.encode(&mut buf);
        let encoded = Vec::from_slice(&buf[..n]).map_err(|_| UnetError::PayloadOverflow)?;

        self.pending = Some(PendingTx { frame: encoded, origination, blacklist: 0, current_slot: None, attempt: 0, wait_ms: 0 });
        self.try_transmit_pending(radio)
    }

    fn try_transmit_pending<R, E>(&mut self, radio: &mut R) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        let (origination, blacklist, frame) = match &self.pending {
            Some(p) => (p.origination, p.blacklist, p.frame.clone()),
            None => return Ok(()),
        };

        if matches!(origination, Origination::UpBroadcastRoute) {
            self.reactor.begin_transmit(radio, &frame, false)?;
            self.pending = None;
            return Ok(());
        }

        match self.router.next_hop_for(origination, blacklist) {
            Ok(NextHop::Unicast { neighbor_slot, .. }) => {
                let pending = self.pending.as_mut().unwrap();
                if pending.current_slot != Some(neighbor_slot) {
                    pending.current_slot = Some(neighbor_slot);
                    pending.attempt = 0;
                }
                self.reactor.begin_transmit(radio, &frame, true)?;
                Ok(())
            }
            Ok(NextHop::Broadcast) => {
                self.reactor.begin_transmit(radio, &frame, false)?;
                self.pending = None;
                Ok(())
            }
            Err(e) => {
                self.pending = None;
                Err(e.into())
            }
        }
    }

    /// Broadcast a `DATA_PING` carrying this node's neighbor table, driven
    /// by the ping schedule in [`TimerTick`].
    fn send_ping<R, E>(&mut self, radio: &mut R) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        if radio.is_busy().map_err(UnetError::Radio)? {
            return Ok(()); // try again next tick rather than contending with an in-flight TX
        }
        let ping = self.router.build_ping();
        let header = self.broadcast_header(FrameType::Data);
        let frame = Frame::ping(header, ping);
        let mut buf = [0u8; ENCODE_BUF];
        let n = frame.encode(&mut buf);
        self.reactor.begin_transmit(radio, &buf[..n], false)?;
        self.stats.bump_hellos();
        Ok(())
    }

    fn handle_tick_events<R, E>(&mut self, radio: &mut R, events: TickEvents) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        if events.ping_due {
            self.send_ping(radio)?;
        }
        if events.verify_neighbourhood {
            self.router.age_sweep();
        }
        self.router.tick_dedup_ttls();
        if events.radio_reset {
            warn!("radio watchdog fired, requesting reset");
            self.stats.bump_radioresets();
            self.radio_reset_requested = true;
        }
        if events.stat_roll {
            self.stats.roll_throughput();
        }
        if events.associate_timeout && self.responder.association_in_progress() {
            self.responder.complete_association();
        }
        self.router.tick_depth_watchdog();
        Ok(())
    }

    /// Drive one MAC event through the router/responder. Appends to
    /// `delivered` when a frame finally reaches the application layer.
    fn handle_event<R, E>(&mut self, radio: &mut R, event: MacEvent, delivered: &mut Vec<DeliveredPacket, U4>) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        match event {
            MacEvent::Ping { src_addr, rssi, payload } => {
                self.router.handle_ping(src_addr, rssi, &payload);
                self.last_rssi = rssi;
            }
            MacEvent::Command { mac_source, header, command } => {
                let requester_eui = match header.src_addr {
                    HeaderAddress::Extended(ExtendedAddress(eui)) => Some(eui),
                    _ => None,
                };
                // Only the coordinator, or a router that has itself already
                // associated, may answer BEACON_REQUEST/association traffic;
                // an unassigned router has no real depth to advertise yet.
                let router_capacity =
                    matches!(self.role, Role::Coordinator) || (matches!(self.role, Role::Router) && self.config.is_assigned());
                let action = self.responder.handle_command(
                    &command,
                    requester_eui,
                    self.router.depth,
                    router_capacity,
                    self.tick.depth_watchdog_ms(),
                    self.config.short_addr,
                    self.last_rssi,
                );
                match action {
                    ResponderAction::SendBeacon { beacon, .. } => {
                        let header = self.broadcast_header(FrameType::Beacon);
                        let frame = Frame::beacon(header, beacon);
                        let mut buf = [0u8; 32];
                        let n = frame.encode(&mut buf);
                        let _ = self.reactor.begin_transmit(radio, &buf[..n], false);
                    }
                    ResponderAction::SendAssociationResponse { short_addr, status } => {
                        let header = self.unicast_header(mac_source, true);
                        let frame = Frame::command(header, MacCommand::AssociationResponse { short_addr, status });
                        let mut buf = [0u8; 32];
                        let n = frame.encode(&mut buf);
                        let _ = self.reactor.begin_transmit(radio, &buf[..n], true);
                    }
                    ResponderAction::None => {}
                }
            }
            // A software ACK frame answers whichever origination is currently
            // waiting; correlating it against the exact request is the
            // responsibility of the hardware auto-ACK path this stack relies
            // on for ordinary data traffic (see `mac::RadioReactor`), so here
            // it only needs to unblock the pending wait.
            MacEvent::Ack(_) => {
                self.pending = None;
            }
            MacEvent::Routed { nwk, app: _, payload, mac_source } => match self.router.route_packet(&nwk, mac_source) {
                RouteAction::Drop => self.stats.bump_routdrop(),
                RouteAction::CallAppLayer => {
                    self.stats.bump_apptxed();
                    let _ = delivered.push(DeliveredPacket { source: nwk.source, payload });
                }
                RouteAction::Broadcast => {
                    self.stats.bump_apptxed();
                    let _ = delivered.push(DeliveredPacket { source: nwk.source, payload: payload.clone() });
                    self.forward_broadcast(radio, nwk, &payload);
                }
                RouteAction::SendDirect { neighbor_slot } => {
                    let dest_addr = self.router.neighbors.slots()[neighbor_slot].short_addr;
                    self.forward(radio, dest_addr, nwk, &payload);
                }
                RouteAction::RouteDown => self.reoriginate(radio, Origination::DownRoute, nwk, &payload),
                RouteAction::RouteUp { destination } => self.reoriginate(radio, Origination::ReactiveUpRoute { destination }, nwk, &payload),
            },
        }
        Ok(())
    }

    fn forward_broadcast<R, E>(&mut self, radio: &mut R, nwk: NwkHeader, payload: &[u8])
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        let mut nwk = nwk;
        nwk.packet_life += 1;
        let header = self.broadcast_header(FrameType::Data);
        if let Ok(frame) = Frame::routed(header, nwk, None, payload) {
            let mut buf = [0u8; ENCODE_BUF];
            let n = frame.encode(&mut buf);
            let _ = self.reactor.begin_transmit(radio, &buf[..n], false);
        }
    }

    fn forward<R, E>(&mut self, radio: &mut R, dest_addr: u16, nwk: NwkHeader, payload: &[u8])
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        let mut nwk = nwk;
        nwk.packet_life += 1;
        let header = self.unicast_header(dest_addr, true);
        if let Ok(frame) = Frame::routed(header, nwk, None, payload) {
            let mut buf = [0u8; ENCODE_BUF];
            let n = frame.encode(&mut buf);
            let _ = self.reactor.begin_transmit(radio, &buf[..n], true);
            self.stats.bump_routed();
        }
    }

    fn reoriginate<R, E>(&mut self, radio: &mut R, origination: Origination, nwk: NwkHeader, payload: &[u8])
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        let mut nwk = nwk;
        nwk.packet_life += 1;
        if let Ok(NextHop::Unicast { dest_addr, .. }) = self.router.next_hop_for(origination, 0) {
            let header = self.unicast_header(dest_addr, true);
            if let Ok(frame) = Frame::routed(header, nwk, None, payload) {
                let mut buf = [0u8; ENCODE_BUF];
                let n = frame.encode(&mut buf);
                let _ = self.reactor.begin_transmit(radio, &buf[..n], true);
                self.stats.bump_routed();
            }
        } else {
            self.stats.bump_routdrop();
        }
    }

    /// Service an in-flight TX-complete wait: success clears it; a timeout
    /// retries the same candidate until it has used up `NWK_TX_RETRIES`
    /// attempts, then blacklists it and lets `try_transmit_pending` pick the
    /// next one. Once every candidate is blacklisted, `next_hop_for` itself
    /// reports the exhaustion and the error propagates to the originator.
    fn service_pending_tx<R, E>(&mut self, radio: &mut R) -> Result<(), UnetError<E>>
    where
        R: radio::Transmit<Error = E> + radio::Busy<Error = E> + radio::State<Error = E>,
    {
        if self.pending.is_none() {
            return Ok(());
        }

        if let Some(TxOutcome::Success) = self.reactor.poll_tx(radio, &mut self.stats)? {
            self.pending = None;
            return Ok(());
        }

        if !self.reactor.tx_pending() {
            // Nothing actually in flight yet this cycle (e.g. the radio was
            // busy when we last tried): just retry the send.
            return self.try_transmit_pending(radio);
        }

        let timed_out = {
            let pending = self.pending.as_mut().unwrap();
            pending.wait_ms += 1;
            pending.wait_ms >= TX_TIMEOUT_MS
        };
        if !timed_out {
            return Ok(());
        }

        self.reactor.fail_transmit(&mut self.stats);
        let pending = self.pending.as_mut().unwrap();
        pending.wait_ms = 0;
        pending.attempt += 1;

        if pending.attempt < NWK_TX_RETRIES {
            debug!("tx timed out, attempt {} of {} on current candidate", pending.attempt, NWK_TX_RETRIES);
            return self.try_transmit_pending(radio);
        }

        if let Some(slot) = pending.current_slot {
            warn!("candidate exhausted {} attempts, blacklisting slot {}", NWK_TX_RETRIES, slot);
            pending.blacklist |= 1 << slot;
            pending.current_slot = None;
            pending.attempt = 0;
        }
        self.try_transmit_pending(radio)
    }

    /// One full poll cycle: drain the radio, advance the millisecond clock,
    /// dispatch every frame that arrived, and service any in-flight
    /// transmit. Returns whatever frames reached the application layer this
    /// cycle (capped at 4 per call; the embedder is expected to poll often
    /// enough that this never truncates in practice).
    pub fn poll<R, I, E, T>(&mut self, radio: &mut R, timer: &T) -> Result<Vec<DeliveredPacket, U4>, UnetError<E>>
    where
        R: crate::Radio<I, E>,
        I: radio::ReceiveInfo + Default,
        T: Timer,
    {
        self.reactor.poll_rx(radio, &mut self.stats)?;

        let now_ms = timer.ticks_ms();
        let elapsed = now_ms.wrapping_sub(self.last_timer_ms);
        self.last_timer_ms = now_ms;
        for _ in 0..elapsed {
            let events = self.tick.on_tick_ms();
            self.handle_tick_events(radio, events)?;
        }

        let mut delivered: Vec<DeliveredPacket, U4> = Vec::new();
        let raw = self.reactor.drain();
        let identity = self.identity();
        for (bytes, rssi) in FrameIter::new(&raw) {
            if let Some(event) = self.parser.ingest(bytes, rssi, &identity, &mut self.router.neighbors, &mut self.stats) {
                self.tick.note_rx_activity();
                self.handle_event(radio, event, &mut delivered)?;
            }
        }

        self.service_pending_tx(radio)?;

        Ok(delivered)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::timer::mock::MockTimer;
    use radio::mock::{MockRadio, Transaction};

    fn config() -> NetConfig {
        NetConfig { pan_id: 0x4742, short_addr: 0x0002, long_addr: 0xaabb }
    }

    #[test]
    fn new_core_has_no_route_and_no_pending_tx() {
        let core: NetworkCore<8, 8> = NetworkCore::new(Role::Router, config());
        assert_eq!(core.router.depth, crate::NO_ROUTE);
        assert!(core.pending.is_none());
    }

    #[test]
    fn send_with_no_neighbors_reports_no_route() {
        let mut core: NetworkCore<8, 8> = NetworkCore::new(Role::Router, config());
        let mut radio = MockRadio::new(&[]);
        let err: Result<(), UnetError<()>> = core.send(&mut radio, 0x0099, &[1, 2, 3]);
        assert_eq!(err, Err(UnetError::NoRouteAvailable));
        radio.done();
    }

    #[test]
    fn poll_advances_the_tick_clock_with_no_radio_activity_when_idle() {
        let mut core: NetworkCore<8, 8> = NetworkCore::new(Role::Router, config());
        // 500 elapsed ticks, below every scheduling period (ping/stat/aging
        // all fire at 1000+ ms): the only radio interaction poll() should
        // need is the unconditional RX poll.
        let mut radio = MockRadio::new(&[Transaction::check_receive(true, Ok(false))]);
        let timer = MockTimer(500_000);

        let delivered = core.poll::<_, radio::BasicInfo, _, _>(&mut radio, &timer).unwrap();
        assert!(delivered.is_empty());
        radio.done();
    }
}
