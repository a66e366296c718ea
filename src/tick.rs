//! Timer Tick: the 1 ms heartbeat that schedules pings, aging sweeps, and
//! watchdogs. A plain struct advanced by `NetworkCore::poll()`, with no I/O
//! or radio access of its own — it only sets flags for the caller to act on.

use crate::nwk::{MAX_PING_TIME, NEIGHBOR_PING_TIME_MS, RADIO_WATCHDOG_TIMEOUT_MS};

/// Every 1000 ticks the throughput EMAs are rolled.
const STAT_PERIOD_MS: u32 = 1000;

/// The periodic aging sweep runs once per neighbor ping period: it
/// piggybacks on the same schedule as the ping itself so a neighbor that
/// stops answering pings ages out promptly.
const NEIGHBOURHOOD_PERIOD_MS: u32 = NEIGHBOR_PING_TIME_MS;

/// Reactive up-routes are swept on the same period as the neighbor table.
const REACTIVE_UP_PERIOD_MS: u32 = NEIGHBOR_PING_TIME_MS;

/// One tick's worth of due events, consumed by `NetworkCore::poll()` and
/// then discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Time to emit the redundant neighbor-ping burst.
    pub ping_due: bool,
    /// Time to run the neighbor table and up-route aging sweeps.
    pub verify_neighbourhood: bool,
    /// No RX at all for `RADIO_WATCHDOG_TIMEOUT_MS`: the radio is presumed
    /// wedged and should be reset.
    pub radio_reset: bool,
    /// `STAT_PERIOD_MS` elapsed: roll the throughput EMAs.
    pub stat_roll: bool,
    /// An in-progress association has waited out `A_RESPONSE_WAIT_TIME_MS`
    /// with no `DATA_REQUEST`.
    pub associate_timeout: bool,
}

/// Counters behind the tick schedule.
pub struct TimerTick {
    /// Milliseconds until the next redundant-ping burst; recomputed after
    /// each burst from `neighbor_ping_time_cnt`, capped at `MAX_PING_TIME`
    /// periods.
    neighbor_cnt: u32,
    /// How many ping periods to wait before the next burst, 1..=MAX_PING_TIME.
    neighbor_ping_time_cnt: u32,
    neighbourhood_cnt: u32,
    reactive_up_cnt: u32,
    radio_watchdog_ms: u32,
    stat_cnt: u32,
    /// Set by the embedder when an association handshake starts; `None`
    /// while idle.
    associate_timeout_ms: Option<u32>,
    /// Monotonic milliseconds since the last confirmed parent; read by the
    /// router to decide when to force rediscovery. Advanced unconditionally
    /// here; resetting it is the router's job.
    depth_watchdog_ms: u32,
}

impl TimerTick {
    pub fn new() -> Self {
        Self {
            neighbor_cnt: NEIGHBOR_PING_TIME_MS,
            neighbor_ping_time_cnt: 1,
            neighbourhood_cnt: NEIGHBOURHOOD_PERIOD_MS,
            reactive_up_cnt: REACTIVE_UP_PERIOD_MS,
            radio_watchdog_ms: 0,
            stat_cnt: STAT_PERIOD_MS,
            associate_timeout_ms: None,
            depth_watchdog_ms: 0,
        }
    }

    /// Start (or restart) the association-response wait.
    pub fn start_associate_timeout(&mut self, wait_ms: u32) {
        self.associate_timeout_ms = Some(wait_ms);
    }

    pub fn cancel_associate_timeout(&mut self) {
        self.associate_timeout_ms = None;
    }

    /// Any RX frame, beacon included, resets the radio watchdog: it trips
    /// on 15 s without any RX at all, not just unicast traffic.
    pub fn note_rx_activity(&mut self) {
        self.radio_watchdog_ms = 0;
    }

    pub fn depth_watchdog_ms(&self) -> u32 {
        self.depth_watchdog_ms
    }

    pub fn reset_depth_watchdog(&mut self) {
        self.depth_watchdog_ms = 0;
    }

    /// Advance all counters by one elapsed millisecond, producing whatever
    /// events became due.
    pub fn on_tick_ms(&mut self) -> TickEvents {
        let mut events = TickEvents::default();

        if let Some(remaining) = self.associate_timeout_ms.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                events.associate_timeout = true;
                self.associate_timeout_ms = None;
            }
        }

        self.neighbor_cnt = self.neighbor_cnt.saturating_sub(1);
        if self.neighbor_cnt == 0 {
            events.ping_due = true;
            // Back off towards MAX_PING_TIME periods between bursts, same
            // as the original's gradual NeighborPingTimeCnt growth once the
            // neighborhood has stabilized.
            if self.neighbor_ping_time_cnt < MAX_PING_TIME {
                self.neighbor_ping_time_cnt += 1;
            }
            self.neighbor_cnt = NEIGHBOR_PING_TIME_MS * self.neighbor_ping_time_cnt;
        }

        self.neighbourhood_cnt = self.neighbourhood_cnt.saturating_sub(1);
        if self.neighbourhood_cnt == 0 {
            events.verify_neighbourhood = true;
            self.neighbourhood_cnt = NEIGHBOURHOOD_PERIOD_MS;
        }

        self.reactive_up_cnt = self.reactive_up_cnt.saturating_sub(1);
        if self.reactive_up_cnt == 0 {
            self.reactive_up_cnt = REACTIVE_UP_PERIOD_MS;
        }

        self.radio_watchdog_ms += 1;
        if self.radio_watchdog_ms >= RADIO_WATCHDOG_TIMEOUT_MS {
            events.radio_reset = true;
            self.radio_watchdog_ms = 0;
        }

        self.depth_watchdog_ms += 1;

        self.stat_cnt = self.stat_cnt.saturating_sub(1);
        if self.stat_cnt == 0 {
            events.stat_roll = true;
            self.stat_cnt = STAT_PERIOD_MS;
        }

        events
    }

    /// Reset the redundant-ping burst back to the fastest schedule, e.g.
    /// after losing the parent and needing to re-associate quickly.
    pub fn reset_ping_schedule(&mut self) {
        self.neighbor_ping_time_cnt = 1;
        self.neighbor_cnt = NEIGHBOR_PING_TIME_MS;
    }
}

impl Default for TimerTick {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ping_due_fires_on_schedule_and_backs_off() {
        let mut tick = TimerTick::new();
        for _ in 0..NEIGHBOR_PING_TIME_MS - 1 {
            assert!(!tick.on_tick_ms().ping_due);
        }
        assert!(tick.on_tick_ms().ping_due);
        assert_eq!(tick.neighbor_ping_time_cnt, 2);
    }

    #[test]
    fn ping_backoff_caps_at_max_ping_time() {
        let mut tick = TimerTick::new();
        for _ in 0..(MAX_PING_TIME + 3) {
            while !tick.on_tick_ms().ping_due {}
        }
        assert_eq!(tick.neighbor_ping_time_cnt, MAX_PING_TIME);
    }

    #[test]
    fn radio_watchdog_fires_after_timeout_without_rx() {
        let mut tick = TimerTick::new();
        for _ in 0..RADIO_WATCHDOG_TIMEOUT_MS - 1 {
            assert!(!tick.on_tick_ms().radio_reset);
        }
        assert!(tick.on_tick_ms().radio_reset);
    }

    #[test]
    fn rx_activity_resets_radio_watchdog() {
        let mut tick = TimerTick::new();
        for _ in 0..100 {
            tick.on_tick_ms();
        }
        tick.note_rx_activity();
        for _ in 0..RADIO_WATCHDOG_TIMEOUT_MS - 1 {
            assert!(!tick.on_tick_ms().radio_reset);
        }
        assert!(tick.on_tick_ms().radio_reset);
    }

    #[test]
    fn stat_roll_fires_every_thousand_ticks() {
        let mut tick = TimerTick::new();
        for _ in 0..999 {
            assert!(!tick.on_tick_ms().stat_roll);
        }
        assert!(tick.on_tick_ms().stat_roll);
    }

    #[test]
    fn associate_timeout_fires_once_then_clears() {
        let mut tick = TimerTick::new();
        tick.start_associate_timeout(3);
        assert!(!tick.on_tick_ms().associate_timeout);
        assert!(!tick.on_tick_ms().associate_timeout);
        assert!(tick.on_tick_ms().associate_timeout);
        // Doesn't keep firing once cleared.
        assert!(!tick.on_tick_ms().associate_timeout);
    }

    #[test]
    fn depth_watchdog_counts_monotonically_until_reset() {
        let mut tick = TimerTick::new();
        for _ in 0..50 {
            tick.on_tick_ms();
        }
        assert_eq!(tick.depth_watchdog_ms(), 50);
        tick.reset_depth_watchdog();
        assert_eq!(tick.depth_watchdog_ms(), 0);
    }
}
