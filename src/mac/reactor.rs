//! Radio Reactor: the single point of contact with the transceiver. Streams
//! raw received frames into a shared byte FIFO that the MAC parser drains a
//! frame at a time, and tracks one outstanding transmit's completion state.
//!
//! There is no ISR context here; waking up on new work just means the
//! embedder calls `NetworkCore::poll()` again, so this module exposes only
//! the poll methods a reactor task would run after waking.

use heapless::{consts::U1024, Vec};
use log::{debug, trace, warn};
use radio::{Busy, ReceiveInfo, Rssi, State, Transmit};

use crate::error::UnetError;
use crate::stats::NodeStats;

/// Maximum bytes accepted from a single `get_received` call (127 on-air,
/// rounded up for headroom).
const MAX_RX_FRAME: usize = 128;

/// One FIFO entry is `[len: u16 LE][frame bytes][rssi: i8 as u8]`. There is
/// no separate LQI byte: the `radio` crate's `Rssi` trait this stack builds
/// on does not expose link quality, only RSSI.
fn frame_entry_len(frame_len: usize) -> usize {
    2 + frame_len + 1
}

/// Outcome of a completed transmit attempt, mirroring the hardware
/// transmit-status register's classification: ACK seen (or CCA passed, if
/// no ACK was requested) vs FAILURE (out of hardware retries).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Success,
    Failure,
}

/// Owns the shared RX byte FIFO (single-producer here, single-consumer in
/// `mac::MacParser`) and tracks whether a transmit is outstanding.
pub struct RadioReactor {
    fifo: Vec<u8, U1024>,
    tx_pending: bool,
    auto_ack_disabled: bool,
}

impl RadioReactor {
    pub fn new() -> Self {
        Self { fifo: Vec::new(), tx_pending: false, auto_ack_disabled: false }
    }

    pub fn auto_ack_disabled(&self) -> bool {
        self.auto_ack_disabled
    }

    /// Poll the radio for a completed receive; if one is present, stream it
    /// into the FIFO with its RSSI appended, or drop it and bump `overbuf`
    /// if the FIFO has no room.
    pub fn poll_rx<R, I, E>(&mut self, radio: &mut R, stats: &mut NodeStats) -> Result<(), UnetError<E>>
    where
        R: radio::Receive<Info = I, Error = E> + Rssi<Error = E>,
        I: ReceiveInfo + Default,
    {
        trace!("poll_rx: checking receive");
        if !radio.check_receive(true).map_err(UnetError::Radio)? {
            return Ok(());
        }

        let mut buf = [0u8; MAX_RX_FRAME];
        let mut info = I::default();
        let n = radio.get_received(&mut info, &mut buf).map_err(UnetError::Radio)?;
        let rssi = radio.poll_rssi().map_err(UnetError::Radio)?;
        let rssi = rssi.clamp(i8::MIN as i16, i8::MAX as i16) as i8;
        debug!("received {} bytes at rssi {}", n, rssi);

        self.push_frame(&buf[..n], rssi, stats);
        Ok(())
    }

    fn push_frame(&mut self, frame: &[u8], rssi: i8, stats: &mut NodeStats) {
        if self.fifo.len() + frame_entry_len(frame.len()) > self.fifo.capacity() {
            log::warn!("rx fifo full, dropping {}-byte frame", frame.len());
            stats.bump_overbuf();
            self.auto_ack_disabled = true;
            return;
        }

        let _ = self.fifo.extend_from_slice(&(frame.len() as u16).to_le_bytes());
        let _ = self.fifo.extend_from_slice(frame);
        let _ = self.fifo.push(rssi as u8);

        stats.bump_rxed();
        stats.add_rx_bytes(frame.len() as u16);
        self.auto_ack_disabled = false;
    }

    /// Hand the whole FIFO to the caller and reset it empty. The caller is
    /// expected to consume every frame it returns before re-suspending.
    pub fn drain(&mut self) -> Vec<u8, U1024> {
        core::mem::replace(&mut self.fifo, Vec::new())
    }

    /// Begin a transmit; `ack_request` records whether the caller should
    /// wait on the TX-complete outcome.
    pub fn begin_transmit<R, E>(&mut self, radio: &mut R, frame: &[u8], ack_request: bool) -> Result<(), UnetError<E>>
    where
        R: Transmit<Error = E> + Busy<Error = E> + State<Error = E>,
    {
        if radio.is_busy().map_err(UnetError::Radio)? {
            warn!("radio busy, deferring transmit of {} bytes", frame.len());
            return Err(UnetError::Busy);
        }
        debug!("transmitting {} bytes", frame.len());
        radio.start_transmit(frame).map_err(UnetError::Radio)?;
        self.tx_pending = ack_request;
        Ok(())
    }

    /// Poll the radio's transmit-status register. `None` while still in
    /// flight; `Some(outcome)` once the hardware reports completion.
    pub fn poll_tx<R, E>(&mut self, radio: &mut R, stats: &mut NodeStats) -> Result<Option<TxOutcome>, UnetError<E>>
    where
        R: Transmit<Error = E>,
    {
        if !radio.check_transmit().map_err(UnetError::Radio)? {
            return Ok(None);
        }

        self.tx_pending = false;
        stats.bump_txed();
        Ok(Some(TxOutcome::Success))
    }

    pub fn fail_transmit(&mut self, stats: &mut NodeStats) {
        log::debug!("transmit failed");
        self.tx_pending = false;
        stats.bump_txfailed();
    }

    pub fn tx_pending(&self) -> bool {
        self.tx_pending
    }
}

impl Default for RadioReactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk the raw bytes handed back by [`RadioReactor::drain`], yielding
/// `(frame_bytes, rssi)` pairs in arrival order.
pub struct FrameIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = (&'a [u8], i8);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + 2 > self.buf.len() {
            return None;
        }
        let len = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]) as usize;
        let start = self.pos + 2;
        if start + len + 1 > self.buf.len() {
            return None;
        }
        let frame = &self.buf[start..start + len];
        let rssi = self.buf[start + len] as i8;
        self.pos = start + len + 1;
        Some((frame, rssi))
    }
}
