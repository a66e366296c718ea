//! Fixed-capacity neighbor table with an activity-bitmap aging sweep.

use bitflags::bitflags;

/// Sentinel short address meaning "this slot is empty".
pub const EMPTY_SLOT: u16 = 0xFFFE;

/// RSSI threshold above which a link is considered usable in either
/// direction. A link is only marked symmetric once both ends report RSSI at
/// or above this value.
pub const RSSI_THRESHOLD: i8 = -85;

bitflags! {
    pub struct NeighborFlags: u8 {
        /// Both ends have confirmed RSSI above `RSSI_THRESHOLD` in the last ping cycle.
        const SYMMETRIC  = 0b0001;
        const RX_ALLOWED = 0b0010;
        const TX_PENDING = 0b0100;
        const ACTIVE     = 0b1000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborEntry {
    pub short_addr: u16,
    pub rssi: i8,
    pub lqi: u8,
    pub last_seq: u8,
    pub seq_ttl: u8,
    pub depth: u8,
    pub flags: NeighborFlags,
}

impl NeighborEntry {
    pub const fn empty() -> Self {
        Self { short_addr: EMPTY_SLOT, rssi: i8::MIN, lqi: 0, last_seq: 0, seq_ttl: 0, depth: crate::NO_ROUTE, flags: NeighborFlags::empty() }
    }

    pub fn is_empty(&self) -> bool {
        self.short_addr == EMPTY_SLOT
    }

    pub fn is_symmetric(&self) -> bool {
        self.flags.contains(NeighborFlags::SYMMETRIC)
    }
}

/// Fixed-capacity table of `N` neighbor slots, each carrying an `ACTIVE` flag
/// used by the periodic aging sweep.
pub struct NeighborTable<const N: usize> {
    entries: [NeighborEntry; N],
}

impl<const N: usize> NeighborTable<N> {
    pub fn new() -> Self {
        Self { entries: [NeighborEntry::empty(); N] }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NeighborEntry> {
        self.entries.iter().filter(|e| !e.is_empty())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NeighborEntry> {
        self.entries.iter_mut().filter(|e| !e.is_empty())
    }

    pub fn slots(&self) -> &[NeighborEntry; N] {
        &self.entries
    }

    pub fn slots_mut(&mut self) -> &mut [NeighborEntry; N] {
        &mut self.entries
    }

    pub fn find(&self, short_addr: u16) -> Option<usize> {
        self.entries.iter().position(|e| !e.is_empty() && e.short_addr == short_addr)
    }

    pub fn get(&self, slot: usize) -> Option<&NeighborEntry> {
        self.entries.get(slot).filter(|e| !e.is_empty())
    }

    /// Invariant: the table never contains two entries with the same `short_addr`.
    pub fn find_or_insert(&mut self, short_addr: u16) -> Option<usize> {
        if let Some(slot) = self.find(short_addr) {
            return Some(slot);
        }
        let slot = self.entries.iter().position(|e| e.is_empty())?;
        self.entries[slot] = NeighborEntry { short_addr, ..NeighborEntry::empty() };
        Some(slot)
    }

    pub fn evict(&mut self, slot: usize) {
        self.entries[slot] = NeighborEntry::empty();
    }

    pub fn mark_active(&mut self, slot: usize) {
        if let Some(e) = self.entries.get_mut(slot) {
            if !e.is_empty() {
                e.flags.insert(NeighborFlags::ACTIVE);
            }
        }
    }

    /// Dedup check + record against an existing entry only: if `short_addr`
    /// isn't in the table yet, this traffic didn't come through a pinged
    /// neighbor and is not a replay, so nothing is inserted. Otherwise, if
    /// `entry.last_seq == seq`, treat it as a replay; else record the new
    /// sequence number with an 8-tick TTL.
    pub fn dedup(&mut self, short_addr: u16, seq: u8) -> bool {
        let slot = match self.find(short_addr) {
            Some(s) => s,
            None => return false,
        };
        let entry = &mut self.entries[slot];
        if entry.seq_ttl > 0 && entry.last_seq == seq {
            return true;
        }
        entry.last_seq = seq;
        entry.seq_ttl = 8;
        false
    }

    /// Timer-tick decrement of every live entry's `seq_ttl`; on reaching
    /// zero, `last_seq` is cleared.
    pub fn tick_dedup_ttls(&mut self) {
        for e in self.iter_mut() {
            if e.seq_ttl > 0 {
                e.seq_ttl -= 1;
                if e.seq_ttl == 0 {
                    e.last_seq = 0;
                }
            }
        }
    }

    /// The periodic aging sweep: clear every live entry's `ACTIVE` bit,
    /// evicting any entry whose bit was already clear. Returns whether the
    /// caller's current parent was one of the evicted entries (the caller
    /// passes `parent` to detect this).
    pub fn age_sweep(&mut self, parent: Option<u16>) -> bool {
        let mut parent_evicted = false;
        for slot in 0..N {
            let entry = self.entries[slot];
            if entry.is_empty() {
                continue;
            }
            if !entry.flags.contains(NeighborFlags::ACTIVE) {
                if Some(entry.short_addr) == parent {
                    parent_evicted = true;
                }
                self.evict(slot);
            } else {
                self.entries[slot].flags.remove(NeighborFlags::ACTIVE);
            }
        }
        parent_evicted
    }
}

impl<const N: usize> Default for NeighborTable<N> {
    fn default() -> Self {
        Self::new()
    }
}
