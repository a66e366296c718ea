//! Pure next-hop selection and depth-maintenance functions, taking
//! `(neighbor_table, self_depth, blacklist_mask)` and returning a result
//! with no retry state of their own — the caller owns the blacklist and
//! drives any retry loop explicitly.

use crate::ROUTE_LOST;

use super::neighbor::NeighborTable;

/// Scan neighbors for the best down-route candidate: lowest depth, then
/// highest smoothed RSSI. `allow_asymmetric` widens the scan to
/// non-symmetric neighbors for the fallback rescan.
fn scan_best<const N: usize>(table: &NeighborTable<N>, self_depth: u8, blacklist: u32, allow_asymmetric: bool) -> Option<usize> {
    let mut min_depth = u8::MAX;
    let mut max_rssi = i8::MIN;
    let mut selected = None;

    for (slot, entry) in table.slots().iter().enumerate() {
        if entry.is_empty() {
            continue;
        }
        if blacklist & (1 << slot) != 0 {
            continue;
        }
        if !allow_asymmetric && !entry.is_symmetric() {
            continue;
        }
        if entry.depth > self_depth {
            continue;
        }

        if entry.depth < min_depth {
            min_depth = entry.depth;
            max_rssi = entry.rssi;
            selected = Some(slot);
        } else if entry.depth == min_depth && entry.rssi >= max_rssi {
            max_rssi = entry.rssi;
            selected = Some(slot);
        }
    }

    selected
}

/// Down-route next-hop selection, the core routing algorithm. Returns
/// `None` if no candidate exists under either the symmetric-only or the
/// asymmetric-fallback scan. Returns `Err(())` immediately if `self_depth`
/// has no route at all (`self_depth >= ROUTE_LOST`).
pub fn select_down_hop<const N: usize>(table: &NeighborTable<N>, self_depth: u8, blacklist: u32) -> Result<Option<usize>, ()> {
    if self_depth >= ROUTE_LOST {
        return Err(());
    }

    if let Some(slot) = scan_best(table, self_depth, blacklist, false) {
        return Ok(Some(slot));
    }

    // No symmetric candidate: fall back to asymmetric neighbors under the
    // same depth/RSSI rule.
    Ok(scan_best(table, self_depth, blacklist, true))
}

/// Depth maintenance: a single pass over symmetric neighbors shallower than
/// `self_depth`, refreshing or switching the parent as it finds better
/// candidates. One pass, not an iterate-to-fixpoint solver.
pub fn update_depth<const N: usize>(table: &NeighborTable<N>, self_depth: u8, parent: Option<u16>) -> (u8, Option<u16>) {
    let mut depth = self_depth;
    let mut best_parent = parent;

    for entry in table.iter() {
        if !entry.is_symmetric() || entry.depth >= depth {
            continue;
        }

        if depth == entry.depth + 1 {
            if Some(entry.short_addr) == best_parent {
                continue; // refresh: RSSI already updated by ping ingestion
            }
            let current_rssi = best_parent.and_then(|p| table.iter().find(|e| e.short_addr == p)).map(|e| e.rssi);
            let better = match current_rssi {
                Some(rssi) => entry.rssi > rssi,
                None => true,
            };
            if better {
                best_parent = Some(entry.short_addr);
            }
        } else {
            // entry.depth + 1 < depth: strictly shallower path found.
            depth = entry.depth + 1;
            best_parent = Some(entry.short_addr);
        }
    }

    (depth, best_parent)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::nwk::neighbor::NeighborFlags;

    fn table_with(entries: &[(u16, u8, i8, bool)]) -> NeighborTable<8> {
        let mut table: NeighborTable<8> = NeighborTable::new();
        for &(addr, depth, rssi, symmetric) in entries {
            let slot = table.find_or_insert(addr).unwrap();
            let e = &mut table.slots_mut()[slot];
            e.depth = depth;
            e.rssi = rssi;
            if symmetric {
                e.flags.insert(NeighborFlags::SYMMETRIC);
            }
        }
        table
    }

    #[test]
    fn picks_lowest_depth_then_highest_rssi() {
        let table = table_with(&[(1, 2, -60, true), (2, 1, -70, true), (3, 1, -50, true)]);
        let slot = select_down_hop(&table, 5, 0).unwrap().unwrap();
        assert_eq!(table.slots()[slot].short_addr, 3);
    }

    #[test]
    fn no_route_when_route_lost() {
        assert_eq!(select_down_hop(&NeighborTable::<8>::new(), crate::ROUTE_LOST, 0), Err(()));
    }

    #[test]
    fn falls_back_to_asymmetric_when_no_symmetric_candidate() {
        let table = table_with(&[(1, 1, -60, false)]);
        let slot = select_down_hop(&table, 5, 0).unwrap().unwrap();
        assert_eq!(table.slots()[slot].short_addr, 1);
    }

    #[test]
    fn blacklist_excludes_candidate_until_retry() {
        let table = table_with(&[(1, 1, -50, true), (2, 1, -60, true)]);
        let first = select_down_hop(&table, 5, 0).unwrap().unwrap();
        assert_eq!(table.slots()[first].short_addr, 1);

        let blacklist = 1u32 << first;
        let second = select_down_hop(&table, 5, blacklist).unwrap().unwrap();
        assert_eq!(table.slots()[second].short_addr, 2);
    }

    #[test]
    fn depth_update_adopts_shallower_parent() {
        let table = table_with(&[(1, 0, -60, true)]);
        let (depth, parent) = update_depth(&table, crate::ROUTE_LOST, None);
        assert_eq!(depth, 1);
        assert_eq!(parent, Some(1));
    }

    #[test]
    fn depth_update_switches_parent_on_better_rssi_at_same_level() {
        let table = table_with(&[(1, 0, -70, true), (2, 0, -40, true)]);
        let (depth, parent) = update_depth(&table, 1, Some(1));
        assert_eq!(depth, 1);
        assert_eq!(parent, Some(2));
    }

    #[test]
    fn depth_update_ignores_deeper_or_asymmetric_neighbors() {
        let table = table_with(&[(1, 5, -40, true), (2, 0, -40, false)]);
        let (depth, parent) = update_depth(&table, 1, None);
        assert_eq!(depth, 1);
        assert_eq!(parent, None);
    }
}
