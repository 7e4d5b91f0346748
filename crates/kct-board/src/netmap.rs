//! Equivalent-net discovery by pad correspondence.

use std::collections::HashMap;

use crate::{Board, ItemId};

/// Lazily-built `source net code → target net code` relation.
///
/// Footprint pairs are consumed from the end of the pair list; each pair's
/// pads are matched up in their stable order and every pad pair contributes
/// one mapping. The walk stops as soon as the requested source net shows
/// up, and everything learned along the way is memoised for later lookups.
/// A net no pad pair ever names maps to "no equivalent" and stays that way.
pub struct NetMap {
    pairs: Vec<(ItemId, ItemId)>,
    cursor: usize,
    map: HashMap<i32, Option<i32>>,
}

impl NetMap {
    pub fn new(pairs: Vec<(ItemId, ItemId)>) -> Self {
        let cursor = pairs.len();
        Self { pairs, cursor, map: HashMap::new() }
    }

    /// The target net for `net_code`, or `None` when no pad pair maps it.
    /// `net_name` is only used for the warning on first failure.
    pub fn equivalent(&mut self, board: &dyn Board, net_code: i32, net_name: &str) -> Option<i32> {
        if let Some(&memoised) = self.map.get(&net_code) {
            return memoised;
        }

        let mut last_seen = None;
        while self.cursor > 0 {
            self.cursor -= 1;
            let (module, equivalent) = self.pairs[self.cursor];
            let pads = board.pads(module);
            let eqv_pads = board.pads(equivalent);
            for (pad, eqv_pad) in pads.iter().zip(eqv_pads.iter()) {
                last_seen = Some(pad.net_code);
                self.map.insert(pad.net_code, Some(eqv_pad.net_code));
                log::debug!(
                    "{}.{} and {}.{} suggest {} maps to {}",
                    board.reference(module),
                    pad.name,
                    board.reference(equivalent),
                    eqv_pad.name,
                    pad.net_name,
                    eqv_pad.net_name,
                );
                if pad.net_code == net_code {
                    return Some(eqv_pad.net_code);
                }
            }
        }

        if last_seen != Some(net_code) && !net_name.is_empty() {
            self.map.insert(net_code, None);
            log::warn!("cannot find equivalent net of {net_name}");
        }
        None
    }
}
