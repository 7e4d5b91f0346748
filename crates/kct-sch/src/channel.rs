//! Channel discovery: grouping equivalent references by sheet-ID prefix.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::{RefIndex, SchError};

/// A node of the AR trie. Children keep insertion order, so callers that
/// need full determinism should sort the resulting channel keys.
#[derive(Debug, Default)]
struct Node {
    /// Sheet-ID path from the root down to this node.
    path: Vec<String>,
    children: IndexMap<String, Node>,
    /// Seed reference → equivalent reference contributed at this node.
    ref_to_ref: IndexMap<String, String>,
}

/// The result of [`ArTree::group_by_channel`].
#[derive(Debug, Default, Serialize)]
pub struct Channels {
    /// AR-path prefix → complete seed-reference → equivalent-reference map.
    pub complete: IndexMap<String, IndexMap<String, String>>,
    /// AR-path prefix → diagnostic for partial or suspicious coverage.
    pub warnings: IndexMap<String, String>,
}

/// Equivalence trie over the canonical AR paths of a seed reference set.
///
/// For every seed reference `s`, each equivalent reference `e` (same
/// component ID, different reference) contributes an edge `s → e` at the
/// node named by the sheet-ID prefix of `e`'s canonical AR path.
#[derive(Debug)]
pub struct ArTree {
    root: Node,
}

impl ArTree {
    /// Build the trie for a seed set. Unknown references are an error;
    /// references without any equivalent simply contribute nothing.
    pub fn build<'a, I>(index: &RefIndex, seed: I) -> Result<Self, SchError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tree = Self { root: Node::default() };
        for reference in seed {
            let entry = index
                .entry(reference)
                .ok_or_else(|| SchError::UnknownReference(reference.to_string()))?;
            for equivalent in index.refs_of(&entry.comp_id) {
                if equivalent == reference {
                    continue;
                }
                if let Some(eq_entry) = index.entry(equivalent) {
                    tree.add(&eq_entry.ar_path, reference, equivalent);
                }
            }
        }
        Ok(tree)
    }

    /// Insert `reference → equivalent` at the node whose path equals the
    /// sheet-ID prefix of `ar_path` (leading slash and trailing component ID
    /// excluded).
    pub fn add(&mut self, ar_path: &str, reference: &str, equivalent: &str) {
        let segments: Vec<&str> = ar_path.split('/').filter(|s| !s.is_empty()).collect();
        let prefix = &segments[..segments.len().saturating_sub(1)];

        let mut node = &mut self.root;
        for &id in prefix {
            let path = {
                let mut p = node.path.clone();
                p.push(id.to_string());
                p
            };
            node = node
                .children
                .entry(id.to_string())
                .or_insert_with(|| Node { path, ..Node::default() });
        }
        node.ref_to_ref
            .insert(reference.to_string(), equivalent.to_string());
    }

    /// Walk the trie and enumerate the AR prefixes whose accumulated
    /// `ref → ref` maps cover the whole seed set.
    ///
    /// * A node covering everything on the way down records a complete
    ///   channel (and, if it still has children, a "complete without full
    ///   descent" warning).
    /// * A leaf with residual uncovered references records a warning; if the
    ///   residual is small the partial map is still offered as a channel.
    /// * Children that only cover partially may jointly close their parent's
    ///   residual; the parent then synthesizes one channel from their union.
    pub fn group_by_channel<'a, I>(&self, seed: I) -> Channels
    where
        I: IntoIterator<Item = &'a str>,
    {
        let to_cover: HashSet<String> = seed.into_iter().map(str::to_string).collect();
        let result = group(&self.root, &to_cover, &IndexMap::new());
        Channels {
            complete: result.map,
            warnings: result.warn,
        }
    }
}

struct GroupResult {
    map: IndexMap<String, IndexMap<String, String>>,
    warn: IndexMap<String, String>,
    not_covered: HashSet<String>,
    ref_to_ref: IndexMap<String, String>,
}

fn group(
    node: &Node,
    to_cover: &HashSet<String>,
    inherited: &IndexMap<String, String>,
) -> GroupResult {
    let path_key = node.path.join("/");

    let mut cur_not_covered: HashSet<String> = to_cover
        .iter()
        .filter(|r| !node.ref_to_ref.contains_key(*r))
        .cloned()
        .collect();

    let mut cur_map = inherited.clone();
    for (r, e) in &node.ref_to_ref {
        cur_map.insert(r.clone(), e.clone());
    }

    let mut result = GroupResult {
        map: IndexMap::new(),
        warn: IndexMap::new(),
        not_covered: HashSet::new(),
        ref_to_ref: IndexMap::new(),
    };
    if cur_not_covered.is_empty() {
        result.map.insert(path_key.clone(), cur_map.clone());
    }

    if node.children.is_empty() {
        if !cur_not_covered.is_empty() {
            let mut missing: Vec<&str> = cur_not_covered.iter().map(String::as_str).collect();
            missing.sort_unstable();
            result.warn.insert(
                path_key.clone(),
                format!(
                    "cannot find all equivalent component(s) for {}",
                    missing.join(",")
                ),
            );
            if cur_not_covered.len() * 20 < cur_map.len() * 100 {
                result.map.insert(path_key, cur_map.clone());
            }
        }
    } else {
        if cur_not_covered.is_empty() {
            result.warn.insert(
                path_key.clone(),
                "already found all equivalent components without reaching the lowest child sheet"
                    .to_string(),
            );
        }

        // Children that cover completely are taken as-is; partial ones are
        // buffered until we know whether their union closes this node.
        let mut partials: Vec<GroupResult> = Vec::new();
        let mut deferred_map = IndexMap::new();
        let mut deferred_warn = IndexMap::new();
        for child in node.children.values() {
            let child_result = group(child, &cur_not_covered, &cur_map);
            if child_result.map.is_empty() {
                continue;
            }
            if child_result.not_covered.is_empty() {
                result.map.extend(child_result.map);
                result.warn.extend(child_result.warn);
            } else {
                deferred_map.extend(child_result.map.clone());
                deferred_warn.extend(child_result.warn.clone());
                partials.push(child_result);
            }
        }

        for partial in partials {
            cur_not_covered.retain(|r| partial.not_covered.contains(r));
            for (r, e) in partial.ref_to_ref {
                cur_map.insert(r, e);
            }
            if cur_not_covered.is_empty() {
                result.map.insert(path_key.clone(), cur_map.clone());
                deferred_map.clear();
                deferred_warn.clear();
                break;
            }
        }

        result.map.extend(deferred_map);
        result.warn.extend(deferred_warn);
    }

    result.not_covered = cur_not_covered;
    result.ref_to_ref = cur_map;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures, RefIndex, SheetGraph};

    fn stereo() -> (SheetGraph, RefIndex) {
        let graph = SheetGraph::load(&fixtures::stereo(), "stereo.sch").unwrap();
        let index = RefIndex::build(&graph);
        (graph, index)
    }

    #[test]
    fn test_two_instantiations_give_one_channel() {
        let (_, index) = stereo();
        let tree = ArTree::build(&index, ["R1", "C1"]).unwrap();
        let channels = tree.group_by_channel(["R1", "C1"]);

        assert!(channels.warnings.is_empty(), "{:?}", channels.warnings);
        assert_eq!(channels.complete.len(), 1);
        let (path, map) = channels.complete.iter().next().unwrap();
        assert_eq!(path, "5A000002");
        assert_eq!(map["R1"], "R2");
        assert_eq!(map["C1"], "C2");
    }

    #[test]
    fn test_channel_values_share_component_ids() {
        let (_, index) = stereo();
        let seed = ["R1", "C1"];
        let tree = ArTree::build(&index, seed).unwrap();
        let channels = tree.group_by_channel(seed);
        for map in channels.complete.values() {
            assert_eq!(map.len(), seed.len());
            for (s, e) in map {
                assert_eq!(index.comp_id(s), index.comp_id(e));
            }
        }
    }

    #[test]
    fn test_seed_from_the_other_side() {
        let (_, index) = stereo();
        let tree = ArTree::build(&index, ["R2", "C2"]).unwrap();
        let channels = tree.group_by_channel(["R2", "C2"]);
        assert_eq!(channels.complete.len(), 1);
        let (path, map) = channels.complete.iter().next().unwrap();
        assert_eq!(path, "5A000001");
        assert_eq!(map["R2"], "R1");
        assert_eq!(map["C2"], "C1");
    }

    #[test]
    fn test_no_equivalents_means_no_channels() {
        let (_, index) = stereo();
        // D9 exists only once in the hierarchy.
        let tree = ArTree::build(&index, ["D9"]).unwrap();
        let channels = tree.group_by_channel(["D9"]);
        assert!(channels.complete.is_empty());
        assert_eq!(channels.warnings.len(), 1);
        assert!(channels.warnings[""].contains("D9"));
    }

    #[test]
    fn test_unknown_seed_reference_is_an_error() {
        let (_, index) = stereo();
        assert!(matches!(
            ArTree::build(&index, ["R999"]),
            Err(SchError::UnknownReference(r)) if r == "R999"
        ));
    }

    #[test]
    fn test_partial_channel_below_threshold_is_offered() {
        // Five seeds, one without an equivalent in the target channel:
        // residual 1 of 4 mapped refs → 1*20 < 4*100 → partial included.
        let mut tree = ArTree { root: Node::default() };
        for (s, e) in [("R1", "R11"), ("R2", "R12"), ("R3", "R13"), ("R4", "R14")] {
            tree.add("/B/x", s, e);
        }
        let channels = tree.group_by_channel(["R1", "R2", "R3", "R4", "R5"]);
        assert_eq!(channels.complete.len(), 1);
        assert_eq!(channels.warnings.len(), 1);
        let map = &channels.complete["B"];
        assert_eq!(map.len(), 4);
        assert!(channels.warnings["B"].contains("R5"));
    }

    #[test]
    fn test_children_jointly_cover_parent() {
        // R1's equivalent lives under /P/A, C1's under /P/B; neither child
        // alone covers the seed but their union does, so the parent node
        // synthesizes one channel.
        let mut tree = ArTree { root: Node::default() };
        tree.add("/P/A/x", "R1", "R2");
        tree.add("/P/B/x", "C1", "C2");
        let channels = tree.group_by_channel(["R1", "C1"]);
        assert!(channels.complete.contains_key("P"), "{:?}", channels.complete);
        let map = &channels.complete["P"];
        assert_eq!(map["R1"], "R2");
        assert_eq!(map["C1"], "C2");
    }

    #[test]
    fn test_complete_before_leaves_warns() {
        let mut tree = ArTree { root: Node::default() };
        tree.add("/B/x", "R1", "R2");
        // A deeper edge forces /B to have a child.
        tree.add("/B/C/x", "R1", "R3");
        let channels = tree.group_by_channel(["R1"]);
        assert!(channels
            .warnings
            .values()
            .any(|w| w.contains("without reaching")));
        assert!(channels.complete.contains_key("B"));
    }
}
