//! Reference ↔ AR-path index over a loaded hierarchy.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::SheetGraph;

/// Where a reference canonically lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefEntry {
    /// Canonical AR path: the strictly shortest valid path carrying this
    /// reference.
    pub ar_path: String,
    /// Display-name path of the sheet holding the component.
    pub user_path: String,
    /// Component unique ID at the end of `ar_path`.
    pub comp_id: String,
}

/// Maps references to canonical AR paths and component IDs, and component
/// IDs back to every reference they appear under.
///
/// The walk visits each file's components in file order and applies
/// *write-if-shorter*: an entry is replaced only when the new AR path is
/// strictly shorter than the stored one (absent counts as infinitely long).
/// Paths of equal references always differ in length, so the outcome does
/// not depend on sub-sheet visitation order and re-building is idempotent.
#[derive(Debug, Default, Serialize)]
pub struct RefIndex {
    by_ref: HashMap<String, RefEntry>,
    by_id: HashMap<String, BTreeSet<String>>,
}

impl RefIndex {
    pub fn build(graph: &SheetGraph) -> Self {
        let mut index = Self::default();
        index.walk(graph, 0, "", "");
        index
    }

    fn walk(&mut self, graph: &SheetGraph, file_index: usize, ar_prefix: &str, user_prefix: &str) {
        let file = graph.file(file_index);
        for comp in &file.comps {
            let candidate = format!("{ar_prefix}/{}", comp.id);
            let reference = comp
                .ar
                .get(&candidate)
                .map(|o| o.reference.as_str())
                .unwrap_or(&comp.reference);

            let shorter = self
                .by_ref
                .get(reference)
                .is_none_or(|entry| candidate.len() < entry.ar_path.len());
            if shorter {
                self.by_ref.insert(
                    reference.to_string(),
                    RefEntry {
                        ar_path: candidate.clone(),
                        user_path: user_prefix.to_string(),
                        comp_id: comp.id.clone(),
                    },
                );
            }
            self.by_id
                .entry(comp.id.clone())
                .or_default()
                .insert(reference.to_string());
        }

        for sheet in &file.sheets {
            if let Some(target) = sheet.target {
                self.walk(
                    graph,
                    target,
                    &format!("{ar_prefix}/{}", sheet.id),
                    &format!("{user_prefix}/{}", sheet.name),
                );
            }
        }
    }

    pub fn entry(&self, reference: &str) -> Option<&RefEntry> {
        self.by_ref.get(reference)
    }

    pub fn ar_path(&self, reference: &str) -> Option<&str> {
        self.by_ref.get(reference).map(|e| e.ar_path.as_str())
    }

    pub fn comp_id(&self, reference: &str) -> Option<&str> {
        self.by_ref.get(reference).map(|e| e.comp_id.as_str())
    }

    /// Every reference sharing `comp_id`, i.e. the equivalents of each
    /// other under hierarchy re-use. Sorted, deterministic.
    pub fn refs_of(&self, comp_id: &str) -> impl Iterator<Item = &str> {
        self.by_id
            .get(comp_id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    pub fn references(&self) -> impl Iterator<Item = (&str, &RefEntry)> {
        self.by_ref.iter().map(|(r, e)| (r.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }
}
