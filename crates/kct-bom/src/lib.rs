//! Bill-of-materials handling for legacy KiCad schematics.
//!
//! A [`Bom`] is a table of per-reference field values keyed by *canonical
//! column IDs*, a closed vocabulary (`reference`, `value`, `footprint`, …)
//! that many alternate header spellings collapse onto (`Qty`, `Qnty` and
//! `Quantity` are all `quantity`). Unrecognised headers survive as their
//! literal text.
//!
//! Sources and sinks:
//!
//! * [`Bom::from_csv_path`] - auto-detects the header row in a CSV export.
//! * [`Bom::from_schematic`] - extracts rows straight from a hierarchy.
//! * [`write_tables`] - writes the individual/grouped CSV tables.
//! * [`apply_to_schematic`] - streams BOM values back into the `.sch`
//!   files, preserving every untouched byte.

mod csv_read;
mod sch_source;
mod sch_update;
mod writer;

pub use sch_update::{apply_to_schematic, UpdateReport};
pub use writer::{write_tables, WriteOptions};

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// Canonical column IDs.
pub mod columns {
    pub const ITEM: &str = "item";
    pub const QUANTITY: &str = "quantity";
    pub const POPULATE: &str = "populate";
    pub const REFERENCE: &str = "reference";
    pub const VALUE: &str = "value";
    pub const SYMBOL: &str = "symbol";
    pub const FOOTPRINT: &str = "footprint";
    pub const DATASHEET: &str = "datasheet";
    pub const MANUFACTURER: &str = "manufacturer";
    pub const PARTNUM: &str = "partnum";
    pub const SUPPLIER: &str = "supplier";
    pub const SUPPLIERNUM: &str = "suppliernum";
    pub const PRICE: &str = "price";
}

/// Meta keys picked up above the header row.
pub mod meta {
    /// Root schematic path from a `Source:` row.
    pub const SCHFILE: &str = "schfile";
}

use columns::*;

/// Alternate header spellings, tried in order; first match wins.
static HEADER_NAMES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    let table: [(&str, &str); 13] = [
        (ITEM, "Item#?"),
        (QUANTITY, "Qty|Qnty|Quantity"),
        (POPULATE, "Pop(ulate|ulation)?"),
        (REFERENCE, "Ref|Reference.*"),
        (VALUE, "Value"),
        (SYMBOL, "Libpart|Part|Library.*"),
        (FOOTPRINT, "Footprint"),
        (DATASHEET, "Datasheet"),
        (MANUFACTURER, "M(anu?)?f(actu)?r?(er)?"),
        (PARTNUM, "(M(anu?)?f(actu)?r?(er)?|P(art)?)(#| ?number)"),
        (SUPPLIER, "Sup(plier)?|Vendor|Dist(ributor)?"),
        (SUPPLIERNUM, "(Sup(plier)?|Vendor|Dist(ributor)?)(#| ?number)"),
        (PRICE, r"(Sup(plier)?|Vendor|Dist(ributor)?)?(\$| ?Price)"),
    ];
    table
        .into_iter()
        .map(|(id, pattern)| (id, Regex::new(&format!("(?i)^(?:{pattern})$")).unwrap()))
        .collect()
});

/// Map a header cell onto its canonical column ID, if it has one.
pub fn canonical_column(text: &str) -> Option<&'static str> {
    HEADER_NAMES
        .iter()
        .find(|(_, re)| re.is_match(text))
        .map(|(id, _)| *id)
}

static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i) *(([a-z]*)(\d+)|([^-,;]*)) *([-,;]|\.\.|$)").unwrap());

/// Errors raised by BOM reading, writing and schematic updates.
#[derive(Debug, Error)]
pub enum BomError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Sch(#[from] kct_sch::SchError),

    #[error(transparent)]
    Stream(#[from] kct_stream::StreamError),

    #[error("{0}: no recognizable BOM header row")]
    NoHeader(String),
}

/// One recognised column of the source table.
#[derive(Debug, Clone, Serialize)]
pub struct HeaderCol {
    /// Column index in the source CSV; `None` for non-tabular sources.
    pub index: Option<usize>,
    /// Header text as written by the user.
    pub text: String,
    /// Whether the ID is canonical (`true`) or literal text.
    pub special: bool,
}

/// Field values of one reference, keyed by column ID.
pub type Row = HashMap<String, String>;

/// A bill of materials keyed by reference.
#[derive(Debug, Default, Serialize)]
pub struct Bom {
    /// Meta rows found above the header (`Source:`, `Date:`, …), each with
    /// the cells that followed the key.
    pub meta: HashMap<String, Vec<String>>,
    /// Column ID → column description.
    pub header: IndexMap<String, HeaderCol>,
    /// Reference → field values, in source order.
    pub rows: IndexMap<String, Row>,
}

impl Bom {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schematic path announced by a `Source:` meta row.
    pub fn sch_file(&self) -> Option<&str> {
        self.meta
            .get(meta::SCHFILE)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Column ID → display text of the recognised header.
    pub fn header_texts(&self) -> HashMap<String, String> {
        self.header
            .iter()
            .map(|(id, col)| (id.clone(), col.text.clone()))
            .collect()
    }

    /// Display text → column ID, for resolving schematic field names.
    pub fn col_name_to_id(&self) -> HashMap<String, String> {
        self.header
            .iter()
            .map(|(id, col)| (col.text.clone(), id.clone()))
            .collect()
    }

    /// Expand a reference cell into individual references.
    ///
    /// Tokens are separated by `,` or `;`; a `<prefix><n> - <prefix><m>`
    /// (or `..`) pair expands to the closed integer range; anything else is
    /// taken literally.
    ///
    /// `expand_references("C1-C4  ,  C21; C23.4,C25..C27")` gives
    /// `[C1, C2, C3, C4, C21, C23.4, C25, C26, C27]`.
    pub fn expand_references(cell: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut next_start = 0u64;
        let mut pending_range = false;

        for cap in RANGE_RE.captures_iter(cell) {
            match cap.get(4) {
                Some(literal) => {
                    if literal.as_str().is_empty() {
                        // Terminal empty match, ignore.
                        continue;
                    }
                    out.push(cap[1].to_string());
                    pending_range = false;
                }
                None => {
                    let prefix = &cap[2];
                    let Ok(number) = cap[3].parse::<u64>() else {
                        out.push(cap[1].to_string());
                        pending_range = false;
                        continue;
                    };
                    if pending_range {
                        for i in next_start..=number {
                            out.push(format!("{prefix}{i}"));
                        }
                    } else {
                        out.push(cap[1].to_string());
                    }
                    next_start = number + 1;
                    pending_range = matches!(&cap[5], "-" | "..");
                }
            }
        }
        out
    }

    /// Join the rows of `references` into one shared record.
    ///
    /// Each field becomes the `"; "`-join of the distinct non-empty values
    /// across the rows (in first-seen order); every listed reference is
    /// re-pointed at the joined record. The returned set names the fields
    /// that actually had divergent values, so callers can warn before
    /// writing the combined value anywhere.
    pub fn join_values(&mut self, references: &[String]) -> (Row, BTreeSet<String>) {
        let mut keys: Vec<String> = Vec::new();
        for reference in references {
            if let Some(row) = self.rows.get(reference) {
                for key in row.keys() {
                    if !keys.contains(key) {
                        keys.push(key.clone());
                    }
                }
            }
        }

        let mut joined = Row::new();
        let mut divergent = BTreeSet::new();
        for key in keys {
            let mut values: Vec<&str> = Vec::new();
            for reference in references {
                if let Some(value) = self.rows.get(reference).and_then(|row| row.get(&key)) {
                    if !value.is_empty() && !values.contains(&value.as_str()) {
                        values.push(value);
                    }
                }
            }
            if values.len() > 1 {
                divergent.insert(key.clone());
            }
            joined.insert(key, values.join("; "));
        }
        divergent.remove(REFERENCE);

        for reference in references {
            self.rows.insert(reference.clone(), joined.clone());
        }
        (joined, divergent)
    }

    /// Rewrite rows into the shape the schematic updater expects: the
    /// supplier triple packs into one `supplier:suppliernum:price` cell, and
    /// a value or populate cell of `DO NOT POPULATE` becomes `DNP`.
    pub fn transform_to_sch(&mut self, references: &[String]) {
        for reference in references {
            let Some(row) = self.rows.get_mut(reference) else {
                continue;
            };
            let packed: Vec<String> = [SUPPLIER, SUPPLIERNUM, PRICE]
                .iter()
                .filter_map(|key| row.remove(*key))
                .collect();
            row.insert(SUPPLIER.to_string(), packed.join(":"));

            for key in [VALUE, POPULATE] {
                if let Some(value) = row.get_mut(key) {
                    if value.eq_ignore_ascii_case("DO NOT POPULATE") {
                        *value = "DNP".to_string();
                    }
                }
            }
        }
    }
}
