//! CSV output: the individual and grouped BOM tables.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::columns::*;
use crate::{Bom, BomError};

/// Output selection and framing for [`write_tables`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Emit the per-reference table.
    pub individual: bool,
    /// Emit the grouped table.
    pub grouped: bool,
    /// Prefix the file with a UTF-8 byte-order mark (helps spreadsheet
    /// tools pick the right encoding, but they tend to save it back
    /// incorrectly, hence opt-in).
    pub utf8_bom: bool,
    /// Name written into the `Generator:` meta row.
    pub generator: String,
    /// Directory the output file lives in; the `Source:` path is made
    /// relative to it.
    pub out_dir: Option<std::path::PathBuf>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            individual: true,
            grouped: true,
            utf8_bom: false,
            generator: env!("CARGO_PKG_NAME").to_string(),
            out_dir: None,
        }
    }
}

/// Fields whose equality makes two references the same line item.
const GROUP_IDENTITY: [&str; 6] = [VALUE, MANUFACTURER, PARTNUM, DATASHEET, FOOTPRINT, POPULATE];

/// Canonical display texts that override whatever the source used.
const DISPLAY_OVERRIDES: [(&str, &str); 7] = [
    (ITEM, "Item"),
    (QUANTITY, "Qty"),
    (POPULATE, "POP"),
    (REFERENCE, "Reference(s)"),
    (SUPPLIERNUM, "Supplier Number"),
    (PRICE, "Supplier Price"),
    (SYMBOL, "LibPart"),
];

/// Write the BOM tables of `bom` to `out`.
pub fn write_tables(bom: &Bom, out: impl Write, options: &WriteOptions) -> Result<(), BomError> {
    let mut bom_rows = bom.rows.clone();

    // Break a packed supplier cell back into its triple.
    for row in bom_rows.values_mut() {
        let Some(supplier) = row.get(SUPPLIER).cloned() else {
            continue;
        };
        let mut parts = supplier.split(':');
        if let Some(name) = parts.next() {
            row.insert(SUPPLIER.to_string(), name.to_string());
        }
        if let Some(number) = parts.next() {
            row.entry(SUPPLIERNUM.to_string())
                .or_insert_with(|| number.to_string());
        }
        if let Some(price) = parts.next() {
            row.entry(PRICE.to_string()).or_insert_with(|| price.to_string());
        }
    }

    let col_ids = column_order(bom);
    let mut display = bom.header_texts();
    for (id, text) in DISPLAY_OVERRIDES {
        if display.contains_key(id) || col_ids.iter().any(|c| c == id) {
            display.insert(id.to_string(), text.to_string());
        }
    }
    let columns: Vec<String> = col_ids
        .iter()
        .map(|id| display.get(id).cloned().unwrap_or_else(|| id.clone()))
        .collect();

    let mut w = csv::WriterBuilder::new().flexible(true).from_writer(out);

    // Meta preamble.
    let source_key = if options.utf8_bom { "\u{feff}Source:" } else { "Source:" };
    let source_path = bom.sch_file().map(|sch| {
        let out_dir = options
            .out_dir
            .as_deref()
            .unwrap_or_else(|| Path::new("."));
        kct_sch::paths::rel_path(sch, &out_dir.to_string_lossy())
            .to_string_lossy()
            .into_owned()
    });
    w.write_record([source_key, source_path.as_deref().unwrap_or("")])?;
    for key in ["Date", "Tool"] {
        if let Some(values) = bom.meta.get(key) {
            w.write_record([
                format!("{key}:"),
                values.first().cloned().unwrap_or_default(),
            ])?;
        }
    }
    w.write_record(["Generator:", options.generator.as_str()])?;
    w.write_record(["Component Count:", bom_rows.len().to_string().as_str()])?;
    w.write_record([""])?;

    if options.individual {
        w.write_record(["Individual Components:"])?;
        w.write_record([""])?;
        w.write_record(&columns)?;

        let mut references: Vec<&String> = bom_rows.keys().collect();
        references.sort_by(|a, b| natord::compare(a.as_str(), b.as_str()));
        for reference in references {
            let row = &bom_rows[reference];
            let record: Vec<&str> = col_ids
                .iter()
                .map(|id| row.get(id).map(String::as_str).unwrap_or(""))
                .collect();
            w.write_record(record)?;
        }
        for _ in 0..3 {
            w.write_record([""])?;
        }
    }

    if options.grouped {
        w.write_record(["Grouped Style:"])?;
        w.write_record([""])?;
        w.write_record(&columns)?;

        // Group references that agree on the identity fields.
        let mut groups: Vec<(Vec<&str>, Vec<&String>)> = Vec::new();
        for (reference, row) in &bom_rows {
            let identity: Vec<&str> = GROUP_IDENTITY
                .iter()
                .map(|id| row.get(*id).map(String::as_str).unwrap_or(""))
                .collect();
            match groups.iter_mut().find(|(key, _)| *key == identity) {
                Some((_, members)) => members.push(reference),
                None => groups.push((identity, vec![reference])),
            }
        }
        for (_, members) in &mut groups {
            members.sort_by(|a, b| natord::compare(a.as_str(), b.as_str()));
        }
        groups.sort_by(|(_, a), (_, b)| natord::compare(a[0].as_str(), b[0].as_str()));

        for (item, (_, members)) in groups.iter().enumerate() {
            let mut record = vec![(item + 1).to_string(), members.len().to_string()];
            for id in &col_ids[2..] {
                let mut values: Vec<&str> = Vec::new();
                for reference in members {
                    let value = bom_rows[*reference].get(id).map(String::as_str).unwrap_or("");
                    if !value.is_empty() && !values.contains(&value) {
                        values.push(value);
                    }
                }
                values.sort_by(|a, b| natord::compare(a, b));
                record.push(values.join(", "));
            }
            w.write_record(record)?;
        }
        for _ in 0..3 {
            w.write_record([""])?;
        }
    }

    w.flush()?;
    Ok(())
}

/// The column order of both tables: item/qty first, the well-known columns
/// in their fixed positions, custom columns alphabetically in the middle,
/// symbol/footprint/datasheet last.
fn column_order(bom: &Bom) -> Vec<String> {
    let mut order: Vec<String> = vec![ITEM.to_string(), QUANTITY.to_string()];
    if bom.header.contains_key(POPULATE) {
        order.push(POPULATE.to_string());
    }
    order.extend([REFERENCE, VALUE, MANUFACTURER, PARTNUM].map(str::to_string));
    if bom.header.contains_key(SUPPLIER) {
        order.extend([SUPPLIER, SUPPLIERNUM, PRICE].map(str::to_string));
    }

    let taken: HashSet<&str> = order
        .iter()
        .map(String::as_str)
        .chain([SYMBOL, FOOTPRINT, DATASHEET, "Reference"])
        .collect();
    let mut middle: Vec<String> = bom
        .header
        .keys()
        .filter(|id| !taken.contains(id.as_str()))
        .cloned()
        .collect();
    middle.sort_unstable();

    order.extend(middle);
    order.extend([SYMBOL, FOOTPRINT, DATASHEET].map(str::to_string));
    order
}
