//! CSV input: header auto-discovery, meta rows, reference-range rows.

use std::path::Path;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::columns::REFERENCE;
use crate::{canonical_column, meta, Bom, BomError, HeaderCol, Row};

/// Column sets any one of which marks a row as the header.
static HEADER_MIN: &[&[&str]] = &[
    &[REFERENCE, crate::columns::VALUE],
    &[REFERENCE, crate::columns::FOOTPRINT],
    &[REFERENCE, crate::columns::DATASHEET],
];

/// Meta keys recognised above the header.
static META_NAMES: Lazy<Vec<(&'static str, Regex)>> =
    Lazy::new(|| vec![(meta::SCHFILE, Regex::new("(?i)^source:$").unwrap())]);

/// Columns regenerated on output and therefore not read back.
static HEADER_EXCLUDED: &[&str] = &[crate::columns::ITEM, crate::columns::QUANTITY];

impl Bom {
    /// Read a BOM from a CSV file. A UTF-8 byte-order mark is consumed; it
    /// is never part of the data.
    pub fn from_csv_path(path: &Path) -> Result<Self, BomError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_csv_str(content.trim_start_matches('\u{feff}'))
            .map_err(|e| match e {
                BomError::NoHeader(_) => BomError::NoHeader(path.display().to_string()),
                other => other,
            })
    }

    /// Read a BOM from CSV text.
    pub fn from_csv_str(content: &str) -> Result<Self, BomError> {
        let mut bom = Bom::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());
        let mut records = reader.records();
        let mut line_no = 0usize;
        let mut header_byte = 0u64;

        // Hunt for the header row; collect meta rows on the way down.
        let header = loop {
            let Some(record) = records.next() else {
                return Err(BomError::NoHeader("<csv>".to_string()));
            };
            let record = record?;
            line_no += 1;

            let mut candidate: IndexMap<String, HeaderCol> = IndexMap::new();
            for (index, cell) in record.iter().enumerate() {
                let cell = cell.trim();
                if let Some(id) = canonical_column(cell) {
                    candidate.insert(
                        id.to_string(),
                        HeaderCol { index: Some(index), text: cell.to_string(), special: true },
                    );
                } else if !cell.is_empty() {
                    candidate.entry(cell.to_string()).or_insert(HeaderCol {
                        index: Some(index),
                        text: cell.to_string(),
                        special: false,
                    });
                }
            }
            if HEADER_MIN
                .iter()
                .any(|min| min.iter().all(|id| candidate.contains_key(*id)))
            {
                log::debug!("csv line {line_no}: header row {:?}", record);
                header_byte = record.position().map(|p| p.byte()).unwrap_or(0);
                break candidate;
            }

            for (index, cell) in record.iter().enumerate() {
                if let Some((key, _)) = META_NAMES
                    .iter()
                    .find(|(_, re)| re.is_match(cell.trim()))
                {
                    let values: Vec<String> =
                        record.iter().skip(index + 1).map(str::to_string).collect();
                    log::debug!("csv line {line_no}: meta {key} = {values:?}");
                    bom.meta.insert(key.to_string(), values);
                    break;
                }
            }
        };

        bom.header = header
            .into_iter()
            .filter(|(id, _)| !HEADER_EXCLUDED.contains(&id.as_str()))
            .collect();

        bom.rows = read_rows(&mut records, &bom.header, &mut line_no, content, header_byte)?;
        Ok(bom)
    }
}

fn read_rows(
    records: &mut csv::StringRecordsIter<'_, &[u8]>,
    header: &IndexMap<String, HeaderCol>,
    line_no: &mut usize,
    content: &str,
    mut prev_byte: u64,
) -> Result<IndexMap<String, Row>, BomError> {
    log::info!(
        "csv line {line_no}: reading data for {}",
        itertools::join(header.keys(), ", ")
    );
    let mut rows: IndexMap<String, Row> = IndexMap::new();
    let mut seen_at: IndexMap<String, Vec<usize>> = IndexMap::new();

    for record in records {
        let record = record?;
        *line_no += 1;

        // The csv reader silently skips truly blank lines; recover them
        // from the byte gap between records, since a blank line ends the
        // table.
        let byte = record.position().map(|p| p.byte()).unwrap_or(prev_byte);
        let gap = &content[prev_byte as usize..byte as usize];
        if gap.contains("\n\n") || gap.contains("\n\r\n") {
            log::warn!("csv line {line_no}: blank line, end of BOM table");
            return Ok(rows);
        }
        prev_byte = byte;

        let mut data = Row::new();
        let mut all_empty = true;
        for (id, col) in header {
            let Some(index) = col.index else { continue };
            let Some(cell) = record.get(index) else {
                log::warn!("csv line {line_no}: row shorter than header, stop reading");
                return Ok(rows);
            };
            if !cell.is_empty() {
                all_empty = false;
            }
            data.insert(id.clone(), cell.to_string());
        }

        if all_empty || data.is_empty() {
            log::warn!("csv line {line_no}: end of BOM table");
            return Ok(rows);
        }

        let Some(cell) = data.get(REFERENCE).filter(|c| !c.is_empty()) else {
            log::warn!("csv line {line_no}: ignoring row without reference");
            continue;
        };

        for reference in Bom::expand_references(cell) {
            if let Some(lines) = seen_at.get(&reference) {
                log::warn!(
                    "csv line {line_no}: ignoring {reference} - already defined at line(s) {}",
                    itertools::join(lines.iter(), ","),
                );
                continue;
            }
            seen_at.insert(reference.clone(), vec![*line_no]);
            rows.insert(reference, data.clone());
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::*;

    const CSV: &str = "\
Source:,boards/stereo.sch
Date:,2019-03-02
Component Count:,7

Item,Qty,POP,Reference(s),Value,Notes,Footprint
1,4,,C1-C3;C5,100nF,bypass,C_0603
2,1,DNP,R7,10k,,R_0603
3,1,,R8,22k,pull-up,R_0603
,,,,,,
leftover,should,never,be,read,x,y
";

    #[test]
    fn test_header_discovery_and_meta() {
        let bom = Bom::from_csv_str(CSV).unwrap();
        assert_eq!(bom.sch_file(), Some("boards/stereo.sch"));

        // item/quantity are recognised but not kept.
        assert!(!bom.header.contains_key(ITEM));
        assert!(!bom.header.contains_key(QUANTITY));
        assert_eq!(bom.header[REFERENCE].text, "Reference(s)");
        assert_eq!(bom.header[POPULATE].text, "POP");
        assert!(!bom.header["Notes"].special);
    }

    #[test]
    fn test_range_rows_expand() {
        let bom = Bom::from_csv_str(CSV).unwrap();
        for reference in ["C1", "C2", "C3", "C5"] {
            assert_eq!(bom.rows[reference][VALUE], "100nF", "{reference}");
            assert_eq!(bom.rows[reference]["Notes"], "bypass");
        }
        assert_eq!(bom.rows["R7"][POPULATE], "DNP");
        assert_eq!(bom.rows.len(), 6);
    }

    #[test]
    fn test_blank_row_terminates_table() {
        let bom = Bom::from_csv_str(CSV).unwrap();
        assert!(!bom.rows.contains_key("be"));
    }

    #[test]
    fn test_duplicate_reference_keeps_first() {
        let csv = "\
Reference,Value
C1-C3,100nF
C2,1uF
";
        let bom = Bom::from_csv_str(csv).unwrap();
        assert_eq!(bom.rows["C2"][VALUE], "100nF");
    }

    #[test]
    fn test_bom_byte_order_mark_is_consumed() {
        let csv = "\u{feff}Reference,Value\nR1,10k\n";
        let bom = Bom::from_csv_str(csv.trim_start_matches('\u{feff}')).unwrap();
        assert_eq!(bom.rows["R1"][VALUE], "10k");
    }

    #[test]
    fn test_no_header_is_an_error() {
        assert!(matches!(
            Bom::from_csv_str("a,b,c\n1,2,3\n"),
            Err(BomError::NoHeader(_))
        ));
    }

    #[test]
    fn test_first_matching_header_row_wins() {
        let csv = "\
Reference,Value
R1,10k

Reference,Footprint
R9,R_0603
";
        let bom = Bom::from_csv_str(csv).unwrap();
        assert_eq!(bom.header[VALUE].text, "Value");
        assert!(bom.rows.contains_key("R1"));
        // Reading stopped at the blank row; the second table is not merged.
        assert!(!bom.rows.contains_key("R9"));
    }
}
