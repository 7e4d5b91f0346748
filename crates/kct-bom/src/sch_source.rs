//! Building a BOM straight from a schematic hierarchy.

use std::path::Path;

use kct_sch::{RefIndex, SheetGraph};

use crate::columns::{REFERENCE, SYMBOL};
use crate::{canonical_column, meta, Bom, BomError, HeaderCol, Row};

impl Bom {
    /// Extract one row per effective reference from the hierarchy rooted at
    /// `root`. Component field names are canonicalised through the same
    /// table as CSV headers; the library symbol from the `L` line lands in
    /// the `symbol` column. A component instantiated through N sheet
    /// re-uses contributes N rows sharing the same field values.
    pub fn from_schematic(root: &Path) -> Result<Self, BomError> {
        let graph = SheetGraph::load_from_path(root)?;
        let index = RefIndex::build(&graph);

        let mut bom = Bom::new();
        bom.meta.insert(
            meta::SCHFILE.to_string(),
            vec![root.to_string_lossy().into_owned()],
        );

        for file in graph.files() {
            for comp in &file.comps {
                let mut data = Row::new();
                let mut header: Vec<(String, HeaderCol)> = Vec::new();

                if !comp.lib.is_empty() {
                    data.insert(SYMBOL.to_string(), comp.lib.clone());
                    header.push((
                        SYMBOL.to_string(),
                        HeaderCol { index: None, text: "LibPart".to_string(), special: true },
                    ));
                }
                for field in comp.fields.values() {
                    let (id, special) = match canonical_column(&field.name) {
                        Some(id) => (id.to_string(), true),
                        None => (field.name.clone(), false),
                    };
                    data.insert(id.clone(), field.value.clone());
                    header.push((
                        id,
                        HeaderCol { index: None, text: field.name.clone(), special },
                    ));
                }

                for reference in index.refs_of(&comp.id) {
                    let mut row = data.clone();
                    row.insert(REFERENCE.to_string(), reference.to_string());
                    bom.rows.insert(reference.to_string(), row);
                    for (id, col) in &header {
                        bom.header.insert(id.clone(), col.clone());
                    }
                }
            }
        }
        Ok(bom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::*;

    const ROOT: &str = "\
EESchema Schematic File Version 4
$Sheet
S 2500 1500 1500 1200
U 5A000001
F0 \"Left\" 50
F1 \"amp.sch\" 50
$EndSheet
$Sheet
S 4500 1500 1500 1200
U 5A000002
F0 \"Right\" 50
F1 \"amp.sch\" 50
$EndSheet
$EndSCHEMATC
";

    const AMP: &str = "\
EESchema Schematic File Version 4
$Comp
L Device:R R1
U 1 1 00AB0001
P 3200 2200
AR Path=\"/5A000001/00AB0001\" Ref=\"R1\"  Part=\"1\"
AR Path=\"/5A000002/00AB0001\" Ref=\"R2\"  Part=\"1\"
F 0 \"R1\" H 3270 2245 50  0000 L CNN
F 1 \"10k\" H 3270 2155 50  0000 L CNN
F 2 \"R_0603\" V 3130 2200 50  0001 C CNN
F 4 \"Mouser\" H 3200 2200 50  0001 C CNN \"Supplier\"
$EndComp
$EndSCHEMATC
";

    #[test]
    fn test_rows_per_effective_reference() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("stereo.sch"), ROOT).unwrap();
        std::fs::write(dir.path().join("amp.sch"), AMP).unwrap();

        let bom = Bom::from_schematic(&dir.path().join("stereo.sch")).unwrap();
        assert_eq!(bom.rows.len(), 2);
        for reference in ["R1", "R2"] {
            let row = &bom.rows[reference];
            assert_eq!(row[REFERENCE], reference);
            assert_eq!(row[VALUE], "10k");
            assert_eq!(row[FOOTPRINT], "R_0603");
            assert_eq!(row[SYMBOL], "Device:R");
            assert_eq!(row[SUPPLIER], "Mouser");
        }
        assert_eq!(bom.header[SUPPLIER].text, "Supplier");
        assert!(bom.header[SUPPLIER].special);
        assert!(bom.sch_file().unwrap().ends_with("stereo.sch"));
    }
}
