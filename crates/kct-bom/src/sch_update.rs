//! Writing BOM values back into schematic files.
//!
//! Every file of the hierarchy is streamed through the byte-exact mapper
//! into a `<file>.new` sibling; only edited token slices differ from the
//! input. When every file has been rewritten successfully the originals are
//! renamed to `<file>.bak` and the `.new` files take their place. An I/O
//! failure midway leaves every original untouched.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use kct_stream::{CompRecord, Event, SchMapper};
use kct_sch::{DirSource, RefIndex, SheetGraph};

use crate::columns::{DATASHEET, FOOTPRINT, POPULATE, SYMBOL, VALUE};
use crate::{Bom, BomError};

/// What a schematic update touched.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Files rewritten (and backed up as `.bak`).
    pub files: Vec<PathBuf>,
    /// Components whose fields changed.
    pub components: usize,
    /// References whose BOM rows had divergent values and were joined.
    pub joined: Vec<String>,
}

/// Resolution of a schematic field name: either a canonical column to pull
/// values from, or nothing (the reference field is never written).
type NameMap = HashMap<String, Option<String>>;

/// Stream the hierarchy rooted at `root` and update component fields from
/// `bom`.
pub fn apply_to_schematic(bom: &mut Bom, root: &Path) -> Result<UpdateReport, BomError> {
    let dir = root.parent().unwrap_or_else(|| Path::new("."));
    let root_name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let graph = SheetGraph::load(&DirSource::new(dir), &root_name)?;
    let index = RefIndex::build(&graph);

    let mut name_to_id: NameMap = bom
        .col_name_to_id()
        .into_iter()
        .map(|(text, id)| (text, Some(id)))
        .collect();
    name_to_id.insert("Reference".to_string(), None);
    name_to_id.insert("Value".to_string(), Some(VALUE.to_string()));
    name_to_id.insert("Footprint".to_string(), Some(FOOTPRINT.to_string()));
    name_to_id.insert("Datasheet".to_string(), Some(DATASHEET.to_string()));
    let header_texts = bom.header_texts();

    let mut report = UpdateReport::default();

    for file_index in 0..graph.files().len() {
        let path = dir.join(&graph.file(file_index).path);
        let new_path = staging_path(&path);
        log::info!("rewriting {} -> {}", path.display(), new_path.display());

        let input = BufReader::new(File::open(&path)?);
        let output = BufWriter::new(File::create(&new_path)?);
        let mut mapper = SchMapper::new(input, output);

        while let Some(event) = mapper.next_event()? {
            if event != Event::CompExit {
                continue;
            }
            let Some(id) = mapper.reader().comp().id() else {
                continue;
            };
            let effective: Vec<String> = index.refs_of(id).map(str::to_string).collect();
            if effective.is_empty() {
                continue;
            }

            bom.transform_to_sch(&effective);
            let (values, divergent) = bom.join_values(&effective);
            if values.is_empty() {
                continue;
            }
            if !divergent.is_empty() {
                log::warn!(
                    "{}: field values had been combined across {}",
                    itertools::join(divergent.iter(), ","),
                    effective.join(",")
                );
                report.joined.extend(effective.iter().cloned());
            }

            if update_component(
                mapper.reader_mut().comp_mut(),
                &values,
                &name_to_id,
                &header_texts,
            ) {
                report.components += 1;
            }
        }
        mapper.finish()?;
        report.files.push(path);
    }

    for reference in bom.rows.keys() {
        if index.entry(reference).is_none() {
            log::warn!("{reference} is not in any sheet, row skipped");
        }
    }

    // All staged files were written; swap them in, keeping backups.
    for path in &report.files {
        let bak = backup_path(path);
        log::info!("backup {}", bak.display());
        std::fs::rename(path, &bak)?;
        std::fs::rename(staging_path(path), path)?;
    }
    Ok(report)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".new");
    PathBuf::from(s)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".bak");
    PathBuf::from(s)
}

/// Apply the joined values to one component record. Returns whether
/// anything was written.
fn update_component(
    comp: &mut CompRecord,
    values: &crate::Row,
    name_to_id: &NameMap,
    header_texts: &HashMap<String, String>,
) -> bool {
    let mut touched = false;
    // Column ID (or literal field name) → field number, for every field the
    // component already has.
    let mut updated: HashMap<String, u32> = HashMap::new();
    let mut max_field = 0u32;

    let numbers: Vec<u32> = comp.fields.keys().copied().collect();
    for number in numbers {
        let field_name = comp.field_name(number).unwrap_or_default().to_string();
        max_field = max_field.max(number);

        let column = match name_to_id.get(&field_name) {
            Some(None) => {
                updated.insert(field_name, number);
                continue;
            }
            Some(Some(id)) => id.clone(),
            None => field_name,
        };
        if let Some(new_value) = values.get(&column) {
            let CompRecord { lines, fields, .. } = comp;
            fields
                .get_mut(&number)
                .unwrap()
                .value
                .set_quoted(lines, new_value.trim());
            touched = true;
        }
        updated.insert(column, number);
    }

    // Materialize a populate field when the BOM has one and the component
    // does not.
    let pop_value = values.get(POPULATE).cloned().unwrap_or_default();
    let pop_number = if !pop_value.is_empty() && !updated.contains_key(POPULATE) {
        let src = updated.get(VALUE).copied().unwrap_or(1);
        let number = match comp.duplicate_field(src, Some(max_field)) {
            Some(number) => number,
            None => return touched,
        };
        let pop_text = header_texts
            .get(POPULATE)
            .map(String::as_str)
            .unwrap_or("Populate");
        let CompRecord { lines, fields, .. } = comp;
        let entry = fields.get_mut(&number).unwrap();
        entry.value.set_quoted(lines, &pop_value);
        entry.name.set_quoted(lines, pop_text);
        touched = true;
        Some(number)
    } else {
        updated.get(POPULATE).copied()
    };

    // When populate and value share a position exactly one of them shows:
    // populate for DNP parts, value otherwise. An empty populate field at
    // the value position is dropped entirely.
    if let (Some(&value_number), Some(pop_number)) = (updated.get(VALUE), pop_number) {
        let pos = |comp: &CompRecord, number: u32, default: i64| -> (i64, i64) {
            let field = &comp.fields[&number];
            let coord = |view: Option<kct_stream::TokenView>| {
                view.and_then(|v| v.value(&comp.lines).parse::<i64>().ok())
                    .unwrap_or(default)
            };
            (coord(field.pos_x), coord(field.pos_y))
        };
        if pos(comp, value_number, 0) == pos(comp, pop_number, 1) {
            let flags = |comp: &mut CompRecord, number: u32, value: &str| {
                let CompRecord { lines, fields, .. } = comp;
                if let Some(view) = fields.get_mut(&number).and_then(|f| f.flags.as_mut()) {
                    view.set(lines, value);
                }
            };
            if pop_value == "DNP" {
                flags(comp, value_number, "0001");
                flags(comp, pop_number, "0000");
            } else {
                flags(comp, value_number, "0000");
                flags(comp, pop_number, "0001");
                if pop_value.is_empty() {
                    log::info!("removing empty populate field {pop_number}");
                    comp.delete_field(pop_number);
                }
            }
            touched = true;
        }
    }

    // Update the library symbol, stripping the `lib:` prefix when either
    // side does not use the 5.x two-part style.
    if let Some(new_symbol) = values.get(SYMBOL) {
        let mut symbol = new_symbol.trim();
        symbol = symbol.strip_prefix(':').unwrap_or(symbol);
        let split = symbol.find(':').map(|i| i + 1).unwrap_or(0);
        let current_is_two_part = comp.lib().is_some_and(|lib| lib.contains(':'));
        if split == 1 || !current_is_two_part {
            symbol = &symbol[split..];
        }
        if let Some(mut view) = comp.lib {
            view.set(&mut comp.lines, symbol);
            comp.lib = Some(view);
            touched = true;
        }
    }

    touched
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "\
EESchema Schematic File Version 4
$Sheet
S 2500 1500 1500 1200
U 5A000001
F0 \"Main\" 50
F1 \"main.sch\" 50
$EndSheet
$EndSCHEMATC
";

    const MAIN: &str = "\
EESchema Schematic File Version 4
$Comp
L Device:R R7
U 1 1 00AB0001
P 3200 2200
F 0 \"R7\" H 3270 2245 50  0000 L CNN
F 1 \"10k\" H 3270 2155 50  0000 L CNN
F 2 \"R_0603\" V 3130 2200 50  0001 C CNN
	1    3200 2200
	1    0    0    -1
$EndComp
$Comp
L Device:C C2
U 1 1 00AB0002
P 3600 2200
F 0 \"C2\" H 3625 2300 50  0000 L CNN
F 1 \"100nF\" H 3625 2100 50  0000 L CNN
	1    3600 2200
	1    0    0    -1
$EndComp
$EndSCHEMATC
";

    const CSV: &str = "\
Source:,root.sch

Reference,Value,POP,Footprint
R7,4k7,DNP,R_0805
C2,100nF,,
";

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("root.sch"), ROOT).unwrap();
        std::fs::write(dir.path().join("main.sch"), MAIN).unwrap();
        let root = dir.path().join("root.sch");
        (dir, root)
    }

    #[test]
    fn test_update_writes_new_and_bak() {
        let (dir, root) = setup();
        let mut bom = Bom::from_csv_str(CSV).unwrap();
        let report = apply_to_schematic(&mut bom, &root).unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.components, 2);

        // Originals preserved as .bak, byte for byte.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("root.sch.bak")).unwrap(),
            ROOT
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("main.sch.bak")).unwrap(),
            MAIN
        );
        // Root had no components, so it round-trips unchanged.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("root.sch")).unwrap(),
            ROOT
        );
    }

    #[test]
    fn test_dnp_inserts_populate_and_hides_value() {
        let (dir, root) = setup();
        let mut bom = Bom::from_csv_str(CSV).unwrap();
        apply_to_schematic(&mut bom, &root).unwrap();

        let main = std::fs::read_to_string(dir.path().join("main.sch")).unwrap();
        // Value rewritten in place and hidden (flags 0001).
        assert!(main.contains("F 1 \"4k7\" H 3270 2155 50  0001 L CNN\n"));
        // Populate field cloned from the value line: same position, visible.
        assert!(main.contains("F 3 \"DNP\" H 3270 2155 50  0000 L CNN \"POP\"\n"));
        // Footprint updated, everything else untouched.
        assert!(main.contains("F 2 \"R_0805\" V 3130 2200 50  0001 C CNN\n"));
        assert!(main.contains("F 1 \"100nF\" H 3625 2100 50  0000 L CNN\n"));
        assert!(main.contains("L Device:C C2"));
    }

    #[test]
    fn test_unlisted_component_is_untouched() {
        let (dir, root) = setup();
        let csv = "Reference,Value\nR7,1k\n";
        let mut bom = Bom::from_csv_str(csv).unwrap();
        apply_to_schematic(&mut bom, &root).unwrap();

        let main = std::fs::read_to_string(dir.path().join("main.sch")).unwrap();
        assert!(main.contains("F 1 \"1k\" H 3270 2155 50  0000 L CNN\n"));
        // C2 has no BOM row; its block must be byte-identical.
        assert!(main.contains("F 1 \"100nF\" H 3625 2100 50  0000 L CNN\n"));
        assert!(main.contains("F 0 \"C2\" H 3625 2300 50  0000 L CNN\n"));
    }

    fn comp_from(block: &str) -> CompRecord {
        let mut reader = kct_stream::SchReader::new(block.as_bytes());
        while let Some(event) = reader.next_event().unwrap() {
            if event == Event::CompExit {
                return reader.comp().clone();
            }
        }
        panic!("no component in fixture");
    }

    #[test]
    fn test_symbol_prefix_rules() {
        let mut values = crate::Row::new();
        values.insert(SYMBOL.to_string(), "Device_R:R_US".to_string());
        let name_map: NameMap = [("Reference".to_string(), None)].into_iter().collect();

        let mut comp = comp_from("$Comp\nL Device:R R1\nF 0 \"R1\" H 1 2 50  0000 L CNN\n$EndComp\n");
        update_component(&mut comp, &values, &name_map, &HashMap::new());
        assert_eq!(comp.lib(), Some("Device_R:R_US"));

        // A 4.x-style current symbol (no colon) drops the incoming prefix.
        let mut comp = comp_from("$Comp\nL R R1\nF 0 \"R1\" H 1 2 50  0000 L CNN\n$EndComp\n");
        update_component(&mut comp, &values, &name_map, &HashMap::new());
        assert_eq!(comp.lib(), Some("R_US"));
    }
}
