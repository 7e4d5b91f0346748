//! In-memory model of a multi-sheet legacy KiCad schematic.
//!
//! A hierarchical design is a set of `.sch` files where `$Sheet` blocks
//! reference sub-sheet files; the same file may be instantiated from several
//! places. [`SheetGraph`] loads every file of a hierarchy exactly once into
//! an arena and links sheet entries to their target files by index, so walks
//! over the hierarchy never chase ownership cycles.
//!
//! On top of the graph sit two derived structures:
//!
//! * [`RefIndex`] - resolves component references to their canonical AR path
//!   (annotation path, a `/`-joined chain of sheet unique IDs ending in the
//!   component unique ID) and groups references that share a component ID.
//! * [`ArTree`] - given a seed set of references, organises their equivalent
//!   references into a trie by sheet-ID prefix and enumerates *channels*:
//!   sibling instantiations of the same sub-circuit.

mod channel;
mod index;
pub mod paths;

pub use channel::{ArTree, Channels};
pub use index::{RefEntry, RefIndex};

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

use kct_stream::{Event, SchReader, StreamError};
use serde::Serialize;
use thiserror::Error;

/// Errors raised while loading or querying a schematic hierarchy.
#[derive(Debug, Error)]
pub enum SchError {
    #[error("failed to read sheet file {file}: {source}")]
    ReadSheet { file: String, source: io::Error },

    #[error("{file}: {source}")]
    Parse { file: String, source: StreamError },

    #[error("reference {0} is not present in the hierarchy")]
    UnknownReference(String),
}

/// Provider of sheet file contents, keyed by the relative file names used in
/// `F1` sheet fields. The filesystem implementation is [`DirSource`]; tests
/// and embedded tooling can use a plain `HashMap`.
pub trait SheetSource {
    fn read_sheet(&self, file: &str) -> io::Result<String>;
}

/// Reads sheet files relative to the directory of the root schematic.
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl SheetSource for DirSource {
    fn read_sheet(&self, file: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(file))
    }
}

impl SheetSource for HashMap<String, String> {
    fn read_sheet(&self, file: &str) -> io::Result<String> {
        self.get(file)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, file.to_string()))
    }
}

/// A `$Sheet` entry of one file: an instantiation of a sub-sheet file.
#[derive(Debug, Clone, Serialize)]
pub struct SheetRef {
    /// Sheet unique ID (one segment of an AR path).
    pub id: String,
    /// Display name shown on the parent sheet.
    pub name: String,
    /// Relative file name of the sub-sheet.
    pub file: String,
    /// Arena index of the target file, filled by the link pass.
    pub target: Option<usize>,
}

/// Per-instantiation reference/part override from an `AR` line.
#[derive(Debug, Clone, Serialize)]
pub struct ArOverride {
    pub reference: String,
    pub part: String,
}

/// A component field captured by value (name resolved, quotes stripped).
#[derive(Debug, Clone, Serialize)]
pub struct FieldValue {
    pub name: String,
    pub value: String,
}

/// A component of one sheet file.
#[derive(Debug, Clone, Serialize)]
pub struct CompEntry {
    pub lib: String,
    pub reference: String,
    pub part: String,
    pub id: String,
    /// AR path → override, for components instantiated more than once.
    pub ar: HashMap<String, ArOverride>,
    /// Field number → name/value.
    pub fields: BTreeMap<u32, FieldValue>,
}

/// One parsed sheet file.
#[derive(Debug, Clone, Serialize)]
pub struct SheetFile {
    /// The relative name this file is referenced by.
    pub path: String,
    /// Sub-sheet instantiations, in file order.
    pub sheets: Vec<SheetRef>,
    /// Components, in file order. Power symbols (`#…` references) are
    /// dropped at parse time.
    pub comps: Vec<CompEntry>,
}

/// The loaded hierarchy: an arena of sheet files with the root at index 0.
#[derive(Debug, Serialize)]
pub struct SheetGraph {
    files: Vec<SheetFile>,
    by_name: HashMap<String, usize>,
}

impl SheetGraph {
    /// Load the hierarchy rooted at `root_file`. Every referenced file is
    /// parsed at most once; a sheet referencing an already-loaded file (the
    /// hierarchy is a DAG through shared sub-sheets) just links to it.
    pub fn load(source: &dyn SheetSource, root_file: &str) -> Result<Self, SchError> {
        let mut files: Vec<SheetFile> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut queue = VecDeque::from([root_file.to_string()]);

        while let Some(name) = queue.pop_front() {
            if by_name.contains_key(&name) {
                continue;
            }
            let content = source
                .read_sheet(&name)
                .map_err(|source| SchError::ReadSheet { file: name.clone(), source })?;
            let file = parse_sheet_file(&name, &content)?;
            log::debug!(
                "loaded {name}: {} sub-sheet(s), {} component(s)",
                file.sheets.len(),
                file.comps.len()
            );
            for sub in &file.sheets {
                queue.push_back(sub.file.clone());
            }
            by_name.insert(name, files.len());
            files.push(file);
        }

        for file in &mut files {
            for sheet in &mut file.sheets {
                sheet.target = by_name.get(&sheet.file).copied();
            }
        }
        Ok(Self { files, by_name })
    }

    /// Load from the filesystem, splitting `root` into directory and file
    /// name.
    pub fn load_from_path(root: &Path) -> Result<Self, SchError> {
        let dir = root.parent().unwrap_or_else(|| Path::new("."));
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::load(&DirSource::new(dir), &name)
    }

    pub fn root(&self) -> &SheetFile {
        &self.files[0]
    }

    pub fn files(&self) -> &[SheetFile] {
        &self.files
    }

    pub fn file(&self, index: usize) -> &SheetFile {
        &self.files[index]
    }

    pub fn file_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Convert an AR path (sheet IDs, optionally ending in a component ID)
    /// into the `/`-joined display names of the sheets along it. Unknown
    /// trailing segments (normally the component ID) are ignored.
    pub fn user_path(&self, ar_path: &str) -> String {
        let mut names: Vec<&str> = Vec::new();
        let mut file = self.root();
        'segments: for segment in ar_path.split('/').filter(|s| !s.is_empty()) {
            for sheet in &file.sheets {
                if sheet.id == segment {
                    names.push(&sheet.name);
                    match sheet.target {
                        Some(target) => {
                            file = &self.files[target];
                            continue 'segments;
                        }
                        None => break 'segments,
                    }
                }
            }
            break;
        }
        names.join("/")
    }
}

fn parse_sheet_file(name: &str, content: &str) -> Result<SheetFile, SchError> {
    let mut reader = SchReader::new(content.as_bytes());
    let mut file = SheetFile {
        path: name.to_string(),
        sheets: Vec::new(),
        comps: Vec::new(),
    };
    loop {
        let event = reader
            .next_event()
            .map_err(|source| SchError::Parse { file: name.to_string(), source })?;
        match event {
            None => break,
            Some(Event::SheetExit) => {
                let sheet = reader.sheet();
                file.sheets.push(SheetRef {
                    id: sheet.id().unwrap_or_default().to_string(),
                    name: sheet.name().unwrap_or_default().to_string(),
                    file: sheet.file().unwrap_or_default().to_string(),
                    target: None,
                });
            }
            Some(Event::CompExit) => {
                let comp = reader.comp();
                let reference = comp.reference().unwrap_or_default();
                if reference.starts_with('#') {
                    continue;
                }
                file.comps.push(CompEntry {
                    lib: comp.lib().unwrap_or_default().to_string(),
                    reference: reference.to_string(),
                    part: comp.part().unwrap_or_default().to_string(),
                    id: comp.id().unwrap_or_default().to_string(),
                    ar: comp
                        .ar
                        .iter()
                        .map(|entry| {
                            (
                                entry.path.clone(),
                                ArOverride {
                                    reference: entry.reference.value(&comp.lines).to_string(),
                                    part: entry.part.value(&comp.lines).to_string(),
                                },
                            )
                        })
                        .collect(),
                    fields: comp
                        .fields
                        .iter()
                        .map(|(&number, field)| {
                            (
                                number,
                                FieldValue {
                                    name: field.name.value(&comp.lines).to_string(),
                                    value: field.value.value(&comp.lines).to_string(),
                                },
                            )
                        })
                        .collect(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(file)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;

    /// A stereo hierarchy: the root instantiates `amp.sch` twice (sheet IDs
    /// `5A000001` and `5A000002`); the amp sheet holds `R1`/`C1` which the
    /// second instantiation annotates as `R2`/`C2`.
    pub fn stereo() -> HashMap<String, String> {
        let mut files = HashMap::new();
        files.insert("stereo.sch".to_string(), ROOT.to_string());
        files.insert("amp.sch".to_string(), AMP.to_string());
        files
    }

    pub const ROOT: &str = "\
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
$Comp
L power:GND #PWR01
U 1 1 5A00F000
P 3000 3900
F 0 \"#PWR01\" H 3000 3650 50  0001 C CNN
$EndComp
$Comp
L Device:LED D9
U 1 1 5A00D009
P 6100 3300
F 0 \"D9\" H 6100 3400 50  0000 C CNN
F 1 \"PWR\" H 6100 3200 50  0000 C CNN
$EndComp
$EndSCHEMATC
";

    pub const AMP: &str = "\
EESchema Schematic File Version 4
$Comp
L Device:R R1
U 1 1 00AB0001
P 3200 2200
AR Path=\"/5A000001/00AB0001\" Ref=\"R1\"  Part=\"1\"
AR Path=\"/5A000002/00AB0001\" Ref=\"R2\"  Part=\"1\"
F 0 \"R1\" H 3270 2245 50  0000 L CNN
F 1 \"10k\" H 3270 2155 50  0000 L CNN
$EndComp
$Comp
L Device:C C1
U 1 1 00AB0002
P 3600 2200
AR Path=\"/5A000001/00AB0002\" Ref=\"C1\"  Part=\"1\"
AR Path=\"/5A000002/00AB0002\" Ref=\"C2\"  Part=\"1\"
F 0 \"C1\" H 3625 2300 50  0000 L CNN
F 1 \"100nF\" H 3625 2100 50  0000 L CNN
$EndComp
$EndSCHEMATC
";
}
