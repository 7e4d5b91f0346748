//! Parsed sheet and component records.
//!
//! A record owns the tokenized body lines of one `$Sheet…$EndSheet` or
//! `$Comp…$EndComp` block and exposes the recognised fields as views into
//! those lines. The enter/exit lines themselves are not part of the body.

use std::collections::BTreeMap;

use crate::{tokenize, Line, Slot, TokenView};

/// Names KiCad gives the four fixed component fields.
pub const DEFAULT_FIELD_NAMES: [&str; 4] = ["Reference", "Value", "Footprint", "Datasheet"];

fn default_field_name(number: u32) -> String {
    DEFAULT_FIELD_NAMES
        .get(number as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("Field{number}"))
}

/// Body of a `$Sheet` block: `U <id>`, `F0 "<name>"`, `F1 "<file>" <size>`.
#[derive(Debug, Default, Clone)]
pub struct SheetRecord {
    pub lines: Vec<Line>,
    pub id: Option<TokenView>,
    pub name: Option<TokenView>,
    pub file: Option<TokenView>,
}

impl SheetRecord {
    pub(crate) fn absorb(&mut self, raw: &str) {
        let tokens = tokenize(raw);
        let line = self.lines.len();
        match tokens.get(1).map(String::as_str) {
            Some("U") if tokens.len() > 3 => self.id = Some(TokenView::new(line, 3)),
            Some("F0") if tokens.len() > 3 => self.name = Some(TokenView::new(line, 3)),
            Some("F1") if tokens.len() > 3 => self.file = Some(TokenView::new(line, 3)),
            _ => {}
        }
        self.lines.push(tokens);
    }

    pub fn id(&self) -> Option<&str> {
        self.id.map(|v| v.value(&self.lines))
    }

    pub fn name(&self) -> Option<&str> {
        self.name.map(|v| v.value(&self.lines))
    }

    pub fn file(&self) -> Option<&str> {
        self.file.map(|v| v.value(&self.lines))
    }
}

/// One `AR Path="…" Ref="…" Part="…"` alternate-reference entry.
///
/// The `reference` and `part` views start right after the `Ref=`/`Part=`
/// prefix and run to the end of their token, quotes included.
#[derive(Debug, Clone)]
pub struct ArEntry {
    pub path: String,
    pub reference: TokenView,
    pub part: TokenView,
}

/// One `F <n> "<value>" …` field line of a component.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub number: TokenView,
    pub value: TokenView,
    pub pos_x: Option<TokenView>,
    pub pos_y: Option<TokenView>,
    pub flags: Option<TokenView>,
    pub name: Slot,
}

/// Body of a `$Comp` block.
#[derive(Debug, Default, Clone)]
pub struct CompRecord {
    pub lines: Vec<Line>,
    pub lib: Option<TokenView>,
    pub reference: Option<TokenView>,
    pub part: Option<TokenView>,
    pub id: Option<TokenView>,
    pub ar: Vec<ArEntry>,
    pub fields: BTreeMap<u32, FieldEntry>,
}

/// Token index of a field's trailing name, after index-0 normalisation.
const FIELD_NAME_TOKEN: usize = 21;

impl CompRecord {
    pub(crate) fn absorb(&mut self, raw: &str) {
        let tokens = tokenize(raw);
        let line = self.lines.len();
        match tokens.get(1).map(String::as_str) {
            Some("L") if tokens.len() > 5 => {
                self.lib = Some(TokenView::new(line, 3));
                self.reference = Some(TokenView::new(line, 5));
            }
            Some("U") if tokens.len() > 7 => {
                self.part = Some(TokenView::new(line, 3));
                self.id = Some(TokenView::new(line, 7));
            }
            Some("AR") if tokens.len() > 7 => {
                if let Some(entry) = Self::parse_ar(&tokens, line) {
                    self.ar.push(entry);
                }
            }
            Some("F") if tokens.len() > 5 => {
                if let Ok(number) = tokens[3].parse::<u32>() {
                    self.fields.insert(number, Self::parse_field(&tokens, line, number));
                } else {
                    log::warn!("ignoring field line with non-numeric number: {raw:?}");
                }
            }
            _ => {}
        }
        self.lines.push(tokens);
    }

    fn parse_ar(tokens: &Line, line: usize) -> Option<ArEntry> {
        let path = tokens[3].split_once('=').map(|(_, v)| crate::unquote(v))?;
        let after_eq = |tok: &str| tok.find('=').map(|i| i + 1).unwrap_or(0);
        Some(ArEntry {
            path: path.to_string(),
            reference: TokenView::with_range(line, 5, after_eq(&tokens[5]), None),
            part: TokenView::with_range(line, 7, after_eq(&tokens[7]), None),
        })
    }

    fn parse_field(tokens: &Line, line: usize, number: u32) -> FieldEntry {
        let opt = |idx: usize| (tokens.len() > idx).then(|| TokenView::new(line, idx));
        let name = if tokens.len() > FIELD_NAME_TOKEN {
            Slot::Token(TokenView::new(line, FIELD_NAME_TOKEN))
        } else {
            Slot::Virtual {
                value: default_field_name(number),
                line,
                token: FIELD_NAME_TOKEN,
            }
        };
        FieldEntry {
            number: TokenView::new(line, 3),
            value: TokenView::new(line, 5),
            pos_x: opt(9),
            pos_y: opt(11),
            flags: opt(15),
            name,
        }
    }

    pub fn lib(&self) -> Option<&str> {
        self.lib.map(|v| v.value(&self.lines))
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.map(|v| v.value(&self.lines))
    }

    pub fn part(&self) -> Option<&str> {
        self.part.map(|v| v.value(&self.lines))
    }

    pub fn id(&self) -> Option<&str> {
        self.id.map(|v| v.value(&self.lines))
    }

    pub fn field_value(&self, number: u32) -> Option<&str> {
        self.fields.get(&number).map(|f| f.value.value(&self.lines))
    }

    pub fn field_name(&self, number: u32) -> Option<&str> {
        self.fields.get(&number).map(|f| f.name.value(&self.lines))
    }

    pub fn max_field_number(&self) -> Option<u32> {
        self.fields.keys().next_back().copied()
    }

    /// Deep-clone the backing line of field `src` and register it as a new
    /// field. The clone is spliced in right after `insert_after`'s line (or
    /// appended to the record's buffers), every view of the source field is
    /// re-derived over the cloned line, and the next free field number is
    /// assigned and written through. Returns the new field's number.
    pub fn duplicate_field(&mut self, src: u32, insert_after: Option<u32>) -> Option<u32> {
        let src_entry = self.fields.get(&src)?.clone();
        let cloned = self.lines[src_entry.value.line].clone();

        let at = insert_after
            .and_then(|n| self.fields.get(&n))
            .map(|f| f.value.line + 1)
            .unwrap_or(self.lines.len());
        self.lines.insert(at, cloned);
        self.for_each_view_line(|line| {
            if *line >= at {
                *line += 1;
            }
        });

        let number = self.max_field_number().unwrap_or(0) + 1;
        let mut entry = FieldEntry {
            number: src_entry.number.clone_onto(at),
            value: src_entry.value.clone_onto(at),
            pos_x: src_entry.pos_x.map(|v| v.clone_onto(at)),
            pos_y: src_entry.pos_y.map(|v| v.clone_onto(at)),
            flags: src_entry.flags.map(|v| v.clone_onto(at)),
            name: src_entry.name.clone_onto(at),
        };
        entry.number.set(&mut self.lines, &number.to_string());
        self.fields.insert(number, entry);
        Some(number)
    }

    /// Remove a field and its backing line. Returns false if the field does
    /// not exist.
    pub fn delete_field(&mut self, number: u32) -> bool {
        let Some(entry) = self.fields.remove(&number) else {
            return false;
        };
        let at = entry.value.line;
        self.lines.remove(at);
        self.for_each_view_line(|line| {
            if *line > at {
                *line -= 1;
            }
        });
        true
    }

    fn for_each_view_line(&mut self, mut f: impl FnMut(&mut usize)) {
        for view in [&mut self.lib, &mut self.reference, &mut self.part, &mut self.id]
            .into_iter()
            .flatten()
        {
            f(&mut view.line);
        }
        for ar in &mut self.ar {
            f(&mut ar.reference.line);
            f(&mut ar.part.line);
        }
        for field in self.fields.values_mut() {
            f(&mut field.number.line);
            f(&mut field.value.line);
            for view in [&mut field.pos_x, &mut field.pos_y, &mut field.flags]
                .into_iter()
                .flatten()
            {
                f(&mut view.line);
            }
            match &mut field.name {
                Slot::Token(view) => f(&mut view.line),
                Slot::Virtual { line, .. } => f(line),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp_from(lines: &[&str]) -> CompRecord {
        let mut comp = CompRecord::default();
        for line in lines {
            comp.absorb(line);
        }
        comp
    }

    const R7_BLOCK: &[&str] = &[
        "L Device:R R7\n",
        "U 1 1 5AB10001\n",
        "P 4500 3200\n",
        "AR Path=\"/5A000001/5AB10001\" Ref=\"R7\"  Part=\"1\" \n",
        "F 0 \"R7\" H 4570 3245 50  0000 L CNN\n",
        "F 1 \"10k\" H 4570 3155 50  0000 L CNN\n",
        "F 2 \"R_0603\" V 4430 3200 50  0001 C CNN\n",
        "	1    4500 3200\n",
        "	1    0    0    -1  \n",
    ];

    #[test]
    fn test_comp_views() {
        let comp = comp_from(R7_BLOCK);
        assert_eq!(comp.lib(), Some("Device:R"));
        assert_eq!(comp.reference(), Some("R7"));
        assert_eq!(comp.part(), Some("1"));
        assert_eq!(comp.id(), Some("5AB10001"));
        assert_eq!(comp.field_value(0), Some("R7"));
        assert_eq!(comp.field_value(1), Some("10k"));
        assert_eq!(comp.field_value(2), Some("R_0603"));
        assert_eq!(comp.field_name(0), Some("Reference"));
        assert_eq!(comp.field_name(1), Some("Value"));
        assert_eq!(comp.max_field_number(), Some(2));

        assert_eq!(comp.ar.len(), 1);
        assert_eq!(comp.ar[0].path, "/5A000001/5AB10001");
        assert_eq!(comp.ar[0].reference.value(&comp.lines), "R7");
        assert_eq!(comp.ar[0].part.value(&comp.lines), "1");
    }

    #[test]
    fn test_sheet_views() {
        let mut sheet = SheetRecord::default();
        for line in [
            "S 2500 1500 1500 1200\n",
            "U 5A000001\n",
            "F0 \"Amp Channel\" 50\n",
            "F1 \"amp.sch\" 50\n",
        ] {
            sheet.absorb(line);
        }
        assert_eq!(sheet.id(), Some("5A000001"));
        assert_eq!(sheet.name(), Some("Amp Channel"));
        assert_eq!(sheet.file(), Some("amp.sch"));
    }

    #[test]
    fn test_field_edit_is_local() {
        let mut comp = comp_from(R7_BLOCK);
        let before: Vec<String> = comp.lines.iter().map(|l| l.concat()).collect();

        let CompRecord { lines, fields, .. } = &mut comp;
        fields.get_mut(&1).unwrap().value.set_quoted(lines, "22k");

        for (i, line) in comp.lines.iter().enumerate() {
            let now = line.concat();
            if i == 5 {
                assert_eq!(now, "F 1 \"22k\" H 4570 3155 50  0000 L CNN\n");
            } else {
                assert_eq!(now, before[i]);
            }
        }
    }

    #[test]
    fn test_duplicate_field_after_last() {
        let mut comp = comp_from(R7_BLOCK);
        let number = comp.duplicate_field(1, Some(2)).unwrap();
        assert_eq!(number, 3);

        // Cloned line sits right after F 2, position lines untouched after it.
        assert_eq!(comp.lines[7].concat(), "F 3 \"10k\" H 4570 3155 50  0000 L CNN\n");
        assert_eq!(comp.lines[8].concat(), "	1    4500 3200\n");

        let CompRecord { lines, fields, .. } = &mut comp;
        let entry = fields.get_mut(&number).unwrap();
        entry.value.set_quoted(lines, "DNP");
        entry.name.set_quoted(lines, "Populate");
        assert_eq!(
            comp.lines[7].concat(),
            "F 3 \"DNP\" H 4570 3155 50  0000 L CNN \"Populate\"\n"
        );

        // Views of earlier fields are unaffected.
        assert_eq!(comp.field_value(1), Some("10k"));
    }

    #[test]
    fn test_duplicate_shifts_following_views() {
        let mut comp = comp_from(R7_BLOCK);
        let number = comp.duplicate_field(0, Some(0)).unwrap();
        assert_eq!(number, 3);
        // F1/F2 moved down one line but still read correctly.
        assert_eq!(comp.field_value(1), Some("10k"));
        assert_eq!(comp.field_value(2), Some("R_0603"));
        assert_eq!(comp.field_value(3), Some("R7"));
    }

    #[test]
    fn test_delete_field() {
        let mut comp = comp_from(R7_BLOCK);
        assert!(comp.delete_field(1));
        assert!(!comp.delete_field(1));
        assert_eq!(comp.lines.len(), R7_BLOCK.len() - 1);
        assert_eq!(comp.field_value(2), Some("R_0603"));
        assert_eq!(comp.lines[5].concat(), "F 2 \"R_0603\" V 4430 3200 50  0001 C CNN\n");
    }

    #[test]
    fn test_synthetic_field_name_for_high_numbers() {
        let mut comp = CompRecord::default();
        comp.absorb("F 4 \"extra\" H 100 200 50 0000 C CNN\n");
        assert_eq!(comp.field_name(4), Some("Field4"));
    }
}
