//! Pull-based event iterator over a schematic stream.

use std::io::BufRead;

use crate::{CompRecord, SheetRecord, StreamError};

/// What the reader saw on the line it just consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    SheetEnter,
    SheetItem,
    SheetExit,
    CompEnter,
    CompItem,
    CompExit,
    /// A line outside any record, passed through untouched.
    Other,
}

/// Block kind on the nesting stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Sheet,
    Comp,
}

/// Streaming reader for `$Sheet`/`$Comp` records.
///
/// The caller drives it with [`SchReader::next_event`] and is the sole owner
/// of the open record between an `*Enter` and the following `*Exit` event.
/// Record buffers survive past `*Exit` (they are only reset when the next
/// record of the same kind opens), so a consumer reacting to `*Exit` still
/// sees, and may still mutate, the complete record.
pub struct SchReader<R: BufRead> {
    input: R,
    line: String,
    line_no: usize,
    stack: Vec<Block>,
    sheet: SheetRecord,
    comp: CompRecord,
}

impl<R: BufRead> SchReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: String::new(),
            line_no: 0,
            stack: Vec::new(),
            sheet: SheetRecord::default(),
            comp: CompRecord::default(),
        }
    }

    /// The raw text of the line behind the most recent event, end-of-line
    /// bytes included.
    pub fn line(&self) -> &str {
        &self.line
    }

    /// 1-based number of the line behind the most recent event.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// The sheet record currently (or last) open.
    pub fn sheet(&self) -> &SheetRecord {
        &self.sheet
    }

    pub fn sheet_mut(&mut self) -> &mut SheetRecord {
        &mut self.sheet
    }

    /// The component record currently (or last) open.
    pub fn comp(&self) -> &CompRecord {
        &self.comp
    }

    pub fn comp_mut(&mut self) -> &mut CompRecord {
        &mut self.comp
    }

    /// Advance to the next line and classify it. Returns `None` at end of
    /// input; a mismatched or missing `$End*` terminates iteration with an
    /// error carrying the offending line number.
    pub fn next_event(&mut self) -> Result<Option<Event>, StreamError> {
        self.line.clear();
        if self.input.read_line(&mut self.line)? == 0 {
            if let Some(block) = self.stack.pop() {
                return Err(StreamError::UnclosedBlock {
                    line: self.line_no,
                    tag: match block {
                        Block::Sheet => "$Sheet",
                        Block::Comp => "$Comp",
                    },
                });
            }
            return Ok(None);
        }
        self.line_no += 1;

        let event = match self.line.trim() {
            "$Sheet" => {
                self.stack.push(Block::Sheet);
                self.sheet = SheetRecord::default();
                Event::SheetEnter
            }
            "$EndSheet" => match self.stack.pop() {
                Some(Block::Sheet) => Event::SheetExit,
                _ => {
                    return Err(StreamError::UnbalancedExit {
                        line: self.line_no,
                        tag: "$EndSheet",
                    })
                }
            },
            "$Comp" => {
                self.stack.push(Block::Comp);
                self.comp = CompRecord::default();
                Event::CompEnter
            }
            "$EndComp" => match self.stack.pop() {
                Some(Block::Comp) => Event::CompExit,
                _ => {
                    return Err(StreamError::UnbalancedExit {
                        line: self.line_no,
                        tag: "$EndComp",
                    })
                }
            },
            _ => match self.stack.last() {
                Some(Block::Sheet) => {
                    self.sheet.absorb(&self.line);
                    Event::SheetItem
                }
                Some(Block::Comp) => {
                    self.comp.absorb(&self.line);
                    Event::CompItem
                }
                None => Event::Other,
            },
        };
        Ok(Some(event))
    }
}
