//! Stream mapper: the reader's event loop plus a pass-through output sink.

use std::io::{BufRead, Write};

use crate::{Event, SchReader, StreamError};

/// What still has to be written before the stream may advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    Sheet,
    Comp,
}

/// Drives a [`SchReader`] while copying the input to `out`.
///
/// Ordering contract:
///
/// 1. Lines outside any record, and the `$Sheet`/`$Comp` enter lines, are
///    written before their event is returned.
/// 2. A record's body is held back until the iteration advances past its
///    `*Exit` event (or [`SchMapper::finish`] runs), then written as the
///    concatenation of its (possibly mutated) line buffers followed by
///    the `$End*` line. The consumer may therefore still edit the record
///    while handling `*Exit`.
///
/// With no mutating consumer the output is byte-identical to the input.
pub struct SchMapper<R: BufRead, W: Write> {
    reader: SchReader<R>,
    out: W,
    pending: Pending,
}

impl<R: BufRead, W: Write> SchMapper<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self {
            reader: SchReader::new(input),
            out,
            pending: Pending::None,
        }
    }

    /// The underlying reader, for record access between events.
    pub fn reader(&self) -> &SchReader<R> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut SchReader<R> {
        &mut self.reader
    }

    pub fn next_event(&mut self) -> Result<Option<Event>, StreamError> {
        self.flush_pending()?;
        let event = self.reader.next_event()?;
        match event {
            Some(Event::Other | Event::SheetEnter | Event::CompEnter) => {
                self.out.write_all(self.reader.line().as_bytes())?;
            }
            Some(Event::SheetExit) => self.pending = Pending::Sheet,
            Some(Event::CompExit) => self.pending = Pending::Comp,
            Some(Event::SheetItem | Event::CompItem) | None => {}
        }
        Ok(event)
    }

    fn flush_pending(&mut self) -> Result<(), StreamError> {
        let lines = match self.pending {
            Pending::None => return Ok(()),
            Pending::Sheet => &self.reader.sheet().lines,
            Pending::Comp => &self.reader.comp().lines,
        };
        for line in lines {
            for token in line {
                self.out.write_all(token.as_bytes())?;
            }
        }
        // The $End* line that closed the record.
        self.out.write_all(self.reader.line().as_bytes())?;
        self.pending = Pending::None;
        Ok(())
    }

    /// Flush any held-back record and hand back the sink.
    pub fn finish(mut self) -> Result<W, StreamError> {
        self.flush_pending()?;
        self.out.flush()?;
        Ok(self.out)
    }
}
