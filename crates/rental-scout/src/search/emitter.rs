use std::io::{self, Write};

use super::domain::ListingRecord;

/// Writes one JSON object per line, flushing after every record.
#[derive(Debug)]
pub struct Emitter<W: Write> {
    out: W,
    emitted: usize,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W) -> Self {
        Self { out, emitted: 0 }
    }

    pub fn emit(&mut self, listing: &ListingRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, listing)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        self.emitted += 1;
        Ok(())
    }

    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
