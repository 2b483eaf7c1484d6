use crate::error::Result;
use cco_core::Event;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write one event as a single JSON line
#[inline]
pub fn write_event<W: Write + ?Sized>(sink: &mut W, event: &Event) -> Result<()> {
    serde_json::to_writer(&mut *sink, event)?;
    sink.write_all(b"\n")?;
    Ok(())
}

/// JSON-Lines writer for offline/batch import into the event store.
///
/// Lines have exactly the shape the live event client sends.
pub struct EventExporter<W: Write> {
    sink: W,
    lines: usize,
}

impl EventExporter<BufWriter<File>> {
    /// Append to `path`, creating it if needed
    pub fn append_to<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> EventExporter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink, lines: 0 }
    }

    pub fn write_event(&mut self, event: &Event) -> Result<()> {
        write_event(&mut self.sink, event)?;
        self.lines += 1;
        Ok(())
    }

    /// `$set` line for an entity
    pub fn export_entity(
        &mut self,
        entity_type: &str,
        entity_id: impl ToString,
        properties: Value,
    ) -> Result<()> {
        self.write_event(&Event::set_entity(entity_type, entity_id, properties))
    }

    /// User-to-item event line; `at` defaults to now
    pub fn export_event(
        &mut self,
        event: &str,
        user: impl ToString,
        item: impl ToString,
        properties: Value,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let at = at.unwrap_or_else(Utc::now);
        self.write_event(&Event::user_action(event, user, item, properties, at))
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush()?;
        Ok(())
    }

    /// Flush and hand back the sink
    pub fn into_inner(mut self) -> Result<W> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}
