//! Record sinks: own the output stream and its structure.
//!
//! A sink writes a prologue once when opened, one committed chunk of
//! serialized fragments at a time, and an epilogue once when closed.
//! Closing also happens on drop, so output is flushed and markup stays
//! well-formed even when a run aborts partway.

use crate::error::EtlError;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Destination for committed chunks.
pub trait RecordSink {
    /// Write and flush one chunk of fragments.
    fn write_chunk(&mut self, fragments: &[String]) -> Result<(), EtlError>;

    /// Write the epilogue and flush. Further calls do nothing.
    fn close(&mut self) -> Result<(), EtlError>;
}

/// Output structure around the fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkLayout {
    /// One fragment per line, with optional literal first and last lines.
    Lines {
        header: Option<String>,
        footer: Option<String>,
    },
    /// Fragments concatenated inside `<root>...</root>`.
    Markup { root_tag: String },
}

impl SinkLayout {
    pub fn lines() -> Self {
        SinkLayout::Lines {
            header: None,
            footer: None,
        }
    }

    fn write_prologue<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            SinkLayout::Lines { header: Some(h), .. } => writeln!(writer, "{h}"),
            SinkLayout::Lines { header: None, .. } => Ok(()),
            SinkLayout::Markup { root_tag } => Writer::new(writer)
                .write_event(Event::Start(BytesStart::new(root_tag.as_str()))),
        }
    }

    fn write_epilogue<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            SinkLayout::Lines { footer: Some(f), .. } => writeln!(writer, "{f}"),
            SinkLayout::Lines { footer: None, .. } => Ok(()),
            SinkLayout::Markup { root_tag } => {
                Writer::new(writer).write_event(Event::End(BytesEnd::new(root_tag.as_str())))
            }
        }
    }

    fn terminator(&self) -> &'static str {
        match self {
            SinkLayout::Lines { .. } => "\n",
            SinkLayout::Markup { .. } => "",
        }
    }
}

/// Sink over any writer.
///
/// Each chunk is assembled in memory and handed to the writer in a single
/// `write_all`, so a failed chunk leaves nothing of itself buffered.
pub struct WriterSink<W: Write> {
    writer: W,
    layout: SinkLayout,
    closed: bool,
}

/// Sink writing to a file.
pub type FileSink = WriterSink<File>;

impl FileSink {
    /// Create (or truncate) `path` and write the prologue.
    pub fn open(path: &Path, layout: SinkLayout) -> Result<Self, EtlError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| EtlError::SinkUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(path).map_err(|source| EtlError::SinkUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Opened output {}", path.display());
        WriterSink::new(file, layout)
    }
}

impl<W: Write> WriterSink<W> {
    /// Wrap `writer` and write the prologue.
    pub fn new(mut writer: W, layout: SinkLayout) -> Result<Self, EtlError> {
        layout.write_prologue(&mut writer).map_err(EtlError::Write)?;
        Ok(Self {
            writer,
            layout,
            closed: false,
        })
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> RecordSink for WriterSink<W> {
    fn write_chunk(&mut self, fragments: &[String]) -> Result<(), EtlError> {
        let terminator = self.layout.terminator();
        let mut chunk = String::with_capacity(
            fragments.iter().map(|f| f.len() + terminator.len()).sum(),
        );
        for fragment in fragments {
            chunk.push_str(fragment);
            chunk.push_str(terminator);
        }
        self.writer
            .write_all(chunk.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(EtlError::Write)
    }

    fn close(&mut self) -> Result<(), EtlError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.layout
            .write_epilogue(&mut self.writer)
            .and_then(|_| self.writer.flush())
            .map_err(EtlError::Write)
    }
}

impl<W: Write> Drop for WriterSink<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Failed to close output: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text<W: Write>(sink: &WriterSink<W>) -> String
    where
        W: AsRef<[u8]>,
    {
        String::from_utf8(sink.get_ref().as_ref().to_vec()).unwrap()
    }

    fn fragments(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_lines_layout() {
        let mut sink = WriterSink::new(Vec::new(), SinkLayout::lines()).unwrap();
        sink.write_chunk(&fragments(&["John,Smith", "Jane,Doe"])).unwrap();
        sink.close().unwrap();
        assert_eq!(text(&sink), "John,Smith\nJane,Doe\n");
    }

    #[test]
    fn test_lines_header_footer() {
        let layout = SinkLayout::Lines {
            header: Some("first,last".to_string()),
            footer: Some("END".to_string()),
        };
        let mut sink = WriterSink::new(Vec::new(), layout).unwrap();
        sink.write_chunk(&fragments(&["John,Smith"])).unwrap();
        sink.close().unwrap();
        assert_eq!(text(&sink), "first,last\nJohn,Smith\nEND\n");
    }

    #[test]
    fn test_markup_layout_empty() {
        let layout = SinkLayout::Markup {
            root_tag: "Persons".to_string(),
        };
        let mut sink = WriterSink::new(Vec::new(), layout).unwrap();
        sink.close().unwrap();
        assert_eq!(text(&sink), "<Persons></Persons>");
    }

    #[test]
    fn test_close_is_idempotent() {
        let layout = SinkLayout::Markup {
            root_tag: "R".to_string(),
        };
        let mut sink = WriterSink::new(Vec::new(), layout).unwrap();
        sink.write_chunk(&fragments(&["<E></E>"])).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert_eq!(text(&sink), "<R><E></E></R>");
    }

    #[test]
    fn test_drop_writes_epilogue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xml");
        {
            let layout = SinkLayout::Markup {
                root_tag: "Persons".to_string(),
            };
            let mut sink = FileSink::open(&path, layout).unwrap();
            sink.write_chunk(&fragments(&["<Person></Person>"])).unwrap();
        }
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "<Persons><Person></Person></Persons>");
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.csv");
        let mut sink = FileSink::open(&path, SinkLayout::lines()).unwrap();
        sink.close().unwrap();
        assert!(path.exists());
    }

    /// Writer that rejects any write containing `reject`.
    struct RejectingWriter {
        written: Vec<u8>,
        reject: &'static str,
    }

    impl Write for RejectingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.windows(self.reject.len()).any(|w| w == self.reject.as_bytes()) {
                return Err(io::Error::other("device full"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failed_chunk_leaves_no_fragments() {
        let writer = RejectingWriter {
            written: Vec::new(),
            reject: "<Bad>",
        };
        let layout = SinkLayout::Markup {
            root_tag: "Persons".to_string(),
        };
        let mut sink = WriterSink::new(writer, layout).unwrap();
        sink.write_chunk(&fragments(&["<Person>1</Person>"])).unwrap();
        let result = sink.write_chunk(&fragments(&["<Person>2</Person>", "<Bad>"]));
        assert!(matches!(result, Err(EtlError::Write(_))));
        sink.close().unwrap();
        assert_eq!(
            String::from_utf8(sink.get_ref().written.clone()).unwrap(),
            "<Persons><Person>1</Person></Persons>"
        );
    }

    #[test]
    fn test_open_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSink::open(dir.path(), SinkLayout::lines());
        assert!(matches!(result, Err(EtlError::SinkUnavailable { .. })));
    }
}
