//! Record source: reads an input file line by line and tokenizes lazily.
//!
//! The source owns its reader for its whole life. Dropping it releases the
//! file, so every exit path of a run closes the input. A source is
//! forward-only; re-reading requires opening a new one.

use crate::FieldRecord;
use crate::error::EtlError;
use crate::tokenizer::LineTokenizer;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Line filtering applied before tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOptions {
    /// Header lines dropped from the top of the input.
    pub lines_to_skip: usize,
    /// Lines starting with this prefix are ignored. Empty disables.
    pub comment_prefix: String,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            lines_to_skip: 0,
            comment_prefix: "#".to_string(),
        }
    }
}

/// Lazy, finite sequence of records read from one input.
pub struct RecordSource<R> {
    reader: R,
    tokenizer: Box<dyn LineTokenizer>,
    options: SourceOptions,
    line_number: usize,
    skipped: usize,
    done: bool,
}

impl RecordSource<BufReader<File>> {
    /// Open `path` for reading.
    pub fn open(
        path: &Path,
        tokenizer: Box<dyn LineTokenizer>,
        options: SourceOptions,
    ) -> Result<Self, EtlError> {
        let file = File::open(path).map_err(|source| EtlError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Opened input {}", path.display());
        Ok(Self::from_reader(BufReader::new(file), tokenizer, options))
    }
}

impl<R: BufRead> RecordSource<R> {
    /// Wrap an already open reader.
    pub fn from_reader(reader: R, tokenizer: Box<dyn LineTokenizer>, options: SourceOptions) -> Self {
        Self {
            reader,
            tokenizer,
            options,
            line_number: 0,
            skipped: 0,
            done: false,
        }
    }

    /// Physical lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Header, comment, and blank lines passed over so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn is_ignored(&self, line: &str) -> bool {
        if self.line_number <= self.options.lines_to_skip || line.is_empty() {
            return true;
        }
        !self.options.comment_prefix.is_empty() && line.starts_with(&self.options.comment_prefix)
    }

    fn next_line(&mut self) -> Result<Option<String>, EtlError> {
        let mut bytes = Vec::new();
        loop {
            bytes.clear();
            if self.reader.read_until(b'\n', &mut bytes)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let mut line = String::from_utf8(std::mem::take(&mut bytes)).map_err(|e| {
                EtlError::parse(self.line_number, format!("line is not valid UTF-8: {e}"))
            })?;
            let len = line.trim_end_matches(['\n', '\r']).len();
            line.truncate(len);
            if self.is_ignored(&line) {
                self.skipped += 1;
                continue;
            }
            return Ok(Some(line));
        }
    }
}

impl<R: BufRead> Iterator for RecordSource<R> {
    type Item = Result<FieldRecord, EtlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.next_line() {
            Ok(Some(line)) => self
                .tokenizer
                .tokenize(&line)
                .map_err(|e| EtlError::parse(self.line_number, e.0)),
            Ok(None) => {
                self.done = true;
                log::debug!(
                    "Input exhausted after {} lines ({} skipped)",
                    self.line_number,
                    self.skipped
                );
                return None;
            }
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::DelimitedTokenizer;
    use std::io::Cursor;

    fn csv_source(text: &str, options: SourceOptions) -> RecordSource<Cursor<Vec<u8>>> {
        let tokenizer = DelimitedTokenizer::new(
            vec!["lastName".to_string(), "firstName".to_string()],
            ",",
            None,
        )
        .unwrap();
        RecordSource::from_reader(Cursor::new(text.as_bytes().to_vec()), Box::new(tokenizer), options)
    }

    #[test]
    fn test_reads_all_records() {
        let source = csv_source("Smith,John\nDoe,Jane\n", SourceOptions::default());
        let records: Vec<FieldRecord> = source.map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("firstName").unwrap(), "Jane");
    }

    #[test]
    fn test_handles_crlf_and_missing_final_newline() {
        let source = csv_source("Smith,John\r\nDoe,Jane", SourceOptions::default());
        let records: Vec<FieldRecord> = source.map(|r| r.unwrap()).collect();
        assert_eq!(records[0].get("firstName").unwrap(), "John");
        assert_eq!(records[1].get("firstName").unwrap(), "Jane");
    }

    #[test]
    fn test_skips_header_comments_and_blanks() {
        let options = SourceOptions {
            lines_to_skip: 1,
            ..SourceOptions::default()
        };
        let mut source = csv_source("last,first\n# note\n\nSmith,John\n", options);
        let record = source.next().unwrap().unwrap();
        assert_eq!(record.get("lastName").unwrap(), "Smith");
        assert!(source.next().is_none());
        assert_eq!(source.skipped(), 3);
        assert_eq!(source.line_number(), 4);
    }

    #[test]
    fn test_comment_prefix_disabled() {
        let options = SourceOptions {
            lines_to_skip: 0,
            comment_prefix: String::new(),
        };
        let mut source = csv_source("#Smith,John\n", options);
        let record = source.next().unwrap().unwrap();
        assert_eq!(record.get("lastName").unwrap(), "#Smith");
    }

    #[test]
    fn test_parse_error_reports_physical_line_and_stops() {
        let mut source = csv_source("Smith,John\n\nbroken\nDoe,Jane\n", SourceOptions::default());
        assert!(source.next().unwrap().is_ok());
        match source.next().unwrap() {
            Err(EtlError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("Expected parse error, got {other:?}"),
        }
        assert!(source.next().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let tokenizer = DelimitedTokenizer::new(
            vec!["lastName".to_string(), "firstName".to_string()],
            ",",
            None,
        )
        .unwrap();
        let bytes = b"Smith,John\nD\xffe,Jane\nDoe,Jane\n".to_vec();
        let mut source =
            RecordSource::from_reader(Cursor::new(bytes), Box::new(tokenizer), SourceOptions::default());
        assert!(source.next().unwrap().is_ok());
        let err = source.next().unwrap().unwrap_err();
        assert!(matches!(err, EtlError::Parse { line: 2, .. }));
        assert_eq!(err.kind(), "ParseError");
        assert!(source.next().is_none());
        assert_eq!(source.line_number(), 2);
    }

    #[test]
    fn test_open_missing_file() {
        let tokenizer = DelimitedTokenizer::new(vec!["a".to_string()], ",", None).unwrap();
        let result = RecordSource::open(
            Path::new("/nonexistent/input.csv"),
            Box::new(tokenizer),
            SourceOptions::default(),
        );
        assert!(matches!(result, Err(EtlError::SourceUnavailable { .. })));
    }
}
