//! Line tokenizers: one raw input line in, one [`FieldRecord`] out.
//!
//! Two layouts are supported:
//! - **Delimited**: fields separated by a delimiter string, optionally quoted
//! - **Fixed width**: fields cut from 1-based inclusive column ranges
//!
//! The layout is described by a [`TokenizerSpec`] and turned into a boxed
//! [`LineTokenizer`] once, before any line is read.

use crate::FieldRecord;
use crate::error::EtlError;
use std::fmt;
use thiserror::Error;

/// Why a single line could not be tokenized.
///
/// Carries no line number; [`crate::RecordSource`] adds that when it
/// converts this into [`EtlError::Parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TokenizeError(pub String);

/// Turns one raw line into a record.
pub trait LineTokenizer {
    fn tokenize(&self, line: &str) -> Result<FieldRecord, TokenizeError>;

    /// Field names this tokenizer assigns, in order.
    fn names(&self) -> &[String];
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// 1-based inclusive column range. `end == None` runs to the end of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl ColumnRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn open(start: usize) -> Self {
        Self { start, end: None }
    }

    /// Parse a range list such as `1-3,4-6,7-`.
    ///
    /// A bare number `5` is the single column `5-5`.
    pub fn parse_list(text: &str) -> Result<Vec<ColumnRange>, EtlError> {
        let mut ranges = Vec::new();
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(EtlError::config(format!("empty column range in '{text}'")));
            }
            let range = match part.split_once('-') {
                Some((start, "")) => ColumnRange::open(parse_column(start, part)?),
                Some((start, end)) => {
                    ColumnRange::new(parse_column(start, part)?, parse_column(end, part)?)
                }
                None => {
                    let col = parse_column(part, part)?;
                    ColumnRange::new(col, col)
                }
            };
            ranges.push(range);
        }
        Ok(ranges)
    }
}

fn parse_column(text: &str, range: &str) -> Result<usize, EtlError> {
    text.trim()
        .parse()
        .map_err(|_| EtlError::config(format!("invalid column number in range '{range}'")))
}

impl fmt::Display for ColumnRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// Input line layout, chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenizerSpec {
    Delimited {
        names: Vec<String>,
        delimiter: String,
        /// Tokens wrapped in this character may contain the delimiter.
        quote: Option<char>,
    },
    FixedWidth {
        names: Vec<String>,
        ranges: Vec<ColumnRange>,
        /// Reject lines longer than the last range.
        strict: bool,
        /// Strip surrounding whitespace from each token.
        trim: bool,
    },
}

/// Build the tokenizer described by `spec`, validating it first.
pub fn spec_to_tokenizer(spec: &TokenizerSpec) -> Result<Box<dyn LineTokenizer>, EtlError> {
    match spec {
        TokenizerSpec::Delimited {
            names,
            delimiter,
            quote,
        } => Ok(Box::new(DelimitedTokenizer::new(
            names.clone(),
            delimiter,
            *quote,
        )?)),
        TokenizerSpec::FixedWidth {
            names,
            ranges,
            strict,
            trim,
        } => Ok(Box::new(FixedWidthTokenizer::new(
            names.clone(),
            ranges.clone(),
            *strict,
            *trim,
        )?)),
    }
}

// ---------------------------------------------------------------------------
// Delimited
// ---------------------------------------------------------------------------

/// Splits a line on a delimiter string.
///
/// Without a quote character the line is split on every occurrence of the
/// delimiter, which may be several characters long. With one, the line is
/// read as a single CSV record, which needs a single-byte delimiter.
#[derive(Debug)]
pub struct DelimitedTokenizer {
    names: Vec<String>,
    delimiter: String,
    csv: Option<csv::ReaderBuilder>,
}

impl DelimitedTokenizer {
    pub fn new(
        names: Vec<String>,
        delimiter: &str,
        quote: Option<char>,
    ) -> Result<Self, EtlError> {
        if names.is_empty() {
            return Err(EtlError::config("delimited input needs at least one field name"));
        }
        if delimiter.is_empty() {
            return Err(EtlError::config("input delimiter must not be empty"));
        }
        let csv = match quote {
            Some(quote) => {
                let (delimiter, quote) = csv_bytes(delimiter, quote)?;
                let mut builder = csv::ReaderBuilder::new();
                builder
                    .has_headers(false)
                    .flexible(true)
                    .delimiter(delimiter)
                    .quote(quote);
                Some(builder)
            }
            None => None,
        };
        Ok(Self {
            names,
            delimiter: delimiter.to_string(),
            csv,
        })
    }

    fn split(&self, line: &str) -> Result<Vec<String>, TokenizeError> {
        let Some(builder) = &self.csv else {
            return Ok(line.split(self.delimiter.as_str()).map(String::from).collect());
        };
        let mut reader = builder.from_reader(line.as_bytes());
        match reader.records().next() {
            Some(Ok(record)) => Ok(record.iter().map(String::from).collect()),
            Some(Err(e)) => Err(TokenizeError(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}

/// Delimiter and quote as the single bytes the CSV reader and writer take.
pub(crate) fn csv_bytes(delimiter: &str, quote: char) -> Result<(u8, u8), EtlError> {
    let delimiter_byte = match delimiter.as_bytes() {
        [b] if b.is_ascii() => *b,
        _ => {
            return Err(EtlError::config(format!(
                "quoting needs a single ASCII delimiter, got '{delimiter}'"
            )));
        }
    };
    if !quote.is_ascii() {
        return Err(EtlError::config(format!(
            "quote character '{quote}' must be ASCII"
        )));
    }
    let quote_byte = quote as u8;
    if quote_byte == delimiter_byte {
        return Err(EtlError::config(format!(
            "quote character '{quote}' must differ from delimiter '{delimiter}'"
        )));
    }
    Ok((delimiter_byte, quote_byte))
}

impl LineTokenizer for DelimitedTokenizer {
    fn tokenize(&self, line: &str) -> Result<FieldRecord, TokenizeError> {
        let tokens = self.split(line)?;
        if tokens.len() != self.names.len() {
            return Err(TokenizeError(format!(
                "expected {} tokens, found {}",
                self.names.len(),
                tokens.len()
            )));
        }
        Ok(FieldRecord::from_parts(&self.names, tokens))
    }

    fn names(&self) -> &[String] {
        &self.names
    }
}

// ---------------------------------------------------------------------------
// Fixed width
// ---------------------------------------------------------------------------

/// Cuts fields out of fixed column ranges.
///
/// Columns count characters, not bytes.
pub struct FixedWidthTokenizer {
    names: Vec<String>,
    ranges: Vec<ColumnRange>,
    strict: bool,
    trim: bool,
    /// Highest bounded end column; the minimum acceptable line length.
    max_end: usize,
    open_ended: bool,
}

impl FixedWidthTokenizer {
    pub fn new(
        names: Vec<String>,
        ranges: Vec<ColumnRange>,
        strict: bool,
        trim: bool,
    ) -> Result<Self, EtlError> {
        if ranges.is_empty() {
            return Err(EtlError::config("fixed-width input needs at least one column range"));
        }
        if names.len() != ranges.len() {
            return Err(EtlError::config(format!(
                "{} field names but {} column ranges",
                names.len(),
                ranges.len()
            )));
        }

        let mut max_end = 0;
        for (i, range) in ranges.iter().enumerate() {
            if range.start == 0 {
                return Err(EtlError::config(format!(
                    "column range '{range}' must start at 1 or later"
                )));
            }
            match range.end {
                Some(end) if end < range.start => {
                    return Err(EtlError::config(format!(
                        "column range '{range}' ends before it starts"
                    )));
                }
                Some(end) => max_end = max_end.max(end),
                None if i + 1 != ranges.len() => {
                    return Err(EtlError::config(format!(
                        "open column range '{range}' must be the last range"
                    )));
                }
                None => max_end = max_end.max(range.start - 1),
            }
        }
        let open_ended = ranges.last().is_some_and(|r| r.end.is_none());

        Ok(Self {
            names,
            ranges,
            strict,
            trim,
            max_end,
            open_ended,
        })
    }
}

impl LineTokenizer for FixedWidthTokenizer {
    fn tokenize(&self, line: &str) -> Result<FieldRecord, TokenizeError> {
        let chars: Vec<char> = line.chars().collect();
        if chars.len() < self.max_end {
            return Err(TokenizeError(format!(
                "line is {} characters, shorter than column {}",
                chars.len(),
                self.max_end
            )));
        }
        if self.strict && !self.open_ended && chars.len() > self.max_end {
            return Err(TokenizeError(format!(
                "line is {} characters, longer than column {}",
                chars.len(),
                self.max_end
            )));
        }

        let tokens = self.ranges.iter().map(|range| {
            let end = range.end.unwrap_or(chars.len());
            let token: String = chars[range.start - 1..end].iter().collect();
            if self.trim {
                token.trim().to_string()
            } else {
                token
            }
        });
        Ok(FieldRecord::from_parts(&self.names, tokens.collect::<Vec<_>>()))
    }

    fn names(&self) -> &[String] {
        &self.names
    }
}
