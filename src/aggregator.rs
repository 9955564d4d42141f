//! Line aggregators: one [`FieldRecord`] in, one serialized fragment out.
//!
//! Supported output shapes:
//! - **Delimited**: values joined by a delimiter, optionally quoted
//! - **Formatted**: values substituted into a printf-style template
//! - **Markup entry**: `<Entry><field>value</field>...</Entry>`
//!
//! Template placeholders for the formatted aggregator:
//! - `%s` - the next value as is
//! - `%10s` - the next value right-aligned in 10 columns
//! - `%-10s` - the next value left-aligned in 10 columns
//! - `%%` - a literal percent sign
//!
//! Values are never truncated, so padded templates can produce fixed-width
//! output only when values fit their columns.

use crate::FieldRecord;
use crate::error::EtlError;
use crate::tokenizer::csv_bytes;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

/// Serializes one record.
pub trait LineAggregator {
    fn aggregate(&self, record: &FieldRecord) -> Result<String, EtlError>;
}

/// Output serialization, chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregatorSpec {
    Delimited {
        delimiter: String,
        /// Values containing the delimiter, the quote, or a line break get quoted.
        quote: Option<char>,
    },
    Formatted {
        template: String,
    },
    MarkupEntry {
        entry_tag: String,
        /// `(field name, element name)` overrides. Unlisted fields use their own name.
        field_tags: Vec<(String, String)>,
    },
}

/// Create an aggregator from its spec.
pub fn spec_to_aggregator(spec: &AggregatorSpec) -> Result<Box<dyn LineAggregator>, EtlError> {
    Ok(match spec {
        AggregatorSpec::Delimited { delimiter, quote } => {
            Box::new(DelimitedAggregator::new(delimiter, *quote)?)
        }
        AggregatorSpec::Formatted { template } => Box::new(FormattedAggregator::new(template)?),
        AggregatorSpec::MarkupEntry {
            entry_tag,
            field_tags,
        } => Box::new(MarkupEntryAggregator::new(entry_tag, field_tags.clone())?),
    })
}

/// Is `name` usable as an element name?
///
/// Accepts the common subset of XML names: a letter or `_` followed by
/// letters, digits, `_`, `-`, or `.`.
pub fn is_valid_tag(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// ---------------------------------------------------------------------------
// Delimited
// ---------------------------------------------------------------------------

/// Joins values with a delimiter.
///
/// With a quote character, each record is written as one CSV record and
/// values are quoted only when they contain the delimiter, the quote, or a
/// line break.
pub struct DelimitedAggregator {
    delimiter: String,
    csv: Option<csv::WriterBuilder>,
}

impl DelimitedAggregator {
    pub fn new(delimiter: &str, quote: Option<char>) -> Result<Self, EtlError> {
        let csv = match quote {
            Some(quote) => {
                let (delimiter, quote) = csv_bytes(delimiter, quote)?;
                let mut builder = csv::WriterBuilder::new();
                builder
                    .has_headers(false)
                    .delimiter(delimiter)
                    .quote(quote)
                    .quote_style(csv::QuoteStyle::Necessary)
                    .terminator(csv::Terminator::CRLF);
                Some(builder)
            }
            None => None,
        };
        Ok(Self {
            delimiter: delimiter.to_string(),
            csv,
        })
    }

    fn write_quoted(builder: &csv::WriterBuilder, record: &FieldRecord) -> Result<String, EtlError> {
        let mut writer = builder.from_writer(Vec::new());
        writer
            .write_record(record.values())
            .map_err(|e| EtlError::Aggregate(e.to_string()))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| EtlError::Aggregate(e.to_string()))?;
        let mut line = String::from_utf8(bytes).map_err(|e| EtlError::Aggregate(e.to_string()))?;
        // The sink terminates lines itself.
        if line.ends_with("\r\n") {
            line.truncate(line.len() - 2);
        }
        Ok(line)
    }
}

impl LineAggregator for DelimitedAggregator {
    fn aggregate(&self, record: &FieldRecord) -> Result<String, EtlError> {
        if record.is_empty() {
            return Ok(String::new());
        }
        match &self.csv {
            Some(builder) => Self::write_quoted(builder, record),
            None => Ok(record.values().collect::<Vec<_>>().join(&self.delimiter)),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatted
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Value { width: usize, left: bool },
}

/// Renders values through a printf-style template.
pub struct FormattedAggregator {
    segments: Vec<Segment>,
    placeholders: usize,
}

impl FormattedAggregator {
    pub fn new(template: &str) -> Result<Self, EtlError> {
        let segments = parse_template(template)?;
        let placeholders = segments
            .iter()
            .filter(|s| matches!(s, Segment::Value { .. }))
            .count();
        Ok(Self {
            segments,
            placeholders,
        })
    }
}

/// Split a template into literal text and value placeholders.
fn parse_template(template: &str) -> Result<Vec<Segment>, EtlError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            literal.push('%');
            continue;
        }

        let left = chars.next_if_eq(&'-').is_some();
        let mut digits = String::new();
        while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
            digits.push(d);
        }
        match chars.next() {
            Some('s') => {}
            Some(other) => {
                return Err(EtlError::config(format!(
                    "unsupported conversion '%{}{digits}{other}' in format template",
                    if left { "-" } else { "" }
                )));
            }
            None => return Err(EtlError::config("format template ends inside a placeholder")),
        }
        let width = if digits.is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|_| EtlError::config(format!("invalid width '{digits}' in format template")))?
        };

        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Value { width, left });
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

impl LineAggregator for FormattedAggregator {
    fn aggregate(&self, record: &FieldRecord) -> Result<String, EtlError> {
        if record.len() != self.placeholders {
            return Err(EtlError::Aggregate(format!(
                "format template has {} placeholders but record has {} fields",
                self.placeholders,
                record.len()
            )));
        }

        let mut values = record.values();
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                &Segment::Value { width, left } => {
                    let value = values.next().unwrap_or_default();
                    let padded = if left {
                        format!("{value:<width$}")
                    } else {
                        format!("{value:>width$}")
                    };
                    out.push_str(&padded);
                }
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Markup entry
// ---------------------------------------------------------------------------

/// Wraps each record in an entry element with one child element per field.
pub struct MarkupEntryAggregator {
    entry_tag: String,
    field_tags: Vec<(String, String)>,
}

impl MarkupEntryAggregator {
    pub fn new(entry_tag: &str, field_tags: Vec<(String, String)>) -> Result<Self, EtlError> {
        if !is_valid_tag(entry_tag) {
            return Err(EtlError::config(format!("invalid entry tag name '{entry_tag}'")));
        }
        if let Some((_, tag)) = field_tags.iter().find(|(_, tag)| !is_valid_tag(tag)) {
            return Err(EtlError::config(format!("invalid field tag name '{tag}'")));
        }
        Ok(Self {
            entry_tag: entry_tag.to_string(),
            field_tags,
        })
    }

    fn tag_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.field_tags
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, tag)| tag.as_str())
            .unwrap_or(field)
    }
}

impl LineAggregator for MarkupEntryAggregator {
    fn aggregate(&self, record: &FieldRecord) -> Result<String, EtlError> {
        let mut writer = Writer::new(Vec::new());
        let xml_err = |e: std::io::Error| EtlError::Aggregate(e.to_string());

        writer
            .write_event(Event::Start(BytesStart::new(self.entry_tag.as_str())))
            .map_err(xml_err)?;
        for (name, value) in record.iter() {
            let tag = self.tag_for(name);
            if !is_valid_tag(tag) {
                return Err(EtlError::Aggregate(format!(
                    "field name '{name}' is not a valid element name"
                )));
            }
            writer
                .write_event(Event::Start(BytesStart::new(tag)))
                .and_then(|_| writer.write_event(Event::Text(BytesText::new(value))))
                .and_then(|_| writer.write_event(Event::End(BytesEnd::new(tag))))
                .map_err(xml_err)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.entry_tag.as_str())))
            .map_err(xml_err)?;

        String::from_utf8(writer.into_inner()).map_err(|e| EtlError::Aggregate(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> FieldRecord {
        FieldRecord::from_parts(&["firstName", "lastName"], vec!["John", "Smith"])
    }

    #[test]
    fn test_delimited_joins_in_order() {
        let a = DelimitedAggregator::new(",", None).unwrap();
        assert_eq!(a.aggregate(&person()).unwrap(), "John,Smith");
    }

    #[test]
    fn test_delimited_multichar() {
        let a = DelimitedAggregator::new(" | ", None).unwrap();
        assert_eq!(a.aggregate(&person()).unwrap(), "John | Smith");
    }

    #[test]
    fn test_delimited_quotes_when_needed() {
        let a = DelimitedAggregator::new(",", Some('"')).unwrap();
        let r = FieldRecord::from_parts(&["a", "b", "c"], vec!["x,y", r#"say "hi""#, "plain"]);
        assert_eq!(a.aggregate(&r).unwrap(), r#""x,y","say ""hi""",plain"#);
        let r = FieldRecord::from_parts(&["a", "b"], vec!["two\nlines", "ok"]);
        assert_eq!(a.aggregate(&r).unwrap(), "\"two\nlines\",ok");
    }

    #[test]
    fn test_delimited_quoting_needs_single_byte_delimiter() {
        assert!(matches!(
            DelimitedAggregator::new("||", Some('"')),
            Err(EtlError::Config(_))
        ));
        let a = DelimitedAggregator::new("|", Some('\'')).unwrap();
        let r = FieldRecord::from_parts(&["a", "b"], vec!["x|y", "plain"]);
        assert_eq!(a.aggregate(&r).unwrap(), "'x|y'|plain");
    }

    #[test]
    fn test_delimited_empty_record() {
        let a = DelimitedAggregator::new(",", None).unwrap();
        assert_eq!(a.aggregate(&FieldRecord::new()).unwrap(), "");
    }

    #[test]
    fn test_formatted_plain() {
        let a = FormattedAggregator::new("%s %s").unwrap();
        assert_eq!(a.aggregate(&person()).unwrap(), "John Smith");
    }

    #[test]
    fn test_formatted_padding_and_percent() {
        let a = FormattedAggregator::new("[%-6s][%6s] 100%%").unwrap();
        assert_eq!(a.aggregate(&person()).unwrap(), "[John  ][ Smith] 100%");
    }

    #[test]
    fn test_formatted_does_not_truncate() {
        let a = FormattedAggregator::new("%-2s%-2s").unwrap();
        assert_eq!(a.aggregate(&person()).unwrap(), "JohnSmith");
    }

    #[test]
    fn test_formatted_count_mismatch() {
        let a = FormattedAggregator::new("%s").unwrap();
        let err = a.aggregate(&person()).unwrap_err();
        assert!(matches!(err, EtlError::Aggregate(_)));
    }

    #[test]
    fn test_formatted_rejects_unknown_conversion() {
        assert!(FormattedAggregator::new("%d").is_err());
        assert!(FormattedAggregator::new("%-1").is_err());
    }

    #[test]
    fn test_markup_entry() {
        let a = MarkupEntryAggregator::new("Person", vec![]).unwrap();
        let r = FieldRecord::from_parts(&["firstName"], vec!["Ann"]);
        assert_eq!(
            a.aggregate(&r).unwrap(),
            "<Person><firstName>Ann</firstName></Person>"
        );
    }

    #[test]
    fn test_markup_escapes_values() {
        let a = MarkupEntryAggregator::new("Person", vec![]).unwrap();
        let r = FieldRecord::from_parts(&["name"], vec!["<b>Tom & Jerry</b>"]);
        let out = a.aggregate(&r).unwrap();
        assert_eq!(
            out,
            "<Person><name>&lt;b&gt;Tom &amp; Jerry&lt;/b&gt;</name></Person>"
        );
    }

    #[test]
    fn test_markup_empty_record() {
        let a = MarkupEntryAggregator::new("Person", vec![]).unwrap();
        assert_eq!(a.aggregate(&FieldRecord::new()).unwrap(), "<Person></Person>");
    }

    #[test]
    fn test_markup_field_tag_override() {
        let a = MarkupEntryAggregator::new(
            "Person",
            vec![("firstName".to_string(), "given".to_string())],
        )
        .unwrap();
        assert_eq!(
            a.aggregate(&person()).unwrap(),
            "<Person><given>John</given><lastName>Smith</lastName></Person>"
        );
    }

    #[test]
    fn test_markup_invalid_field_name() {
        let a = MarkupEntryAggregator::new("Person", vec![]).unwrap();
        let r = FieldRecord::from_parts(&["first name"], vec!["Ann"]);
        assert!(matches!(a.aggregate(&r), Err(EtlError::Aggregate(_))));
    }

    #[test]
    fn test_tag_validation() {
        assert!(is_valid_tag("Persons"));
        assert!(is_valid_tag("_x-1.y"));
        assert!(!is_valid_tag(""));
        assert!(!is_valid_tag("1abc"));
        assert!(!is_valid_tag("a<b"));
        assert!(MarkupEntryAggregator::new("bad tag", vec![]).is_err());
    }
}
