//! Job configuration.
//!
//! A job is described by a flat set of named options, usually loaded from a
//! TOML file:
//! ```text
//! input-type = "csv"
//! input-path = "in.csv"
//! field-names = "lastName,firstName"
//! transform = "project"
//! output-field-names = "firstName,lastName"
//! output-type = "xml"
//! output-path = "out.xml"
//! root-tag-name = "Persons"
//! entry-tag-name = "Person"
//! chunk-size = 10
//! ```
//!
//! The options are read once and turned into typed, immutable specs for each
//! component. Kind selection happens here and nowhere else.

use crate::aggregator::{AggregatorSpec, is_valid_tag};
use crate::error::EtlError;
use crate::sink::SinkLayout;
use crate::source::SourceOptions;
use crate::tokenizer::{ColumnRange, TokenizerSpec};
use crate::transform::TransformerSpec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Input line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// `csv` - delimited text
    Delimited,
    /// `fl` - fixed-length columns
    FixedWidth,
}

impl FromStr for InputKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "delimited" => Ok(InputKind::Delimited),
            "fl" | "fixed" | "fixed-width" => Ok(InputKind::FixedWidth),
            other => Err(EtlError::config(format!(
                "unknown input type '{other}' (try csv or fl)"
            ))),
        }
    }
}

/// Output serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// `csv` - delimited text
    Delimited,
    /// `fmt` - printf-style template
    Formatted,
    /// `xml` - root element wrapping one entry element per record
    Markup,
}

impl FromStr for OutputKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | "delimited" => Ok(OutputKind::Delimited),
            "fmt" | "formatted" => Ok(OutputKind::Formatted),
            "xml" | "markup" => Ok(OutputKind::Markup),
            other => Err(EtlError::config(format!(
                "unknown output type '{other}' (try csv, fmt, or xml)"
            ))),
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputKind::Delimited => "csv",
            InputKind::FixedWidth => "fl",
        })
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputKind::Delimited => "csv",
            OutputKind::Formatted => "fmt",
            OutputKind::Markup => "xml",
        })
    }
}

/// Run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct JobConfig {
    pub input_type: String,
    pub input_path: PathBuf,
    /// Comma-separated input field names.
    pub field_names: String,
    pub input_delimiter: String,
    /// Column ranges for fixed-width input, e.g. `1-10,11-20`.
    pub columns: Option<String>,
    pub quote_character: Option<char>,
    /// Reject fixed-width lines longer than the last column range.
    pub strict: bool,
    pub trim: bool,
    pub lines_to_skip: usize,
    pub comment_prefix: String,

    /// `identity` or `project`.
    pub transform: String,
    /// Input fields to project; defaults to `output-field-names`.
    pub selected_field_names: Option<String>,
    pub output_field_names: Option<String>,
    pub upper_case_fields: Option<String>,
    pub lower_case_fields: Option<String>,

    pub output_type: String,
    pub output_path: PathBuf,
    pub output_delimiter: String,
    pub output_quote_character: Option<char>,
    pub format: Option<String>,
    pub root_tag_name: String,
    pub entry_tag_name: String,
    /// Element name overrides, e.g. `firstName:first,lastName:last`.
    pub entry_field_tags: Option<String>,
    pub header_line: Option<String>,
    pub footer_line: Option<String>,

    pub chunk_size: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            input_type: "csv".to_string(),
            input_path: PathBuf::from("in.csv"),
            field_names: "firstName,lastName".to_string(),
            input_delimiter: ",".to_string(),
            columns: None,
            quote_character: None,
            strict: false,
            trim: false,
            lines_to_skip: 0,
            comment_prefix: "#".to_string(),
            transform: "identity".to_string(),
            selected_field_names: None,
            output_field_names: None,
            upper_case_fields: None,
            lower_case_fields: None,
            output_type: "xml".to_string(),
            output_path: PathBuf::from("out.xml"),
            output_delimiter: ",".to_string(),
            output_quote_character: None,
            format: None,
            root_tag_name: "Persons".to_string(),
            entry_tag_name: "Person".to_string(),
            entry_field_tags: None,
            header_line: None,
            footer_line: None,
            chunk_size: 1,
        }
    }
}

/// Split a comma-separated name list, rejecting empty entries.
fn parse_names(option: &str, text: &str) -> Result<Vec<String>, EtlError> {
    let names: Vec<String> = text.split(',').map(|n| n.trim().to_string()).collect();
    if names.iter().any(|n| n.is_empty()) {
        return Err(EtlError::config(format!("{option} has an empty name in '{text}'")));
    }
    Ok(names)
}

fn parse_tag_pairs(text: &str) -> Result<Vec<(String, String)>, EtlError> {
    text.split(',')
        .map(|pair| match pair.split_once(':') {
            Some((field, tag)) if !field.trim().is_empty() && !tag.trim().is_empty() => {
                Ok((field.trim().to_string(), tag.trim().to_string()))
            }
            _ => Err(EtlError::config(format!(
                "entry-field-tags entry '{}' is not field:tag",
                pair.trim()
            ))),
        })
        .collect()
}

impl JobConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, EtlError> {
        toml::from_str(text).map_err(|e| EtlError::config(e.to_string()))
    }

    /// Read and parse a TOML file.
    ///
    /// Relative input and output paths are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self, EtlError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EtlError::config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            if config.input_path.is_relative() {
                config.input_path = base.join(&config.input_path);
            }
            if config.output_path.is_relative() {
                config.output_path = base.join(&config.output_path);
            }
        }
        Ok(config)
    }

    pub fn input_kind(&self) -> Result<InputKind, EtlError> {
        self.input_type.parse()
    }

    pub fn output_kind(&self) -> Result<OutputKind, EtlError> {
        self.output_type.parse()
    }

    /// Check every option that can be checked without touching files.
    pub fn validate(&self) -> Result<(), EtlError> {
        if self.chunk_size == 0 {
            return Err(EtlError::config("chunk-size must be at least 1"));
        }
        self.tokenizer_spec()?;
        self.transformer_spec()?;
        self.aggregator_spec()?;
        self.sink_layout()?;
        Ok(())
    }

    pub fn tokenizer_spec(&self) -> Result<TokenizerSpec, EtlError> {
        let names = parse_names("field-names", &self.field_names)?;
        Ok(match self.input_kind()? {
            InputKind::Delimited => {
                if self.input_delimiter.is_empty() {
                    return Err(EtlError::config("input-delimiter must not be empty"));
                }
                TokenizerSpec::Delimited {
                    names,
                    delimiter: self.input_delimiter.clone(),
                    quote: self.quote_character,
                }
            }
            InputKind::FixedWidth => {
                let columns = self
                    .columns
                    .as_deref()
                    .ok_or_else(|| EtlError::config("fixed-width input requires columns"))?;
                let ranges = ColumnRange::parse_list(columns)?;
                if ranges.len() != names.len() {
                    return Err(EtlError::config(format!(
                        "{} field names but {} column ranges",
                        names.len(),
                        ranges.len()
                    )));
                }
                TokenizerSpec::FixedWidth {
                    names,
                    ranges,
                    strict: self.strict,
                    trim: self.trim,
                }
            }
        })
    }

    pub fn transformer_spec(&self) -> Result<TransformerSpec, EtlError> {
        let mut stages = Vec::new();
        match self.transform.trim().to_ascii_lowercase().as_str() {
            "identity" => {}
            "project" => {
                let output = self
                    .output_field_names
                    .as_deref()
                    .ok_or_else(|| EtlError::config("project transform requires output-field-names"))
                    .and_then(|text| parse_names("output-field-names", text))?;
                let selected = match &self.selected_field_names {
                    Some(text) => parse_names("selected-field-names", text)?,
                    None => output.clone(),
                };
                if selected.len() != output.len() {
                    return Err(EtlError::config(format!(
                        "selected-field-names has {} names but output-field-names has {}",
                        selected.len(),
                        output.len()
                    )));
                }
                stages.push(TransformerSpec::Project { selected, output });
            }
            other => {
                return Err(EtlError::config(format!(
                    "unknown transform '{other}' (try identity or project)"
                )));
            }
        }
        if let Some(text) = &self.upper_case_fields {
            stages.push(TransformerSpec::UpperCase {
                fields: parse_names("upper-case-fields", text)?,
            });
        }
        if let Some(text) = &self.lower_case_fields {
            stages.push(TransformerSpec::LowerCase {
                fields: parse_names("lower-case-fields", text)?,
            });
        }

        Ok(match stages.len() {
            0 => TransformerSpec::Identity,
            1 => stages.remove(0),
            _ => TransformerSpec::Chain(stages),
        })
    }

    pub fn aggregator_spec(&self) -> Result<AggregatorSpec, EtlError> {
        Ok(match self.output_kind()? {
            OutputKind::Delimited => AggregatorSpec::Delimited {
                delimiter: self.output_delimiter.clone(),
                quote: self.output_quote_character,
            },
            OutputKind::Formatted => AggregatorSpec::Formatted {
                template: self
                    .format
                    .clone()
                    .ok_or_else(|| EtlError::config("fmt output requires format"))?,
            },
            OutputKind::Markup => {
                if !is_valid_tag(&self.entry_tag_name) {
                    return Err(EtlError::config(format!(
                        "invalid entry-tag-name '{}'",
                        self.entry_tag_name
                    )));
                }
                AggregatorSpec::MarkupEntry {
                    entry_tag: self.entry_tag_name.clone(),
                    field_tags: match &self.entry_field_tags {
                        Some(text) => parse_tag_pairs(text)?,
                        None => Vec::new(),
                    },
                }
            }
        })
    }

    pub fn sink_layout(&self) -> Result<SinkLayout, EtlError> {
        Ok(match self.output_kind()? {
            OutputKind::Delimited | OutputKind::Formatted => SinkLayout::Lines {
                header: self.header_line.clone(),
                footer: self.footer_line.clone(),
            },
            OutputKind::Markup => {
                if !is_valid_tag(&self.root_tag_name) {
                    return Err(EtlError::config(format!(
                        "invalid root-tag-name '{}'",
                        self.root_tag_name
                    )));
                }
                SinkLayout::Markup {
                    root_tag: self.root_tag_name.clone(),
                }
            }
        })
    }

    pub fn source_options(&self) -> SourceOptions {
        SourceOptions {
            lines_to_skip: self.lines_to_skip,
            comment_prefix: self.comment_prefix.clone(),
        }
    }
}
