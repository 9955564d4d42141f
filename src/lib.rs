//! # flatfile-etl
//!
//! A chunked batch ETL library for line-oriented flat files.
//!
//! Records are read from delimited or fixed-width text, passed through a
//! transformer, serialized as delimited text, templated text, or XML, and
//! committed to the output in fixed-size chunks.
//!
//! ## Overview
//!
//! A job is a straight pipe:
//! - **Source**: reads lines and tokenizes each into a [`FieldRecord`]
//! - **Transformer**: maps each record to a new record
//! - **Aggregator**: serializes each record to one output fragment
//! - **Sink**: writes committed chunks between a prologue and an epilogue
//!
//! ## Example
//!
//! ```
//! use flatfile_etl::{
//!     DelimitedAggregator, DelimitedTokenizer, LineAggregator, LineTokenizer,
//!     Projection, RecordTransformer,
//! };
//!
//! let tokenizer = DelimitedTokenizer::new(
//!     vec!["lastName".to_string(), "firstName".to_string()],
//!     ",",
//!     None,
//! )
//! .unwrap();
//! let swap = Projection::reorder(vec!["firstName".to_string(), "lastName".to_string()]).unwrap();
//! let csv = DelimitedAggregator::new(",", None).unwrap();
//!
//! let record = swap.transform(tokenizer.tokenize("Smith,John").unwrap()).unwrap();
//! assert_eq!(csv.aggregate(&record).unwrap(), "John,Smith");
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod executor;
pub mod record;
pub mod sink;
pub mod source;
pub mod tokenizer;
pub mod transform;

pub use aggregator::{
    AggregatorSpec, DelimitedAggregator, FormattedAggregator, LineAggregator,
    MarkupEntryAggregator, spec_to_aggregator,
};
pub use config::{InputKind, JobConfig, OutputKind};
pub use error::EtlError;
pub use executor::{ChunkedJobExecutor, CompletionCallback, JobReport, JobState, RunStatus, run_job};
pub use record::FieldRecord;
pub use sink::{FileSink, RecordSink, SinkLayout, WriterSink};
pub use source::{RecordSource, SourceOptions};
pub use tokenizer::{
    ColumnRange, DelimitedTokenizer, FixedWidthTokenizer, LineTokenizer, TokenizeError,
    TokenizerSpec, spec_to_tokenizer,
};
pub use transform::{
    CaseChange, Chain, Identity, Projection, RecordTransformer, TransformerSpec,
    spec_to_transformer,
};
