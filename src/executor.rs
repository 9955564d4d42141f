//! Chunked job executor.
//!
//! Pulls records from a source one at a time, pushes each through the
//! transformer and aggregator, and buffers the serialized fragments. When
//! the buffer holds `chunk_size` fragments, or the source is exhausted, the
//! buffer is committed to the sink in one `write_chunk` call.
//!
//! The first error from any stage stops the run. The chunk being built is
//! discarded, chunks already committed stay written, both streams are
//! released, and the completion callback reports `Failed`.

use crate::FieldRecord;
use crate::aggregator::{LineAggregator, spec_to_aggregator};
use crate::config::JobConfig;
use crate::error::EtlError;
use crate::sink::{FileSink, RecordSink};
use crate::source::RecordSource;
use crate::tokenizer::spec_to_tokenizer;
use crate::transform::{RecordTransformer, spec_to_transformer};
use std::fmt;
use std::fs::File;
use std::io::BufReader;

/// Callback invoked once with the terminal report of a run.
pub type CompletionCallback = Box<dyn FnOnce(&JobReport) + 'static>;

/// Lifecycle of an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Terminal status of a run.
#[derive(Debug)]
pub enum RunStatus {
    Completed,
    /// The first error encountered.
    Failed(EtlError),
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed(e) => write!(f, "Failed({}: {e})", e.kind()),
        }
    }
}

/// What a run did.
#[derive(Debug)]
pub struct JobReport {
    pub status: RunStatus,
    /// Records successfully pulled from the source.
    pub read_count: usize,
    /// Records committed to the sink.
    pub write_count: usize,
    /// Chunks committed to the sink.
    pub commit_count: usize,
}

#[derive(Debug, Default)]
struct Counts {
    read: usize,
    written: usize,
    commits: usize,
}

/// Drives source -> transformer -> aggregator -> sink in fixed-size chunks.
pub struct ChunkedJobExecutor {
    chunk_size: usize,
    state: JobState,
    on_complete: Option<CompletionCallback>,
}

impl ChunkedJobExecutor {
    pub fn new(chunk_size: usize) -> Result<Self, EtlError> {
        if chunk_size == 0 {
            return Err(EtlError::config("chunk size must be at least 1"));
        }
        Ok(Self {
            chunk_size,
            state: JobState::Idle,
            on_complete: None,
        })
    }

    /// Install the completion callback.
    pub fn on_complete(mut self, callback: impl FnOnce(&JobReport) + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Build every component from `config`, open both files, and run.
    ///
    /// Failures while building or opening end the run as `Failed` without
    /// reading any record.
    pub fn execute(&mut self, config: &JobConfig) -> JobReport {
        if self.state != JobState::Idle {
            return already_ran();
        }
        log::info!(
            "Starting job: {} {} -> {} {} (chunk size {})",
            config.input_type,
            config.input_path.display(),
            config.output_type,
            config.output_path.display(),
            self.chunk_size
        );

        match open_job(config) {
            Ok(job) => self.run(
                job.source,
                job.transformer.as_ref(),
                job.aggregator.as_ref(),
                job.sink,
            ),
            Err(e) => {
                self.state = JobState::Running;
                self.finish(Err(e), Counts::default())
            }
        }
    }

    /// Run over already opened components.
    ///
    /// The executor takes ownership of `source` and `sink` and releases both
    /// before returning, whatever the outcome.
    pub fn run<I, S>(
        &mut self,
        source: I,
        transformer: &dyn RecordTransformer,
        aggregator: &dyn LineAggregator,
        mut sink: S,
    ) -> JobReport
    where
        I: Iterator<Item = Result<FieldRecord, EtlError>>,
        S: RecordSink,
    {
        if self.state != JobState::Idle {
            return already_ran();
        }
        self.state = JobState::Running;
        log::debug!(
            "Running with transformer {} and chunk size {}",
            transformer.name(),
            self.chunk_size
        );

        let mut counts = Counts::default();
        let processed = self.process(source, transformer, aggregator, &mut sink, &mut counts);
        let closed = sink.close();
        drop(sink);

        let outcome = processed.and(closed);
        self.finish(outcome, counts)
    }

    fn process<I, S>(
        &self,
        source: I,
        transformer: &dyn RecordTransformer,
        aggregator: &dyn LineAggregator,
        sink: &mut S,
        counts: &mut Counts,
    ) -> Result<(), EtlError>
    where
        I: Iterator<Item = Result<FieldRecord, EtlError>>,
        S: RecordSink,
    {
        let mut chunk: Vec<String> = Vec::with_capacity(self.chunk_size);
        for item in source {
            let record = item?;
            counts.read += 1;
            let record = transformer.transform(record)?;
            chunk.push(aggregator.aggregate(&record)?);
            if chunk.len() == self.chunk_size {
                commit(&mut chunk, sink, counts)?;
            }
        }
        if !chunk.is_empty() {
            commit(&mut chunk, sink, counts)?;
        }
        Ok(())
    }

    fn finish(&mut self, outcome: Result<(), EtlError>, counts: Counts) -> JobReport {
        let status = match outcome {
            Ok(()) => {
                self.state = JobState::Completed;
                log::info!(
                    "Job completed: {} read, {} written, {} chunks committed",
                    counts.read,
                    counts.written,
                    counts.commits
                );
                RunStatus::Completed
            }
            Err(e) => {
                self.state = JobState::Failed;
                log::debug!(
                    "Job failed after {} chunks committed: {} ({})",
                    counts.commits,
                    e,
                    e.kind()
                );
                RunStatus::Failed(e)
            }
        };

        let report = JobReport {
            status,
            read_count: counts.read,
            write_count: counts.written,
            commit_count: counts.commits,
        };
        if let Some(callback) = self.on_complete.take() {
            callback(&report);
        }
        report
    }
}

/// Components of a job, built and opened from its config.
struct OpenedJob {
    source: RecordSource<BufReader<File>>,
    transformer: Box<dyn RecordTransformer>,
    aggregator: Box<dyn LineAggregator>,
    sink: FileSink,
}

/// Validate `config`, build each stage, then open the input before the output.
fn open_job(config: &JobConfig) -> Result<OpenedJob, EtlError> {
    config.validate()?;
    let tokenizer = spec_to_tokenizer(&config.tokenizer_spec()?)?;
    let transformer = spec_to_transformer(&config.transformer_spec()?)?;
    let aggregator = spec_to_aggregator(&config.aggregator_spec()?)?;
    let source = RecordSource::open(&config.input_path, tokenizer, config.source_options())?;
    let sink = FileSink::open(&config.output_path, config.sink_layout()?)?;
    Ok(OpenedJob {
        source,
        transformer,
        aggregator,
        sink,
    })
}

fn commit<S: RecordSink>(
    chunk: &mut Vec<String>,
    sink: &mut S,
    counts: &mut Counts,
) -> Result<(), EtlError> {
    sink.write_chunk(chunk)?;
    counts.commits += 1;
    counts.written += chunk.len();
    log::debug!("Committed chunk {} ({} records)", counts.commits, chunk.len());
    chunk.clear();
    Ok(())
}

fn already_ran() -> JobReport {
    JobReport {
        status: RunStatus::Failed(EtlError::config("executor has already run")),
        read_count: 0,
        write_count: 0,
        commit_count: 0,
    }
}

/// Run the job described by `config`, reporting through `on_complete`.
pub fn run_job(config: &JobConfig, on_complete: impl FnOnce(&JobReport) + 'static) -> JobReport {
    match ChunkedJobExecutor::new(config.chunk_size) {
        Ok(executor) => executor.on_complete(on_complete).execute(config),
        Err(e) => {
            let report = JobReport {
                status: RunStatus::Failed(e),
                read_count: 0,
                write_count: 0,
                commit_count: 0,
            };
            log::debug!("Job failed: {}", report.status);
            on_complete(&report);
            report
        }
    }
}
