//! Record transformers.
//!
//! A transformer maps one input record to one new output record. Exactly one
//! transformer (possibly a [`Chain`]) is active per run, built from a
//! [`TransformerSpec`] before processing starts.

use crate::FieldRecord;
use crate::error::EtlError;

/// Maps one record to a new record.
pub trait RecordTransformer {
    fn transform(&self, record: FieldRecord) -> Result<FieldRecord, EtlError>;

    /// The display name of this transformer.
    fn name(&self) -> &str;
}

/// Transformer configuration, chosen once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformerSpec {
    Identity,
    /// Select `selected` input fields in order and relabel them as `output`.
    Project {
        selected: Vec<String>,
        output: Vec<String>,
    },
    UpperCase { fields: Vec<String> },
    LowerCase { fields: Vec<String> },
    Chain(Vec<TransformerSpec>),
}

fn missing(name: &str) -> EtlError {
    EtlError::Transform(format!("record has no field '{name}'"))
}

/// IDENTITY - passes records through unchanged.
pub struct Identity;

impl RecordTransformer for Identity {
    fn transform(&self, record: FieldRecord) -> Result<FieldRecord, EtlError> {
        Ok(record)
    }

    fn name(&self) -> &str {
        "IDENTITY"
    }
}

/// PROJECT - selects an ordered subset of fields and renames them.
pub struct Projection {
    selected: Vec<String>,
    output: Vec<String>,
}

impl Projection {
    pub fn new(selected: Vec<String>, output: Vec<String>) -> Result<Self, EtlError> {
        if selected.len() != output.len() {
            return Err(EtlError::config(format!(
                "projection selects {} fields but names {} outputs",
                selected.len(),
                output.len()
            )));
        }
        if selected.is_empty() {
            return Err(EtlError::config("projection must select at least one field"));
        }
        Ok(Self { selected, output })
    }

    /// Select `names` in order without renaming.
    pub fn reorder(names: Vec<String>) -> Result<Self, EtlError> {
        Self::new(names.clone(), names)
    }
}

impl RecordTransformer for Projection {
    fn transform(&self, record: FieldRecord) -> Result<FieldRecord, EtlError> {
        let mut out = FieldRecord::new();
        for (from, to) in self.selected.iter().zip(&self.output) {
            let value = record.get(from).map_err(|_| missing(from))?;
            out.push(to.as_str(), value);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "PROJECT"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Upper,
    Lower,
}

/// UPPER / LOWER - normalizes the case of named fields.
pub struct CaseChange {
    fields: Vec<String>,
    case: Case,
}

impl CaseChange {
    pub fn upper(fields: Vec<String>) -> Self {
        Self {
            fields,
            case: Case::Upper,
        }
    }

    pub fn lower(fields: Vec<String>) -> Self {
        Self {
            fields,
            case: Case::Lower,
        }
    }
}

impl RecordTransformer for CaseChange {
    fn transform(&self, record: FieldRecord) -> Result<FieldRecord, EtlError> {
        for field in &self.fields {
            record.get(field).map_err(|_| missing(field))?;
        }
        Ok(record
            .iter()
            .map(|(name, value)| {
                let value = if self.fields.iter().any(|f| f == name) {
                    match self.case {
                        Case::Upper => value.to_uppercase(),
                        Case::Lower => value.to_lowercase(),
                    }
                } else {
                    value.to_string()
                };
                (name.to_string(), value)
            })
            .collect())
    }

    fn name(&self) -> &str {
        match self.case {
            Case::Upper => "UPPER",
            Case::Lower => "LOWER",
        }
    }
}

/// CHAIN - applies transformers in order, feeding each the previous output.
pub struct Chain {
    stages: Vec<Box<dyn RecordTransformer>>,
}

impl Chain {
    pub fn new(stages: Vec<Box<dyn RecordTransformer>>) -> Self {
        Self { stages }
    }
}

impl RecordTransformer for Chain {
    fn transform(&self, record: FieldRecord) -> Result<FieldRecord, EtlError> {
        self.stages
            .iter()
            .try_fold(record, |current, stage| stage.transform(current))
    }

    fn name(&self) -> &str {
        "CHAIN"
    }
}

/// Create a transformer from its spec.
pub fn spec_to_transformer(spec: &TransformerSpec) -> Result<Box<dyn RecordTransformer>, EtlError> {
    Ok(match spec {
        TransformerSpec::Identity => Box::new(Identity),
        TransformerSpec::Project { selected, output } => {
            Box::new(Projection::new(selected.clone(), output.clone())?)
        }
        TransformerSpec::UpperCase { fields } => Box::new(CaseChange::upper(fields.clone())),
        TransformerSpec::LowerCase { fields } => Box::new(CaseChange::lower(fields.clone())),
        TransformerSpec::Chain(specs) => {
            let stages = specs
                .iter()
                .map(spec_to_transformer)
                .collect::<Result<Vec<_>, _>>()?;
            Box::new(Chain::new(stages))
        }
    })
}
