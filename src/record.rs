//! Ordered name/value records.
//!
//! A [`FieldRecord`] is what flows between every stage of a job: tokenizers
//! build them from raw lines, transformers derive new ones, and aggregators
//! serialize them. Field order is significant for the positional
//! serializers, so fields are kept as an ordered list rather than a map.

use crate::error::EtlError;

/// One parsed record: an ordered sequence of `(name, value)` pairs.
///
/// Names are not required to be unique. Lookups by name return the last
/// field carrying that name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRecord {
    fields: Vec<(String, String)>,
}

impl FieldRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record by pairing names with values positionally.
    ///
    /// Extra names or values beyond the shorter list are dropped; callers
    /// check counts before zipping.
    pub fn from_parts<N, V>(names: &[N], values: Vec<V>) -> Self
    where
        N: AsRef<str>,
        V: Into<String>,
    {
        names
            .iter()
            .zip(values)
            .map(|(n, v)| (n.as_ref().to_string(), v.into()))
            .collect()
    }

    /// Append a field at the end of the record.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Value of the field called `name`.
    pub fn get(&self, name: &str) -> Result<&str, EtlError> {
        self.fields
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| EtlError::MissingField(name.to_string()))
    }

    /// Values in field order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    /// Names in field order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Project and reorder: a new record holding only `selected`, in that order.
    pub fn with_fields<S: AsRef<str>>(&self, selected: &[S]) -> Result<FieldRecord, EtlError> {
        let mut out = FieldRecord::new();
        for name in selected {
            let name = name.as_ref();
            out.push(name, self.get(name)?);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for FieldRecord {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}
