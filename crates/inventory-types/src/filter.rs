//! Record filters shared by one-shot lists, relation queries and watches.
//!
//! A [`Filter`] is a conjunction of equality [`Predicate`]s over record
//! fields (see [`ModelRecord::field`]). The same filter value restricts a
//! list read, the snapshot of a watch, and every delta streamed after it,
//! so the watched view always equals what a fresh list would return.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::record::ModelRecord;

/// A single `field == value` test.
///
/// Values are compared in their query-string form: a JSON string matches
/// its contents, any other JSON value matches its JSON text (`true`, `4`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Predicate {
    /// Field name, resolved with [`ModelRecord::field`].
    pub field: String,
    /// Expected value.
    pub value: String,
}

impl Predicate {
    /// Whether the record satisfies this predicate.
    pub fn matches(&self, record: &ModelRecord) -> bool {
        match record.field(&self.field) {
            Some(serde_json::Value::String(s)) => s == self.value,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// A conjunction of predicates. The empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Filter {
    /// Predicates that must all hold.
    pub predicates: Vec<Predicate>,
}

impl Filter {
    /// The filter matching everything.
    pub const fn all() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    /// A filter with a single equality predicate.
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::all().and_eq(field, value)
    }

    /// Add an equality predicate.
    #[must_use]
    pub fn and_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.push(Predicate {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Build a filter from query parameters, skipping reserved names.
    pub fn from_params<'a, I>(params: I, reserved: &[&str]) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        params
            .into_iter()
            .filter(|(field, _)| !reserved.contains(&field.as_str()))
            .fold(Self::all(), |filter, (field, value)| {
                filter.and_eq(field.clone(), value.clone())
            })
    }

    /// Whether the record satisfies every predicate.
    pub fn matches(&self, record: &ModelRecord) -> bool {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Whether this filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}
