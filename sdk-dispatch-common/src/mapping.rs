//! Declarative object projection.
//!
//! Generated serializers and deserializers describe their output as a list of
//! `target key -> instruction` pairs instead of hand-written null checks. One pass
//! over the instructions builds the output; each field is decided on its own and a
//! missing optional field is simply skipped, never an error.
//!
//! There are two forms:
//!
//! - [`map`] / [`map_into`] / [`map_with_filter`]: every instruction carries its own
//!   candidate value (or a thunk producing it).
//! - [`take`]: values are read from a source object, optionally under a different
//!   key, filtered, then transformed.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

type PredicateFn = dyn Fn(Option<&Value>) -> bool + Send + Sync;
type TransformFn = dyn Fn(&Value) -> Value + Send + Sync;
type SupplierFn = dyn Fn() -> Option<Value> + Send + Sync;

/// Decides whether a candidate value is written to the target.
#[derive(Clone, Default)]
pub enum Filter {
    /// Include the value only when it is present and not `null`.
    #[default]
    NonNull,
    /// Include (or exclude) unconditionally.
    Constant(bool),
    /// Include when the predicate returns `true`.
    Predicate(Arc<PredicateFn>),
}

impl Filter {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    fn passes(&self, value: Option<&Value>) -> bool {
        match self {
            Self::NonNull => is_present(value),
            Self::Constant(pass) => *pass,
            Self::Predicate(f) => f(value),
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNull => f.write_str("NonNull"),
            Self::Constant(pass) => write!(f, "Constant({pass})"),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// The candidate carried by a [`map`] instruction.
#[derive(Clone)]
pub enum Candidate {
    /// A value known up front; `None` stands for an absent field.
    Value(Option<Value>),
    /// A thunk, evaluated at most once and only if its filter passes.
    Supplier(Arc<SupplierFn>),
}

/// A single [`map`] instruction.
#[derive(Clone)]
pub enum Instruction {
    /// Written to the target unconditionally, `null` included.
    Plain(Value),
    /// Written when the filter passes.
    Filtered { filter: Filter, candidate: Candidate },
}

impl Instruction {
    pub fn plain(value: impl Into<Value>) -> Self {
        Self::Plain(value.into())
    }

    /// Include `value` if it is present and non-null.
    pub fn present(value: Option<Value>) -> Self {
        Self::Filtered {
            filter: Filter::NonNull,
            candidate: Candidate::Value(value),
        }
    }

    /// Include the thunk's result if it is non-null.
    pub fn lazy<F>(supplier: F) -> Self
    where
        F: Fn() -> Option<Value> + Send + Sync + 'static,
    {
        Self::Filtered {
            filter: Filter::NonNull,
            candidate: Candidate::Supplier(Arc::new(supplier)),
        }
    }

    pub fn filtered(filter: Filter, value: Option<Value>) -> Self {
        Self::Filtered {
            filter,
            candidate: Candidate::Value(value),
        }
    }

    pub fn filtered_lazy<F>(filter: Filter, supplier: F) -> Self
    where
        F: Fn() -> Option<Value> + Send + Sync + 'static,
    {
        Self::Filtered {
            filter,
            candidate: Candidate::Supplier(Arc::new(supplier)),
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Filtered { filter, candidate } => {
                let candidate = match candidate {
                    Candidate::Value(v) => format!("{v:?}"),
                    Candidate::Supplier(_) => "Supplier(..)".to_string(),
                };
                f.debug_struct("Filtered")
                    .field("filter", filter)
                    .field("candidate", &candidate)
                    .finish()
            }
        }
    }
}

/// A single [`take`] instruction: read, filter, transform.
#[derive(Clone, Default)]
pub struct SourceInstruction {
    filter: Filter,
    transform: Option<Arc<TransformFn>>,
    source_key: Option<String>,
}

impl SourceInstruction {
    /// Copy the same-named source field when it is non-null.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Read from `key` in the source instead of the target key.
    pub fn from_key(mut self, key: impl Into<String>) -> Self {
        self.source_key = Some(key.into());
        self
    }
}

impl fmt::Debug for SourceInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceInstruction")
            .field("filter", &self.filter)
            .field("transform", &self.transform.as_ref().map(|_| ".."))
            .field("source_key", &self.source_key)
            .finish()
    }
}

/// Build a fresh object from instructions.
pub fn map<K, I>(instructions: I) -> Map<String, Value>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Instruction)>,
{
    map_into(Map::new(), instructions)
}

/// Apply instructions onto an existing target.
pub fn map_into<K, I>(mut target: Map<String, Value>, instructions: I) -> Map<String, Value>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Instruction)>,
{
    for (key, instruction) in instructions {
        let key = key.into();
        match instruction {
            Instruction::Plain(value) => {
                target.insert(key, value);
            }
            Instruction::Filtered { filter, candidate } => {
                if let Some(value) = resolve_candidate(&filter, candidate) {
                    target.insert(key, value);
                }
            }
        }
    }
    target
}

/// Apply instructions onto a target, guarding every plain instruction with `filter`.
pub fn map_with_filter<K, I>(
    target: Map<String, Value>,
    filter: &Filter,
    instructions: I,
) -> Map<String, Value>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Instruction)>,
{
    let guarded = instructions
        .into_iter()
        .map(|(key, instruction)| match instruction {
            Instruction::Plain(value) => (
                key,
                Instruction::Filtered {
                    filter: filter.clone(),
                    candidate: Candidate::Value(Some(value)),
                },
            ),
            filtered => (key, filtered),
        })
        .collect::<Vec<_>>();
    map_into(target, guarded)
}

/// Build an object from fields of `source`.
pub fn take<K, I>(source: &Map<String, Value>, instructions: I) -> Map<String, Value>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, SourceInstruction)>,
{
    let mut out = Map::new();
    for (key, instruction) in instructions {
        let key = key.into();
        let source_key = instruction.source_key.as_deref().unwrap_or(&key);
        let value = source.get(source_key);
        if !instruction.filter.passes(value) {
            continue;
        }
        let value = value.unwrap_or(&Value::Null);
        let projected = match &instruction.transform {
            Some(transform) => transform(value),
            None => value.clone(),
        };
        out.insert(key, projected);
    }
    out
}

/// Wrap every entry of a plain object into a default-filtered instruction so it
/// can be merged with other instructions.
pub fn convert_map(target: &Map<String, Value>) -> Vec<(String, Instruction)> {
    target
        .iter()
        .map(|(k, v)| (k.clone(), Instruction::present(Some(v.clone()))))
        .collect()
}

fn resolve_candidate(filter: &Filter, candidate: Candidate) -> Option<Value> {
    match candidate {
        Candidate::Value(value) => {
            if filter.passes(value.as_ref()) {
                value
            } else {
                None
            }
        }
        Candidate::Supplier(supplier) => match filter {
            Filter::NonNull => supplier().filter(|v| !v.is_null()),
            // Custom filters never see the thunk's value: it is only produced once
            // the filter has passed.
            custom => {
                if custom.passes(None) {
                    supplier()
                } else {
                    None
                }
            }
        },
    }
}

fn is_present(value: Option<&Value>) -> bool {
    matches!(value, Some(v) if !v.is_null())
}
