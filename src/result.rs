//! Raw result sets and their mapping into declared result shapes.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::descriptor::ResultShape;
use crate::error::{MapperError, Result};
use crate::types::Value;

/// Rows returned by a session, untouched by the pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    /// Column names, in order.
    pub columns: Vec<String>,
    /// Row cells, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

impl RawResult {
    /// Builds a result from column names and rows.
    pub fn new<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Single-cell result, as produced by `RETURN count(...)`.
    pub fn scalar(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            columns: vec![column.into()],
            rows: vec![vec![value.into()]],
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Mapped value of one method call.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    /// One entity, absent when nothing matched.
    Entity(Option<Value>),
    /// Zero or more entities.
    List(Vec<Value>),
    /// Scalar count.
    Count(i64),
    /// Passthrough raw result.
    Raw(RawResult),
}

impl Output {
    /// Decodes an entity output into `T`.
    pub fn into_entity<T: DeserializeOwned>(self) -> Result<Option<T>> {
        match self {
            Output::Entity(Some(value)) => Ok(Some(serde_json::from_value(value.to_json())?)),
            Output::Entity(None) => Ok(None),
            other => Err(shape_error("entity", &other)),
        }
    }

    /// Decodes a list output into `Vec<T>`.
    pub fn into_list<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        match self {
            Output::List(values) => values
                .iter()
                .map(|v| serde_json::from_value(v.to_json()).map_err(MapperError::from))
                .collect(),
            other => Err(shape_error("list", &other)),
        }
    }

    /// Returns the untyped values of a list output.
    pub fn into_values(self) -> Result<Vec<Value>> {
        match self {
            Output::List(values) => Ok(values),
            other => Err(shape_error("list", &other)),
        }
    }

    /// Returns the count of a count output.
    pub fn into_count(self) -> Result<i64> {
        match self {
            Output::Count(n) => Ok(n),
            other => Err(shape_error("count", &other)),
        }
    }

    /// Returns the raw result of a passthrough output.
    pub fn into_raw(self) -> Result<RawResult> {
        match self {
            Output::Raw(raw) => Ok(raw),
            other => Err(shape_error("raw", &other)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Output::Entity(_) => "entity",
            Output::List(_) => "list",
            Output::Count(_) => "count",
            Output::Raw(_) => "raw",
        }
    }
}

fn shape_error(expected: &str, found: &Output) -> MapperError {
    MapperError::Decode(format!(
        "expected {expected} output, found {}",
        found.kind()
    ))
}

/// Maps a raw result into the declared result shape.
pub trait ResultResolver: Send + Sync {
    /// Produces the output for `shape` from `raw`.
    fn resolve(&self, shape: ResultShape, raw: RawResult) -> Result<Output>;
}

/// Column-map based resolver.
///
/// Rows with a single column unwrap to that cell; wider rows become maps
/// keyed by column name.
#[derive(Clone, Copy, Debug, Default)]
pub struct RowResolver;

impl RowResolver {
    fn row_value(columns: &[String], row: Vec<Value>) -> Value {
        if row.len() == 1 {
            return row.into_iter().next().unwrap_or_default();
        }
        let map: BTreeMap<String, Value> = columns
            .iter()
            .cloned()
            .zip(row)
            .collect();
        Value::Map(map)
    }
}

impl ResultResolver for RowResolver {
    fn resolve(&self, shape: ResultShape, raw: RawResult) -> Result<Output> {
        let RawResult { columns, rows } = raw;
        match shape {
            ResultShape::Raw => Ok(Output::Raw(RawResult { columns, rows })),
            ResultShape::Entity => Ok(Output::Entity(
                rows.into_iter()
                    .next()
                    .map(|row| Self::row_value(&columns, row)),
            )),
            ResultShape::List | ResultShape::PageRows => Ok(Output::List(
                rows.into_iter()
                    .map(|row| Self::row_value(&columns, row))
                    .collect(),
            )),
            ResultShape::Count => {
                let cell = rows.into_iter().next().and_then(|row| row.into_iter().next());
                match cell {
                    None => Ok(Output::Count(0)),
                    Some(value) => value.as_int().map(Output::Count).ok_or_else(|| {
                        MapperError::Decode(format!("count cell is not an integer: {value}"))
                    }),
                }
            }
        }
    }
}
