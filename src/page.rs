//! Pagination requests and the count + page fan-out coordinator.

use std::collections::BTreeMap;

use tracing::debug;

use crate::descriptor::{InterfaceDescriptor, MethodDescriptor, COUNT_SUFFIX, PAGE_SUFFIX};
use crate::error::{MapperError, Result};
use crate::result::Output;
use crate::types::{Arg, Value};

/// Page request supplied by the caller and completed by the coordinator.
///
/// `page_no`, `page_size` and `entity` are inputs; `total` and `rows` are
/// written back once both sub-queries succeed.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// 1-based page number.
    pub page_no: u64,
    /// Rows per page.
    pub page_size: u64,
    /// Optional filter entity handed to the templates.
    pub entity: Option<Value>,
    /// Total number of matching rows, set after execution.
    pub total: Option<i64>,
    /// Rows of the requested page, set after execution.
    pub rows: Vec<Value>,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page_no: 1,
            page_size: 10,
            entity: None,
            total: None,
            rows: Vec::new(),
        }
    }
}

impl Page {
    /// Creates a page request without a filter entity.
    pub fn new(page_no: u64, page_size: u64) -> Self {
        Self {
            page_no,
            page_size,
            ..Self::default()
        }
    }

    /// Attaches a filter entity.
    pub fn with_entity(mut self, entity: impl Into<Value>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Zero-based offset of the first row on this page.
    pub fn start_row(&self) -> u64 {
        self.page_no.saturating_sub(1).saturating_mul(self.page_size)
    }

    /// Checks `page_no >= 1`, `page_size > 0`, and that the page window
    /// fits the signed 64-bit integers it is bound as.
    pub fn validate(&self) -> Result<()> {
        if self.page_no == 0 {
            return Err(MapperError::InvalidArgument(
                "page number must be >= 1".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(MapperError::InvalidArgument(
                "page size must be > 0".into(),
            ));
        }
        let limit = i64::MAX as u64;
        let start = self.page_no.checked_sub(1).and_then(|n| n.checked_mul(self.page_size));
        if self.page_no > limit || self.page_size > limit || start.map_or(true, |s| s > limit) {
            return Err(MapperError::InvalidArgument(format!(
                "page {} of size {} is out of range",
                self.page_no, self.page_size
            )));
        }
        Ok(())
    }

    /// Map value bound to the page placeholder.
    pub fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("pageNo".to_string(), Value::Int(clamp(self.page_no)));
        map.insert("pageSize".to_string(), Value::Int(clamp(self.page_size)));
        map.insert("startRow".to_string(), Value::Int(clamp(self.start_row())));
        map.insert(
            "entity".to_string(),
            self.entity.clone().unwrap_or(Value::Null),
        );
        Value::Map(map)
    }
}

// Out-of-range pages are rejected by `Page::validate` before execution.
fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Splits one paginated method call into its count and page sub-queries.
pub struct PaginationCoordinator;

impl PaginationCoordinator {
    /// Returns the index of the only page argument, if exactly one exists.
    pub fn page_index(args: &[Arg]) -> Option<usize> {
        let mut found = None;
        for (idx, arg) in args.iter().enumerate() {
            if arg.as_page().is_some() {
                if found.is_some() {
                    return None;
                }
                found = Some(idx);
            }
        }
        found
    }

    /// True iff exactly one argument is a [`Page`].
    ///
    /// The declared result shape is not consulted. A method that is not
    /// `page_rows` but receives a page argument still fans out, and fails
    /// with [`MapperError::Configuration`] before any session is taken when
    /// it has no `$Count`/`$Page` companions. Companions themselves are
    /// invoked through their base method.
    pub fn supports(_method: &MethodDescriptor, args: &[Arg]) -> bool {
        Self::page_index(args).is_some()
    }

    /// Runs the count and page companions of `method` and completes the page
    /// argument in place.
    ///
    /// `run_one` executes a companion through the ordinary single-query path.
    /// The two sub-queries may land on different sessions and are not
    /// isolated from each other. Either failure aborts the call and leaves
    /// the page argument untouched.
    pub fn run<F>(
        interface: &InterfaceDescriptor,
        method: &MethodDescriptor,
        args: &mut [Arg],
        mut run_one: F,
    ) -> Result<Vec<Value>>
    where
        F: FnMut(&MethodDescriptor, &[Arg]) -> Result<Output>,
    {
        let idx = Self::page_index(args).ok_or_else(|| {
            MapperError::InvalidArgument(format!(
                "method '{}' requires exactly one page argument",
                method.name
            ))
        })?;
        if let Some(page) = args[idx].as_page() {
            page.validate()?;
        }
        if method.params.len() != args.len() {
            return Err(MapperError::ArityMismatch {
                method: method.name.clone(),
                expected: method.params.len(),
                found: args.len(),
            });
        }
        let count_method = companion(interface, &method.name, COUNT_SUFFIX)?;
        let page_method = companion(interface, &method.name, PAGE_SUFFIX)?;

        let total = run_one(count_method, args)?.into_count()?;
        let rows = run_one(page_method, args)?.into_values()?;
        debug!(
            interface = %interface.name,
            method = %method.name,
            total,
            rows = rows.len(),
            "page.completed"
        );
        if let Arg::Page(page) = &mut args[idx] {
            page.total = Some(total);
            page.rows = rows.clone();
        }
        Ok(rows)
    }
}

fn companion<'a>(
    interface: &'a InterfaceDescriptor,
    base: &str,
    suffix: &str,
) -> Result<&'a MethodDescriptor> {
    let name = format!("{base}{suffix}");
    interface.method_named(&name).ok_or_else(|| {
        MapperError::Configuration(format!(
            "paginated method '{}.{base}' requires companion '{name}'",
            interface.name
        ))
    })
}
