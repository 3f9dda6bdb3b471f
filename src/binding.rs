//! Argument binding: positional arguments to named placeholders, plus the
//! named-parameter-safe rewrite applied to rendered text.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::descriptor::{InterfaceDescriptor, MethodDescriptor};
use crate::error::{MapperError, Result};
use crate::types::{Arg, ParameterMap, Value};

/// Context key carrying the interface summary.
pub const INTERFACE_KEY: &str = "_interface";
/// Context key carrying the method summary.
pub const METHOD_KEY: &str = "_method";
/// Context key carrying the raw argument list.
pub const ARGS_KEY: &str = "_args";

/// Keys the pipeline adds to every render context. Declared parameters may
/// not use them.
pub const RESERVED_KEYS: [&str; 3] = [INTERFACE_KEY, METHOD_KEY, ARGS_KEY];

/// Converts positional call arguments into a placeholder map.
pub trait ArgumentResolver: Send + Sync {
    /// Binds `args` to the placeholders declared by `method`.
    fn resolve(&self, method: &MethodDescriptor, args: &[Arg]) -> Result<ParameterMap>;
}

/// Binds the i-th argument to the i-th declared parameter name.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionalResolver;

impl ArgumentResolver for PositionalResolver {
    fn resolve(&self, method: &MethodDescriptor, args: &[Arg]) -> Result<ParameterMap> {
        if method.params.len() != args.len() {
            return Err(MapperError::ArityMismatch {
                method: method.name.clone(),
                expected: method.params.len(),
                found: args.len(),
            });
        }
        Ok(method
            .params
            .iter()
            .cloned()
            .zip(args.iter().map(Arg::to_value))
            .collect())
    }
}

/// Widens a parameter map with the reserved call-context keys.
pub fn with_context(
    params: &ParameterMap,
    interface: &InterfaceDescriptor,
    method: &MethodDescriptor,
    args: &[Arg],
) -> ParameterMap {
    let mut ctx = params.clone();
    ctx.insert(INTERFACE_KEY.to_string(), interface.context_value());
    ctx.insert(METHOD_KEY.to_string(), method.context_value());
    ctx.insert(
        ARGS_KEY.to_string(),
        Value::List(args.iter().map(Arg::to_value).collect()),
    );
    ctx
}

fn dotted_param() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)+)")
            .expect("dotted parameter pattern")
    })
}

/// Flattens `$a.b.c` parameter references into `$a_b_c`.
///
/// Each referenced nested value is hoisted into the returned map under its
/// flattened key; the original top-level entries are kept as-is.
pub fn replace_key_args(text: &str, params: &ParameterMap) -> Result<(String, ParameterMap)> {
    let mut flat = params.clone();
    let mut missing = None;
    let rewritten = dotted_param().replace_all(text, |caps: &Captures<'_>| {
        let path = &caps[1];
        let (root, rest) = path.split_once('.').unwrap_or((path, ""));
        let key = path.replace('.', "_");
        match params.get(root).and_then(|v| v.get_path(rest)) {
            Some(value) => {
                flat.insert(key.clone(), value.clone());
            }
            None => {
                missing.get_or_insert_with(|| path.to_string());
            }
        }
        format!("${key}")
    });
    if let Some(path) = missing {
        return Err(MapperError::Template(format!(
            "parameter reference '${path}' does not resolve"
        )));
    }
    Ok((rewritten.into_owned(), flat))
}
