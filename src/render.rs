//! Template rendering contract and the placeholder reference renderer.

use crate::error::{MapperError, Result};
use crate::types::{ParameterMap, Value};

/// Turns template text plus a parameter/context map into query text.
///
/// Implementations must not have side effects visible to the pipeline.
/// Failures are reported as [`MapperError::Template`] and propagated to the
/// caller unchanged.
pub trait TemplateRenderer: Send + Sync {
    /// Renders `template` against `ctx`.
    fn render(&self, template: &str, ctx: &ParameterMap) -> Result<String>;
}

/// Substitutes `${name}` and `${name.path}` with value literals.
///
/// This is deliberately not a template language: there are no conditionals
/// or loops. Bare `$name` references are left alone so they reach the
/// session as execution parameters.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderRenderer;

impl TemplateRenderer for PlaceholderRenderer {
    fn render(&self, template: &str, ctx: &ParameterMap) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                MapperError::Template(format!(
                    "unterminated placeholder at byte {}",
                    template.len() - rest.len() + start
                ))
            })?;
            let expr = after[..end].trim();
            out.push_str(&lookup(ctx, expr)?.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

fn lookup<'a>(ctx: &'a ParameterMap, expr: &str) -> Result<&'a Value> {
    if expr.is_empty() {
        return Err(MapperError::Template("empty placeholder".into()));
    }
    let (root, rest) = match expr.split_once('.') {
        Some((root, rest)) => (root, Some(rest)),
        None => (expr, None),
    };
    let value = ctx
        .get(root)
        .ok_or_else(|| MapperError::Template(format!("missing placeholder '{root}'")))?;
    match rest {
        Some(path) => value
            .get_path(path)
            .ok_or_else(|| MapperError::Template(format!("missing placeholder '{expr}'"))),
        None => Ok(value),
    }
}
