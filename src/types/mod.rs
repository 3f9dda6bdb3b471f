//! Core value and argument types shared by every stage of the invocation
//! pipeline.

use std::collections::BTreeMap;

mod value;

pub use value::Value;

use crate::page::Page;

/// Placeholder name to bound value, built fresh for every call.
pub type ParameterMap = BTreeMap<String, Value>;

/// One positional argument of a mapped method call.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// Ordinary bound value.
    Value(Value),
    /// Pagination request; filled in place with `total` and `rows`.
    Page(Page),
}

impl Arg {
    /// Value bound to the argument's placeholder.
    pub fn to_value(&self) -> Value {
        match self {
            Arg::Value(value) => value.clone(),
            Arg::Page(page) => page.to_value(),
        }
    }

    /// Returns the page request when this argument carries one.
    pub fn as_page(&self) -> Option<&Page> {
        match self {
            Arg::Page(page) => Some(page),
            Arg::Value(_) => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

macro_rules! arg_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Value(Value::from(value))
                }
            }
        )*
    };
}

arg_from_scalar!(&str, String, bool, i64, i32, f64);

impl From<Page> for Arg {
    fn from(page: Page) -> Self {
        Arg::Page(page)
    }
}
