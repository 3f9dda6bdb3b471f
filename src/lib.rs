//! Query mapping layer for graph databases.
//!
//! Data-access methods are declared as parameterized query templates. Every
//! invocation binds its arguments, renders the template, runs it on a pooled
//! session pointed at the right space, and maps the rows into the declared
//! result shape. Paginated methods fan out into a count and a page query.

#![warn(missing_docs)]

pub mod binding;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod page;
pub mod pool;
pub mod render;
pub mod result;
pub mod space;
pub mod testkit;
pub mod types;

pub use config::MapperConfig;
pub use descriptor::{DescriptorStore, InterfaceDescriptor, MethodDescriptor, ResultShape};
pub use error::{MapperError, Result};
pub use executor::QueryExecutor;
pub use mapper::{prepare_query, InterfaceHandle, Mapper, PreparedQuery};
pub use page::{Page, PaginationCoordinator};
pub use pool::{Connector, ExecResult, PoolOptions, PoolSnapshot, PooledSession, Session, SessionPool};
pub use result::{Output, RawResult, ResultResolver, RowResolver};
pub use types::{Arg, ParameterMap, Value};
