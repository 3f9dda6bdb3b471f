//! Invocation pipeline tying descriptors, binding, rendering, execution and
//! result mapping together.
//!
//! A [`Mapper`] is built once at startup and shared (by reference or `Arc`)
//! across every thread issuing calls. It holds no global state; tests build
//! their own over a scripted connector.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::binding::{self, ArgumentResolver, PositionalResolver};
use crate::config::MapperConfig;
use crate::descriptor::{DescriptorStore, InterfaceDescriptor, MapperFile, MethodDescriptor, ResultShape};
use crate::error::Result;
use crate::executor::QueryExecutor;
use crate::page::PaginationCoordinator;
use crate::pool::{Connector, PoolOptions, SessionPool};
use crate::render::{PlaceholderRenderer, TemplateRenderer};
use crate::result::{Output, ResultResolver, RowResolver};
use crate::types::{Arg, ParameterMap};

/// Rendered statement text plus the parameters it will execute with.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedQuery {
    /// Text as rendered, before any `USE` injection.
    pub text: String,
    /// Execution parameters.
    pub params: ParameterMap,
}

/// Explicit context for mapped method invocations.
pub struct Mapper {
    store: Arc<DescriptorStore>,
    executor: QueryExecutor,
    renderer: Arc<dyn TemplateRenderer>,
    arguments: Arc<dyn ArgumentResolver>,
    results: Arc<dyn ResultResolver>,
}

impl Mapper {
    /// Creates a mapper with the placeholder renderer, positional binding
    /// and the row resolver.
    pub fn new(store: Arc<DescriptorStore>, executor: QueryExecutor) -> Self {
        Self {
            store,
            executor,
            renderer: Arc::new(PlaceholderRenderer),
            arguments: Arc::new(PositionalResolver),
            results: Arc::new(RowResolver),
        }
    }

    /// Builds pool, store and mapper from configuration, registering every
    /// configured mapper file.
    pub fn from_config(cfg: &MapperConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        cfg.validate()?;
        let pool = SessionPool::new(connector, PoolOptions::from(&cfg.pool))?;
        let store = Arc::new(DescriptorStore::new(cfg.refresh_on_access));
        for path in &cfg.mappers {
            store.register_source(Arc::new(MapperFile::new(path)))?;
        }
        info!(
            default_space = %cfg.default_space,
            capacity = cfg.pool.capacity,
            interfaces = store.interfaces().len(),
            "mapper.started"
        );
        Ok(Self::new(store, QueryExecutor::new(pool, cfg.default_space.clone())))
    }

    /// Replaces the template renderer.
    pub fn with_renderer(mut self, renderer: Arc<dyn TemplateRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replaces the argument resolver.
    pub fn with_argument_resolver(mut self, arguments: Arc<dyn ArgumentResolver>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Replaces the result resolver.
    pub fn with_result_resolver(mut self, results: Arc<dyn ResultResolver>) -> Self {
        self.results = results;
        self
    }

    /// Descriptor registry.
    pub fn store(&self) -> &DescriptorStore {
        &self.store
    }

    /// Session pool.
    pub fn pool(&self) -> &SessionPool {
        self.executor.pool()
    }

    /// Forwarding handle for one interface.
    pub fn interface<'a>(&'a self, name: &'a str) -> InterfaceHandle<'a> {
        InterfaceHandle { mapper: self, name }
    }

    /// Invokes `interface.method` with positional `args`.
    ///
    /// When exactly one argument is a [`Page`](crate::page::Page) the call
    /// fans out into the method's `$Count` and `$Page` companions and the page
    /// argument is completed in place; the returned output is the row list.
    pub fn invoke(&self, interface: &str, method: &str, args: &mut [Arg]) -> Result<Output> {
        let (iface, method) = self.store.get(interface, method)?;
        if PaginationCoordinator::supports(&method, args) {
            let rows = PaginationCoordinator::run(&iface, &method, args, |companion, args| {
                self.run_single(&iface, companion, args)
            })?;
            return Ok(Output::List(rows));
        }
        self.run_single(&iface, &method, args)
    }

    /// Binds and renders a method without executing it.
    pub fn prepare(&self, interface: &str, method: &str, args: &[Arg]) -> Result<PreparedQuery> {
        let (iface, method) = self.store.get(interface, method)?;
        self.prepare_with(&iface, &method, args)
    }

    fn prepare_with(
        &self,
        iface: &InterfaceDescriptor,
        method: &MethodDescriptor,
        args: &[Arg],
    ) -> Result<PreparedQuery> {
        prepare_query(
            self.renderer.as_ref(),
            self.arguments.as_ref(),
            iface,
            method,
            args,
        )
    }

    fn run_single(
        &self,
        iface: &InterfaceDescriptor,
        method: &MethodDescriptor,
        args: &[Arg],
    ) -> Result<Output> {
        let step0 = Instant::now();
        let prepared = self.prepare_with(iface, method, args)?;
        let step1 = Instant::now();
        let raw = self
            .executor
            .execute(iface, method, &prepared.text, &prepared.params)?;
        let step2 = Instant::now();
        let output = match method.result {
            ResultShape::Raw => Output::Raw(raw),
            shape => self.results.resolve(shape, raw)?,
        };
        let step3 = Instant::now();
        debug!(
            interface = %iface.name,
            method = %method.name,
            render_ms = millis(step0, step1),
            query_ms = millis(step1, step2),
            resolve_ms = millis(step2, step3),
            "mapper.invoke.completed"
        );
        Ok(output)
    }
}

/// Binds `args` and renders `method` without a pool or store.
///
/// This is the first half of every invocation: argument resolution, context
/// widening, rendering and the optional key-arg rewrite.
pub fn prepare_query(
    renderer: &dyn TemplateRenderer,
    arguments: &dyn ArgumentResolver,
    iface: &InterfaceDescriptor,
    method: &MethodDescriptor,
    args: &[Arg],
) -> Result<PreparedQuery> {
    let params = arguments.resolve(method, args)?;
    let ctx = binding::with_context(&params, iface, method, args);
    let text = renderer.render(&method.text, &ctx)?;
    let (text, params) = if method.key_arg_replace {
        binding::replace_key_args(&text, &params)?
    } else {
        (text, params)
    };
    Ok(PreparedQuery { text, params })
}

fn millis(from: Instant, to: Instant) -> f64 {
    to.duration_since(from).as_secs_f64() * 1_000.0
}

/// Dispatch handle bound to one interface name.
#[derive(Clone, Copy)]
pub struct InterfaceHandle<'a> {
    mapper: &'a Mapper,
    name: &'a str,
}

impl InterfaceHandle<'_> {
    /// Invokes one method of the bound interface.
    pub fn call(&self, method: &str, args: &mut [Arg]) -> Result<Output> {
        self.mapper.invoke(self.name, method, args)
    }

    /// Interface name this handle dispatches to.
    pub fn name(&self) -> &str {
        self.name
    }
}
