//! Command-line front end for checking and rendering mapper files.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use gqlmap::binding::PositionalResolver;
use gqlmap::descriptor::{DescriptorSource, MapperFile};
use gqlmap::render::PlaceholderRenderer;
use gqlmap::space::resolve_space;
use gqlmap::{prepare_query, Arg, MapperConfig, MapperError, Page, Value};

#[derive(Parser, Debug)]
#[command(
    name = "gqlmap",
    version,
    about = "Check and render graph query mapper files",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a configuration and validate every mapper it lists
    Check {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
    /// Render one method of a mapper file without touching a database
    Render {
        #[arg(value_name = "MAPPER")]
        mapper: PathBuf,

        #[arg(value_name = "METHOD")]
        method: String,

        #[arg(
            long,
            default_value = "[]",
            help = "JSON array of positional arguments; {\"$page\": {...}} marks a page argument"
        )]
        args: String,

        #[arg(long, default_value = "default", help = "Process-wide default space")]
        default_space: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    default_space: String,
    pool_capacity: usize,
    mappers: Vec<MapperStatus>,
}

#[derive(Debug, Serialize)]
struct MapperStatus {
    path: PathBuf,
    interface: Option<String>,
    methods: usize,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct RenderReport {
    interface: String,
    method: String,
    space: String,
    text: String,
    params: gqlmap::ParameterMap,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gqlmap=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { config } => {
            let report = check(&config)?;
            emit(cli.format, &report, || print_check_text(&report))?;
            if report.mappers.iter().any(|m| m.error.is_some()) {
                return Err("one or more mappers failed validation".into());
            }
        }
        Command::Render {
            mapper,
            method,
            args,
            default_space,
        } => {
            let report = render(&mapper, &method, &args, &default_space)?;
            emit(cli.format, &report, || print_render_text(&report))?;
        }
    }
    Ok(())
}

fn check(path: &Path) -> Result<CheckReport, Box<dyn Error>> {
    let cfg = MapperConfig::load(path)?;
    let mappers = cfg
        .mappers
        .iter()
        .map(|mapper| {
            let loaded = MapperFile::new(mapper)
                .load()
                .and_then(|iface| iface.validate().map(|_| iface));
            match loaded {
                Ok(iface) => MapperStatus {
                    path: mapper.clone(),
                    interface: Some(iface.name.clone()),
                    methods: iface.methods.len(),
                    error: None,
                },
                Err(err) => MapperStatus {
                    path: mapper.clone(),
                    interface: None,
                    methods: 0,
                    error: Some(format!("[{}] {err}", err.code())),
                },
            }
        })
        .collect();
    Ok(CheckReport {
        default_space: cfg.default_space,
        pool_capacity: cfg.pool.capacity,
        mappers,
    })
}

fn render(
    path: &Path,
    method: &str,
    args: &str,
    default_space: &str,
) -> Result<RenderReport, Box<dyn Error>> {
    let iface = MapperFile::new(path).load()?;
    iface.validate()?;
    let descriptor = iface
        .method_named(method)
        .ok_or_else(|| MapperError::NotFound {
            interface: iface.name.clone(),
            method: method.to_string(),
        })?;
    let space = resolve_space(
        iface.space.as_deref(),
        descriptor.space.as_deref(),
        default_space,
    )
    .to_string();
    let args = parse_args(args)?;
    let prepared = prepare_query(
        &PlaceholderRenderer,
        &PositionalResolver,
        &iface,
        descriptor,
        &args,
    )?;
    Ok(RenderReport {
        interface: iface.name.clone(),
        method: method.to_string(),
        space,
        text: prepared.text,
        params: prepared.params,
    })
}

fn parse_args(raw: &str) -> Result<Vec<Arg>, Box<dyn Error>> {
    let values: Vec<Value> = serde_json::from_str(raw)?;
    values.into_iter().map(to_arg).collect()
}

fn to_arg(value: Value) -> Result<Arg, Box<dyn Error>> {
    let Some(request) = value.get_path("$page").cloned() else {
        return Ok(Arg::Value(value));
    };
    let field = |name: &str| request.get_path(name).and_then(Value::as_int);
    let page_no = field("pageNo").unwrap_or(1);
    let page_size = field("pageSize").unwrap_or(10);
    if page_no < 1 || page_size < 1 {
        return Err("page arguments need pageNo >= 1 and pageSize >= 1".into());
    }
    let mut page = Page::new(page_no as u64, page_size as u64);
    page.entity = request.get_path("entity").filter(|v| !v.is_null()).cloned();
    Ok(Arg::Page(page))
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    printer: impl FnOnce(),
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_check_text(report: &CheckReport) {
    println!(
        "default_space={} pool_capacity={}",
        report.default_space, report.pool_capacity
    );
    for mapper in &report.mappers {
        match (&mapper.interface, &mapper.error) {
            (Some(name), None) => println!(
                "  ok    {} ({name}, {} methods)",
                mapper.path.display(),
                mapper.methods
            ),
            (_, Some(error)) => println!("  error {}: {error}", mapper.path.display()),
            (None, None) => println!("  ?     {}", mapper.path.display()),
        }
    }
}

fn print_render_text(report: &RenderReport) {
    println!("-- {}.{} @ {}", report.interface, report.method, report.space);
    println!("{}", report.text);
    if !report.params.is_empty() {
        println!("-- params");
        for (key, value) in &report.params {
            println!("{key} = {value}");
        }
    }
}
