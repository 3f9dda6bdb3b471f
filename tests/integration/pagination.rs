//! Count + page fan-out over a scripted 45-row table.

#![allow(missing_docs)]

use std::sync::Arc;

use gqlmap::descriptor::MapperFile;
use gqlmap::testkit::ScriptedConnector;
use gqlmap::{
    Arg, DescriptorStore, ExecResult, Mapper, MapperError, Output, Page, PoolOptions,
    QueryExecutor, RawResult, SessionPool, Value,
};

const TOTAL_ROWS: i64 = 45;

const MAPPER: &str = r#"
interface = "PersonDao"
space = "social"

[[method]]
name = "selectPage"
params = ["page"]
result = "page_rows"
text = "MATCH (n:person) RETURN n"

[[method]]
name = "selectPage$Count"
params = ["page"]
result = "count"
text = "MATCH (n:person) RETURN count(n)"

[[method]]
name = "selectPage$Page"
params = ["page"]
result = "list"
text = "MATCH (n:person) RETURN n.name SKIP ${page.startRow} LIMIT ${page.pageSize}"
"#;

fn table_responder(text: &str, params: &gqlmap::ParameterMap) -> ExecResult {
    if text.contains("count(n)") {
        return ExecResult::ok(RawResult::scalar("count(n)", TOTAL_ROWS));
    }
    let field = |name: &str| {
        params
            .get("page")
            .and_then(|page| page.get_path(name))
            .and_then(Value::as_int)
            .unwrap_or(0)
    };
    let start = field("startRow");
    let end = (start + field("pageSize")).min(TOTAL_ROWS);
    let rows = (start..end)
        .map(|i| vec![Value::from(format!("person-{i}"))])
        .collect();
    ExecResult::ok(RawResult::new(["n.name"], rows))
}

fn build(connector: Arc<ScriptedConnector>) -> Mapper {
    let store = Arc::new(DescriptorStore::default());
    store
        .register(MapperFile::parse(MAPPER).expect("parse"))
        .expect("register");
    let pool = SessionPool::new(connector, PoolOptions::default()).expect("pool");
    Mapper::new(store, QueryExecutor::new(pool, "default"))
}

fn page_of(args: &[Arg]) -> &Page {
    args[0].as_page().expect("page argument")
}

#[test]
fn first_and_last_page() {
    let connector = Arc::new(ScriptedConnector::new(table_responder));
    let mapper = build(connector.clone());

    let mut args = [Arg::from(Page::new(1, 30))];
    let out = mapper
        .invoke("PersonDao", "selectPage", &mut args)
        .expect("page 1");
    let page = page_of(&args);
    assert_eq!(page.total, Some(TOTAL_ROWS));
    assert_eq!(page.rows.len(), 30);
    assert_eq!(page.rows[0], Value::from("person-0"));
    assert_eq!(out, Output::List(page.rows.clone()));

    let mut args = [Arg::from(Page::new(2, 30))];
    mapper
        .invoke("PersonDao", "selectPage", &mut args)
        .expect("page 2");
    let page = page_of(&args);
    assert_eq!(page.total, Some(TOTAL_ROWS));
    assert_eq!(page.rows.len(), 15);
    assert_eq!(page.rows[0], Value::from("person-30"));

    let submitted = connector.submitted();
    assert_eq!(submitted.len(), 4);
    assert!(submitted[0].contains("count(n)"));
    assert!(submitted[1].contains("SKIP 0 LIMIT 30"));
    assert!(submitted[3].contains("SKIP 30 LIMIT 30"));
    let snap = mapper.pool().snapshot();
    assert_eq!(snap.acquisitions, 4);
    assert_eq!(snap.checked_out, 0);
}

#[test]
fn page_past_the_end_is_empty() {
    let mapper = build(Arc::new(ScriptedConnector::new(table_responder)));
    let mut args = [Arg::from(Page::new(5, 30))];
    mapper
        .invoke("PersonDao", "selectPage", &mut args)
        .expect("page 5");
    let page = page_of(&args);
    assert_eq!(page.total, Some(TOTAL_ROWS));
    assert!(page.rows.is_empty());
}

#[test]
fn count_failure_leaves_page_untouched() {
    let connector = Arc::new(ScriptedConnector::new(table_responder));
    let mapper = build(connector.clone());
    connector.fail_next("count exploded");
    let mut args = [Arg::from(Page::new(1, 10))];
    let err = mapper
        .invoke("PersonDao", "selectPage", &mut args)
        .expect_err("count failure");
    assert!(matches!(err, MapperError::QueryFailure(_)));
    let page = page_of(&args);
    assert_eq!(page.total, None);
    assert!(page.rows.is_empty());
    // Page query never ran.
    assert_eq!(connector.submitted().len(), 1);
    assert_eq!(mapper.pool().snapshot().checked_out, 0);
}

#[test]
fn invalid_page_rejected_before_execution() {
    let connector = Arc::new(ScriptedConnector::new(table_responder));
    let mapper = build(connector.clone());
    let mut args = [Arg::from(Page::new(0, 10))];
    let err = mapper
        .invoke("PersonDao", "selectPage", &mut args)
        .expect_err("invalid page");
    assert_eq!(err.code(), "InvalidArgument");
    assert!(connector.submitted().is_empty());
}

#[test]
fn missing_companion_rejected_at_registration() {
    let broken = MAPPER.replace("selectPage$Count", "selectPageCount");
    let iface = MapperFile::parse(&broken).expect("parse");
    let store = DescriptorStore::default();
    let err = store.register(iface).expect_err("companion");
    assert_eq!(err.code(), "ConfigurationError");
}

const FILTERED_MAPPER: &str = r#"
interface = "PersonDao"

[[method]]
name = "selectByName"
params = ["page", "name"]
result = "page_rows"
text = "MATCH (n:person) RETURN n"

[[method]]
name = "selectByName$Count"
params = ["page", "name"]
result = "count"
text = "MATCH (n:person) WHERE n.name == ${name} RETURN count(n)"

[[method]]
name = "selectByName$Page"
params = ["page", "name"]
result = "list"
text = "MATCH (n:person) WHERE n.name == ${name} RETURN n.name SKIP ${page.startRow} LIMIT ${page.pageSize}"

[[method]]
name = "selectAll"
params = ["page"]
result = "list"
text = "MATCH (n:person) RETURN n.name"
"#;

fn build_filtered(connector: Arc<ScriptedConnector>) -> Mapper {
    let store = Arc::new(DescriptorStore::default());
    store
        .register(MapperFile::parse(FILTERED_MAPPER).expect("parse"))
        .expect("register");
    let pool = SessionPool::new(connector, PoolOptions::default()).expect("pool");
    Mapper::new(store, QueryExecutor::new(pool, "default"))
}

#[test]
fn paged_arity_mismatch_takes_no_session() {
    let connector = Arc::new(ScriptedConnector::new(table_responder));
    let mapper = build_filtered(connector.clone());
    let mut args = [Arg::from(Page::new(1, 10))];
    let err = mapper
        .invoke("PersonDao", "selectByName", &mut args)
        .expect_err("arity");
    assert!(matches!(
        err,
        MapperError::ArityMismatch {
            expected: 2,
            found: 1,
            ..
        }
    ));
    assert_eq!(mapper.pool().snapshot().acquisitions, 0);
    assert!(connector.submitted().is_empty());

    let mut args = [Arg::from(Page::new(1, 10)), Arg::from("person-3")];
    mapper
        .invoke("PersonDao", "selectByName", &mut args)
        .expect("full arity");
    assert_eq!(page_of(&args).total, Some(TOTAL_ROWS));
}

#[test]
fn companion_params_must_match_base() {
    let broken = FILTERED_MAPPER.replacen(
        "name = \"selectByName$Count\"\nparams = [\"page\", \"name\"]",
        "name = \"selectByName$Count\"\nparams = [\"page\"]",
        1,
    );
    assert_ne!(broken, FILTERED_MAPPER);
    let err = DescriptorStore::default()
        .register(MapperFile::parse(&broken).expect("parse"))
        .expect_err("companion params");
    assert_eq!(err.code(), "ConfigurationError");
}

#[test]
fn page_argument_on_plain_list_method_fails_without_session() {
    let connector = Arc::new(ScriptedConnector::new(table_responder));
    let mapper = build_filtered(connector.clone());
    let mut args = [Arg::from(Page::new(1, 10))];
    let err = mapper
        .invoke("PersonDao", "selectAll", &mut args)
        .expect_err("no companions");
    assert_eq!(err.code(), "ConfigurationError");
    assert_eq!(mapper.pool().snapshot().acquisitions, 0);
    assert!(connector.submitted().is_empty());
}
