#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use gqlmap::testkit::ScriptedConnector;
use gqlmap::{Arg, ExecResult, Mapper, MapperConfig, RawResult};
use tempfile::TempDir;

const PERSON_MAPPER: &str = r#"
interface = "PersonDao"

[[method]]
name = "selectByName"
params = ["name"]
result = "entity"
text = "MATCH (n:person) WHERE n.name == ${name} RETURN n.name"
"#;

fn write_config(dir: &Path, refresh: bool) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("mappers")).expect("mkdir");
    fs::write(dir.join("mappers/person.toml"), PERSON_MAPPER).expect("mapper");
    let path = dir.join("gqlmap.toml");
    fs::write(
        &path,
        format!(
            "default_space = \"social\"\nrefresh_on_access = {refresh}\nmappers = [\"mappers/person.toml\"]\n\n[pool]\ncapacity = 2\nmin_idle = 1\n"
        ),
    )
    .expect("config");
    path
}

fn echo_connector() -> Arc<ScriptedConnector> {
    Arc::new(ScriptedConnector::new(|_, params| {
        let name = params.get("name").cloned().unwrap_or_default();
        ExecResult::ok(RawResult::new(["n.name"], vec![vec![name]]))
    }))
}

#[test]
fn mapper_from_config_file() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = MapperConfig::load(write_config(dir.path(), false)).expect("load");
    let connector = echo_connector();
    let mapper = Mapper::from_config(&cfg, connector.clone()).expect("mapper");

    assert_eq!(mapper.store().interfaces(), vec!["PersonDao".to_string()]);
    assert_eq!(mapper.pool().snapshot().idle, 1);

    let out = mapper
        .invoke("PersonDao", "selectByName", &mut [Arg::from("Ann")])
        .expect("invoke");
    let name: Option<String> = out.into_entity().expect("decode");
    assert_eq!(name.as_deref(), Some("Ann"));
    assert!(connector.submitted()[0].starts_with("USE social;"));
}

#[test]
fn refresh_on_access_picks_up_edits() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = MapperConfig::load(write_config(dir.path(), true)).expect("load");
    let connector = echo_connector();
    let mapper = Mapper::from_config(&cfg, connector.clone()).expect("mapper");

    mapper
        .invoke("PersonDao", "selectByName", &mut [Arg::from("Ann")])
        .expect("before edit");
    fs::write(
        dir.path().join("mappers/person.toml"),
        PERSON_MAPPER.replace("RETURN n.name", "RETURN n.name LIMIT 1"),
    )
    .expect("edit");
    mapper
        .invoke("PersonDao", "selectByName", &mut [Arg::from("Ann")])
        .expect("after edit");

    let submitted = connector.submitted();
    assert!(!submitted[0].ends_with("LIMIT 1"));
    assert!(submitted[1].ends_with("LIMIT 1"));
}

#[test]
fn explicit_reload_without_refresh() {
    let dir = TempDir::new().expect("tempdir");
    let cfg = MapperConfig::load(write_config(dir.path(), false)).expect("load");
    let connector = echo_connector();
    let mapper = Mapper::from_config(&cfg, connector.clone()).expect("mapper");

    fs::write(
        dir.path().join("mappers/person.toml"),
        PERSON_MAPPER.replace("RETURN n.name", "RETURN n.name LIMIT 1"),
    )
    .expect("edit");
    mapper
        .invoke("PersonDao", "selectByName", &mut [Arg::from("Bo")])
        .expect("stale");
    mapper
        .store()
        .reload_from_source("PersonDao")
        .expect("reload");
    mapper
        .invoke("PersonDao", "selectByName", &mut [Arg::from("Bo")])
        .expect("fresh");

    let submitted = connector.submitted();
    assert!(!submitted[0].ends_with("LIMIT 1"));
    assert!(submitted[1].ends_with("LIMIT 1"));
}

#[test]
fn invalid_mapper_fails_startup() {
    let dir = TempDir::new().expect("tempdir");
    let path = write_config(dir.path(), false);
    fs::write(
        dir.path().join("mappers/person.toml"),
        PERSON_MAPPER.replace("params = [\"name\"]", "params = [\"_args\"]"),
    )
    .expect("edit");
    let cfg = MapperConfig::load(path).expect("load");
    let err = Mapper::from_config(&cfg, echo_connector())
        .err()
        .expect("reserved key rejected");
    assert_eq!(err.code(), "ConfigurationError");
}

#[test]
fn missing_config_file_is_configuration_error() {
    let dir = TempDir::new().expect("tempdir");
    let err = MapperConfig::load(dir.path().join("absent.toml")).expect_err("missing");
    assert_eq!(err.code(), "ConfigurationError");
}
