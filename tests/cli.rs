use assert_cmd::Command;
use catalog_search::search::ranker::RankerKind;
use catalog_search::{Cli, Commands};
use clap::Parser;
use predicates::str::contains;
use serde_json::Value;

mod util;

use util::TempFixtureDir;

const FIXTURE: &str = r#"[
  {"entity_type": "dataset", "id": "d1", "document": {"urn": "urn:li:dataset:orders", "name": "orders", "platform": "hive", "rows": 120}},
  {"entity_type": "dataset", "id": "d2", "document": {"urn": "urn:li:dataset:users", "name": "users", "platform": "snowflake", "rows": 40}},
  {"entity_type": "chart", "id": "c1", "document": {"urn": "urn:li:chart:orders", "title": "orders by day", "platform": "looker"}},
  {"entity_type": "corpuser", "id": "u1", "document": {"urn": "urn:li:corpuser:alice", "name": "alice", "removed": true}}
]"#;

fn base_cmd(fixture: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("catalog-search"));
    cmd.env("CATALOG_SEARCH_FIXTURE", fixture);
    cmd.env_remove("CATALOG_SEARCH_RANKER");
    cmd.env_remove("CATALOG_SEARCH_CACHE_CAPACITY");
    cmd.env_remove("CATALOG_SEARCH_CACHE_ENABLED");
    cmd.env_remove("CATALOG_SEARCH_DOC_COUNT_TTL_SECS");
    cmd.env("RUST_LOG", "off");
    cmd
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout is JSON")
}

fn urns(result: &Value) -> Vec<String> {
    result["entities"]
        .as_array()
        .expect("entities")
        .iter()
        .map(|e| e["entity"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn search_help_prints_usage() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);
    base_cmd(&fixture)
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(contains("--entity"))
        .stdout(contains("--filter"))
        .stdout(contains("--skip-cache"))
        .stdout(contains("--ranker"));
}

#[test]
fn search_parses_flags() {
    let cli = Cli::try_parse_from([
        "catalog-search",
        "--fixture",
        "f.json",
        "search",
        "orders",
        "--entity",
        "dataset",
        "--entity",
        "chart",
        "--filter",
        "platform=hive",
        "--size",
        "5",
        "--ranker",
        "round-robin",
    ])
    .expect("parse search flags");

    match cli.command {
        Commands::Search {
            query,
            entities,
            filters,
            size,
            ranker,
            ..
        } => {
            assert_eq!(query, "orders");
            assert_eq!(entities, vec!["dataset", "chart"]);
            assert_eq!(filters, vec!["platform=hive"]);
            assert_eq!(size, 5);
            assert_eq!(ranker, Some(RankerKind::RoundRobin));
        }
        other => panic!("expected search command, got {other:?}"),
    }
}

#[test]
fn desc_requires_sort() {
    let err = Cli::try_parse_from(["catalog-search", "--fixture", "f.json", "search", "x", "--desc"]);
    assert!(err.is_err());
}

#[test]
fn search_merges_entity_types() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);
    let result = run_json(base_cmd(&fixture).args(["search", "orders"]));
    assert_eq!(result["numEntities"], 2);
    assert_eq!(urns(&result), vec!["urn:li:dataset:orders", "urn:li:chart:orders"]);
}

#[test]
fn search_applies_filters() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);

    let result = run_json(base_cmd(&fixture).args(["search", "*", "--filter", "platform!=hive;rows>=10"]));
    assert_eq!(urns(&result), vec!["urn:li:dataset:users"]);

    let result = run_json(base_cmd(&fixture).args([
        "search",
        "*",
        "--filter",
        "platform=looker",
        "--filter-json",
        r#"{"or": [{"and": [{"field": "removed", "values": ["true"]}]}]}"#,
    ]));
    assert_eq!(result["numEntities"], 2);
}

#[test]
fn search_sorts_and_pages() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);
    let result = run_json(base_cmd(&fixture).args([
        "search", "*", "--entity", "dataset", "--sort", "rows", "--desc", "--size", "1",
    ]));
    assert_eq!(result["numEntities"], 2);
    assert_eq!(result["pageSize"], 1);
    assert_eq!(urns(&result), vec!["urn:li:dataset:orders"]);
}

#[test]
fn invalid_filter_fails() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);
    base_cmd(&fixture)
        .args(["search", "*", "--filter", "name~="])
        .assert()
        .failure()
        .stderr(contains("invalid filter"));
}

#[test]
fn count_prints_doc_counts() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);
    let counts = run_json(base_cmd(&fixture).args(["count"]));
    assert_eq!(counts["dataset"], 2);
    assert_eq!(counts["chart"], 1);
    assert_eq!(counts["corpuser"], 1);

    let counts = run_json(base_cmd(&fixture).args(["count", "--entity", "dashboard"]));
    assert_eq!(counts["dashboard"], 0);
}

#[test]
fn config_file_is_honoured() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);
    let config = tmp.write("config.toml", "ranker = \"round_robin\"\ncache_capacity = 4\n");
    let result = run_json(base_cmd(&fixture).args([
        "--config",
        config.to_str().expect("utf8 path"),
        "search",
        "*",
        "--entity",
        "dataset",
        "--entity",
        "chart",
    ]));
    // Round robin interleaves one hit per entity type per round.
    assert_eq!(
        urns(&result),
        vec!["urn:li:dataset:orders", "urn:li:chart:orders", "urn:li:dataset:users"]
    );
}

#[test]
fn missing_fixture_fails() {
    let tmp = TempFixtureDir::new();
    base_cmd(&tmp.path().join("nope.json"))
        .args(["count"])
        .assert()
        .failure()
        .stderr(contains("reading fixture"));
}

#[test]
fn zero_capacity_from_env_is_rejected() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", FIXTURE);
    base_cmd(&fixture)
        .env("CATALOG_SEARCH_CACHE_CAPACITY", "0")
        .args(["search", "orders"])
        .assert()
        .failure()
        .stderr(contains("invalid search configuration"));
}

#[test]
fn empty_fixture_searches_to_zero_matches() {
    let tmp = TempFixtureDir::new();
    let fixture = tmp.write("fixture.json", "[]");
    let result = run_json(base_cmd(&fixture).args(["search", "test"]));
    assert_eq!(result["numEntities"], 0);
    assert!(urns(&result).is_empty());
}
