use catalog_search::config::{ConfigError, SearchServiceConfig};
use catalog_search::search::ranker::RankerKind;
use serial_test::serial;

mod util;

use util::{EnvGuard, TempFixtureDir, TestTracing};

const VARS: &[&str] = &[
    "CATALOG_SEARCH_CACHE_ENABLED",
    "CATALOG_SEARCH_CACHE_CAPACITY",
    "CATALOG_SEARCH_DOC_COUNT_TTL_SECS",
    "CATALOG_SEARCH_RANKER",
];

/// Clear every override for the duration of a test.
fn clean_env() -> Vec<EnvGuard> {
    VARS.iter()
        .map(|key| {
            let guard = EnvGuard::set(key, "");
            unsafe { std::env::remove_var(key) };
            guard
        })
        .collect()
}

#[test]
#[serial]
fn env_overrides_defaults() {
    let _clean = clean_env();
    let _enabled = EnvGuard::set("CATALOG_SEARCH_CACHE_ENABLED", "false");
    let _capacity = EnvGuard::set("CATALOG_SEARCH_CACHE_CAPACITY", "64");
    let _ttl = EnvGuard::set("CATALOG_SEARCH_DOC_COUNT_TTL_SECS", "30");
    let _ranker = EnvGuard::set("CATALOG_SEARCH_RANKER", "round-robin");

    let cfg = SearchServiceConfig::from_env();
    assert!(!cfg.cache_enabled);
    assert_eq!(cfg.cache_capacity, 64);
    assert_eq!(cfg.doc_count_ttl_secs, 30);
    assert_eq!(cfg.ranker, RankerKind::RoundRobin);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    let _clean = clean_env();
    let _capacity = EnvGuard::set("CATALOG_SEARCH_CACHE_CAPACITY", "lots");
    let _ranker = EnvGuard::set("CATALOG_SEARCH_RANKER", "bm25");
    let _enabled = EnvGuard::set("CATALOG_SEARCH_CACHE_ENABLED", "maybe");

    let _ttl = EnvGuard::set("CATALOG_SEARCH_DOC_COUNT_TTL_SECS", "-5");

    let tracing = TestTracing::new();
    let _subscriber = tracing.install();
    assert_eq!(SearchServiceConfig::from_env(), SearchServiceConfig::default());
    for var in VARS {
        tracing.assert_contains(&format!("ignoring invalid {var}"));
    }
}

#[test]
#[serial]
fn zero_capacity_from_env_fails_validation() {
    let _clean = clean_env();
    let _capacity = EnvGuard::set("CATALOG_SEARCH_CACHE_CAPACITY", "0");

    assert_eq!(SearchServiceConfig::from_env().cache_capacity, 0);
    assert!(matches!(SearchServiceConfig::load_env(), Err(ConfigError::Validation(_))));

    let _disabled = EnvGuard::set("CATALOG_SEARCH_CACHE_ENABLED", "false");
    assert!(SearchServiceConfig::load_env().is_ok());
}

#[test]
#[serial]
fn env_wins_over_file() {
    let _clean = clean_env();
    let tmp = TempFixtureDir::new();
    let path = tmp.write("search.toml", "cache_capacity = 16\ndoc_count_ttl_secs = 5\n");
    let _ttl = EnvGuard::set("CATALOG_SEARCH_DOC_COUNT_TTL_SECS", "90");

    let cfg = SearchServiceConfig::load(&path).unwrap();
    assert_eq!(cfg.cache_capacity, 16);
    assert_eq!(cfg.doc_count_ttl_secs, 90);
}

#[test]
#[serial]
fn missing_file_yields_defaults_and_bad_file_errors() {
    let _clean = clean_env();
    let tmp = TempFixtureDir::new();
    let cfg = SearchServiceConfig::load(&tmp.path().join("absent.toml")).unwrap();
    assert_eq!(cfg, SearchServiceConfig::default());

    let bad = tmp.write("bad.toml", "cache_capacity = \"many\"");
    assert!(matches!(SearchServiceConfig::load(&bad), Err(ConfigError::Parse(_))));

    let zero = tmp.write("zero.toml", "cache_capacity = 0");
    assert!(matches!(SearchServiceConfig::load(&zero), Err(ConfigError::Validation(_))));
}
