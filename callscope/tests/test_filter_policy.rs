//! Policy document loading and precedence semantics.

use callscope::domain::{EntityId, PolicyError};
use callscope::filter::{FilterEngine, FilterPolicy};

const POLICY_DOC: &str = r#"{
    "global_filters": {
        "include_patterns": ["handle_.*"],
        "exclude_patterns": ["dispatch_.*", "gc_.*"]
    },
    "module_specific_filters": {
        "libvendor.so": {"include": [], "exclude": [".*"]},
        "libapp.so": {"include": ["gc_force"], "exclude": []}
    },
    "call_depth_limit": 4,
    "min_call_count": 2,
    "max_call_count": 1000
}"#;

fn engine() -> FilterEngine {
    FilterEngine::compile(&FilterPolicy::from_json(POLICY_DOC).unwrap()).unwrap()
}

#[test]
fn test_full_document_loads() {
    let policy = FilterPolicy::from_json(POLICY_DOC).unwrap();
    assert_eq!(policy.call_depth_limit, Some(4));
    assert_eq!(policy.min_call_count, Some(2));
    assert_eq!(policy.max_call_count, Some(1000));
    assert_eq!(policy.module_specific_filters.len(), 2);
}

#[test]
fn test_missing_sections_default_to_empty() {
    let policy = FilterPolicy::from_json("{}").unwrap();
    let engine = FilterEngine::compile(&policy).unwrap();
    assert!(engine.allowed(&EntityId::new("m", "anything"), 99));
}

#[test]
fn test_module_exclude_wins_over_global_include() {
    let engine = engine();
    // handle_input is globally included, but libvendor.so excludes all
    assert!(!engine.allowed(&EntityId::new("libvendor.so", "handle_input"), 0));
    assert!(engine.allowed(&EntityId::new("libapp.so", "handle_input"), 0));
}

#[test]
fn test_module_include_wins_over_global_exclude() {
    let engine = engine();
    // gc_.* is globally excluded; libapp.so re-includes gc_force
    assert!(engine.allowed(&EntityId::new("libapp.so", "gc_force"), 0));
    assert!(!engine.allowed(&EntityId::new("libapp.so", "gc_minor"), 0));
    assert!(!engine.allowed(&EntityId::new("libother.so", "gc_force"), 0));
}

#[test]
fn test_depth_limit_is_lowest_precedence_deny() {
    let engine = engine();
    let plain = EntityId::new("libother.so", "helper");
    assert!(engine.allowed(&plain, 3));
    assert!(!engine.allowed(&plain, 4));
    // a global include outranks the depth rule
    assert!(engine.allowed(&EntityId::new("libother.so", "handle_deep"), 8));
}

#[test]
fn test_invalid_regex_fails_at_load_time() {
    let policy =
        FilterPolicy::from_json(r#"{"global_filters": {"exclude_patterns": ["[unclosed"]}}"#)
            .unwrap();
    let err = FilterEngine::compile(&policy).unwrap_err();
    assert!(matches!(err, PolicyError::InvalidPattern { .. }));
}

#[test]
fn test_unparseable_document_is_a_policy_error() {
    assert!(matches!(FilterPolicy::from_json("{not json").unwrap_err(), PolicyError::Parse(_)));
}

#[test]
fn test_policy_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("policy.json");
    std::fs::write(&path, POLICY_DOC).unwrap();

    let policy = FilterPolicy::from_file(&path).unwrap();
    assert_eq!(policy.call_depth_limit, Some(4));

    let missing = FilterPolicy::from_file(dir.path().join("absent.json"));
    assert!(matches!(missing.unwrap_err(), PolicyError::Io(_)));
}
