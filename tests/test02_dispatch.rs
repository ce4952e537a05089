use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value as JsonValue, json};
use sql_bootstrap::prelude::*;

static SUPPORT_LOADS: AtomicUsize = AtomicUsize::new(0);
static SHARED_LOADS: AtomicUsize = AtomicUsize::new(0);

fn mock_support(toolkit: &Toolkit) -> Result<(), DomainError> {
    SUPPORT_LOADS.fetch_add(1, Ordering::SeqCst);
    toolkit.require("adapters/shared/mock")
}

fn mock_shared(_: &Toolkit) -> Result<(), DomainError> {
    SHARED_LOADS.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

fn object(value: JsonValue) -> OptionsMap {
    match value {
        JsonValue::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn arg(value: JsonValue) -> ConnectArg {
    ConnectArg::from(value)
}

#[test]
fn valid_shapes_reach_factory() {
    let toolkit = Toolkit::new();
    let factory = MockFactory::new();
    let adapters = toolkit.adapters();

    adapters.sqlite(&factory, &[]).unwrap();
    adapters.sqlite(&factory, &["blog.db".into()]).unwrap();
    adapters
        .sqlite(&factory, &["blog.db".into(), arg(json!({"max_connections": 10}))])
        .unwrap();
    adapters
        .sqlite(&factory, &[arg(json!({"max_connections": 10}))])
        .unwrap();

    let maps: Vec<OptionsMap> = factory.created().into_iter().map(ConnectOptions::into_map).collect();
    assert_eq!(
        maps,
        vec![
            object(json!({"adapter": "sqlite"})),
            object(json!({"adapter": "sqlite", "database": "blog.db"})),
            object(json!({"adapter": "sqlite", "database": "blog.db", "max_connections": 10})),
            object(json!({"adapter": "sqlite", "max_connections": 10})),
        ]
    );
}

#[test]
fn three_arguments_are_rejected() {
    let toolkit = Toolkit::new();
    let factory = MockFactory::new();
    let err = toolkit
        .adapters()
        .connect(&factory, "pg", &["a".into(), "b".into(), "c".into()])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(err.message(), "Wrong number of arguments, 0-2 arguments valid");
    assert_eq!(factory.created_count(), 0);
}

#[test]
fn non_string_database_is_a_format_error() {
    let toolkit = Toolkit::new();
    let factory = MockFactory::new();
    let err = toolkit
        .adapters()
        .sqlite(&factory, &[arg(json!(42))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert_eq!(
        err.message(),
        "Wrong format of arguments, either use (), (String), (Hash), or (String, Hash)"
    );
}

#[test]
fn unknown_adapter() {
    let toolkit = Toolkit::new();
    let err = toolkit
        .adapters()
        .connect(&MockFactory::new(), "flatfile", &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdapterNotFound);
}

#[test]
fn aliases_resolve_to_canonical_name() {
    let toolkit = Toolkit::bootstrap_with(BootstrapOptions::default()).unwrap();
    let factory = MockFactory::new();
    let conn = toolkit
        .adapters()
        .connect(&factory, "postgresql", &["blog".into()])
        .unwrap();
    assert_eq!(conn.options().adapter(), Some("postgres"));

    let bare = Toolkit::bootstrap_with(BootstrapOptions::from_env_value(Some("1".into()))).unwrap();
    let err = bare
        .adapters()
        .connect(&factory, "postgresql", &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdapterNotFound);
}

#[test]
fn options_may_override_adapter() {
    let toolkit = Toolkit::new();
    let options = toolkit
        .adapters()
        .request("sqlite", &[arg(json!({"adapter": "mock"}))])
        .unwrap();
    assert_eq!(options.adapter(), Some("mock"));

    let err = toolkit
        .adapters()
        .request("sqlite", &[arg(json!({"adapter": 7}))])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AdapterNotFound);
}

#[test]
fn scoped_connection_is_always_destroyed() {
    let toolkit = Toolkit::new();
    let factory = MockFactory::new();

    let id = toolkit
        .adapters()
        .connect_with(&factory, "mock", &[], |conn| Ok(conn.id()))
        .unwrap();
    assert_eq!(id, 1);
    assert_eq!(factory.destroyed_count(), 1);

    let err = toolkit
        .adapters()
        .connect_with(&factory, "mock", &[], |_| -> Result<(), DomainError> {
            Err(DomainError::generic("query failed"))
        })
        .unwrap_err();
    assert_eq!(err.message(), "query failed");
    assert_eq!(factory.destroyed_count(), 2);

    let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        toolkit
            .adapters()
            .connect_with(&factory, "mock", &[], |_| -> Result<(), DomainError> {
                panic!("callback blew up")
            })
    }));
    assert!(panicked.is_err());
    assert_eq!(factory.destroyed_count(), 3);
}

#[test]
fn factory_failures_propagate() {
    let toolkit = Toolkit::new();
    let factory = MockFactory::failing("connection refused");
    let err = toolkit.adapters().mock(&factory, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert_eq!(err.message(), "connection refused");
}

#[test]
fn adapter_support_units_load_once() {
    let toolkit = Toolkit::new();
    toolkit.units().register("adapters/mock", mock_support);
    toolkit.units().register("adapters/shared/mock", mock_shared);
    let factory = MockFactory::new();

    toolkit.adapters().mock(&factory, &[]).unwrap();
    toolkit.adapters().mock(&factory, &["other".into()]).unwrap();

    assert_eq!(SUPPORT_LOADS.load(Ordering::SeqCst), 1);
    assert_eq!(SHARED_LOADS.load(Ordering::SeqCst), 1);
    assert_eq!(factory.created_count(), 2);
}

#[test]
fn connect_by_url() {
    let toolkit = Toolkit::bootstrap_with(BootstrapOptions::default()).unwrap();
    let factory = MockFactory::new();
    let conn = toolkit
        .adapters()
        .connect_url(&factory, "postgresql://app@db.local/blog?max_connections=4")
        .unwrap();
    assert_eq!(
        conn.options().as_map(),
        &object(json!({
            "adapter": "postgres",
            "user": "app",
            "host": "db.local",
            "database": "blog",
            "max_connections": 4,
        }))
    );

    let err = toolkit.adapters().connect_url(&factory, "blog.db").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
}

#[test]
fn settings_flow_into_connection_defaults() {
    let toolkit = Toolkit::new();
    toolkit.settings().set_identifier_input_method(Some(IdentifierCase::Upcase));
    toolkit.settings().set_quote_identifiers(Some(false));
    let factory = MockFactory::new();

    let conn = toolkit.adapters().mock(&factory, &[]).unwrap();
    let defaults = conn.options().defaults();
    assert_eq!(defaults.identifier_input_method, Some(IdentifierCase::Upcase));
    assert_eq!(defaults.quote_identifiers, Some(false));
    assert!(!defaults.single_threaded);
    assert_eq!(conn.options().as_map(), &object(json!({"adapter": "mock"})));
    assert_eq!(conn.input_identifier("posts"), "POSTS");
    assert_eq!(conn.output_identifier("POSTS"), "POSTS");

    toolkit.settings().set_identifier_output_method(Some(IdentifierCase::Downcase));
    let later = toolkit.adapters().mock(&factory, &[]).unwrap();
    assert_eq!(later.output_identifier("POSTS"), "posts");
    assert_eq!(conn.output_identifier("POSTS"), "POSTS");
}
