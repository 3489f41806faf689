//! Integration tests for halcyon-config

use halcyon_config::*;
use halcyon_core::{Accept, MediaType, OperationSignature};
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_manager_from_prefixed_env() {
    unsafe {
        env::set_var("HALCYON_ITEST_BINARY_FALLBACK", "false");
    }

    let manager = ConfigManager::with_prefix("HALCYON_ITEST");
    manager.load_env().unwrap();

    assert!(!manager.get_bool("binary_fallback").unwrap());
    assert!(!manager.negotiation().unwrap().binary_fallback);

    unsafe {
        env::remove_var("HALCYON_ITEST_BINARY_FALLBACK");
    }
}

#[test]
fn test_env_loader_with_prefix() {
    let loader = EnvLoader::new(Some("HALCYON_ITEST2".to_string()));

    unsafe {
        env::set_var("HALCYON_ITEST2_MANIFEST", "declarations.toml");
    }

    assert_eq!(loader.load_var("manifest").unwrap(), "declarations.toml");

    unsafe {
        env::remove_var("HALCYON_ITEST2_MANIFEST");
    }
}

#[test]
fn test_load_toml_file() {
    let file = temp_file(
        ".toml",
        r#"
        manifest = "declarations.toml"

        [negotiation]
        expand_json_suffix = false
        "#,
    );

    let manager = ConfigManager::new();
    manager.load_auto(file.path()).unwrap();

    assert_eq!(manager.get_string("manifest").unwrap(), "declarations.toml");
    let negotiation = manager.negotiation().unwrap();
    assert!(!negotiation.expand_json_suffix);
    assert!(negotiation.binary_fallback);
}

#[test]
fn test_later_sources_override_earlier_ones() {
    let json = temp_file(".json", r#"{"negotiation": {"binary_fallback": false}}"#);

    let manager = ConfigManager::with_prefix("HALCYON");
    manager.load_file(json.path(), FileFormat::Json).unwrap();
    manager.load_env_from(vec![("HALCYON_BINARY_FALLBACK".to_string(), "true".to_string())]);

    assert!(manager.negotiation().unwrap().binary_fallback);
}

#[test]
fn test_missing_file() {
    let manager = ConfigManager::new();
    let result = manager.load_file("/nonexistent/halcyon.toml", FileFormat::Toml);
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}

#[test]
fn test_manifest_file_to_negotiation() {
    let file = temp_file(
        ".toml",
        r#"
        [[contracts]]
        name = "Collection"

        [[contracts.operations]]
        name = "list"
        produces = [
            'application/hal+json; profile="https://example.com/collection/v1"; qs=0.2',
            'application/hal+json; profile="https://example.com/collection/v2"; qs=0.7',
            "application/x.orders-v2+json; qs=0.9",
        ]

        [[resources]]
        name = "OrderResource"
        implements = ["Collection"]
        "#,
    );

    let registry = DeclarationManifest::load(file.path()).unwrap().into_registry().unwrap();
    let producible = registry.resolve("OrderResource", &OperationSignature::new("list")).unwrap();

    let negotiator = NegotiationConfig::default().negotiator();

    let any = negotiator.negotiate(&producible, &Accept::any()).unwrap();
    assert_eq!(any.media_type(), &MediaType::new("application", "x.orders-v2+json"));

    let pinned = Accept::parse("application/hal+json; profile=\"https://example.com/collection/v1\"").unwrap();
    let selected = negotiator.negotiate(&producible, &pinned).unwrap();
    assert_eq!(selected.media_type().profile(), Some("https://example.com/collection/v1"));
}

#[test]
fn test_ambiguous_manifest_is_rejected_at_load() {
    let manifest = DeclarationManifest::parse(
        r#"{
            "contracts": [
                {"name": "JsonExport", "operations": [{"name": "export", "produces": ["application/json"]}]},
                {"name": "XmlExport", "operations": [{"name": "export", "produces": ["application/xml"]}]}
            ],
            "resources": [
                {"name": "OrderResource", "implements": ["JsonExport", "XmlExport"]}
            ]
        }"#,
        FileFormat::Json,
    )
    .unwrap();

    let err = manifest.into_registry().unwrap_err();
    assert!(matches!(
        err,
        ConfigError::Declaration(halcyon_core::Error::AmbiguousDeclaration { .. })
    ));
}

#[test]
fn test_config_error_display() {
    let err = ConfigError::ParseError("negotiation".to_string());
    assert!(err.to_string().contains("negotiation"));

    let err = ConfigError::from(halcyon_core::Error::UnknownResource("Orders".to_string()));
    assert!(err.to_string().contains("Orders"));
}

#[test]
fn test_missing_manifest_file() {
    let err = DeclarationManifest::load("/nonexistent/declarations.toml").unwrap_err();
    match err {
        ConfigError::LoadError(message) => assert!(message.contains("/nonexistent/declarations.toml")),
        other => panic!("expected LoadError, got {:?}", other),
    }
}
