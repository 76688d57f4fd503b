//! Resolution of Config documents loaded from disk.

use anyhow::Result;
use kots_render::config::{load_config, load_config_values};
use kots_render::crypto::{AesCipher, encrypt_value};
use kots_render::models::{ItemValue, ItemValues};
use kots_render::resolver::{ConfigResolver, DepGraph, ResolveError};
use kots_render::templating::TlsCache;
use kots_render::test_utils::{DocumentFixture, init_test_logging};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_static_default_without_stored_value() -> Result<()> {
    init_test_logging(None);
    let temp = TempDir::new()?;
    let groups = load_config(&DocumentFixture::config_chain().write_to(temp.path())?)?;

    let values = ConfigResolver::new().resolve(&groups, &ItemValues::new())?;
    assert_eq!(values["abcItem"], ItemValue::new("", "HELLO, WORLD"));
    assert_eq!(values["childItem1"].default, "hello world HELLO, WORLD");
    Ok(())
}

#[test]
fn test_supplied_value_flows_through_chain() -> Result<()> {
    init_test_logging(None);
    let temp = TempDir::new()?;
    let groups = load_config(&DocumentFixture::config_chain().write_to(temp.path())?)?;
    let supplied = load_config_values(
        &DocumentFixture::values(&[("abcItem", "replacedAbcItemValue")]).write_to(temp.path())?,
    )?;

    let values = ConfigResolver::new().resolve(&groups, &supplied)?;
    assert_eq!(values["abcItem"].value, "replacedAbcItemValue");
    assert_eq!(
        values["childItem3"].default,
        "this is a middle value hello world replacedAbcItemValue"
    );
    Ok(())
}

#[test]
fn test_key_consumer_resolves_after_cert_producer() -> Result<()> {
    let temp = TempDir::new()?;
    let groups = load_config(&DocumentFixture::config_tls().write_to(temp.path())?)?;

    let mut graph = DepGraph::new();
    graph.parse_config_group(&groups);
    assert_eq!(graph.evaluation_waves()?, vec![vec!["echo"], vec!["delta"]]);

    let cache = Arc::new(TlsCache::new());
    let values = ConfigResolver::new()
        .with_tls_cache(Arc::clone(&cache))
        .resolve(&groups, &ItemValues::new())?;
    assert!(values["echo"].default.starts_with("-----BEGIN CERTIFICATE-----"));
    assert!(values["delta"].default.contains("PRIVATE KEY-----"));

    let pair = cache.cert("certA", &Default::default())?;
    assert_eq!(values["delta"].default, pair.key);
    Ok(())
}

#[test]
fn test_loop_names_every_stuck_item() -> Result<()> {
    let temp = TempDir::new()?;
    let groups = load_config(&DocumentFixture::config_loop().write_to(temp.path())?)?;

    let err = ConfigResolver::new().resolve(&groups, &ItemValues::new()).unwrap_err();
    assert!(matches!(err, ResolveError::Graph(_)));
    assert_eq!(
        err.to_string(),
        r#"No more indep config items can be resolved; possible loop: "a" depends on "b"; "b" depends on "a""#
    );
    Ok(())
}

#[test]
fn test_missing_reference_renders_empty() -> Result<()> {
    let temp = TempDir::new()?;
    let groups = load_config(&DocumentFixture::config_required().write_to(temp.path())?)?;

    let resolver = ConfigResolver::new();
    let values = resolver.resolve(&groups, &ItemValues::new())?;
    assert_eq!(values["url"].default, "postgres://");
    assert_eq!(resolver.validate_required(&groups, &values)?, vec!["hostname"]);

    let rendered = resolver
        .builder(values)
        .render_template("t", r#"[{{repl ConfigOption "option_3" }}]"#)?;
    assert_eq!(rendered, "[]");
    Ok(())
}

#[test]
fn test_encrypted_password_decrypted_for_templates() -> Result<()> {
    let temp = TempDir::new()?;
    let cipher = AesCipher::generate()?;
    let groups = load_config(&DocumentFixture::config_required().write_to(temp.path())?)?;
    let stored = encrypt_value(&cipher, "hunter2")?;
    let supplied = load_config_values(
        &DocumentFixture::values(&[("hostname", "db.internal"), ("password", &stored)])
            .write_to(temp.path())?,
    )?;

    let resolver = ConfigResolver::new().with_cipher(Some(Arc::new(cipher)));
    let values = resolver.resolve(&groups, &supplied)?;
    assert_eq!(values["password"].value, "hunter2");
    assert_eq!(values["url"].default, "postgres://db.internal");
    Ok(())
}
