//! End-to-end tests of the `kots-render` binary.

use assert_cmd::Command;
use kots_render::constants::ENCRYPTION_KEY_ENV;
use kots_render::crypto::{AesCipher, decrypt_value};
use kots_render::test_utils::DocumentFixture;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn kots_render(temp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kots-render").unwrap();
    cmd.current_dir(temp.path())
        .env("KOTS_RENDER_CONFIG", temp.path().join("settings.toml"))
        .env_remove(ENCRYPTION_KEY_ENV)
        .env_remove("RUST_LOG");
    fs::write(temp.path().join("settings.toml"), "namespace = \"apps\"\n").unwrap();
    cmd
}

#[test]
fn test_resolve_prints_config_values() {
    let temp = TempDir::new().unwrap();
    DocumentFixture::config_chain().write_to(temp.path()).unwrap();
    DocumentFixture::values(&[("abcItem", "replacedAbcItemValue")]).write_to(temp.path()).unwrap();

    kots_render(&temp)
        .args(["resolve", "--config", "config.yaml", "--values", "values.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kind: ConfigValues"))
        .stdout(predicate::str::contains(
            "default: this is a middle value hello world replacedAbcItemValue",
        ));
}

#[test]
fn test_resolve_loop_fails() {
    let temp = TempDir::new().unwrap();
    DocumentFixture::config_loop().write_to(temp.path()).unwrap();

    kots_render(&temp)
        .args(["resolve", "--config", "config.yaml"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(r#""a" depends on "b""#));
}

#[test]
fn test_required_items_enforced() {
    let temp = TempDir::new().unwrap();
    DocumentFixture::config_required().write_to(temp.path()).unwrap();

    kots_render(&temp)
        .args(["resolve", "--config", "config.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hostname"));

    kots_render(&temp)
        .args(["resolve", "--config", "config.yaml", "--skip-required"])
        .assert()
        .success();
}

#[test]
fn test_render_to_out_dir() {
    let temp = TempDir::new().unwrap();
    DocumentFixture::config_chain().write_to(temp.path()).unwrap();
    fs::write(
        temp.path().join("configmap.yaml"),
        "namespace: repl{{ Namespace }}\ngreeting: '{{repl ConfigOption \"childItem1\" }}'\n",
    )
    .unwrap();

    kots_render(&temp)
        .args(["render", "--config", "config.yaml", "--out-dir", "out", "configmap.yaml"])
        .assert()
        .success();

    let rendered = fs::read_to_string(temp.path().join("out/configmap.yaml")).unwrap();
    assert_eq!(rendered, "namespace: apps\ngreeting: 'hello world HELLO, WORLD'\n");
}

#[test]
fn test_graph_waves() {
    let temp = TempDir::new().unwrap();
    DocumentFixture::config_tls().write_to(temp.path()).unwrap();

    kots_render(&temp)
        .args(["graph", "--config", "config.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1: echo"))
        .stdout(predicate::str::contains("2: delta"));
}

#[test]
fn test_wrong_document_kind() {
    let temp = TempDir::new().unwrap();
    let license = DocumentFixture::license().write_to(temp.path()).unwrap();

    kots_render(&temp)
        .args(["graph", "--config"])
        .arg(&license)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Expected kind 'Config'"));
}

#[test]
fn test_keygen_then_encrypt() {
    let temp = TempDir::new().unwrap();
    let output = kots_render(&temp).arg("keygen").assert().success().get_output().stdout.clone();
    let key = String::from_utf8(output).unwrap().trim().to_string();
    let cipher = AesCipher::from_key_string(&key).unwrap();

    let output = kots_render(&temp)
        .env(ENCRYPTION_KEY_ENV, &key)
        .args(["encrypt", "hunter2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stored = String::from_utf8(output).unwrap();
    assert_eq!(decrypt_value(&cipher, stored.trim()).unwrap(), "hunter2");
}

#[test]
fn test_encrypt_without_key_fails() {
    let temp = TempDir::new().unwrap();
    kots_render(&temp)
        .args(["encrypt", "hunter2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No encryption key configured"));
}
