//! Test fixtures for Config, ConfigValues and License documents.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A YAML document written to a temporary directory by tests.
#[derive(Clone, Debug)]
pub struct DocumentFixture {
    pub file_name: String,
    pub content: String,
}

impl DocumentFixture {
    fn new(file_name: &str, content: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            content: content.trim_start().to_string(),
        }
    }

    /// Three items where each default reads the previous one.
    pub fn config_chain() -> Self {
        Self::new(
            "config.yaml",
            r#"
apiVersion: kots.io/v1beta1
kind: Config
metadata:
  name: chain
spec:
  groups:
    - name: example_settings
      title: My Example Config
      items:
        - name: abcItem
          type: text
          default: 'repl{{ ToUpper "hello, world"}}'
        - name: childItem1
          type: text
          default: 'hello world repl{{ ConfigOption "abcItem" }}'
        - name: childItem3
          type: text
          default: 'this is a middle value repl{{ ConfigOption "childItem1" }}'
"#,
        )
    }

    /// `delta` needs the key of the certificate `echo` generates.
    pub fn config_tls() -> Self {
        Self::new(
            "config.yaml",
            r#"
apiVersion: kots.io/v1beta1
kind: Config
metadata:
  name: tls
spec:
  groups:
    - name: certs
      items:
        - name: delta
          type: textarea
          default: '{{repl TLSKey "certA" }}'
        - name: echo
          type: textarea
          default: '{{repl TLSCert "certA" "example.com" }}'
"#,
        )
    }

    /// Two items reading each other.
    pub fn config_loop() -> Self {
        Self::new(
            "config.yaml",
            r#"
apiVersion: kots.io/v1beta1
kind: Config
metadata:
  name: loop
spec:
  groups:
    - name: broken
      items:
        - name: a
          type: text
          default: '{{repl ConfigOption "b" }}'
        - name: b
          type: text
          default: '{{repl ConfigOption "a" }}'
"#,
        )
    }

    /// A required item without default plus a password item.
    pub fn config_required() -> Self {
        Self::new(
            "config.yaml",
            r#"
apiVersion: kots.io/v1beta1
kind: Config
metadata:
  name: required
spec:
  groups:
    - name: database
      items:
        - name: hostname
          type: text
          required: true
        - name: password
          type: password
        - name: url
          type: text
          default: 'postgres://{{repl ConfigOption "hostname" }}'
"#,
        )
    }

    pub fn values(entries: &[(&str, &str)]) -> Self {
        let mut content = String::from(
            "apiVersion: kots.io/v1beta1\nkind: ConfigValues\nmetadata:\n  name: values\nspec:\n  values:\n",
        );
        for (name, value) in entries {
            content.push_str(&format!("    {name}:\n      value: '{value}'\n"));
        }
        Self {
            file_name: "values.yaml".to_string(),
            content,
        }
    }

    pub fn license() -> Self {
        Self::new(
            "license.yaml",
            r#"
apiVersion: kots.io/v1beta1
kind: License
metadata:
  name: customer
spec:
  appSlug: my-app
  licenseID: abc123
  customerName: Example Corp
  channelName: Stable
  entitlements:
    seats:
      title: Seats
      value: 25
      valueType: Integer
"#,
        )
    }

    /// Write the document into `dir` under its file name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.content)
            .with_context(|| format!("Failed to write fixture {}", path.display()))?;
        Ok(path)
    }
}
