//! Settings and document parsing.
//!
//! Settings are TOML; application documents (Config, ConfigValues, License)
//! are YAML objects with an `apiVersion`, a `kind` and a `spec`. Both kinds
//! of file are read with the path attached to any error.
//!
//! ```rust,no_run
//! use kots_render::config::load_config;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let groups = load_config(Path::new("config.yaml"))?;
//! println!("{} groups", groups.len());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::constants::API_VERSION_PREFIX;
use crate::core::KotsError;
use crate::core::file_error::read_to_string;
use crate::models::{ConfigGroup, ConfigSpec, ConfigValuesSpec, Document, ItemValues, License};

pub const CONFIG_KIND: &str = "Config";
pub const CONFIG_VALUES_KIND: &str = "ConfigValues";
pub const LICENSE_KIND: &str = "License";

/// Parse a TOML file into `T`.
///
/// # Errors
///
/// Fails if the file cannot be read or does not match `T`.
pub fn parse_config<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned,
{
    let content = read_to_string(path, "settings file")?;
    toml::from_str(&content).map_err(|e| {
        KotsError::SettingsParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Parse a YAML document of the given `kind`.
///
/// The `apiVersion` must start with `kots.io/`.
pub fn parse_document<T>(content: &str, file: &str, kind: &str) -> Result<Document<T>>
where
    T: DeserializeOwned,
{
    let parse_error = |e: serde_yaml::Error| KotsError::DocumentParseError {
        file: file.to_string(),
        reason: e.to_string(),
    };

    let raw: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
    let field = |name: &str| raw.get(name).and_then(serde_yaml::Value::as_str).unwrap_or("");

    let api_version = field("apiVersion");
    if !api_version.starts_with(API_VERSION_PREFIX) {
        return Err(KotsError::UnsupportedApiVersion {
            file: file.to_string(),
            api_version: api_version.to_string(),
        }
        .into());
    }
    let found = field("kind");
    if found != kind {
        return Err(KotsError::UnexpectedKind {
            file: file.to_string(),
            expected: kind.to_string(),
            found: found.to_string(),
        }
        .into());
    }

    Ok(serde_yaml::from_value(raw).map_err(parse_error)?)
}

/// Read and parse a YAML document of the given `kind`.
pub fn load_document<T>(path: &Path, kind: &str) -> Result<Document<T>>
where
    T: DeserializeOwned,
{
    let content = read_to_string(path, &format!("{kind} document"))?;
    let document = parse_document(&content, &path.display().to_string(), kind)?;
    tracing::debug!("Loaded {} document from {}", kind, path.display());
    Ok(document)
}

/// Config groups from a `kind: Config` document.
pub fn load_config(path: &Path) -> Result<Vec<ConfigGroup>> {
    Ok(load_document::<ConfigSpec>(path, CONFIG_KIND)?.spec.groups)
}

/// Item values from a `kind: ConfigValues` document.
pub fn load_config_values(path: &Path) -> Result<ItemValues> {
    Ok(load_document::<ConfigValuesSpec>(path, CONFIG_VALUES_KIND)?.spec.values)
}

pub fn load_license(path: &Path) -> Result<License> {
    Ok(load_document::<License>(path, LICENSE_KIND)?.spec)
}

/// Serialize resolved values as a ConfigValues document.
pub fn config_values_document(name: &str, values: ItemValues) -> Result<String> {
    let document = Document::new(
        CONFIG_VALUES_KIND,
        name,
        ConfigValuesSpec {
            values,
        },
    );
    serde_yaml::to_string(&document).context("Failed to serialize ConfigValues document")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemValue;

    const CONFIG_YAML: &str = r#"
apiVersion: kots.io/v1beta1
kind: Config
metadata:
  name: app
spec:
  groups:
    - name: database
      title: Database
      items:
        - name: host
          type: text
          default: postgres
"#;

    #[test]
    fn test_parse_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(&path, "namespace = \"apps\"\n").unwrap();

        #[derive(serde::Deserialize)]
        struct Partial {
            namespace: String,
        }
        let parsed: Partial = parse_config(&path).unwrap();
        assert_eq!(parsed.namespace, "apps");
    }

    #[test]
    fn test_parse_config_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("invalid.toml");
        std::fs::write(&path, "invalid = toml {").unwrap();

        let err = parse_config::<toml::Value>(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KotsError>(),
            Some(KotsError::SettingsParseError { .. })
        ));
    }

    #[test]
    fn test_parse_config_document() {
        let doc: Document<ConfigSpec> =
            parse_document(CONFIG_YAML, "config.yaml", CONFIG_KIND).unwrap();
        assert_eq!(doc.metadata.name, "app");
        assert_eq!(doc.spec.groups[0].items[0].default, "postgres");
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let err = parse_document::<ConfigValuesSpec>(CONFIG_YAML, "config.yaml", CONFIG_VALUES_KIND)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<KotsError>(),
            Some(&KotsError::UnexpectedKind {
                file: "config.yaml".into(),
                expected: "ConfigValues".into(),
                found: "Config".into(),
            })
        );
    }

    #[test]
    fn test_foreign_api_version_rejected() {
        let yaml = CONFIG_YAML.replace("kots.io/v1beta1", "apps/v1");
        let err = parse_document::<ConfigSpec>(&yaml, "config.yaml", CONFIG_KIND).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KotsError>(),
            Some(KotsError::UnsupportedApiVersion { .. })
        ));
    }

    #[test]
    fn test_config_values_document_roundtrip() {
        let mut values = ItemValues::new();
        values.insert("host".into(), ItemValue::new("db.internal", "postgres"));
        let yaml = config_values_document("app", values.clone()).unwrap();
        assert!(yaml.contains("kind: ConfigValues"));

        let doc: Document<ConfigValuesSpec> =
            parse_document(&yaml, "values.yaml", CONFIG_VALUES_KIND).unwrap();
        assert_eq!(doc.spec.values, values);
    }
}
