//! Shared data models for config resolution
//!
//! These structures mirror the YAML documents application authors and
//! installers exchange: config groups and items, stored config values,
//! licenses, and the installation metadata the template providers read.
//! Field names follow the camelCase wire format of those documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Accept a YAML string, bool or number and keep its textual form.
///
/// Authors routinely write `default: 8080` or `default: true`; templates
/// treat every value as text.
fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Str(String),
        Bool(bool),
        Int(i64),
        Uint(u64),
        Float(f64),
    }

    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        None => String::new(),
        Some(Scalar::Str(s)) => s,
        Some(Scalar::Bool(b)) => b.to_string(),
        Some(Scalar::Int(i)) => i.to_string(),
        Some(Scalar::Uint(u)) => u.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
    })
}

/// A titled group of config items.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Templated boolean guarding the whole group.
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub when: String,
    #[serde(default)]
    pub items: Vec<ConfigItem>,
}

/// One user-configurable option. `name` is the resolution key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigItem {
    pub name: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help_text: String,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub default: String,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub when: String,
    /// Options of a `select_one` item.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ConfigChildItem>,
}

impl ConfigItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type: "text".to_string(),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    pub fn is_password(&self) -> bool {
        self.item_type == crate::constants::PASSWORD_ITEM_TYPE
    }
}

/// An option of a `select_one` item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigChildItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub recommended: bool,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub default: String,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub value: String,
}

/// The resolved runtime pair for one config item.
///
/// Empty strings count as absent in [`has_value`](Self::has_value) and
/// [`has_default`](Self::has_default).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemValue {
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, deserialize_with = "scalar_string", skip_serializing_if = "String::is_empty")]
    pub default: String,
    /// Parent item name for values produced by a repeatable item.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repeatable_item: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub filename: String,
}

impl ItemValue {
    pub fn new(value: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            default: default.into(),
            ..Default::default()
        }
    }

    pub fn has_value(&self) -> bool {
        !self.value.is_empty()
    }

    pub fn has_default(&self) -> bool {
        !self.default.is_empty()
    }

    /// The value if present, else the default.
    pub fn effective(&self) -> &str {
        if self.has_value() {
            &self.value
        } else {
            &self.default
        }
    }
}

/// Resolved values keyed by item name.
pub type ItemValues = BTreeMap<String, ItemValue>;

/// A license entitlement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementField {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub value_type: String,
}

/// License fields readable from templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    #[serde(default)]
    pub app_slug: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default, rename = "licenseID", alias = "licenseId")]
    pub license_id: String,
    #[serde(default)]
    pub license_type: String,
    #[serde(default)]
    pub license_sequence: i64,
    #[serde(default)]
    pub is_airgap_supported: bool,
    #[serde(default)]
    pub is_snapshot_supported: bool,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub entitlements: BTreeMap<String, EntitlementField>,
}

/// Metadata about the release being installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    #[serde(default)]
    pub sequence: i64,
    #[serde(default)]
    pub cursor: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub version_label: String,
    #[serde(default)]
    pub release_notes: String,
    #[serde(default)]
    pub is_airgap: bool,
}

/// Identity service settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "clientID", alias = "clientId")]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub restricted_groups: Vec<String>,
    /// Group name to the role IDs granted to it.
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub name: String,
}

/// Installer metadata for embedded clusters, keyed by option name.
pub type KurlValues = BTreeMap<String, serde_json::Value>;

/// Object metadata on a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

/// A versioned YAML document with a typed `spec`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document<T> {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub spec: T,
}

impl<T> Document<T> {
    pub fn new(kind: &str, name: &str, spec: T) -> Self {
        Self {
            api_version: crate::constants::API_VERSION.to_string(),
            kind: kind.to_string(),
            metadata: Metadata {
                name: name.to_string(),
            },
            spec,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpec {
    #[serde(default)]
    pub groups: Vec<ConfigGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValuesSpec {
    #[serde(default)]
    pub values: ItemValues,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_value_effective() {
        assert_eq!(ItemValue::new("", "d").effective(), "d");
        assert_eq!(ItemValue::new("v", "d").effective(), "v");
        assert!(!ItemValue::default().has_value());
        assert!(!ItemValue::default().has_default());
    }

    #[test]
    fn test_scalar_defaults_deserialize_as_text() {
        let yaml = r#"
name: port
type: text
default: 8080
value: true
readonly: true
"#;
        let item: ConfigItem = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(item.default, "8080");
        assert_eq!(item.value, "true");
        assert!(item.readonly);
        assert!(!item.is_password());
    }

    #[test]
    fn test_license_wire_names() {
        let yaml = r#"
appSlug: my-app
licenseID: abc123
entitlements:
  seats:
    title: Seats
    value: 10
"#;
        let license: License = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(license.app_slug, "my-app");
        assert_eq!(license.license_id, "abc123");
        assert_eq!(license.entitlements["seats"].value, serde_json::json!(10));
    }
}
