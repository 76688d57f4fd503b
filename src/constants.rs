//! Global constants used throughout the kots-render codebase.
//!
//! This module contains the template delimiter pairs, environment variable
//! names, and document identifiers that are shared across multiple modules.
//! Defining them centrally keeps the external contracts in one place.

/// Left delimiter of the first render pass (`{{repl ... }}`).
pub const CURLY_REPL_LEFT: &str = "{{repl";

/// Left delimiter of the second render pass (`repl{{ ... }}`).
pub const REPL_CURLY_LEFT: &str = "repl{{";

/// Right delimiter shared by both render passes.
pub const RIGHT_DELIM: &str = "}}";

/// Config item type whose values are stored encrypted.
pub const PASSWORD_ITEM_TYPE: &str = "password";

/// Namespace returned by `Namespace` when nothing else is configured.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Environment variable consulted by `Namespace`.
pub const POD_NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// Environment variable overriding the settings file location.
pub const SETTINGS_PATH_ENV: &str = "KOTS_RENDER_CONFIG";

/// Environment variable overriding the configured encryption key.
pub const ENCRYPTION_KEY_ENV: &str = "KOTS_RENDER_ENCRYPTION_KEY";

/// Character class used by `RandomString` when none is given.
pub const DEFAULT_RANDOM_CHARSET: &str = "[_A-Za-z0-9]";

/// Validity used by the TLS helpers when `daysValid` is omitted.
pub const DEFAULT_CERT_DAYS_VALID: i64 = 365;

/// Prefix every recognised document `apiVersion` must carry.
pub const API_VERSION_PREFIX: &str = "kots.io/";

/// `apiVersion` written on generated documents.
pub const API_VERSION: &str = "kots.io/v1beta1";

/// Registries authenticated by `LicenseDockerCfg`.
pub const LICENSE_REGISTRY_HOSTS: &[&str] = &["proxy.replicated.com", "registry.replicated.com"];
