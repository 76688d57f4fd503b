//! Dependency-ordered config resolution.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::ResolveError;
use super::dependency_graph::DepGraph;
use super::values::{decrypt_or_original, new_config_context};
use crate::crypto::Cipher;
use crate::models::{
    ConfigGroup, ConfigItem, IdentityConfig, ItemValue, ItemValues, KurlValues, License,
    VersionInfo,
};
use crate::templating::{
    Builder, ConfigCtx, IdentityCtx, KurlCtx, LicenseCtx, StaticCtx, TlsCache, VersionCtx,
};

/// Resolves config items in dependency order and renders config objects.
///
/// One resolver owns one TLS cache, so certificates generated while
/// resolving are the same ones later rendered into documents.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    static_ctx: StaticCtx,
    license: LicenseCtx,
    version: VersionCtx,
    identity: IdentityCtx,
    kurl: KurlCtx,
    cipher: Option<Arc<dyn Cipher>>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_license(mut self, license: Option<License>) -> Self {
        self.license = LicenseCtx::new(license);
        self
    }

    pub fn with_version(mut self, version: Option<VersionInfo>) -> Self {
        self.version = VersionCtx::new(version);
        self
    }

    pub fn with_identity(mut self, identity: Option<IdentityConfig>) -> Self {
        self.identity = IdentityCtx::new(identity);
        self
    }

    /// Installer metadata; its presence also makes `IsKurl` true.
    pub fn with_kurl(mut self, kurl: Option<KurlValues>) -> Self {
        self.static_ctx = self.static_ctx.with_kurl(kurl.is_some());
        self.kurl = KurlCtx::new(kurl);
        self
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.static_ctx = self.static_ctx.with_namespace(namespace);
        self
    }

    pub fn with_cipher(mut self, cipher: Option<Arc<dyn Cipher>>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_tls_cache(mut self, cache: Arc<TlsCache>) -> Self {
        self.static_ctx = self.static_ctx.with_tls_cache(cache);
        self
    }

    /// The full evaluator over `values`.
    pub fn builder(&self, values: ItemValues) -> Builder {
        Builder::new()
            .with_ctx(self.static_ctx.clone())
            .with_ctx(self.license.clone())
            .with_ctx(self.version.clone())
            .with_ctx(self.identity.clone())
            .with_ctx(self.kurl.clone())
            .with_ctx(ConfigCtx::new(values))
    }

    /// Resolve every item's value and default.
    ///
    /// Items are rendered wave by wave: each wave sees the values of all
    /// items resolved before it. A supplied non-empty value is kept for
    /// items that are not read-only; the default is always recomputed.
    ///
    /// # Errors
    ///
    /// Fails on a render error, naming the item, or on a dependency loop.
    pub fn resolve(
        &self,
        groups: &[ConfigGroup],
        supplied: &ItemValues,
    ) -> Result<ItemValues, ResolveError> {
        let items: BTreeMap<&str, &ConfigItem> =
            groups.iter().flat_map(|g| &g.items).map(|i| (i.name.as_str(), i)).collect();
        let cipher = self.cipher.as_deref();

        // Certificates must first be generated in dependency order, so the
        // static-only pass gets a scratch cache.
        let first_pass = self.static_ctx.clone().with_tls_cache(Arc::new(TlsCache::new()));
        let mut values = new_config_context(groups, supplied, &first_pass, cipher);
        let mut graph = DepGraph::new();
        graph.parse_config_group(groups);

        let mut waves = 0;
        loop {
            let heads = graph.get_head_nodes()?;
            if heads.is_empty() {
                break;
            }
            waves += 1;
            tracing::debug!("Resolving wave {}: {:?}", waves, heads);

            let builder = self.builder(values.clone());
            for head in &heads {
                if let Some(item) = items.get(head.as_str()) {
                    let render = |text: &str| {
                        builder.render_template(&item.name, text).map_err(|source| {
                            ResolveError::Render {
                                item: item.name.clone(),
                                source,
                            }
                        })
                    };
                    let default = render(&item.default)?;
                    let value = render(&item.value)?;

                    let keep_supplied = !item.readonly
                        && supplied.get(&item.name).is_some_and(ItemValue::has_value);
                    let entry = values.entry(item.name.clone()).or_default();
                    entry.default = default;
                    if !keep_supplied {
                        entry.value = match cipher {
                            Some(cipher) if item.is_password() && !value.is_empty() => {
                                decrypt_or_original(cipher, &item.name, &value)
                            }
                            _ => value,
                        };
                    }
                }
                graph.resolve_dep(head);
            }
        }

        tracing::info!("Resolved {} config items in {} waves", graph.resolved().len(), waves);
        Ok(values)
    }

    /// Render titles, help text and `when` guards, and apply resolved values.
    pub fn render_config(
        &self,
        groups: &[ConfigGroup],
        values: &ItemValues,
    ) -> Result<Vec<ConfigGroup>, ResolveError> {
        let builder = self.builder(values.clone());
        let render = |name: &str, text: &str| {
            builder.render_template(name, text).map_err(|source| ResolveError::Render {
                item: name.to_string(),
                source,
            })
        };

        let mut rendered = Vec::with_capacity(groups.len());
        for group in groups {
            let mut group = group.clone();
            group.title = render(&group.name, &group.title)?;
            group.description = render(&group.name, &group.description)?;
            group.when = render(&group.name, &group.when)?;
            for item in &mut group.items {
                item.title = render(&item.name, &item.title)?;
                item.help_text = render(&item.name, &item.help_text)?;
                item.when = render(&item.name, &item.when)?;
                for child in &mut item.items {
                    child.title = render(&item.name, &child.title)?;
                }
                if let Some(resolved) = values.get(&item.name) {
                    item.value = resolved.value.clone();
                    item.default = resolved.default.clone();
                }
            }
            rendered.push(group);
        }
        Ok(rendered)
    }

    /// Names of visible required items that have neither value nor default.
    pub fn validate_required(
        &self,
        groups: &[ConfigGroup],
        values: &ItemValues,
    ) -> Result<Vec<String>, ResolveError> {
        let builder = self.builder(values.clone());
        let when = |name: &str, text: &str| {
            builder.bool(text, true).map_err(|source| ResolveError::Render {
                item: name.to_string(),
                source,
            })
        };

        let mut missing = Vec::new();
        for group in groups {
            if !when(&group.name, &group.when)? {
                continue;
            }
            for item in &group.items {
                if !item.required || item.hidden || !when(&item.name, &item.when)? {
                    continue;
                }
                if values.get(&item.name).is_none_or(|v| v.effective().is_empty()) {
                    missing.push(item.name.clone());
                }
            }
        }
        Ok(missing)
    }
}
