//! Read-only accessors over installation metadata: the release being
//! installed, the identity service and the embedded cluster installer.
//!
//! Each provider renders zero values when its backing struct is absent.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::Ctx;
use super::args::{check_arity, string_arg};
use crate::models::{IdentityConfig, KurlValues, VersionInfo};
use crate::templating::engine::{FuncMap, TemplateFn, Value, func};

/// Build a zero-argument accessor over optional shared state.
fn accessor<T, F>(state: &Option<Arc<T>>, f: F) -> TemplateFn
where
    T: Default + Send + Sync + 'static,
    F: Fn(&T) -> Value + Send + Sync + 'static,
{
    let state = state.clone();
    func(move |_| {
        Ok(match state.as_deref() {
            Some(inner) => f(inner),
            None => f(&T::default()),
        })
    })
}

#[derive(Debug, Clone, Default)]
pub struct VersionCtx {
    info: Option<Arc<VersionInfo>>,
}

impl VersionCtx {
    pub fn new(info: Option<VersionInfo>) -> Self {
        Self {
            info: info.map(Arc::new),
        }
    }
}

impl Ctx for VersionCtx {
    fn func_map(&self) -> FuncMap {
        let mut funcs = FuncMap::new();
        funcs.insert("Sequence".into(), accessor(&self.info, |v| Value::Int(v.sequence)));
        funcs.insert("Cursor".into(), accessor(&self.info, |v| Value::from(v.cursor.as_str())));
        funcs.insert(
            "ChannelName".into(),
            accessor(&self.info, |v| Value::from(v.channel_name.as_str())),
        );
        funcs.insert(
            "VersionLabel".into(),
            accessor(&self.info, |v| Value::from(v.version_label.as_str())),
        );
        funcs.insert(
            "ReleaseNotes".into(),
            accessor(&self.info, |v| Value::from(v.release_notes.as_str())),
        );
        funcs.insert("IsAirgap".into(), accessor(&self.info, |v| Value::Bool(v.is_airgap)));
        funcs
    }
}

#[derive(Debug, Clone, Default)]
pub struct IdentityCtx {
    config: Option<Arc<IdentityConfig>>,
}

impl IdentityCtx {
    pub fn new(config: Option<IdentityConfig>) -> Self {
        Self {
            config: config.map(Arc::new),
        }
    }
}

impl Ctx for IdentityCtx {
    fn func_map(&self) -> FuncMap {
        let mut funcs = FuncMap::new();
        funcs.insert(
            "IdentityServiceEnabled".into(),
            accessor(&self.config, |c| Value::Bool(c.enabled)),
        );
        funcs.insert(
            "IdentityServiceClientID".into(),
            accessor(&self.config, |c| Value::from(c.client_id.as_str())),
        );
        funcs.insert(
            "IdentityServiceClientSecret".into(),
            accessor(&self.config, |c| Value::from(c.client_secret.as_str())),
        );
        funcs.insert(
            "IdentityServiceRestrictedGroups".into(),
            accessor(&self.config, |c| Value::from(c.restricted_groups.clone())),
        );
        funcs.insert(
            "IdentityServiceRoles".into(),
            accessor(&self.config, |c| {
                Value::Map(
                    c.roles
                        .iter()
                        .map(|(group, roles)| (group.clone(), Value::from(roles.clone())))
                        .collect(),
                )
            }),
        );
        funcs.insert(
            "IdentityServiceName".into(),
            accessor(&self.config, |c| Value::from(c.name.as_str())),
        );
        funcs
    }
}

#[derive(Debug, Clone, Default)]
pub struct KurlCtx {
    values: Option<Arc<KurlValues>>,
}

impl KurlCtx {
    pub fn new(values: Option<KurlValues>) -> Self {
        Self {
            values: values.map(Arc::new),
        }
    }

    pub fn is_present(&self) -> bool {
        self.values.is_some()
    }

    fn keyed(
        &self,
        function: &'static str,
        f: impl Fn(Option<&serde_json::Value>) -> Value + Send + Sync + 'static,
    ) -> TemplateFn {
        let values = self.values.clone();
        func(move |args| {
            check_arity(function, args, 1, 1)?;
            let key = string_arg(function, args, 0)?;
            Ok(f(values.as_deref().and_then(|v| v.get(&key))))
        })
    }
}

impl Ctx for KurlCtx {
    fn func_map(&self) -> FuncMap {
        let mut funcs = FuncMap::new();
        funcs.insert(
            "KurlBool".into(),
            self.keyed("KurlBool", |v| {
                Value::Bool(match v {
                    Some(serde_json::Value::Bool(b)) => *b,
                    Some(serde_json::Value::String(s)) => s == "true",
                    _ => false,
                })
            }),
        );
        funcs.insert(
            "KurlInt".into(),
            self.keyed("KurlInt", |v| {
                Value::Int(match v {
                    Some(serde_json::Value::Number(n)) => {
                        n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or_default()
                    }
                    Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or_default(),
                    _ => 0,
                })
            }),
        );
        funcs.insert(
            "KurlString".into(),
            self.keyed("KurlString", |v| match v {
                Some(serde_json::Value::String(s)) => Value::from(s.as_str()),
                _ => Value::from(""),
            }),
        );
        funcs.insert(
            "KurlOption".into(),
            self.keyed("KurlOption", |v| Value::from(v.map(Value::from).unwrap_or_default().to_string())),
        );

        let values = self.values.clone();
        funcs.insert(
            "KurlAll".into(),
            func(move |_| {
                let all: BTreeMap<String, Value> = values
                    .as_deref()
                    .map(|v| v.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect())
                    .unwrap_or_default();
                Ok(Value::Map(all))
            }),
        );
        funcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_accessors() {
        let funcs = VersionCtx::new(Some(VersionInfo {
            sequence: 7,
            channel_name: "Stable".into(),
            is_airgap: true,
            ..Default::default()
        }))
        .func_map();
        assert_eq!(funcs["Sequence"](&[]).unwrap(), Value::Int(7));
        assert_eq!(funcs["ChannelName"](&[]).unwrap(), Value::from("Stable"));
        assert_eq!(funcs["IsAirgap"](&[]).unwrap(), Value::Bool(true));

        let empty = VersionCtx::default().func_map();
        assert_eq!(empty["Sequence"](&[]).unwrap(), Value::Int(0));
        assert_eq!(empty["Cursor"](&[]).unwrap(), Value::from(""));
    }

    #[test]
    fn test_identity_accessors() {
        let mut roles = BTreeMap::new();
        roles.insert("admins".to_string(), vec!["cluster-admin".to_string()]);
        let funcs = IdentityCtx::new(Some(IdentityConfig {
            enabled: true,
            client_id: "kots".into(),
            restricted_groups: vec!["ops".into()],
            roles,
            ..Default::default()
        }))
        .func_map();
        assert_eq!(funcs["IdentityServiceEnabled"](&[]).unwrap(), Value::Bool(true));
        assert_eq!(funcs["IdentityServiceClientID"](&[]).unwrap(), Value::from("kots"));
        assert_eq!(funcs["IdentityServiceRestrictedGroups"](&[]).unwrap().to_string(), "[ops]");
        assert_eq!(
            funcs["IdentityServiceRoles"](&[]).unwrap().to_string(),
            "map[admins:[cluster-admin]]"
        );
        assert_eq!(
            IdentityCtx::default().func_map()["IdentityServiceEnabled"](&[]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_kurl_accessors() {
        let mut values = KurlValues::new();
        values.insert("Docker.Version".into(), json!("20.10"));
        values.insert("Kubernetes.Enabled".into(), json!(true));
        values.insert("Weave.MTU".into(), json!(1450));
        let ctx = KurlCtx::new(Some(values));
        assert!(ctx.is_present());
        let funcs = ctx.func_map();
        assert_eq!(funcs["KurlBool"](&["Kubernetes.Enabled".into()]).unwrap(), Value::Bool(true));
        assert_eq!(funcs["KurlInt"](&["Weave.MTU".into()]).unwrap(), Value::Int(1450));
        assert_eq!(funcs["KurlString"](&["Docker.Version".into()]).unwrap(), Value::from("20.10"));
        assert_eq!(funcs["KurlString"](&["Weave.MTU".into()]).unwrap(), Value::from(""));
        assert_eq!(funcs["KurlOption"](&["Weave.MTU".into()]).unwrap(), Value::from("1450"));
        assert_eq!(funcs["KurlAll"](&[]).unwrap().to_string().matches(':').count(), 3);

        let empty = KurlCtx::default();
        assert!(!empty.is_present());
        assert_eq!(empty.func_map()["KurlInt"](&["x".into()]).unwrap(), Value::Int(0));
    }
}
