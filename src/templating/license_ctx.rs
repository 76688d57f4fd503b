//! License field accessors.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::json;

use super::Ctx;
use super::args::{check_arity, string_arg};
use crate::constants::LICENSE_REGISTRY_HOSTS;
use crate::models::License;
use crate::templating::engine::{FuncMap, Value, func};

/// The license provider. Without a license every lookup renders `""`.
#[derive(Debug, Clone, Default)]
pub struct LicenseCtx {
    license: Option<Arc<License>>,
}

impl LicenseCtx {
    pub fn new(license: Option<License>) -> Self {
        Self {
            license: license.map(Arc::new),
        }
    }
}

/// Built-in fields first, then entitlements.
fn field_value(license: &License, name: &str) -> String {
    match name {
        "appSlug" => license.app_slug.clone(),
        "channelName" => license.channel_name.clone(),
        "customerName" => license.customer_name.clone(),
        "licenseID" | "licenseId" => license.license_id.clone(),
        "licenseType" => license.license_type.clone(),
        "licenseSequence" => license.license_sequence.to_string(),
        "isAirgapSupported" => license.is_airgap_supported.to_string(),
        "isSnapshotSupported" => license.is_snapshot_supported.to_string(),
        "signature" => license.signature.clone(),
        _ => license
            .entitlements
            .get(name)
            .map(|entitlement| Value::from(&entitlement.value).to_string())
            .unwrap_or_default(),
    }
}

fn docker_cfg(license: &License) -> String {
    let auth = STANDARD.encode(format!("{0}:{0}", license.license_id));
    let auths: serde_json::Map<String, serde_json::Value> = LICENSE_REGISTRY_HOSTS
        .iter()
        .map(|host| (host.to_string(), json!({ "auth": auth })))
        .collect();
    STANDARD.encode(json!({ "auths": auths }).to_string())
}

impl Ctx for LicenseCtx {
    fn func_map(&self) -> FuncMap {
        let mut funcs = FuncMap::new();

        let license = self.license.clone();
        funcs.insert(
            "LicenseFieldValue".to_string(),
            func(move |args| {
                check_arity("LicenseFieldValue", args, 1, 1)?;
                let name = string_arg("LicenseFieldValue", args, 0)?;
                Ok(Value::from(
                    license.as_deref().map(|l| field_value(l, &name)).unwrap_or_default(),
                ))
            }),
        );

        let license = self.license.clone();
        funcs.insert(
            "LicenseDockerCfg".to_string(),
            func(move |_| Ok(Value::from(license.as_deref().map(docker_cfg).unwrap_or_default()))),
        );

        funcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntitlementField;

    fn license() -> License {
        let mut license = License {
            app_slug: "my-app".into(),
            license_id: "lic-1".into(),
            license_sequence: 4,
            is_snapshot_supported: true,
            ..Default::default()
        };
        license.entitlements.insert(
            "seats".into(),
            EntitlementField {
                title: "Seats".into(),
                value: json!(25),
                value_type: "Integer".into(),
            },
        );
        license
    }

    #[test]
    fn test_field_values() {
        let funcs = LicenseCtx::new(Some(license())).func_map();
        let field = |name: &str| funcs["LicenseFieldValue"](&[name.into()]).unwrap().to_string();
        assert_eq!(field("appSlug"), "my-app");
        assert_eq!(field("licenseId"), "lic-1");
        assert_eq!(field("licenseSequence"), "4");
        assert_eq!(field("isSnapshotSupported"), "true");
        assert_eq!(field("seats"), "25");
        assert_eq!(field("missing"), "");
    }

    #[test]
    fn test_docker_cfg() {
        let funcs = LicenseCtx::new(Some(license())).func_map();
        let encoded = funcs["LicenseDockerCfg"](&[]).unwrap().to_string();
        let decoded: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        let expected_auth = STANDARD.encode("lic-1:lic-1");
        assert_eq!(decoded["auths"]["registry.replicated.com"]["auth"], json!(expected_auth));
        assert_eq!(decoded["auths"]["proxy.replicated.com"]["auth"], json!(expected_auth));
    }

    #[test]
    fn test_missing_license_is_empty() {
        let funcs = LicenseCtx::default().func_map();
        assert_eq!(funcs["LicenseFieldValue"](&["appSlug".into()]).unwrap(), Value::from(""));
        assert_eq!(funcs["LicenseDockerCfg"](&[]).unwrap(), Value::from(""));
    }
}
