//! Two-pass rendering through the public builder API.

use kots_render::models::{ItemValue, ItemValues};
use kots_render::templating::{Builder, ConfigCtx, Ctx, StaticCtx, Value};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn builder() -> Builder {
    let mut values = ItemValues::new();
    values.insert("hostname".into(), ItemValue::new("example.com", ""));
    values.insert("replicas".into(), ItemValue::new("", "3"));
    values.insert("late".into(), ItemValue::new(r#"repl{{ ToUpper "late" }}"#, ""));
    Builder::new().with_ctx(StaticCtx::new()).with_ctx(ConfigCtx::new(values))
}

#[test]
fn test_manifest_with_both_passes() {
    let manifest = r#"apiVersion: apps/v1
kind: Deployment
spec:
  replicas: repl{{ ConfigOption "replicas" | ParseInt }}
  template:
    spec:
      containers:
        - name: web
          env:
            - name: HOST
              value: '{{repl ConfigOption "hostname" }}'
            - name: HELM
              value: '{{ .Values.untouched }}'
"#;
    let expected = r#"apiVersion: apps/v1
kind: Deployment
spec:
  replicas: 3
  template:
    spec:
      containers:
        - name: web
          env:
            - name: HOST
              value: 'example.com'
            - name: HELM
              value: '{{ .Values.untouched }}'
"#;
    assert_eq!(builder().render_template("deployment.yaml", manifest).unwrap(), expected);
}

#[test]
fn test_second_pass_sees_first_pass_output() {
    let rendered =
        builder().render_template("t", r#"{{repl ConfigOption "late" }}"#).unwrap();
    assert_eq!(rendered, "LATE");
}

#[test]
fn test_conditional_blocks() {
    let text = r#"{{repl if ConfigOptionEquals "hostname" "example.com" }}tls: true{{repl else }}tls: false{{repl end }}"#;
    assert_eq!(builder().render_template("t", text).unwrap(), "tls: true");
}

#[test]
fn test_custom_function_overrides_provider() {
    let mut builder = builder();
    builder.add_func(
        "ConfigOption",
        kots_render::templating::func(|_| Ok(Value::from("overridden"))),
    );
    assert_eq!(
        builder.render_template("t", r#"{{repl ConfigOption "hostname" }}"#).unwrap(),
        "overridden"
    );
}

#[test]
fn test_unknown_function_fails_whole_render() {
    let err = builder().render_template("t", "before {{repl Nope }} after").unwrap_err();
    assert!(err.to_string().contains("Nope"), "{err}");
}

proptest! {
    #[test]
    fn text_without_delimiters_is_unchanged(text in "[a-qs-zA-Z0-9 {}:\n.,-]*") {
        prop_assert_eq!(builder().render_template("t", &text).unwrap(), text);
    }

    #[test]
    fn base64_round_trip(s in ".*") {
        let funcs = StaticCtx::new().func_map();
        let encoded = funcs["Base64Encode"](&[Value::from(s.clone())]).unwrap();
        let decoded = funcs["Base64Decode"](&[encoded]).unwrap();
        prop_assert_eq!(decoded, Value::from(s));
    }
}
