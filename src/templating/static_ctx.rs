//! Generic helpers available to every template.
//!
//! String manipulation, encoding, arithmetic, random generation and TLS
//! material. TLS pairs come from the provider's [`TlsCache`]; clones of a
//! `StaticCtx` share that cache.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::format::{Item, StrftimeItems};
use chrono::{SecondsFormat, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use rand::seq::IndexedRandom;
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};

use super::Ctx;
use super::args::{check_arity, int_arg, optional_string_arg, string_arg, string_list_arg};
use super::cache::{CertRequest, TlsCache};
use crate::constants::{DEFAULT_NAMESPACE, DEFAULT_RANDOM_CHARSET, POD_NAMESPACE_ENV};
use crate::templating::engine::{FuncMap, TemplateFn, Value, func};
use crate::templating::error::FuncError;

/// The static provider.
#[derive(Debug, Clone, Default)]
pub struct StaticCtx {
    tls: Arc<TlsCache>,
    namespace: Option<String>,
    is_kurl: bool,
}

impl StaticCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share an existing TLS cache instead of the provider's own.
    pub fn with_tls_cache(mut self, cache: Arc<TlsCache>) -> Self {
        self.tls = cache;
        self
    }

    /// Namespace returned by `Namespace`, taking precedence over the environment.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|n| !n.is_empty());
        self
    }

    pub fn with_kurl(mut self, is_kurl: bool) -> Self {
        self.is_kurl = is_kurl;
        self
    }

    pub fn tls_cache(&self) -> &Arc<TlsCache> {
        &self.tls
    }
}

impl Ctx for StaticCtx {
    fn func_map(&self) -> FuncMap {
        let mut funcs = FuncMap::new();
        let mut add = |name: &str, f: TemplateFn| {
            funcs.insert(name.to_string(), f);
        };

        add("Now", func(|_| Ok(Value::from(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)))));
        add("NowFmt", func(now_fmt));
        add("ToLower", func(|args| unary_string("ToLower", args, |s| s.to_lowercase())));
        add("ToUpper", func(|args| unary_string("ToUpper", args, |s| s.to_uppercase())));
        add("TrimSpace", func(|args| unary_string("TrimSpace", args, |s| s.trim().to_string())));
        add("Trim", func(trim));
        add("UrlEncode", func(|args| unary_string("UrlEncode", args, |s| query_escape(&s))));
        add("Base64Encode", func(|args| unary_string("Base64Encode", args, |s| STANDARD.encode(s))));
        add("Base64Decode", func(base64_decode));
        add("Split", func(split));
        add("RandomBytes", func(random_bytes));
        add("RandomString", func(random_string));
        add("Add", func(|args| arithmetic("Add", args, Op::Add)));
        add("Sub", func(|args| arithmetic("Sub", args, Op::Sub)));
        add("Mult", func(|args| arithmetic("Mult", args, Op::Mult)));
        add("Div", func(|args| arithmetic("Div", args, Op::Div)));
        add("ParseBool", func(|args| {
            check_arity("ParseBool", args, 1, 1)?;
            let text = string_arg("ParseBool", args, 0)?;
            parse_bool(&text)
                .map(Value::Bool)
                .ok_or_else(|| FuncError::new(format!("ParseBool: invalid syntax {text:?}")))
        }));
        add("ParseInt", func(parse_int));
        add("ParseUint", func(parse_uint));
        add("ParseFloat", func(|args| {
            check_arity("ParseFloat", args, 1, 1)?;
            let text = string_arg("ParseFloat", args, 0)?;
            text.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| FuncError::new(format!("ParseFloat: {text:?}: {e}")))
        }));
        add("HumanSize", func(|args| {
            check_arity("HumanSize", args, 1, 1)?;
            let size = number_as_f64("HumanSize", &args[0])?;
            Ok(Value::from(human_size(size)))
        }));
        add("Sha256sum", func(|args| {
            unary_string("Sha256sum", args, |s| hex::encode(Sha256::digest(s.as_bytes())))
        }));
        add("YamlEscape", func(yaml_escape));

        let namespace = self.namespace.clone();
        add("Namespace", func(move |_| {
            let ns = namespace
                .clone()
                .or_else(|| std::env::var(POD_NAMESPACE_ENV).ok().filter(|n| !n.is_empty()))
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
            Ok(Value::from(ns))
        }));
        let is_kurl = self.is_kurl;
        add("IsKurl", func(move |_| Ok(Value::Bool(is_kurl))));

        let tls = Arc::clone(&self.tls);
        add("TLSCert", func(move |args| {
            check_arity("TLSCert", args, 1, 5)?;
            let name = string_arg("TLSCert", args, 0)?;
            Ok(Value::from(tls.cert(&name, &cert_request("TLSCert", args, 1)?)?.cert))
        }));
        let tls = Arc::clone(&self.tls);
        add("TLSKey", func(move |args| {
            check_arity("TLSKey", args, 1, 5)?;
            let name = string_arg("TLSKey", args, 0)?;
            Ok(Value::from(tls.cert(&name, &cert_request("TLSKey", args, 1)?)?.key))
        }));
        let tls = Arc::clone(&self.tls);
        add("TLSCACert", func(move |args| {
            check_arity("TLSCACert", args, 1, 3)?;
            let name = string_arg("TLSCACert", args, 0)?;
            let cn = string_arg("TLSCACert", args, 1)?;
            let days = int_arg("TLSCACert", args, 2)?;
            Ok(Value::from(tls.ca(&name, &cn, days)?.cert))
        }));
        let tls = Arc::clone(&self.tls);
        add("TLSCertFromCA", func(move |args| {
            check_arity("TLSCertFromCA", args, 2, 6)?;
            let ca = string_arg("TLSCertFromCA", args, 0)?;
            let name = string_arg("TLSCertFromCA", args, 1)?;
            let request = cert_request("TLSCertFromCA", args, 2)?;
            Ok(Value::from(tls.cert_from_ca(&ca, &name, &request)?.cert))
        }));
        let tls = Arc::clone(&self.tls);
        add("TLSKeyFromCA", func(move |args| {
            check_arity("TLSKeyFromCA", args, 2, 6)?;
            let ca = string_arg("TLSKeyFromCA", args, 0)?;
            let name = string_arg("TLSKeyFromCA", args, 1)?;
            let request = cert_request("TLSKeyFromCA", args, 2)?;
            Ok(Value::from(tls.cert_from_ca(&ca, &name, &request)?.key))
        }));

        funcs
    }
}

/// `cn, ips, altNames, daysValid` starting at `offset`.
fn cert_request(function: &str, args: &[Value], offset: usize) -> Result<CertRequest, FuncError> {
    Ok(CertRequest {
        cn: string_arg(function, args, offset)?,
        ips: string_list_arg(args, offset + 1),
        alt_names: string_list_arg(args, offset + 2),
        days_valid: int_arg(function, args, offset + 3)?,
    })
}

fn unary_string(
    function: &str,
    args: &[Value],
    f: impl Fn(String) -> String,
) -> Result<Value, FuncError> {
    check_arity(function, args, 1, 1)?;
    Ok(Value::from(f(string_arg(function, args, 0)?)))
}

fn now_fmt(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("NowFmt", args, 1, 1)?;
    let layout = string_arg("NowFmt", args, 0)?;
    if StrftimeItems::new(&layout).any(|item| matches!(item, Item::Error)) {
        return Err(FuncError::new(format!("NowFmt: invalid format {layout:?}")));
    }
    Ok(Value::from(Utc::now().format(&layout).to_string()))
}

fn trim(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("Trim", args, 1, 2)?;
    let s = string_arg("Trim", args, 0)?;
    let trimmed = match optional_string_arg(args, 1) {
        Some(cutset) => s.trim_matches(|c| cutset.contains(c)).to_string(),
        None => s.trim().to_string(),
    };
    Ok(Value::from(trimmed))
}

fn base64_decode(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("Base64Decode", args, 1, 1)?;
    let encoded = string_arg("Base64Decode", args, 0)?;
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| FuncError::new(format!("Base64Decode: {e}")))?;
    Ok(Value::from(String::from_utf8_lossy(&bytes).into_owned()))
}

fn split(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("Split", args, 2, 2)?;
    let s = string_arg("Split", args, 0)?;
    let sep = string_arg("Split", args, 1)?;
    let parts: Vec<Value> = if sep.is_empty() {
        s.chars().map(|c| Value::from(c.to_string())).collect()
    } else {
        s.split(sep.as_str()).map(Value::from).collect()
    };
    Ok(Value::List(parts))
}

fn random_bytes(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("RandomBytes", args, 1, 1)?;
    let len = usize::try_from(int_arg("RandomBytes", args, 0)?)
        .map_err(|_| FuncError::new("RandomBytes: length must not be negative"))?;
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    Ok(Value::from(STANDARD.encode(bytes)))
}

fn random_string(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("RandomString", args, 1, 2)?;
    let len = usize::try_from(int_arg("RandomString", args, 0)?)
        .map_err(|_| FuncError::new("RandomString: length must not be negative"))?;
    let pattern =
        optional_string_arg(args, 1).unwrap_or_else(|| DEFAULT_RANDOM_CHARSET.to_string());
    let alphabet = charset(&pattern)?;
    let mut rng = rand::rng();
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        if let Some(c) = alphabet.choose(&mut rng) {
            out.push(*c);
        }
    }
    Ok(Value::from(out))
}

/// Printable ASCII characters matched by a character-class regex.
fn charset(pattern: &str) -> Result<Vec<char>, FuncError> {
    let re = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| FuncError::new(format!("RandomString: invalid charset {pattern:?}: {e}")))?;
    let alphabet: Vec<char> = (0x20u8..0x7f)
        .map(char::from)
        .filter(|c| re.is_match(c.encode_utf8(&mut [0; 4])))
        .collect();
    if alphabet.is_empty() {
        return Err(FuncError::new(format!("RandomString: charset {pattern:?} matches nothing")));
    }
    Ok(alphabet)
}

/// Everything but the unreserved characters is escaped.
const QUERY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Query escaping: unreserved characters pass through, space becomes `+`.
fn query_escape(s: &str) -> String {
    // A literal `%` is escaped to `%25`, so every `%20` left is a space.
    utf8_percent_encode(s, QUERY_ESCAPE).to_string().replace("%20", "+")
}

fn yaml_escape(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("YamlEscape", args, 1, 1)?;
    let s = string_arg("YamlEscape", args, 0)?;
    let escaped =
        serde_yaml::to_string(&s).map_err(|e| FuncError::new(format!("YamlEscape: {e}")))?;
    Ok(Value::from(escaped.trim_end_matches('\n').to_string()))
}

/// Boolean spellings accepted by `ParseBool` and the typed render wrappers.
pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn radix(function: &str, args: &[Value]) -> Result<u32, FuncError> {
    match int_arg(function, args, 1)? {
        0 => Ok(10),
        base @ 2..=36 => Ok(base as u32),
        base => Err(FuncError::new(format!("{function}: invalid base {base}"))),
    }
}

fn parse_int(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("ParseInt", args, 1, 2)?;
    let text = string_arg("ParseInt", args, 0)?;
    i64::from_str_radix(text.trim(), radix("ParseInt", args)?)
        .map(Value::Int)
        .map_err(|e| FuncError::new(format!("ParseInt: {text:?}: {e}")))
}

fn parse_uint(args: &[Value]) -> Result<Value, FuncError> {
    check_arity("ParseUint", args, 1, 2)?;
    let text = string_arg("ParseUint", args, 0)?;
    u64::from_str_radix(text.trim(), radix("ParseUint", args)?)
        .map(Value::Uint)
        .map_err(|e| FuncError::new(format!("ParseUint: {text:?}: {e}")))
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Add,
    Sub,
    Mult,
    Div,
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Uint(u64),
    Float(f64),
}

fn number(function: &str, value: &Value) -> Result<Number, FuncError> {
    match value {
        Value::Int(i) => Ok(Number::Int(*i)),
        Value::Uint(u) => Ok(Number::Uint(*u)),
        Value::Float(f) => Ok(Number::Float(*f)),
        other => {
            Err(FuncError::new(format!("{function}: unsupported operand type {}", other.type_name())))
        }
    }
}

fn number_as_f64(function: &str, value: &Value) -> Result<f64, FuncError> {
    match value {
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| FuncError::new(format!("{function}: {s:?} is not a number"))),
        other => Ok(match number(function, other)? {
            Number::Int(i) => i as f64,
            Number::Uint(u) => u as f64,
            Number::Float(f) => f,
        }),
    }
}

/// Float if either side is a float, else signed if either side is signed,
/// else unsigned.
fn arithmetic(function: &str, args: &[Value], op: Op) -> Result<Value, FuncError> {
    check_arity(function, args, 2, 2)?;
    let lhs = number(function, &args[0])?;
    let rhs = number(function, &args[1])?;
    let overflow = || FuncError::new(format!("{function}: integer overflow"));

    match (lhs, rhs) {
        (Number::Float(_), _) | (_, Number::Float(_)) => {
            let a = number_as_f64(function, &args[0])?;
            let b = number_as_f64(function, &args[1])?;
            Ok(Value::Float(match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mult => a * b,
                Op::Div => a / b,
            }))
        }
        (Number::Int(_), _) | (_, Number::Int(_)) => {
            let a = as_i64(lhs).ok_or_else(overflow)?;
            let b = as_i64(rhs).ok_or_else(overflow)?;
            if matches!(op, Op::Div) && b == 0 {
                return Err(FuncError::new(format!("{function}: integer divide by zero")));
            }
            let result = match op {
                Op::Add => a.checked_add(b),
                Op::Sub => a.checked_sub(b),
                Op::Mult => a.checked_mul(b),
                Op::Div => a.checked_div(b),
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
        (Number::Uint(a), Number::Uint(b)) => {
            if matches!(op, Op::Div) && b == 0 {
                return Err(FuncError::new(format!("{function}: integer divide by zero")));
            }
            let result = match op {
                Op::Add => a.checked_add(b),
                Op::Sub => a.checked_sub(b),
                Op::Mult => a.checked_mul(b),
                Op::Div => a.checked_div(b),
            };
            result.map(Value::Uint).ok_or_else(overflow)
        }
    }
}

fn as_i64(n: Number) -> Option<i64> {
    match n {
        Number::Int(i) => Some(i),
        Number::Uint(u) => i64::try_from(u).ok(),
        Number::Float(f) => Some(f as i64),
    }
}

/// Decimal byte size with four significant digits, e.g. `1.235MB`.
fn human_size(size: f64) -> String {
    const UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
    let mut value = size;
    let mut unit = 0;
    while value.abs() >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }
    format!("{}{}", significant(value, 4), UNITS[unit])
}

/// Format with `digits` significant digits and no trailing zeros.
fn significant(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{value}");
    }
    let magnitude = value.abs().log10().floor() as i32;
    let decimals = (digits as i32 - 1 - magnitude).max(0) as usize;
    let formatted = format!("{value:.decimals$}");
    if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, FuncError> {
        let funcs = StaticCtx::new().func_map();
        funcs[name](args)
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(call("ToUpper", &["hello, world".into()]).unwrap(), Value::from("HELLO, WORLD"));
        assert_eq!(call("TrimSpace", &["  x \n".into()]).unwrap(), Value::from("x"));
        assert_eq!(call("Trim", &["--x--".into(), "-".into()]).unwrap(), Value::from("x"));
        assert_eq!(call("UrlEncode", &["a b&c=d/é".into()]).unwrap(), Value::from("a+b%26c%3Dd%2F%C3%A9"));
        assert_eq!(call("UrlEncode", &["a~b*c-_.".into()]).unwrap(), Value::from("a~b%2Ac-_."));
        assert_eq!(call("UrlEncode", &["100%20 off".into()]).unwrap(), Value::from("100%2520+off"));
        assert_eq!(
            call("Split", &["a,b".into(), ",".into()]).unwrap(),
            Value::List(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_base64() {
        let encoded = call("Base64Encode", &["secret".into()]).unwrap();
        assert_eq!(encoded, Value::from("c2VjcmV0"));
        assert_eq!(call("Base64Decode", &[encoded]).unwrap(), Value::from("secret"));
        assert!(call("Base64Decode", &["!!".into()]).is_err());
    }

    #[test]
    fn test_arithmetic_promotion() {
        assert_eq!(call("Add", &[Value::Int(1), Value::Uint(2)]).unwrap(), Value::Int(3));
        assert_eq!(call("Add", &[Value::Uint(1), Value::Uint(2)]).unwrap(), Value::Uint(3));
        assert_eq!(call("Mult", &[Value::Int(2), Value::Float(1.5)]).unwrap(), Value::Float(3.0));
        assert_eq!(call("Sub", &[Value::Int(1), Value::Int(3)]).unwrap(), Value::Int(-2));
        assert_eq!(call("Div", &[Value::Int(7), Value::Int(2)]).unwrap(), Value::Int(3));
        assert!(call("Div", &[Value::Int(1), Value::Int(0)]).is_err());
        assert!(call("Add", &["1".into(), Value::Int(1)]).is_err());
    }

    #[test]
    fn test_parsers() {
        assert_eq!(call("ParseBool", &["T".into()]).unwrap(), Value::Bool(true));
        assert!(call("ParseBool", &["yes".into()]).is_err());
        assert_eq!(call("ParseInt", &["-12".into()]).unwrap(), Value::Int(-12));
        assert_eq!(call("ParseInt", &["ff".into(), Value::Int(16)]).unwrap(), Value::Int(255));
        assert_eq!(call("ParseUint", &["12".into()]).unwrap(), Value::Uint(12));
        assert_eq!(call("ParseFloat", &["1.5".into()]).unwrap(), Value::Float(1.5));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(999.0), "999B");
        assert_eq!(human_size(1000.0), "1kB");
        assert_eq!(human_size(1_234_567.0), "1.235MB");
        assert_eq!(human_size(0.0), "0B");
    }

    #[test]
    fn test_random_string_respects_charset() {
        let Value::String(s) = call("RandomString", &[Value::Int(32), "[a-c]".into()]).unwrap()
        else {
            panic!("expected string");
        };
        assert_eq!(s.len(), 32);
        assert!(s.chars().all(|c| ('a'..='c').contains(&c)));

        let Value::String(default) = call("RandomString", &[Value::Int(16)]).unwrap() else {
            panic!("expected string");
        };
        assert!(default.chars().all(|c| c == '_' || c.is_ascii_alphanumeric()));
        assert!(call("RandomString", &[Value::Int(4), "[\u{e9}]".into()]).is_err());
    }

    #[test]
    fn test_sha256_and_yaml_escape() {
        assert_eq!(
            call("Sha256sum", &["abc".into()]).unwrap(),
            Value::from("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(call("YamlEscape", &["plain".into()]).unwrap(), Value::from("plain"));
        let Value::String(quoted) = call("YamlEscape", &["a: b".into()]).unwrap() else {
            panic!("expected string");
        };
        assert_ne!(quoted, "a: b");
    }

    #[test]
    fn test_namespace_override() {
        let funcs = StaticCtx::new().with_namespace(Some("prod".into())).func_map();
        assert_eq!(funcs["Namespace"](&[]).unwrap(), Value::from("prod"));
    }

    #[test]
    fn test_tls_cert_and_key_share_cache() {
        let ctx = StaticCtx::new();
        let funcs = ctx.func_map();
        let cert = funcs["TLSCert"](&["certA".into(), "example.com".into()]).unwrap();
        let key = funcs["TLSKey"](&["certA".into()]).unwrap();
        assert!(cert.to_string().contains("BEGIN CERTIFICATE"));
        assert!(key.to_string().contains("PRIVATE KEY"));

        let again = ctx.clone().func_map()["TLSCert"](&["certA".into()]).unwrap();
        assert_eq!(cert, again);
        assert_eq!(ctx.tls_cache().len(), 1);
    }
}
