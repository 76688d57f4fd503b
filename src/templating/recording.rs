//! Dependency-recording stand-ins for the config and TLS functions.
//!
//! Rendering an item's templates with these functions registered reports
//! which other items it reads and which named certificates it produces or
//! consumes, without computing anything. Every recorder returns its first
//! argument so nested pipelines still evaluate.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use super::Ctx;
use super::args::string_arg;
use crate::templating::engine::{FuncMap, TemplateFn, Value, func};

/// What one render recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recording {
    /// Config items referenced through the `ConfigOption` family.
    pub items: BTreeSet<String>,
    /// Certificates this item produces.
    pub certs_produced: BTreeSet<String>,
    /// Certificates whose key (or CA key) this item consumes.
    pub keys_consumed: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Item,
    CertProduced,
    KeyConsumed,
}

/// The recording provider. Clones share one [`Recording`].
#[derive(Debug, Clone, Default)]
pub struct RecordingCtx {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take everything recorded so far, leaving the recorder empty.
    pub fn take(&self) -> Recording {
        std::mem::take(&mut *self.recording.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn record(&self, kind: Kind, name: String) {
        if name.is_empty() {
            return;
        }
        let mut recording = self.recording.lock().unwrap_or_else(PoisonError::into_inner);
        let set = match kind {
            Kind::Item => &mut recording.items,
            Kind::CertProduced => &mut recording.certs_produced,
            Kind::KeyConsumed => &mut recording.keys_consumed,
        };
        set.insert(name);
    }

    /// A recorder noting `(kind, argument index)` pairs.
    fn recorder(&self, function: &'static str, notes: &'static [(Kind, usize)]) -> TemplateFn {
        let ctx = self.clone();
        func(move |args| {
            for (kind, index) in notes {
                ctx.record(*kind, string_arg(function, args, *index)?);
            }
            Ok(args.first().cloned().unwrap_or_else(|| Value::from("")))
        })
    }
}

impl Ctx for RecordingCtx {
    fn func_map(&self) -> FuncMap {
        const ITEM: &[(Kind, usize)] = &[(Kind::Item, 0)];

        let mut funcs = FuncMap::new();
        for name in [
            "ConfigOption",
            "ConfigOptionIndex",
            "ConfigOptionData",
            "ConfigOptionFilename",
            "ConfigOptionEquals",
            "ConfigOptionNotEquals",
        ] {
            funcs.insert(name.to_string(), self.recorder(name, ITEM));
        }

        funcs.insert("TLSCert".into(), self.recorder("TLSCert", &[(Kind::CertProduced, 0)]));
        funcs.insert("TLSCACert".into(), self.recorder("TLSCACert", &[(Kind::CertProduced, 0)]));
        funcs.insert("TLSKey".into(), self.recorder("TLSKey", &[(Kind::KeyConsumed, 0)]));
        funcs.insert(
            "TLSCertFromCA".into(),
            self.recorder("TLSCertFromCA", &[(Kind::KeyConsumed, 0), (Kind::CertProduced, 1)]),
        );
        funcs.insert(
            "TLSKeyFromCA".into(),
            self.recorder("TLSKeyFromCA", &[(Kind::KeyConsumed, 1)]),
        );
        funcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_returns_placeholder() {
        let ctx = RecordingCtx::new();
        let funcs = ctx.func_map();
        assert_eq!(funcs["ConfigOption"](&["a".into()]).unwrap(), Value::from("a"));
        funcs["ConfigOptionEquals"](&["b".into(), "x".into()]).unwrap();
        funcs["TLSCert"](&["web".into(), "cn".into()]).unwrap();
        funcs["TLSKey"](&["db".into()]).unwrap();
        funcs["TLSCertFromCA"](&["root".into(), "svc".into()]).unwrap();

        let recording = ctx.take();
        assert_eq!(recording.items, BTreeSet::from(["a".to_string(), "b".to_string()]));
        assert_eq!(
            recording.certs_produced,
            BTreeSet::from(["web".to_string(), "svc".to_string()])
        );
        assert_eq!(
            recording.keys_consumed,
            BTreeSet::from(["db".to_string(), "root".to_string()])
        );
        assert_eq!(ctx.take(), Recording::default());
    }

    #[test]
    fn test_empty_names_are_ignored() {
        let ctx = RecordingCtx::new();
        ctx.func_map()["ConfigOption"](&[]).unwrap();
        assert!(ctx.take().items.is_empty());
    }
}
