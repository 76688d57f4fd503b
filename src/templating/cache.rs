//! TLS material cache for the static template provider.
//!
//! Templates may ask for the same certificate from several config items
//! (`TLSCert "web"` in one item, `TLSKey "web"` in another). Each name is
//! generated once and every later call returns the cached pair, so the
//! certificate and key always match.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Datelike, Duration, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, IsCa, KeyPair, KeyUsagePurpose,
};
use tracing::debug;

use crate::constants::DEFAULT_CERT_DAYS_VALID;
use crate::templating::error::FuncError;

/// A PEM encoded certificate and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPair {
    pub cert: String,
    pub key: String,
}

/// Parameters for generating a leaf certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertRequest {
    /// Common name; the certificate name when empty.
    pub cn: String,
    pub ips: Vec<String>,
    pub alt_names: Vec<String>,
    /// Validity in days; the default when zero or negative.
    pub days_valid: i64,
}

struct CertificateAuthority {
    pair: TlsPair,
    cert: Certificate,
    key: KeyPair,
}

/// Generated certificates keyed by name.
///
/// Generation happens inside the map entry, so concurrent callers asking
/// for the same name observe a single pair.
#[derive(Default)]
pub struct TlsCache {
    certs: DashMap<String, TlsPair>,
    /// CA-signed pairs keyed by `(ca, cert)`.
    signed: DashMap<(String, String), TlsPair>,
    authorities: DashMap<String, Arc<CertificateAuthority>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl std::fmt::Debug for TlsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsCache")
            .field("certs", &self.certs.len())
            .field("signed", &self.signed.len())
            .field("authorities", &self.authorities.len())
            .finish()
    }
}

impl TlsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Self-signed pair for `name`, generated on first use.
    pub fn cert(&self, name: &str, request: &CertRequest) -> Result<TlsPair, FuncError> {
        match self.certs.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Generating self-signed certificate '{}'", name);
                let pair = generate_self_signed(name, request)?;
                entry.insert(pair.clone());
                Ok(pair)
            }
        }
    }

    /// Certificate authority `name`, generated on first use.
    pub fn ca(&self, name: &str, cn: &str, days_valid: i64) -> Result<TlsPair, FuncError> {
        Ok(self.authority(name, cn, days_valid)?.pair.clone())
    }

    /// Pair for `cert_name` signed by the authority `ca_name`.
    ///
    /// The authority is created with default settings if it does not exist yet.
    pub fn cert_from_ca(
        &self,
        ca_name: &str,
        cert_name: &str,
        request: &CertRequest,
    ) -> Result<TlsPair, FuncError> {
        match self.signed.entry((ca_name.to_string(), cert_name.to_string())) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(entry.get().clone())
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                let ca = self.authority(ca_name, "", 0)?;
                debug!("Generating certificate '{}' signed by '{}'", cert_name, ca_name);
                let key = KeyPair::generate().map_err(tls_error)?;
                let params = leaf_params(cert_name, request)?;
                let cert = params.signed_by(&key, &ca.cert, &ca.key).map_err(tls_error)?;
                let pair = TlsPair {
                    cert: cert.pem(),
                    key: key.serialize_pem(),
                };
                entry.insert(pair.clone());
                Ok(pair)
            }
        }
    }

    fn authority(
        &self,
        name: &str,
        cn: &str,
        days_valid: i64,
    ) -> Result<Arc<CertificateAuthority>, FuncError> {
        match self.authorities.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Arc::clone(entry.get()))
            }
            Entry::Vacant(entry) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Generating certificate authority '{}'", name);
                let key = KeyPair::generate().map_err(tls_error)?;
                let mut params = CertificateParams::default();
                params.distinguished_name.push(DnType::CommonName, non_empty(cn, name));
                params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
                params.key_usages = vec![
                    KeyUsagePurpose::KeyCertSign,
                    KeyUsagePurpose::CrlSign,
                    KeyUsagePurpose::DigitalSignature,
                ];
                set_validity(&mut params, days_valid);
                let cert = params.self_signed(&key).map_err(tls_error)?;
                let ca = Arc::new(CertificateAuthority {
                    pair: TlsPair {
                        cert: cert.pem(),
                        key: key.serialize_pem(),
                    },
                    cert,
                    key,
                });
                entry.insert(Arc::clone(&ca));
                Ok(ca)
            }
        }
    }

    /// Number of cached certificates, authorities included.
    pub fn len(&self) -> usize {
        self.certs.len() + self.signed.len() + self.authorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.certs.clear();
        self.signed.clear();
        self.authorities.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Cache statistics as `(hits, misses)`.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }
}

fn generate_self_signed(name: &str, request: &CertRequest) -> Result<TlsPair, FuncError> {
    let key = KeyPair::generate().map_err(tls_error)?;
    let cert = leaf_params(name, request)?.self_signed(&key).map_err(tls_error)?;
    Ok(TlsPair {
        cert: cert.pem(),
        key: key.serialize_pem(),
    })
}

fn leaf_params(name: &str, request: &CertRequest) -> Result<CertificateParams, FuncError> {
    // IP literals become IP SANs, everything else a DNS SAN.
    let sans: Vec<String> = request.ips.iter().chain(&request.alt_names).cloned().collect();
    let mut params = CertificateParams::new(sans).map_err(tls_error)?;
    params.distinguished_name.push(DnType::CommonName, non_empty(&request.cn, name));
    set_validity(&mut params, request.days_valid);
    Ok(params)
}

fn set_validity(params: &mut CertificateParams, days_valid: i64) {
    let days = if days_valid > 0 {
        days_valid
    } else {
        DEFAULT_CERT_DAYS_VALID
    };
    let now = Utc::now();
    let expiry = now + Duration::days(days);
    params.not_before = rcgen::date_time_ymd(now.year(), now.month() as u8, now.day() as u8);
    params.not_after =
        rcgen::date_time_ymd(expiry.year(), expiry.month() as u8, expiry.day() as u8);
}

fn non_empty<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

fn tls_error(err: rcgen::Error) -> FuncError {
    FuncError::new(format!("failed to generate TLS material: {err}"))
}
