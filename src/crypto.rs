//! Key, certificate request and certificate helpers.

pub mod csr;
pub mod keys;

pub use csr::{CertificateMaterial, CsrGenerator};
pub use keys::{RsaKeyMaterial, ensure_key_matches_certificate, fingerprint, load_private_key};
