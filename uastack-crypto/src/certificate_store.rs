// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! A directory based PKI certificate store.
//!
//! The layout on disk:
//!
//! ```text
//! pki/
//!   own/cert.der          - the application instance certificate
//!   private/private.pem   - the private key for the application certificate
//!   trusted/              - certificates trusted by the operator, named by thumbprint
//!   rejected/             - certificates that failed validation, for operator review
//! ```
//!
//! The store is read-only while channels are running; rejected certificates are the only
//! thing written during operation, so an operator can move them to `trusted/` and retry.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use uastack_types::{DateTime, Error, StatusCode};

use super::{pkey::PrivateKey, security_policy::SecurityPolicy, x509::X509};

/// Name of the directory holding the application's own certificate.
const OWN_CERTIFICATE_PATH: &str = "own";
/// Name of the application certificate file.
const OWN_CERTIFICATE_NAME: &str = "cert.der";
/// Name of the directory holding the private key.
const PRIVATE_KEY_PATH: &str = "private";
/// Name of the private key file.
const PRIVATE_KEY_NAME: &str = "private.pem";
/// Name of the directory holding trusted certificates.
const TRUSTED_CERTS_DIR: &str = "trusted";
/// Name of the directory certificates are rejected into.
const REJECTED_CERTS_DIR: &str = "rejected";

/// The certificate store loads the application's certificate and private key from disk
/// and decides whether remote certificates are trusted.
pub struct CertificateStore {
    pki_path: PathBuf,
    /// Trust any server certificate without consulting the trusted directory. Useful for
    /// test setups, unfit for production.
    trust_unknown_certs: bool,
    /// Skip time validity checks on remote certificates.
    check_time: bool,
}

impl CertificateStore {
    /// Create a certificate store rooted at `pki_path`, creating the directory
    /// structure if it is missing.
    pub fn new(pki_path: &Path) -> CertificateStore {
        let store = CertificateStore {
            pki_path: pki_path.to_path_buf(),
            trust_unknown_certs: false,
            check_time: true,
        };
        if let Err(e) = store.ensure_pki_path() {
            error!("Cannot create PKI directory structure: {e}");
        }
        store
    }

    /// Set whether unknown certificates are trusted without a trust list entry.
    pub fn set_trust_unknown_certs(&mut self, trust: bool) {
        self.trust_unknown_certs = trust;
    }

    /// Set whether certificate validity periods are enforced.
    pub fn set_check_time(&mut self, check_time: bool) {
        self.check_time = check_time;
    }

    /// The root of the PKI directory.
    pub fn pki_path(&self) -> &Path {
        &self.pki_path
    }

    /// Read the application instance certificate.
    pub fn read_own_cert(&self) -> Result<X509, Error> {
        Self::read_cert(
            &self
                .pki_path
                .join(OWN_CERTIFICATE_PATH)
                .join(OWN_CERTIFICATE_NAME),
        )
    }

    /// Read the application's private key.
    pub fn read_own_pkey(&self) -> Result<PrivateKey, Error> {
        Self::read_pkey(&self.pki_path.join(PRIVATE_KEY_PATH).join(PRIVATE_KEY_NAME))
    }

    /// Read a DER certificate from an arbitrary path.
    pub fn read_cert(path: &Path) -> Result<X509, Error> {
        let der = fs::read(path).map_err(|e| {
            Error::new(
                StatusCode::BadCertificateInvalid,
                format!("Cannot read certificate {}: {e}", path.display()),
            )
        })?;
        X509::from_der(&der)
    }

    /// Read a PEM private key from an arbitrary path.
    pub fn read_pkey(path: &Path) -> Result<PrivateKey, Error> {
        PrivateKey::read_pem_file(path)
    }

    /// Validate a remote application instance certificate against the trust list, its
    /// validity period and, when supplied, the expected hostname and application URI.
    /// An untrusted certificate is written to the rejected directory so the operator
    /// can inspect and trust it.
    pub fn validate_or_reject_application_instance_cert(
        &self,
        cert: &X509,
        security_policy: SecurityPolicy,
        hostname: Option<&str>,
        application_uri: Option<&str>,
    ) -> Result<(), StatusCode> {
        let result = self.validate_application_instance_cert(
            cert,
            security_policy,
            hostname,
            application_uri,
        );
        if result.is_err() {
            self.store_rejected_cert(cert);
        }
        result
    }

    fn validate_application_instance_cert(
        &self,
        cert: &X509,
        _security_policy: SecurityPolicy,
        hostname: Option<&str>,
        application_uri: Option<&str>,
    ) -> Result<(), StatusCode> {
        if self.check_time {
            let status = cert.is_time_valid(&DateTime::now());
            if status.is_bad() {
                warn!(
                    "Certificate {} is outside its validity period",
                    cert.thumbprint().as_hex_string()
                );
                return Err(status);
            }
        }
        if let Some(hostname) = hostname {
            let status = cert.is_hostname_valid(hostname);
            if status.is_bad() {
                warn!("Certificate does not match hostname {}", hostname);
                return Err(status);
            }
        }
        if let Some(application_uri) = application_uri {
            let status = cert.is_application_uri_valid(application_uri);
            if status.is_bad() {
                warn!(
                    "Certificate does not match application uri {}",
                    application_uri
                );
                return Err(status);
            }
        }
        if self.trust_unknown_certs {
            return Ok(());
        }
        if self.is_trusted(cert) {
            Ok(())
        } else {
            warn!(
                "Certificate {} is not in the trusted directory and has been rejected",
                cert.thumbprint().as_hex_string()
            );
            Err(StatusCode::BadCertificateUntrusted)
        }
    }

    fn is_trusted(&self, cert: &X509) -> bool {
        let trusted = self
            .pki_path
            .join(TRUSTED_CERTS_DIR)
            .join(Self::cert_file_name(cert));
        if !trusted.exists() {
            return false;
        }
        // The file's content must also match, a name collision is not trust.
        match fs::read(&trusted) {
            Ok(der) => der == cert.der(),
            Err(e) => {
                error!("Cannot read trusted certificate {}: {e}", trusted.display());
                false
            }
        }
    }

    fn store_rejected_cert(&self, cert: &X509) {
        let rejected = self
            .pki_path
            .join(REJECTED_CERTS_DIR)
            .join(Self::cert_file_name(cert));
        if let Err(e) = fs::write(&rejected, cert.der()) {
            error!(
                "Cannot write rejected certificate {}: {e}",
                rejected.display()
            );
        } else {
            info!(
                "Certificate was rejected and stored in {}. Move it to the trusted directory to trust it.",
                rejected.display()
            );
        }
    }

    fn cert_file_name(cert: &X509) -> String {
        format!("{}.der", cert.thumbprint().as_hex_string())
    }

    fn ensure_pki_path(&self) -> std::io::Result<()> {
        for dir in [
            OWN_CERTIFICATE_PATH,
            PRIVATE_KEY_PATH,
            TRUSTED_CERTS_DIR,
            REJECTED_CERTS_DIR,
        ] {
            fs::create_dir_all(self.pki_path.join(dir))?;
        }
        Ok(())
    }
}
