// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! X.509 certificate wrapper. Certificates are carried as DER on the wire; this module
//! parses them far enough to extract the public key, validity period and subject
//! alternative names. Certificate creation is out of scope, the application instance
//! certificate is provisioned externally and read from the certificate store.

use std::fmt;

use const_oid::db::rfc5280::ID_CE_SUBJECT_ALT_NAME;
use x509_cert::{
    der::{Decode, Encode},
    ext::pkix::{name::GeneralName, SubjectAltName},
    Certificate,
};

use uastack_types::{ByteString, DateTime, Error, StatusCode};

use super::{
    pkey::PublicKey,
    thumbprint::Thumbprint,
};

/// An X.509 certificate, kept together with its raw DER form.
#[derive(Clone)]
pub struct X509 {
    der: Vec<u8>,
    cert: Box<Certificate>,
}

impl fmt::Debug for X509 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X509(subject = {}, thumbprint = {})",
            self.cert.tbs_certificate.subject,
            self.thumbprint().as_hex_string()
        )
    }
}

impl X509 {
    /// Parse a certificate from DER bytes.
    pub fn from_der(der: &[u8]) -> Result<X509, Error> {
        let cert = Certificate::from_der(der).map_err(|e| {
            Error::new(
                StatusCode::BadCertificateInvalid,
                format!("Cannot parse certificate: {e}"),
            )
        })?;
        Ok(X509 {
            der: der.to_vec(),
            cert: Box::new(cert),
        })
    }

    /// Parse a certificate from a byte string, as received on the wire.
    pub fn from_byte_string(data: &ByteString) -> Result<X509, Error> {
        if data.is_null() {
            Err(Error::new(
                StatusCode::BadCertificateInvalid,
                "Certificate byte string is null",
            ))
        } else {
            Self::from_der(data.as_ref())
        }
    }

    /// The certificate as a byte string, for use on the wire.
    pub fn as_byte_string(&self) -> ByteString {
        ByteString::from(&self.der)
    }

    /// The raw DER bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The SHA-1 thumbprint of the DER form.
    pub fn thumbprint(&self) -> Thumbprint {
        Thumbprint::new(&self.der)
    }

    /// The RSA public key of the certificate.
    pub fn public_key(&self) -> Result<PublicKey, Error> {
        let spki_der = self
            .cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| {
                Error::new(
                    StatusCode::BadCertificateInvalid,
                    format!("Cannot encode subject public key info: {e}"),
                )
            })?;
        PublicKey::from_spki_der(&spki_der)
    }

    /// Check that `now` falls within the certificate's validity period.
    pub fn is_time_valid(&self, now: &DateTime) -> StatusCode {
        let validity = &self.cert.tbs_certificate.validity;
        let not_before = validity.not_before.to_unix_duration().as_secs() as i64;
        let not_after = validity.not_after.to_unix_duration().as_secs() as i64;
        let now = now.as_chrono().timestamp();
        if now < not_before || now > not_after {
            StatusCode::BadCertificateTimeInvalid
        } else {
            StatusCode::Good
        }
    }

    fn subject_alt_names(&self) -> Vec<GeneralName> {
        let Some(extensions) = &self.cert.tbs_certificate.extensions else {
            return Vec::new();
        };
        for extension in extensions {
            if extension.extn_id == ID_CE_SUBJECT_ALT_NAME {
                if let Ok(san) = SubjectAltName::from_der(extension.extn_value.as_bytes()) {
                    return san.0;
                }
            }
        }
        Vec::new()
    }

    /// Check that the certificate names the given hostname in a subject alternative name.
    /// Certificates without any DNS names pass, some servers only carry an URI.
    pub fn is_hostname_valid(&self, hostname: &str) -> StatusCode {
        let names = self.subject_alt_names();
        let mut seen_dns_name = false;
        for name in &names {
            if let GeneralName::DnsName(dns) = name {
                seen_dns_name = true;
                if dns.as_str().eq_ignore_ascii_case(hostname) {
                    return StatusCode::Good;
                }
            }
        }
        if seen_dns_name {
            StatusCode::BadCertificateHostNameInvalid
        } else {
            StatusCode::Good
        }
    }

    /// Check that the certificate's application URI matches the supplied one.
    pub fn is_application_uri_valid(&self, application_uri: &str) -> StatusCode {
        let names = self.subject_alt_names();
        let mut seen_uri = false;
        for name in &names {
            if let GeneralName::UniformResourceIdentifier(uri) = name {
                seen_uri = true;
                if uri.as_str() == application_uri {
                    return StatusCode::Good;
                }
            }
        }
        if seen_uri {
            StatusCode::BadCertificateUriInvalid
        } else {
            StatusCode::Good
        }
    }
}
