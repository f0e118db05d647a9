// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Provides functions for parsing OPC UA urls from strings.

use log::error;
use url::Url;

use uastack_types::StatusCode;

/// Scheme for OPC UA TCP.
pub const OPC_TCP_SCHEME: &str = "opc.tcp";

/// Creates a `Url` from the input string, supplying a default port if necessary.
fn opc_url_from_str(s: &str) -> Result<Url, url::ParseError> {
    Url::parse(s)
        .map(|mut url| {
            if url.port().is_none() {
                let _ = url.set_port(Some(crate::constants::DEFAULT_OPC_UA_SERVER_PORT));
            }
            url
        })
        .inspect_err(|err| {
            error!("Cannot parse url \"{}\", error = {:?}", s, err);
        })
}

/// Check if this is an OPC UA TCP URL.
pub fn is_opc_ua_binary_url(url: &str) -> bool {
    if let Ok(url) = opc_url_from_str(url) {
        url.scheme() == OPC_TCP_SCHEME
    } else {
        false
    }
}

/// Takes an endpoint url and strips off the query args to leave just the protocol,
/// host, port and path.
pub fn server_url_from_endpoint_url(
    endpoint_url: &str,
) -> std::result::Result<String, url::ParseError> {
    opc_url_from_str(endpoint_url).map(|mut url| {
        url.set_query(None);
        if let Some(port) = url.port() {
            if port == crate::constants::DEFAULT_OPC_UA_SERVER_PORT {
                let _ = url.set_port(None);
            }
        }
        url.into_string()
    })
}

/// Error returned when getting the host name from a URL.
#[derive(Debug, thiserror::Error)]
pub enum HostnameFromUrlError {
    /// URL failed to parse.
    #[error("Failed to parse url: {0}")]
    Parse(#[from] url::ParseError),
    /// Host is not present in URL.
    #[error("Url has no host")]
    MissingHost,
}

/// Get the hostname from the given URL.
pub fn hostname_from_url(url: &str) -> Result<String, HostnameFromUrlError> {
    let url = Url::parse(url)?;
    if let Some(host) = url.host_str() {
        Ok(host.to_string())
    } else {
        Err(HostnameFromUrlError::MissingHost)
    }
}

/// Get the hostname and port from the given URL, defaulting to `default_port`.
pub fn hostname_port_from_url(url: &str, default_port: u16) -> Result<(String, u16), StatusCode> {
    let url = Url::parse(url).map_err(|_| StatusCode::BadTcpEndpointUrlInvalid)?;
    if url.scheme() != OPC_TCP_SCHEME || !url.has_host() {
        Err(StatusCode::BadTcpEndpointUrlInvalid)
    } else {
        let host = url.host_str().unwrap();
        let port = url.port().unwrap_or(default_port);
        Ok((host.to_string(), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_scheme() {
        assert!(is_opc_ua_binary_url("opc.tcp://foo/xyz"));
        assert!(!is_opc_ua_binary_url("http://foo/xyz"));
    }

    #[test]
    fn hostname_and_port() {
        assert_eq!(
            hostname_port_from_url("opc.tcp://localhost:48010/path", 4840).unwrap(),
            ("localhost".to_string(), 48010)
        );
        assert_eq!(
            hostname_port_from_url("opc.tcp://10.0.0.2", 4840).unwrap(),
            ("10.0.0.2".to_string(), 4840)
        );
        assert!(hostname_port_from_url("http://localhost", 4840).is_err());
    }
}
