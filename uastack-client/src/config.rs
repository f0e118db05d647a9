//! Client configuration, loadable from YAML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::error;
use serde::{Deserialize, Serialize};

use uastack_core::comms::url::is_opc_ua_binary_url;
use uastack_types::{
    ApplicationDescription, ApplicationType, DecodingOptions, LocalizedText, MessageSecurityMode,
    UAString,
};

use crate::retry::SessionRetryPolicy;
use crate::IdentityToken;

/// An endpoint the client knows about, identified by a caller-chosen id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientEndpoint {
    /// Endpoint url in the form `opc.tcp://host:port/path`.
    pub url: String,
    /// Security policy name or uri, empty for "best available".
    #[serde(default)]
    pub security_policy: String,
    /// Security mode: None, Sign or SignAndEncrypt.
    #[serde(default)]
    pub security_mode: String,
    /// Id of the user token to authenticate with, empty for anonymous.
    #[serde(default)]
    pub user_token_id: String,
}

impl ClientEndpoint {
    /// The security mode as its enum value.
    pub fn security_mode(&self) -> MessageSecurityMode {
        MessageSecurityMode::from(self.security_mode.as_str())
    }
}

/// A configured user identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientUserToken {
    /// User name, for password identities.
    #[serde(default)]
    pub user: String,
    /// Password, for password identities.
    #[serde(default)]
    pub password: Option<String>,
    /// Path to an X.509 user certificate.
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    /// Path to the private key for the user certificate.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
}

/// Limits applied to the transport and the decoder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientLimits {
    /// Size of the local receive buffer advertised in the hello message.
    pub receive_buffer_size: usize,
    /// Size of the local send buffer advertised in the hello message.
    pub send_buffer_size: usize,
    /// Largest accepted message, 0 for no limit.
    pub max_message_size: usize,
    /// Largest accepted chunk count per message, 0 for no limit.
    pub max_chunk_count: usize,
    /// Maximum length of decoded strings in bytes.
    pub max_string_length: usize,
    /// Maximum length of decoded byte strings in bytes.
    pub max_byte_string_length: usize,
    /// Maximum length of decoded arrays.
    pub max_array_length: usize,
}

impl Default for ClientLimits {
    fn default() -> Self {
        Self {
            receive_buffer_size: 65536,
            send_buffer_size: 65536,
            max_message_size: uastack_types::constants::MAX_MESSAGE_SIZE,
            max_chunk_count: uastack_types::constants::MAX_CHUNK_COUNT,
            max_string_length: uastack_types::constants::MAX_STRING_LENGTH,
            max_byte_string_length: uastack_types::constants::MAX_BYTE_STRING_LENGTH,
            max_array_length: uastack_types::constants::MAX_ARRAY_LENGTH,
        }
    }
}

impl ClientLimits {
    /// The decoding options these limits imply.
    pub fn decoding_options(&self) -> DecodingOptions {
        DecodingOptions {
            max_message_size: self.max_message_size,
            max_chunk_count: self.max_chunk_count,
            max_string_length: self.max_string_length,
            max_byte_string_length: self.max_byte_string_length,
            max_array_length: self.max_array_length,
            ..Default::default()
        }
    }
}

/// Client configuration. Can be built in code through [`crate::ClientBuilder`] or
/// deserialized from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Name of the application.
    pub application_name: String,
    /// Uri of the application, should match the application certificate's URI SAN.
    pub application_uri: String,
    /// Product uri.
    #[serde(default)]
    pub product_uri: String,
    /// Root of the PKI directory used by the certificate store.
    pub pki_dir: PathBuf,
    /// Trust any server certificate without consulting the trust list.
    #[serde(default)]
    pub trust_server_certs: bool,
    /// The session name passed in CreateSession.
    #[serde(default = "ClientConfig::default_session_name")]
    pub session_name: String,
    /// Requested server-side session idle timeout in milliseconds.
    #[serde(default = "ClientConfig::default_session_timeout")]
    pub session_timeout_ms: u32,
    /// Per-request timeout hint in milliseconds.
    #[serde(default = "ClientConfig::default_request_timeout")]
    pub request_timeout_ms: u32,
    /// Requested lifetime of secure channel security tokens in milliseconds.
    #[serde(default = "ClientConfig::default_channel_lifetime")]
    pub channel_lifetime_ms: u32,
    /// Interval between keep alive reads, 0 derives it from the session timeout.
    #[serde(default)]
    pub keep_alive_interval_ms: u32,
    /// Consecutive keep alive failures tolerated before the session is closed,
    /// 0 for no limit.
    #[serde(default = "ClientConfig::default_max_failed_keep_alive_count")]
    pub max_failed_keep_alive_count: u64,
    /// Initial delay before a reconnect attempt in milliseconds.
    #[serde(default = "ClientConfig::default_retry_initial_ms")]
    pub session_retry_initial_ms: u64,
    /// Ceiling of the reconnect delay in milliseconds.
    #[serde(default = "ClientConfig::default_retry_max_ms")]
    pub session_retry_max_ms: u64,
    /// Number of reconnect attempts before giving up, negative for unlimited.
    #[serde(default = "ClientConfig::default_retry_limit")]
    pub session_retry_limit: i32,
    /// Maximum number of outstanding publish requests, clamping the per-subscription
    /// scaling.
    #[serde(default = "ClientConfig::default_max_publish_requests")]
    pub max_publish_requests: usize,
    /// Ignore the clock skew between client and server, offsetting decoded timestamps.
    #[serde(default)]
    pub ignore_clock_skew: bool,
    /// Bit flags selecting the verbosity of server diagnostics returned with responses,
    /// stamped into every request header. 0 requests no diagnostics.
    #[serde(default)]
    pub diagnostics_hint: u32,
    /// Transport and decoder limits.
    #[serde(default)]
    pub limits: ClientLimits,
    /// Locale ids in order of preference.
    #[serde(default)]
    pub preferred_locales: Vec<String>,
    /// The configured endpoints, by id.
    #[serde(default)]
    pub endpoints: BTreeMap<String, ClientEndpoint>,
    /// The default endpoint id used by connect helpers when none is named.
    #[serde(default)]
    pub default_endpoint: String,
    /// Configured user tokens, by id.
    #[serde(default)]
    pub user_tokens: BTreeMap<String, ClientUserToken>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            application_name: String::new(),
            application_uri: String::new(),
            product_uri: String::new(),
            pki_dir: PathBuf::from("./pki"),
            trust_server_certs: false,
            session_name: Self::default_session_name(),
            session_timeout_ms: Self::default_session_timeout(),
            request_timeout_ms: Self::default_request_timeout(),
            channel_lifetime_ms: Self::default_channel_lifetime(),
            keep_alive_interval_ms: 0,
            max_failed_keep_alive_count: Self::default_max_failed_keep_alive_count(),
            session_retry_initial_ms: Self::default_retry_initial_ms(),
            session_retry_max_ms: Self::default_retry_max_ms(),
            session_retry_limit: Self::default_retry_limit(),
            max_publish_requests: Self::default_max_publish_requests(),
            ignore_clock_skew: false,
            diagnostics_hint: 0,
            limits: ClientLimits::default(),
            preferred_locales: Vec::new(),
            endpoints: BTreeMap::new(),
            default_endpoint: String::new(),
            user_tokens: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    fn default_session_name() -> String {
        "Rust OPC UA Client".to_string()
    }

    fn default_session_timeout() -> u32 {
        120_000
    }

    fn default_request_timeout() -> u32 {
        15_000
    }

    fn default_channel_lifetime() -> u32 {
        uastack_core::constants::DEFAULT_SECURE_CHANNEL_TOKEN_LIFETIME
    }

    fn default_max_failed_keep_alive_count() -> u64 {
        3
    }

    fn default_retry_initial_ms() -> u64 {
        SessionRetryPolicy::DEFAULT_INITIAL_DELAY_MS
    }

    fn default_retry_max_ms() -> u64 {
        SessionRetryPolicy::DEFAULT_MAX_DELAY_MS
    }

    fn default_retry_limit() -> i32 {
        -1
    }

    fn default_max_publish_requests() -> usize {
        10
    }

    /// Load a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<ClientConfig, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config {}: {e}", path.display()))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| format!("Cannot parse config {}: {e}", path.display()))?;
        if !config.is_valid() {
            return Err(format!("Config {} failed validation", path.display()));
        }
        Ok(config)
    }

    /// Save the configuration to a YAML file.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| format!("Cannot serialize config: {e}"))?;
        std::fs::write(path, content)
            .map_err(|e| format!("Cannot write config {}: {e}", path.display()))
    }

    /// Validate the configuration, logging each problem found.
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.application_name.is_empty() {
            error!("Config is invalid: application name is empty");
            valid = false;
        }
        if self.application_uri.is_empty() {
            error!("Config is invalid: application uri is empty");
            valid = false;
        }
        if !self.default_endpoint.is_empty() && !self.endpoints.contains_key(&self.default_endpoint)
        {
            error!(
                "Config is invalid: default endpoint {} is not configured",
                self.default_endpoint
            );
            valid = false;
        }
        for (id, endpoint) in &self.endpoints {
            if !is_opc_ua_binary_url(&endpoint.url) {
                error!("Config is invalid: endpoint {id} url {} is not an opc.tcp url", endpoint.url);
                valid = false;
            }
            if !endpoint.user_token_id.is_empty()
                && !self.user_tokens.contains_key(&endpoint.user_token_id)
            {
                error!(
                    "Config is invalid: endpoint {id} names user token {} which is not configured",
                    endpoint.user_token_id
                );
                valid = false;
            }
        }
        valid
    }

    /// The application description sent in CreateSession.
    pub fn application_description(&self) -> ApplicationDescription {
        ApplicationDescription {
            application_uri: UAString::from(&self.application_uri),
            product_uri: UAString::from(&self.product_uri),
            application_name: LocalizedText::from(self.application_name.as_str()),
            application_type: ApplicationType::Client,
            gateway_server_uri: UAString::null(),
            discovery_profile_uri: UAString::null(),
            discovery_urls: None,
        }
    }

    /// The session retry policy from the configured delays and limit.
    pub fn session_retry_policy(&self) -> SessionRetryPolicy {
        let retry_limit = if self.session_retry_limit < 0 {
            None
        } else {
            Some(self.session_retry_limit as u32)
        };
        SessionRetryPolicy::new(
            Duration::from_millis(self.session_retry_max_ms),
            retry_limit,
            Duration::from_millis(self.session_retry_initial_ms),
        )
    }

    /// The decoding options the limits imply.
    pub fn decoding_options(&self) -> DecodingOptions {
        self.limits.decoding_options()
    }

    /// Look up the identity token for a configured user token id. An empty id is the
    /// anonymous identity.
    pub fn client_identity_token(&self, user_token_id: &str) -> Option<IdentityToken> {
        if user_token_id.is_empty() {
            return Some(IdentityToken::Anonymous);
        }
        let token = self.user_tokens.get(user_token_id)?;
        if let Some(password) = &token.password {
            Some(IdentityToken::UserName(token.user.clone(), password.clone()))
        } else if let (Some(cert), Some(key)) = (&token.cert_path, &token.private_key_path) {
            Some(IdentityToken::X509(cert.clone(), key.clone()))
        } else {
            error!("User token {user_token_id} has neither a password nor a certificate");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> ClientConfig {
        let mut config = ClientConfig {
            application_name: "panel".to_string(),
            application_uri: "urn:factory:panel".to_string(),
            ..Default::default()
        };
        config.endpoints.insert(
            "local".to_string(),
            ClientEndpoint {
                url: "opc.tcp://localhost:48010".to_string(),
                security_policy: "Basic256Sha256".to_string(),
                security_mode: "SignAndEncrypt".to_string(),
                user_token_id: "operator".to_string(),
            },
        );
        config.default_endpoint = "local".to_string();
        config.user_tokens.insert(
            "operator".to_string(),
            ClientUserToken {
                user: "operator".to_string(),
                password: Some("P@ssw0rd".to_string()),
                cert_path: None,
                private_key_path: None,
            },
        );
        config
    }

    #[test]
    fn yaml_round_trip() {
        let config = sample_config();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: ClientConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
        assert!(parsed.is_valid());
    }

    #[test]
    fn validation_catches_bad_references() {
        let mut config = sample_config();
        config.default_endpoint = "nowhere".to_string();
        assert!(!config.is_valid());

        let mut config = sample_config();
        config
            .endpoints
            .get_mut("local")
            .unwrap()
            .user_token_id = "ghost".to_string();
        assert!(!config.is_valid());
    }

    #[test]
    fn identity_token_resolution() {
        let config = sample_config();
        assert!(matches!(
            config.client_identity_token(""),
            Some(IdentityToken::Anonymous)
        ));
        assert!(matches!(
            config.client_identity_token("operator"),
            Some(IdentityToken::UserName(_, _))
        ));
        assert!(config.client_identity_token("ghost").is_none());
    }

    #[test]
    fn defaults_follow_spec() {
        let config = ClientConfig::default();
        assert_eq!(config.session_timeout_ms, 120_000);
        assert_eq!(config.request_timeout_ms, 15_000);
        assert_eq!(config.limits.receive_buffer_size, 65536);
        assert_eq!(config.limits.send_buffer_size, 65536);
        assert_eq!(config.limits.max_message_size, 16 * 1024 * 1024);
        assert_eq!(config.limits.max_chunk_count, 4096);
    }
}
