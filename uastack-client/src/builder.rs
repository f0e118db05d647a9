//! Fluent builder for a [`Client`].

use std::path::{Path, PathBuf};

use crate::{config::ClientConfig, session::Client, ClientEndpoint, ClientUserToken};

/// Builds a [`Client`] from a sequence of configuration calls.
///
/// ```no_run
/// use uastack_client::ClientBuilder;
///
/// let client = ClientBuilder::new()
///     .application_name("Panel A")
///     .application_uri("urn:factory:panel-a")
///     .pki_dir("./pki")
///     .session_retry_limit(5)
///     .client()
///     .unwrap();
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a builder from an existing configuration.
    pub fn from_config(config: ClientConfig) -> ClientBuilder {
        ClientBuilder { config }
    }

    /// Create a builder from a YAML configuration file.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<ClientBuilder, String> {
        Ok(ClientBuilder {
            config: ClientConfig::load(path.as_ref())?,
        })
    }

    /// Produce the configuration, consuming the builder.
    pub fn config(self) -> ClientConfig {
        self.config
    }

    /// Produce a client from the builder, failing if the configuration is invalid.
    pub fn client(self) -> Result<Client, String> {
        if !self.config.is_valid() {
            return Err("Client configuration is invalid".to_string());
        }
        Ok(Client::new(self.config))
    }

    /// Set the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.config.application_name = name.into();
        self
    }

    /// Set the application uri.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.application_uri = uri.into();
        self
    }

    /// Set the product uri.
    pub fn product_uri(mut self, uri: impl Into<String>) -> Self {
        self.config.product_uri = uri.into();
        self
    }

    /// Set the PKI directory.
    pub fn pki_dir(mut self, pki_dir: impl Into<PathBuf>) -> Self {
        self.config.pki_dir = pki_dir.into();
        self
    }

    /// Trust any server certificate without consulting the trust list. Useful for test
    /// setups, unfit for production.
    pub fn trust_server_certs(mut self, trust: bool) -> Self {
        self.config.trust_server_certs = trust;
        self
    }

    /// Set the session name sent in CreateSession.
    pub fn session_name(mut self, name: impl Into<String>) -> Self {
        self.config.session_name = name.into();
        self
    }

    /// Set the requested session timeout in milliseconds.
    pub fn session_timeout(mut self, timeout_ms: u32) -> Self {
        self.config.session_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-request timeout hint in milliseconds.
    pub fn request_timeout(mut self, timeout_ms: u32) -> Self {
        self.config.request_timeout_ms = timeout_ms;
        self
    }

    /// Set the requested secure channel token lifetime in milliseconds.
    pub fn channel_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.config.channel_lifetime_ms = lifetime_ms;
        self
    }

    /// Set the keep alive interval in milliseconds. Zero derives it from the session
    /// timeout.
    pub fn keep_alive_interval(mut self, interval_ms: u32) -> Self {
        self.config.keep_alive_interval_ms = interval_ms;
        self
    }

    /// Set the number of reconnect attempts before giving up, negative for unlimited.
    pub fn session_retry_limit(mut self, limit: i32) -> Self {
        self.config.session_retry_limit = limit;
        self
    }

    /// Set the initial reconnect delay in milliseconds.
    pub fn session_retry_initial(mut self, delay_ms: u64) -> Self {
        self.config.session_retry_initial_ms = delay_ms;
        self
    }

    /// Set the ceiling of the reconnect delay in milliseconds.
    pub fn session_retry_max(mut self, delay_ms: u64) -> Self {
        self.config.session_retry_max_ms = delay_ms;
        self
    }

    /// Set the ceiling of outstanding publish requests.
    pub fn max_publish_requests(mut self, max: usize) -> Self {
        self.config.max_publish_requests = max;
        self
    }

    /// Ignore clock skew between server and client.
    pub fn ignore_clock_skew(mut self, ignore: bool) -> Self {
        self.config.ignore_clock_skew = ignore;
        self
    }

    /// Set the bit flags requesting server diagnostics with every response.
    pub fn diagnostics_hint(mut self, hint: u32) -> Self {
        self.config.diagnostics_hint = hint;
        self
    }

    /// Set the local receive buffer size.
    pub fn receive_buffer_size(mut self, size: usize) -> Self {
        self.config.limits.receive_buffer_size = size;
        self
    }

    /// Set the local send buffer size.
    pub fn send_buffer_size(mut self, size: usize) -> Self {
        self.config.limits.send_buffer_size = size;
        self
    }

    /// Set the maximum accepted message size, 0 for no limit.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.limits.max_message_size = size;
        self
    }

    /// Set the maximum accepted chunk count per message, 0 for no limit.
    pub fn max_chunk_count(mut self, count: usize) -> Self {
        self.config.limits.max_chunk_count = count;
        self
    }

    /// Set the preferred locales.
    pub fn preferred_locales(mut self, locales: Vec<String>) -> Self {
        self.config.preferred_locales = locales;
        self
    }

    /// Add a named endpoint.
    pub fn endpoint(mut self, id: impl Into<String>, endpoint: ClientEndpoint) -> Self {
        self.config.endpoints.insert(id.into(), endpoint);
        self
    }

    /// Add named endpoints, making the first the default if none is set.
    pub fn endpoints(mut self, endpoints: Vec<(impl Into<String>, ClientEndpoint)>) -> Self {
        for (id, endpoint) in endpoints {
            let id = id.into();
            if self.config.default_endpoint.is_empty() {
                self.config.default_endpoint = id.clone();
            }
            self.config.endpoints.insert(id, endpoint);
        }
        self
    }

    /// Set the default endpoint id.
    pub fn default_endpoint(mut self, id: impl Into<String>) -> Self {
        self.config.default_endpoint = id.into();
        self
    }

    /// Add a named user token.
    pub fn user_token(mut self, id: impl Into<String>, token: ClientUserToken) -> Self {
        self.config.user_tokens.insert(id.into(), token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_valid_client() {
        let client = ClientBuilder::new()
            .application_name("test")
            .application_uri("urn:test")
            .pki_dir(std::env::temp_dir().join("uastack-builder-test-pki"))
            .client();
        assert!(client.is_ok());
    }

    #[test]
    fn invalid_config_is_rejected() {
        // No application name or uri.
        assert!(ClientBuilder::new().client().is_err());
    }
}
