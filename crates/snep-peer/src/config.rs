use snep_link::{SNEP_ADDRESS, SNEP_SERVICE_NAME};

use crate::error::ConfigError;

/// Service name of the Default Server.
pub const DEFAULT_SERVICE_NAME: &str = SNEP_SERVICE_NAME;

/// Link address reserved for the Default Server.
pub const DEFAULT_SERVER_ADDRESS: u8 = SNEP_ADDRESS;

/// Largest request the Default Server accepts.
pub const DEFAULT_SERVER_ACCEPTABLE_LENGTH: usize = 1024;

/// Default request limit for named (private) servers.
pub const PRIVATE_SERVER_ACCEPTABLE_LENGTH: usize = 1_000_000;

/// Default response limit for client PUT requests.
pub const DEFAULT_CLIENT_ACCEPTABLE_LENGTH: usize = 1024;

/// Which server a [`ServerConfig`] describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerIdentity {
    /// The mandatory Default Server bound to `urn:nfc:sn:snep`.
    Default,
    /// A custom server bound to any other service name.
    Named(String),
}

impl ServerIdentity {
    /// Service name the server binds.
    pub fn service_name(&self) -> &str {
        match self {
            Self::Default => DEFAULT_SERVICE_NAME,
            Self::Named(name) => name,
        }
    }

    /// Check that a named identity does not claim the reserved service name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Named(name) if name == DEFAULT_SERVICE_NAME => {
                Err(ConfigError::ReservedServiceName(name.clone()))
            }
            _ => Ok(()),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub identity: ServerIdentity,
    /// Requests announcing more information bytes than this are rejected.
    pub max_acceptable_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::default_server()
    }
}

impl ServerConfig {
    /// Configuration of the Default Server.
    pub fn default_server() -> Self {
        Self {
            identity: ServerIdentity::Default,
            max_acceptable_length: DEFAULT_SERVER_ACCEPTABLE_LENGTH,
        }
    }

    /// Configuration of a custom server bound to `service_name`.
    pub fn named(service_name: impl Into<String>) -> Result<Self, ConfigError> {
        let identity = ServerIdentity::Named(service_name.into());
        identity.validate()?;
        Ok(Self {
            identity,
            max_acceptable_length: PRIVATE_SERVER_ACCEPTABLE_LENGTH,
        })
    }

    /// Override the request size limit. Values above `u32::MAX` are clamped.
    pub fn with_max_acceptable_length(mut self, limit: usize) -> Self {
        self.max_acceptable_length = limit.min(u32::MAX as usize);
        self
    }

    /// Service name the server binds.
    pub fn service_name(&self) -> &str {
        self.identity.service_name()
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service used when an operation runs on an unconnected client.
    pub default_service_name: String,
    /// Largest response accepted for PUT requests.
    pub acceptable_length: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_service_name: DEFAULT_SERVICE_NAME.to_string(),
            acceptable_length: DEFAULT_CLIENT_ACCEPTABLE_LENGTH,
        }
    }
}
