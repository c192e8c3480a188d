//! Error types for the plugin stub and host.

use core::error::Error;

use derive_more::Display;
use error_stack::Report;

/// Result type for host connection operations.
pub type CommResult<T> = Result<T, Report<CommError>>;

/// Errors that can occur between a plugin and its host.
#[derive(Debug, Display)]
pub enum CommError {
    /// Network connectivity issues
    #[display("Network error: {message}")]
    Network { message: String },

    /// HTTP request/response errors
    #[display("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Serialization/deserialization errors
    #[display("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration errors
    #[display("Configuration error: {message}")]
    Configuration { message: String },

    /// Registration with the host was rejected or failed
    #[display("Registration error: {message}")]
    Registration { message: String },

    /// No session exists for the plugin
    #[display("Plugin {plugin_id} is not registered")]
    PluginNotRegistered { plugin_id: String },

    /// Host state errors
    #[display("Host state error: {message}")]
    HostState { message: String },
}

impl Error for CommError {}
