//! Per-host validation.
//!
//! Hard errors skip the host; warnings are only logged.

use thiserror::Error;

use super::HostDefinition;

/// A required field is missing, so the host cannot be contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostValidationError {
    #[error("destination address cannot be empty")]
    EmptyAddress,

    #[error("destination port cannot be zero")]
    ZeroPort,

    #[error("destination port {0} is outside 1-65535")]
    PortOutOfRange(i64),

    #[error("user cannot be empty")]
    EmptyUser,
}

/// Suspicious but non-blocking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostWarning {
    /// The host has no commands; it will be connected to and left with an
    /// empty report entry.
    NoCommands,
    /// Neither a password nor a private key is configured.
    NoCredentials,
}

impl std::fmt::Display for HostWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostWarning::NoCommands => f.write_str("command list is empty"),
            HostWarning::NoCredentials => f.write_str("password and private key are both empty"),
        }
    }
}

impl HostDefinition {
    /// Check the required fields and collect soft warnings.
    ///
    /// Errors are reported in field order (address, port, user) and only the
    /// first one is returned. Only exactly-empty strings are rejected.
    pub fn validate(&self) -> Result<Vec<HostWarning>, HostValidationError> {
        if self.address.is_empty() {
            return Err(HostValidationError::EmptyAddress);
        }
        if self.port == 0 {
            return Err(HostValidationError::ZeroPort);
        }
        if self.socket_port().is_none() {
            return Err(HostValidationError::PortOutOfRange(self.port));
        }
        if self.user.is_empty() {
            return Err(HostValidationError::EmptyUser);
        }

        let mut warnings = Vec::new();
        if self.commands.is_empty() {
            warnings.push(HostWarning::NoCommands);
        }
        if self.password_secret().is_none() && self.private_key_material().is_none() {
            warnings.push(HostWarning::NoCredentials);
        }
        Ok(warnings)
    }
}
