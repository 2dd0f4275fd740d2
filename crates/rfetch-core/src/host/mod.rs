//! Host definitions: the configured remote targets and the commands to run
//! on each of them.
//!
//! A [`HostDefinition`] is deserialized once from configuration, validated
//! by the host worker, and shared read-only (as `Arc<HostDefinition>`) for
//! the rest of the run. The [`HostRegistry`] holds every configured host
//! keyed by its unique name.

pub mod registry;
pub mod validate;

use serde::{Deserialize, Deserializer, Serialize};

pub use registry::HostRegistry;
pub use validate::{HostValidationError, HostWarning};

/// The host kind served by the built-in SSH connector.
pub const SSH_HOST_TYPE: &str = "ssh2";

/// Conventional SSH port, used by [`HostDefinition::ssh`].
pub const DEFAULT_SSH_PORT: u16 = 22;

/// One remote target and the ordered list of commands to run on it.
///
/// Field names on the wire follow the configuration format (`HostType`,
/// `DestHost`, ...). Missing and `null` fields deserialize to empty values and
/// are rejected later by [`HostDefinition::validate`], so a single bad host
/// never prevents the rest of the configuration from loading. The port is
/// kept as a signed integer for the same reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDefinition {
    /// Protocol kind, matched against the registered connectors.
    #[serde(rename = "HostType", default, deserialize_with = "null_as_default")]
    pub host_type: String,
    /// Destination address (hostname or IP).
    #[serde(rename = "DestHost", default, deserialize_with = "null_as_default")]
    pub address: String,
    /// Destination port. Only `1..=65535` is usable.
    #[serde(rename = "DestPort", default, deserialize_with = "null_as_default")]
    pub port: i64,
    /// Free-form namespace tag. Not interpreted by the engine.
    #[serde(
        rename = "DestNamespace",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub namespace: Option<String>,
    /// User to authenticate as.
    #[serde(rename = "HostUser", default, deserialize_with = "null_as_default")]
    pub user: String,
    /// Password for password authentication. Empty means absent.
    #[serde(rename = "HostPass", default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Inline private key material (OpenSSH or PEM). Empty means absent.
    #[serde(
        rename = "SSHPrivateKey",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub private_key: Option<String>,
    /// Commands to run, in configuration order.
    #[serde(rename = "ExecCommands", default, deserialize_with = "null_as_default")]
    pub commands: Vec<String>,
}

impl HostDefinition {
    /// Create a definition with the required connection fields.
    ///
    /// Credentials, namespace and commands start empty; use the builder-style
    /// setters to fill them in.
    pub fn new(
        host_type: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        user: impl Into<String>,
    ) -> Self {
        Self {
            host_type: host_type.into(),
            address: address.into(),
            port: port.into(),
            user: user.into(),
            ..Self::default()
        }
    }

    /// Shorthand for an `ssh2` host on the default port.
    pub fn ssh(address: impl Into<String>, user: impl Into<String>) -> Self {
        Self::new(SSH_HOST_TYPE, address, DEFAULT_SSH_PORT, user)
    }

    /// Set the password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the inline private key material.
    pub fn private_key(mut self, key: impl Into<String>) -> Self {
        self.private_key = Some(key.into());
        self
    }

    /// Set the namespace tag.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Replace the command list.
    pub fn commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// The password, treating an empty string as absent.
    pub fn password_secret(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// The private key material, treating an empty string as absent.
    pub fn private_key_material(&self) -> Option<&str> {
        self.private_key.as_deref().filter(|k| !k.is_empty())
    }

    /// The port as a socket port, or `None` when it is zero or out of range.
    pub fn socket_port(&self) -> Option<u16> {
        u16::try_from(self.port).ok().filter(|port| *port != 0)
    }

    /// `address:port`, for log lines and error context.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let host = HostDefinition::new("ssh2", "10.0.0.1", 2222, "ops");
        assert_eq!(host.host_type, "ssh2");
        assert_eq!(host.address, "10.0.0.1");
        assert_eq!(host.port, 2222);
        assert_eq!(host.user, "ops");
        assert!(host.password.is_none());
        assert!(host.private_key.is_none());
        assert!(host.namespace.is_none());
        assert!(host.commands.is_empty());
    }

    #[test]
    fn builder_sets_optional_fields() {
        let host = HostDefinition::ssh("db1", "root")
            .password("hunter2")
            .namespace("prod")
            .commands(["uptime", "df -h"]);

        assert_eq!(host.socket_port(), Some(DEFAULT_SSH_PORT));
        assert_eq!(host.password_secret(), Some("hunter2"));
        assert_eq!(host.namespace.as_deref(), Some("prod"));
        assert_eq!(host.commands, vec!["uptime", "df -h"]);
        assert_eq!(host.endpoint(), "db1:22");
    }

    #[test]
    fn empty_credentials_count_as_absent() {
        let host = HostDefinition::ssh("db1", "root")
            .password("")
            .private_key("");
        assert!(host.password_secret().is_none());
        assert!(host.private_key_material().is_none());
    }

    #[test]
    fn deserializes_config_field_names() {
        let json = r#"{
            "HostType": "ssh2",
            "DestHost": "192.168.1.10",
            "DestPort": 22,
            "DestNamespace": "",
            "HostUser": "admin",
            "HostPass": "pw",
            "SSHPrivateKey": "",
            "ExecCommands": ["hostname", "id"]
        }"#;
        let host: HostDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(host.host_type, "ssh2");
        assert_eq!(host.address, "192.168.1.10");
        assert_eq!(host.port, 22);
        assert_eq!(host.user, "admin");
        assert_eq!(host.password_secret(), Some("pw"));
        assert!(host.private_key_material().is_none());
        assert_eq!(host.commands, vec!["hostname", "id"]);
    }

    #[test]
    fn missing_fields_deserialize_to_empty_values() {
        let host: HostDefinition = serde_json::from_str(r#"{"HostType": "ssh2"}"#).unwrap();
        assert!(host.address.is_empty());
        assert_eq!(host.port, 0);
        assert!(host.user.is_empty());
        assert!(host.commands.is_empty());
    }

    #[test]
    fn null_fields_deserialize_to_empty_values() {
        let json = r#"{
            "HostType": null,
            "DestHost": null,
            "DestPort": null,
            "DestNamespace": null,
            "HostUser": null,
            "HostPass": null,
            "SSHPrivateKey": null,
            "ExecCommands": null
        }"#;
        let host: HostDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(host, HostDefinition::default());
    }

    #[test]
    fn out_of_range_port_still_parses() {
        for port in [-1_i64, 70_000] {
            let json = format!(r#"{{"HostType": "ssh2", "DestPort": {port}}}"#);
            let host: HostDefinition = serde_json::from_str(&json).unwrap();
            assert_eq!(host.port, port);
            assert_eq!(host.socket_port(), None);
        }
    }

    #[test]
    fn socket_port_accepts_valid_range() {
        let host = HostDefinition::new("ssh2", "h", 65535, "u");
        assert_eq!(host.socket_port(), Some(65535));

        let mut host = host;
        host.port = 0;
        assert_eq!(host.socket_port(), None);
    }
}
