//! SSH transport built on `russh`.
//!
//! Authentication policy: inline private key material wins when present,
//! otherwise the (possibly empty) password is used. Server host keys are
//! accepted without verification, the equivalent of
//! `ssh -o StrictHostKeyChecking=no`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::{KeyPair, PublicKey};
use thiserror::Error;

use super::{Connection, Connector, ExecOutput, ExitState, Session};
use crate::host::{HostDefinition, SSH_HOST_TYPE};

/// SSH-specific failures that are not plain `russh` protocol errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured private key could not be decoded.
    #[error("unable to parse private key: {0}")]
    InvalidKey(#[source] russh_keys::Error),

    /// The server rejected the offered credentials.
    #[error("{method} authentication rejected for user {user:?}")]
    AuthRejected { user: String, method: &'static str },

    /// No connection was established within the configured deadline.
    #[error("connection to {endpoint} timed out after {after:?}")]
    ConnectTimeout { endpoint: String, after: Duration },
}

/// The credential chosen for a host.
pub enum AuthMethod {
    PublicKey(Arc<KeyPair>),
    Password(String),
}

impl AuthMethod {
    /// Short name used in log lines and errors.
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::PublicKey(_) => "publickey",
            AuthMethod::Password(_) => "password",
        }
    }
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secrets.
        f.write_str(self.name())
    }
}

/// Pick the authentication method for `host`.
///
/// Key material, when present, must decode; a broken key is an error rather
/// than a silent fallback to the password.
pub fn select_auth(host: &HostDefinition) -> Result<AuthMethod, TransportError> {
    match host.private_key_material() {
        Some(material) => {
            let key =
                russh_keys::decode_secret_key(material, None).map_err(TransportError::InvalidKey)?;
            Ok(AuthMethod::PublicKey(Arc::new(key)))
        }
        None => Ok(AuthMethod::Password(
            host.password_secret().unwrap_or_default().to_string(),
        )),
    }
}

/// Client handler that trusts every server key.
struct AcceptAnyHostKey;

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// [`Connector`] for `ssh2` hosts.
pub struct SshConnector {
    config: Arc<client::Config>,
}

impl SshConnector {
    /// Create a connector with the default `russh` client configuration.
    pub fn new() -> Self {
        Self::with_config(client::Config::default())
    }

    /// Create a connector with a custom client configuration.
    pub fn with_config(config: client::Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Default for SshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SshConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnector")
            .field("host_type", &SSH_HOST_TYPE)
            .finish()
    }
}

#[async_trait]
impl Connector for SshConnector {
    fn host_type(&self) -> &str {
        SSH_HOST_TYPE
    }

    async fn connect(&self, host: &HostDefinition) -> Result<Box<dyn Connection>> {
        let port = host
            .socket_port()
            .with_context(|| format!("invalid destination port {}", host.port))?;
        let auth = select_auth(host)?;
        tracing::debug!(endpoint = %host.endpoint(), method = auth.name(), "dialing");

        let mut handle = client::connect(
            Arc::clone(&self.config),
            (host.address.as_str(), port),
            AcceptAnyHostKey,
        )
        .await
        .with_context(|| format!("unable to establish connection to {}", host.endpoint()))?;

        let method = auth.name();
        let accepted = match auth {
            AuthMethod::PublicKey(key) => handle.authenticate_publickey(&host.user, key).await,
            AuthMethod::Password(password) => {
                handle.authenticate_password(&host.user, password).await
            }
        }
        .with_context(|| format!("{method} authentication failed on {}", host.endpoint()))?;

        if !accepted {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication rejected", "en")
                .await;
            return Err(TransportError::AuthRejected {
                user: host.user.clone(),
                method,
            }
            .into());
        }

        Ok(Box::new(SshConnection { handle }))
    }
}

/// An authenticated SSH connection. Each command gets its own channel.
struct SshConnection {
    handle: Handle<AcceptAnyHostKey>,
}

#[async_trait]
impl Connection for SshConnection {
    async fn open_session(&self) -> Result<Box<dyn Session>> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .context("unable to open session")?;
        Ok(Box::new(SshSession { channel }))
    }

    async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .context("failed to disconnect cleanly")?;
        Ok(())
    }
}

/// One `session` channel, used for exactly one `exec` request.
struct SshSession {
    channel: Channel<Msg>,
}

#[async_trait]
impl Session for SshSession {
    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        self.channel
            .exec(true, command)
            .await
            .context("exec request failed")?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit = ExitState::Unknown;

        while let Some(msg) = self.channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                // Extended data type 1 is SSH_EXTENDED_DATA_STDERR.
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => exit = ExitState::Code(exit_status),
                ChannelMsg::ExitSignal { signal_name, .. } => {
                    exit = ExitState::Signal(format!("{signal_name:?}"));
                }
                _ => {}
            }
        }

        Ok(ExecOutput {
            stdout,
            stderr,
            exit,
        })
    }
}
