//! # Runtime Configuration
//!
//! Per-module configuration: identity, limits, module key, static routes and
//! optionally pre-provisioned sessions.
//!
//! ## Sources
//!
//! - TOML (`RuntimeConfig::from_toml_str`, `load` for `*.toml`)
//! - JSON (`from_json_str`, `load` for `*.json`)
//! - the deployer's JSON descriptor (`from_descriptor_json`), which lists
//!   every module and connection of the application
//!
//! Keys are hex strings in every format.
//!
//! ```toml
//! module_id = 2
//! name = "led_driver"
//! encryption = "aes"
//! module_key = "000102030405060708090a0b0c0d0e0f"
//!
//! [[routes]]
//! output = 0
//! destinations = [{ module = 3, input = 1 }]
//! ```

use ae_crypto::{derive_module_key, ta_image_hash, CryptoError, Encryption, SecretKey};
use ae_types::{Destination, EventMessage, IoId, ModuleId, RuntimeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::domain::{DEFAULT_REPLAY_WINDOW, MAX_REPLAY_WINDOW};

/// Default maximum plaintext size in bytes.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 1024;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("Failed to read {path}: {error}")]
    Io { path: String, error: String },

    /// File could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// `ModuleId(0)` belongs to the deployer.
    #[error("Module id 0 is reserved for the deployer")]
    ReservedModuleId,

    /// Replay window outside `1..=128`.
    #[error("Replay window of {0} is outside 1..=128")]
    InvalidReplayWindow(u32),

    /// Payload limit of zero or beyond the wire's length field.
    #[error("Payload limit of {0} bytes is outside 1..=65535")]
    InvalidPayloadLimit(usize),

    /// Key length does not match its cipher.
    #[error("Key for {context} is invalid: {error}")]
    InvalidKey { context: String, error: CryptoError },

    /// No module key configured.
    #[error("No module key configured")]
    MissingModuleKey,

    /// Output listed twice.
    #[error("Output {0} is routed twice")]
    DuplicateRoute(IoId),

    /// Route to the module itself or to the deployer.
    #[error("Output {output} cannot be routed to {module}")]
    InvalidDestination { output: IoId, module: ModuleId },

    /// Session listed twice, or with the module itself or the deployer.
    #[error("Invalid pre-provisioned session with {0}")]
    InvalidSession(ModuleId),

    /// Two connections to the same peer carry different keys.
    #[error("Connections with {0} disagree on the session key")]
    ConflictingSessionKey(ModuleId),

    /// Descriptor references an unknown module.
    #[error("Unknown module '{0}' in descriptor")]
    UnknownModule(String),

    /// Descriptor names an input or output the module does not list.
    #[error("Module '{module}' has no input or output named '{name}'")]
    UnknownIo { module: String, name: String },

    /// Connection does not have one of the accepted shapes.
    #[error("Invalid {connection}: {reason}")]
    InvalidConnection { connection: String, reason: String },

    /// Registration failed while applying the configuration.
    #[error("Routing: {0}")]
    Routing(#[from] RuntimeError),
}

/// Key material carried as a hex string in configuration files.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct HexKey(Vec<u8>);

impl HexKey {
    /// Wrap raw bytes.
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Bind to a cipher.
    ///
    /// # Errors
    ///
    /// `CryptoError::InvalidKeyLength` if the length does not match.
    pub fn to_secret(&self, encryption: Encryption) -> Result<SecretKey, CryptoError> {
        SecretKey::new(encryption, &self.0)
    }
}

impl fmt::Debug for HexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HexKey(<{} bytes>)", self.0.len())
    }
}

impl Serialize for HexKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text.trim_start_matches("0x"))
            .map(HexKey)
            .map_err(serde::de::Error::custom)
    }
}

/// Destinations of one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Local output id.
    pub output: IoId,
    /// Ordered destinations.
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

/// Session installed at start-up instead of through `SetKey`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Peer module.
    pub peer: ModuleId,
    /// Session cipher.
    #[serde(default)]
    pub encryption: Encryption,
    /// Session key (hex).
    pub key: HexKey,
}

/// Complete configuration of one module instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Identity assigned by the deployer.
    pub module_id: ModuleId,
    /// Human-readable name, used in logs.
    pub name: String,
    /// Maximum plaintext size per event.
    #[serde(default = "default_max_payload_len")]
    pub max_payload_len: usize,
    /// Replay window size per session.
    #[serde(default = "default_replay_window")]
    pub replay_window: u32,
    /// Cipher of the module key.
    #[serde(default)]
    pub encryption: Encryption,
    /// Module key (hex). Required before the runtime starts.
    #[serde(default)]
    pub module_key: Option<HexKey>,
    /// TA UUID (TrustZone only).
    #[serde(default)]
    pub uuid: Option<Uuid>,
    /// Static output routes.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    /// Sessions installed at start-up.
    #[serde(default)]
    pub sessions: Vec<SessionConfig>,
}

fn default_max_payload_len() -> usize {
    DEFAULT_MAX_PAYLOAD_LEN
}

fn default_replay_window() -> u32 {
    DEFAULT_REPLAY_WINDOW
}

impl RuntimeConfig {
    /// Minimal configuration with defaults and no key.
    pub fn new(module_id: ModuleId, name: impl Into<String>) -> Self {
        Self {
            module_id,
            name: name.into(),
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            replay_window: DEFAULT_REPLAY_WINDOW,
            encryption: Encryption::default(),
            module_key: None,
            uuid: None,
            routes: Vec::new(),
            sessions: Vec::new(),
        }
    }

    /// Set the module key.
    #[must_use]
    pub fn with_module_key(mut self, key: &SecretKey) -> Self {
        self.encryption = key.encryption();
        self.module_key = Some(HexKey::new(key.as_bytes()));
        self
    }

    /// Derive the module key a TrustZone node assigns to `ta_binary`.
    ///
    /// # Errors
    ///
    /// `InvalidKey` if the binary is too short to carry an image hash.
    pub fn with_derived_module_key(
        mut self,
        node_key: &[u8],
        ta_binary: &[u8],
    ) -> Result<Self, ConfigError> {
        let invalid = |error| ConfigError::InvalidKey {
            context: "module".into(),
            error,
        };
        let hash = ta_image_hash(ta_binary)
            .ok_or_else(|| invalid(CryptoError::InvalidInput("TA binary too short".into())))?;
        let key = derive_module_key(node_key, &hash, self.encryption).map_err(invalid)?;
        self.module_key = Some(HexKey::new(key.as_bytes()));
        Ok(self)
    }

    /// Add a route.
    #[must_use]
    pub fn with_route(mut self, output: IoId, destinations: Vec<Destination>) -> Self {
        self.routes.push(RouteConfig {
            output,
            destinations,
        });
        self
    }

    /// Add a pre-provisioned session.
    #[must_use]
    pub fn with_session(mut self, peer: ModuleId, key: &SecretKey) -> Self {
        self.sessions.push(SessionConfig {
            peer,
            encryption: key.encryption(),
            key: HexKey::new(key.as_bytes()),
        });
        self
    }

    /// Override the replay window.
    #[must_use]
    pub fn with_replay_window(mut self, size: u32) -> Self {
        self.replay_window = size;
        self
    }

    /// Override the payload limit.
    #[must_use]
    pub fn with_max_payload_len(mut self, len: usize) -> Self {
        self.max_payload_len = len;
        self
    }

    /// Parse TOML.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` for syntax or schema errors.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Parse JSON.
    ///
    /// # Errors
    ///
    /// `ConfigError::Parse` for syntax or schema errors.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load from a file; `.json` files are JSON, everything else TOML.
    ///
    /// # Errors
    ///
    /// `ConfigError::Io` if the file cannot be read, `Parse` if it is invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Build the configuration of `module_name` from a deployment descriptor.
    ///
    /// Connections leaving the module become routes. Connections that touch
    /// the module and already carry a key become pre-provisioned sessions.
    /// Inputs and outputs may be given by id or by the name listed in the
    /// module's `inputs` / `outputs` maps.
    ///
    /// `direct` connections start at the deployer, which talks to the module
    /// through `SetKey` and `Attest` only; they are checked and then skipped.
    /// Request/handler connections are not supported by this runtime and are
    /// skipped as well. Both are logged.
    ///
    /// # Errors
    ///
    /// `Parse` for invalid JSON, `UnknownModule` / `UnknownIo` for dangling
    /// names, `InvalidConnection` for malformed connections,
    /// `ConflictingSessionKey` when one peer is given two keys.
    pub fn from_descriptor_json(content: &str, module_name: &str) -> Result<Self, ConfigError> {
        let descriptor: Descriptor =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let module = |name: &str| {
            descriptor
                .modules
                .iter()
                .find(|m| m.name == name)
                .ok_or_else(|| ConfigError::UnknownModule(name.to_string()))
        };

        let this = module(module_name)?;

        let mut config = RuntimeConfig::new(this.id, module_name);
        config.encryption = this.encryption;
        config.module_key = this.key.clone();
        config.uuid = this.uuid;

        for (index, connection) in descriptor.connections.iter().enumerate() {
            let label = connection
                .name
                .clone()
                .unwrap_or_else(|| format!("connection #{index}"));
            let invalid = |reason: &str| ConfigError::InvalidConnection {
                connection: label.clone(),
                reason: reason.to_string(),
            };

            let to = module(&connection.to_module)?;
            let from = match (&connection.from_module, connection.direct) {
                (Some(_), true) => return Err(invalid("direct connection with a from_module")),
                (None, false) => return Err(invalid("missing from_module")),
                (Some(name), false) => Some(module(name)?),
                (None, true) => None,
            };
            if from.is_some_and(|from| from.id == to.id) {
                return Err(invalid("module connected to itself"));
            }

            let (output, input) = match (
                &connection.from_output,
                &connection.from_request,
                &connection.to_input,
                &connection.to_handler,
            ) {
                (output, None, Some(input), None) => {
                    if output.is_some() != from.is_some() {
                        return Err(invalid("from_output must be given exactly when from_module is"));
                    }
                    (output, input)
                }
                (None, Some(_), None, Some(_)) if from.is_some() => {
                    if from.is_some_and(|m| m.id == this.id) || to.id == this.id {
                        warn!(
                            module = %this.id,
                            connection = %label,
                            "Request/handler connection skipped, not supported by this runtime"
                        );
                    }
                    continue;
                }
                _ => return Err(invalid("expected from_output/to_input or from_request/to_handler")),
            };

            let input = to.input(input)?;
            let Some(from) = from else {
                if to.id == this.id {
                    debug!(
                        module = %this.id,
                        %input,
                        connection = %label,
                        "Direct connection skipped, deployer events are not routed"
                    );
                }
                continue;
            };
            let output = match output {
                Some(output) => from.output(output)?,
                None => return Err(invalid("missing from_output")),
            };

            if from.id == this.id {
                let destination = Destination::new(to.id, input);
                match config.routes.iter_mut().find(|r| r.output == output) {
                    Some(route) => route.destinations.push(destination),
                    None => config.routes.push(RouteConfig {
                        output,
                        destinations: vec![destination],
                    }),
                }
            }

            let peer = if from.id == this.id {
                to.id
            } else if to.id == this.id {
                from.id
            } else {
                continue;
            };

            if let Some(key) = &connection.key {
                match config.sessions.iter().find(|s| s.peer == peer) {
                    Some(existing)
                        if existing.key != *key || existing.encryption != connection.encryption =>
                    {
                        return Err(ConfigError::ConflictingSessionKey(peer));
                    }
                    Some(_) => {}
                    None => config.sessions.push(SessionConfig {
                        peer,
                        encryption: connection.encryption,
                        key: key.clone(),
                    }),
                }
            }
        }

        Ok(config)
    }

    /// Validate before use.
    ///
    /// # Errors
    ///
    /// The first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.module_id == ModuleId::DEPLOYER {
            return Err(ConfigError::ReservedModuleId);
        }
        if self.replay_window == 0 || self.replay_window > MAX_REPLAY_WINDOW {
            return Err(ConfigError::InvalidReplayWindow(self.replay_window));
        }
        if self.max_payload_len == 0 || self.max_payload_len > EventMessage::MAX_CIPHERTEXT {
            return Err(ConfigError::InvalidPayloadLimit(self.max_payload_len));
        }

        if let Some(key) = &self.module_key {
            key.to_secret(self.encryption)
                .map_err(|error| ConfigError::InvalidKey {
                    context: "module".into(),
                    error,
                })?;
        }

        let mut outputs = HashSet::new();
        for route in &self.routes {
            if !outputs.insert(route.output) {
                return Err(ConfigError::DuplicateRoute(route.output));
            }
            for destination in &route.destinations {
                if destination.module == self.module_id
                    || destination.module == ModuleId::DEPLOYER
                {
                    return Err(ConfigError::InvalidDestination {
                        output: route.output,
                        module: destination.module,
                    });
                }
            }
        }

        let mut peers = HashSet::new();
        for session in &self.sessions {
            if session.peer == self.module_id
                || session.peer == ModuleId::DEPLOYER
                || !peers.insert(session.peer)
            {
                return Err(ConfigError::InvalidSession(session.peer));
            }
            session
                .key
                .to_secret(session.encryption)
                .map_err(|error| ConfigError::InvalidKey {
                    context: session.peer.to_string(),
                    error,
                })?;
        }

        Ok(())
    }

    /// Module key bound to its cipher.
    ///
    /// # Errors
    ///
    /// `MissingModuleKey` or `InvalidKey`.
    pub fn module_secret(&self) -> Result<SecretKey, ConfigError> {
        self.module_key
            .as_ref()
            .ok_or(ConfigError::MissingModuleKey)?
            .to_secret(self.encryption)
            .map_err(|error| ConfigError::InvalidKey {
                context: "module".into(),
                error,
            })
    }
}

/// Subset of the deployer's descriptor the runtime reads.
#[derive(Debug, Deserialize)]
struct Descriptor {
    modules: Vec<DescriptorModule>,
    #[serde(default)]
    connections: Vec<DescriptorConnection>,
}

#[derive(Debug, Deserialize)]
struct DescriptorModule {
    name: String,
    id: ModuleId,
    #[serde(default)]
    key: Option<HexKey>,
    #[serde(default)]
    encryption: Encryption,
    #[serde(default)]
    uuid: Option<Uuid>,
    #[serde(default)]
    inputs: HashMap<String, IoId>,
    #[serde(default)]
    outputs: HashMap<String, IoId>,
}

impl DescriptorModule {
    fn input(&self, io: &IoRef) -> Result<IoId, ConfigError> {
        self.resolve(io, &self.inputs)
    }

    fn output(&self, io: &IoRef) -> Result<IoId, ConfigError> {
        self.resolve(io, &self.outputs)
    }

    fn resolve(&self, io: &IoRef, names: &HashMap<String, IoId>) -> Result<IoId, ConfigError> {
        match io {
            IoRef::Id(id) => Ok(*id),
            IoRef::Name(name) => {
                names
                    .get(name)
                    .copied()
                    .ok_or_else(|| ConfigError::UnknownIo {
                        module: self.name.clone(),
                        name: name.clone(),
                    })
            }
        }
    }
}

/// Input or output, by numeric id or by name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IoRef {
    Id(IoId),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct DescriptorConnection {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    direct: bool,
    #[serde(default)]
    from_module: Option<String>,
    #[serde(default)]
    from_output: Option<IoRef>,
    #[serde(default)]
    from_request: Option<IoRef>,
    to_module: String,
    #[serde(default)]
    to_input: Option<IoRef>,
    #[serde(default)]
    to_handler: Option<IoRef>,
    #[serde(default)]
    encryption: Encryption,
    #[serde(default)]
    key: Option<HexKey>,
}
