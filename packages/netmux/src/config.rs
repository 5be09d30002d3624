use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

// =============================================================================
// Relay config (figment-deserialized from defaults / netmux.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   netmux.toml:     chunk_size = 512
//
//   env var:         NETMUX_CHUNK_SIZE=512
//
//   CLI flag:        --chunk-size 512   (applied by the binary, wins over both)

/// Largest accepted `chunk_size`. The read buffer is allocated once at this size.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Tunables for one relay run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Upper bound for every individual read, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pending-connection queue length handed to `listen`.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Bind only this address. `None` means the dual-stack wildcard.
    #[serde(default)]
    pub host: Option<IpAddr>,
    /// Write operator input to the child instead of discarding it.
    #[serde(default)]
    pub forward_operator_input: bool,
    /// Copy child output to the operator's output as well as the active client.
    #[serde(default = "default_echo_child_output")]
    pub echo_child_output: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            backlog: default_backlog(),
            host: None,
            forward_operator_input: false,
            echo_child_output: default_echo_child_output(),
        }
    }
}

impl RelayConfig {
    /// Reject values the event loop cannot run with.
    pub fn validate(self) -> Result<Self, String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(format!(
                "chunk_size must be at most {MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            ));
        }
        if self.backlog == 0 {
            return Err("backlog must be greater than zero".to_string());
        }
        Ok(self)
    }
}

fn default_chunk_size() -> usize {
    256
}
fn default_backlog() -> u32 {
    10
}
fn default_echo_child_output() -> bool {
    true
}

/// Build a figment that layers: defaults → config file (if any) → NETMUX_* env vars.
pub fn load_config(config_file: Option<&Path>) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    let mut figment = Figment::from(Serialized::defaults(RelayConfig::default()));
    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(Env::prefixed("NETMUX_"))
}
