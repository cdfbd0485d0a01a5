//! TOML file configuration structures.
//!
//! These structs directly map to the `yabot-config.toml` file format.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use yabot_core::config::{EconomyConfig, SweeperConfig};

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub economy: EconomyConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().expect("valid default address")
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin secret. If this is plaintext (doesn't start with `$argon2`),
    /// it will be hashed and the config file will be rewritten.
    pub secret: String,
}

/// Notification gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// URL the notifier POSTs event envelopes to. Unset disables the
    /// notifier entirely.
    #[serde(default)]
    pub gateway_url: Option<String>,
}

impl FileConfig {
    /// Check if the admin secret is already hashed (argon2 format).
    pub fn is_admin_secret_hashed(&self) -> bool {
        self.admin.secret.starts_with("$argon2")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[admin]
secret = "test-secret"

[notifier]
gateway_url = "https://bot.example.com/events"

[economy]
daily_gift_amount = 20
reaction_bonus = 3

[sweeper]
sweep_interval_secs = 30
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap_or_else(|e| {
            panic!("config should parse: {e}");
        });
        assert_eq!(config.server.listen.port(), 3000);
        assert!(!config.is_admin_secret_hashed());
        assert_eq!(config.economy.daily_gift_amount, 20);
        assert_eq!(config.economy.story_mission_threshold, 3);
        assert_eq!(config.sweeper.sweep_interval_secs, 30);
        assert_eq!(
            config.notifier.gateway_url.as_deref(),
            Some("https://bot.example.com/events")
        );
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let toml_str = r#"
[server]

[admin]
secret = "$argon2id$v=19$m=19456,t=2,p=1$abc$def"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap_or_else(|e| {
            panic!("config should parse: {e}");
        });
        assert!(config.is_admin_secret_hashed());
        assert_eq!(config.server.listen.port(), 8080);
        assert!(config.notifier.gateway_url.is_none());
        assert_eq!(config.economy.daily_gift_amount, 10);
        assert_eq!(config.sweeper.sweep_interval_secs, 60);
    }
}
