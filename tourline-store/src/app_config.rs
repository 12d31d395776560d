use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Payment provider credentials. `key_id`/`key_secret` authenticate the
/// order API; `webhook_secret` signs both the browser callback and the
/// server webhook.
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub key_id: String,
    pub key_secret: String,
    pub webhook_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// How long a PENDING booking may hold seats before the sweeper
    /// releases them.
    #[serde(default = "default_reservation_timeout")]
    pub reservation_timeout_seconds: u64,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Bookings above this amount require a PAN on the contact.
    #[serde(default = "default_pan_threshold")]
    pub pan_threshold_cents: i64,
}

fn default_reservation_timeout() -> u64 {
    30 * 60
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_pan_threshold() -> i64 {
    20_000_000
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Add in the current environment file (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables with a TOURLINE prefix,
            // e.g. TOURLINE__GATEWAY__KEY_SECRET
            .add_source(config::Environment::with_prefix("TOURLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
