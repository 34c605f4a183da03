use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub campaign: CampaignConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

/// Document store backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Backend type: "memory" or "postgres"
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Connection string for the postgres backend
    pub database_url: Option<String>,
    /// Maximum pool connections for the postgres backend
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

/// Push provider backend selection.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Backend type: "noop" (logs sends without dispatching)
    #[serde(default = "default_provider_backend")]
    pub backend: String,
}

/// Campaign engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CampaignConfig {
    /// Collection holding registration-token documents
    #[serde(default = "default_token_collection")]
    pub token_collection: String,
    /// Icon applied when a campaign does not specify one
    #[serde(default = "default_icon")]
    pub default_icon: String,
    /// Click action applied when a campaign does not specify one
    #[serde(default = "default_click_action")]
    pub default_click_action: String,
    /// Role required to launch campaigns
    #[serde(default = "default_admin_role")]
    pub admin_role: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8082
}

fn default_store_backend() -> String {
    "memory".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_provider_backend() -> String {
    "noop".to_string()
}

fn default_token_collection() -> String {
    "push_tokens".to_string()
}

fn default_icon() -> String {
    "/icons/icon-192x192.png".to_string()
}

fn default_click_action() -> String {
    "https://localhost/".to_string()
}

fn default_admin_role() -> String {
    "admin".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("store.backend", "memory")?
            .set_default("provider.backend", "noop")?
            .set_default("campaign.token_collection", "push_tokens")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER_HOST, SERVER_PORT, JWT_SECRET, STORE_DATABASE_URL, etc.
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            backend: default_provider_backend(),
        }
    }
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            token_collection: default_token_collection(),
            default_icon: default_icon(),
            default_click_action: default_click_action(),
            admin_role: default_admin_role(),
        }
    }
}
