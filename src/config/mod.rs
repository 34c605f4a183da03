mod settings;

pub use settings::{
    CampaignConfig, JwtConfig, ProviderConfig, ServerConfig, Settings, StoreConfig,
};
