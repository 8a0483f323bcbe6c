pub mod settings;

pub use settings::{
    HealthConfig, KeyLogStrategy, LoggingConfig, ModelSeed, ProviderSeed, RoutingConfig,
    ServerConfig, Settings,
};
