// Infrastructure layer (shared components)
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod store;

// Domain layer (business logic)
pub mod campaign;
pub mod iterator;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod telemetry;
