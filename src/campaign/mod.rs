//! Push campaign fan-out.
//!
//! Builds notification messages from a validated campaign spec, streams
//! matching registration tokens through the collection iterator, sends
//! each batch through the push provider, and self-heals the token
//! registry by deleting registrations the provider reports as
//! permanently dead.

mod engine;
mod types;

pub use engine::{CampaignEngine, EngineStats, EngineStatsSnapshot, FAN_OUT_BATCH_SIZE};
pub use types::{Caller, CampaignAggregate, FilterSpec, NotificationDraft, NotificationSpec};
