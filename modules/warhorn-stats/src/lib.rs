pub mod config;
pub mod discovery;
pub mod sessions;

pub use config::{Cli, Config};
pub use discovery::{discover_events, DiscoveryReport, EventHandler, EventSet};
pub use sessions::{aggregate_sessions, EventSummary, ParticipantSets, SessionAggregator, SessionLine};
