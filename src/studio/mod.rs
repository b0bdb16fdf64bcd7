//! Session orchestration: phases, prompts and the state machine.

mod caption;
pub mod config;
mod orchestrator;
mod state;

pub use config::{SeedPolicy, SeedSource, StudioConfig};
pub use orchestrator::{OperationOutcome, Studio};
pub use state::{Phase, SessionError, SessionState};
