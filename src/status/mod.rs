//! Per-pane liveness and activity detection.

pub mod agent_state;
pub mod classifier;
pub mod process;

pub use agent_state::read_state_file;
pub use classifier::{classify, PaneObservation};
pub use process::{detect_liveness, ProcessSnapshot};
