//! Test-mode session control.
//!
//! One session owns one capture device and one countdown at a time; all
//! intents funnel through the controller task so ordering is structural
//! rather than lock-based.

pub mod controller;

pub use controller::{SessionHandle, SessionPhase, SessionSnapshot};
