//! User interaction recording.

pub mod dom;
pub mod recorder;

pub use dom::{DomEvent, DomTarget};
pub use recorder::{InteractionRecorder, InteractionSettings};
