//! Report section data structures.

pub mod console;
pub mod environment;
pub mod error;
pub mod flow;
pub mod metadata;
pub mod timeline;
pub mod trigger;

pub use console::{ConsoleLevel, ConsoleLine};
pub use environment::{
    format_bytes, Capability, ConnectionInfo, MemoryInfo, ResourceCounts, ResourceKind,
    RuntimeSnapshot, TimingInfo, ViewportInfo,
};
pub use error::{CallSite, ErrorSection};
pub use flow::{FlowSection, NO_FLOW_DATA};
pub use metadata::ReportMetadata;
pub use timeline::TimelineSection;
pub use trigger::{ApiFailure, TriggerSection};
