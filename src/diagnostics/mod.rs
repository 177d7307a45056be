//! Serializable run report for one sheet.
//!
//! [`RunSummary`] is the main entry point: it is built by the extractor,
//! optionally extended with export results, and written as camelCase JSON
//! next to the exported assets.

pub mod pipeline;
pub mod timing;
pub mod warnings;

pub use pipeline::{BackgroundStage, InputDescriptor, MaskStage, RegionStage, RunSummary};
pub use timing::{StageTiming, TimingBreakdown};
pub use warnings::Warning;
