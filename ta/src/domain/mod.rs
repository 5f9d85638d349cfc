//! Domain types for the task console
//!
//! WorkItem (what is browsed), ArtifactBundle (what the engine produces)
//! and ExecutionOutcome (how one execution ended).

mod artifact;
mod priority;
mod work_item;

pub use artifact::{ArtifactBundle, ExecutionOutcome, OutputFile};
pub use priority::Priority;
pub use work_item::WorkItem;
