//! Continuous ingestion of upstream search results.
//!
//! Each cycle fetches everything published after the [`Watermark`], stages the
//! videos not yet stored, commits them in one transaction and only then moves the
//! watermark forward.

mod batch;
mod ingestion_loop;
mod watermark;

pub use batch::{parse_item, prepare_batch, ItemMalformed, MalformedItem, PreparedBatch};
pub use ingestion_loop::{
    CycleOutcome, CycleReport, IngestionLoop, IngestionSettings, LoopState,
};
pub use watermark::Watermark;
