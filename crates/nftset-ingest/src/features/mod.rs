//! Feature extraction
//!
//! - [`image`]: decoding, color mode, format and frame metadata
//! - [`stats`]: per-channel statistics, entropy and the padded histogram
//! - [`dataset`]: the wide dataset row
//! - [`assembler`]: the pass that joins events with stored images

pub mod assembler;
pub mod dataset;
pub mod image;
pub mod stats;

pub use assembler::{assemble, assemble_dataset, AssemblySummary};
pub use dataset::{DatasetRow, ImageMeta};
pub use image::{ColorMode, DecodedImage};
pub use stats::{ChannelStats, ImageStats, HISTOGRAM_LEN};
