//! Background thumbnail generation.

pub mod generator;
pub mod worker;

pub use generator::{
    CommandThumbnailer, ThumbnailError, ThumbnailGenerator, ToolPaths,
    seek_offset_seconds,
};
pub use worker::{CycleReport, ThumbnailWorker, WorkerConfig};
