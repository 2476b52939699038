#![doc = include_str!("../README.md")]

mod adapter;
#[cfg(feature = "deepfilter")]
mod deepfilter;
#[cfg(feature = "download-model")]
mod download;
mod error;
mod fifo;
pub mod meter;
mod model;
mod processor;
mod resampler;

pub use adapter::FrameAdapter;
#[cfg(feature = "deepfilter")]
pub use deepfilter::*;
#[cfg(feature = "download-model")]
pub use download::{Manifest, ModelMetadata, download};
pub use error::*;
pub use fifo::FrameFifo;
pub use model::*;
pub use processor::*;
pub use resampler::*;
