#![forbid(unsafe_code)]

//! Single-flight loading of stream fragments, whole or as low-latency parts.

mod chain;
mod context;
mod loaded;
mod loader;
mod watchdog;

pub mod config;
pub mod error;
pub mod fragment;
pub mod parts;
pub mod stats;

pub use config::FragmentLoaderConfig;
pub use error::{ErrorDetails, ErrorType, FragResult, LoadError};
pub use fragment::{Fragment, LevelDetails, Part};
pub use loaded::{FragmentLoaded, LoadedData, ProgressCallback};
pub use loader::FragmentLoader;
pub use parts::{ChainStep, find_independent_part};
pub use stats::merge_part_stats;

pub use fragload_net as net;
