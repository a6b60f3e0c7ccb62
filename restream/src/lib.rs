//! restream library crate.
//!
//! Orchestration engine for a fleet of long-running transcoder processes:
//! config resolution, lifecycle management, persistence and disk quota
//! enforcement. The transcoder itself, the filesystems and the store are
//! injected through the traits in [`transcoder`], [`fs`] and [`store`].

pub mod config;
pub mod domain;
pub mod error;
pub mod fs;
pub mod logging;
pub mod restream;
pub mod store;
pub mod transcoder;
pub mod utils;

pub use config::RestreamConfig;
pub use error::{Error, Result};
pub use restream::{Restreamer, RestreamerBuilder};
