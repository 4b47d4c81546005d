//! snspulse - engagement metric extraction engine.
//!
//! Extracts public engagement metrics (followers, latest-post date, views,
//! likes, saves) for social media accounts across platforms that expose
//! data through very different channels: server-rendered JSON blobs, raw
//! DOM text, an official statistics API, or login-gated pages.

pub mod browser;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod governor;
pub mod model;
pub mod monitor;
pub mod normalize;
pub mod retry;
pub mod session;

pub use config::Settings;
pub use engine::Engine;
pub use error::Error;
pub use model::{Platform, Snapshot};

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
