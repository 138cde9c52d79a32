//! # filmstrip-core
//!
//! Derivation and caching engine for the filmstrip media server: lazily
//! renders frames, sprite sheets, VTT indexes, and trimmed clips from a
//! local movie/TV library, maintains the catalog database by scanning
//! the filesystem, and serves everything through a tiered on-disk cache.

pub mod cache;
pub mod coalesce;
pub mod config;
pub mod db;
pub mod derive;
pub mod error;
pub mod ffmpeg;
pub mod image;
pub mod info;
pub mod scanner;
pub mod timefmt;
pub mod vtt;

pub use cache::{CacheStore, SpriteFormat};
pub use config::{Config, QueueRecovery};
pub use db::Databases;
pub use derive::{
    ClipRequest, Orchestrator, SpriteArtifact, CACHE_IMMUTABLE, CACHE_SHORT,
    MAX_CLIP_SECS,
};
pub use error::{MediaError, Result};
pub use ffmpeg::Ffmpeg;
pub use image::{AvifEncoder, BlurhashService};
pub use info::InfoManager;
pub use scanner::Scanner;
