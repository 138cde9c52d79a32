//! Core data model definitions shared across filmstrip crates.

pub mod catalog;
pub mod info;
pub mod media;
pub mod process;

pub use catalog::{
    EpisodeData, ImageRef, MissingDataRecord, MovieRecord, MovieUrls,
    SeasonEntry, ShowRecord, SubtitleTrack,
};
pub use info::MediaInfo;
pub use media::{HdrFormat, MediaTarget, MediaType};
pub use process::{ProcessRecord, ProcessStatus};
