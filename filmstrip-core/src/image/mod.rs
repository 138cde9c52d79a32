//! Image post-processing: sprite format decision, PNG palette
//! optimization, AVIF conversion, and blurhash generation.

mod avif;
mod blur;
mod optimize;

pub use avif::AvifEncoder;
pub use blur::BlurhashService;
pub use optimize::{optimize_png, staging_path, PngOptions};

use crate::cache::SpriteFormat;

/// Hard browser limit on decoded image height; Chrome refuses taller.
pub const CHROME_HEIGHT_LIMIT: u32 = 30_780;

/// Pixel height of one tiled sprite row.
pub const SPRITE_ROW_HEIGHT: u32 = 180;

/// AVIF when the tiled grid fits under the browser height limit and AVIF
/// is globally enabled, otherwise PNG.
pub fn decide_sprite_format(rows: u32, avif_enabled: bool) -> SpriteFormat {
    if avif_enabled && rows * SPRITE_ROW_HEIGHT <= CHROME_HEIGHT_LIMIT {
        SpriteFormat::Avif
    } else {
        SpriteFormat::Png
    }
}
