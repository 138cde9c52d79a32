//! Chapter VTT derivation.

use super::Orchestrator;
use crate::error::{MediaError, Result};
use crate::vtt::chapters_vtt;
use filmstrip_model::MediaTarget;
use std::collections::BTreeMap;
use tracing::{debug, warn};

impl Orchestrator {
    /// Chapter track for one video, or `NotFound` when the container
    /// exposes no chapters.
    pub async fn get_chapters(&self, target: &MediaTarget) -> Result<String> {
        let (path, media_info) = self.resolve_with_info(target).await?;

        let chapters = self.ffmpeg.extract_chapters(&path).await?;
        if chapters.is_empty() {
            debug!("No chapters in {}", path.display());
            return Err(MediaError::NotFound(
                "Chapter information not found".to_string(),
            ));
        }

        let duration = media_info.length as f64 / 1000.0;
        Ok(chapters_vtt(&chapters, duration))
    }

    /// Chapter tracks for every episode of a show that has them, keyed
    /// `SxxEyy`. Episodes without chapters are omitted.
    pub async fn get_show_chapters(
        &self,
        show: &str,
    ) -> Result<BTreeMap<String, String>> {
        let db = self.dbs.media().await?;
        let repo = crate::db::CatalogRepo::new(db);
        let record = repo.get_show(show).await?.ok_or_else(|| {
            MediaError::NotFound(format!("show '{show}'"))
        })?;

        let mut tracks = BTreeMap::new();
        for (season_name, entry) in &record.seasons {
            let Some(season) =
                crate::scanner::episodes::parse_season_dir(season_name)
            else {
                continue;
            };
            for data in entry.urls.values() {
                let episode = data.episode_number;
                let target = MediaTarget::Episode {
                    show: show.to_string(),
                    season,
                    episode,
                };
                match self.get_chapters(&target).await {
                    Ok(vtt) => {
                        tracks
                            .insert(format!("S{season:02}E{episode:02}"), vtt);
                    }
                    Err(MediaError::NotFound(_)) => {}
                    Err(e) => {
                        warn!(
                            "Skipping chapters for {show} S{season:02}E{episode:02}: {e}"
                        );
                    }
                }
            }
        }
        Ok(tracks)
    }
}
