//! Per-user anime/manga statistics carried by backups.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

/// The two tracked categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Anime,
    Manga,
}

impl Category {
    pub fn title(&self) -> &'static str {
        match self {
            Category::Anime => "Anime",
            Category::Manga => "Manga",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Category::Anime => "anime",
            Category::Manga => "manga",
        }
    }
}

/// Counters for one category. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    #[serde(default, deserialize_with = "lenient")]
    pub total_entries: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub episodes_watched: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub chapters_read: Option<u64>,
    #[serde(default, deserialize_with = "lenient")]
    pub volumes_read: Option<u64>,
    /// 0 means "no score data"
    #[serde(default, deserialize_with = "lenient")]
    pub mean_score: Option<f64>,
    /// Free-form status label -> count, in server order. Counts are not validated.
    #[serde(default, rename = "status", alias = "statusBreakdown", deserialize_with = "status_map")]
    pub status_breakdown: Map<String, Value>,
}

fn status_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient::<D, Map<String, Value>>(deserializer)?.unwrap_or_default())
}

/// Latest-backup or per-backup statistics. `GET /latest-stats` returns `{}`
/// when no backup exists, which decodes with every field absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default, deserialize_with = "lenient")]
    pub anime: Option<CategoryStats>,
    #[serde(default, deserialize_with = "lenient")]
    pub manga: Option<CategoryStats>,
    #[serde(default, deserialize_with = "lenient")]
    pub username: Option<String>,
    #[serde(default, alias = "lastUpdated", deserialize_with = "lenient")]
    pub last_updated: Option<String>,
}

impl StatsSnapshot {
    pub fn category(&self, category: Category) -> Option<&CategoryStats> {
        match category {
            Category::Anime => self.anime.as_ref(),
            Category::Manga => self.manga.as_ref(),
        }
    }
}
