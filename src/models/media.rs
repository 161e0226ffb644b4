//! Media data models.

use serde::{Deserialize, Serialize};

/// One child of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    /// Create a file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    /// Create a directory entry.
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// One result of a server-side name search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Directory holding the match.
    pub parent: String,
    pub name: String,
    pub is_dir: bool,
}

/// Season/episode facts parsed from a single name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NameFacts {
    /// Season number, if the name carries one.
    pub season: Option<u32>,
    /// Episode number, if one could be inferred.
    pub episode: Option<u32>,
    /// The name already carries an explicit `SxxEyy` or `NxM` marker.
    pub already_tagged: bool,
    /// Space-separated quality tokens, for display only.
    pub quality_tail: String,
}

/// One catalog search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataCandidate {
    pub id: u64,
    pub name: String,
    pub original_name: String,
    pub first_air_year: Option<i32>,
    pub popularity: f64,
}

/// Authoritative details for one catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDetail {
    pub title: String,
    /// `YYYY-MM-DD` as returned by the catalog, possibly empty.
    pub first_air_date: Option<String>,
}

/// The canonical identity chosen for a series folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSeries {
    pub id: u64,
    pub title: String,
    pub year: Option<i32>,
    /// Season implied by the original folder name (e.g. `第四季`).
    pub season_hint: Option<u32>,
}

impl ResolvedSeries {
    /// Display name used for the series folder and every episode file.
    pub fn canonical_name(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }
}

/// Lightweight hints gathered from a series folder before resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SeriesContext {
    pub year_hint: Option<i32>,
    pub english_title: Option<String>,
    pub sample_files: Vec<String>,
    pub max_episode: Option<u32>,
    pub episode_file_count: Option<usize>,
    /// Caller-supplied extra search queries.
    #[serde(skip)]
    pub extra_queries: Vec<String>,
}

/// A planned episode assignment for a file without explicit numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedEpisode {
    pub season: u32,
    pub episode: u32,
    pub is_special: bool,
}

/// Parse the year out of a `YYYY-MM-DD` style date.
pub fn year_of_date(date: &str) -> Option<i32> {
    let head = date.get(..4)?;
    if head.chars().all(|c| c.is_ascii_digit()) {
        head.parse().ok()
    } else {
        None
    }
}
