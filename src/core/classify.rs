//! Folder and file classification heuristics.
//!
//! Decides which directories are junk, subtitle stores, season bundles,
//! separate shows or collection containers.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::core::parser::{extract_year_hint, is_season_range, parse_season};
use crate::core::query::clean_series_query;
use crate::generators::folder::SPECIALS_FOLDER;
use crate::utils::chinese::{normalize_for_compare, similarity, to_halfwidth};
use crate::utils::fs::{get_extension, is_subtitle_file, is_video_file, is_within, norm_path, split_path};
use crate::{Error, Result};

/// Directories skipped by default: promo, samples, artwork, system folders, movies.
pub const DEFAULT_SKIP_DIR_REGEX: &str = r"(福利|广告|推广|促销|活动|限时福利|限时|UC官方|阿里|Promo|sample|Samples?|Extras?|花絮|特典|周边|海报|Poster|封面|截图|Thumbs|@eaDir|\.sync|lost\+found|电影|Movie|剧场版|MOVIE)";

/// Substrings that always mark a skipped directory, whatever the regex.
const SKIP_DIR_WORDS: &[&str] = &[
    "福利", "广告", "推广", "活动", "限时", "promo", "sample", "extras", "海报", "花絮", "封面", "截图",
];

/// Non-media directory names, compared lowercased.
pub const MISC_DIR_NAMES: &[&str] = &[
    "@eadir", "__macosx", ".ds_store", "sample", "samples", "screens", "screen", "screenshots",
    "extras", "extra", "bonus", "bts", "poster", "posters", "fanart", "thumb", "thumbs", "artwork",
    "cd1", "cd2", "subs", "sub", "subtitle", "subtitles", "字幕", "字幕组",
];

/// Directories holding subtitles to relocate, compared lowercased.
pub const SUBTITLE_DIR_NAMES: &[&str] = &[
    "subs", "sub", "subtitle", "subtitles", "字幕", "字幕组", "subtitles&subs",
];

/// Advertising markers in file and folder names.
pub const JUNK_MARKERS: &[&str] = &[
    "防走丢", "更多资源", "公众号", "关注", "扫码", "加群", "群号", "最新地址", "备用网址", "网址",
    "www.", "http://", "https://", "telegram", "t.me", "qq群", "qq群号",
];

/// Extensions that are always deleted as junk.
pub const JUNK_EXTENSIONS: &[&str] = &[
    ".url", ".lnk", ".html", ".htm", ".pdf", ".doc", ".docx", ".ppt", ".pptx", ".xls", ".xlsx",
];

/// Marker-named files with these extensions are kept (artwork and NFOs).
const KEEP_MARKED_EXTENSIONS: &[&str] = &[".nfo", ".jpg", ".jpeg", ".png", ".webp"];

/// Directories removed outright.
const JUNK_DIR_NAMES: &[&str] = &["@eadir", "__macosx"];

static FULL_EPISODE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"全\s*\d+\s*(?:集|话|回)").expect("valid regex"));
static PACKAGING_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^20\d{2}(?:\s*年)?$").expect("valid regex"));
static CONTAINER_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(全系列|系列|合集|全套|全集|collection|franchise)").expect("valid regex")
});
static SAME_SHOW_PACKAGING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(全集|全\s*\d+\s*(?:集|话|回)|共\s*\d+\s*(?:集|话|回)|\d+\s*(?:集|话|回))")
        .expect("valid regex")
});
static ANY_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(19\d{2}|20\d{2})").expect("valid regex"));
static COMPLETION_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(全套|全季|完整版|完结|完結|complete)").expect("valid regex"));
static SEASON_HINTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"第\s*[一二三四五六七八九十\d]+\s*季",
        r"(?i)\bSeason\s*\d{1,2}\b",
        r"(?i)(?:^|\W)S\d{1,2}(?:$|\W)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static DEFAULT_SKIP_RULES: LazyLock<SkipRules> = LazyLock::new(SkipRules::default);

/// Similarity above which two folder titles name the same show.
const SAME_SHOW_SIMILARITY: f64 = 0.93;

/// Skip rules for non-media directories.
#[derive(Debug, Clone)]
pub struct SkipRules {
    pattern: Regex,
}

impl Default for SkipRules {
    fn default() -> Self {
        Self {
            pattern: RegexBuilder::new(DEFAULT_SKIP_DIR_REGEX)
                .case_insensitive(true)
                .build()
                .expect("valid regex"),
        }
    }
}

impl SkipRules {
    /// Compile a user pattern, or the default when none is given.
    pub fn new(user_pattern: Option<&str>) -> Result<Self> {
        match user_pattern.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(Self::default()),
            Some(p) => RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map(|pattern| Self { pattern })
                .map_err(|e| Error::InvalidSkipRegex(format!("{}: {}", p, e))),
        }
    }

    /// Whether a directory should be ignored.
    pub fn should_skip(&self, name: &str) -> bool {
        if self.pattern.is_match(name) {
            return true;
        }
        let lower = name.to_lowercase();
        SKIP_DIR_WORDS.iter().any(|w| lower.contains(w))
    }
}

pub fn is_misc_dir_name(name: &str) -> bool {
    MISC_DIR_NAMES.contains(&name.trim().to_lowercase().as_str())
}

pub fn is_subtitle_dir_name(name: &str) -> bool {
    SUBTITLE_DIR_NAMES.contains(&name.trim().to_lowercase().as_str())
}

pub fn contains_junk_marker(name: &str) -> bool {
    let lower = name.to_lowercase();
    JUNK_MARKERS.iter().any(|m| lower.contains(m))
}

/// Whether a directory is junk. Subtitle and season directories never are.
pub fn is_junk_dir(name: &str) -> bool {
    if is_subtitle_dir_name(name) || parse_season(name).is_some() {
        return false;
    }
    JUNK_DIR_NAMES.contains(&name.trim().to_lowercase().as_str()) || contains_junk_marker(name)
}

/// Whether a file is junk. Plain-text files never are, and marker-named
/// videos and subtitles are left for placement to rename.
pub fn is_junk_file(name: &str) -> bool {
    let ext = get_extension(name);
    if ext == ".txt" || is_video_file(name) || is_subtitle_file(name) {
        return false;
    }
    if JUNK_EXTENSIONS.contains(&ext.as_str()) {
        return true;
    }
    contains_junk_marker(name) && !KEEP_MARKED_EXTENSIONS.contains(&ext.as_str())
}

/// Whether a folder denotes a bundle of seasons (`S1-S3`, `1-4季`).
pub fn is_season_container(name: &str) -> bool {
    is_season_range(name)
}

/// Whether a folder name looks like a standalone show rather than a season or quality folder.
///
/// `法医秦明2清道夫(2018)全20集` and `龙岭迷窟 (2020) 4K` are shows; `第二季 (2017)`,
/// `S01`, `4K` and bare packaging years are not.
pub fn looks_like_show_folder_name(name: &str) -> bool {
    let name = to_halfwidth(name);
    let name = name.trim();
    if name.is_empty() || PACKAGING_YEAR.is_match(name) {
        return false;
    }
    if parse_season(name).is_some() || DEFAULT_SKIP_RULES.should_skip(name) {
        return false;
    }
    extract_year_hint(name).is_some() || FULL_EPISODE_COUNT.is_match(name)
}

fn same_show_key(title: &str) -> String {
    let t = clean_series_query(title);
    let t = SAME_SHOW_PACKAGING.replace_all(&t, "");
    let t = ANY_YEAR.replace_all(&t, "");
    let t = COMPLETION_WORDS.replace_all(&t, "");
    let t = normalize_for_compare(&t);
    ANY_YEAR.replace_all(&t, "").into_owned()
}

/// Whether `child_name` is just another packaging folder of the show `parent_title`.
///
/// Strict: `法医秦明` and `法医秦明2` are different shows.
pub fn is_same_show_container_folder(child_name: &str, parent_title: &str) -> bool {
    let child = same_show_key(child_name);
    let parent = same_show_key(parent_title);
    if child.is_empty() || parent.is_empty() {
        return false;
    }
    child == parent || similarity(&child, &parent) >= SAME_SHOW_SIMILARITY
}

/// Whether any of the texts carries an explicit season marker (`第X季`, `Season N`, a standalone `S01`).
pub fn has_any_season_hint(texts: &[&str]) -> bool {
    let joined = texts
        .iter()
        .filter(|t| !t.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    !joined.is_empty() && SEASON_HINTS.iter().any(|re| re.is_match(&joined))
}

/// Season number of a season folder; `Specials` is season 0.
pub fn season_dir_number(name: &str) -> Option<u32> {
    if name.trim().eq_ignore_ascii_case(SPECIALS_FOLDER) {
        return Some(0);
    }
    parse_season(name)
}

/// Whether a folder name says it bundles several shows (`合集`, `系列`, `collection`).
pub fn has_container_words(name: &str) -> bool {
    CONTAINER_WORDS.is_match(name)
}

/// Longest configured root containing `path`, else the parent directory of `path`.
pub fn find_library_root(path: &str, roots: &[String]) -> String {
    let path = norm_path(path);
    roots
        .iter()
        .map(|r| norm_path(r))
        .filter(|r| is_within(&path, r))
        .max_by_key(|r| r.len())
        .unwrap_or_else(|| split_path(&path).0)
}
