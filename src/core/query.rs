//! Search query cleanup for messy series folder names.

use std::sync::LazyLock;

use regex::Regex;

use crate::utils::chinese::{normalize_spaces, to_halfwidth};

static LEADING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]{1,60}\]\s*").expect("valid regex"));
static SEASON_BUNDLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:全\d+季|\d+\s*Season|S\d{1,2}-S\d{1,2}|\d{1,2}-\d{1,2}季|\d{1,2}季合集|合集)\s*")
        .expect("valid regex")
});
static PACKAGING_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+\d{1,2}\s*(?:附带|含|带)\s*\d{1,2}\s*[-~—–]\s*\d{1,2}.*$").expect("valid regex")
});
static TRAILING_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\D)\d{1,2}\s*[-~—–]\s*\d{1,2}\s*$").expect("valid regex")
});
static SHORT_EDITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|[^A-Za-z])(?:OVA|SP)($|[^A-Za-z])").expect("valid regex"));
static TAGS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:中英双字|中英字幕|中字|双字|双语|国语|粤语|英语|日语|韩语|无删减|未删减|删减|精修|修复|高码率|高码|收藏版|剧场版|特典|花絮|完整版)",
        r"(?i)\b(?:2160p|1080p|720p|480p|4k|8k)\b",
        r"(?i)\b(?:web[-_. ]?dl|webrip|bluray|bdrip|hdrip|remux|x26[45]|hevc|avc|h\.264|h\.265)\b",
        r"(?i)\b(?:dv|dolby\s*vision|hdr10\+?|hdr)\b",
        r"(?i)\b(?:aac|ac-?3|ddp?|truehd|dts(?:-?hd)?)\b",
        r"(?i)\b(?:atvp|nf|amzn|hmax|dsnp|hulu)\b",
        r"(?i)\b(?:10bit|8bit)\b",
        r"(?i)\b(?:proper|repack|extended|uncut)\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static SEASON_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+第[一二三四五六七八九十\d]{1,3}季\b").expect("valid regex"));
static TRAILING_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*[\(\[（]?\s*(19\d{2}|20\d{2})\s*[\)\]）]?\s*$").expect("valid regex")
});

static BAD_QUERIES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^s\d{1,2}$",
        r"(?i)^season\s*\d{1,2}$",
        r"(?i)^e\d{1,3}$",
        r"(?i)^s\d{1,2}e\d{1,3}$",
        r"^20\d{2}$",
        r"^20\d{2}\s*年$",
        r"^\d{1,4}$",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Turn a messy folder name into a title-only search string.
///
/// Strips release tags, season bundles (`全3季`, `S1-S3`, `1-6季合集`), packaging
/// notes, quality/codec/audio/source/language/edition tags, a trailing season
/// suffix and a trailing year. Meaningful title punctuation is kept.
pub fn clean_series_query(folder_name: &str) -> String {
    let mut s = normalize_spaces(&to_halfwidth(folder_name));

    s = LEADING_TAG.replace(&s, "").into_owned();
    s = SEASON_BUNDLE.replace_all(&s, " ").into_owned();
    s = PACKAGING_TAIL.replace(&s, " ").into_owned();
    s = TRAILING_RANGE.replace(&s, "${1} ").into_owned();

    for re in TAGS.iter() {
        s = re.replace_all(&s, " ").into_owned();
    }
    s = SHORT_EDITION.replace_all(&s, "${1} ${2}").into_owned();

    s = SEASON_SUFFIX.replace(&s, "").into_owned();
    s = TRAILING_YEAR.replace(&s, "").into_owned();

    normalize_spaces(&s)
        .trim_matches(|c| matches!(c, '-' | '_' | '.' | ' '))
        .to_string()
}

/// Degenerate queries that must never reach the catalog: empty, a single
/// character, a bare season/episode token, a bare year or a bare number.
pub fn is_bad_query(query: &str) -> bool {
    let q = normalize_spaces(&to_halfwidth(query));
    if q.chars().count() <= 1 {
        return true;
    }
    BAD_QUERIES.iter().any(|re| re.is_match(&q))
}
