//! Filename generator.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::parser::{normalize_quality_tail, strip_release_tag};
use crate::models::media::DirEntry;
use crate::utils::chinese::{normalize_spaces, to_halfwidth};
use crate::utils::fs::{is_subtitle_file, split_ext};

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).expect("valid regex"));
static RESOLUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(4320|2160|1440|1080|720|576|540|480)p\b").expect("valid regex")
});
static SXXEYY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S(\d{1,2})\s*E(\d{1,3})").expect("valid regex"));
static BARE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:S\d{1,2}\s*E\d{1,3}|\d{1,2}\s*x\s*\d{1,3})(?:\b|$)").expect("valid regex")
});
static EPISODE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:S\d{1,2}\s*E\d{1,3}|\bE\d{1,3}\b)").expect("valid regex")
});
static LANG_TOKEN_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s._\-\[\](){}]+").expect("valid regex"));
static FLAG_TOKEN_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\W_]+").expect("valid regex"));
static REGIONAL_LANG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]{2})-[a-z]{2}$").expect("valid regex"));

/// ISO 639-1 codes accepted as subtitle language tags.
const COMMON_LANGS: &[&str] = &[
    "en", "zh", "ja", "ko", "fr", "de", "es", "it", "ru", "pt", "ar", "nl", "sv", "no", "da", "fi",
    "pl", "cs", "hu", "tr", "th", "vi", "id", "ms", "he", "el", "uk", "ro", "bg", "hr", "sr", "sk",
    "sl", "et", "lv", "lt", "fa", "ur",
];

/// Aliases mapped to the tag written into sidecar names.
const LANG_ALIASES: &[(&str, &str)] = &[
    ("eng", "en"),
    ("chs", "chs"),
    ("sc", "chs"),
    ("zhcn", "chs"),
    ("gb", "chs"),
    ("简体", "chs"),
    ("cht", "cht"),
    ("tc", "cht"),
    ("zhtw", "cht"),
    ("big5", "cht"),
    ("繁体", "cht"),
    ("chi", "zh"),
    ("zho", "zh"),
    ("jpn", "ja"),
    ("jp", "ja"),
    ("kor", "ko"),
    ("kr", "ko"),
    ("spa", "es"),
    ("fra", "fr"),
    ("deu", "de"),
    ("ita", "it"),
    ("rus", "ru"),
    ("por", "pt"),
    ("ptbr", "pt-br"),
    ("pt-br", "pt-br"),
    ("ara", "ar"),
];

/// Chinese hints matched anywhere in a subtitle name.
const CJK_LANG_HINTS: &[(&str, &str)] = &[
    ("简体", "chs"),
    ("简中", "chs"),
    ("繁体", "cht"),
    ("繁中", "cht"),
    ("中英", "chs"),
    ("双语", "chs"),
];

/// Replace characters the remote filesystem rejects and tidy whitespace.
pub fn safe_filename(name: &str) -> String {
    normalize_spaces(&UNSAFE_CHARS.replace_all(name, " "))
}

/// Canonical resolution for a name: an explicit `NNNNp` wins, then `8K`, then `4K`/`UHD`.
pub fn extract_resolution(text: &str) -> Option<String> {
    if let Some(caps) = RESOLUTION.captures(text) {
        return Some(format!("{}p", &caps[1]));
    }
    let low = to_halfwidth(text).to_lowercase();
    if low.contains("8k") {
        Some("4320p".to_string())
    } else if low.contains("4k") || low.contains("uhd") {
        Some("2160p".to_string())
    } else {
        None
    }
}

/// Canonical episode filename: `{series} - SxxEyy[ - {resolution}]{ext}`.
///
/// `context` carries extra text (quality tail, folder names) searched for a
/// resolution after the old name itself.
pub fn episode_file_name(
    series: &str,
    season: u32,
    episode: u32,
    old_name: &str,
    context: &str,
) -> String {
    let ext = split_ext(old_name).1;
    let mut base = format!("{} - S{:02}E{:02}", series, season, episode);
    if let Some(res) = extract_resolution(&format!("{} {}", old_name, context)) {
        base.push_str(" - ");
        base.push_str(&res);
    }
    format!("{}{}", safe_filename(&base), ext)
}

/// Whether a tagged name is a bare `SxxEyy...`/`NxM...` without the series title.
pub fn needs_series_prefix(file_name: &str, series: &str) -> bool {
    if file_name.is_empty() || series.is_empty() {
        return false;
    }
    let stem = strip_release_tag(split_ext(file_name).0);
    if stem.to_lowercase().contains(&series.to_lowercase()) {
        return false;
    }
    BARE_MARKER.is_match(&stem)
}

/// `S01E01.2160p.mkv` → `{series} - S01E01.2160p.mkv`, keeping whatever follows the marker.
pub fn prefixed_episode_file_name(series: &str, season: u32, episode: u32, old_name: &str) -> String {
    let (stem, ext) = split_ext(old_name);
    let stem = strip_release_tag(stem);
    let remainder = SXXEYY
        .find(&stem)
        .map(|m| stem[m.end()..].trim_end().to_string())
        .unwrap_or_default();

    let mut remainder = normalize_quality_tail(&remainder);
    if remainder
        .chars()
        .next()
        .is_some_and(|c| !matches!(c, ' ' | '.' | '_' | '-'))
    {
        remainder.insert_str(0, " - ");
    }
    let base = format!("{} - S{:02}E{:02}{}", series, season, episode, remainder);
    format!("{}{}", safe_filename(&base), ext)
}

fn normalize_lang_token(token: &str) -> Option<String> {
    let t = token.trim().to_lowercase().replace('_', "-");
    if t.is_empty() {
        return None;
    }
    if let Some((_, tag)) = LANG_ALIASES.iter().find(|(alias, _)| *alias == t) {
        return Some(tag.to_string());
    }
    if let Some(rest) = t.strip_prefix("zh-") {
        return Some(
            if rest.contains("hans") || rest == "cn" {
                "chs"
            } else if rest.contains("hant") || rest == "tw" {
                "cht"
            } else {
                "zh"
            }
            .to_string(),
        );
    }
    if let Some(caps) = REGIONAL_LANG.captures(&t) {
        let base = &caps[1];
        if COMMON_LANGS.contains(&base) {
            return Some(base.to_string());
        }
    }
    COMMON_LANGS.contains(&t.as_str()).then_some(t)
}

/// Language tag and `forced`/`sdh` flags carried by a subtitle name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTags {
    pub language: Option<String>,
    pub forced: bool,
    pub sdh: bool,
}

/// Detect the subtitle language and flags.
///
/// Only the part of the stem after the video stem (or after the episode
/// marker) is inspected, so words of the title are never read as languages.
pub fn detect_subtitle_tags(subtitle_name: &str, video_stem: &str) -> SubtitleTags {
    let stem = split_ext(subtitle_name).0.to_lowercase();
    let video_stem = video_stem.to_lowercase();
    let low = match stem.strip_prefix(video_stem.as_str()) {
        Some(rest) if !video_stem.is_empty() => rest,
        _ => match EPISODE_MARKER.find(&stem) {
            Some(m) => &stem[m.end()..],
            None => &stem,
        },
    };

    let flag_tokens: Vec<&str> = FLAG_TOKEN_SPLIT.split(low).collect();
    let mut tags = SubtitleTags {
        language: None,
        forced: low.contains("forced"),
        sdh: flag_tokens
            .iter()
            .any(|t| matches!(*t, "sdh" | "cc" | "hi"))
            || low.contains("hearing"),
    };

    if let Some((_, tag)) = CJK_LANG_HINTS.iter().find(|(hint, _)| low.contains(hint)) {
        tags.language = Some(tag.to_string());
        return tags;
    }

    let dashed = low.replace('_', "-");
    for (combined, tag) in [
        ("zh-hant", "cht"),
        ("zh-tw", "cht"),
        ("zh-hans", "chs"),
        ("zh-cn", "chs"),
        ("pt-br", "pt-br"),
    ] {
        let bounded = dashed.match_indices(combined).any(|(idx, _)| {
            let before = dashed[..idx].chars().next_back();
            let after = dashed[idx + combined.len()..].chars().next();
            !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
        });
        if bounded {
            tags.language = Some(tag.to_string());
            return tags;
        }
    }

    tags.language = LANG_TOKEN_SPLIT
        .split(low)
        .filter(|t| !matches!(*t, "forced" | "sdh" | "cc" | "hi"))
        .find_map(normalize_lang_token);
    tags
}

/// New sidecar name: the video's new stem, then language, `forced`, `sdh`, then the lowercased extension.
pub fn sidecar_file_name(new_video_stem: &str, old_sidecar: &str, old_video_stem: &str) -> String {
    let ext = split_ext(old_sidecar).1.to_lowercase();
    if !is_subtitle_file(old_sidecar) {
        return safe_filename(&format!("{}{}", new_video_stem, ext));
    }

    let tags = detect_subtitle_tags(old_sidecar, old_video_stem);
    let mut parts = vec![new_video_stem.to_string()];
    parts.extend(tags.language);
    if tags.forced {
        parts.push("forced".to_string());
    }
    if tags.sdh {
        parts.push("sdh".to_string());
    }
    safe_filename(&format!("{}{}", parts.join("."), ext))
}

/// Subtitle files in `entries` that belong to `video_name` (season `season`, episode `episode`).
///
/// A subtitle matches when its stem equals the video stem, `sXXeYY`, `eYY` or
/// `YY`, contains `sXXeYY` or `eYY`, or starts with the two-digit episode.
pub fn related_sidecars(entries: &[DirEntry], video_name: &str, season: u32, episode: u32) -> Vec<String> {
    let video_stem = split_ext(video_name).0.to_lowercase();
    let sxxeyy = format!("s{:02}e{:02}", season, episode);
    let eyy = format!("e{:02}", episode);
    let yy = format!("{:02}", episode);

    let mut out: Vec<String> = entries
        .iter()
        .filter(|e| !e.is_dir && is_subtitle_file(&e.name))
        .filter(|e| {
            let stem = split_ext(&e.name).0.to_lowercase();
            if stem == video_stem || stem == sxxeyy || stem == eyy || stem == yy {
                return true;
            }
            if stem.contains(&sxxeyy) || stem.contains(&eyy) {
                return true;
            }
            let lead = stem.trim_start();
            lead.strip_prefix(&yy)
                .is_some_and(|rest| !rest.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_'))
        })
        .map(|e| e.name.clone())
        .collect();
    out.sort();
    out.dedup();
    out
}

/// `desired` with ` (n)` inserted before the extension (or appended, for directories).
pub fn numbered_name(desired: &str, n: u32, is_dir: bool) -> String {
    let (stem, ext) = if is_dir { (desired, "") } else { split_ext(desired) };
    format!("{} ({}){}", stem, n, ext)
}
