//! Name parser.
//!
//! Pure functions that pull season, episode, date and quality facts out of
//! arbitrary folder and file names. Nothing here touches the network or the
//! filesystem, and nothing here fails: unknown facts are `None`.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::media::NameFacts;
use crate::utils::chinese::{chinese_to_int, normalize_spaces, to_halfwidth};
use crate::utils::fs::{is_subtitle_file, is_video_file, split_ext};

static SXXEYY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)S(\d{1,2})\s*E(\d{1,3})").expect("valid regex"));
static NXM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})\s*x\s*(\d{1,3})\b").expect("valid regex"));
static EP_NUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:EP|E)(\d{1,3})\b").expect("valid regex"));
static CN_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第\s*([一二三四五六七八九十\d]{1,4})\s*(?:集|话|回)").expect("valid regex")
});
static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,3})(?:\D|$)").expect("valid regex"));
static TOKEN_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s._\-]").expect("valid regex"));

static RELEASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[[^\]]+\]\s*").expect("valid regex"));
static CJK_RELEASE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[【\[][^】\]]+[】\]]\s*").expect("valid regex"));

static CN_SEASON_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:第\s*)?\d{1,2}\s*[-~—–]\s*\d{1,2}\s*季").expect("valid regex")
});
static S_SEASON_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bS\d{1,2}\s*[-~—–]\s*S?\d{1,2}\b").expect("valid regex")
});

static SEASON_PATTERNS: LazyLock<Vec<(Regex, bool)>> = LazyLock::new(|| {
    // (pattern, capture is a Chinese numeral)
    [
        (r"(?i)(?:^|[^A-Za-z0-9])S(\d{1,2})(?:$|[^A-Za-z0-9])", false),
        (r"(?i)\bSeason\s*(\d{1,2})\b", false),
        (r"第\s*([一二三四五六七八九十\d]+)\s*季", true),
        (r"\b(\d{1,2})\s*季\b", false),
        (r"第\s*([一二三四五六七八九十\d]+)\s*部", true),
        (r"\b(\d{1,2})\s*部\b", false),
        (
            r"(?:^|\D)(\d{1,2})\s*(?:附带|含|带)\s*\d{1,2}\s*[-~—–]\s*\d{1,2}",
            false,
        ),
    ]
    .into_iter()
    .map(|(p, cn)| (Regex::new(p).expect("valid regex"), cn))
    .collect()
});

static DATE8: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(20\d{2})(0[1-9]|1[0-2])(0[1-9]|[12]\d|3[01])(?:$|\D)")
        .expect("valid regex")
});
static DATE_SEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\D)(20\d{2})[.\-_](\d{1,2})[.\-_](\d{1,2})(?:$|\D)").expect("valid regex")
});
static PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第\s*([一二三四五六七八九十\d]{1,4})\s*期").expect("valid regex")
});
static YEAR_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(19\d{2}|20\d{2})").expect("valid regex"));

static QUALITY_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    // Display form per token; an empty display keeps the matched text.
    [
        (r"\b4k\b", "4K"),
        (r"\b2160p\b", "2160p"),
        (r"\b1080p\b", "1080p"),
        (r"\b720p\b", "720p"),
        (r"\bhdr10\+?\b", ""),
        (r"\bhdr\b", "HDR"),
        (r"\bdv\b", "DV"),
        (r"dolby\s*vision", "DolbyVision"),
        (r"web[- ]?dl", "WEB-DL"),
        (r"webrip", "WEBRIP"),
        (r"bluray", "BluRay"),
        (r"bdrip", "BDRip"),
        (r"remux", "REMUX"),
        (r"hevc", "HEVC"),
        (r"x265", "x265"),
        (r"h265", "H265"),
        (r"x264", "x264"),
        (r"h264", "H264"),
        (r"truehd", "TrueHD"),
        (r"dts[- ]?hd", "DTS-HD"),
        (r"\bdts\b", "DTS"),
        (r"\baac\b", "AAC"),
        (r"\batmos\b", "Atmos"),
        (r"\bnf\b", "NF"),
        (r"\bamzn\b", "AMZN"),
        (r"\bhmax\b", "HMAX"),
        (r"\b中字\b", "中字"),
        (r"\b双语\b", "双语"),
        (r"\b国配\b", "国配"),
        (r"\b国语\b", "国语"),
        (r"\b粤语\b", "粤语"),
        (r"\b中英\b", "中英"),
    ]
    .into_iter()
    .map(|(p, display)| (Regex::new(p).expect("valid regex"), display))
    .collect()
});

static RESOLUTION_CASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{3,4})p\b").expect("valid regex"));
static RESOLUTION_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:\d+k|\d{3,4}[pi])\b").expect("valid regex"));
static FOUR_K: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(^|[^A-Za-z0-9])4k($|[^A-Za-z0-9])").expect("valid regex"));
static DOLBY_VISION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)dolby\s+vision").expect("valid regex"));
static HDR_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(dolbyvision|dolby|hdr10\+|hdr10|hdr|dovi|dv|uhd)\b").expect("valid regex")
});

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\[\(【].*?[\]\)】]").expect("valid regex"));
static ENGLISH_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)(?:S\d{1,2}\s*E\d{1,3}|\d{1,2}\s*x\s*\d{1,3}|(?:^|[\s._\-])E\d{1,3}\b)")
        .expect("valid regex")
});
static STANDALONE_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid regex"));
static ENGLISH_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(720p|1080p|2160p|4k|web[- ]?dl|webrip|blu[- ]?ray|hdr|dv|dovi|atmos|ddp|aac|dts|truehd|x264|x265|h\.?264|h\.?265)\b",
    )
    .expect("valid regex")
});
static NON_ENGLISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 ']+").expect("valid regex"));
static ENGLISH_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ']+$").expect("valid regex"));

/// Markers that route a file to season 0.
const SPECIAL_MARKERS: &[&str] = &[
    "抢先看", "预告", "先导", "花絮", "幕后", "特辑", "特别篇", "番外", "彩蛋", "sp", "special",
    "pv", "cm",
];

/// Part designators after `第X期`, checked in this order.
const PART_RANKS: &[(&str, u8)] = &[("上", 1), ("前", 1), ("中", 2), ("下", 3), ("后", 2)];

/// Lowest and highest value accepted for a bare numeric episode.
const BARE_EPISODE_RANGE: std::ops::RangeInclusive<u32> = 1..=200;

/// Drop a leading `[group]` or `【group】` release tag.
pub fn strip_release_tag(stem: &str) -> String {
    let once = RELEASE_TAG.replace(stem, "");
    CJK_RELEASE_TAG.replace(once.trim(), "").trim().to_string()
}

/// Strip the extension only when it is a media or subtitle extension.
///
/// Folder names like `Beyond.Evil.S01E01` keep their dotted tail.
fn media_stem(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    if is_video_file(base) || is_subtitle_file(base) {
        split_ext(base).0
    } else {
        base
    }
}

/// Whether the text denotes a bundle of several seasons (`S1-S3`, `1-4季`).
pub fn is_season_range(text: &str) -> bool {
    let t = to_halfwidth(text);
    CN_SEASON_RANGE.is_match(&t) || S_SEASON_RANGE.is_match(&t)
}

/// Parse season/episode facts from a file or folder name.
///
/// Precedence: `SxxEyy`, `NxM`, `E`/`EP` numbers, `第X集`, a leading bare number,
/// then any standalone numeric token. Bare numbers are ignored inside
/// season-range containers and in date-stamped names.
pub fn parse_episode(name: &str) -> NameFacts {
    let raw = name.trim();
    if raw.is_empty() {
        return NameFacts::default();
    }

    let stem = normalize_spaces(&to_halfwidth(&strip_release_tag(media_stem(raw))));
    let range_container = is_season_range(&stem);
    let season_hint = parse_season(&stem);
    let quality_tail = quality_tokens(&stem).join(" ");

    for re in [&*SXXEYY, &*NXM] {
        if let Some(caps) = re.captures(&stem) {
            return NameFacts {
                season: caps[1].parse().ok(),
                episode: caps[2].parse().ok(),
                already_tagged: true,
                quality_tail,
            };
        }
    }

    let untagged = |episode: Option<u32>| NameFacts {
        season: season_hint,
        episode,
        already_tagged: false,
        quality_tail: quality_tail.clone(),
    };

    if let Some(caps) = EP_NUM.captures(&stem) {
        return untagged(caps[1].parse().ok());
    }

    if let Some(caps) = CN_EPISODE.captures(&stem) {
        return untagged(chinese_to_int(&caps[1]));
    }

    // Bare numbers never come from a season range or a broadcast date.
    if !range_container && parse_date(&stem).is_none() {
        if let Some(ep) = LEADING_NUMBER
            .captures(&stem)
            .and_then(|caps| caps[1].parse::<u32>().ok())
            .filter(|ep| BARE_EPISODE_RANGE.contains(ep))
        {
            return untagged(Some(ep));
        }

        if let Some(ep) = standalone_numbers(&stem).find(|ep| BARE_EPISODE_RANGE.contains(ep)) {
            return untagged(Some(ep));
        }
    }

    untagged(None)
}

/// Episode facts of a folder name. Resolution labels (`4K`, `1080p`) are not episode numbers.
pub fn parse_episode_folder(name: &str) -> NameFacts {
    let halfwidth = to_halfwidth(name);
    let stripped = RESOLUTION_LABEL.replace_all(&halfwidth, " ");
    parse_episode(&stripped)
}

/// Separator-bounded numeric tokens of at most three significant digits.
fn standalone_numbers(stem: &str) -> impl Iterator<Item = u32> + '_ {
    TOKEN_SEPARATORS
        .split(stem)
        .filter(|tok| !tok.is_empty() && tok.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|tok| {
            let significant = tok.trim_start_matches('0');
            if significant.is_empty() {
                Some(0)
            } else if significant.len() <= 3 {
                significant.parse().ok()
            } else {
                None
            }
        })
}

/// Parse a single season number from a name.
///
/// Recognizes `S4`, `Season 4`, `第四季`, `4季`, `第二部`, `2部` and the
/// `4 附带1-3` packaging idiom. Season ranges always yield `None`.
pub fn parse_season(text: &str) -> Option<u32> {
    let t = to_halfwidth(text);
    let t = t.trim();
    if t.is_empty() || is_season_range(t) {
        return None;
    }

    SEASON_PATTERNS.iter().find_map(|(re, chinese)| {
        let caps = re.captures(t)?;
        if *chinese {
            chinese_to_int(&caps[1])
        } else {
            caps[1].parse().ok()
        }
    })
}

/// Broadcast date as `yyyymmdd`, if the text carries a real calendar date.
pub fn parse_date(text: &str) -> Option<u32> {
    let t = to_halfwidth(text);
    let caps = DATE8.captures(&t).or_else(|| DATE_SEP.captures(&t))?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(year, month, day)?;
    Some(year as u32 * 10_000 + month * 100 + day)
}

/// Whether the name marks a special (trailer, behind the scenes, extra).
pub fn is_special(name: &str) -> bool {
    let n = to_halfwidth(name).to_lowercase();
    SPECIAL_MARKERS.iter().any(|m| n.contains(m))
}

/// Parse `第X期` plus an optional part designator: `第10期下` → `(Some(10), 3)`.
pub fn parse_period_and_part(text: &str) -> (Option<u32>, u8) {
    let t = to_halfwidth(text);
    let Some(caps) = PERIOD.captures(&t) else {
        return (None, 0);
    };
    let period = chinese_to_int(&caps[1]);
    let end = caps.get(0).map_or(0, |m| m.end());
    let window: String = t[end..].chars().take(8).collect();
    let rank = PART_RANKS
        .iter()
        .find(|(k, _)| window.contains(k))
        .map_or(0, |(_, v)| *v);
    (period, rank)
}

/// First plausible year (1900-2099) in the text.
pub fn extract_year_hint(text: &str) -> Option<i32> {
    YEAR_HINT
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Compact quality/release tokens found in a name, in a fixed order, for display only.
pub fn quality_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut out: Vec<String> = Vec::new();
    for (re, display) in QUALITY_PATTERNS.iter() {
        let Some(m) = re.find(&lower) else {
            continue;
        };
        let token = if display.is_empty() {
            m.as_str().to_uppercase()
        } else {
            display.to_string()
        };
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// Normalize the casing of quality words in a name tail while keeping every token.
///
/// `4k` → `4K`, `2160P` → `2160p`, `dolby vision` → `DolbyVision`, `hdr` → `HDR`,
/// and the common Chinese quality words are mapped to their English tags.
pub fn normalize_quality_tail(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut t = text.to_string();
    for (cn, en) in [
        ("杜比视界", "DV"),
        ("杜比", "Dolby"),
        ("视界", "DV"),
        ("高码", "HiBitrate"),
    ] {
        t = t.replace(cn, en);
    }
    t = RESOLUTION_CASE.replace_all(&t, "${1}p").into_owned();
    t = FOUR_K.replace_all(&t, "${1}4K${2}").into_owned();
    t = DOLBY_VISION.replace_all(&t, "DolbyVision").into_owned();
    t = HDR_TOKENS
        .replace_all(&t, |caps: &regex::Captures| {
            match caps[1].to_lowercase().as_str() {
                "dolbyvision" => "DolbyVision",
                "dolby" => "Dolby",
                "hdr10+" => "HDR10+",
                "hdr10" => "HDR10",
                "hdr" => "HDR",
                "dovi" | "dv" => "DV",
                "uhd" => "UHD",
                _ => "",
            }
            .to_string()
        })
        .into_owned();
    normalize_spaces(&t)
}

/// Best-effort English title from a release-style filename (`Beyond.Evil.S01E01...`).
///
/// Returns `None` unless the prefix before the episode marker is plainly English.
pub fn extract_english_title(name: &str) -> Option<String> {
    let stem = split_ext(name).0;
    let stem = BRACKETED.replace_all(stem, " ");
    let prefix = match ENGLISH_PREFIX.captures(&stem) {
        Some(caps) => caps[1].to_string(),
        None => stem.into_owned(),
    };

    let spaced = prefix.replace(['.', '_', '-'], " ");
    let no_years = STANDALONE_YEAR.replace_all(&spaced, " ");
    let no_noise = ENGLISH_NOISE.replace_all(&no_years, " ");
    if normalize_spaces(&no_noise).is_empty() {
        return None;
    }

    let ascii = normalize_spaces(&NON_ENGLISH.replace_all(&no_noise, " "));
    if ascii.len() >= 3 && ENGLISH_TITLE.is_match(&ascii) {
        Some(ascii)
    } else {
        None
    }
}

/// Longest English title found among `names`. The earliest name wins a tie.
pub fn best_english_title(names: &[String]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| extract_english_title(name))
        .fold(None, |best, title| match best {
            Some(kept) if kept.len() >= title.len() => Some(kept),
            _ => Some(title),
        })
}
