//! Folder name generator.

use std::sync::LazyLock;

use regex::Regex;

use crate::generators::filename::safe_filename;
use crate::models::media::ResolvedSeries;

/// Reserved name for season 0.
pub const SPECIALS_FOLDER: &str = "Specials";

/// Format used when a configured one cannot be applied.
pub const DEFAULT_SEASON_FORMAT: &str = "S{season:02}";

static BRACE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{season(?::(0?)(\d*)d?)?\}").expect("valid regex"));
static PRINTF_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%(0?)(\d*)d").expect("valid regex"));

/// Generate the series folder name: `"{title} ({year})"`, or `"{title}"` without a year.
pub fn series_folder_name(series: &ResolvedSeries) -> String {
    safe_filename(&series.canonical_name())
}

fn pad(season: u32, zero: &str, width: &str) -> String {
    let width: usize = width.parse().unwrap_or(0);
    if zero.is_empty() {
        format!("{:width$}", season, width = width)
    } else {
        format!("{:0width$}", season, width = width)
    }
}

fn apply_format(season: u32, fmt: &str) -> Option<String> {
    if BRACE_PLACEHOLDER.is_match(fmt) {
        let out = BRACE_PLACEHOLDER.replace_all(fmt, |caps: &regex::Captures| {
            pad(season, caps.get(1).map_or("", |m| m.as_str()), caps.get(2).map_or("", |m| m.as_str()))
        });
        // Leftover braces mean an unsupported placeholder.
        return (!out.contains(['{', '}'])).then(|| out.into_owned());
    }
    if fmt.contains('{') || fmt.contains('}') {
        return None;
    }
    if PRINTF_PLACEHOLDER.is_match(fmt) {
        let out = PRINTF_PLACEHOLDER.replace_all(fmt, |caps: &regex::Captures| {
            pad(season, &caps[1], &caps[2])
        });
        return Some(out.into_owned());
    }
    None
}

/// Whether a season format can be applied.
pub fn is_valid_season_format(fmt: &str) -> bool {
    apply_format(1, fmt.trim()).is_some_and(|s| !safe_filename(&s).is_empty())
}

/// Generate a season folder name.
///
/// Season 0 is always `Specials`. The format accepts `{season}`, `{season:02}`,
/// `{season:02d}` or printf-style `%02d`/`%d`; anything else falls back to `S01`.
pub fn season_folder_name(season: u32, fmt: &str) -> String {
    if season == 0 {
        return SPECIALS_FOLDER.to_string();
    }
    apply_format(season, fmt.trim())
        .map(|s| safe_filename(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("S{:02}", season))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_folder_formats() {
        assert_eq!(season_folder_name(1, DEFAULT_SEASON_FORMAT), "S01");
        assert_eq!(season_folder_name(3, "Season {season}"), "Season 3");
        assert_eq!(season_folder_name(3, "S{season:02d}"), "S03");
        assert_eq!(season_folder_name(12, "第%d季"), "第12季");
        assert_eq!(season_folder_name(2, "S%02d"), "S02");
    }

    #[test]
    fn test_specials_and_fallbacks() {
        assert_eq!(season_folder_name(0, "Season {season}"), "Specials");
        assert_eq!(season_folder_name(4, "S{season:02}}"), "S04");
        assert_eq!(season_folder_name(4, "{show}"), "S04");
        assert_eq!(season_folder_name(4, ""), "S04");
        assert!(!is_valid_season_format("plain"));
        assert!(is_valid_season_format("Season {season}"));
    }

    #[test]
    fn test_series_folder_name() {
        let series = ResolvedSeries {
            id: 1,
            title: "Marvel's: Agents".to_string(),
            year: Some(2013),
            season_hint: None,
        };
        assert_eq!(series_folder_name(&series), "Marvel's Agents (2013)");
    }
}
