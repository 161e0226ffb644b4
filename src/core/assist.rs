//! Prompts for the optional chat assistant.
//!
//! Every helper degrades to "no answer" when the assistant has nothing useful
//! to say; callers always keep a heuristic fallback.

use serde_json::{json, Value};

use crate::models::media::{MetadataCandidate, SeriesContext};
use crate::services::ChatAssistant;

fn trimmed_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ask for a single clean title to search for.
pub async fn extract_query(ai: &dyn ChatAssistant, folder_name: &str) -> Option<String> {
    let system = "You help extract a TV series title for TMDB search. Output JSON only.";
    let user = format!(
        "Extract the most likely TV series title from this folder name. \
         Remove quality tags, season ranges, country tags, bracketed info. \
         Return JSON: {{\"query\": string|null}}.\n\nfolder_name: {}",
        folder_name
    );
    let reply = ai.chat_json(system, &user).await?;
    trimmed_string(reply.get("query"))
}

/// Ask for up to five alternative search strings (Chinese, English, romanized).
pub async fn extract_queries(ai: &dyn ChatAssistant, folder_name: &str) -> Vec<String> {
    let system = "You help extract TV series titles for TMDB search. Output JSON only.";
    let user = format!(
        "From the folder name, propose up to 5 possible TMDB TV search queries. \
         Remove quality tags (4K/1080p/HDR/DV/Web-DL), language tags (双语/国语/粤语/中字), \
         collection words (合集/全集/无删减/完整版), and season ranges (1-6季). \
         Prefer clean titles. Return JSON like: {{\"queries\": [\"title1\", \"title2\"]}}.\n\n\
         folder_name: {}",
        folder_name
    );
    let Some(reply) = ai.chat_json(system, &user).await else {
        return Vec::new();
    };

    let mut out: Vec<String> = Vec::new();
    let listed = reply
        .get("queries")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(Some);
    for q in listed.chain(std::iter::once(reply.get("query"))) {
        if let Some(q) = trimmed_string(q) {
            if !out.contains(&q) {
                out.push(q);
            }
        }
    }
    out
}

/// Ask the assistant to pick one catalog id among ranked candidates.
pub async fn choose_candidate(
    ai: &dyn ChatAssistant,
    folder_name: &str,
    query: &str,
    candidates: &[&MetadataCandidate],
    context: &SeriesContext,
) -> Option<u64> {
    let compact: Vec<Value> = candidates
        .iter()
        .take(10)
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "original_name": c.original_name,
                "first_air_year": c.first_air_year,
            })
        })
        .collect();
    let hints = json!({
        "year_hint": context.year_hint,
        "english_title": context.english_title,
        "max_episode": context.max_episode,
        "episode_file_count": context.episode_file_count,
        "sample_files": context.sample_files.iter().take(6).collect::<Vec<_>>(),
    });

    let system = "You select the best matching TMDB TV entry. Output JSON only.";
    let user = format!(
        "We are organizing a TV library. Choose the most likely TMDB TV id for the folder. \
         Return JSON: {{\"id\": number|null}}. Use null if unsure.\n\n\
         Hints may come from filenames (English title) and episode counts.\n\
         Rules:\n\
         - Prefer candidates whose first_air_year matches year_hint (if provided).\n\
         - If english_title is provided, it is often more reliable than a short Chinese name (e.g. \"怪物\").\n\
         - If max_episode is provided (e.g. 16), prefer a series known to have that many episodes in S01.\n\n\
         folder_name: {}\ntmdb_query: {}\nhints: {}\ncandidates: {}\n",
        folder_name,
        query,
        hints,
        Value::Array(compact)
    );

    let reply = ai.chat_json(system, &user).await?;
    parse_id(reply.get("id")?)
}

fn parse_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 1.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                s.parse().ok()
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Ask for the season of a file that carries no season marker of its own.
pub async fn infer_season(
    ai: &dyn ChatAssistant,
    series_folder: &str,
    scan_folder: &str,
    video_file: &str,
) -> Option<u32> {
    let system = "You infer TV episode season number from context. Output JSON only.";
    let user = format!(
        "We are organizing a TV series library. Given the folder name context and file name, \
         infer season number. Return JSON: {{\"season\": number|null}}. Use null if unsure.\n\n\
         series_folder_original: {}\nscan_folder: {}\nvideo_file: {}\n",
        series_folder, scan_folder, video_file
    );
    let reply = ai.chat_json(system, &user).await?;
    reply
        .get("season")
        .and_then(Value::as_f64)
        .filter(|s| *s >= 0.0 && *s < 1000.0)
        .map(|s| s as u32)
}

/// Ask for the best series folder among keyword matches.
pub async fn choose_series_path(
    ai: &dyn ChatAssistant,
    keyword: &str,
    candidates: &[String],
) -> Option<String> {
    let shown: Vec<&String> = candidates.iter().take(12).collect();
    let system = "You pick the best matching series folder path. Output JSON only.";
    let user = format!(
        "Pick the best matching TV series folder path for this keyword. \
         Return JSON: {{\"path\": string|null}}.\n\nkeyword: {}\ncandidates: {}",
        keyword,
        json!(shown)
    );
    let reply = ai.chat_json(system, &user).await?;
    trimmed_string(reply.get("path"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(Option<Value>);

    #[async_trait]
    impl ChatAssistant for Canned {
        async fn chat_json(&self, _system: &str, _user: &str) -> Option<Value> {
            self.0.clone()
        }
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(&json!(123)), Some(123));
        assert_eq!(parse_id(&json!(45.0)), Some(45));
        assert_eq!(parse_id(&json!(" 77 ")), Some(77));
        assert_eq!(parse_id(&json!("abc")), None);
        assert_eq!(parse_id(&Value::Null), None);
    }

    #[tokio::test]
    async fn test_extract_queries_dedupes() {
        let ai = Canned(Some(json!({"queries": ["三体", " Three-Body ", "三体"], "query": "Three-Body"})));
        assert_eq!(
            extract_queries(&ai, "三体 4K").await,
            vec!["三体".to_string(), "Three-Body".to_string()]
        );
    }

    #[tokio::test]
    async fn test_silent_assistant_gives_nothing() {
        let ai = Canned(None);
        assert_eq!(extract_query(&ai, "x").await, None);
        assert!(extract_queries(&ai, "x").await.is_empty());
        assert_eq!(infer_season(&ai, "a", "b", "c").await, None);
        assert_eq!(choose_series_path(&ai, "k", &[]).await, None);
    }

    #[tokio::test]
    async fn test_infer_season_reads_number() {
        let ai = Canned(Some(json!({"season": 4})));
        assert_eq!(infer_season(&ai, "第四季", "第四季", "E01.mp4").await, Some(4));
    }
}
