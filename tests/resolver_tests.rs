//! Identity resolution: candidate pooling, assistant retries and tie-breaks, caching.

mod common;

use common::{FakeCatalog, ScriptedAssistant};
use emby_reconciler::core::resolver::{IdentityCache, MetadataResolver};
use emby_reconciler::models::media::SeriesContext;
use emby_reconciler::services::ChatAssistant;
use serde_json::json;

const QUERIES_PROMPT: &str = "propose up to 5 possible TMDB TV search queries";
const CHOOSE_PROMPT: &str = "Choose the most likely TMDB TV id";

#[tokio::test]
async fn test_candidates_pool_across_queries() {
    let catalog = FakeCatalog::new(&[(1, "Alpha Squad", "2019-01-01"), (2, "Bravo Team", "2019-01-01")]);
    let mut resolver = MetadataResolver::new(&catalog, None, IdentityCache::default());
    let context = SeriesContext {
        english_title: Some("Bravo Team".to_string()),
        ..SeriesContext::default()
    };

    let resolved = resolver.resolve("Alpha", &context).await.unwrap().unwrap();

    assert_eq!(catalog.searches(), 2);
    assert_eq!(resolved.id, 2);
    assert_eq!(resolved.canonical_name(), "Bravo Team (2019)");
}

#[tokio::test]
async fn test_empty_pool_retries_with_assistant_queries() {
    let catalog = FakeCatalog::new(&[(1, "Show", "2020-03-01")]);
    let ai = ScriptedAssistant::new(&[(QUERIES_PROMPT, json!({"queries": ["Mystery", "Show"]}))]);
    let assistant: &dyn ChatAssistant = &ai;
    let mut resolver = MetadataResolver::new(&catalog, Some(assistant), IdentityCache::default());

    let resolved = resolver
        .resolve("Mystery Box", &SeriesContext::default())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(resolved.id, 1);
    // "Mystery Box", then "Mystery" and "Show" from the assistant
    assert_eq!(catalog.searches(), 3);
}

#[tokio::test]
async fn test_empty_pool_without_assistant_is_unresolved() {
    let catalog = FakeCatalog::new(&[(1, "Show", "2020-03-01")]);
    let mut resolver = MetadataResolver::new(&catalog, None, IdentityCache::default());
    let resolved = resolver.resolve("Mystery Box", &SeriesContext::default()).await.unwrap();
    assert!(resolved.is_none());
}

#[tokio::test]
async fn test_assistant_picks_when_best_score_is_weak() {
    // "Show" scores about 0.44 against "Show Zulu", well clear of "Zu" but under the floor.
    let shows = [(1, "Show", "2020-03-01"), (2, "Zu", "2021-01-01")];

    let catalog = FakeCatalog::new(&shows);
    let mut plain = MetadataResolver::new(&catalog, None, IdentityCache::default());
    let resolved = plain.resolve("Show Zulu", &SeriesContext::default()).await.unwrap().unwrap();
    assert_eq!(resolved.id, 1);

    let catalog = FakeCatalog::new(&shows);
    let ai = ScriptedAssistant::new(&[(CHOOSE_PROMPT, json!({"id": 2}))]);
    let assistant: &dyn ChatAssistant = &ai;
    let mut assisted = MetadataResolver::new(&catalog, Some(assistant), IdentityCache::default());
    let resolved = assisted.resolve("Show Zulu", &SeriesContext::default()).await.unwrap().unwrap();
    assert_eq!(resolved.id, 2);
    assert_eq!(ai.calls(), 1);
}

#[tokio::test]
async fn test_assistant_breaks_near_tie() {
    let shows = [(1, "Show", "2020-03-01"), (2, "Show", "2021-01-01")];

    let catalog = FakeCatalog::new(&shows);
    let ai = ScriptedAssistant::new(&[(CHOOSE_PROMPT, json!({"id": "2"}))]);
    let assistant: &dyn ChatAssistant = &ai;
    let mut resolver = MetadataResolver::new(&catalog, Some(assistant), IdentityCache::default());
    let resolved = resolver.resolve("Show", &SeriesContext::default()).await.unwrap().unwrap();
    assert_eq!(resolved.id, 2);
    assert_eq!(resolved.year, Some(2021));

    // An id outside the candidates keeps the scored winner.
    let catalog = FakeCatalog::new(&shows);
    let ai = ScriptedAssistant::new(&[(CHOOSE_PROMPT, json!({"id": 99}))]);
    let assistant: &dyn ChatAssistant = &ai;
    let mut resolver = MetadataResolver::new(&catalog, Some(assistant), IdentityCache::default());
    let resolved = resolver.resolve("Show", &SeriesContext::default()).await.unwrap().unwrap();
    assert_eq!(resolved.id, 1);
}

#[tokio::test]
async fn test_confident_match_skips_assistant() {
    let catalog = FakeCatalog::new(&[(1, "Show", "2020-03-01")]);
    let ai = ScriptedAssistant::new(&[(CHOOSE_PROMPT, json!({"id": 1}))]);
    let assistant: &dyn ChatAssistant = &ai;
    let mut resolver = MetadataResolver::new(&catalog, Some(assistant), IdentityCache::default());
    resolver.resolve("Show", &SeriesContext::default()).await.unwrap().unwrap();
    assert_eq!(ai.calls(), 0);
}

#[tokio::test]
async fn test_identity_cache_hit_skips_catalog() {
    let catalog = FakeCatalog::new(&[(1, "Show", "2020-03-01")]);
    let mut resolver = MetadataResolver::new(&catalog, None, IdentityCache::default());

    let first = resolver.resolve("Show", &SeriesContext::default()).await.unwrap().unwrap();
    assert_eq!(catalog.searches(), 1);

    let second = resolver
        .resolve("Show 第二季 1080p", &SeriesContext::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(catalog.searches(), 1);
    assert_eq!(second.id, first.id);
    assert_eq!(second.title, "Show");
    assert_eq!(second.season_hint, Some(2));
    assert_eq!(resolver.cache().len(), 1);
}
