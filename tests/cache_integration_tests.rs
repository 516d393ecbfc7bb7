//! Integration Tests for the Cache
//!
//! Exercises the public operations end to end against a temporary directory.

use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tiered_cache::{Cache, CacheConfig, CacheError};
use tokio::sync::oneshot;

// == Helper Functions ==

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn open_cache(name: &str, dir: &TempDir) -> Cache<String> {
    init_tracing();
    Cache::open(name, dir.path())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Article {
    id: u64,
    title: String,
    tags: Vec<String>,
}

// == Save / Fetch ==

#[tokio::test]
async fn test_greeting_scenario_with_callbacks() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let cache = open_cache("greetings", &dir);

    let (tx, rx) = oneshot::channel();
    cache.save("hello".to_string(), "greeting", false, move |result| {
        let _ = tx.send(result);
    });
    rx.await??;

    let (tx, rx) = oneshot::channel();
    cache.fetch("greeting", move |value| {
        let _ = tx.send(value);
    });
    assert_eq!(rx.await?.as_deref(), Some("hello"));

    cache.save_async("world".to_string(), "greeting", false).await?;
    assert_eq!(cache.fetch_async("greeting").await.as_deref(), Some("hello"));

    cache.save_async("world".to_string(), "greeting", true).await?;
    assert_eq!(cache.fetch_async("greeting").await.as_deref(), Some("world"));

    Ok(())
}

#[tokio::test]
async fn test_structured_values_persist_across_instances() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let article = Article {
        id: 42,
        title: "Two-tier caching".to_string(),
        tags: vec!["rust".to_string(), "cache".to_string()],
    };

    {
        let cache: Cache<Article> = Cache::open("articles", dir.path());
        cache.save_async(article.clone(), "article-42", true).await?;
    }

    let reopened: Cache<Article> = Cache::open("articles", dir.path());
    assert_eq!(reopened.fetch_async("article-42").await, Some(article));
    assert!(dir.path().join("article-42.cache").is_file());

    Ok(())
}

#[tokio::test]
async fn test_fetch_missing_key() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache("missing", &dir);

    assert_eq!(cache.fetch_async("never-saved").await, None);
    assert_eq!(cache.stats().misses, 1);
}

#[tokio::test]
async fn test_corrupt_file_reads_as_absent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    std::fs::write(dir.path().join("broken.cache"), b"\xff\xfe definitely not json")?;
    let cache = open_cache("corrupt", &dir);

    assert_eq!(cache.fetch_async("broken").await, None);

    // A non-updating save treats the corrupt entry as absent and replaces it
    cache.save_async("fixed".to_string(), "broken", false).await?;
    assert_eq!(cache.fetch_async("broken").await.as_deref(), Some("fixed"));

    Ok(())
}

#[tokio::test]
async fn test_value_type_mismatch_reads_as_absent() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;

    let numbers: Cache<u64> = Cache::open("shared", dir.path());
    numbers.save_async(7, "answer", true).await?;

    let strings: Cache<String> = Cache::open("shared", dir.path());
    assert_eq!(strings.fetch_async("answer").await, None);

    Ok(())
}

// == Remove ==

#[tokio::test]
async fn test_remove_item() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let cache = open_cache("remove", &dir);

    cache.save_async("v".to_string(), "k", true).await?;
    cache.remove_item_async("k").await?;

    assert_eq!(cache.fetch_async("k").await, None);
    assert!(!dir.path().join("k.cache").exists());

    Ok(())
}

#[tokio::test]
async fn test_remove_unknown_key_reports_not_found() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache("remove", &dir);

    let (tx, rx) = oneshot::channel();
    cache.remove_item("never-saved", move |result| {
        let _ = tx.send(result);
    });

    let result = rx.await.unwrap();
    assert!(matches!(result, Err(CacheError::NotFound(ref key)) if key == "never-saved"));
}

#[tokio::test]
async fn test_remove_all() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let cache = open_cache("remove-all", &dir);
    let keys: Vec<String> = (0..5).map(|i| format!("item-{}", i)).collect();

    for key in &keys {
        cache.save_async(key.to_uppercase(), key.clone(), true).await?;
    }
    std::fs::write(dir.path().join("notes.txt"), b"not ours")?;

    let report = cache.remove_all_async().await?;
    assert!(report.is_complete());
    assert_eq!(report.removed.len(), keys.len());
    assert_eq!(cache.memory_len(), 0);

    for key in &keys {
        assert_eq!(cache.fetch_async(key.clone()).await, None);
    }
    // Files without the entry extension are left alone
    assert!(dir.path().join("notes.txt").exists());

    Ok(())
}

#[tokio::test]
async fn test_remove_all_is_best_effort() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let cache = open_cache("best-effort", &dir);

    cache.save_async("a".to_string(), "a", true).await?;
    cache.save_async("b".to_string(), "b", true).await?;
    // A directory with the entry extension cannot be deleted as a file
    std::fs::create_dir(dir.path().join("stuck.cache"))?;

    let (tx, rx) = oneshot::channel();
    cache.remove_all(move |report| {
        let _ = tx.send(report);
    });
    let report = rx.await?;

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key.as_deref(), Some("stuck"));

    let mut removed = report.removed.clone();
    removed.sort();
    assert_eq!(removed, vec!["a", "b"]);
    assert_eq!(cache.fetch_async("a").await, None);

    Ok(())
}

#[tokio::test]
async fn test_remove_all_on_missing_directory() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let cache: Cache<String> = Cache::open("empty", dir.path().join("never-created"));

    let report = cache.remove_all_async().await?;
    assert!(report.is_complete());
    assert!(report.removed.is_empty());

    Ok(())
}

// == Isolation ==

#[tokio::test]
async fn test_instances_are_isolated() -> anyhow::Result<()> {
    let first_dir = TempDir::new()?;
    let second_dir = TempDir::new()?;
    let first = open_cache("first", &first_dir);
    let second = open_cache("second", &second_dir);

    first.save_async("one".to_string(), "shared-key", true).await?;
    assert_eq!(second.fetch_async("shared-key").await, None);

    second.save_async("two".to_string(), "shared-key", true).await?;
    second.remove_all_async().await?;

    assert_eq!(first.fetch_async("shared-key").await.as_deref(), Some("one"));

    Ok(())
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_on_one_key() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let cache = open_cache("contended", &dir);
    let payload = "v".repeat(16 * 1024);

    let mut saves = Vec::new();
    let mut others = Vec::new();
    for i in 0..32 {
        let save_cache = cache.clone();
        let value = format!("{}-{}", i, payload);
        saves.push(tokio::spawn(async move {
            save_cache.save_async(value, "shared", true).await
        }));

        let cache = cache.clone();
        let payload = payload.clone();
        others.push(tokio::spawn(async move {
            if i % 4 == 0 {
                // Racing a save, the file may or may not exist yet
                match cache.remove_item_async("shared").await {
                    Ok(()) | Err(CacheError::NotFound(_)) => {}
                    Err(err) => panic!("unexpected remove error: {}", err),
                }
            } else if let Some(value) = cache.fetch_async("shared").await {
                assert!(value.ends_with(&payload));
            }
        }));
    }

    for save in saves {
        save.await??;
    }
    for other in others {
        other.await?;
    }

    cache.save_async(format!("final-{}", payload), "shared", true).await?;

    let reopened: Cache<String> = Cache::open("contended", dir.path());
    let value = reopened.fetch_async("shared").await;
    assert_eq!(value, Some(format!("final-{}", payload)));
    assert_eq!(reopened.stats().disk_hits, 1);

    // Only the entry file is left in the directory
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_values_need_not_be_sync() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let cache: Cache<Cell<u64>> = Cache::open("counters", dir.path());

    let tasks: Vec<_> = (0..8u64)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move {
                let key = format!("counter-{}", i);
                cache.save_async(Cell::new(i), key.as_str(), true).await?;
                let value = cache.fetch_async(key).await;
                Ok::<_, CacheError>(value.map(Cell::into_inner))
            })
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await??, Some(i as u64));
    }

    Ok(())
}

// == Expiration ==

#[tokio::test]
async fn test_ttl_expiry_is_lazy() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let cache = open_cache("ttl", &dir);

    cache
        .save_with_ttl_async("short".to_string(), "short", true, Some(Duration::from_millis(5)))
        .await?;
    cache
        .save_with_ttl_async("long".to_string(), "long", true, Some(Duration::from_secs(3600)))
        .await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(cache.fetch_async("short").await, None);
    assert_eq!(cache.fetch_async("long").await.as_deref(), Some("long"));
    assert!(dir.path().join("short.cache").exists());

    Ok(())
}

// == Configuration ==

#[tokio::test]
async fn test_from_config() -> anyhow::Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let config = CacheConfig {
        name: "configured".to_string(),
        directory: Some(PathBuf::from(dir.path())),
        memory_capacity: 2,
        default_ttl: Some(3600),
    };

    let cache: Cache<String> = Cache::from_config(&config)?;
    assert_eq!(cache.name(), "configured");
    assert_eq!(cache.directory(), dir.path());
    assert_eq!(cache.default_ttl(), Some(Duration::from_secs(3600)));

    for key in ["a", "b", "c"] {
        cache.save_async(key.to_string(), key, true).await?;
    }
    assert_eq!(cache.memory_len(), 2);

    // Evicted from memory, still served from disk
    assert_eq!(cache.fetch_async("a").await.as_deref(), Some("a"));
    assert_eq!(cache.stats().disk_hits, 1);

    Ok(())
}

#[test]
fn test_constructors_outside_runtime_return_error() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig {
        name: "no-runtime".to_string(),
        directory: Some(PathBuf::from(dir.path())),
        ..CacheConfig::default()
    };

    let result: Result<Cache<String>, _> = Cache::from_config(&config);
    assert!(matches!(result, Err(CacheError::Runtime(_))));

    let result: Result<Cache<String>, _> = Cache::try_open("no-runtime", dir.path());
    assert!(matches!(result, Err(CacheError::Runtime(_))));

    // Nothing is created on disk by a failed constructor
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
