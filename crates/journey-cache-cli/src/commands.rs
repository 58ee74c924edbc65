//! Subcommand handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;

use journey_cache_core::{
    CacheStorage, CachedData, Config, DiskStorage, FetchOutcome, HttpFetcher,
    OfflineCacheManager, Request, StoredResponse,
};

use crate::{Args, Command};

type Manager = OfflineCacheManager<DiskStorage, HttpFetcher>;

/// Apply command line overrides on top of the loaded config.
fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = Config::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(ref origin) = args.origin {
        config.origin = origin.clone();
    }
    if let Some(deployment) = args.deployment {
        config.deployment = deployment;
        // An explicit deployment wins over a custom manifest in the file
        config.manifest = None;
    }
    if let Some(ref dir) = args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    Ok(config)
}

fn build_manager(config: &Config) -> Result<Manager> {
    let cache_dir = config.cache_dir().context("Failed to determine cache directory")?;
    let storage = DiskStorage::new(cache_dir.clone())
        .with_context(|| format!("Failed to open cache directory {}", cache_dir.display()))?;
    let fetcher = HttpFetcher::new().context("Failed to build HTTP client")?;
    let origin = config.origin_url().context("Invalid origin")?;

    Ok(OfflineCacheManager::new(
        Arc::new(storage),
        Arc::new(fetcher),
        config.manifest(),
        origin,
    ))
}

pub async fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;
    let manager = build_manager(&config)?;

    match args.command {
        Command::Install => install(&manager).await,
        Command::Fetch { paths, output } => fetch(&manager, &paths, output).await,
        Command::Buckets => buckets(&manager).await,
        Command::Keys { bucket } => keys(&manager, &bucket).await,
        Command::Purge { bucket } => purge(&manager, &bucket).await,
        Command::Manifest => manifest(&manager),
    }
}

async fn install(manager: &Manager) -> Result<()> {
    let report = manager
        .install()
        .await
        .with_context(|| format!("Install of {} failed", manager.cache_name()))?;

    println!(
        "Installed {} ({} entries, {} bytes)",
        report.cache_name,
        report.keys.len(),
        report.bytes
    );
    for key in &report.keys {
        println!("  {}", key);
    }
    Ok(())
}

async fn fetch(manager: &Manager, paths: &[String], output: Option<PathBuf>) -> Result<()> {
    let requests = paths
        .iter()
        .map(|p| manager.request_for(p).map(|r| (p.clone(), r)))
        .collect::<journey_cache_core::Result<Vec<(String, Request)>>>()?;

    // Each request is handled independently, like concurrent page loads
    let results = join_all(requests.into_iter().map(|(path, request)| async move {
        (path, manager.handle_fetch(request).await)
    }))
    .await;

    let mut first_body: Option<StoredResponse> = None;
    let mut failures = 0;
    for (path, result) in results {
        match result {
            Ok(outcome) => {
                println!("{}", describe(&path, &outcome));
                if first_body.is_none() {
                    first_body = Some(outcome.into_response());
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{:<8} {} ({})", "FAILED", path, e);
            }
        }
    }

    if let (Some(path), Some(response)) = (output, first_body) {
        std::fs::write(&path, &response.body)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if failures > 0 {
        anyhow::bail!("{} of {} requests failed", failures, paths.len());
    }
    Ok(())
}

fn describe(path: &str, outcome: &FetchOutcome) -> String {
    let response = outcome.response();
    let source = match outcome {
        FetchOutcome::Cache { bucket, .. } => format!("cache:{}", bucket),
        FetchOutcome::Network(_) => "network".to_string(),
    };
    format!(
        "{:<8} {} {} {} bytes {} [{}]",
        if outcome.is_cache_hit() { "HIT" } else { "MISS" },
        response.status,
        path,
        response.content_length(),
        response.header_str("content-type").unwrap_or("-"),
        source
    )
}

async fn buckets(manager: &Manager) -> Result<()> {
    let buckets = manager.storage().buckets().await.context("Failed to list buckets")?;
    if buckets.is_empty() {
        println!("No cache buckets");
        return Ok(());
    }
    for info in buckets {
        let age = CachedData {
            data: (),
            cached_at: info.created_at,
        }
        .age_display();
        let marker = if info.name == manager.cache_name() { "*" } else { " " };
        println!("{} {:<24} {:>4} entries  created {}", marker, info.name, info.entries, age);
    }
    Ok(())
}

async fn keys(manager: &Manager, bucket: &str) -> Result<()> {
    let keys = manager
        .storage()
        .keys(bucket)
        .await
        .with_context(|| format!("Failed to read bucket {}", bucket))?;
    for key in keys {
        println!("{}", key);
    }
    Ok(())
}

async fn purge(manager: &Manager, bucket: &str) -> Result<()> {
    if manager.storage().delete(bucket).await? {
        println!("Deleted {}", bucket);
    } else {
        println!("No bucket named {}", bucket);
    }
    Ok(())
}

fn manifest(manager: &Manager) -> Result<()> {
    let urls = manager.manifest().resolve(manager.origin())?;
    println!("{}", manager.cache_name());
    for url in urls {
        println!("  {}", url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use journey_cache_core::Deployment;

    #[test]
    fn test_describe_hit_and_miss() {
        let hit = FetchOutcome::Cache {
            bucket: "journey-v1".to_string(),
            response: StoredResponse::new("/1.jpg", 200, vec![0u8; 10])
                .with_header("Content-Type", "image/jpeg"),
        };
        assert_eq!(
            describe("/1.jpg", &hit),
            "HIT      200 /1.jpg 10 bytes image/jpeg [cache:journey-v1]"
        );

        let miss = FetchOutcome::Network(StoredResponse::new("/login", 404, "nope"));
        assert_eq!(describe("/login", &miss), "MISS     404 /login 4 bytes - [network]");
    }

    #[test]
    fn test_deployment_flag_drops_custom_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"manifest": {"cache_name": "journey-v9", "paths": ["/"]}}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "journey-cache",
            "--config",
            config_path.to_str().unwrap(),
            "--deployment",
            "journey-v1",
            "--origin",
            "http://127.0.0.1:8080",
            "manifest",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.deployment, Deployment::V1);
        assert_eq!(config.manifest().cache_name, "journey-v1");
        assert_eq!(config.origin, "http://127.0.0.1:8080");
    }
}
