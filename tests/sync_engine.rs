//! End-to-end runs of the sync engine against a scripted git

use forgesync::config::{Config, RetryConfig, ServerConfig};
use forgesync::testing::ScriptedGit;
use forgesync::{CloneType, Platform, RepositoryDescriptor, SyncSession, TokenRotator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn config(backup_dir: &TempDir, concurrency: usize) -> Config {
    Config {
        username: "alice".to_string(),
        tokens: vec!["t1".to_string(), "t2".to_string()],
        platform: Platform::GitHub,
        server: ServerConfig {
            domain: "github.com".to_string(),
            protocol: "https".to_string(),
        },
        include_wiki: true,
        backup_dir: backup_dir.path().to_path_buf(),
        clone_type: Some(CloneType::Bare),
        concurrency,
        retry: RetryConfig { count: 2, delay: 0 },
        ..Config::default()
    }
}

fn session(config: Config, git: &Arc<ScriptedGit>) -> SyncSession {
    let tokens = Arc::new(TokenRotator::new(config.tokens.clone()));
    SyncSession::new(config, Arc::clone(git) as _, tokens)
}

fn repos(names: &[&str]) -> Vec<RepositoryDescriptor> {
    names
        .iter()
        .map(|name| RepositoryDescriptor::new("acme", *name))
        .collect()
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::new().fail_times("acme/beta", 1, "fatal: unable to access"));

    let summary = session(config(&dir, 2), &git)
        .run(repos(&["alpha", "beta", "gamma"]))
        .await
        .unwrap();

    assert_eq!(summary.repos_success, 3);
    assert!(summary.repos_failed.is_empty());
    assert_eq!(git.commands_matching("acme/beta").len(), 2);
    assert!(dir.path().join("acme").join("beta").is_dir());
}

#[tokio::test]
async fn test_exhausted_retries_are_reported() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::new().fail_always("acme/broken", "fatal: repository corrupt"));

    let summary = session(config(&dir, 2), &git)
        .run(repos(&["ok", "broken"]))
        .await
        .unwrap();

    assert_eq!(summary.repos_success, 1);
    assert_eq!(summary.repos_failed.len(), 1);
    assert!(summary.repos_failed[0].starts_with("acme/broken (Error: "));
    assert_eq!(git.commands_matching("acme/broken").len(), 2);
}

#[tokio::test]
async fn test_missing_wiki_is_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(
        ScriptedGit::new().fail_always(".wiki.git", "remote: Repository not found."),
    );
    let repo = RepositoryDescriptor::new("acme", "docs").with_wiki(true);

    let summary = session(config(&dir, 1), &git).run(vec![repo]).await.unwrap();

    assert_eq!(summary.repos_success, 1);
    assert_eq!(summary.wikis_success, 0);
    assert!(summary.wikis_failed.is_empty());
    assert!(!summary.has_failures());
}

#[tokio::test]
async fn test_wiki_skipped_when_not_requested() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::new());
    let mut cfg = config(&dir, 1);
    cfg.include_wiki = false;

    let summary = session(cfg, &git)
        .run(vec![RepositoryDescriptor::new("acme", "docs").with_wiki(true)])
        .await
        .unwrap();

    assert_eq!(summary.wikis_success, 0);
    assert!(git.commands_matching(".wiki").is_empty());
}

#[tokio::test]
async fn test_existing_copy_is_fetched() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("acme").join("site").join("site.git")).unwrap();
    let git = Arc::new(ScriptedGit::new());

    let summary = session(config(&dir, 1), &git)
        .run(repos(&["site", "fresh"]))
        .await
        .unwrap();

    assert_eq!(summary.repos_success, 2);
    let site = git.commands_matching("acme/site");
    assert_eq!(site.len(), 1);
    assert_eq!(site[0].args[0], "fetch");
    let fresh = git.commands_matching("acme/fresh");
    assert_eq!(fresh.len(), 1);
    assert!(fresh[0].is_clone());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_limit_holds() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::new().with_latency(Duration::from_millis(20)));
    let names: Vec<String> = (0..50).map(|i| format!("repo-{}", i)).collect();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();

    let summary = session(config(&dir, 5), &git).run(repos(&names)).await.unwrap();

    assert_eq!(summary.repos_success, 50);
    assert_eq!(git.commands().len(), 50);
    assert!(git.peak_in_flight() <= 5);
    assert!(git.peak_in_flight() >= 1);
}

#[tokio::test]
async fn test_counters_reset_between_runs() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::new());
    let session = session(config(&dir, 2), &git);

    let first = session.run(repos(&["a", "b"])).await.unwrap();
    let second = session.run(repos(&["c"])).await.unwrap();

    assert_eq!(first.repos_success, 2);
    assert_eq!(second.repos_success, 1);
}

#[tokio::test]
async fn test_tokens_rotate_across_repos() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::new());

    session(config(&dir, 1), &git)
        .run(repos(&["one", "two"]))
        .await
        .unwrap();

    let urls: Vec<String> = git.commands().iter().map(|c| c.args[2].clone()).collect();
    assert_eq!(urls.len(), 2);
    // one token per clone, in rotation
    let t1 = urls.iter().filter(|u| u.contains(":t1@")).count();
    let t2 = urls.iter().filter(|u| u.contains(":t2@")).count();
    assert_eq!((t1, t2), (1, 1));
}

#[tokio::test]
async fn test_default_config_fails_instead_of_hanging() {
    let dir = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::new());
    let config = Config {
        backup_dir: dir.path().to_path_buf(),
        ..Config::default()
    };

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        session(config, &git).run(repos(&["alpha"])),
    )
    .await
    .expect("run should return promptly");

    assert!(matches!(result, Err(forgesync::ForgesyncError::Config(_))));
    assert!(git.commands().is_empty());
}
