//! Integration tests using mock HTTP servers
//!
//! Tests the full flows: paginated collection → merge → files on disk, and the
//! resumable per-item run.

use clap::Parser;
use pagewalk::cli::{Cli, Runner};
use pagewalk::collector::BidirectionalCollector;
use pagewalk::engine::{ItemRunConfig, ItemRunner};
use pagewalk::http::{RateLimitPolicy, Transport, TransportConfig};
use pagewalk::sources::{ChannelMessages, EmailFinder, EmailFinderConfig};
use pagewalk::types::BackoffType;
use pagewalk::Record;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============================================================================
// Fixtures
// ============================================================================

/// A channel holding messages with ids `first..=last`, served newest first
struct Channel {
    first: u64,
    last: u64,
}

impl Channel {
    fn message(id: u64) -> serde_json::Value {
        json!({
            "id": id.to_string(),
            "timestamp": format!("2024-03-01T{:02}:{:02}:00+00:00", id / 60 % 24, id % 60),
            "content": format!("message {id}"),
            "author": {"id": format!("u{}", id % 3), "username": format!("user{}", id % 3)},
            "mentions": []
        })
    }
}

impl Respond for Channel {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let param = |key: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<u64>().ok())
        };
        let limit = param("limit").unwrap_or(50);

        let (lo, hi) = if let Some(before) = param("before") {
            (before.saturating_sub(limit).max(self.first), before.saturating_sub(1))
        } else if let Some(after) = param("after") {
            (after + 1, (after + limit).min(self.last))
        } else if let Some(around) = param("around") {
            let lo = around.saturating_sub(limit / 2).max(self.first);
            (lo, (lo + limit - 1).min(self.last))
        } else {
            (self.last.saturating_sub(limit - 1).max(self.first), self.last)
        };

        let body: Vec<_> = if lo > hi || hi < self.first || lo > self.last {
            Vec::new()
        } else {
            (lo..=hi).rev().map(Self::message).collect()
        };
        ResponseTemplate::new(200).set_body_json(body)
    }
}

fn quick_transport() -> TransportConfig {
    TransportConfig::builder()
        .no_pacing()
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .rate_limit(RateLimitPolicy {
            reset_margin: Duration::ZERO,
            fallback_wait: Duration::ZERO,
            ..RateLimitPolicy::default()
        })
        .build()
}

// ============================================================================
// Bidirectional Collection
// ============================================================================

#[tokio::test]
async fn test_collect_around_reference_from_channel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/77/messages"))
        .respond_with(Channel {
            first: 1000,
            last: 1499,
        })
        .mount(&server)
        .await;

    let source = ChannelMessages::with_base_url(&server.uri(), "tok", "77");
    let mut transport = Transport::new(quick_transport());

    let messages = BidirectionalCollector::default()
        .collect_around(&mut transport, &source, Some("1250"), 120, 80)
        .await;

    let ids: Vec<u64> = messages.iter().map(|m| m.id().as_str().parse().unwrap()).collect();
    let expected: Vec<u64> = (1130..=1330).collect();
    assert_eq!(ids, expected);

    // before: 100 + 20, after: 80, anchor: 1
    assert_eq!(transport.stats().calls, 4);
    assert_eq!(transport.stats().failures, 0);
}

#[tokio::test]
async fn test_collection_survives_rate_limiting() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/77/messages"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/channels/77/messages"))
        .respond_with(Channel {
            first: 1,
            last: 40,
        })
        .mount(&server)
        .await;

    let source = ChannelMessages::with_base_url(&server.uri(), "tok", "77");
    let mut transport = Transport::new(quick_transport());

    let messages = BidirectionalCollector::default()
        .collect_around(&mut transport, &source, None, 250, 0)
        .await;

    assert_eq!(messages.len(), 40);
    assert_eq!(messages.first().map(|m| m.id().as_str()), Some("1"));
    assert_eq!(transport.stats().rate_limit_waits, 1);
    assert_eq!(transport.stats().retries, 0);
}

#[tokio::test]
async fn test_messages_command_writes_outputs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/9/messages"))
        .respond_with(Channel {
            first: 100,
            last: 130,
        })
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pagewalk.yaml");
    std::fs::write(&config, "transport:\n  min_interval_seconds: 0\n").unwrap();
    let out = dir.path().join("out");

    let cli = Cli::try_parse_from([
        "pagewalk".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "messages".to_string(),
        "--token".to_string(),
        "tok".to_string(),
        "--channel".to_string(),
        "9".to_string(),
        "--reference".to_string(),
        "115".to_string(),
        "--before".to_string(),
        "5".to_string(),
        "--after".to_string(),
        "5".to_string(),
        "--user".to_string(),
        "u1".to_string(),
        "--output-dir".to_string(),
        out.display().to_string(),
        "--base-url".to_string(),
        server.uri(),
    ])
    .unwrap();
    Runner::new(cli).run().await.unwrap();

    let mut names: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(names.len(), 3);
    assert!(names[0].starts_with("messages_"));
    assert!(names[1].starts_with("user_u1_messages_"));
    assert!(names[2].starts_with("users_"));

    let messages: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(out.join(&names[0])).unwrap()).unwrap();
    let ids: Vec<&str> = messages.iter().map(|m| m["id"].as_str().unwrap()).collect();
    assert_eq!(
        ids,
        vec!["110", "111", "112", "113", "114", "115", "116", "117", "118", "119", "120"]
    );

    let users = std::fs::read_to_string(out.join(&names[2])).unwrap();
    assert!(users.starts_with("id,username,global_name,discriminator,avatar,bot\n"));
    assert_eq!(users.lines().count(), 4);
}

// ============================================================================
// Resumable Email Run
// ============================================================================

#[tokio::test]
async fn test_email_run_resumes_without_duplicates() {
    let server = MockServer::start().await;
    for (user, email) in [("ana", "ana@example.com"), ("bo", "bo@example.com"), ("cy", "cy@example.com")] {
        Mock::given(method("GET"))
            .and(path(format!("/users/{user}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "login": user, "email": email, "location": null, "company": "Co"
            })))
            .mount(&server)
            .await;
    }

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("stargazers.csv");
    let output = dir.path().join("emails.csv");
    std::fs::write(
        &input,
        "Username,GitHub URL\nana,https://github.com/ana\nbo,https://github.com/bo\ncy,https://github.com/cy\n",
    )
    .unwrap();

    let finder_config = EmailFinderConfig::default()
        .with_urls(server.uri(), server.uri())
        .with_repo_delay(Duration::ZERO);

    // first run stops before the third row
    let mut finder = EmailFinder::new(finder_config.clone(), quick_transport());
    let stats = ItemRunner::new(
        ItemRunConfig::new()
            .with_stop(Some(3))
            .with_item_delay(Duration::ZERO),
    )
    .run(&mut finder, &input, &output)
    .await
    .unwrap();
    assert_eq!(stats.processed, 2);

    let mut finder = EmailFinder::new(finder_config, quick_transport());
    let stats = ItemRunner::new(
        ItemRunConfig::new()
            .with_resume(true)
            .with_item_delay(Duration::ZERO),
    )
    .run(&mut finder, &input, &output)
    .await
    .unwrap();
    assert_eq!(stats.processed, 1);
    assert_eq!(stats.skipped, 2);
    assert_eq!(finder.stats().profile_emails, 1);

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        contents,
        "Username,GitHub URL,Email,Location,Organization,Source\n\
         ana,https://github.com/ana,ana@example.com,,Co,Profile\n\
         bo,https://github.com/bo,bo@example.com,,Co,Profile\n\
         cy,https://github.com/cy,cy@example.com,,Co,Profile\n"
    );
    assert!(!dir.path().join("emails.csv.progress").exists());
}

// ============================================================================
// Stargazer Command
// ============================================================================

#[tokio::test]
async fn test_stargazers_command_writes_csv() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/acme/widget/stargazers"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<ol><li class="follow-list-item"><a href="/zed">zed</a></li>
               <li class="follow-list-item"><a href="/amy">amy</a></li></ol>"#,
        ))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("pagewalk.yaml");
    std::fs::write(&config, "transport:\n  min_interval_seconds: 0\n").unwrap();
    let output = dir.path().join("stars.csv");

    let cli = Cli::try_parse_from([
        "pagewalk".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "stargazers".to_string(),
        format!("{}/acme/widget/stargazers?page=4", server.uri()),
        "--output".to_string(),
        output.display().to_string(),
        "--max-pages".to_string(),
        "3".to_string(),
    ])
    .unwrap();
    Runner::new(cli).run().await.unwrap();

    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(
        contents,
        "Username,GitHub URL\nzed,https://github.com/zed\namy,https://github.com/amy\n"
    );
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("bad.yaml");
    std::fs::write(&config, "transport:\n  max_retries: 0\n").unwrap();

    let cli = Cli::try_parse_from([
        "pagewalk".to_string(),
        "--config".to_string(),
        config.display().to_string(),
        "stargazers".to_string(),
        "https://github.com/acme/widget".to_string(),
    ])
    .unwrap();
    assert!(Runner::new(cli).run().await.is_err());
}
