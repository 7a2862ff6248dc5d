#![allow(missing_docs, clippy::expect_used, clippy::unwrap_used)]

mod common;

use common::{blogkb_cmd, config_for};
use predicates::prelude::*;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOC: &str = "# Documentation\n## Git\nUse conventional commits.\n# Tech Blog\n## K8s Pod Shutdown\nurl: /posts/k8s\ncategory: infra\ndate: 2024-05-01\nHandled SIGTERM with a preStop hook.";

async fn blog_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DOC))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn search_prints_ranked_text() -> anyhow::Result<()> {
    let server = blog_server().await;
    let config = config_for(&server.uri());

    blogkb_cmd(&config)
        .args(["search", "kubernetes", "shutdown", "--limit", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "# Global Search Results for 'kubernetes shutdown' (Top 1)",
        ))
        .stdout(predicate::str::contains("## 1. K8s Pod Shutdown"))
        .stdout(predicate::str::contains("Git").not());
    Ok(())
}

#[tokio::test]
async fn category_json_output() -> anyhow::Result<()> {
    let server = blog_server().await;
    let config = config_for(&server.uri());

    let output = blogkb_cmd(&config)
        .args(["category", "infra", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: Value = serde_json::from_slice(&output)?;
    assert_eq!(json["type"], "sections");
    let sections = json["sections"].as_array().cloned().unwrap_or_default();
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0]["title"], "K8s Pod Shutdown");
    assert_eq!(sections[0]["category"], "infra");
    Ok(())
}

#[tokio::test]
async fn health_reports_without_fetching() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DOC))
        .expect(0)
        .mount(&server)
        .await;
    let config = config_for(&server.uri());

    let output = blogkb_cmd(&config)
        .args(["health", "-f", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: Value = serde_json::from_slice(&output)?;
    assert_eq!(json["report"]["overall_status"], "error");
    assert_eq!(json["report"]["cache"]["has_content"], false);
    Ok(())
}

#[tokio::test]
async fn unavailable_source_exits_with_network_code() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let config = config_for(&server.uri());

    blogkb_cmd(&config)
        .args(["search", "git"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Content unavailable"));
    Ok(())
}

#[tokio::test]
async fn negative_days_is_invalid_query() -> anyhow::Result<()> {
    let server = blog_server().await;
    let config = config_for(&server.uri());

    blogkb_cmd(&config)
        .args(["recent", "--days", "-3"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("days must be non-negative"));
    Ok(())
}

#[tokio::test]
async fn show_missing_title_exits_not_found() -> anyhow::Result<()> {
    let server = blog_server().await;
    let config = config_for(&server.uri());

    blogkb_cmd(&config)
        .args(["show", "does", "not", "exist"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("No section found"));
    Ok(())
}
