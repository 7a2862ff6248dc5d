//! End-to-end tests over real HTTP against a local mock server.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use blogkb_core::{Config, Error, FetchError, KnowledgeBase, QueryFacade, SectionKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LLMS_TXT: &str = "# jeongil.dev

## Documentation

- [Git Convention](/ko/docs/git/index.md): Conventional commits and branch naming.

## Tech Blog

### Infrastructure & DevOps

- [K8s Pod Shutdown](/ko/posts/k8s.md): Published 2024-05-01. Handled SIGTERM with a preStop hook during graceful shutdown.

### Backend

- [Kafka Consumer Lag](/ko/posts/kafka.md): Published 2024-04-11. Rebalancing after broker shutdown.
";

fn config(server: &MockServer) -> Config {
    Config {
        base_url: server.uri(),
        document_path: "/ko/llms.txt".to_string(),
        http_timeout_seconds: 2.0,
        http_max_retries: 3,
        http_retry_base_delay_seconds: 0.01,
        circuit_failure_threshold: 5,
        ..Config::default()
    }
}

async fn serve_document(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LLMS_TXT))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_parse_and_search_over_http() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_document(&server).await;

    let kb = KnowledgeBase::from_config(&config(&server))?;
    let hits = kb.search_all("kubernetes shutdown sigterm", Some(5)).await?;

    assert_eq!(hits[0].section.title, "K8s Pod Shutdown");
    assert_eq!(
        hits[0].section.url.as_deref(),
        Some(format!("{}/ko/posts/k8s", server.uri()).as_str())
    );
    assert_eq!(hits[0].section.category.as_deref(), Some("infrastructure"));

    let docs = kb.summary(SectionKind::Documentation).await?;
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].title, "Git Convention");
    Ok(())
}

#[tokio::test]
async fn test_document_fetched_once_within_ttl() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LLMS_TXT))
        .expect(1)
        .mount(&server)
        .await;

    let kb = KnowledgeBase::from_config(&config(&server))?;
    kb.refresh_content().await?;
    kb.search_all("kafka", None).await?;
    kb.get_category_posts("backend").await?;
    kb.raw_document().await?;
    Ok(())
}

#[tokio::test]
async fn test_transient_failure_is_retried() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    serve_document(&server).await;

    let kb = KnowledgeBase::from_config(&config(&server))?;
    let counts = kb.refresh_content().await?;

    assert_eq!(counts.total, 3);
    assert_eq!(counts.documentation, 1);
    Ok(())
}

#[tokio::test]
async fn test_not_found_is_unavailable_without_retry() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let kb = KnowledgeBase::from_config(&config(&server))?;
    let err = kb.get_category_posts("infra").await.unwrap_err();

    assert_eq!(
        err,
        Error::Unavailable(Box::new(Error::Fetch(FetchError::HttpStatus(404))))
    );
    assert_eq!(err.category(), "unavailable");
    assert!(!err.is_recoverable());
    Ok(())
}

#[tokio::test]
async fn test_slow_response_times_out() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LLMS_TXT)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let kb = KnowledgeBase::from_config(&Config {
        http_timeout_seconds: 0.1,
        http_max_retries: 1,
        ..config(&server)
    })?;
    let err = kb.refresh_content().await.unwrap_err();

    assert_eq!(err, Error::Fetch(FetchError::Timeout));
    assert_eq!(err.category(), "timeout");
    Ok(())
}

#[tokio::test]
async fn test_circuit_opens_after_repeated_failures() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ko/llms.txt"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let kb = KnowledgeBase::from_config(&Config {
        http_max_retries: 1,
        circuit_failure_threshold: 2,
        ..config(&server)
    })?;

    for _ in 0..2 {
        let err = kb.refresh_content().await.unwrap_err();
        assert_eq!(err, Error::Fetch(FetchError::HttpStatus(500)));
    }

    let err = kb.refresh_content().await.unwrap_err();
    assert!(matches!(err, Error::Fetch(FetchError::CircuitOpen { .. })));
    assert!(err.is_recoverable());

    let health = kb.health_check();
    assert_eq!(health.circuit.consecutive_failures, 2);
    assert!(health.circuit.retry_after_secs.is_some());
    Ok(())
}

#[tokio::test]
async fn test_full_content_follows_markdown_link() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    serve_document(&server).await;
    Mock::given(method("GET"))
        .and(path("/ko/posts/k8s.md"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("# K8s Pod Shutdown\n\nFull post."),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ko/posts/kafka.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let kb = KnowledgeBase::from_config(&config(&server))?;

    let full = kb.full_content("pod shutdown").await?;
    assert_eq!(full.as_deref(), Some("# K8s Pod Shutdown\n\nFull post."));

    let fallback = kb.full_content("kafka").await?.unwrap();
    assert!(fallback.contains("Rebalancing after broker shutdown."));
    assert!(fallback.contains("Failed to fetch full content"));
    Ok(())
}
