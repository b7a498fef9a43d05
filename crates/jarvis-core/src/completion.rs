use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::state::{RequestToken, Submission};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request to completion service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion service returned status {0}")]
    Status(StatusCode),
    #[error("no reply within {0:?}")]
    Timeout(Duration),
}

/// The remote text-completion service: one query in, one reply out.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, query: &str) -> Result<String, CompletionError>;
}

/// A settled completion call, tagged with the submission it belongs to
#[derive(Debug)]
pub struct Completion {
    pub token: RequestToken,
    pub outcome: Result<String, CompletionError>,
}

/// Completion service reached with a plain GET; the reply is the body text.
#[derive(Clone)]
pub struct HttpCompletionClient {
    client: Client,
    endpoint: String,
    query_param: String,
}

impl HttpCompletionClient {
    pub fn new(endpoint: &str, query_param: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            query_param: query_param.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.endpoint, &config.query_param)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, query: &str) -> Result<String, CompletionError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[(self.query_param.as_str(), query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CompletionError::Status(response.status()));
        }

        Ok(response.text().await?)
    }
}

/// Make the single completion attempt for `submission`, giving up after `timeout`.
pub async fn run(
    service: &dyn CompletionService,
    submission: Submission,
    timeout: Duration,
) -> Completion {
    let Submission { token, query } = submission;
    debug!(token = token.value(), "requesting completion");

    let outcome = match tokio::time::timeout(timeout, service.complete(&query)).await {
        Ok(result) => result,
        Err(_) => Err(CompletionError::Timeout(timeout)),
    };

    Completion { token, outcome }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ConversationStore, Message, Reconciliation, UNREACHABLE_TEXT};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NeverReplies;

    #[async_trait]
    impl CompletionService for NeverReplies {
        async fn complete(&self, _query: &str) -> Result<String, CompletionError> {
            std::future::pending().await
        }
    }

    struct Echo;

    #[async_trait]
    impl CompletionService for Echo {
        async fn complete(&self, query: &str) -> Result<String, CompletionError> {
            Ok(format!("you said: {}", query))
        }
    }

    #[tokio::test]
    async fn test_http_client_sends_query_and_returns_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/android"))
            .and(query_param("q", "what is 1 + 1?"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2\n```py\nprint(1 + 1)\n```"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = HttpCompletionClient::new(&format!("{}/android", mock_server.uri()), "q");
        let reply = client.complete("what is 1 + 1?").await.unwrap();

        assert_eq!(reply, "2\n```py\nprint(1 + 1)\n```");
    }

    #[tokio::test]
    async fn test_http_client_non_success_status_is_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&mock_server)
            .await;

        let client = HttpCompletionClient::new(&mock_server.uri(), "q");
        let err = client.complete("hello").await.unwrap_err();

        match err {
            CompletionError::Status(status) => assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_client_transport_error() {
        // Nothing listens on port 9 (discard) on test hosts.
        let client = HttpCompletionClient::new("http://127.0.0.1:9/", "q");
        let err = client.complete("hello").await.unwrap_err();

        assert!(matches!(err, CompletionError::Transport(_)));
    }

    #[tokio::test]
    async fn test_run_tags_outcome_with_token() {
        let mut store = ConversationStore::new();
        let submission = store.submit("ping").unwrap();
        let token = submission.token;

        let completion = run(&Echo, submission, Duration::from_secs(5)).await;

        assert_eq!(completion.token, token);
        assert_eq!(completion.outcome.unwrap(), "you said: ping");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_resolves_placeholder_to_error() {
        let mut store = ConversationStore::new();
        let submission = store.submit("hello?").unwrap();

        let completion = run(&NeverReplies, submission, Duration::from_secs(30)).await;
        assert!(matches!(
            completion.outcome,
            Err(CompletionError::Timeout(d)) if d == Duration::from_secs(30)
        ));

        let result = store.reconcile(completion.token, completion.outcome);

        assert_eq!(result, Reconciliation::Applied);
        assert_eq!(store.messages().last(), Some(&Message::bot(UNREACHABLE_TEXT)));
        assert!(!store.is_pending());
    }
}
