//! Conversation list and history endpoints.

use async_trait::async_trait;
use chat_core::MessageRecord;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ApiError;

pub const DEFAULT_FETCH_ERROR: &str = "Fetching Conversations Failed.";

/// One entry of the user's conversation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(deserialize_with = "de_chat_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

fn de_chat_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) => Ok(id),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid chat id: {other}"))),
    }
}

#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// The user's conversations, in server order.
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError>;

    /// All stored messages of a conversation, in server order.
    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<MessageRecord>, ApiError>;
}

/// `{ "status": ..., "data": [...], "message": ... }`
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
}

pub struct HttpConversationApi {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl HttpConversationApi {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// GET `path` and unwrap the envelope's `data` list. `null` data is empty.
    async fn get_list<T>(&self, path: &str) -> Result<Vec<T>, ApiError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.api_base, path);
        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let ok = response.status().is_success();
        let body = response.bytes().await?;
        // A body that is not an envelope only matters when the status was fine.
        let envelope = serde_json::from_slice::<Envelope>(&body);

        let envelope = match (ok, envelope) {
            (true, Ok(envelope)) if envelope.status.as_deref() != Some("error") => envelope,
            (true, Err(error)) => return Err(ApiError::Json(error)),
            (_, Ok(envelope)) => {
                let message = envelope
                    .message
                    .unwrap_or_else(|| DEFAULT_FETCH_ERROR.to_string());
                tracing::warn!(path, %message, "ConversationApi: server rejected fetch");
                return Err(ApiError::Server(message));
            }
            (false, Err(_)) => return Err(ApiError::Server(DEFAULT_FETCH_ERROR.to_string())),
        };

        match envelope.data {
            Value::Null => Ok(Vec::new()),
            data => Ok(serde_json::from_value(data)?),
        }
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, ApiError> {
        let chats: Vec<ChatSummary> = self.get_list("/chats").await?;
        tracing::debug!(count = chats.len(), "ConversationApi: listed chats");
        Ok(chats)
    }

    async fn fetch_messages(&self, chat_id: &str) -> Result<Vec<MessageRecord>, ApiError> {
        let records: Vec<MessageRecord> = self
            .get_list(&format!("/chats/{chat_id}/messages"))
            .await?;
        tracing::debug!(chat_id, count = records.len(), "ConversationApi: fetched messages");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::NodeId;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn network_tests_disabled() -> bool {
        std::env::var_os("CODEX_SANDBOX_NETWORK_DISABLED").is_some()
    }

    #[tokio::test]
    async fn fetches_and_decodes_records() {
        if network_tests_disabled() {
            return;
        }

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chats/5/messages"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": [
                    {"id": 1, "role": "user", "content": [{"value": "hi"}], "parent_id": null},
                    {"id": 2, "role": "assistant", "content": [{"value": "hello"}], "parent_id": 1,
                     "is_active_variant": 1}
                ]
            })))
            .mount(&mock_server)
            .await;

        let api = HttpConversationApi::new(mock_server.uri(), Some("tok".to_string()));
        let records = api.fetch_messages("5").await.expect("records");

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].parent_id, Some(NodeId::from("1")));
        assert!(records[1].is_active_variant);
        assert_eq!(records[1].text(), "hello");
    }

    #[tokio::test]
    async fn lists_chats_with_numeric_or_string_ids() {
        if network_tests_disabled() {
            return;
        }

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chats"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": [
                    {"id": 5, "title": "Rust questions"},
                    {"id": "abc", "title": "Travel plans"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let api = HttpConversationApi::new(mock_server.uri(), Some("tok".to_string()));
        let chats = api.list_chats().await.expect("chats");

        assert_eq!(
            chats,
            vec![
                ChatSummary {
                    id: "5".to_string(),
                    title: "Rust questions".to_string()
                },
                ChatSummary {
                    id: "abc".to_string(),
                    title: "Travel plans".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn chat_list_failure_uses_default_message() {
        if network_tests_disabled() {
            return;
        }

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chats"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "status": "error"
            })))
            .mount(&mock_server)
            .await;

        let api = HttpConversationApi::new(mock_server.uri(), None);
        match api.list_chats().await {
            Err(ApiError::Server(message)) => assert_eq!(message, DEFAULT_FETCH_ERROR),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn error_status_uses_server_message_or_default() {
        if network_tests_disabled() {
            return;
        }

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chats/1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "message": "Chat not found"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/chats/2/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&mock_server)
            .await;

        let api = HttpConversationApi::new(mock_server.uri(), None);

        match api.fetch_messages("1").await {
            Err(ApiError::Server(message)) => assert_eq!(message, "Chat not found"),
            other => panic!("expected server error, got {other:?}"),
        }
        match api.fetch_messages("2").await {
            Err(ApiError::Server(message)) => assert_eq!(message, DEFAULT_FETCH_ERROR),
            other => panic!("expected server error, got {other:?}"),
        }
    }
}
