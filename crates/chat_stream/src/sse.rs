//! HTTP server-sent-events channel.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Client;

use crate::channel::{ChannelFactory, ChannelMessage, ChannelStream, StreamRequest};
use crate::error::ChannelError;
use crate::event::StreamEvent;

/// Opens `GET {api_base}{path}?{params}&bearer={token}` event streams.
#[derive(Clone)]
pub struct SseChannelFactory {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl SseChannelFactory {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(Client::new(), api_base, token)
    }

    pub fn with_client(client: Client, api_base: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn url_for(&self, request: &StreamRequest) -> String {
        format!("{}{}", self.api_base, request.path)
    }
}

impl ChannelFactory for SseChannelFactory {
    fn open(&self, request: StreamRequest) -> ChannelStream {
        let url = self.url_for(&request);
        let mut query = request.params;
        if let Some(token) = &self.token {
            query.push(("bearer".to_string(), token.clone()));
        }
        let client = self.client.clone();

        Box::pin(async_stream::stream! {
            tracing::debug!(%url, "SseChannel: opening");
            let response = match client
                .get(&url)
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .query(&query)
                .send()
                .await
            {
                Ok(response) => response,
                Err(error) => {
                    yield ChannelMessage::Failed(ChannelError::Http(error.to_string()));
                    return;
                }
            };

            let status = response.status();
            if !status.is_success() {
                tracing::warn!(%url, %status, "SseChannel: open rejected");
                yield ChannelMessage::Failed(ChannelError::Status(status.as_u16()));
                return;
            }

            yield ChannelMessage::Opened;

            let mut events = response.bytes_stream().eventsource();
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        yield ChannelMessage::Event(StreamEvent::classify(&event.event, &event.data));
                    }
                    Err(error) => {
                        yield ChannelMessage::Failed(ChannelError::Sse(error.to_string()));
                        return;
                    }
                }
            }
            tracing::debug!(%url, "SseChannel: stream ended");
        })
    }
}
