// SPDX-FileCopyrightText: 2026 Annex Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! IM core adapter for the Annex overlay.
//!
//! Implements [`MessageStoreAdapter`] over the IM core's HTTP API.

pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::debug;

use annex_config::model::UpstreamConfig;
use annex_core::im::{
    ChannelMessageQuery, ClearUnread, ConversationQuery, RawChannelMessages, RawConversation,
    RevokeNotice, SubscriberChange,
};
use annex_core::{AnnexError, HealthStatus, MessageStoreAdapter, PluginAdapter};

pub use client::ImClient;

/// The authoritative message store, reached over HTTP.
pub struct ImMessageStore {
    client: ImClient,
}

impl ImMessageStore {
    pub fn new(config: &UpstreamConfig) -> Result<Self, AnnexError> {
        Ok(Self {
            client: ImClient::new(config)?,
        })
    }

    pub fn client(&self) -> &ImClient {
        &self.client
    }
}

#[async_trait]
impl PluginAdapter for ImMessageStore {
    fn name(&self) -> &str {
        "im-http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    async fn health_check(&self) -> Result<HealthStatus, AnnexError> {
        match self.client.ping().await {
            Ok(status) => {
                debug!(status = %status, "IM core reachable");
                Ok(HealthStatus::Healthy)
            }
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), AnnexError> {
        debug!("IM message store shutting down");
        Ok(())
    }
}

#[async_trait]
impl MessageStoreAdapter for ImMessageStore {
    async fn fetch_conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<RawConversation>, AnnexError> {
        self.client.sync_conversations(query).await
    }

    async fn fetch_channel_messages(
        &self,
        query: &ChannelMessageQuery,
    ) -> Result<RawChannelMessages, AnnexError> {
        self.client.sync_channel_messages(query).await
    }

    async fn send_revoke(&self, notice: &RevokeNotice) -> Result<(), AnnexError> {
        self.client.send_revoke(notice).await
    }

    async fn add_subscribers(&self, change: &SubscriberChange) -> Result<(), AnnexError> {
        self.client.add_subscribers(change).await
    }

    async fn clear_conversation_unread(&self, req: &ClearUnread) -> Result<(), AnnexError> {
        self.client.clear_unread(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn adapter_identity() {
        let store = ImMessageStore::new(&UpstreamConfig::default()).unwrap();
        assert_eq!(store.name(), "im-http");
        assert_eq!(store.client().base_url(), "http://127.0.0.1:5001");
    }

    fn store_for(api_url: String) -> ImMessageStore {
        ImMessageStore::new(&UpstreamConfig {
            api_url,
            timeout_secs: 2,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn health_check_reports_reachable_core() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(server.uri());
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn health_check_reports_unreachable_core() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let status = store_for(uri).health_check().await.unwrap();
        assert!(matches!(status, HealthStatus::Unhealthy(_)), "got {status:?}");
    }
}
