//! HTTP reconciliation backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use shared::ResourceType;
use shared::models::{Order, OrderStatus, OrderUpdateStatus};
use shared::sync::{DeltaEnvelope, ViewEnvelope, ViewFilter, decode_updated_order};

use crate::backend::{DeltaBatch, ResourceBatch, SyncBackend, ViewBatch};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::session::Credential;

/// REST client for the dashboard sync endpoints
#[derive(Debug, Clone)]
pub struct HttpSyncBackend {
    client: Client,
    base_url: String,
    view_fetch_limit: u32,
}

impl HttpSyncBackend {
    /// Create a new HTTP backend from configuration
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_url.clone(),
            view_fetch_limit: config.view_fetch_limit,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Make a GET request
    async fn get(
        &self,
        credential: &Credential,
        path: &str,
        query: &[(&'static str, String)],
    ) -> SyncResult<Value> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Make a PUT request with JSON body
    async fn put<B: serde::Serialize>(
        &self,
        credential: &Credential,
        path: &str,
        body: &B,
    ) -> SyncResult<Value> {
        let response = self
            .client
            .put(self.url(path))
            .json(body)
            .header(reqwest::header::AUTHORIZATION, credential.bearer())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Handle the HTTP response
    async fn handle_response(response: reqwest::Response) -> SyncResult<Value> {
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await?;
            return match status {
                StatusCode::UNAUTHORIZED => Err(SyncError::Unauthorized),
                StatusCode::FORBIDDEN => Err(SyncError::Forbidden(text)),
                StatusCode::NOT_FOUND => Err(SyncError::NotFound(text)),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    Err(SyncError::Validation(text))
                }
                _ => Err(SyncError::Internal(format!("HTTP {status}: {text}"))),
            };
        }

        response.json().await.map_err(Into::into)
    }
}

#[async_trait]
impl SyncBackend for HttpSyncBackend {
    async fn fetch_delta(
        &self,
        credential: &Credential,
        resource: ResourceType,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<DeltaBatch> {
        let path = format!("sync/{}", resource.path_segment());
        let query: Vec<(&'static str, String)> = since
            .map(|since| vec![("since", since.to_rfc3339())])
            .unwrap_or_default();

        let body = self.get(credential, &path, &query).await?;
        let envelope = DeltaEnvelope::from_value(resource, body)?;
        tracing::debug!(
            resource = %resource,
            count = envelope.items.len(),
            full = since.is_none(),
            "Fetched sync batch"
        );

        Ok(DeltaBatch {
            batch: ResourceBatch::decode(resource, envelope.items),
            synced_at: envelope.synced_at,
        })
    }

    async fn fetch_view(
        &self,
        credential: &Credential,
        resource: ResourceType,
        outlet_id: &str,
        filter: &ViewFilter,
    ) -> SyncResult<ViewBatch> {
        let path = format!("{}/outlet/{}", resource.path_segment(), outlet_id);
        let mut filter = filter.clone();
        if filter.limit.is_none() {
            filter.limit = Some(self.view_fetch_limit);
        }

        let body = self.get(credential, &path, &filter.query_pairs()).await?;
        let envelope = ViewEnvelope::from_value(resource, body)?;

        Ok(ViewBatch {
            batch: ResourceBatch::decode(resource, envelope.items),
            last_sequence_id: envelope.last_sequence_id,
        })
    }

    async fn update_order_status(
        &self,
        credential: &Credential,
        order_id: &str,
        status: OrderStatus,
    ) -> SyncResult<Order> {
        let path = format!("order/{order_id}/status");
        let body = self
            .put(credential, &path, &OrderUpdateStatus { status })
            .await?;
        Ok(decode_updated_order(body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base() {
        let config = SyncConfig::new("http://localhost:3000/api/");
        let backend = HttpSyncBackend::new(&config).unwrap();
        assert_eq!(
            backend.url("sync/menu-item"),
            "http://localhost:3000/api/sync/menu-item"
        );
    }
}
