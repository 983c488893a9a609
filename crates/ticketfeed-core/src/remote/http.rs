//! HTTP implementation of [`RemoteStore`] against a PostgREST-style API.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::feed::{forward_lines, FeedSubscription, SubscriptionStatus};
use super::{FeedTable, RemoteResult, RemoteStore};
use crate::config::CoreConfig;
use crate::constants::{
    ENV_STORE_URL, FEED_RECONNECT_DELAY, HISTORY_TABLE, MESSAGES_TABLE, TICKETS_TABLE,
};
use crate::error::RemoteError;
use crate::models::{ChangeEvent, HistoryEntry, Message, Ticket, TicketStatus};

#[derive(Debug, Clone)]
struct Endpoint {
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

/// Remote store client over REST plus NDJSON change streams.
///
/// Built from configuration even when the endpoint or key is missing; every
/// request then fails with [`RemoteError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    endpoint: Result<Endpoint, &'static str>,
}

impl HttpRemoteStore {
    pub fn from_config(config: &CoreConfig) -> Self {
        let endpoint = match (&config.store_url, &config.api_key) {
            (Some(url), Some(key)) => Ok(Endpoint {
                base_url: url.trim_end_matches('/').to_string(),
                api_key: key.clone(),
            }),
            _ => Err(config.missing_setting().unwrap_or(ENV_STORE_URL)),
        };

        Self {
            client: Client::new(),
            endpoint,
        }
    }

    fn request(&self, method: Method, path: &str) -> RemoteResult<RequestBuilder> {
        let endpoint = self
            .endpoint
            .as_ref()
            .map_err(|missing| RemoteError::NotConfigured(format!("{missing} is not set")))?;

        Ok(self
            .client
            .request(method, format!("{}/{}", endpoint.base_url, path))
            .header("apikey", &endpoint.api_key)
            .bearer_auth(&endpoint.api_key))
    }

    fn table(&self, method: Method, table: &str) -> RemoteResult<RequestBuilder> {
        self.request(method, &format!("rest/v1/{table}"))
    }

    async fn execute(request: RequestBuilder) -> RemoteResult<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> RemoteResult<Vec<T>> {
        let body = Self::execute(self.table(Method::GET, table)?.query(query)).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn run_feed(
        self,
        table: FeedTable,
        sink: mpsc::Sender<ChangeEvent>,
        status: watch::Sender<SubscriptionStatus>,
    ) {
        let name = table.table_name();
        loop {
            let request = match self.request(Method::GET, &format!("realtime/v1/{name}")) {
                Ok(request) => request.header(ACCEPT, "application/x-ndjson"),
                Err(e) => {
                    error!(table = name, error = %e, "cannot open change feed");
                    status.send_replace(SubscriptionStatus::ChannelError(e.to_string()));
                    return;
                }
            };

            match request.send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => {
                    info!(table = name, "subscribed to change feed");
                    status.send_replace(SubscriptionStatus::Subscribed);
                    let body = Box::pin(response.bytes_stream());
                    if let Err(e) = forward_lines(table, body, &sink).await {
                        warn!(table = name, error = %e, "change feed dropped");
                        status.send_replace(SubscriptionStatus::ChannelError(e.to_string()));
                    }
                }
                Err(e) => {
                    error!(table = name, error = %e, "change feed subscription failed");
                    status.send_replace(SubscriptionStatus::ChannelError(e.to_string()));
                }
            }

            if sink.is_closed() {
                break;
            }
            tokio::time::sleep(FEED_RECONNECT_DELAY).await;
            debug!(table = name, "reconnecting change feed");
            status.send_replace(SubscriptionStatus::Connecting);
        }
        status.send_replace(SubscriptionStatus::Closed);
    }
}

impl RemoteStore for HttpRemoteStore {
    fn fetch_recent_tickets(&self, limit: usize) -> BoxFuture<'_, RemoteResult<Vec<Ticket>>> {
        async move {
            self.fetch_rows(
                TICKETS_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("order", "updated_at.desc".to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await
        }
        .boxed()
    }

    fn fetch_messages<'a>(
        &'a self,
        ticket_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<Message>>> {
        async move {
            self.fetch_rows(
                MESSAGES_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("ticket_id", format!("eq.{ticket_id}")),
                    ("order", "created_at.asc".to_string()),
                ],
            )
            .await
        }
        .boxed()
    }

    fn fetch_all_ticket_ids(&self) -> BoxFuture<'_, RemoteResult<Vec<String>>> {
        async move {
            let rows: Vec<IdRow> = self
                .fetch_rows(TICKETS_TABLE, &[("select", "id".to_string())])
                .await?;
            Ok(rows.into_iter().map(|row| row.id).collect())
        }
        .boxed()
    }

    fn fetch_history<'a>(
        &'a self,
        ticket_id: &'a str,
    ) -> BoxFuture<'a, RemoteResult<Vec<HistoryEntry>>> {
        async move {
            self.fetch_rows(
                HISTORY_TABLE,
                &[
                    ("select", "*".to_string()),
                    ("ticket_id", format!("eq.{ticket_id}")),
                    ("order", "created_at.desc".to_string()),
                ],
            )
            .await
        }
        .boxed()
    }

    fn delete_ticket<'a>(&'a self, ticket_id: &'a str) -> BoxFuture<'a, RemoteResult<()>> {
        async move {
            let request = self
                .table(Method::DELETE, TICKETS_TABLE)?
                .query(&[("id", format!("eq.{ticket_id}"))]);
            Self::execute(request).await.map(|_| ())
        }
        .boxed()
    }

    fn delete_tickets<'a>(&'a self, ticket_ids: &'a [String]) -> BoxFuture<'a, RemoteResult<()>> {
        async move {
            let request = self
                .table(Method::DELETE, TICKETS_TABLE)?
                .query(&[("id", format!("in.({})", ticket_ids.join(",")))]);
            Self::execute(request).await.map(|_| ())
        }
        .boxed()
    }

    fn update_ticket_status<'a>(
        &'a self,
        ticket_id: &'a str,
        status: TicketStatus,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        async move {
            let request = self
                .table(Method::PATCH, TICKETS_TABLE)?
                .query(&[("id", format!("eq.{ticket_id}"))])
                .header("Prefer", "return=minimal")
                .json(&json!({ "status": status }));
            Self::execute(request).await.map(|_| ())
        }
        .boxed()
    }

    fn subscribe(&self, table: FeedTable, sink: mpsc::Sender<ChangeEvent>) -> FeedSubscription {
        let (status_tx, status_rx) = watch::channel(SubscriptionStatus::Connecting);
        let store = self.clone();
        let task = tokio::spawn(store.run_feed(table, sink, status_tx));
        FeedSubscription::new(table, status_rx, task)
    }
}
