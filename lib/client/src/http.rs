// HTTP implementations of the query and event collaborators
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::transport::{EventClient, QueryClient};
use async_trait::async_trait;
use cco_core::{Event, QueryPayload};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

fn build_http_client(config: &EngineConfig, pool_size: usize) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().pool_max_idle_per_host(pool_size);
    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Read a response body as JSON, turning non-2xx statuses into errors.
/// An empty success body maps to `null`.
async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!(status = status.as_u16(), "request rejected by server");
        return Err(Error::Status {
            status: status.as_u16(),
            body,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

/// Posts queries to `http://{host}:{engine_port}/queries.json`
pub struct HttpQueryClient {
    http: reqwest::Client,
    url: String,
}

impl HttpQueryClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config, 1)?,
            url: config.engine_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn send_query(&self, payload: &QueryPayload) -> Result<Value> {
        debug!(url = %self.url, payload = ?payload, "sending query");
        let response = self.http.post(&self.url).json(payload).send().await?;
        read_json(response).await
    }
}

/// Posts events to `http://{host}:{event_port}/events.json?accessKey=...`.
///
/// At most `threads` requests are in flight at once; callers beyond that
/// wait for a permit.
pub struct HttpEventClient {
    http: reqwest::Client,
    url: String,
    access_key: Option<String>,
    permits: Arc<Semaphore>,
}

impl HttpEventClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            http: build_http_client(config, config.threads)?,
            url: config.events_url(),
            access_key: config.access_key.clone(),
            permits: Arc::new(Semaphore::new(config.threads)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of requests that may start right now
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Refuse new events. Requests already holding a permit run to completion;
    /// waiting and later callers get [`Error::ClientClosed`].
    pub fn close(&self) {
        self.permits.close();
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}

#[async_trait]
impl EventClient for HttpEventClient {
    async fn create_event(&self, event: &Event) -> Result<Value> {
        let _permit = self.permits.acquire().await.map_err(|_| Error::ClientClosed)?;

        debug!(url = %self.url, event = %event.event, entity_id = %event.entity_id, "creating event");
        let mut request = self.http.post(&self.url).json(event);
        if let Some(key) = &self.access_key {
            request = request.query(&[("accessKey", key)]);
        }
        let response = request.send().await?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_urls() {
        let config = EngineConfig {
            host: "recs".to_string(),
            engine_port: 9000,
            event_port: 9070,
            threads: 3,
            ..Default::default()
        };

        let queries = HttpQueryClient::new(&config).unwrap();
        assert_eq!(queries.url(), "http://recs:9000/queries.json");

        let events = HttpEventClient::new(&config).unwrap();
        assert_eq!(events.url(), "http://recs:9070/events.json");
        assert_eq!(events.available_permits(), 3);
    }

    #[test]
    fn test_event_client_rejects_zero_threads() {
        let config = EngineConfig {
            threads: 0,
            ..Default::default()
        };
        assert!(HttpEventClient::new(&config).is_err());
    }

    #[tokio::test]
    async fn test_closed_event_client_refuses_events() {
        // nothing listens here; a refused event must fail before connecting
        let config = EngineConfig {
            host: "127.0.0.1".to_string(),
            event_port: 9,
            threads: 2,
            ..Default::default()
        };
        let client = HttpEventClient::new(&config).unwrap();
        assert!(!client.is_closed());

        client.close();
        assert!(client.is_closed());

        let event = Event::set_entity("user", "u-1", serde_json::json!({}));
        let result = client.create_event(&event).await;
        assert!(matches!(result, Err(Error::ClientClosed)));
        assert_eq!(result.unwrap_err().to_string(), "Event client is closed");
    }
}
