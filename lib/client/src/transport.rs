//! Remote collaborators of the engine
//!
//! [`Engine`](crate::Engine) talks to the recommender only through these two
//! traits. [`HttpQueryClient`](crate::HttpQueryClient) and
//! [`HttpEventClient`](crate::HttpEventClient) are the stock implementations;
//! anything else (an in-memory fake, a batching client) can be injected with
//! `Engine::with_query_client` / `Engine::with_event_client`.

use crate::error::Result;
use async_trait::async_trait;
use cco_core::{Event, QueryPayload};
use serde_json::Value;

#[async_trait]
pub trait QueryClient: Send + Sync {
    /// Send a query and return the engine's JSON response unchanged
    async fn send_query(&self, payload: &QueryPayload) -> Result<Value>;
}

#[async_trait]
pub trait EventClient: Send + Sync {
    /// Create one event and return the server's JSON response
    async fn create_event(&self, event: &Event) -> Result<Value>;
}
