//! # CCO Client
//!
//! Talks to a Correlated Cross-Occurrence recommender deployment:
//!
//! - [`Engine`] - Runs [`Query`](cco_core::Query)s, records events, exports JSON Lines
//! - [`EngineConfig`] - Hosts, ports, access key, event concurrency
//! - [`QueryClient`] / [`EventClient`] - Remote collaborator seams
//! - [`HttpQueryClient`] / [`HttpEventClient`] - `reqwest` implementations
//! - [`EventExporter`] - JSON-Lines writer for batch import
//!
//! ## Example
//!
//! ```rust,no_run
//! use cco_client::{Engine, EngineConfig};
//! use serde_json::json;
//!
//! # async fn run() -> cco_client::Result<()> {
//! let engine = Engine::new(EngineConfig {
//!     host: "recs.internal".to_string(),
//!     access_key: Some("secret".to_string()),
//!     ..Default::default()
//! })?;
//!
//! engine.upsert_entity("item", "i-1", json!({"category": ["shoes"]})).await?;
//! engine.record_event("purchase", "u-1", "i-1", json!({}), None).await?;
//!
//! let query = engine
//!     .query()
//!     .for_user("u-1")
//!     .exclude([("category", "socks")])
//!     .limit(10);
//! let scores = engine.item_scores(&query).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod http;
pub mod transport;

pub use config::EngineConfig;
pub use engine::{Engine, Recommendation, Recommendations, RecommendationsIter, Reifier};
pub use error::{Error, Result};
pub use export::EventExporter;
pub use http::{HttpEventClient, HttpQueryClient};
pub use transport::{EventClient, QueryClient};
