//! # cco
//!
//! Query builder and event-recording client for Correlated Cross-Occurrence
//! recommenders served behind an HTTP event server and an HTTP query server.
//!
//! ## Quick Start
//!
//! ### From the command line
//!
//! ```bash
//! cargo install cco
//! cco --host recs.internal query --user u-1 --filter channel=1,2 --exclude price_range=Comp --limit 5
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use cco::prelude::*;
//!
//! # async fn run() -> cco::ClientResult<()> {
//! let engine = Engine::new(EngineConfig::default())?;
//!
//! let query = engine
//!     .query()
//!     .for_user("u-1")
//!     .filter([("channel", [1, 2])])
//!     .exclude([("price_range", "Comp")])
//!     .boost(1.5, [("category", "shoes")])?
//!     .limit(5);
//!
//! for score in engine.item_scores(&query).await? {
//!     println!("{} {}", score.item, score.score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Crate Structure
//!
//! - [`cco-core`](https://docs.rs/cco-core) - Query builder, conditions, event shapes
//! - [`cco-client`](https://docs.rs/cco-client) - Engine, HTTP transport, JSON-Lines export

// Re-export core types
pub use cco_core::{
    Condition, ConditionKind, FieldValues,
    Query, QueryPayload,
    Event, ItemScore,
    Error as QueryError, Result as QueryResult,
};

// Re-export client
pub use cco_client::{
    Engine, EngineConfig, Recommendation, Recommendations, Reifier,
    QueryClient, EventClient,
    HttpQueryClient, HttpEventClient,
    EventExporter,
    Error as ClientError, Result as ClientResult,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Condition, FieldValues,
        Query, QueryPayload,
        Event, ItemScore,
        Engine, EngineConfig, Recommendation, Recommendations,
        QueryClient, EventClient,
        EventExporter,
    };
}
