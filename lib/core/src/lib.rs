//! # CCO Core
//!
//! Core types for the CCO recommender client.
//!
//! This crate is pure data and has no I/O:
//!
//! - [`Query`] - Chainable builder for recommendation queries
//! - [`Condition`] - Named field match with a bias (filter, boost or deboost)
//! - [`QueryPayload`] - Wire form sent to the engine server
//! - [`Event`] - Entity and user-action events for the event server
//! - [`ItemScore`] - A scored recommendation returned by the engine
//!
//! ## Example
//!
//! ```rust
//! use cco_core::Query;
//!
//! let query = Query::new()
//!     .for_user("u-1")
//!     .filter([("channel", [1, 2])])
//!     .exclude([("price_range", "Comp")])
//!     .limit(5);
//!
//! let json = query.to_json().unwrap();
//! assert_eq!(json["user"], "u-1");
//! assert_eq!(json["fields"][0]["values"][1], "2");
//! ```
//!
//! ## Bias values
//!
//! | bias        | meaning                  | builder call        |
//! |-------------|--------------------------|---------------------|
//! | `-1.0`      | hard include             | [`Query::filter`]   |
//! | `0.0`       | hard exclude             | [`Query::exclude`]  |
//! | `(0, 1)`    | multiplicative deboost   | [`Query::deboost`]  |
//! | `(1, inf)`  | multiplicative boost     | [`Query::boost`]    |

pub mod condition;
pub mod error;
pub mod event;
pub mod item_score;
pub mod query;

pub use condition::{Condition, ConditionKind, FieldValues, EXCLUDE_BIAS, INCLUDE_BIAS};
pub use error::{Error, Result};
pub use event::{format_event_time, Event, ITEM_ENTITY, SET_EVENT, USER_ENTITY};
pub use item_score::ItemScore;
pub use query::{Query, QueryPayload};
