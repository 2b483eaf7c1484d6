//! Engine orchestration
//!
//! [`Engine`] turns queries into engine-server requests and entity/user
//! actions into event-server requests. It owns no entity state; the only
//! thing it remembers is the two client handles, built on first use.
//!
//! ```text
//!   Query ──payload()──> QueryClient ──itemScores──> [reifier] ──> Recommendations
//!   upsert_entity / record_event ──Event──> EventClient
//!   export_entity / export_event ──Event──> io::Write (JSON Lines)
//! ```

use crate::config::EngineConfig;
use crate::error::Result;
use crate::export;
use crate::http::{HttpEventClient, HttpQueryClient};
use crate::transport::{EventClient, QueryClient};
use cco_core::{ConditionKind, Event, ItemScore, Query};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

/// Caller-supplied transform from raw item scores to domain objects.
/// Receives the options passed to [`Engine::execute_query`].
pub type Reifier<T> = Arc<dyn Fn(Vec<ItemScore>, &Value) -> T + Send + Sync>;

/// Outcome of [`Engine::execute_query`]
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendations<T> {
    /// Item scores as returned by the engine server
    Raw(Vec<ItemScore>),
    /// Output of the configured reifier
    Reified(T),
}

impl<T> Recommendations<T> {
    pub fn is_reified(&self) -> bool {
        matches!(self, Recommendations::Reified(_))
    }

    pub fn raw(&self) -> Option<&[ItemScore]> {
        match self {
            Recommendations::Raw(scores) => Some(scores),
            Recommendations::Reified(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<Vec<ItemScore>> {
        match self {
            Recommendations::Raw(scores) => Some(scores),
            Recommendations::Reified(_) => None,
        }
    }

    pub fn into_reified(self) -> Option<T> {
        match self {
            Recommendations::Raw(_) => None,
            Recommendations::Reified(value) => Some(value),
        }
    }
}

/// One element of a results stream
#[derive(Debug, Clone, PartialEq)]
pub enum Recommendation<I> {
    Raw(ItemScore),
    Reified(I),
}

impl<I> Recommendation<I> {
    pub fn raw(&self) -> Option<&ItemScore> {
        match self {
            Recommendation::Raw(score) => Some(score),
            Recommendation::Reified(_) => None,
        }
    }

    pub fn into_raw(self) -> Option<ItemScore> {
        match self {
            Recommendation::Raw(score) => Some(score),
            Recommendation::Reified(_) => None,
        }
    }

    pub fn into_reified(self) -> Option<I> {
        match self {
            Recommendation::Raw(_) => None,
            Recommendation::Reified(value) => Some(value),
        }
    }
}

/// Iterator over [`Recommendations`], one [`Recommendation`] per element
pub enum RecommendationsIter<I> {
    Raw(std::vec::IntoIter<ItemScore>),
    Reified(I),
}

impl<I: Iterator> Iterator for RecommendationsIter<I> {
    type Item = Recommendation<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RecommendationsIter::Raw(scores) => scores.next().map(Recommendation::Raw),
            RecommendationsIter::Reified(items) => items.next().map(Recommendation::Reified),
        }
    }
}

impl<T: IntoIterator> IntoIterator for Recommendations<T> {
    type Item = Recommendation<T::Item>;
    type IntoIter = RecommendationsIter<T::IntoIter>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Recommendations::Raw(scores) => RecommendationsIter::Raw(scores.into_iter()),
            Recommendations::Reified(value) => RecommendationsIter::Reified(value.into_iter()),
        }
    }
}

/// Client for one recommender deployment
pub struct Engine<T = Vec<ItemScore>> {
    config: EngineConfig,
    reifier: Option<Reifier<T>>,
    query_client: RwLock<Option<Arc<dyn QueryClient>>>,
    event_client: RwLock<Option<Arc<dyn EventClient>>>,
}

impl Engine {
    /// Create an engine without a reifier. No connection is made here.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            reifier: None,
            query_client: RwLock::new(None),
            event_client: RwLock::new(None),
        })
    }
}

impl<T> Engine<T> {
    /// Install a reifier, changing the reified output type to `U`
    #[must_use]
    pub fn with_reifier<U, F>(self, reifier: F) -> Engine<U>
    where
        F: Fn(Vec<ItemScore>, &Value) -> U + Send + Sync + 'static,
    {
        Engine {
            config: self.config,
            reifier: Some(Arc::new(reifier)),
            query_client: self.query_client,
            event_client: self.event_client,
        }
    }

    /// Use `client` instead of building an HTTP query client
    #[must_use]
    pub fn with_query_client(self, client: Arc<dyn QueryClient>) -> Self {
        *self.query_client.write() = Some(client);
        self
    }

    /// Use `client` instead of building an HTTP event client
    #[must_use]
    pub fn with_event_client(self, client: Arc<dyn EventClient>) -> Self {
        *self.event_client.write() = Some(client);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_reifier(&self) -> bool {
        self.reifier.is_some()
    }

    /// Start a new, empty query
    pub fn query(&self) -> Query {
        Query::new()
    }

    /// Query client, built from the config on first call and reused after
    pub fn query_client(&self) -> Result<Arc<dyn QueryClient>> {
        if let Some(client) = self.query_client.read().as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.query_client.write();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = HttpQueryClient::new(&self.config)?;
        info!(url = %client.url(), "query client created");
        let client: Arc<dyn QueryClient> = Arc::new(client);
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Event client, built from the config on first call and reused after
    pub fn event_client(&self) -> Result<Arc<dyn EventClient>> {
        if let Some(client) = self.event_client.read().as_ref() {
            return Ok(client.clone());
        }

        let mut slot = self.event_client.write();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = HttpEventClient::new(&self.config)?;
        info!(url = %client.url(), threads = self.config.threads, "event client created");
        let client: Arc<dyn EventClient> = Arc::new(client);
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Run `query` and return its results.
    ///
    /// With `reify` set and a reifier installed, the raw scores and
    /// `options` go through the reifier. Otherwise, including when no
    /// reifier is installed, the raw scores are returned unchanged.
    pub async fn execute_query(
        &self,
        query: &Query,
        reify: bool,
        options: &Value,
    ) -> Result<Recommendations<T>> {
        let scores = self.item_scores(query).await?;
        match (&self.reifier, reify) {
            (Some(reifier), true) => Ok(Recommendations::Reified(reifier(scores, options))),
            _ => Ok(Recommendations::Raw(scores)),
        }
    }

    /// Run `query` and return the raw item scores
    pub async fn item_scores(&self, query: &Query) -> Result<Vec<ItemScore>> {
        let payload = query.payload();
        let client = self.query_client()?;
        let response = client.send_query(&payload).await?;
        let scores = extract_item_scores(response)?;
        let weighted = payload
            .fields
            .iter()
            .filter(|c| matches!(c.kind(), Some(ConditionKind::Boost | ConditionKind::Deboost)))
            .count();
        debug!(
            results = scores.len(),
            conditions = payload.fields.len(),
            weighted,
            "query executed"
        );
        Ok(scores)
    }

    /// Lazy stream over the results of `query`, as
    /// [`Engine::execute_query`] with `reify` set would return them: the
    /// reifier's elements when one is installed, raw item scores otherwise.
    ///
    /// Nothing is sent until the stream is first polled. Every call builds
    /// a new stream that runs the query again.
    pub fn stream<'a>(
        &'a self,
        query: &'a Query,
    ) -> impl Stream<Item = Result<Recommendation<T::Item>>> + 'a
    where
        T: IntoIterator,
    {
        self.stream_with(query, Value::Null)
    }

    /// [`Engine::stream`] passing `options` to the reifier
    pub fn stream_with<'a>(
        &'a self,
        query: &'a Query,
        options: Value,
    ) -> impl Stream<Item = Result<Recommendation<T::Item>>> + 'a
    where
        T: IntoIterator,
    {
        let results = async move { self.execute_query(query, true, &options).await };
        stream::once(results).flat_map(|result| {
            let items: Vec<Result<Recommendation<T::Item>>> = match result {
                Ok(recommendations) => recommendations.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        })
    }

    /// Create or update properties of an entity with a `$set` event
    pub async fn upsert_entity(
        &self,
        entity_type: &str,
        entity_id: impl ToString,
        properties: Value,
    ) -> Result<Value> {
        let event = Event::set_entity(entity_type, entity_id, properties);
        self.send_event(&event).await
    }

    /// Record that `user` did `event` to `item`; `at` defaults to now
    pub async fn record_event(
        &self,
        event: &str,
        user: impl ToString,
        item: impl ToString,
        properties: Value,
        at: Option<DateTime<Utc>>,
    ) -> Result<Value> {
        let at = at.unwrap_or_else(Utc::now);
        let event = Event::user_action(event, user, item, properties, at);
        self.send_event(&event).await
    }

    async fn send_event(&self, event: &Event) -> Result<Value> {
        let client = self.event_client()?;
        client.create_event(event).await
    }

    /// Write the line [`Engine::upsert_entity`] would send to `sink`
    pub fn export_entity<W: Write + ?Sized>(
        &self,
        sink: &mut W,
        entity_type: &str,
        entity_id: impl ToString,
        properties: Value,
    ) -> Result<()> {
        export::write_event(sink, &Event::set_entity(entity_type, entity_id, properties))
    }

    /// Write the line [`Engine::record_event`] would send to `sink`
    pub fn export_event<W: Write + ?Sized>(
        &self,
        sink: &mut W,
        event: &str,
        user: impl ToString,
        item: impl ToString,
        properties: Value,
        at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let at = at.unwrap_or_else(Utc::now);
        export::write_event(sink, &Event::user_action(event, user, item, properties, at))
    }
}

/// `itemScores` from an engine response; absent or null means no results
fn extract_item_scores(mut response: Value) -> Result<Vec<ItemScore>> {
    match response.get_mut("itemScores").map(Value::take) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(scores) => Ok(serde_json::from_value(scores)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cco_core::QueryPayload;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use serde_json::json;

    struct FakeQueryClient {
        response: Value,
        payloads: Mutex<Vec<QueryPayload>>,
    }

    impl FakeQueryClient {
        fn new(response: Value) -> Arc<Self> {
            Arc::new(Self {
                response,
                payloads: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl QueryClient for FakeQueryClient {
        async fn send_query(&self, payload: &QueryPayload) -> Result<Value> {
            self.payloads.lock().push(payload.clone());
            Ok(self.response.clone())
        }
    }

    #[derive(Default)]
    struct FakeEventClient {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventClient for FakeEventClient {
        async fn create_event(&self, event: &Event) -> Result<Value> {
            self.events.lock().push(event.clone());
            Ok(json!({"eventId": "e-1"}))
        }
    }

    fn scores_response() -> Value {
        json!({"itemScores": [
            {"item": "i-1", "score": 0.9},
            {"item": "i-2", "score": 0.4}
        ]})
    }

    fn engine_with(response: Value) -> (Engine, Arc<FakeQueryClient>) {
        let fake = FakeQueryClient::new(response);
        let engine = Engine::new(EngineConfig::default())
            .unwrap()
            .with_query_client(fake.clone());
        (engine, fake)
    }

    #[tokio::test]
    async fn test_missing_item_scores_is_empty() {
        let (engine, _) = engine_with(json!({}));
        let results = engine.execute_query(&engine.query(), true, &Value::Null).await.unwrap();
        assert_eq!(results, Recommendations::Raw(Vec::new()));

        let (engine, _) = engine_with(json!({"itemScores": null}));
        assert!(engine.item_scores(&engine.query()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payload_reaches_client() {
        let (engine, fake) = engine_with(scores_response());
        let query = engine.query().for_user("u-1").filter([("channel", [1, 2])]).limit(2);

        let scores = engine.item_scores(&query).await.unwrap();
        assert_eq!(scores, vec![ItemScore::new("i-1", 0.9), ItemScore::new("i-2", 0.4)]);

        let payloads = fake.payloads.lock();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0], query.payload());
    }

    #[tokio::test]
    async fn test_query_is_reexecuted() {
        let (engine, fake) = engine_with(scores_response());
        let query = engine.query().for_user("u");

        engine.item_scores(&query).await.unwrap();
        let query = query.limit(1);
        engine.item_scores(&query).await.unwrap();

        let payloads = fake.payloads.lock();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].num, None);
        assert_eq!(payloads[1].num, Some(1));
    }

    #[tokio::test]
    async fn test_reifier_applied_only_when_requested() {
        let fake = FakeQueryClient::new(scores_response());
        let engine = Engine::new(EngineConfig::default())
            .unwrap()
            .with_query_client(fake)
            .with_reifier(|scores: Vec<ItemScore>, options: &Value| {
                let prefix = options["prefix"].as_str().unwrap_or("").to_string();
                scores
                    .into_iter()
                    .map(|s| format!("{}{}", prefix, s.item))
                    .collect::<Vec<String>>()
            });
        let query = engine.query();
        let options = json!({"prefix": "product:"});

        let reified = engine.execute_query(&query, true, &options).await.unwrap();
        assert_eq!(
            reified.into_reified(),
            Some(vec!["product:i-1".to_string(), "product:i-2".to_string()])
        );

        let raw = engine.execute_query(&query, false, &options).await.unwrap();
        assert!(!raw.is_reified());
        assert_eq!(raw.raw().map(|s| s.len()), Some(2));
    }

    #[tokio::test]
    async fn test_no_reifier_falls_back_to_raw() {
        let (engine, _) = engine_with(scores_response());
        assert!(!engine.has_reifier());
        let results = engine.execute_query(&engine.query(), true, &json!({})).await.unwrap();
        assert_eq!(results.into_raw().map(|s| s.len()), Some(2));
    }

    #[tokio::test]
    async fn test_stream_is_lazy() {
        let (engine, fake) = engine_with(scores_response());
        let query = engine.query();

        let stream = engine.stream(&query);
        assert!(fake.payloads.lock().is_empty());

        let items: Vec<String> = stream
            .filter_map(|r| async move { r.ok().and_then(Recommendation::into_raw) })
            .filter(|s| futures_util::future::ready(s.score > 0.5))
            .map(|s| s.item)
            .collect()
            .await;
        assert_eq!(items, vec!["i-1"]);

        let total: usize = engine.stream(&query).fold(0, |n, _| async move { n + 1 }).await;
        assert_eq!(total, 2);
        assert_eq!(fake.payloads.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_stream_yields_reified_items() {
        let fake = FakeQueryClient::new(scores_response());
        let engine = Engine::new(EngineConfig::default())
            .unwrap()
            .with_query_client(fake)
            .with_reifier(|scores: Vec<ItemScore>, options: &Value| {
                let prefix = options["prefix"].as_str().unwrap_or("product:").to_string();
                scores
                    .into_iter()
                    .map(|s| format!("{}{}", prefix, s.item))
                    .collect::<Vec<String>>()
            });
        let query = engine.query().for_user("u-1");

        let executed = engine
            .execute_query(&query, true, &Value::Null)
            .await
            .unwrap()
            .into_reified();
        let streamed: Vec<String> = engine
            .stream(&query)
            .map(|r| r.unwrap().into_reified().unwrap())
            .collect()
            .await;
        assert_eq!(Some(streamed), executed);

        let with_options: Vec<Recommendation<String>> = engine
            .stream_with(&query, json!({"prefix": "sku:"}))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(with_options[0], Recommendation::Reified("sku:i-1".to_string()));
    }

    #[test]
    fn test_recommendations_iterate_per_element() {
        let raw: Recommendations<Vec<String>> =
            Recommendations::Raw(vec![ItemScore::new("i-1", 0.3)]);
        let items: Vec<_> = raw.into_iter().collect();
        assert_eq!(items, vec![Recommendation::Raw(ItemScore::new("i-1", 0.3))]);

        let reified = Recommendations::Reified(vec!["a", "b"]);
        let items: Vec<_> = reified.into_iter().filter_map(Recommendation::into_reified).collect();
        assert_eq!(items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_upsert_entity_sends_set_event() {
        let events = Arc::new(FakeEventClient::default());
        let engine = Engine::new(EngineConfig::default())
            .unwrap()
            .with_event_client(events.clone());

        let response = engine
            .upsert_entity("item", "i-1", json!({"category": ["shoes"]}))
            .await
            .unwrap();
        assert_eq!(response["eventId"], "e-1");

        let sent = events.events.lock();
        assert_eq!(sent[0], Event::set_entity("item", "i-1", json!({"category": ["shoes"]})));
        assert_eq!(sent[0].event_time, None);
    }

    #[tokio::test]
    async fn test_record_event_shape() {
        let events = Arc::new(FakeEventClient::default());
        let engine = Engine::new(EngineConfig::default())
            .unwrap()
            .with_event_client(events.clone());
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        engine
            .record_event("purchase", "u-1", "i-1", json!({"price": 10}), Some(at))
            .await
            .unwrap();
        engine.record_event("view", "u-1", "i-2", Value::Null, None).await.unwrap();

        let sent = events.events.lock();
        assert_eq!(
            serde_json::to_value(&sent[0]).unwrap(),
            json!({
                "event": "purchase",
                "entityType": "user",
                "entityId": "u-1",
                "targetEntityType": "item",
                "targetEntityId": "i-1",
                "properties": {"price": 10},
                "eventTime": "2024-05-06T07:08:09.000Z"
            })
        );
        assert!(sent[1].event_time.is_some());
        assert_eq!(sent[1].properties, json!({}));
    }

    #[tokio::test]
    async fn test_export_matches_live_events() {
        let events = Arc::new(FakeEventClient::default());
        let engine = Engine::new(EngineConfig::default())
            .unwrap()
            .with_event_client(events.clone());
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let properties = json!({"tags": ["a", "b"]});

        engine.upsert_entity("item", "i-7", properties.clone()).await.unwrap();
        engine
            .record_event("like", "u-3", "i-7", properties.clone(), Some(at))
            .await
            .unwrap();

        let mut sink = Vec::new();
        engine.export_entity(&mut sink, "item", "i-7", properties.clone()).unwrap();
        engine
            .export_event(&mut sink, "like", "u-3", "i-7", properties, Some(at))
            .unwrap();

        let exported: Vec<Event> = String::from_utf8(sink)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(exported, *events.events.lock());
    }

    #[test]
    fn test_clients_are_memoized() {
        let engine = Engine::new(EngineConfig::default()).unwrap();

        let first = engine.query_client().unwrap();
        let second = engine.query_client().unwrap();
        assert!(std::ptr::eq(
            Arc::as_ptr(&first) as *const u8,
            Arc::as_ptr(&second) as *const u8
        ));

        let first = engine.event_client().unwrap();
        let second = engine.event_client().unwrap();
        assert!(std::ptr::eq(
            Arc::as_ptr(&first) as *const u8,
            Arc::as_ptr(&second) as *const u8
        ));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            threads: 0,
            ..Default::default()
        };
        assert!(Engine::new(config).is_err());
    }
}
