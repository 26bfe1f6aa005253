// HTTP data gateway
//
// Fetches and writes go through PostgREST-style endpoints:
//   GET    /rest/v1/{collection}?owner_id=eq.{owner}&{field}=eq.{value}&order=..&limit=..&offset=..
//   POST   /rest/v1/{collection}
//   PATCH  /rest/v1/{collection}?id=eq.{id}
//   DELETE /rest/v1/{collection}?id=eq.{id}
//
// The change feed is a server-sent event stream:
//   GET /realtime/v1/{collection}?owner_id=eq.{owner}
// where every `data:` payload is
//   {"type": "INSERT"|"UPDATE"|"DELETE", "record": {...}, "old_record": {...}}

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use farmfit_core::{
    ChangeEvent, ChangeStream, DataGateway, Entity, EntityWriter, OwnerId, Query, Result,
    SyncError,
};
use futures::StreamExt;
use serde::Deserialize;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::rest::{QueryParams, RestClient};

/// Data gateway for one entity type over HTTP
pub struct HttpGateway<E: Entity> {
    rest: RestClient,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for HttpGateway<E> {
    fn clone(&self) -> Self {
        Self {
            rest: self.rest.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> HttpGateway<E> {
    pub fn new(rest: RestClient) -> Self {
        Self {
            rest,
            _entity: PhantomData,
        }
    }

    fn table_path() -> String {
        format!("/rest/v1/{}", E::COLLECTION)
    }

    fn feed_path() -> String {
        format!("/realtime/v1/{}", E::COLLECTION)
    }
}

/// Translate a query into PostgREST parameters
pub fn query_params(owner_field: &str, owner: &OwnerId, query: &Query) -> QueryParams {
    let mut params: QueryParams = vec![(owner_field.to_string(), format!("eq.{}", owner))];
    for (field, value) in &query.filters {
        params.push((field.clone(), format!("eq.{}", value)));
    }
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{}", order.field, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if query.offset > 0 {
        params.push(("offset".to_string(), query.offset.to_string()));
    }
    params
}

fn id_param<E: Entity>(id: &E::Id) -> QueryParams {
    vec![("id".to_string(), format!("eq.{}", id))]
}

#[derive(Debug, Deserialize)]
struct RealtimeMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    record: Option<serde_json::Value>,
    #[serde(default)]
    old_record: Option<serde_json::Value>,
}

/// Decode one realtime payload.
///
/// Returns `Ok(None)` for message types the feed does not care about.
pub fn decode_change<E: Entity>(data: &str) -> Result<Option<ChangeEvent<E>>> {
    let message: RealtimeMessage = serde_json::from_str(data)?;
    let missing = |field: &str| SyncError::decode(format!("{} message without {}", message.kind, field));

    let event = match message.kind.to_ascii_uppercase().as_str() {
        "INSERT" => {
            let record = message.record.clone().ok_or_else(|| missing("record"))?;
            ChangeEvent::Inserted(serde_json::from_value(record)?)
        }
        "UPDATE" => {
            let record = message.record.clone().ok_or_else(|| missing("record"))?;
            ChangeEvent::Updated(serde_json::from_value(record)?)
        }
        "DELETE" => {
            let id = message
                .old_record
                .as_ref()
                .and_then(|r| r.get("id"))
                .cloned()
                .ok_or_else(|| missing("old_record.id"))?;
            ChangeEvent::Deleted(serde_json::from_value(id)?)
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

#[async_trait]
impl<E: Entity> DataGateway<E> for HttpGateway<E> {
    async fn fetch(&self, owner: &OwnerId, query: &Query) -> Result<Vec<E>> {
        let params = query_params(E::OWNER_FIELD, owner, query);
        let rows: Vec<E> = self
            .rest
            .get(&Self::table_path(), &params)
            .await
            .map_err(SyncError::from)?;
        debug!(
            collection = E::COLLECTION,
            owner = %owner,
            count = rows.len(),
            "Fetched rows"
        );
        Ok(rows)
    }

    async fn subscribe(&self, owner: &OwnerId) -> Result<ChangeStream<E>> {
        let params = vec![(E::OWNER_FIELD.to_string(), format!("eq.{}", owner))];
        let response = self
            .rest
            .open_stream(&Self::feed_path(), &params)
            .await
            .map_err(|e| match SyncError::from(e) {
                SyncError::Network(msg) => SyncError::subscription(msg),
                other => other,
            })?;

        debug!(collection = E::COLLECTION, owner = %owner, "Change feed connected");

        let events = response.bytes_stream().eventsource();
        let stream = events.filter_map(|result| async move {
            match result {
                Ok(event) => {
                    if event.data.trim().is_empty() {
                        return None;
                    }
                    match decode_change::<E>(&event.data) {
                        Ok(Some(change)) => Some(Ok(change)),
                        Ok(None) => None,
                        Err(e) => {
                            warn!(collection = E::COLLECTION, error = %e, "Skipping undecodable change event");
                            None
                        }
                    }
                }
                Err(e) => Some(Err(SyncError::subscription(e.to_string()))),
            }
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl<E: Entity> EntityWriter<E> for HttpGateway<E> {
    async fn insert(&self, entity: &E) -> Result<E> {
        let rows: Vec<E> = self
            .rest
            .post(&Self::table_path(), entity)
            .await
            .map_err(SyncError::from)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| SyncError::decode("insert returned no representation"))
    }

    async fn update(&self, entity: &E) -> Result<E> {
        let rows: Vec<E> = self
            .rest
            .patch(&Self::table_path(), &id_param::<E>(entity.id()), entity)
            .await
            .map_err(SyncError::from)?;
        rows.into_iter().next().ok_or_else(|| {
            SyncError::not_found(format!("{} {}", E::COLLECTION, entity.id()))
        })
    }

    async fn delete(&self, id: &E::Id) -> Result<()> {
        self.rest
            .delete(&Self::table_path(), &id_param::<E>(id))
            .await
            .map_err(SyncError::from)
    }
}
