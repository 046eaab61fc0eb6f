//! Gateway over a hosted Supabase (PostgREST) table

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{GatewayError, TripGateway};
use crate::config::SupabaseConfig;
use crate::domain::{NewTrip, Preferences, TripId, TripRecord, TripRecordWire, TripUpdate};
use crate::session::Session;

pub struct SupabaseGateway {
    table_url: String,
    anon_key: String,
    http: Client,
}

#[derive(Serialize)]
struct InsertBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    source_url: Option<&'a str>,
    preferences: &'a Preferences,
    result_data: serde_json::Value,
    user_id: &'a str,
}

#[derive(Serialize)]
struct UpdateBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    preferences: &'a Preferences,
    result_data: serde_json::Value,
}

impl SupabaseGateway {
    pub fn from_config(config: &SupabaseConfig) -> Result<Self, GatewayError> {
        debug!(url = %config.url, table = %config.table, "SupabaseGateway::from_config: called");
        let anon_key = config
            .get_anon_key()
            .map_err(|e| GatewayError::Unauthorized(e.to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self::new(&config.url, &config.table, anon_key, http))
    }

    fn new(url: &str, table: &str, anon_key: String, http: Client) -> Self {
        Self {
            table_url: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
            anon_key,
            http,
        }
    }

    /// Attach the project key, the caller's bearer token and the owner filter
    fn scoped(&self, builder: RequestBuilder, session: &Session) -> Result<RequestBuilder, GatewayError> {
        let token = session
            .access_token
            .as_deref()
            .ok_or_else(|| GatewayError::Unauthorized("session has no access token".to_string()))?;
        Ok(builder
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .query(&[("user_id", format!("eq.{}", session.owner_id))]))
    }

    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), %message, "Supabase request failed");
        match status.as_u16() {
            401 | 403 => Err(GatewayError::Unauthorized(message)),
            code => Err(GatewayError::Http { status: code, message }),
        }
    }

    async fn returned_rows(response: Response) -> Result<Vec<TripRecordWire>, GatewayError> {
        let body = Self::check(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl TripGateway for SupabaseGateway {
    async fn insert(&self, session: &Session, trip: NewTrip) -> Result<TripId, GatewayError> {
        debug!(owner_id = %session.owner_id, mode = %trip.mode(), "SupabaseGateway::insert: called");
        let body = InsertBody {
            kind: trip.mode().as_str(),
            source_url: trip.source_url.as_deref(),
            preferences: &trip.preferences,
            result_data: trip.result.to_value(),
            user_id: &session.owner_id,
        };
        // Inserts carry the owner in the body rather than a filter
        let token = session
            .access_token
            .as_deref()
            .ok_or_else(|| GatewayError::Unauthorized("session has no access token".to_string()))?;
        let response = self
            .http
            .post(&self.table_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await?;

        let rows = Self::returned_rows(response).await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Decode("insert returned no row".to_string()))?;
        info!(id = %row.id, "Inserted trip");
        Ok(TripId::new(row.id))
    }

    async fn update(&self, session: &Session, id: &TripId, update: TripUpdate) -> Result<(), GatewayError> {
        debug!(owner_id = %session.owner_id, %id, "SupabaseGateway::update: called");
        let body = UpdateBody {
            kind: update.mode().as_str(),
            preferences: &update.preferences,
            result_data: update.result.to_value(),
        };
        let request = self
            .scoped(self.http.patch(&self.table_url), session)?
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&body);

        let rows = Self::returned_rows(request.send().await?).await?;
        if rows.is_empty() {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn list_by_owner(&self, session: &Session) -> Result<Vec<TripRecord>, GatewayError> {
        debug!(owner_id = %session.owner_id, "SupabaseGateway::list_by_owner: called");
        let request = self
            .scoped(self.http.get(&self.table_url), session)?
            .query(&[("select", "*"), ("order", "created_at.desc")]);

        let rows = Self::returned_rows(request.send().await?).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match TripRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!(%id, error = %e, "Skipping undecodable trip row"),
            }
        }
        Ok(records)
    }

    async fn delete(&self, session: &Session, id: &TripId) -> Result<(), GatewayError> {
        debug!(owner_id = %session.owner_id, %id, "SupabaseGateway::delete: called");
        let request = self
            .scoped(self.http.delete(&self.table_url), session)?
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation");

        let rows = Self::returned_rows(request.send().await?).await?;
        if rows.is_empty() {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        info!(%id, "Deleted trip");
        Ok(())
    }
}
