//! In-memory session state for one request.
//!
//! A [`Session`] is constructed per request from a decrypted token (or fresh,
//! not yet started, when the request carries none), mutated by handler code,
//! and exported back into a token when the response is finalized. Nothing is
//! retained across requests; the fragment count observed on the inbound
//! request travels on the value itself so concurrent requests never share
//! mutable state.

use crate::errors::SessionError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

/// Attribute names reserved for session metadata.
const RESERVED_KEYS: [&str; 2] = ["id", "timestamp"];

/// Plaintext of the encrypted token. Field names are part of the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    pub id: Option<String>,
    pub timestamp: i64,
    pub data: Map<String, Value>,
}

/// Per-request session handle.
pub struct Session {
    /// Opaque session id; `Some` exactly while the session is started.
    id: Option<String>,
    started: bool,
    /// Unix timestamp in milliseconds of the last save (or construction).
    last_activity: i64,
    attributes: Map<String, Value>,
    /// Number of session cookies presented on the inbound request, kept so the
    /// lifecycle manager can expire fragments the new token no longer needs.
    previous_count: usize,
}

impl Session {
    /// Creates a not-yet-started session for a request that carried no usable token.
    pub(crate) fn fresh(previous_count: usize) -> Self {
        Self {
            id: None,
            started: false,
            last_activity: now_millis(),
            attributes: Map::new(),
            previous_count,
        }
    }

    /// Restores a session from a decrypted token payload.
    pub(crate) fn from_payload(payload: TokenPayload, previous_count: usize) -> Self {
        let started = payload.id.is_some();
        Self {
            id: payload.id,
            started,
            last_activity: payload.timestamp,
            attributes: payload.data,
            previous_count,
        }
    }

    /// Retrieves an attribute value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Sets an attribute to any serializable value.
    ///
    /// The names `id` and `timestamp` are reserved for session metadata and
    /// rejected loudly rather than silently shadowed.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<(), SessionError> {
        if RESERVED_KEYS.contains(&key) {
            return Err(SessionError::ReservedAttribute(key.to_string()));
        }
        let value = serde_json::to_value(value)?;
        self.attributes.insert(key.to_string(), value);
        Ok(())
    }

    /// Removes an attribute, returning its previous value if present.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// All current attributes.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Starts the session, minting a random id. No-op when already started.
    pub fn start(&mut self) {
        if !self.started {
            self.id = Some(Uuid::new_v4().to_string());
            self.started = true;
        }
    }

    /// Stops the session. The token is not written at save time and any
    /// previously presented fragments are expired.
    pub fn stop(&mut self) {
        self.id = None;
        self.started = false;
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Unix timestamp in milliseconds of the last save.
    pub fn last_activity(&self) -> i64 {
        self.last_activity
    }

    pub(crate) fn previous_count(&self) -> usize {
        self.previous_count
    }

    /// Exports the state for encryption, or `None` when the session is not
    /// started. The exported timestamp is the current time, so the decoded
    /// session on the next request reports this save as its last activity.
    pub(crate) fn export(&self) -> Option<TokenPayload> {
        if !self.started {
            return None;
        }
        Some(TokenPayload {
            id: self.id.clone(),
            timestamp: now_millis(),
            data: self.attributes.clone(),
        })
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
