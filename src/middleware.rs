//! Thin adapter between the session core and an HTTP request pipeline.
//!
//! [`StatelessSession`] owns the resolved configuration and key material and
//! is read-only after construction, so one instance can be shared across
//! concurrent requests (behind an `Arc`, or by reference). Everything
//! request-scoped lives on the [`Session`] value it hands out.
//!
//! Two entry points per request:
//! - [`StatelessSession::open`] at request time: parse the `Cookie` header,
//!   reassemble and decrypt the token, and build the session handle. Anything
//!   attributable to the client (tampering, foreign keys, clipped cookies)
//!   degrades silently to a fresh session.
//! - [`StatelessSession::save`] exactly once, immediately before response
//!   headers are sent: encrypt, split, reconcile with the inbound fragment
//!   count, and replace the multi-valued `Set-Cookie` field. Budget and
//!   configuration problems surface loudly and leave the headers untouched.

use crate::chunk::{reassemble, split_token, Slot};
use crate::codec::{TokenCodec, KEY_LEN};
use crate::config::{ChunkConfig, CookieBudget, SessionConfig};
use crate::cookies::{parse_cookie_header, DefaultSlotSerializer, SlotAttributes, SlotSerializer};
use crate::errors::SessionError;
use crate::lifecycle::reconcile;
use crate::session::Session;
use http::header::{HeaderValue, COOKIE, SET_COOKIE};
use http::HeaderMap;
use rand::RngCore;

pub struct StatelessSession {
    codec: TokenCodec,
    autostart: bool,
    prefix: String,
    attributes: SlotAttributes,
    chunk: ChunkConfig,
    budget: CookieBudget,
    serializer: Box<dyn SlotSerializer>,
}

impl StatelessSession {
    /// Resolves the configuration into a shareable session manager.
    ///
    /// When no key is configured a random one is generated, which means every
    /// restart invalidates all outstanding sessions; deployments that care
    /// should configure a stable key.
    pub fn new(config: SessionConfig) -> Result<Self, SessionError> {
        config.chunk.validate()?;

        let key = match config.key {
            Some(key) => key,
            None => {
                let mut key = vec![0u8; KEY_LEN];
                rand::rng().fill_bytes(&mut key);
                key
            }
        };

        Ok(Self {
            codec: TokenCodec::new(&key)?,
            autostart: config.autostart,
            prefix: config.prefix,
            attributes: config.attributes,
            chunk: config.chunk,
            budget: config.budget,
            serializer: Box::new(DefaultSlotSerializer),
        })
    }

    /// Replaces the slot serializer, for hosts whose cookie wire format
    /// differs from the built-in one.
    pub fn with_serializer(mut self, serializer: Box<dyn SlotSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    /// Builds the session for one request from its headers.
    pub fn open(&self, headers: &HeaderMap) -> Session {
        let cookies = headers
            .get(COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(parse_cookie_header)
            .unwrap_or_default();

        let presented = reassemble(&cookies, &self.prefix);
        let mut session = match presented
            .token
            .as_deref()
            .map(|token| self.codec.decrypt(token))
        {
            Some(Ok(payload)) => Session::from_payload(payload, presented.count),
            Some(Err(reason)) => {
                log::debug!("discarding presented session token: {reason}");
                Session::fresh(presented.count)
            }
            None => Session::fresh(presented.count),
        };

        if self.autostart && !session.has_started() {
            session.start();
        }

        session
    }

    /// Materializes the session into response cookies.
    ///
    /// This is the pre-header-send hook: call it exactly once per response.
    /// Cookies already queued by other collaborators are passed through
    /// unmodified unless they carry the session prefix (those are owned by
    /// this crate and rewritten). On error the headers are left untouched.
    pub fn save(&self, session: &Session, headers: &mut HeaderMap) -> Result<(), SessionError> {
        let passthrough: Vec<String> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter(|value| !value.starts_with(&self.prefix))
            .map(str::to_string)
            .collect();

        let slots: Vec<Slot> = match session.export() {
            Some(payload) => {
                let token = self.codec.encrypt(&payload)?;
                split_token(
                    &token,
                    &self.prefix,
                    &self.attributes,
                    self.serializer.as_ref(),
                    &self.chunk,
                )?
            }
            None => Vec::new(),
        };

        let values = reconcile(
            passthrough,
            &slots,
            session.previous_count(),
            &self.prefix,
            &self.attributes,
            self.serializer.as_ref(),
            &self.budget,
        )?;

        // Convert everything up front so the replacement below cannot fail
        // halfway through.
        let values: Vec<HeaderValue> = values
            .iter()
            .map(|value| HeaderValue::from_str(value))
            .collect::<Result<_, _>>()?;

        headers.remove(SET_COOKIE);
        for value in values {
            headers.append(SET_COOKIE, value);
        }

        Ok(())
    }
}
