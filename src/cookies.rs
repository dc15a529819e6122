//! Cookie envelope types and the serializer seam.
//!
//! The splitter never reasons about raw fragment lengths alone: it asks a
//! [`SlotSerializer`] for the fully serialized cookie and measures that, since
//! the name grows with the index digit count and the attribute envelope adds a
//! constant tail. Hosts that serialize cookies differently (extra attributes,
//! different formatting) can plug in their own implementation; the splitter and
//! lifecycle manager only ever probe the output length.
//!
//! Parsing handles the request `Cookie` header only (`name=value` pairs); the
//! serializer covers the `Set-Cookie` subset this crate emits.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// SameSite policy for written session cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes attached to every session cookie this crate writes.
///
/// These are passed opaquely to the serializer; the crate itself only inspects
/// serialized lengths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAttributes {
    /// Path scoping. Defaults to `"/"` so fragments are presented on every request.
    pub path: Option<String>,

    /// Domain scoping (host-only if `None`).
    pub domain: Option<String>,

    /// If `true`, cookies are sent only over HTTPS.
    pub secure: bool,

    /// If `true`, cookies are hidden from client-side scripts.
    pub http_only: bool,

    /// SameSite policy, if any.
    pub same_site: Option<SameSite>,

    /// Lifetime in seconds. Session cookies have `None`.
    pub max_age: Option<i64>,

    /// Absolute expiry in IMF-fixdate form (`Thu, 01 Jan 1970 00:00:00 GMT`).
    /// Used by the lifecycle manager to expire surplus fragments.
    pub expires: Option<String>,
}

impl Default for SlotAttributes {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            domain: None,
            secure: false,
            http_only: false,
            same_site: None,
            max_age: None,
            expires: None,
        }
    }
}

/// Serializes one named cookie into its `Set-Cookie` wire form.
///
/// Implementations must be cheap: the splitter calls this repeatedly while
/// probing candidate fragment sizes.
pub trait SlotSerializer: Send + Sync {
    fn serialize(&self, name: &str, value: &str, attrs: &SlotAttributes) -> String;
}

/// Reference serializer covering the attribute subset in [`SlotAttributes`].
#[derive(Debug, Default)]
pub struct DefaultSlotSerializer;

impl SlotSerializer for DefaultSlotSerializer {
    fn serialize(&self, name: &str, value: &str, attrs: &SlotAttributes) -> String {
        let mut out = format!("{name}={value}");

        if let Some(path) = &attrs.path {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = &attrs.domain {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if let Some(max_age) = attrs.max_age {
            out.push_str("; Max-Age=");
            out.push_str(&max_age.to_string());
        }
        if let Some(expires) = &attrs.expires {
            out.push_str("; Expires=");
            out.push_str(expires);
        }
        if let Some(same_site) = attrs.same_site {
            out.push_str("; SameSite=");
            out.push_str(same_site.as_str());
        }
        if attrs.secure {
            out.push_str("; Secure");
        }
        if attrs.http_only {
            out.push_str("; HttpOnly");
        }

        out
    }
}

/// Parses a request `Cookie` header into name/value pairs.
///
/// Splits on `;`, then on the first `=` per pair; pairs without `=` are
/// dropped. Values keep any embedded `=` (base64 padding relies on this).
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}
