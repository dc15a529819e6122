//! Token splitting and reassembly.
//!
//! A token rarely fits in one cookie, so it is sharded across
//! `{prefix}1 .. {prefix}N` in order. Splitting is driven by the *serialized*
//! cookie length, probed through the [`SlotSerializer`], because the envelope
//! is not constant: the name grows with the index digit count and attributes
//! add a fixed tail. The search shrinks a candidate fragment until the
//! serialized form fits, carrying the last successful size forward, and fails
//! with a configuration error once it would cross the minimum fragment floor
//! rather than loop.
//!
//! Reassembly is the inverse: count the prefix-matching cookies the client
//! presented and require every index from 1 to that count. A gap means a
//! stale or clipped cookie set; no partial recovery is attempted, but the
//! observed count is still reported so the lifecycle manager can expire the
//! leftovers.

use crate::config::ChunkConfig;
use crate::cookies::{SlotAttributes, SlotSerializer};
use crate::errors::SessionError;
use std::collections::HashMap;

/// One committed fragment: its 1-based index, the raw token slice, and the
/// full `Set-Cookie` value carrying it.
#[derive(Debug, Clone)]
pub struct Slot {
    pub index: usize,
    pub fragment: String,
    pub serialized: String,
}

/// Result of reassembling the client-presented cookies.
#[derive(Debug, Clone)]
pub struct Reassembly {
    /// How many prefix-matching cookies the request carried, valid or not.
    pub count: usize,
    /// The reconstructed token, or `None` when no cookies matched or the
    /// index sequence had a gap.
    pub token: Option<String>,
}

/// Splits `token` into the fewest fragments whose serialized cookies each fit
/// within `cfg.max_serialized_len`.
pub fn split_token(
    token: &str,
    prefix: &str,
    attrs: &SlotAttributes,
    serializer: &dyn SlotSerializer,
    cfg: &ChunkConfig,
) -> Result<Vec<Slot>, SessionError> {
    // Tokens are base64 segments joined by dots, so byte slicing is safe.
    debug_assert!(token.is_ascii());

    let mut slots: Vec<Slot> = Vec::new();
    let mut start = 0;
    // Committed fragment size carried between fragments; 0 means "try the
    // whole remainder", which keeps short tokens in a single cookie.
    let mut chunk = 0usize;

    while start < token.len() {
        let remainder = token.len() - start;
        let take = if chunk == 0 {
            remainder
        } else {
            chunk.min(remainder)
        };

        let index = slots.len() + 1;
        let name = format!("{prefix}{index}");
        let fragment = &token[start..start + take];
        let serialized = serializer.serialize(&name, fragment, attrs);

        if serialized.len() > cfg.max_serialized_len {
            // Shrink and retry from the same offset. The step floor of 1 keeps
            // the candidate strictly decreasing even under a degenerate config,
            // so the search always either commits or hits the fragment floor.
            let next = take
                .saturating_sub(cfg.shrink_step.max(1))
                .min(cfg.max_serialized_len);
            if next < cfg.min_fragment {
                return Err(SessionError::ChunkBudget {
                    floor: cfg.min_fragment,
                    limit: cfg.max_serialized_len,
                });
            }
            chunk = next;
            continue;
        }

        slots.push(Slot {
            index,
            fragment: fragment.to_string(),
            serialized,
        });
        start += take;
    }

    Ok(slots)
}

/// Reconstructs a token from the name/value pairs the client presented.
///
/// Only the index suffix determines assembly order; the order the pairs
/// arrived in is irrelevant.
pub fn reassemble(cookies: &HashMap<String, String>, prefix: &str) -> Reassembly {
    let count = cookies
        .keys()
        .filter(|name| name.starts_with(prefix))
        .count();
    if count == 0 {
        return Reassembly { count: 0, token: None };
    }

    let mut token = String::new();
    for index in 1..=count {
        match cookies.get(&format!("{prefix}{index}")) {
            Some(fragment) => token.push_str(fragment),
            None => {
                log::debug!("session cookie {prefix}{index} missing from a set of {count}, discarding");
                return Reassembly { count, token: None };
            }
        }
    }

    Reassembly {
        count,
        token: Some(token),
    }
}
