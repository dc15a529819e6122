//! Cookie lifecycle reconciliation.
//!
//! When a session shrinks (or stops) between requests, the high-index
//! fragments the client still holds would poison a later reassembly: they
//! extend the index range or splice obsolete content into a fresh token. So
//! every save reconciles the previous fragment count against the new one and
//! explicitly expires every index in `(new_count, previous_count]`.
//!
//! Budgets are enforced before anything is emitted. A response that would
//! write more cookies, or more bytes, than the configured ceilings fails as a
//! whole; the caller's headers are never partially mutated.

use crate::chunk::Slot;
use crate::config::CookieBudget;
use crate::cookies::{SlotAttributes, SlotSerializer};
use crate::errors::SessionError;

/// Expiry date written on surplus fragments.
const EPOCH_EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Builds the complete outbound `Set-Cookie` value list for one response:
/// passthrough cookies from other collaborators, the new fragments, and expiry
/// directives for every fragment index the new token no longer uses.
pub fn reconcile(
    passthrough: Vec<String>,
    slots: &[Slot],
    previous_count: usize,
    prefix: &str,
    attrs: &SlotAttributes,
    serializer: &dyn SlotSerializer,
    budget: &CookieBudget,
) -> Result<Vec<String>, SessionError> {
    let new_count = slots.len();

    let mut written: Vec<String> = Vec::with_capacity(previous_count.max(new_count));
    let mut total_bytes = 0;
    for slot in slots {
        total_bytes += slot.serialized.len();
        written.push(slot.serialized.clone());
    }

    // Expire surplus fragments, previous_count included. Driven purely by the
    // two counts, so a stopped session with leftover cookies clears them all.
    if previous_count > new_count {
        log::debug!(
            "expiring {} surplus session cookies ({} -> {})",
            previous_count - new_count,
            previous_count,
            new_count
        );
        let expiry_attrs = SlotAttributes {
            max_age: None,
            expires: Some(EPOCH_EXPIRES.to_string()),
            ..attrs.clone()
        };
        for index in (new_count + 1)..=previous_count {
            let directive = serializer.serialize(&format!("{prefix}{index}"), "", &expiry_attrs);
            total_bytes += directive.len();
            written.push(directive);
        }
    }

    if written.len() > budget.max_cookies {
        return Err(SessionError::TooManyCookies {
            count: written.len(),
            limit: budget.max_cookies,
        });
    }
    if total_bytes > budget.max_total_bytes {
        return Err(SessionError::CookiesTooLarge {
            bytes: total_bytes,
            limit: budget.max_total_bytes,
        });
    }

    let mut out = passthrough;
    out.extend(written);
    Ok(out)
}
