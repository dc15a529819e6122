use crate::cookies::SlotAttributes;
use crate::errors::SessionError;

/// Prefix for session cookie names; cookies are named `{prefix}{1-based index}`.
pub const DEFAULT_PREFIX: &str = "s_d_";

/// Per-fragment sizing for the token splitter. All values are byte counts of the
/// fully serialized cookie (name, value and attributes), not of the raw fragment.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Hard ceiling on a single serialized cookie. Browsers conventionally cap
    /// a cookie around 4KB, so the default leaves the whole envelope below that.
    pub max_serialized_len: usize,
    /// How many bytes the candidate fragment shrinks by on each failed probe.
    pub shrink_step: usize,
    /// Smallest fragment the splitter will accept before giving up. Shrinking
    /// past this floor means the attribute envelope alone nearly fills the
    /// ceiling, which is a configuration problem rather than a data problem.
    pub min_fragment: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_serialized_len: 4000,
            shrink_step: 50,
            min_fragment: 16,
        }
    }
}

impl ChunkConfig {
    /// Rejects configurations under which the splitter search cannot converge.
    pub(crate) fn validate(&self) -> Result<(), SessionError> {
        if self.shrink_step == 0 {
            return Err(SessionError::InvalidChunkConfig(
                "shrink_step must be at least 1".to_string(),
            ));
        }
        if self.min_fragment == 0 {
            return Err(SessionError::InvalidChunkConfig(
                "min_fragment must be at least 1".to_string(),
            ));
        }
        if self.min_fragment >= self.max_serialized_len {
            return Err(SessionError::InvalidChunkConfig(format!(
                "min_fragment ({}) must be smaller than max_serialized_len ({})",
                self.min_fragment, self.max_serialized_len
            )));
        }
        Ok(())
    }
}

/// Aggregate ceilings on what one response may write to the client.
#[derive(Debug, Clone)]
pub struct CookieBudget {
    /// Maximum number of session cookies (fragments plus expiry directives)
    /// written in a single response.
    pub max_cookies: usize,
    /// Maximum total serialized size of those cookies in bytes.
    pub max_total_bytes: usize,
}

impl Default for CookieBudget {
    fn default() -> Self {
        Self {
            max_cookies: 300,
            max_total_bytes: 80_000,
        }
    }
}

/// Main session configuration. Also carries the sizing knobs for the splitter
/// and the lifecycle budgets.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// 32-byte symmetric key. When `None`, a random key is generated at
    /// construction time, which invalidates all outstanding sessions on restart.
    pub key: Option<Vec<u8>>,
    /// Start a session automatically when the request carries none.
    pub autostart: bool,
    /// Name prefix for session cookies.
    pub prefix: String,
    /// Attributes attached to every written session cookie.
    pub attributes: SlotAttributes,
    /// Fragment sizing for the splitter.
    pub chunk: ChunkConfig,
    /// Aggregate write ceilings.
    pub budget: CookieBudget,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            key: None,
            autostart: false,
            prefix: DEFAULT_PREFIX.to_string(),
            attributes: SlotAttributes::default(),
            chunk: ChunkConfig::default(),
            budget: CookieBudget::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(SessionConfig::default().chunk.validate().is_ok());
    }

    #[test]
    fn zero_step_is_rejected() {
        let cfg = ChunkConfig {
            shrink_step: 0,
            ..ChunkConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(SessionError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn floor_must_stay_below_ceiling() {
        let cfg = ChunkConfig {
            max_serialized_len: 100,
            min_fragment: 100,
            ..ChunkConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
