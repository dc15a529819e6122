pub mod chunk;
pub mod codec;
pub mod config;
pub mod cookies;
pub mod errors;
pub mod lifecycle;
pub mod middleware;
pub mod session;

pub use config::{ChunkConfig, CookieBudget, SessionConfig};
pub use cookies::{DefaultSlotSerializer, SameSite, SlotAttributes, SlotSerializer};
pub use errors::SessionError;
pub use middleware::StatelessSession;
pub use session::Session;
