// Public API - what other modules can use
pub use clock::{Clock, ManualClock, SystemClock};
pub use middleware::require_session;
pub use token::{TokenError, TokenIssuer};
pub use types::{ClaimSet, Identity, RefreshedAccess, SessionClaims, TokenKind, TokenPair};

// Internal modules
pub mod clock;
pub mod cookies;
mod middleware;
pub mod token;
mod types;
