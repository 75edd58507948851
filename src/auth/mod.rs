//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;

pub use jwt::{Claims, JwtService, TokenError};
pub use middleware::{
    ensure_owner, extract_token, require_auth, AuthContext, AuthGuard, AuthSource, AuthStrategy,
};
pub use password::PasswordHasher;
pub use session::{parse_cookie, session_layer, Session, SessionManager};
