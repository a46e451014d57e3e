//! Identity: users, sessions and the request-scoped authentication service.
//! Keep the public surface thin and split implementation across sub-modules.

mod user;
mod session;
mod directory;
mod password;
mod auth;
mod request_context;

pub use user::User;
pub use session::{SessionStore, SessionManager, SessionHandle};
pub use directory::{UserDirectory, UserRepository, MemoryUserStore, USERS_TABLE};
pub use password::{hash_password, verify_password};
pub use auth::{AuthenticationService, Credentials};
pub use request_context::RequestContext;
