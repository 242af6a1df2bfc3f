//! Authentication Module
//! Mission: Accounts, password hashing, cookie-borne JWT sessions

pub mod api;
pub mod cookie;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod sessions;
pub mod user_store;
pub mod validation;

pub use cookie::SessionCookies;
pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use password::PasswordHasher;
pub use sessions::SessionRegistry;
pub use user_store::UserStore;
