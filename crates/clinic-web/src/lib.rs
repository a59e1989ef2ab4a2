//! Web层：HTTP路由、会话认证与错误映射

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::SessionStore;
pub use handlers::AppState;
pub use server::WebServer;
