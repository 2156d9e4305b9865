pub mod app;
pub mod auth_handlers;
pub mod chat_handlers;
pub mod config;
pub mod conversations;
pub mod deployment_handlers;
pub mod events;
pub mod github;
pub mod guard;
pub mod idp;
pub mod llm;
pub mod metrics;
pub mod queue;
pub mod request_id;
pub mod verifier;

pub use app::{build_router, AppState};
