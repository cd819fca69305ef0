pub mod app;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;

pub use app::app;
pub use config::GatewayConfig;
pub use handlers::AppState;
