pub mod config;
pub mod context;
pub mod hooks;

pub use config::ContextConfig;
pub use context::DomainContext;
pub use hooks::ContextHooks;
