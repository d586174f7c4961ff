pub mod config;
pub mod demo;
pub mod errors;
pub mod infrastructure;
pub mod live_state;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::LiveStateConfig;
pub use errors::{AppError, RegistrationError, UpdateError};
pub use infrastructure::{ContainerError, Injectable, ServiceContainer, ServiceKind};

#[doc(hidden)]
pub mod __private {
    pub use inventory;
}
