pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{load_config, load_redis_config, load_services};
pub use models::*;
pub use validation::{ConfigValidator, ValidationError, ValidationResult};
