pub mod config;
pub mod executor;
pub mod extract;
pub mod harvest;
pub mod model;
pub mod paapi;
pub mod taxonomy;
pub mod traits;

// Re-export common types for convenience
pub use executor::*;
pub use model::*;
pub use traits::*;
