pub mod config;
pub mod executor;
pub mod harvest;
pub mod marc;
pub mod model;
pub mod normalize;
pub mod traits;

// Re-export common types for convenience
pub use executor::*;
pub use model::*;
pub use traits::*;
