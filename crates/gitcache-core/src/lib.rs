pub mod error;
pub mod fs;
pub mod ids;
pub mod model;

pub use error::*;
pub use fs::*;
pub use ids::*;
pub use model::*;
