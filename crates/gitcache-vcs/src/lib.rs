pub mod contract;
pub mod fallback;
pub mod memory;
pub mod metadata;
pub mod status;
pub mod types;

pub use fallback::*;
pub use memory::*;
pub use metadata::*;
pub use status::*;
pub use types::*;
