pub mod command;
pub mod config;
pub mod engine;
pub mod package;
pub mod pipeline;

pub use command::*;
pub use config::*;
pub use engine::*;
pub use package::*;
pub use pipeline::*;
