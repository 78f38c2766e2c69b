pub mod digest;
pub mod dir;
pub mod hasher;

pub use digest::*;
pub use dir::hash_directory;
pub use hasher::*;
