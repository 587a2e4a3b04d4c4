pub mod backend;
pub mod canvas;
pub mod config;
pub mod error;
pub mod mask;
pub mod render;
pub mod segment;
pub mod session;
pub mod workflow;

pub use error::Error;
