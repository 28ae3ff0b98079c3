pub mod config;
pub mod navigation;
pub mod task;

pub use config::*;
pub use navigation::*;
pub use task::*;
