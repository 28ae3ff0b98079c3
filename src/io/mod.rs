pub mod config_io;
pub mod loader;
pub mod state;
pub mod vault;
