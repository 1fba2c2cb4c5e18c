pub mod config;
pub mod format;
pub mod logging;
pub mod rate;
pub mod select;
pub mod system;
