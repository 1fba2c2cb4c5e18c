pub mod cache;
pub mod collector;
pub mod host;
pub mod platform;
pub mod process;
pub mod procfs;
pub mod snapshot;
