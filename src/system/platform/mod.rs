/// Per-OS facts the procfs reader needs to turn raw counters into bytes.
pub trait PlatformExtensions {
    /// Size in bytes of one memory page, as used by `statm`.
    fn page_size() -> u64;
}

/// Used when the OS cannot be asked.
pub const DEFAULT_PAGE_SIZE: u64 = 4096;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod fallback;

#[cfg(not(target_os = "linux"))]
use fallback as platform_impl;
#[cfg(target_os = "linux")]
use linux as platform_impl;

pub fn page_size() -> u64 {
    platform_impl::Platform::page_size()
}
