use super::{DEFAULT_PAGE_SIZE, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn page_size() -> u64 {
        // No procfs outside Linux; the reader only needs a sane multiplier.
        DEFAULT_PAGE_SIZE
    }
}
