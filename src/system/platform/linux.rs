use super::{DEFAULT_PAGE_SIZE, PlatformExtensions};

pub struct Platform;

impl PlatformExtensions for Platform {
    fn page_size() -> u64 {
        // sysconf returns -1 when the limit is indeterminate
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as u64
        } else {
            DEFAULT_PAGE_SIZE
        }
    }
}
