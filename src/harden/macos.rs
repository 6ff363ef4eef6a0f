//
// macOS: ptrace(PT_DENY_ATTACH).
//
use std::io;

use super::HardenError;

pub(crate) const SUPPORTED: bool = true;

pub(crate) fn deny_attach() -> Result<(), HardenError> {
    match unsafe { libc::ptrace(libc::PT_DENY_ATTACH, 0, std::ptr::null_mut(), 0) } {
        0 => Ok(()),
        _ => Err(HardenError::Os(io::Error::last_os_error())),
    }
}
