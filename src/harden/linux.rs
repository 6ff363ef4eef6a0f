//
// Linux: clear the dumpable flag, so that ptrace attach from anything
// but a privileged tracer is refused.
//
use std::io;

use super::HardenError;

pub(crate) const SUPPORTED: bool = true;

pub(crate) fn deny_attach() -> Result<(), HardenError> {
    match unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) } {
        0 => Ok(()),
        _ => Err(HardenError::Os(io::Error::last_os_error())),
    }
}
