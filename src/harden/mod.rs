//
// Process hardening: keep debuggers and tracers from attaching to the
// process that is about to handle credentials.
//
use std::error::Error;
use std::fmt;
use std::io;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
use self::linux as sys;

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
use self::macos as sys;

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod generic_os;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
use self::generic_os as sys;

#[derive(Debug)]
pub enum HardenError {
    /// This platform has no way to deny debugger attachment.
    Unsupported,
    Os(io::Error),
}

impl fmt::Display for HardenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HardenError::Unsupported => write!(f, "not supported on this OS"),
            HardenError::Os(e) => write!(f, "{}", e),
        }
    }
}

impl Error for HardenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HardenError::Os(e) => Some(e),
            HardenError::Unsupported => None,
        }
    }
}

impl From<io::Error> for HardenError {
    fn from(e: io::Error) -> Self {
        HardenError::Os(e)
    }
}

pub trait Hardener {
    /// Deny debugger attachment to the current process. Calling this
    /// again once it succeeded succeeds again.
    fn harden(&self) -> Result<(), HardenError>;
}

/// Hardener for the current process using the platform primitive.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessHardener;

impl Hardener for ProcessHardener {
    fn harden(&self) -> Result<(), HardenError> {
        harden_process()
    }
}

/// Deny debugger attachment to the current process.
///
/// Linux clears the dumpable flag (`PR_SET_DUMPABLE`), which also
/// disables core dumps. macOS uses `PT_DENY_ATTACH`; note that a process
/// that is already being traced gets killed by it. Anywhere else this
/// fails with `HardenError::Unsupported`.
pub fn harden_process() -> Result<(), HardenError> {
    sys::deny_attach()
}

/// Does this platform have a hardening primitive at all.
pub fn is_supported() -> bool {
    sys::SUPPORTED
}
