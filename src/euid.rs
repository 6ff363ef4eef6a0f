//
// Run the decision procedure with the effective uid of the user being
// authenticated, so that it reads that user's files with that user's
// permissions.
//
use std::io;

use libc::uid_t;

const UID_NONE: uid_t = !0;

fn setreuid(real: Option<uid_t>, effective: Option<uid_t>) -> io::Result<()> {
    let real = real.unwrap_or(UID_NONE);
    let effective = effective.unwrap_or(UID_NONE);
    match unsafe { libc::setreuid(real, effective) } {
        0 => Ok(()),
        _ => Err(io::Error::last_os_error()),
    }
}

/// Switches the effective uid, and switches it back when dropped.
#[derive(Debug)]
pub struct EuidGuard {
    saved: Option<uid_t>,
}

impl EuidGuard {
    /// Set the effective uid to `uid`. If it already is, nothing is
    /// changed and nothing is restored later.
    pub fn switch_to(uid: u32) -> io::Result<EuidGuard> {
        let current = unsafe { libc::geteuid() };
        if current == uid {
            return Ok(EuidGuard { saved: None });
        }
        setreuid(None, Some(uid))?;
        debug!("EuidGuard::switch_to: euid {} -> {}", current, uid);
        Ok(EuidGuard { saved: Some(current) })
    }

    pub fn switched(&self) -> bool {
        self.saved.is_some()
    }
}

impl Drop for EuidGuard {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(e) = setreuid(None, Some(saved)) {
                error!("EuidGuard: restoring euid {}: {}", saved, e);
            }
        }
    }
}
