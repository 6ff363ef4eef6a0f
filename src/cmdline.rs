//
// The command line of the process we're loaded into (sshd, sudo, ...),
// for the audit log.
//
pub const UNKNOWN_COMMAND: &str = "unknown command";
pub const EMPTY_COMMAND: &str = "empty command";

/// The command line of the current process, arguments separated by
/// spaces. Never fails; returns `UNKNOWN_COMMAND` if it can't be read.
pub fn current() -> String {
    sys::current()
}

#[cfg(target_os = "linux")]
mod sys {
    pub(super) fn current() -> String {
        match std::fs::read("/proc/self/cmdline") {
            Ok(data) => super::parse_proc_cmdline(&data),
            Err(e) => {
                warn!("failed to read /proc/self/cmdline: {}", e);
                super::UNKNOWN_COMMAND.to_string()
            },
        }
    }
}

#[cfg(target_os = "macos")]
mod sys {
    use std::io;
    use std::os::raw::{c_int, c_void};

    fn procargs2(pid: libc::pid_t) -> io::Result<Vec<u8>> {
        let mut mib: [c_int; 3] = [libc::CTL_KERN, libc::KERN_PROCARGS2, pid];
        let mut size: libc::size_t = 0;
        let rc = unsafe {
            libc::sysctl(mib.as_mut_ptr(), 3, std::ptr::null_mut(), &mut size, std::ptr::null_mut(), 0)
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut buf = vec![0u8; size];
        let rc = unsafe {
            libc::sysctl(
                mib.as_mut_ptr(),
                3,
                buf.as_mut_ptr() as *mut c_void,
                &mut size,
                std::ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        buf.truncate(size);
        Ok(buf)
    }

    pub(super) fn current() -> String {
        let pid = unsafe { libc::getpid() };
        match procargs2(pid) {
            Ok(data) => super::parse_procargs2(&data),
            Err(e) => {
                // EINVAL means either "no such process" or "not permitted".
                warn!("sysctl kern.procargs2 for pid {}: {}", pid, e);
                super::UNKNOWN_COMMAND.to_string()
            },
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod sys {
    pub(super) fn current() -> String {
        super::UNKNOWN_COMMAND.to_string()
    }
}

// /proc/<pid>/cmdline: arguments, each terminated by a NUL.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_proc_cmdline(data: &[u8]) -> String {
    let mut end = data.len();
    while end > 0 && data[end - 1] == 0 {
        end -= 1;
    }
    if end == 0 {
        return EMPTY_COMMAND.to_string();
    }
    let line: Vec<u8> = data[..end].iter().map(|&b| if b == 0 { b' ' } else { b }).collect();
    String::from_utf8_lossy(&line).into_owned()
}

// kern.procargs2: argc as a native (little-endian) u32, then the
// executable path and the arguments, NUL separated, with runs of NUL
// padding in between. The environment follows; we stop before it.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn parse_procargs2(data: &[u8]) -> String {
    if data.len() < 4 {
        warn!("invalid kern.procargs2 data");
        return UNKNOWN_COMMAND.to_string();
    }
    let argc = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);

    let mut result: Vec<u8> = Vec::new();
    let mut count = 0u32;
    for word in data[4..].split(|&b| b == 0).filter(|w| !w.is_empty()) {
        result.extend_from_slice(word);
        if count < argc {
            result.push(b' ');
            count += 1;
        } else {
            break;
        }
    }

    if result.is_empty() {
        return UNKNOWN_COMMAND.to_string();
    }
    String::from_utf8_lossy(&result).into_owned()
}
