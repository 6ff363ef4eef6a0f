//
// Identity resolution: who is authenticating, and which local account
// that name maps to.
//
use std::ffi::{CStr, OsStr};
use std::io;
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};

use crate::context::AuthContext;

// Paths with this prefix name something built into the decision
// procedure, not a file.
pub const EMBEDDED_PREFIX: &str = "embedded:";

// getpwnam_r buffer limits.
const PWBUF_DEFAULT: usize = 1024;
const PWBUF_MAX: usize = 1 << 20;

/// Snapshot of an account in the host user database.
///
/// Only ever constructed complete: a lookup either yields a name, uid
/// and home directory together, or nothing at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    name: String,
    uid:  u32,
    home: PathBuf,
}

impl Account {
    pub fn new(name: impl Into<String>, uid: u32, home: impl Into<PathBuf>) -> Account {
        Account {
            name: name.into(),
            uid,
            home: home.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Expand a path from configuration for this account.
    ///
    /// A relative path is joined onto the home directory and cleaned up
    /// lexically. Then the first `%u` in the result is replaced by the
    /// account name.
    pub fn expand_path(&self, path: &str) -> PathBuf {
        if path.starts_with(EMBEDDED_PREFIX) {
            return PathBuf::from(path);
        }
        let p = Path::new(path);
        let full = if p.is_absolute() {
            p.to_path_buf()
        } else {
            clean_path(&self.home.join(p))
        };
        replace_first(full.as_os_str().as_bytes(), b"%u", self.name.as_bytes())
    }
}

// Lexical cleanup: drop `.` and resolve `..` against the preceding
// component. `..` never climbs above the root.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {},
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

fn replace_first(haystack: &[u8], from: &[u8], to: &[u8]) -> PathBuf {
    let mut bytes = haystack.to_vec();
    if let Some(pos) = haystack.windows(from.len()).position(|w| w == from) {
        bytes.splice(pos..pos + from.len(), to.iter().cloned());
    }
    PathBuf::from(OsStr::from_bytes(&bytes))
}

/// The host account database, read-only.
pub trait AccountDatabase {
    /// Look up an account by name. `None` if there is no such account or
    /// the lookup failed.
    fn lookup_by_name(&self, name: &CStr) -> Option<Account>;
}

/// The system user database, via getpwnam_r(3).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAccounts;

impl AccountDatabase for SystemAccounts {
    fn lookup_by_name(&self, name: &CStr) -> Option<Account> {
        // an empty name must never turn into "whoever runs this process".
        if name.to_bytes().is_empty() {
            return None;
        }
        match getpwnam(name) {
            Ok(acct) => acct,
            Err(e) => {
                debug!("SystemAccounts::lookup_by_name({:?}): {}", name, e);
                None
            },
        }
    }
}

unsafe fn cptr_to_path<'a>(c: *const c_char) -> &'a Path {
    let bytes = CStr::from_ptr(c).to_bytes();
    Path::new(OsStr::from_bytes(bytes))
}

// turn a struct passwd into an owned Account. None if a field we
// need is missing.
unsafe fn to_account(pwd: &libc::passwd) -> Option<Account> {
    if pwd.pw_name.is_null() || pwd.pw_dir.is_null() {
        return None;
    }
    Some(Account {
        name: CStr::from_ptr(pwd.pw_name).to_string_lossy().into_owned(),
        uid:  pwd.pw_uid,
        home: cptr_to_path(pwd.pw_dir).to_path_buf(),
    })
}

fn initial_buflen() -> usize {
    match unsafe { libc::sysconf(libc::_SC_GETPW_R_SIZE_MAX) } {
        n if n > 0 => n as usize,
        _ => PWBUF_DEFAULT,
    }
}

fn getpwnam(name: &CStr) -> io::Result<Option<Account>> {
    let mut buflen = initial_buflen();
    loop {
        let mut buf: Vec<c_char> = vec![0; buflen];
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = std::ptr::null_mut();

        let ret = unsafe {
            libc::getpwnam_r(
                name.as_ptr(),
                &mut pwd as *mut _,
                buf.as_mut_ptr(),
                buf.len() as libc::size_t,
                &mut result as *mut _,
            )
        };
        match ret {
            0 if result.is_null() => return Ok(None),
            0 => return Ok(unsafe { to_account(&pwd) }),
            libc::ERANGE if buflen < PWBUF_MAX => buflen *= 2,
            e => return Err(io::Error::from_raw_os_error(e)),
        }
    }
}

/// The user name the context is authenticating, if any.
pub fn resolve_username<C: AuthContext + ?Sized>(context: Option<&C>) -> Option<&CStr> {
    context?.username()
}

/// The account of the user the context is authenticating.
///
/// Without a context or a user name this returns `None` without ever
/// consulting the database.
pub fn resolve_account<C, D>(context: Option<&C>, db: &D) -> Option<Account>
where
    C: AuthContext + ?Sized,
    D: AccountDatabase + ?Sized,
{
    let name = resolve_username(context)?;
    db.lookup_by_name(name)
}
