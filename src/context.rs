//
// The authentication context: the opaque handle the PAM stack passes to
// the module for the duration of one call.
//
use std::ffi::CStr;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_int, c_void};
use std::ptr;

/// Item type of the user name, as passed to `pam_get_item`. Same value
/// in Linux-PAM and OpenPAM.
pub const PAM_USER: c_int = 2;

/// Read access to the state of an authentication attempt.
pub trait AuthContext {
    /// The user being authenticated, if the stack knows it yet.
    ///
    /// An empty name is reported as `None`.
    fn username(&self) -> Option<&CStr>;

    /// The PAM handle behind this context, for querying items this
    /// crate does not wrap (`PAM_RHOST`, `PAM_SERVICE`, `PAM_CONV`,
    /// the PAM environment). Contexts not backed by PAM have none.
    fn pam_handle(&self) -> Option<&PamHandle> {
        None
    }
}

/// Opaque PAM handle. Only ever used behind a reference borrowed from
/// the pointer the PAM stack handed us.
#[repr(C)]
pub struct PamHandle {
    _data:   [u8; 0],
    _marker: PhantomData<*mut c_void>,
}

type PamGetItemFn =
    unsafe extern "C" fn(pamh: *const PamHandle, item_type: c_int, item: *mut *const c_void) -> c_int;

// pam_get_item is looked up in the running process instead of being
// linked in: the host that loaded us already has libpam loaded, and this
// way the crate links (and its tests run) without libpam installed.
lazy_static! {
    static ref PAM_GET_ITEM: Option<PamGetItemFn> = lookup_pam_get_item();
}

// Hosts that dlopen libpam with RTLD_LOCAL keep its symbols out of the
// global scope. Those are found through the library handle instead.
#[cfg(target_os = "linux")]
const LIBPAM_NAMES: &[&[u8]] = &[b"libpam.so.0\0", b"libpam.so\0"];
#[cfg(target_os = "macos")]
const LIBPAM_NAMES: &[&[u8]] = &[b"libpam.2.dylib\0", b"libpam.dylib\0"];
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const LIBPAM_NAMES: &[&[u8]] = &[b"libpam.so\0"];

fn lookup_pam_get_item() -> Option<PamGetItemFn> {
    let sym = lookup_symbol(b"pam_get_item\0", LIBPAM_NAMES);
    if sym.is_null() {
        error!("pam_get_item not found in this process, cannot determine the user");
        return None;
    }
    Some(unsafe { std::mem::transmute::<*mut c_void, PamGetItemFn>(sym) })
}

// Find `name` in the global scope, then in each of `libraries` that is
// already loaded. Both must be NUL terminated.
fn lookup_symbol(name: &[u8], libraries: &[&[u8]]) -> *mut c_void {
    let name = name.as_ptr() as *const c_char;
    let sym = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name) };
    if !sym.is_null() {
        return sym;
    }
    for lib in libraries {
        let sym = unsafe { lookup_in_library(lib, name) };
        if !sym.is_null() {
            debug!("lookup_symbol: found in {}", String::from_utf8_lossy(&lib[..lib.len() - 1]));
            return sym;
        }
    }
    ptr::null_mut()
}

// RTLD_NOLOAD: never load the library ourselves, only take another
// reference to it. Dropping that reference leaves the host's in place.
unsafe fn lookup_in_library(lib: &[u8], name: *const c_char) -> *mut c_void {
    let handle = libc::dlopen(lib.as_ptr() as *const c_char, libc::RTLD_LAZY | libc::RTLD_NOLOAD);
    if handle.is_null() {
        return ptr::null_mut();
    }
    let sym = libc::dlsym(handle, name);
    libc::dlclose(handle);
    sym
}

impl PamHandle {
    /// Borrow the handle behind a raw pointer. Null becomes `None`.
    ///
    /// # Safety
    /// `pamh` must be null or a handle obtained from the PAM stack that
    /// stays valid for `'a`.
    pub unsafe fn from_raw<'a>(pamh: *mut PamHandle) -> Option<&'a PamHandle> {
        pamh.as_ref()
    }

    /// The raw pointer, to pass to libpam functions.
    pub fn as_ptr(&self) -> *mut PamHandle {
        self as *const PamHandle as *mut PamHandle
    }
}

impl AuthContext for PamHandle {
    fn username(&self) -> Option<&CStr> {
        let get_item = (*PAM_GET_ITEM)?;
        let mut item: *const c_void = ptr::null();
        let rc = unsafe { get_item(self, PAM_USER, &mut item) };
        if rc != crate::result::PamResultCode::Success.as_raw() || item.is_null() {
            debug!("PamHandle::username: pam_get_item(PAM_USER) returned {}", rc);
            return None;
        }
        // The string is owned by the handle and lives at least as long
        // as our borrow of it.
        let name = unsafe { CStr::from_ptr(item as *const c_char) };
        if name.to_bytes().is_empty() {
            None
        } else {
            Some(name)
        }
    }

    fn pam_handle(&self) -> Option<&PamHandle> {
        Some(self)
    }
}
