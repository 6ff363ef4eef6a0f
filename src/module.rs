//
// Module entry points: what the PAM stack calls, and the contract with
// the decision procedure that makes the actual accept/deny decision.
//
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::account::{resolve_account, resolve_username, Account, AccountDatabase, SystemAccounts};
use crate::cmdline;
use crate::config::{HardeningPolicy, ModuleConfig};
use crate::context::{AuthContext, PamHandle};
use crate::euid::EuidGuard;
use crate::harden::{HardenError, Hardener, ProcessHardener};
use crate::logger;
use crate::result::{translate, AuthError, DecisionError, PamResultCode, Verdict};

/// The external procedure that decides whether the user gets in.
///
/// It is handed an `AuthRequest` through which it can query the user,
/// the account, and harden the process further. It must not keep the
/// request, or anything borrowed from it, beyond the call.
pub trait DecisionProcedure {
    fn decide(&self, request: &AuthRequest<'_>) -> Result<Verdict, DecisionError>;
}

impl<F> DecisionProcedure for F
where F: Fn(&AuthRequest<'_>) -> Result<Verdict, DecisionError>
{
    fn decide(&self, request: &AuthRequest<'_>) -> Result<Verdict, DecisionError> {
        self(request)
    }
}

/// The host services the module works with.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub accounts: &'a dyn AccountDatabase,
    pub hardener: &'a dyn Hardener,
}

impl Host<'static> {
    /// The real user database and the platform hardener.
    pub fn system() -> Host<'static> {
        Host {
            accounts: &SystemAccounts,
            hardener: &ProcessHardener,
        }
    }
}

/// One authentication attempt, as seen by the decision procedure.
pub struct AuthRequest<'a> {
    context: &'a dyn AuthContext,
    host:    Host<'a>,
    flags:   c_int,
    args:    &'a [&'a CStr],
}

impl<'a> AuthRequest<'a> {
    /// The raw context handle of this attempt.
    pub fn context(&self) -> &'a dyn AuthContext {
        self.context
    }

    /// The PAM handle of this attempt, when it came from a PAM stack.
    /// Use it for items not wrapped here, like `PAM_RHOST` or the PAM
    /// environment.
    pub fn pam_handle(&self) -> Option<&'a PamHandle> {
        self.context.pam_handle()
    }

    pub fn username(&self) -> Option<&'a CStr> {
        resolve_username(Some(self.context))
    }

    /// A fresh lookup of the account being authenticated.
    pub fn account(&self) -> Option<Account> {
        resolve_account(Some(self.context), self.host.accounts)
    }

    pub fn harden(&self) -> Result<(), HardenError> {
        self.host.hardener.harden()
    }

    pub fn flags(&self) -> c_int {
        self.flags
    }

    /// The module arguments from the PAM stack line.
    pub fn args(&self) -> &'a [&'a CStr] {
        self.args
    }
}

fn harden(config: &ModuleConfig, hardener: &dyn Hardener) -> Result<(), AuthError> {
    let err = match hardener.harden() {
        Ok(()) => return Ok(()),
        Err(HardenError::Unsupported) => AuthError::HardeningUnsupported,
        Err(HardenError::Os(e)) => AuthError::HardeningFailed(e),
    };
    match config.hardening {
        HardeningPolicy::Required => Err(err),
        HardeningPolicy::Optional => {
            warn!("continuing without process hardening: {}", err);
            Ok(())
        },
    }
}

// Everything up to and including the verdict. Returns the user name
// (if we got that far) for the audit log.
fn attempt<P>(
    context: Option<&dyn AuthContext>,
    flags: c_int,
    args: &[&CStr],
    config: &ModuleConfig,
    host: Host<'_>,
    procedure: &P,
) -> (Option<String>, Result<Verdict, AuthError>)
where
    P: DecisionProcedure + ?Sized,
{
    let context = match context {
        Some(c) => c,
        None => return (None, Err(AuthError::ContextInvalid)),
    };

    if let Err(e) = harden(config, host.hardener) {
        let user = resolve_username(Some(context)).map(|u| u.to_string_lossy().into_owned());
        return (user, Err(e));
    }

    let user = match resolve_username(Some(context)) {
        Some(u) => u,
        None => return (None, Err(AuthError::IdentityAbsent)),
    };
    let account = match host.accounts.lookup_by_name(user) {
        Some(acct) => acct,
        None => return (Some(user.to_string_lossy().into_owned()), Err(AuthError::AccountLookupFailed)),
    };

    let _euid = if config.switch_euid {
        match EuidGuard::switch_to(account.uid()) {
            Ok(guard) => Some(guard),
            Err(e) => {
                warn!("cannot switch euid to {}: {}", account.uid(), e);
                None
            },
        }
    } else {
        None
    };

    let request = AuthRequest {
        context,
        host,
        flags,
        args,
    };
    let outcome = match procedure.decide(&request) {
        Ok(Verdict::Approved) => Ok(Verdict::Approved),
        Ok(Verdict::Rejected) => Err(AuthError::DecisionDenied),
        Err(e) => Err(AuthError::from(e)),
    };
    (Some(account.name().to_string()), outcome)
}

/// Authenticate the user of `context`.
///
/// Hardens the process, resolves the account, and hands the attempt to
/// `procedure`. Returns `Success` only if the procedure approved; every
/// other outcome is `AuthErr`.
pub fn authenticate<P>(
    context: Option<&dyn AuthContext>,
    flags: c_int,
    args: &[&CStr],
    config: &ModuleConfig,
    host: Host<'_>,
    procedure: &P,
) -> PamResultCode
where
    P: DecisionProcedure + ?Sized,
{
    let (user, outcome) = attempt(context, flags, args, config, host, procedure);
    let user = user.as_deref().unwrap_or("(unknown)");
    let cmd = cmdline::current();
    match outcome {
        Ok(_) => info!("Grant: USER={}, CMD=({})", user, cmd),
        Err(ref e) => {
            debug!("authenticate: {}: {}", user, e);
            warn!("Deny: USER={}, CMD=({})", user, cmd);
        },
    }
    translate(&outcome)
}

/// Set credentials. This module has none, so this always succeeds and
/// touches nothing.
pub fn update_credentials(_context: Option<&dyn AuthContext>, _flags: c_int, _args: &[&CStr]) -> PamResultCode {
    PamResultCode::Success
}

// Run an entry point, making sure a panic never unwinds into C.
fn contain<F>(f: F) -> c_int
where F: FnOnce() -> PamResultCode {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(code) => code.as_raw(),
        Err(_) => {
            error!("panic during authentication, denying");
            PamResultCode::AuthErr.as_raw()
        },
    }
}

unsafe fn extract_args<'a>(argc: c_int, argv: *const *const c_char) -> Vec<&'a CStr> {
    if argv.is_null() || argc <= 0 {
        return Vec::new();
    }
    (0..argc as isize)
        .map(|i| *argv.offset(i))
        .filter(|p| !p.is_null())
        .map(|p| CStr::from_ptr(p))
        .collect()
}

/// Body of `pam_sm_authenticate`, see `pam_sshca_module!`.
///
/// # Safety
/// Arguments must be as passed in by the PAM stack.
#[doc(hidden)]
pub unsafe fn sm_authenticate<P>(pamh: *mut PamHandle, flags: c_int, argc: c_int, argv: *const *const c_char) -> c_int
where P: DecisionProcedure + Default {
    let args = extract_args(argc, argv);
    let context = PamHandle::from_raw(pamh).map(|h| h as &dyn AuthContext);
    logger::install_panic_hook();
    contain(|| {
        let config = match ModuleConfig::from_args(&args) {
            Ok(config) => config,
            Err(e) => {
                logger::init(&ModuleConfig::default());
                error!("{}", e);
                return translate(&Err(AuthError::Config(e)));
            },
        };
        logger::init(&config);
        authenticate(context, flags, &args, &config, Host::system(), &P::default())
    })
}

/// Body of `pam_sm_setcred`, see `pam_sshca_module!`.
///
/// # Safety
/// Arguments must be as passed in by the PAM stack.
#[doc(hidden)]
pub unsafe fn sm_setcred(pamh: *mut PamHandle, flags: c_int, argc: c_int, argv: *const *const c_char) -> c_int {
    let args = extract_args(argc, argv);
    let context = PamHandle::from_raw(pamh).map(|h| h as &dyn AuthContext);
    logger::install_panic_hook();
    contain(|| update_credentials(context, flags, &args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::ffi::CString;
    use std::io;
    use std::path::Path;
    use std::ptr;

    use crate::account::tests::{StubAccounts, StubContext};
    use crate::euid::tests::{in_child, is_root, NOBODY};

    struct StubHardener {
        result: fn() -> Result<(), HardenError>,
        calls:  Cell<usize>,
    }

    impl StubHardener {
        fn new(result: fn() -> Result<(), HardenError>) -> StubHardener {
            StubHardener {
                result,
                calls: Cell::new(0),
            }
        }
    }

    impl Hardener for StubHardener {
        fn harden(&self) -> Result<(), HardenError> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    fn hardened() -> Result<(), HardenError> {
        Ok(())
    }

    fn unsupported() -> Result<(), HardenError> {
        Err(HardenError::Unsupported)
    }

    fn eperm() -> Result<(), HardenError> {
        Err(HardenError::Os(io::Error::from_raw_os_error(libc::EPERM)))
    }

    // Records whether it was called, then returns a fixed verdict.
    struct Fixed {
        verdict: Result<Verdict, DecisionError>,
        called:  Cell<bool>,
    }

    impl Fixed {
        fn new(verdict: Result<Verdict, DecisionError>) -> Fixed {
            Fixed {
                verdict,
                called: Cell::new(false),
            }
        }
    }

    impl DecisionProcedure for Fixed {
        fn decide(&self, _request: &AuthRequest<'_>) -> Result<Verdict, DecisionError> {
            self.called.set(true);
            self.verdict.clone()
        }
    }

    // Approves only if the services report bob's account.
    struct ExpectBob;

    impl DecisionProcedure for ExpectBob {
        fn decide(&self, req: &AuthRequest<'_>) -> Result<Verdict, DecisionError> {
            let acct = req.account().ok_or("no account")?;
            let user = req.username().ok_or("no user")?;
            req.harden().map_err(|e| DecisionError::new(e.to_string()))?;
            Ok(Verdict::from(
                acct.uid() == 1001 && acct.home() == Path::new("/home/bob") && user.to_bytes() == b"bob",
            ))
        }
    }

    fn test_config() -> ModuleConfig {
        ModuleConfig {
            switch_euid: false,
            ..ModuleConfig::default()
        }
    }

    fn bob_db() -> StubAccounts {
        StubAccounts::default().with("bob", 1001, "/home/bob")
    }

    fn run(ctx: Option<&dyn AuthContext>, db: &StubAccounts, hardener: &StubHardener, p: &dyn DecisionProcedure) -> PamResultCode {
        let host = Host {
            accounts: db,
            hardener,
        };
        authenticate(ctx, 0, &[], &test_config(), host, p)
    }

    #[test]
    fn test_bob_approved() {
        let ctx = StubContext::user("bob");
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        let procedure = Fixed::new(Ok(Verdict::Approved));
        assert_eq!(run(Some(&ctx), &db, &hardener, &procedure), PamResultCode::Success);
        assert!(procedure.called.get());
        assert_eq!(hardener.calls.get(), 1);
    }

    #[test]
    fn test_bob_rejected() {
        let ctx = StubContext::user("bob");
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        let procedure = Fixed::new(Ok(Verdict::Rejected));
        assert_eq!(run(Some(&ctx), &db, &hardener, &procedure), PamResultCode::AuthErr);
    }

    #[test]
    fn test_procedure_fault() {
        let ctx = StubContext::user("bob");
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        let procedure = Fixed::new(Err(DecisionError::new("ssh-agent unreachable")));
        assert_eq!(run(Some(&ctx), &db, &hardener, &procedure), PamResultCode::AuthErr);
    }

    #[test]
    fn test_procedure_sees_account() {
        let ctx = StubContext::user("bob");
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        let procedure = ExpectBob;
        assert_eq!(run(Some(&ctx), &db, &hardener, &procedure), PamResultCode::Success);
        assert_eq!(hardener.calls.get(), 2);
    }

    #[test]
    fn test_no_context() {
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        let procedure = Fixed::new(Ok(Verdict::Approved));
        assert_eq!(run(None, &db, &hardener, &procedure), PamResultCode::AuthErr);
        assert!(!procedure.called.get());
        assert_eq!(db.lookups.get(), 0);
    }

    #[test]
    fn test_no_username() {
        let ctx = StubContext(None);
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        let procedure = Fixed::new(Ok(Verdict::Approved));
        assert_eq!(run(Some(&ctx), &db, &hardener, &procedure), PamResultCode::AuthErr);
        assert!(!procedure.called.get());
        assert_eq!(db.lookups.get(), 0);
    }

    #[test]
    fn test_unknown_account() {
        let ctx = StubContext::user("carol");
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        let procedure = Fixed::new(Ok(Verdict::Approved));
        assert_eq!(run(Some(&ctx), &db, &hardener, &procedure), PamResultCode::AuthErr);
        assert!(!procedure.called.get());
    }

    #[test]
    fn test_hardening_required() {
        let ctx = StubContext::user("bob");
        let db = bob_db();
        for result in &[unsupported as fn() -> Result<(), HardenError>, eperm] {
            let hardener = StubHardener::new(*result);
            let procedure = Fixed::new(Ok(Verdict::Approved));
            assert_eq!(run(Some(&ctx), &db, &hardener, &procedure), PamResultCode::AuthErr);
            assert!(!procedure.called.get());
        }
    }

    #[test]
    fn test_hardening_optional() {
        let ctx = StubContext::user("bob");
        let db = bob_db();
        let hardener = StubHardener::new(unsupported);
        let procedure = Fixed::new(Ok(Verdict::Approved));
        let config = ModuleConfig {
            hardening: HardeningPolicy::Optional,
            ..test_config()
        };
        let host = Host {
            accounts: &db,
            hardener: &hardener,
        };
        assert_eq!(authenticate(Some(&ctx), 0, &[], &config, host, &procedure), PamResultCode::Success);
    }

    // A PAM-backed context whose user name does not need libpam.
    struct HandleContext {
        user:   CString,
        handle: &'static PamHandle,
    }

    impl AuthContext for HandleContext {
        fn username(&self) -> Option<&CStr> {
            Some(&self.user)
        }

        fn pam_handle(&self) -> Option<&PamHandle> {
            Some(self.handle)
        }
    }

    struct ExpectHandle(Option<*mut PamHandle>);

    impl DecisionProcedure for ExpectHandle {
        fn decide(&self, req: &AuthRequest<'_>) -> Result<Verdict, DecisionError> {
            Ok(Verdict::from(req.pam_handle().map(|h| h.as_ptr()) == self.0))
        }
    }

    #[test]
    fn test_procedure_gets_pam_handle() {
        let raw = ptr::NonNull::<PamHandle>::dangling().as_ptr();
        let ctx = HandleContext {
            user:   CString::new("bob").unwrap(),
            handle: unsafe { PamHandle::from_raw(raw) }.unwrap(),
        };
        let db = bob_db();
        let hardener = StubHardener::new(hardened);
        assert_eq!(run(Some(&ctx), &db, &hardener, &ExpectHandle(Some(raw))), PamResultCode::Success);

        let ctx = StubContext::user("bob");
        assert_eq!(run(Some(&ctx), &db, &hardener, &ExpectHandle(None)), PamResultCode::Success);
    }

    // Remembers the euid it ran with.
    struct RecordEuid {
        seen:  Cell<libc::uid_t>,
        panic: bool,
    }

    impl DecisionProcedure for RecordEuid {
        fn decide(&self, _request: &AuthRequest<'_>) -> Result<Verdict, DecisionError> {
            self.seen.set(unsafe { libc::geteuid() });
            if self.panic {
                panic!("decision procedure failed");
            }
            Ok(Verdict::Approved)
        }
    }

    fn authenticate_as_nobody(procedure: &RecordEuid) -> c_int {
        let ctx = StubContext::user("nobody");
        let db = StubAccounts::default().with("nobody", NOBODY, "/nonexistent");
        let hardener = StubHardener::new(hardened);
        let host = Host {
            accounts: &db,
            hardener: &hardener,
        };
        let config = ModuleConfig::default();
        assert!(config.switch_euid);
        contain(|| authenticate(Some(&ctx), 0, &[], &config, host, procedure))
    }

    #[test]
    fn test_euid_switched_for_procedure() {
        if !is_root() {
            return;
        }
        assert!(in_child(|| {
            let procedure = RecordEuid {
                seen:  Cell::new(0),
                panic: false,
            };
            let rc = authenticate_as_nobody(&procedure);
            rc == PamResultCode::Success.as_raw() && procedure.seen.get() == NOBODY && unsafe { libc::geteuid() } == 0
        }));
    }

    #[test]
    fn test_euid_restored_after_panic() {
        if !is_root() {
            return;
        }
        assert!(in_child(|| {
            let procedure = RecordEuid {
                seen:  Cell::new(0),
                panic: true,
            };
            let rc = authenticate_as_nobody(&procedure);
            rc == PamResultCode::AuthErr.as_raw() && procedure.seen.get() == NOBODY && unsafe { libc::geteuid() } == 0
        }));
    }

    #[test]
    fn test_update_credentials() {
        let ctx = StubContext::user("bob");
        assert_eq!(update_credentials(None, 0, &[]), PamResultCode::Success);
        assert_eq!(update_credentials(Some(&ctx), 0, &[]), PamResultCode::Success);
    }

    #[test]
    fn test_contain_panic() {
        assert_eq!(contain(|| PamResultCode::Success), PamResultCode::Success.as_raw());
        assert_eq!(contain(|| panic!("boom")), PamResultCode::AuthErr.as_raw());
    }

    #[test]
    fn test_extract_args() {
        let a = CString::new("debug").unwrap();
        let b = CString::new("hardening=optional").unwrap();
        let argv = [a.as_ptr(), ptr::null(), b.as_ptr()];
        let args = unsafe { extract_args(3, argv.as_ptr()) };
        assert_eq!(args, vec![a.as_c_str(), b.as_c_str()]);
        assert!(unsafe { extract_args(2, ptr::null()) }.is_empty());
    }

    #[derive(Default)]
    struct AlwaysApprove;

    impl DecisionProcedure for AlwaysApprove {
        fn decide(&self, _request: &AuthRequest<'_>) -> Result<Verdict, DecisionError> {
            Ok(Verdict::Approved)
        }
    }

    pam_sshca_module!(AlwaysApprove);

    #[test]
    fn test_exported_entry_points() {
        let auth = unsafe { pam_sm_authenticate(ptr::null_mut(), 0, 0, ptr::null()) };
        assert_eq!(auth, PamResultCode::AuthErr.as_raw());

        let bad = CString::new("hardening=sometimes").unwrap();
        let argv = [bad.as_ptr()];
        let auth = unsafe { pam_sm_authenticate(ptr::null_mut(), 0, 1, argv.as_ptr()) };
        assert_eq!(auth, PamResultCode::AuthErr.as_raw());

        let cred = unsafe { pam_sm_setcred(ptr::null_mut(), 0, 0, ptr::null()) };
        assert_eq!(cred, PamResultCode::Success.as_raw());
    }
}
