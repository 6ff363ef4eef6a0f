/// Export the PAM service-module entry points for a decision procedure.
///
/// ```ignore
/// #[derive(Default)]
/// struct CertCheck;
///
/// impl pam_sshca::DecisionProcedure for CertCheck {
///     fn decide(&self, req: &pam_sshca::AuthRequest<'_>)
///         -> Result<pam_sshca::Verdict, pam_sshca::DecisionError>
///     {
///         // ...
///     }
/// }
///
/// pam_sshca::pam_sshca_module!(CertCheck);
/// ```
///
/// This defines `pam_sm_authenticate`, which runs `module::authenticate`
/// with a fresh `CertCheck::default()` for every call, and
/// `pam_sm_setcred`, which always succeeds. Build the crate that invokes
/// it as a `cdylib`.
#[macro_export]
macro_rules! pam_sshca_module {
    ($procedure:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn pam_sm_authenticate(
            pamh: *mut $crate::PamHandle,
            flags: ::std::os::raw::c_int,
            argc: ::std::os::raw::c_int,
            argv: *const *const ::std::os::raw::c_char,
        ) -> ::std::os::raw::c_int {
            $crate::module::sm_authenticate::<$procedure>(pamh, flags, argc, argv)
        }

        #[no_mangle]
        pub unsafe extern "C" fn pam_sm_setcred(
            pamh: *mut $crate::PamHandle,
            flags: ::std::os::raw::c_int,
            argc: ::std::os::raw::c_int,
            argv: *const *const ::std::os::raw::c_char,
        ) -> ::std::os::raw::c_int {
            $crate::module::sm_setcred(pamh, flags, argc, argv)
        }
    };
}
