//
// Result codes handed back to the PAM stack, and the translation of
// authentication outcomes into those codes.
//
use std::error::Error;
use std::fmt;
use std::io;
use std::os::raw::c_int;

use crate::config::ConfigError;

/// Return values of the PAM service-module interface.
///
/// The numeric values differ between Linux-PAM and OpenPAM, so the enum
/// carries no discriminants; use `as_raw` to get the value the host
/// library understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PamResultCode {
    Success,
    OpenErr,
    SymbolErr,
    ServiceErr,
    SystemErr,
    BufErr,
    ConvErr,
    PermDenied,
    MaxTries,
    AuthErr,
    NewAuthtokReqd,
    CredInsufficient,
    AuthinfoUnavail,
    UserUnknown,
    CredUnavail,
    CredExpired,
    CredErr,
    AcctExpired,
    AuthtokExpired,
    SessionErr,
    AuthtokErr,
    AuthtokRecoveryErr,
    AuthtokLockBusy,
    AuthtokDisableAging,
    NoModuleData,
    Ignore,
    Abort,
    TryAgain,
    ModuleUnknown,
}

#[cfg(not(target_os = "macos"))]
mod raw {
    // Linux-PAM, security/_pam_types.h
    pub const SUCCESS: i32 = 0;
    pub const OPEN_ERR: i32 = 1;
    pub const SYMBOL_ERR: i32 = 2;
    pub const SERVICE_ERR: i32 = 3;
    pub const SYSTEM_ERR: i32 = 4;
    pub const BUF_ERR: i32 = 5;
    pub const PERM_DENIED: i32 = 6;
    pub const AUTH_ERR: i32 = 7;
    pub const CRED_INSUFFICIENT: i32 = 8;
    pub const AUTHINFO_UNAVAIL: i32 = 9;
    pub const USER_UNKNOWN: i32 = 10;
    pub const MAXTRIES: i32 = 11;
    pub const NEW_AUTHTOK_REQD: i32 = 12;
    pub const ACCT_EXPIRED: i32 = 13;
    pub const SESSION_ERR: i32 = 14;
    pub const CRED_UNAVAIL: i32 = 15;
    pub const CRED_EXPIRED: i32 = 16;
    pub const CRED_ERR: i32 = 17;
    pub const NO_MODULE_DATA: i32 = 18;
    pub const CONV_ERR: i32 = 19;
    pub const AUTHTOK_ERR: i32 = 20;
    pub const AUTHTOK_RECOVERY_ERR: i32 = 21;
    pub const AUTHTOK_LOCK_BUSY: i32 = 22;
    pub const AUTHTOK_DISABLE_AGING: i32 = 23;
    pub const TRY_AGAIN: i32 = 24;
    pub const IGNORE: i32 = 25;
    pub const ABORT: i32 = 26;
    pub const AUTHTOK_EXPIRED: i32 = 27;
    pub const MODULE_UNKNOWN: i32 = 28;
}

#[cfg(target_os = "macos")]
mod raw {
    // OpenPAM, security/pam_constants.h
    pub const SUCCESS: i32 = 0;
    pub const OPEN_ERR: i32 = 1;
    pub const SYMBOL_ERR: i32 = 2;
    pub const SERVICE_ERR: i32 = 3;
    pub const SYSTEM_ERR: i32 = 4;
    pub const BUF_ERR: i32 = 5;
    pub const CONV_ERR: i32 = 6;
    pub const PERM_DENIED: i32 = 7;
    pub const MAXTRIES: i32 = 8;
    pub const AUTH_ERR: i32 = 9;
    pub const NEW_AUTHTOK_REQD: i32 = 10;
    pub const CRED_INSUFFICIENT: i32 = 11;
    pub const AUTHINFO_UNAVAIL: i32 = 12;
    pub const USER_UNKNOWN: i32 = 13;
    pub const CRED_UNAVAIL: i32 = 14;
    pub const CRED_EXPIRED: i32 = 15;
    pub const CRED_ERR: i32 = 16;
    pub const ACCT_EXPIRED: i32 = 17;
    pub const AUTHTOK_EXPIRED: i32 = 18;
    pub const SESSION_ERR: i32 = 19;
    pub const AUTHTOK_ERR: i32 = 20;
    pub const AUTHTOK_RECOVERY_ERR: i32 = 21;
    pub const AUTHTOK_LOCK_BUSY: i32 = 22;
    pub const AUTHTOK_DISABLE_AGING: i32 = 23;
    pub const NO_MODULE_DATA: i32 = 24;
    pub const IGNORE: i32 = 25;
    pub const ABORT: i32 = 26;
    pub const TRY_AGAIN: i32 = 27;
    pub const MODULE_UNKNOWN: i32 = 28;
}

const ALL_CODES: [PamResultCode; 29] = [
    PamResultCode::Success,
    PamResultCode::OpenErr,
    PamResultCode::SymbolErr,
    PamResultCode::ServiceErr,
    PamResultCode::SystemErr,
    PamResultCode::BufErr,
    PamResultCode::ConvErr,
    PamResultCode::PermDenied,
    PamResultCode::MaxTries,
    PamResultCode::AuthErr,
    PamResultCode::NewAuthtokReqd,
    PamResultCode::CredInsufficient,
    PamResultCode::AuthinfoUnavail,
    PamResultCode::UserUnknown,
    PamResultCode::CredUnavail,
    PamResultCode::CredExpired,
    PamResultCode::CredErr,
    PamResultCode::AcctExpired,
    PamResultCode::AuthtokExpired,
    PamResultCode::SessionErr,
    PamResultCode::AuthtokErr,
    PamResultCode::AuthtokRecoveryErr,
    PamResultCode::AuthtokLockBusy,
    PamResultCode::AuthtokDisableAging,
    PamResultCode::NoModuleData,
    PamResultCode::Ignore,
    PamResultCode::Abort,
    PamResultCode::TryAgain,
    PamResultCode::ModuleUnknown,
];

impl PamResultCode {
    /// The value as understood by the host PAM library.
    pub fn as_raw(self) -> c_int {
        use self::PamResultCode::*;
        match self {
            Success => raw::SUCCESS,
            OpenErr => raw::OPEN_ERR,
            SymbolErr => raw::SYMBOL_ERR,
            ServiceErr => raw::SERVICE_ERR,
            SystemErr => raw::SYSTEM_ERR,
            BufErr => raw::BUF_ERR,
            ConvErr => raw::CONV_ERR,
            PermDenied => raw::PERM_DENIED,
            MaxTries => raw::MAXTRIES,
            AuthErr => raw::AUTH_ERR,
            NewAuthtokReqd => raw::NEW_AUTHTOK_REQD,
            CredInsufficient => raw::CRED_INSUFFICIENT,
            AuthinfoUnavail => raw::AUTHINFO_UNAVAIL,
            UserUnknown => raw::USER_UNKNOWN,
            CredUnavail => raw::CRED_UNAVAIL,
            CredExpired => raw::CRED_EXPIRED,
            CredErr => raw::CRED_ERR,
            AcctExpired => raw::ACCT_EXPIRED,
            AuthtokExpired => raw::AUTHTOK_EXPIRED,
            SessionErr => raw::SESSION_ERR,
            AuthtokErr => raw::AUTHTOK_ERR,
            AuthtokRecoveryErr => raw::AUTHTOK_RECOVERY_ERR,
            AuthtokLockBusy => raw::AUTHTOK_LOCK_BUSY,
            AuthtokDisableAging => raw::AUTHTOK_DISABLE_AGING,
            NoModuleData => raw::NO_MODULE_DATA,
            Ignore => raw::IGNORE,
            Abort => raw::ABORT,
            TryAgain => raw::TRY_AGAIN,
            ModuleUnknown => raw::MODULE_UNKNOWN,
        }
    }

    /// Map a raw value back onto the enumeration. Anything we don't
    /// recognize becomes `AuthErr`, so an out-of-range value can never
    /// reach the PAM stack.
    pub fn from_raw(code: c_int) -> PamResultCode {
        ALL_CODES
            .iter()
            .cloned()
            .find(|c| c.as_raw() == code)
            .unwrap_or(PamResultCode::AuthErr)
    }

    pub fn name(self) -> &'static str {
        use self::PamResultCode::*;
        match self {
            Success => "PAM_SUCCESS",
            OpenErr => "PAM_OPEN_ERR",
            SymbolErr => "PAM_SYMBOL_ERR",
            ServiceErr => "PAM_SERVICE_ERR",
            SystemErr => "PAM_SYSTEM_ERR",
            BufErr => "PAM_BUF_ERR",
            ConvErr => "PAM_CONV_ERR",
            PermDenied => "PAM_PERM_DENIED",
            MaxTries => "PAM_MAXTRIES",
            AuthErr => "PAM_AUTH_ERR",
            NewAuthtokReqd => "PAM_NEW_AUTHTOK_REQD",
            CredInsufficient => "PAM_CRED_INSUFFICIENT",
            AuthinfoUnavail => "PAM_AUTHINFO_UNAVAIL",
            UserUnknown => "PAM_USER_UNKNOWN",
            CredUnavail => "PAM_CRED_UNAVAIL",
            CredExpired => "PAM_CRED_EXPIRED",
            CredErr => "PAM_CRED_ERR",
            AcctExpired => "PAM_ACCT_EXPIRED",
            AuthtokExpired => "PAM_AUTHTOK_EXPIRED",
            SessionErr => "PAM_SESSION_ERR",
            AuthtokErr => "PAM_AUTHTOK_ERR",
            AuthtokRecoveryErr => "PAM_AUTHTOK_RECOVER_ERR",
            AuthtokLockBusy => "PAM_AUTHTOK_LOCK_BUSY",
            AuthtokDisableAging => "PAM_AUTHTOK_DISABLE_AGING",
            NoModuleData => "PAM_NO_MODULE_DATA",
            Ignore => "PAM_IGNORE",
            Abort => "PAM_ABORT",
            TryAgain => "PAM_TRY_AGAIN",
            ModuleUnknown => "PAM_MODULE_UNKNOWN",
        }
    }
}

impl fmt::Display for PamResultCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_raw())
    }
}

/// What the decision procedure concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected,
}

impl From<bool> for Verdict {
    fn from(approved: bool) -> Verdict {
        if approved {
            Verdict::Approved
        } else {
            Verdict::Rejected
        }
    }
}

/// Error reported by a decision procedure that could not reach a verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionError(String);

impl DecisionError {
    pub fn new(msg: impl Into<String>) -> DecisionError {
        DecisionError(msg.into())
    }
}

impl fmt::Display for DecisionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for DecisionError {}

impl From<io::Error> for DecisionError {
    fn from(e: io::Error) -> Self {
        DecisionError(e.to_string())
    }
}

impl From<String> for DecisionError {
    fn from(s: String) -> Self {
        DecisionError(s)
    }
}

impl From<&str> for DecisionError {
    fn from(s: &str) -> Self {
        DecisionError(s.to_string())
    }
}

/// Why an authentication attempt did not succeed.
///
/// None of this ever reaches the user: every variant is reported to the
/// PAM stack as the same generic authentication error.
#[derive(Debug)]
pub enum AuthError {
    ContextInvalid,
    IdentityAbsent,
    AccountLookupFailed,
    HardeningUnsupported,
    HardeningFailed(io::Error),
    DecisionDenied,
    DecisionProcedureFault(String),
    Config(ConfigError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::ContextInvalid => write!(f, "no PAM handle"),
            AuthError::IdentityAbsent => write!(f, "PAM handle has no user"),
            AuthError::AccountLookupFailed => write!(f, "no such account"),
            AuthError::HardeningUnsupported => {
                write!(f, "process hardening not supported on this OS")
            },
            AuthError::HardeningFailed(e) => write!(f, "process hardening failed: {}", e),
            AuthError::DecisionDenied => write!(f, "rejected by decision procedure"),
            AuthError::DecisionProcedureFault(e) => write!(f, "decision procedure failed: {}", e),
            AuthError::Config(e) => write!(f, "configuration: {}", e),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::HardeningFailed(e) => Some(e),
            AuthError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(e: ConfigError) -> Self {
        AuthError::Config(e)
    }
}

impl From<DecisionError> for AuthError {
    fn from(e: DecisionError) -> Self {
        AuthError::DecisionProcedureFault(e.0)
    }
}

/// Translate the outcome of an attempt into a PAM result code.
///
/// Only an approved verdict yields `Success`; a rejection and every
/// internal failure collapse to `AuthErr`.
pub fn translate(outcome: &Result<Verdict, AuthError>) -> PamResultCode {
    match outcome {
        Ok(Verdict::Approved) => PamResultCode::Success,
        Ok(Verdict::Rejected) => PamResultCode::AuthErr,
        Err(_) => PamResultCode::AuthErr,
    }
}
