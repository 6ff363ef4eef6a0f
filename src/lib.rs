//! PAM boundary layer for SSH-certificate based authentication.
//!
//! This crate is the part of a PAM module that talks to the PAM stack and
//! the host: it finds out who is authenticating and which local account
//! that is, keeps debuggers away from the process, runs an external
//! decision procedure, and turns its verdict into a PAM result code.
//!
//! Whether a presented certificate or key is acceptable is decided by the
//! `DecisionProcedure` you plug in:
//! ```ignore
//! #[derive(Default)]
//! struct CertCheck;
//!
//! impl DecisionProcedure for CertCheck {
//!     fn decide(&self, req: &AuthRequest<'_>) -> Result<Verdict, DecisionError> {
//!         let account = req.account().ok_or("no account")?;
//!         let keys = account.expand_path(".ssh/authorized_keys");
//!         // ... challenge the user's ssh-agent ...
//!         Ok(Verdict::Rejected)
//!     }
//! }
//!
//! pam_sshca_module!(CertCheck);
//! ```
//!
//! Module arguments on the PAM stack line are described in `config`.
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

#[macro_use]
mod macros;

pub mod account;
pub mod cmdline;
pub mod config;
pub mod context;
pub mod euid;
pub mod harden;
mod logger;
pub mod module;
pub mod result;

pub use crate::account::{resolve_account, resolve_username, Account, AccountDatabase, SystemAccounts};
pub use crate::config::{HardeningPolicy, ModuleConfig};
pub use crate::context::{AuthContext, PamHandle};
pub use crate::harden::{harden_process, HardenError, Hardener, ProcessHardener};
pub use crate::module::{authenticate, update_credentials, AuthRequest, DecisionProcedure, Host};
pub use crate::result::{translate, AuthError, DecisionError, PamResultCode, Verdict};
