//
// No hardening primitive on this OS.
//
use super::HardenError;

pub(crate) const SUPPORTED: bool = false;

pub(crate) fn deny_attach() -> Result<(), HardenError> {
    Err(HardenError::Unsupported)
}
