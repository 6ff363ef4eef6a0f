//
// Logging to syslog(3), facility authpriv, through the `log` facade.
//
use std::panic;
use std::sync::Once;

use log::LevelFilter;
use syslog::Facility;

use crate::config::ModuleConfig;

static PANIC_HOOK: Once = Once::new();

/// Install the syslog logger, if nothing in this process has installed a
/// logger yet, and set the log level from the configuration.
///
/// The first call in a process wins: a later `ident` is not picked up.
pub fn init(config: &ModuleConfig) {
    let level = if config.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    // Fails when the module was already called once in this process, or
    // when there is no syslog daemon to talk to. Either way there is
    // nobody to tell.
    let _ = syslog::init(Facility::LOG_AUTHPRIV, level, Some(config.ident.as_str()));
    log::set_max_level(level);
}

/// Send panic messages to the log instead of stderr, which may well be
/// the terminal of the user being authenticated.
///
/// The hook belongs to the std of this shared object, so it only sees
/// panics in our own code, never the host's.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            error!("{}", info);
            if cfg!(test) {
                previous(info);
            }
        }));
    });
}
