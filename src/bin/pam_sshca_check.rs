//
// Check the host side of pam_sshca on this machine: can the account be
// resolved, and can the process be hardened.
//
#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use std::ffi::CString;
use std::io::{self, Write};
use std::process::exit;

use pam_sshca::harden::{self, HardenError};
use pam_sshca::{cmdline, AccountDatabase, SystemAccounts};

fn prompt(s: &str) -> io::Result<String> {
    print!("{}", s);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn check_harden() -> bool {
    for attempt in 1..=2 {
        match harden::harden_process() {
            Ok(()) => println!("harden #{}: ok", attempt),
            Err(HardenError::Unsupported) => {
                println!("harden #{}: not supported on this OS", attempt);
                return false;
            },
            Err(e) => {
                println!("harden #{}: {}", attempt, e);
                return false;
            },
        }
    }
    true
}

fn main() {
    env_logger::init();

    let matches = clap_app!(pam_sshca_check =>
        (version: crate_version!())
        (about: "Check account lookup and process hardening as pam_sshca does them")
        (@arg USER: -u --user +takes_value "account to look up (prompts if not given)")
        (@arg HARDEN: --harden "also deny debugger attachment to this process")
    )
    .get_matches();

    let name = match matches.value_of("USER") {
        Some(user) => user.to_string(),
        None => match prompt("What's your login? ") {
            Ok(name) => name,
            Err(e) => {
                eprintln!("pam_sshca_check: {}", e);
                exit(1);
            },
        },
    };
    let cname = match CString::new(name.as_str()) {
        Ok(cname) => cname,
        Err(_) => {
            eprintln!("pam_sshca_check: {:?}: embedded 0 byte in name", name);
            exit(1);
        },
    };

    let mut ok = true;
    match SystemAccounts.lookup_by_name(&cname) {
        Some(acct) => println!("{}: uid {}, home {}", acct.name(), acct.uid(), acct.home().display()),
        None => {
            println!("{}: no such account", name);
            ok = false;
        },
    }

    if matches.is_present("HARDEN") {
        debug!("probing process hardening");
        ok &= check_harden();
    }

    println!("command: {}", cmdline::current());
    exit(if ok { 0 } else { 1 });
}
