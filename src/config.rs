//
// Module configuration.
//
// Settings come from the module arguments on the PAM stack line, e.g.
//
//   auth required pam_sshca.so hardening=optional debug config=/etc/pam_sshca.toml
//
// An optional TOML file named by `config=` is read first; arguments on the
// stack line override it.
//
// Logging is set up once per process, by the first call into the module.
// `ident` and `debug` on a later stack line in the same process do not
// change the syslog identifier.
//
use std::error::Error;
use std::ffi::CStr;
use std::path::Path;
use std::str::FromStr;
use std::{fmt, fs, io};

use serde::{Deserialize, Deserializer};

pub const DEFAULT_IDENT: &str = "pam_sshca";

/// What to do when the process cannot be hardened.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HardeningPolicy {
    /// Deny authentication (fail-closed).
    Required,
    /// Log a warning and carry on.
    Optional,
}

impl Default for HardeningPolicy {
    fn default() -> Self {
        HardeningPolicy::Required
    }
}

impl FromStr for HardeningPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "required" => Ok(HardeningPolicy::Required),
            "optional" => Ok(HardeningPolicy::Optional),
            other => Err(ConfigError::BadArgument(format!("hardening={}", other))),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModuleConfig {
    pub hardening:   HardeningPolicy,
    #[serde(rename = "switch-euid", deserialize_with = "deserialize_bool")]
    pub switch_euid: bool,
    #[serde(deserialize_with = "deserialize_bool")]
    pub debug:       bool,
    pub ident:       String,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        ModuleConfig {
            hardening:   HardeningPolicy::Required,
            switch_euid: true,
            debug:       false,
            ident:       DEFAULT_IDENT.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String, io::Error),
    Parse(String),
    BadArgument(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "{}: {}", path, e),
            ConfigError::Parse(e) => write!(f, "{}", e),
            ConfigError::BadArgument(arg) => write!(f, "bad module argument: {}", arg),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Boolean values in the spellings people tend to write in config files.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" | "y" | "Y" | "yes" | "Yes" | "YES" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" | "n" | "N" | "no" | "No" | "NO" => Some(false),
        _ => None,
    }
}

// Accept both a TOML boolean and one of the strings parse_bool knows.
fn deserialize_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where D: Deserializer<'de> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }
    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => {
            parse_bool(&s).ok_or_else(|| serde::de::Error::custom(format!("not a boolean: {}", s)))
        },
    }
}

// Read the TOML config into a ModuleConfig.
pub fn read(toml_file: impl AsRef<Path>) -> Result<ModuleConfig, ConfigError> {
    let path = toml_file.as_ref();
    let buffer = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.display().to_string(), e))?;
    toml::from_str(&buffer).map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
}

impl ModuleConfig {
    /// Build the configuration from the module arguments.
    pub fn from_args(args: &[&CStr]) -> Result<ModuleConfig, ConfigError> {
        let mut opts = Vec::with_capacity(args.len());
        for arg in args {
            let arg = arg
                .to_str()
                .map_err(|_| ConfigError::BadArgument(arg.to_string_lossy().into_owned()))?;
            let mut kv = arg.splitn(2, '=');
            let key = kv.next().unwrap_or("");
            opts.push((key, kv.next()));
        }

        let mut config = match opts.iter().find(|(k, _)| *k == "config") {
            Some((_, Some(path))) => read(path)?,
            Some((_, None)) => return Err(ConfigError::BadArgument("config".to_string())),
            None => ModuleConfig::default(),
        };
        for (key, value) in opts {
            config.apply(key, value)?;
        }
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        let bad = || ConfigError::BadArgument(format!("{}={}", key, value.unwrap_or("")));
        match (key, value) {
            ("config", _) => {},
            ("hardening", Some(v)) => self.hardening = v.parse()?,
            ("switch_euid", Some(v)) | ("switch-euid", Some(v)) => {
                self.switch_euid = parse_bool(v).ok_or_else(bad)?
            },
            ("debug", None) => self.debug = true,
            ("debug", Some(v)) => self.debug = parse_bool(v).ok_or_else(bad)?,
            ("ident", Some(v)) if !v.is_empty() => self.ident = v.to_string(),
            ("hardening", None) | ("switch_euid", None) | ("switch-euid", None) | ("ident", _) => {
                return Err(bad());
            },
            _ => warn!("ignoring unknown module argument {}", key),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn args(v: &[&str]) -> Vec<CString> {
        v.iter().map(|s| CString::new(*s).unwrap()).collect()
    }

    fn config_from(v: &[&str]) -> Result<ModuleConfig, ConfigError> {
        let owned = args(v);
        let refs: Vec<&CStr> = owned.iter().map(|s| s.as_c_str()).collect();
        ModuleConfig::from_args(&refs)
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, ModuleConfig::default());
        assert_eq!(config.hardening, HardeningPolicy::Required);
        assert!(config.switch_euid);
        assert!(!config.debug);
        assert_eq!(config.ident, "pam_sshca");
    }

    #[test]
    fn test_args() {
        let config = config_from(&["hardening=optional", "switch_euid=no", "debug", "ident=sudo_sshca"]).unwrap();
        assert_eq!(config.hardening, HardeningPolicy::Optional);
        assert!(!config.switch_euid);
        assert!(config.debug);
        assert_eq!(config.ident, "sudo_sshca");
    }

    #[test]
    fn test_bad_args() {
        assert!(config_from(&["hardening=maybe"]).is_err());
        assert!(config_from(&["hardening"]).is_err());
        assert!(config_from(&["switch_euid=perhaps"]).is_err());
        assert!(config_from(&["config"]).is_err());
        assert!(config_from(&["ident="]).is_err());
        // unknown arguments are only logged.
        assert!(config_from(&["use_first_pass"]).is_ok());
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("Yes"), Some(true));
        assert_eq!(parse_bool("t"), Some(true));
        assert_eq!(parse_bool("NO"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("nope"), None);
    }

    #[test]
    fn test_config_file() {
        let path = std::env::temp_dir().join(format!("pam_sshca-test-{}.toml", std::process::id()));
        fs::write(&path, "hardening = \"optional\"\nswitch-euid = \"no\"\ndebug = true\n").unwrap();

        let cfg_arg = format!("config={}", path.display());
        let config = config_from(&[cfg_arg.as_str()]).unwrap();
        assert_eq!(config.hardening, HardeningPolicy::Optional);
        assert!(!config.switch_euid);
        assert!(config.debug);
        assert_eq!(config.ident, DEFAULT_IDENT);

        // arguments win over the file.
        let config = config_from(&[cfg_arg.as_str(), "hardening=required", "debug=no"]).unwrap();
        assert_eq!(config.hardening, HardeningPolicy::Required);
        assert!(!config.debug);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_config_file_errors() {
        assert!(matches!(
            config_from(&["config=/nonexistent/pam_sshca.toml"]),
            Err(ConfigError::Io(..))
        ));

        let path = std::env::temp_dir().join(format!("pam_sshca-bad-{}.toml", std::process::id()));
        fs::write(&path, "hardening = \"sometimes\"\n").unwrap();
        let cfg_arg = format!("config={}", path.display());
        assert!(matches!(config_from(&[cfg_arg.as_str()]), Err(ConfigError::Parse(_))));
        fs::remove_file(&path).unwrap();
    }
}
