//! Relay configuration.
//!
//! Settings come from three layers: built-in defaults, an optional TOML
//! file, and command-line flags (applied by the binary on top of
//! [`RelayConfig`]).
//!
//! ```toml
//! device = "/dev/input/event16"
//! uinput = "/dev/uinput"
//! recovery = "enabled"
//! filter_code = 0x13c
//! grab = false
//! name = "Xpad Relay (evrelay)"
//! identity = "f055:11fc"
//! ```

use crate::descriptor::{DEFAULT_IDENTITY, DEFAULT_NAME};
use crate::error::{Error, Result};
use crate::relay::RecoveryPolicy;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default uinput control node.
pub const DEFAULT_UINPUT_PATH: &str = "/dev/uinput";

/// Default USB id searched for by discovery: the Steam Controller's
/// virtual gamepad (28de:11fc).
pub const DEFAULT_SOURCE_ID: UsbId = UsbId::new(0x28de, 0x11fc);

/// USB vendor/product pair, written `vvvv:pppp` in hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    pub const fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

impl FromStr for UsbId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (vendor, product) = s
            .split_once(':')
            .ok_or_else(|| format!("expected VVVV:PPPP, got {s:?}"))?;
        let hex = |part: &str| {
            u16::from_str_radix(part.trim_start_matches("0x"), 16)
                .map_err(|e| format!("invalid USB id {s:?}: {e}"))
        };
        Ok(Self::new(hex(vendor)?, hex(product)?))
    }
}

impl TryFrom<String> for UsbId {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

/// Parse a code given in decimal or `0x`-prefixed hex.
pub fn parse_code(s: &str) -> std::result::Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid code {s:?}: {e}"))
}

/// Everything the process shell needs to set up a relay.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Source event device. Takes precedence over discovery.
    pub device: Option<PathBuf>,

    /// Discover the source by USB id instead of a path.
    pub scan: Option<UsbId>,

    /// uinput control node. When unset, an inherited descriptor 4 or
    /// [`DEFAULT_UINPUT_PATH`] is used.
    pub uinput: Option<PathBuf>,

    /// What to do when the source disappears.
    pub recovery: RecoveryPolicy,

    /// Button code to drop instead of relaying.
    pub filter_code: Option<u16>,

    /// Take exclusive access to the source (`EVIOCGRAB`).
    pub grab: bool,

    /// Halt when standard input reaches end-of-file. When unset, standard
    /// input is watched only if the source is an inherited descriptor.
    pub watch_stdin: Option<bool>,

    /// Name presented by the virtual device.
    pub name: String,

    /// Vendor/product presented by the virtual device.
    pub identity: UsbId,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            device: None,
            scan: None,
            uinput: None,
            recovery: RecoveryPolicy::default(),
            filter_code: None,
            grab: false,
            watch_stdin: None,
            name: DEFAULT_NAME.to_string(),
            identity: DEFAULT_IDENTITY,
        }
    }
}

impl RelayConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Whether the relay should halt once standard input is closed.
    ///
    /// A parent that hands over descriptor 3 stops the relay by closing
    /// its stdin, so that mode watches it unless told otherwise.
    pub fn watches_stdin(&self, source_inherited: bool) -> bool {
        self.watch_stdin.unwrap_or(source_inherited)
    }

    /// Load a configuration file. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("configuration loaded from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usb_id_parse() {
        assert_eq!("28de:11fc".parse::<UsbId>(), Ok(UsbId::new(0x28de, 0x11fc)));
        assert_eq!("0xF055:0x11FC".parse::<UsbId>(), Ok(UsbId::new(0xf055, 0x11fc)));
        assert!("28de".parse::<UsbId>().is_err());
        assert!("zzzz:11fc".parse::<UsbId>().is_err());
        assert!("28de:123456".parse::<UsbId>().is_err());
    }

    #[test]
    fn test_usb_id_display() {
        assert_eq!(UsbId::new(0x45e, 0x28e).to_string(), "045e:028e");
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code("316"), Ok(0x13c));
        assert_eq!(parse_code("0x13c"), Ok(0x13c));
        assert_eq!(parse_code("0X13C"), Ok(0x13c));
        assert!(parse_code("BTN_MODE").is_err());
        assert!(parse_code("70000").is_err());
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_toml("").unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.recovery, RecoveryPolicy::Enabled);
        assert_eq!(config.identity, DEFAULT_IDENTITY);
        assert_eq!(config.name, DEFAULT_NAME);
    }

    #[test]
    fn test_full_file() {
        let config = RelayConfig::from_toml(
            r#"
            device = "/dev/input/event16"
            uinput = "/dev/uinput"
            recovery = "disabled"
            filter_code = 0x13c
            grab = true
            watch_stdin = true
            name = "Relay"
            identity = "1234:abcd"
            "#,
        )
        .unwrap();

        assert_eq!(config.device.as_deref(), Some(Path::new("/dev/input/event16")));
        assert_eq!(config.uinput.as_deref(), Some(Path::new("/dev/uinput")));
        assert_eq!(config.recovery, RecoveryPolicy::Disabled);
        assert_eq!(config.filter_code, Some(0x13c));
        assert!(config.grab);
        assert_eq!(config.watch_stdin, Some(true));
        assert_eq!(config.name, "Relay");
        assert_eq!(config.identity, UsbId::new(0x1234, 0xabcd));
    }

    #[test]
    fn test_stdin_watch_follows_source_origin() {
        let config = RelayConfig::default();
        assert!(config.watches_stdin(true));
        assert!(!config.watches_stdin(false));

        let config = RelayConfig::from_toml("watch_stdin = false").unwrap();
        assert!(!config.watches_stdin(true));
    }

    #[test]
    fn test_scan_entry() {
        let config = RelayConfig::from_toml(r#"scan = "28de:11fc""#).unwrap();
        assert_eq!(config.scan, Some(DEFAULT_SOURCE_ID));
    }

    #[test]
    fn test_bad_identity_rejected() {
        assert!(RelayConfig::from_toml(r#"identity = "nope""#).is_err());
        assert!(RelayConfig::from_toml(r#"recovery = "sometimes""#).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = RelayConfig::load(Path::new("/nonexistent/evrelay.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("evrelay-config-{}.toml", std::process::id()));
        std::fs::write(&path, "grab = true\n").unwrap();
        let config = RelayConfig::load(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(config.unwrap().grab);
    }
}
