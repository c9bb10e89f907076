//! Environment-variable configuration (spec §6 "Configuration (environment)").
//!
//! Mirrors the way the teacher's `rust-udcn-quic::config` module layers
//! `ServerOptions`/`ClientOptions` over `Default` impls, but sources values
//! from the process environment via the `config` crate instead of from CLI
//! flags, since spec.md names these as environment variables specifically.

use ccnd_common::Error;
use config::{Config, Environment};
use serde::{Deserialize, Serialize};

const DEFAULT_LOCAL_PORT: u16 = 9695;
const DEFAULT_MTU_CLAMP: u32 = 8800;
const DEFAULT_DATA_PAUSE_CLAMP_USEC: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CcndConfig {
    /// `CCND_DEBUG`: integer bitmask of log categories.
    pub ccnd_debug: u32,
    /// `CCND_CAP`: content-store capacity in entries; 0 forces
    /// zero-freshness-everywhere mode.
    pub ccnd_cap: u32,
    /// `CCND_MTU`: target stuffing MTU, 0 disables, clipped to 8800.
    pub ccnd_mtu: u32,
    /// `CCND_DATA_PAUSE_MICROSEC`: multicast/link delay base, clipped to 1_000_000.
    pub ccnd_data_pause_microsec: u64,
    /// `CCND_LISTEN_ON`: comma/semicolon-separated address list, empty or
    /// `*` means wildcards.
    pub ccnd_listen_on: String,
    /// `CCND_AUTOREG`: nul-separated URI list to auto-register to each new
    /// non-GG face.
    pub ccnd_autoreg: String,
    /// `CCN_LOCAL_PORT`: listen port, default 9695.
    pub ccn_local_port: u16,
    /// Supplemental: optional startup FIB seed file (`prefix face-id flags
    /// lifetime` per line), not part of spec.md's environment list but
    /// present in the original `ccnd.c`'s config-file bootstrap.
    pub fib_file: Option<String>,
}

impl Default for CcndConfig {
    fn default() -> Self {
        Self {
            ccnd_debug: 0,
            ccnd_cap: 4096,
            ccnd_mtu: 0,
            ccnd_data_pause_microsec: 10_000,
            ccnd_listen_on: String::new(),
            ccnd_autoreg: String::new(),
            ccn_local_port: DEFAULT_LOCAL_PORT,
            fib_file: None,
        }
    }
}

impl CcndConfig {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset. An optional TOML file (supplied via
    /// `--config-file`, not in spec.md) may be layered in first so that
    /// environment variables remain authoritative, per spec.md §6.
    pub fn load(config_file: Option<&str>) -> Result<Self, Error> {
        let mut builder = Config::builder().add_source(config::Config::try_from(&CcndConfig::default())
            .map_err(|e| Error::Config(e.to_string()))?);
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(Environment::default().try_parsing(true));
        let cfg = builder.build().map_err(|e| Error::Config(e.to_string()))?;
        let mut parsed: CcndConfig = cfg.try_deserialize().map_err(|e| Error::Config(e.to_string()))?;
        parsed.ccnd_mtu = parsed.ccnd_mtu.min(DEFAULT_MTU_CLAMP);
        parsed.ccnd_data_pause_microsec = parsed.ccnd_data_pause_microsec.min(DEFAULT_DATA_PAUSE_CLAMP_USEC);
        Ok(parsed)
    }

    /// Parsed `CCND_LISTEN_ON`: `None` means "bind wildcards".
    pub fn listen_addresses(&self) -> Option<Vec<String>> {
        let trimmed = self.ccnd_listen_on.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return None;
        }
        Some(
            trimmed
                .split(|c| c == ',' || c == ';')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Parsed `CCND_AUTOREG` URI list.
    pub fn autoreg_uris(&self) -> Vec<String> {
        self.ccnd_autoreg.split('\0').map(|s| s.to_string()).filter(|s| !s.is_empty()).collect()
    }

    pub fn zero_freshness_mode(&self) -> bool {
        self.ccnd_cap == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = CcndConfig::default();
        assert_eq!(cfg.ccn_local_port, 9695);
        assert_eq!(cfg.ccnd_mtu, 0);
        assert!(cfg.listen_addresses().is_none());
    }

    #[test]
    fn listen_on_parses_separators() {
        let mut cfg = CcndConfig::default();
        cfg.ccnd_listen_on = "10.0.0.1; 10.0.0.2,10.0.0.3".to_string();
        assert_eq!(
            cfg.listen_addresses().unwrap(),
            vec!["10.0.0.1", "10.0.0.2", "10.0.0.3"]
        );
    }

    #[test]
    fn autoreg_splits_on_nul() {
        let mut cfg = CcndConfig::default();
        cfg.ccnd_autoreg = "ccnx:/a\0ccnx:/b".to_string();
        assert_eq!(cfg.autoreg_uris(), vec!["ccnx:/a", "ccnx:/b"]);
    }
}
