//! Per-unit station configuration, grounded on the teacher's
//! `CoreConfig::load` (`serde`/`toml` with `#[serde(default)]` fields and a
//! `Default` fallback when no file is present). Spec §6: "fudgetime1"
//! (propagation delay, seconds), "fudgetime2" (WWVH selector / line-in
//! flag), and integer port/monitor gain selectors.

use crate::error::{RefclockError, Result};
use serde::Deserialize;
use std::path::Path;

/// Which station type a unit demodulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationKind {
    Chu,
    Wwv,
    Wwvh,
    IrigB,
    IrigE,
}

/// Configuration for one station unit (spec §6 "Configuration inputs").
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub kind: StationKind,

    /// Propagation delay fudge, seconds (generic, or WWV-specific).
    #[serde(default)]
    pub fudgetime1: f64,

    /// WWVH propagation delay fudge, or line-in port flag (station-specific).
    #[serde(default)]
    pub fudgetime2: f64,

    /// Audio input/monitor port selector.
    #[serde(default)]
    pub port: i32,

    /// Monitor gain selector; `None` lets the unit's AGC pick a default.
    #[serde(default)]
    pub monitor_gain: Option<i32>,

    /// SHM unit number, `0..64` (spec §6).
    #[serde(default = "StationConfig::default_unit")]
    pub unit: u32,
}

impl StationConfig {
    fn default_unit() -> u32 {
        0
    }

    /// Load from a TOML file, falling back to defaults for any field (or
    /// the whole struct, if the file is absent) the way `CoreConfig::load`
    /// does. `kind` has no default and so must be selected by the caller
    /// up front if the file is missing.
    pub fn load(path: &Path, default_kind: StationKind) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no station config file found, using defaults");
            return Ok(StationConfig {
                kind: default_kind,
                fudgetime1: 0.0,
                fudgetime2: 0.0,
                port: 0,
                monitor_gain: None,
                unit: Self::default_unit(),
            });
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| RefclockError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| RefclockError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_toml() {
        let cfg: StationConfig = toml::from_str("kind = \"wwv\"\n").unwrap();
        assert_eq!(cfg.kind, StationKind::Wwv);
        assert_eq!(cfg.fudgetime1, 0.0);
        assert_eq!(cfg.unit, 0);
    }

    #[test]
    fn parses_full_toml() {
        let text = r#"
            kind = "chu"
            fudgetime1 = 0.003
            port = 1
            monitor_gain = 50
            unit = 2
        "#;
        let cfg: StationConfig = toml::from_str(text).unwrap();
        assert_eq!(cfg.kind, StationKind::Chu);
        assert_eq!(cfg.fudgetime1, 0.003);
        assert_eq!(cfg.monitor_gain, Some(50));
        assert_eq!(cfg.unit, 2);
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let cfg = StationConfig::load(Path::new("/nonexistent/config.toml"), StationKind::IrigB);
        let cfg = cfg.unwrap();
        assert_eq!(cfg.kind, StationKind::IrigB);
        assert_eq!(cfg.fudgetime1, 0.0);
        assert!(cfg.monitor_gain.is_none());
    }
}
