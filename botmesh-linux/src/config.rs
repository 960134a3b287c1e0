//! Load config from file and environment.

use botmesh_core::RadioConfig;
use serde::Deserialize;
use std::path::PathBuf;

/// Daemon configuration. File: ~/.config/botmesh/config.toml or /etc/botmesh/config.toml.
/// Env overrides: BOTMESH_CHANNEL, BOTMESH_GROUP, BOTMESH_POWER, BOTMESH_CLASS_ID,
/// BOTMESH_PORT, BOTMESH_SERIAL, BOTMESH_NEGOTIATE.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Initial channel, group and transmit power.
    #[serde(default)]
    pub radio: RadioConfig,
    /// Role announced in beacons (default "node").
    #[serde(default = "default_class_id")]
    pub class_id: String,
    /// Negotiate a free pairing at startup instead of staying on `radio`.
    #[serde(default)]
    pub negotiate: bool,
    /// UDP port of the simulated radio medium (default 45680).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Device serial number; random when unset.
    #[serde(default)]
    pub serial: Option<u32>,
    /// Event loop tick in milliseconds (default 100).
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// When set, a status message carrying this text is sent whenever the node state changes.
    #[serde(default)]
    pub status_message: Option<String>,
}

fn default_class_id() -> String {
    "node".to_string()
}
fn default_port() -> u16 {
    45680
}
fn default_tick_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            radio: RadioConfig::default(),
            class_id: default_class_id(),
            negotiate: false,
            port: default_port(),
            serial: None,
            tick_ms: default_tick_ms(),
            status_message: None,
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    apply_env(&mut c, |k| std::env::var(k).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("BOTMESH_CHANNEL").and_then(|s| s.parse().ok()) {
        c.radio.channel = v;
    }
    if let Some(v) = var("BOTMESH_GROUP").and_then(|s| s.parse().ok()) {
        c.radio.group = v;
    }
    if let Some(v) = var("BOTMESH_POWER").and_then(|s| s.parse().ok()) {
        c.radio.power = v;
    }
    if let Some(s) = var("BOTMESH_CLASS_ID") {
        c.class_id = s;
    }
    if let Some(v) = var("BOTMESH_PORT").and_then(|s| s.parse().ok()) {
        c.port = v;
    }
    if let Some(s) = var("BOTMESH_SERIAL") {
        let parsed = match s.strip_prefix("0x") {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        };
        if parsed.is_some() {
            c.serial = parsed;
        }
    }
    if let Some(v) = var("BOTMESH_NEGOTIATE").and_then(|s| s.parse().ok()) {
        c.negotiate = v;
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/botmesh/config.toml"));
    }
    out.push(PathBuf::from("/etc/botmesh/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    for p in config_paths() {
        if p.exists() {
            match std::fs::read_to_string(&p) {
                Ok(s) => match toml::from_str::<Config>(&s) {
                    Ok(c) => {
                        log::debug!("loaded config from {}", p.display());
                        return Some(c);
                    }
                    Err(e) => log::warn!("ignoring {}: {}", p.display(), e),
                },
                Err(e) => log::warn!("cannot read {}: {}", p.display(), e),
            }
            break;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_full_file() {
        let c: Config = toml::from_str(
            r#"
            class_id = "cutebot"
            negotiate = true
            port = 5000
            serial = 42
            status_message = "Hello"

            [radio]
            channel = 12
            group = 34
            "#,
        )
        .unwrap();
        assert_eq!(c.class_id, "cutebot");
        assert!(c.negotiate);
        assert_eq!(c.port, 5000);
        assert_eq!(c.serial, Some(42));
        assert_eq!(c.radio.channel, 12);
        assert_eq!(c.radio.group, 34);
        assert_eq!(c.radio.power, 7);
        assert_eq!(c.tick_ms, 100);
        assert_eq!(c.status_message.as_deref(), Some("Hello"));
    }

    #[test]
    fn empty_file_gives_defaults() {
        let c: Config = toml::from_str("").unwrap();
        assert_eq!(c.class_id, "node");
        assert_eq!(c.radio, RadioConfig::default());
        assert!(!c.negotiate);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("colour = 3").is_err());
        assert!(toml::from_str::<Config>("[radio]\nfreq = 3").is_err());
    }

    #[test]
    fn env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BOTMESH_CHANNEL", "50"),
            ("BOTMESH_GROUP", "not-a-number"),
            ("BOTMESH_CLASS_ID", "joystick"),
            ("BOTMESH_SERIAL", "0xBEEF"),
            ("BOTMESH_NEGOTIATE", "true"),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        apply_env(&mut c, |k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.radio.channel, 50);
        assert_eq!(c.radio.group, 1);
        assert_eq!(c.class_id, "joystick");
        assert_eq!(c.serial, Some(0xBEEF));
        assert!(c.negotiate);
    }
}
