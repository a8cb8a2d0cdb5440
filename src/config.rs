//! Runtime configuration read from `LENDGATE_*` environment variables.
//! Unset or unparseable values fall back to defaults with a warning.

use std::env;
use std::str::FromStr;

use chrono::Duration;
use tracing::warn;

/// Kiosk unlock duration policy applied at the handler boundary.
/// The session state machine itself accepts any positive duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockPolicy {
    pub default_minutes: i64,
    pub max_minutes: i64,
}

impl Default for UnlockPolicy {
    fn default() -> Self { Self { default_minutes: 5, max_minutes: 30 } }
}

impl UnlockPolicy {
    /// Missing or non-positive requests get the default; anything above the cap is clamped.
    /// Minute counts chrono cannot represent saturate at `Duration::MAX`.
    pub fn clamp(&self, requested_minutes: Option<i64>) -> Duration {
        let max = self.max_minutes.max(1);
        let minutes = match requested_minutes {
            Some(m) if m > 0 => m,
            _ => self.default_minutes,
        };
        Duration::try_minutes(minutes.clamp(1, max)).unwrap_or(Duration::MAX)
    }
}

/// Seed account created at startup so a fresh instance is reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAccount {
    pub email: String,
    pub password: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub unlock: UnlockPolicy,
    pub events_enabled: bool,
    pub event_capacity: usize,
    pub token_ttl_hours: i64,
    pub bootstrap: Option<BootstrapAccount>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 7878,
            unlock: UnlockPolicy::default(),
            events_enabled: true,
            event_capacity: 256,
            token_ttl_hours: 168,
            bootstrap: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self { Self::from_lookup(|key| env::var(key).ok()) }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Config::default();
        let unlock = UnlockPolicy {
            default_minutes: parse_num(&lookup, "LENDGATE_UNLOCK_DEFAULT_MINUTES").unwrap_or(d.unlock.default_minutes),
            max_minutes: parse_num(&lookup, "LENDGATE_UNLOCK_MAX_MINUTES").unwrap_or(d.unlock.max_minutes),
        };
        let bootstrap = match (
            lookup("LENDGATE_BOOTSTRAP_EMAIL"),
            lookup("LENDGATE_BOOTSTRAP_PASSWORD"),
            lookup("LENDGATE_BOOTSTRAP_TOKEN"),
        ) {
            (Some(email), Some(password), Some(token)) if !email.is_empty() && !token.is_empty() => {
                Some(BootstrapAccount { email, password, token })
            }
            (None, None, None) => None,
            _ => {
                warn!(target: "lendgate::startup", "bootstrap account needs EMAIL, PASSWORD and TOKEN; skipping");
                None
            }
        };
        Config {
            host: lookup("LENDGATE_HTTP_HOST").filter(|h| !h.is_empty()).unwrap_or(d.host),
            http_port: parse_num(&lookup, "LENDGATE_HTTP_PORT").unwrap_or(d.http_port),
            unlock,
            events_enabled: parse_bool(&lookup, "LENDGATE_EVENTS").unwrap_or(d.events_enabled),
            event_capacity: parse_num(&lookup, "LENDGATE_EVENT_CAPACITY").unwrap_or(d.event_capacity),
            token_ttl_hours: parse_num(&lookup, "LENDGATE_TOKEN_TTL_HOURS").unwrap_or(d.token_ttl_hours),
            bootstrap,
        }
    }

    pub fn bind_addr(&self) -> String { format!("{}:{}", self.host, self.http_port) }
}

fn parse_bool<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<bool> {
    let v = lookup(name)?;
    match v.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(target: "lendgate::startup", "ignoring {}='{}': expected a boolean", name, v);
            None
        }
    }
}

fn parse_num<T: FromStr, F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<T> {
    let v = lookup(name)?;
    match v.trim().parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!(target: "lendgate::startup", "ignoring {}='{}': expected a number", name, v);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> Config {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|k| m.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = cfg(&[]);
        assert_eq!(c, Config::default());
        assert_eq!(c.bind_addr(), "0.0.0.0:7878");
    }

    #[test]
    fn env_overrides_and_bad_values() {
        let c = cfg(&[
            ("LENDGATE_HTTP_PORT", "9000"),
            ("LENDGATE_EVENTS", "off"),
            ("LENDGATE_UNLOCK_MAX_MINUTES", "lots"),
            ("LENDGATE_UNLOCK_DEFAULT_MINUTES", "10"),
        ]);
        assert_eq!(c.http_port, 9000);
        assert!(!c.events_enabled);
        assert_eq!(c.unlock, UnlockPolicy { default_minutes: 10, max_minutes: 30 });
    }

    #[test]
    fn bootstrap_requires_all_three_values() {
        assert!(cfg(&[("LENDGATE_BOOTSTRAP_EMAIL", "a@b.c")]).bootstrap.is_none());
        let c = cfg(&[
            ("LENDGATE_BOOTSTRAP_EMAIL", "a@b.c"),
            ("LENDGATE_BOOTSTRAP_PASSWORD", "pw"),
            ("LENDGATE_BOOTSTRAP_TOKEN", "tok"),
        ]);
        assert_eq!(c.bootstrap.map(|b| b.token), Some("tok".to_string()));
    }

    #[test]
    fn unlock_clamp() {
        let p = UnlockPolicy::default();
        assert_eq!(p.clamp(None), Duration::minutes(5));
        assert_eq!(p.clamp(Some(0)), Duration::minutes(5));
        assert_eq!(p.clamp(Some(-3)), Duration::minutes(5));
        assert_eq!(p.clamp(Some(12)), Duration::minutes(12));
        assert_eq!(p.clamp(Some(600)), Duration::minutes(30));
    }

    #[test]
    fn unlock_clamp_saturates_huge_ceilings() {
        let p = UnlockPolicy { default_minutes: 5, max_minutes: i64::MAX };
        assert_eq!(p.clamp(Some(i64::MAX)), Duration::MAX);
        assert_eq!(p.clamp(Some(90)), Duration::minutes(90));
        let c = cfg(&[("LENDGATE_UNLOCK_MAX_MINUTES", "9223372036854775807")]);
        assert_eq!(c.unlock.clamp(Some(i64::MAX)), Duration::MAX);
    }
}
