//! Server configuration.
use std::{borrow::Cow, fmt, str::FromStr, time::Duration};

/// Operating mode, constant for the process lifetime.
///
/// | mode          | handle | forward | diff | response |
/// |---------------|--------|---------|------|----------|
/// | `normal`      | yes    | no      | no   | local    |
/// | `proxy`       | no     | yes     | no   | proxy    |
/// | `diff-normal` | yes    | yes     | yes  | local    |
/// | `diff-proxy`  | yes    | yes     | yes  | proxy    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Proxy,
    DiffNormal,
    DiffProxy,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Normal, Mode::Proxy, Mode::DiffNormal, Mode::DiffProxy];

    pub const fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Proxy => "proxy",
            Mode::DiffNormal => "diff-normal",
            Mode::DiffProxy => "diff-proxy",
        }
    }

    /// Requests are handled by the local handler.
    pub const fn handles(self) -> bool {
        !matches!(self, Mode::Proxy)
    }

    /// Requests are forwarded to the proxy.
    pub const fn forwards(self) -> bool {
        !matches!(self, Mode::Normal)
    }

    /// Local and proxy responses are compared.
    pub const fn diffs(self) -> bool {
        matches!(self, Mode::DiffNormal | Mode::DiffProxy)
    }

    /// The proxy response is sent to the client.
    pub const fn sends_proxy(self) -> bool {
        matches!(self, Mode::Proxy | Mode::DiffProxy)
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ConfigError::new(format!("unknown mode {s:?}, expected one of normal, proxy, diff-normal, diff-proxy")))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener and session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub listen_addr: String,
    pub mode: Mode,
    /// Proxy backend, used when the mode forwards.
    pub proxy_addr: String,
    pub tls: bool,
    pub tls_cert: String,
    pub tls_key: String,
    /// Per connection cap, on top of the shutdown grace delay.
    pub test_conn_timeout: Option<Duration>,
    /// Metrics exporter address.
    pub debug_addr: String,
    pub max_backend_conn: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:27017".into(),
            mode: Mode::Normal,
            proxy_addr: "127.0.0.1:37017".into(),
            tls: false,
            tls_cert: "cert.pem".into(),
            tls_key: "key.pem".into(),
            test_conn_timeout: None,
            debug_addr: "127.0.0.1:8088".into(),
            max_backend_conn: 10,
        }
    }
}

impl Config {
    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `DOCWIRE_LISTEN_ADDR`
    /// - `DOCWIRE_MODE`
    /// - `DOCWIRE_PROXY_ADDR`
    /// - `DOCWIRE_TLS`, `DOCWIRE_TLS_CERT`, `DOCWIRE_TLS_KEY`
    /// - `DOCWIRE_TEST_CONN_TIMEOUT`, in milliseconds
    /// - `DOCWIRE_DEBUG_ADDR`
    /// - `DOCWIRE_MAX_BACKEND_CONN`
    ///
    /// Missing variables fallback to [`Config::default`].
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Retrieve configuration from a variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        macro_rules! env {
            ($name:literal, $field:ident) => {
                if let Some(value) = lookup($name) {
                    config.$field = value;
                }
            };
            ($name:literal, $field:ident, $parse:expr) => {
                if let Some(value) = lookup($name) {
                    config.$field = $parse(value.as_str()).ok_or_else(|| ConfigError::invalid($name, &value))?;
                }
            };
        }

        env!("DOCWIRE_LISTEN_ADDR", listen_addr);
        env!("DOCWIRE_PROXY_ADDR", proxy_addr);
        env!("DOCWIRE_TLS_CERT", tls_cert);
        env!("DOCWIRE_TLS_KEY", tls_key);
        env!("DOCWIRE_DEBUG_ADDR", debug_addr);
        env!("DOCWIRE_TLS", tls, parse_bool);
        env!("DOCWIRE_MAX_BACKEND_CONN", max_backend_conn, |v: &str| v.parse().ok());
        env!("DOCWIRE_TEST_CONN_TIMEOUT", test_conn_timeout, |v: &str| {
            v.parse().ok().map(|ms| (ms != 0).then(|| Duration::from_millis(ms)))
        });

        if let Some(mode) = lookup("DOCWIRE_MODE") {
            config.mode = mode.parse()?;
        }

        Ok(config)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// An error when reading configuration.
#[derive(thiserror::Error)]
#[error("{reason}")]
pub struct ConfigError {
    reason: Cow<'static, str>,
}

impl ConfigError {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> ConfigError {
        Self { reason: reason.into() }
    }

    /// Variable `name` has an unparsable `value`.
    pub fn invalid(name: &str, value: &str) -> ConfigError {
        Self::new(format!("invalid value {value:?} for {name}"))
    }
}

impl fmt::Debug for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.listen_addr, "127.0.0.1:27017");
        assert_eq!(config.mode, Mode::Normal);
    }

    #[test]
    fn overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DOCWIRE_MODE", "diff-proxy"),
            ("DOCWIRE_TLS", "true"),
            ("DOCWIRE_TEST_CONN_TIMEOUT", "250"),
            ("DOCWIRE_MAX_BACKEND_CONN", "4"),
        ]))
        .unwrap();
        assert_eq!(config.mode, Mode::DiffProxy);
        assert!(config.tls);
        assert_eq!(config.test_conn_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.max_backend_conn, 4);

        let config = Config::from_lookup(lookup(&[("DOCWIRE_TEST_CONN_TIMEOUT", "0")])).unwrap();
        assert_eq!(config.test_conn_timeout, None);
    }

    #[test]
    fn invalid_values() {
        let err = Config::from_lookup(lookup(&[("DOCWIRE_MODE", "mirror")])).unwrap_err();
        assert!(err.to_string().starts_with("unknown mode \"mirror\""));
        let err = Config::from_lookup(lookup(&[("DOCWIRE_TLS", "maybe")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value \"maybe\" for DOCWIRE_TLS");
    }

    #[test]
    fn mode_pipeline() {
        assert!(Mode::Normal.handles() && !Mode::Normal.forwards());
        assert!(!Mode::Proxy.handles() && Mode::Proxy.sends_proxy());
        assert!(Mode::DiffNormal.diffs() && !Mode::DiffNormal.sends_proxy());
        assert!(Mode::DiffProxy.diffs() && Mode::DiffProxy.sends_proxy());
        assert_eq!("diff-normal".parse::<Mode>().unwrap(), Mode::DiffNormal);
    }
}
