//! Startup configuration: resolves command-line arguments into immutable settings.

use std::fmt;
use std::time::Duration;

use isilon_core::client::HttpTransportConfig;
use isilon_core::client::types::QuotaType;
use isilon_core::collector::{CollectorSettings, ProtocolEnablement, QuotaSettings};

use crate::Args;

#[derive(Debug)]
pub(crate) enum ConfigError {
    MissingUsername,
    /// The environment variable named by `--isilon.cluster.password.env` is unset or empty.
    MissingPassword(String),
    UnknownCollector(String),
    UnknownProtocol(String),
    InvalidDuration { flag: &'static str, value: f64 },
    /// The telemetry path collides with a fixed route.
    ReservedPath(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingUsername => {
                write!(f, "cluster username is required (--isilon.cluster.username)")
            }
            ConfigError::MissingPassword(var) => {
                write!(f, "cluster password environment variable {var} is unset or empty")
            }
            ConfigError::UnknownCollector(name) => write!(f, "unknown collector: {name}"),
            ConfigError::UnknownProtocol(msg) => f.write_str(msg),
            ConfigError::InvalidDuration { flag, value } => {
                write!(f, "invalid duration for {flag}: {value}")
            }
            ConfigError::ReservedPath(path) => {
                write!(f, "telemetry path {path} is reserved")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Served regardless of the telemetry path.
pub(crate) const HEALTH_PATH: &str = "/health";

/// Scrape deadline derivation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ScrapeTiming {
    /// Subtracted from the scraper's advertised timeout.
    pub(crate) offset: Duration,
    pub(crate) max: Duration,
}

impl ScrapeTiming {
    /// Time budget for one pass given the `X-Prometheus-Scrape-Timeout-Seconds` value.
    ///
    /// A missing or unparseable header gives the maximum. When the offset
    /// would consume the whole advertised timeout, the advertised timeout
    /// is used as is.
    pub(crate) fn budget(&self, header: Option<&str>) -> Duration {
        let Some(advertised) = header
            .and_then(|h| h.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
        else {
            return self.max;
        };
        let offset = self.offset.as_secs_f64();
        let secs = if advertised > offset {
            advertised - offset
        } else {
            advertised
        };
        Duration::try_from_secs_f64(secs).map_or(self.max, |d| d.min(self.max))
    }
}

/// Everything the exporter needs, resolved before the first pass.
#[derive(Debug, Clone)]
pub(crate) struct ExporterSettings {
    pub(crate) listen: String,
    pub(crate) telemetry_path: String,
    pub(crate) timing: ScrapeTiming,
    pub(crate) transport: HttpTransportConfig,
    pub(crate) site: String,
    pub(crate) quota_only: bool,
    pub(crate) collectors: CollectorSettings,
}

impl ExporterSettings {
    /// Resolves `args`; `lookup_env` reads the password variable.
    pub(crate) fn resolve(
        args: &Args,
        lookup_env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let username = args.username.trim();
        if username.is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        let password = lookup_env(&args.password_env)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ConfigError::MissingPassword(args.password_env.clone()))?;

        let telemetry_path = normalize_path(&args.telemetry_path);
        if telemetry_path == HEALTH_PATH {
            return Err(ConfigError::ReservedPath(telemetry_path));
        }

        Ok(Self {
            listen: args.listen_address.clone(),
            telemetry_path,
            timing: ScrapeTiming {
                offset: duration("--web.scrape-timeout-offset", args.scrape_timeout_offset)?,
                max: duration("--web.max-scrape-timeout", args.max_scrape_timeout)?,
            },
            transport: HttpTransportConfig {
                fqdn: args.fqdn.clone(),
                port: args.port,
                username: username.to_string(),
                password,
                insecure: args.insecure,
                timeout: duration("--isilon.cluster.request-timeout", args.request_timeout)?,
            },
            site: args.site.clone(),
            quota_only: args.quota_only,
            collectors: collector_settings(args)?,
        })
    }
}

fn collector_settings(args: &Args) -> Result<CollectorSettings, ConfigError> {
    let mut settings = CollectorSettings::default();
    settings.quota = QuotaSettings {
        kind: args.quota_type,
        exceeded_only: args.quota_exceeded,
        retry_budget: args.quota_retry,
        expected_total: None,
    };
    settings.protocols =
        ProtocolEnablement::from_toggles(&args.protocol_enable, &args.protocol_disable)
            .map_err(ConfigError::UnknownProtocol)?;
    for (names, enabled) in [(&args.collector_enable, true), (&args.collector_disable, false)] {
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            settings
                .set_enabled(name, enabled)
                .map_err(|_| ConfigError::UnknownCollector(name.to_string()))?;
        }
    }
    Ok(settings)
}

fn duration(flag: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidDuration { flag, value: secs })
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Quota type argument parser.
pub(crate) fn parse_quota_type(s: &str) -> Result<QuotaType, String> {
    s.parse()
}
