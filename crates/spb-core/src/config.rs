use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use url::Url;

use crate::{
    errors::Error,
    logging::{LogFormat, LogLevel},
    Result,
};

const DEFAULT_LAUNCHPAD_URL: &str = "https://susumi.io/launchpad";

/// Typed, immutable process configuration.
///
/// Loaded once at startup and shared read-only (`Arc<Config>`) by every
/// component. Invalid or missing required values are fatal.
#[derive(Clone, Debug)]
pub struct Config {
    // Bot
    pub bot_token: String,
    pub bot_username: Option<String>,
    pub launchpad_url: Url,

    // Delivery
    pub webhook: Option<WebhookConfig>,
    pub port: u16,

    // Security
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub rate_limit_sweep_interval: Duration,
    pub max_message_length: usize,

    // Observability
    pub slow_request_threshold: Duration,
    pub health_check_interval: Duration,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    /// Daily-rotated JSON log files are written here when set.
    pub logs_dir: Option<PathBuf>,
}

/// Push-delivery target. Present only when both domain and path are set.
#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub url: Url,
    pub path: String,
    pub secret: Option<String>,
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    ///
    /// `.env` values never override variables that are already set. Call this
    /// before starting the async runtime: it may modify the environment.
    pub fn load() -> Result<Self> {
        load_dotenv_from(Path::new(".env"))?;
        Self::from_lookup(env_str)
    }

    /// Build a config from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = lookup("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let bot_username = lookup("BOT_USERNAME")
            .and_then(non_empty)
            .map(|s| s.trim_start_matches('@').to_string());

        let launchpad_raw =
            lookup("LAUNCHPAD_URL").unwrap_or_else(|| DEFAULT_LAUNCHPAD_URL.to_string());
        let launchpad_url = parse_https_url(&launchpad_raw)
            .ok_or_else(|| Error::Config("LAUNCHPAD_URL must be a valid HTTPS URL".to_string()))?;

        let webhook = match (
            lookup("WEBHOOK_DOMAIN").and_then(non_empty),
            lookup("WEBHOOK_PATH").and_then(non_empty),
        ) {
            (Some(domain), Some(path)) => Some(build_webhook(
                &domain,
                &path,
                lookup("WEBHOOK_SECRET").and_then(non_empty),
            )?),
            _ => None,
        };
        let port = parse_num(&lookup, "PORT", 3000u16)?;

        let rate_limit_window =
            Duration::from_millis(parse_num(&lookup, "RATE_LIMIT_WINDOW", 60_000u64)?);
        if rate_limit_window.is_zero() {
            return Err(Error::Config("RATE_LIMIT_WINDOW must be positive".to_string()));
        }
        let rate_limit_max = parse_num(&lookup, "RATE_LIMIT_MAX", 10u32)?;
        if rate_limit_max == 0 {
            return Err(Error::Config("RATE_LIMIT_MAX must be positive".to_string()));
        }
        let rate_limit_sweep_interval = Duration::from_millis(
            parse_num(&lookup, "RATE_LIMIT_SWEEP_INTERVAL", 60_000u64)?.max(1),
        );
        let max_message_length = parse_num(&lookup, "MAX_MESSAGE_LENGTH", 4096usize)?;
        if max_message_length == 0 {
            return Err(Error::Config("MAX_MESSAGE_LENGTH must be positive".to_string()));
        }

        let slow_request_threshold =
            Duration::from_millis(parse_num(&lookup, "SLOW_REQUEST_THRESHOLD", 1000u64)?);
        let health_check_interval = Duration::from_millis(
            parse_num(&lookup, "HEALTH_CHECK_INTERVAL", 300_000u64)?.max(1),
        );

        let log_level = match lookup("LOG_LEVEL").and_then(non_empty) {
            Some(raw) => raw.parse::<LogLevel>()?,
            None => LogLevel::Info,
        };
        let log_format = match lookup("LOG_FORMAT").and_then(non_empty) {
            Some(raw) => raw.parse::<LogFormat>()?,
            None => LogFormat::Pretty,
        };
        let logs_dir = lookup("LOGS_DIR").and_then(non_empty).map(PathBuf::from);

        Ok(Self {
            bot_token,
            bot_username,
            launchpad_url,
            webhook,
            port,
            rate_limit_window,
            rate_limit_max,
            rate_limit_sweep_interval,
            max_message_length,
            slow_request_threshold,
            health_check_interval,
            log_level,
            log_format,
            logs_dir,
        })
    }

    /// "webhook" or "polling".
    pub fn delivery_mode(&self) -> &'static str {
        if self.webhook.is_some() {
            "webhook"
        } else {
            "polling"
        }
    }
}

fn build_webhook(domain: &str, path: &str, secret: Option<String>) -> Result<WebhookConfig> {
    if parse_https_url(domain).is_none() {
        return Err(Error::Config(
            "WEBHOOK_DOMAIN must be a valid HTTPS URL".to_string(),
        ));
    }
    if !path.starts_with('/') {
        return Err(Error::Config("WEBHOOK_PATH must start with '/'".to_string()));
    }
    let url = parse_https_url(&format!("{}{path}", domain.trim_end_matches('/')))
        .ok_or_else(|| Error::Config(format!("invalid webhook URL: {domain}{path}")))?;

    if let Some(s) = &secret {
        if !is_valid_secret_token(s) {
            return Err(Error::Config(
                "WEBHOOK_SECRET must be 1-256 characters of A-Z, a-z, 0-9, '_' or '-'".to_string(),
            ));
        }
    }

    Ok(WebhookConfig {
        url,
        path: path.to_string(),
        secret,
    })
}

fn parse_https_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    (url.scheme() == "https").then_some(url)
}

fn is_valid_secret_token(s: &str) -> bool {
    (1..=256).contains(&s.len())
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn parse_num<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key).and_then(non_empty) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| {
                Error::Config(format!("{key} must be a non-negative integer, got {raw:?}"))
            }),
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_from(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Config(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn dotenv_fills_only_unset_variables() {
        let dir = env::temp_dir().join(format!("spb-dotenv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        std::fs::write(
            &path,
            "# comment\nSPB_DOTENV_FRESH=from-file\nSPB_DOTENV_PRESET=\"from-file\"\n",
        )
        .unwrap();
        env::set_var("SPB_DOTENV_PRESET", "from-env");

        load_dotenv_from(&path).unwrap();
        assert_eq!(env::var("SPB_DOTENV_FRESH").unwrap(), "from-file");
        assert_eq!(env::var("SPB_DOTENV_PRESET").unwrap(), "from-env");

        // A missing file is not an error.
        load_dotenv_from(&dir.join("absent.env")).unwrap();

        let broken = dir.join("broken.env");
        std::fs::write(&broken, "this is not an assignment\n").unwrap();
        assert!(matches!(load_dotenv_from(&broken), Err(Error::Config(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn defaults_apply_with_only_token() {
        let cfg = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(cfg.launchpad_url.as_str(), "https://susumi.io/launchpad");
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(60));
        assert_eq!(cfg.rate_limit_max, 10);
        assert_eq!(cfg.max_message_length, 4096);
        assert_eq!(cfg.slow_request_threshold, Duration::from_millis(1000));
        assert_eq!(cfg.log_level, LogLevel::Info);
        assert_eq!(cfg.port, 3000);
        assert!(cfg.webhook.is_none());
        assert!(cfg.logs_dir.is_none());
        assert_eq!(cfg.delivery_mode(), "polling");
    }

    #[test]
    fn zero_message_length_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("MAX_MESSAGE_LENGTH", "0"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAX_MESSAGE_LENGTH"));

        let cfg = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("MAX_MESSAGE_LENGTH", "1"),
            ("LOGS_DIR", "/var/log/spb"),
        ]))
        .unwrap();
        assert_eq!(cfg.max_message_length, 1);
        assert_eq!(cfg.logs_dir.as_deref(), Some(Path::new("/var/log/spb")));
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "   ")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn launchpad_must_be_https() {
        let err = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("LAUNCHPAD_URL", "http://insecure.example/launch"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("LAUNCHPAD_URL"));
    }

    #[test]
    fn webhook_requires_domain_and_path() {
        let only_domain = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("WEBHOOK_DOMAIN", "https://bot.example.com"),
        ]))
        .unwrap();
        assert!(only_domain.webhook.is_none());

        let cfg = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("WEBHOOK_DOMAIN", "https://bot.example.com/"),
            ("WEBHOOK_PATH", "/telegram/hook"),
            ("WEBHOOK_SECRET", "s3cr3t_token-1"),
        ]))
        .unwrap();
        let hook = cfg.webhook.as_ref().unwrap();
        assert_eq!(hook.url.as_str(), "https://bot.example.com/telegram/hook");
        assert_eq!(hook.secret.as_deref(), Some("s3cr3t_token-1"));
        assert_eq!(cfg.delivery_mode(), "webhook");
    }

    #[test]
    fn webhook_secret_charset_is_checked() {
        let err = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("WEBHOOK_DOMAIN", "https://bot.example.com"),
            ("WEBHOOK_PATH", "/hook"),
            ("WEBHOOK_SECRET", "has spaces!"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("WEBHOOK_SECRET"));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("RATE_LIMIT_MAX", "ten"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RATE_LIMIT_MAX"));

        let err = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("RATE_LIMIT_WINDOW", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn username_strips_leading_at() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("BOT_USERNAME", "@SusumiPioneerBot"),
            ("LOG_LEVEL", "http"),
        ]))
        .unwrap();
        assert_eq!(cfg.bot_username.as_deref(), Some("SusumiPioneerBot"));
        assert_eq!(cfg.log_level, LogLevel::Http);
    }
}
