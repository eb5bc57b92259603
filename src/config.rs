use crate::error::ConfigError;
use crate::notifier::EmailSettings;
use crate::parser::FallbackPolicy;
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Email settings shared by the monitor and the `test-email` tool.
#[derive(Args, Debug, Clone)]
pub struct EmailArgs {
    /// Address notifications are sent from (also the SMTP login)
    #[clap(long, env = "SENDER_EMAIL")]
    pub sender_email: Option<String>,

    /// SMTP password or app password for the sender
    #[clap(long, env = "SENDER_PASSWORD", hide_env_values = true)]
    pub sender_password: Option<String>,

    /// Address notifications are sent to
    #[clap(long, env = "RECIPIENT_EMAIL")]
    pub recipient_email: Option<String>,

    /// SMTP server
    #[clap(long, env = "SMTP_HOST", default_value = "smtp.gmail.com")]
    pub smtp_host: String,

    /// SMTP port (STARTTLS)
    #[clap(long, env = "SMTP_PORT", default_value = "587")]
    pub smtp_port: u16,

    /// Timeout in seconds for network operations
    #[clap(long, env = "FETCH_TIMEOUT_SECS", default_value = "30")]
    pub timeout_secs: u64,
}

/// Search and scheduling settings.
#[derive(Args, Debug, Clone)]
pub struct MonitorArgs {
    /// Search results page to watch
    #[clap(long, env = "AIRBNB_SEARCH_URL")]
    pub search_url: Option<String>,

    /// Minutes between checks
    #[clap(long, env = "CHECK_INTERVAL_MINUTES", default_value = "30")]
    pub interval_minutes: u64,

    /// Minutes to wait after a check aborted unexpectedly
    #[clap(long, env = "COOLDOWN_MINUTES", default_value = "5")]
    pub cooldown_minutes: u64,

    /// File holding the ids of listings already reported
    #[clap(long, env = "SEEN_LISTINGS_FILE", default_value = "seen_listings.json")]
    pub state_file: PathBuf,

    /// Add placeholder listings from page markers when fewer than this many are found (0 disables)
    #[clap(long, default_value = "3")]
    pub fallback_threshold: usize,

    /// Maximum number of placeholder listings to add
    #[clap(long, default_value = "10")]
    pub fallback_limit: usize,
}

fn required(value: &Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

/// Longest accepted interval or cooldown: one week.
const MAX_MINUTES: u64 = 7 * 24 * 60;

fn minutes(value: u64, field: &'static str) -> Result<Duration, ConfigError> {
    let value = positive(value, field)?;
    if value > MAX_MINUTES {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be at most {} minutes", MAX_MINUTES),
        });
    }
    let secs = value.checked_mul(60).ok_or_else(|| ConfigError::Invalid {
        field,
        reason: "too large".to_string(),
    })?;
    Ok(Duration::from_secs(secs))
}

fn positive(value: u64, field: &'static str) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

impl EmailArgs {
    pub fn to_settings(&self) -> Result<EmailSettings, ConfigError> {
        let mut missing = Vec::new();
        let settings = self.collect(&mut missing)?;
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        Ok(settings)
    }

    fn collect(&self, missing: &mut Vec<&'static str>) -> Result<EmailSettings, ConfigError> {
        let sender = required(&self.sender_email, "SENDER_EMAIL", missing);
        let password = required(&self.sender_password, "SENDER_PASSWORD", missing);
        let recipient = required(&self.recipient_email, "RECIPIENT_EMAIL", missing);

        if !sender.is_empty() && !sender.is_ascii() {
            return Err(ConfigError::Invalid {
                field: "SENDER_EMAIL",
                reason: "contains non-ASCII characters".to_string(),
            });
        }

        Ok(EmailSettings {
            smtp_host: self.smtp_host.trim().to_string(),
            smtp_port: self.smtp_port,
            sender,
            password,
            recipient,
            timeout: Duration::from_secs(positive(self.timeout_secs, "FETCH_TIMEOUT_SECS")?),
        })
    }
}

/// Validated settings for the monitor loop.
#[derive(Debug, Clone)]
pub struct Settings {
    pub search_url: String,
    pub email: EmailSettings,
    pub interval: Duration,
    pub cooldown: Duration,
    pub state_file: PathBuf,
    pub fetch_timeout: Duration,
    pub fallback: FallbackPolicy,
}

impl Settings {
    /// Every missing required value is reported together.
    pub fn from_args(monitor: &MonitorArgs, email: &EmailArgs) -> Result<Self, ConfigError> {
        let mut missing = Vec::new();
        let email_settings = email.collect(&mut missing)?;
        let search_url = required(&monitor.search_url, "AIRBNB_SEARCH_URL", &mut missing);
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if !search_url.starts_with("http://") && !search_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                field: "AIRBNB_SEARCH_URL",
                reason: format!("not an http(s) URL: {}", search_url),
            });
        }

        let interval = minutes(monitor.interval_minutes, "CHECK_INTERVAL_MINUTES")?;
        let cooldown = minutes(monitor.cooldown_minutes, "COOLDOWN_MINUTES")?;

        Ok(Self {
            search_url,
            fetch_timeout: email_settings.timeout,
            email: email_settings,
            interval,
            cooldown,
            state_file: monitor.state_file.clone(),
            fallback: FallbackPolicy {
                threshold: monitor.fallback_threshold,
                limit: monitor.fallback_limit,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email_args() -> EmailArgs {
        EmailArgs {
            sender_email: Some("alerts@example.com".to_string()),
            sender_password: Some("app-password".to_string()),
            recipient_email: Some(" me@example.com ".to_string()),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            timeout_secs: 30,
        }
    }

    fn monitor_args() -> MonitorArgs {
        MonitorArgs {
            search_url: Some("https://www.airbnb.com/s/Oslo/homes".to_string()),
            interval_minutes: 30,
            cooldown_minutes: 5,
            state_file: PathBuf::from("seen_listings.json"),
            fallback_threshold: 3,
            fallback_limit: 10,
        }
    }

    #[test]
    fn defaults_become_durations() {
        let settings = Settings::from_args(&monitor_args(), &email_args()).unwrap();
        assert_eq!(settings.interval, Duration::from_secs(30 * 60));
        assert_eq!(settings.cooldown, Duration::from_secs(5 * 60));
        assert_eq!(settings.email.recipient, "me@example.com");
        assert_eq!(settings.fallback, FallbackPolicy::default());
    }

    #[test]
    fn all_missing_values_are_reported() {
        let mut email = email_args();
        email.sender_password = None;
        email.recipient_email = Some("   ".to_string());
        let mut monitor = monitor_args();
        monitor.search_url = None;

        match Settings::from_args(&monitor, &email) {
            Err(ConfigError::Missing(names)) => assert_eq!(
                names,
                vec!["SENDER_PASSWORD", "RECIPIENT_EMAIL", "AIRBNB_SEARCH_URL"]
            ),
            other => panic!("expected missing config, got {:?}", other),
        }
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut monitor = monitor_args();
        monitor.interval_minutes = 0;
        assert!(matches!(
            Settings::from_args(&monitor, &email_args()),
            Err(ConfigError::Invalid { field: "CHECK_INTERVAL_MINUTES", .. })
        ));
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let mut monitor = monitor_args();
        monitor.interval_minutes = u64::MAX / 60 + 1;
        assert!(matches!(
            Settings::from_args(&monitor, &email_args()),
            Err(ConfigError::Invalid { field: "CHECK_INTERVAL_MINUTES", .. })
        ));

        let mut monitor = monitor_args();
        monitor.cooldown_minutes = u64::MAX / 120;
        assert!(matches!(
            Settings::from_args(&monitor, &email_args()),
            Err(ConfigError::Invalid { field: "COOLDOWN_MINUTES", .. })
        ));
    }

    #[test]
    fn one_week_interval_is_accepted() {
        let mut monitor = monitor_args();
        monitor.interval_minutes = 7 * 24 * 60;
        let settings = Settings::from_args(&monitor, &email_args()).unwrap();
        assert_eq!(settings.interval, Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[derive(clap::Parser, Debug)]
    struct TestCli {
        #[clap(flatten)]
        monitor: MonitorArgs,

        #[clap(flatten)]
        email: EmailArgs,
    }

    #[test]
    fn flags_parse_with_defaults() {
        use clap::{CommandFactory, Parser};
        TestCli::command().debug_assert();

        let cli = TestCli::try_parse_from([
            "listing-watch",
            "--search-url",
            "https://www.airbnb.com/s/Oslo/homes",
            "--interval-minutes",
            "15",
        ])
        .unwrap();
        assert_eq!(cli.monitor.interval_minutes, 15);
        assert_eq!(cli.monitor.fallback_threshold, 3);
        assert_eq!(cli.email.smtp_port, 587);
    }

    #[test]
    fn email_only_needs_email_values() {
        let settings = email_args().to_settings().unwrap();
        assert_eq!(settings.sender, "alerts@example.com");
        assert_eq!(settings.smtp_port, 587);
    }
}
