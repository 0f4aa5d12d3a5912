//! Limits and defaults for the scheduling services

use chrono::Duration;
use chrono_tz::Tz;

/// Tunables for the scheduling services
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Most instances one recurrence pattern may produce
    pub max_recurrence_instances: usize,

    /// How far ahead a recurrence may run, in weeks
    pub recurrence_horizon_weeks: i64,

    /// Most weeks a single copy-forward may target
    pub max_copy_weeks: u32,

    /// Most source shifts a copy-forward may read
    pub max_copy_source_shifts: usize,

    /// Longest accepted shift notes, in characters
    pub max_notes_len: usize,

    /// Used when a shop has no timezone or an unknown one
    pub default_timezone: Tz,

    /// How long a clock-in may stay open before a reminder
    pub clock_out_reminder_after: Duration,

    /// Minimum gap between two reminders for the same user
    pub clock_out_reminder_dedupe: Duration,

    /// How long shift history rows are kept
    pub history_retention: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_recurrence_instances: 104,
            recurrence_horizon_weeks: 104,
            max_copy_weeks: 12,
            max_copy_source_shifts: 200,
            max_notes_len: 500,
            default_timezone: chrono_tz::America::New_York,
            clock_out_reminder_after: Duration::hours(10),
            clock_out_reminder_dedupe: Duration::hours(8),
            history_retention: Duration::days(90),
        }
    }
}

impl SchedulerOptions {
    /// Set the recurrence instance cap
    pub fn with_max_recurrence_instances(mut self, value: usize) -> Self {
        self.max_recurrence_instances = value;
        self
    }

    /// Set the fallback timezone
    pub fn with_default_timezone(mut self, value: Tz) -> Self {
        self.default_timezone = value;
        self
    }

    /// Set the copy-forward week limit
    pub fn with_max_copy_weeks(mut self, value: u32) -> Self {
        self.max_copy_weeks = value;
        self
    }

    /// Set the history retention window
    pub fn with_history_retention(mut self, value: Duration) -> Self {
        self.history_retention = value;
        self
    }
}

/// Settings for the HTTP server binary
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, from `SHOPSHIFT_ADDR`
    pub addr: String,

    /// Shared secret for the cron endpoints, from `CRON_SECRET`
    pub cron_secret: Option<String>,

    /// Key for maintenance jobs, from `SUPABASE_SERVICE_ROLE_KEY`
    pub service_role_key: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: std::env::var("SHOPSHIFT_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string()),
            cron_secret: std::env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            service_role_key: std::env::var("SUPABASE_SERVICE_ROLE_KEY")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}
