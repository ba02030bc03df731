use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Premium,
    Standard,
    Economy,
}

impl PriorityTier {
    pub const ALL: [PriorityTier; 3] = [
        PriorityTier::Premium,
        PriorityTier::Standard,
        PriorityTier::Economy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Premium => "premium",
            PriorityTier::Standard => "standard",
            PriorityTier::Economy => "economy",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigurationError> {
        match s.trim().to_lowercase().as_str() {
            "premium" => Ok(PriorityTier::Premium),
            "standard" => Ok(PriorityTier::Standard),
            "economy" => Ok(PriorityTier::Economy),
            _ => Err(ConfigurationError::UnknownTier(s.to_string())),
        }
    }

    /// Unknown tiers are scheduled as `standard`.
    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to standard tier");
            PriorityTier::Standard
        })
    }

    /// Local wall-clock time the tier's first slot lands on.
    pub fn nominal_local_start(&self) -> NaiveTime {
        let (h, m) = match self {
            PriorityTier::Premium => (1, 0),
            PriorityTier::Standard => (1, 20),
            PriorityTier::Economy => (2, 0),
        };
        NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Flat offset before the tier's first tenant.
    pub fn head_offset_minutes(&self) -> i64 {
        match self {
            PriorityTier::Premium => 0,
            PriorityTier::Standard => 20,
            PriorityTier::Economy => 60,
        }
    }

    /// Spacing between consecutive tenants of the tier in one timezone.
    pub fn step_minutes(&self) -> i64 {
        match self {
            PriorityTier::Premium => 2,
            PriorityTier::Standard => 3,
            PriorityTier::Economy => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    TwiceDaily,
    /// Only runs when triggered on demand; never planned.
    Manual,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::TwiceDaily => "twice_daily",
            Frequency::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConfigurationError> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "twice_daily" | "twice-daily" => Ok(Frequency::TwiceDaily),
            "manual" => Ok(Frequency::Manual),
            _ => Err(ConfigurationError::UnknownFrequency(s.to_string())),
        }
    }

    pub fn parse_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to daily frequency");
            Frequency::Daily
        })
    }

    pub fn runs_per_day(&self) -> u32 {
        match self {
            Frequency::Daily => 1,
            Frequency::TwiceDaily => 2,
            Frequency::Manual => 0,
        }
    }
}

/// Immutable planner input for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantScheduleConfig {
    pub tenant_id: String,
    /// IANA zone. When absent the zone is inferred from `address`.
    pub timezone: Option<String>,
    /// `HH:MM`, local to the tenant's zone.
    pub preferred_local_time: Option<String>,
    pub priority_tier: PriorityTier,
    pub frequency: Frequency,
    pub address: Option<String>,
}

impl TenantScheduleConfig {
    pub fn new(tenant_id: impl Into<String>, tier: PriorityTier) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            timezone: None,
            preferred_local_time: None,
            priority_tier: tier,
            frequency: Frequency::Daily,
            address: None,
        }
    }

    pub fn timezone(mut self, tz: impl Into<String>) -> Self {
        self.timezone = Some(tz.into());
        self
    }

    pub fn preferred_local_time(mut self, hhmm: impl Into<String>) -> Self {
        self.preferred_local_time = Some(hhmm.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessingWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedRun {
    pub tenant_id: String,
    pub timezone: String,
    pub utc_run_time: DateTime<Utc>,
    /// Display only, e.g. `2024-03-05 01:02 America/Chicago`.
    pub local_run_time: String,
    pub priority_tier: PriorityTier,
    pub stagger_offset_minutes: i64,
    pub processing_window: ProcessingWindow,
}

/// Dealer count per zone and the UTC hour that "01:00 local" falls in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimezoneLoad {
    pub timezone: String,
    pub dealer_count: usize,
    pub utc_window_start: NaiveTime,
    pub utc_window_end: NaiveTime,
}
