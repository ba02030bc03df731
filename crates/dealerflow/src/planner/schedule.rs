//! Run-time planning: when each tenant's daily chain should start.
//!
//! Pure computation over tenant configuration and a target date. Nothing here
//! reads job state or gates what a scheduling pass may do.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::ConfigurationError;
use crate::planner::model::{
    Frequency, PlannedRun, PriorityTier, ProcessingWindow, TenantScheduleConfig, TimezoneLoad,
};
use crate::planner::timezone::{
    detect_timezone, is_known, local_to_utc, static_offset_minutes, TzMode, DEFAULT_TIMEZONE,
};

pub const DEFAULT_LOCAL_TIME: &str = "00:30";
pub const PROCESSING_WINDOW_MINUTES: i64 = 30;

pub fn parse_local_time(s: &str) -> Result<NaiveTime, ConfigurationError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|_| ConfigurationError::InvalidLocalTime(s.to_string()))
}

fn default_local_time() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 30, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Planner {
    mode: TzMode,
}

impl Planner {
    pub fn new(mode: TzMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TzMode {
        self.mode
    }

    /// Explicit zone if convertible, else inferred from the address, else
    /// the fallback zone.
    pub fn resolve_timezone(&self, tenant: &TenantScheduleConfig) -> String {
        if let Some(tz) = tenant.timezone.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            if is_known(tz, self.mode) {
                return tz.to_string();
            }
            tracing::warn!(
                tenant_id = %tenant.tenant_id,
                error = %ConfigurationError::UnknownTimezone(tz.to_string()),
                fallback = DEFAULT_TIMEZONE,
                "using fallback timezone"
            );
            return DEFAULT_TIMEZONE.to_string();
        }

        let detected = tenant
            .address
            .as_deref()
            .map(detect_timezone)
            .unwrap_or(DEFAULT_TIMEZONE);
        tracing::debug!(tenant_id = %tenant.tenant_id, timezone = detected, "timezone inferred");
        detected.to_string()
    }

    fn preferred_time(&self, tenant: &TenantScheduleConfig) -> NaiveTime {
        match tenant.preferred_local_time.as_deref() {
            None => default_local_time(),
            Some(raw) => parse_local_time(raw).unwrap_or_else(|e| {
                tracing::warn!(
                    tenant_id = %tenant.tenant_id,
                    error = %e,
                    fallback = DEFAULT_LOCAL_TIME,
                    "using default local time"
                );
                default_local_time()
            }),
        }
    }

    fn planned_run(
        &self,
        tenant: &TenantScheduleConfig,
        timezone: &str,
        local: NaiveDateTime,
        stagger_minutes: i64,
    ) -> PlannedRun {
        let base = local_to_utc(timezone, local, self.mode).unwrap_or_else(|e| {
            // only reachable when the fallback zone itself is unmapped
            tracing::warn!(tenant_id = %tenant.tenant_id, error = %e, "treating local time as UTC");
            Utc.from_utc_datetime(&local)
        });
        let stagger = Duration::minutes(stagger_minutes);
        let utc_run_time = base + stagger;

        PlannedRun {
            tenant_id: tenant.tenant_id.clone(),
            timezone: timezone.to_string(),
            utc_run_time,
            local_run_time: format!("{} {}", (local + stagger).format("%Y-%m-%d %H:%M"), timezone),
            priority_tier: tenant.priority_tier,
            stagger_offset_minutes: stagger_minutes,
            processing_window: ProcessingWindow {
                start: utc_run_time,
                end: utc_run_time + Duration::minutes(PROCESSING_WINDOW_MINUTES),
            },
        }
    }

    /// The tenant's preferred local time on `date`, converted to UTC, with a
    /// 30-minute processing window. No stagger.
    pub fn calculate_optimal_run_time(
        &self,
        tenant: &TenantScheduleConfig,
        date: NaiveDate,
    ) -> PlannedRun {
        let timezone = self.resolve_timezone(tenant);
        let local = date.and_time(self.preferred_time(tenant));
        self.planned_run(tenant, &timezone, local, 0)
    }

    /// Dealer count per zone with the UTC hour window for 01:00 local, using
    /// fixed offsets. For estimates only.
    pub fn analyze_distribution(&self, tenants: &[TenantScheduleConfig]) -> Vec<TimezoneLoad> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for tenant in tenants {
            *counts.entry(self.resolve_timezone(tenant)).or_default() += 1;
        }

        let one_am = PriorityTier::Premium.nominal_local_start();
        counts
            .into_iter()
            .map(|(timezone, dealer_count)| {
                let offset = static_offset_minutes(&timezone)
                    .or_else(|_| static_offset_minutes(DEFAULT_TIMEZONE))
                    .unwrap_or(0);
                // NaiveTime arithmetic wraps around midnight
                let start = one_am - Duration::minutes(offset as i64);
                TimezoneLoad {
                    timezone,
                    dealer_count,
                    utc_window_start: start,
                    utc_window_end: start + Duration::hours(1),
                }
            })
            .collect()
    }

    /// Full plan for `date`: tenants grouped by zone, then by tier, each
    /// offset from the previous one in its (zone, tier) group. Sorted by UTC
    /// run time. Manual tenants are left out; twice-daily tenants get a
    /// second run 12 hours after the first.
    pub fn staggered_schedule(
        &self,
        tenants: &[TenantScheduleConfig],
        date: NaiveDate,
    ) -> Vec<PlannedRun> {
        let mut by_zone: BTreeMap<String, Vec<&TenantScheduleConfig>> = BTreeMap::new();
        for tenant in tenants.iter().filter(|t| t.frequency != Frequency::Manual) {
            by_zone
                .entry(self.resolve_timezone(tenant))
                .or_default()
                .push(tenant);
        }

        let mut runs = Vec::new();
        for (timezone, group) in &by_zone {
            for tier in PriorityTier::ALL {
                let in_tier = group.iter().filter(|t| t.priority_tier == tier);
                for (idx, tenant) in in_tier.enumerate() {
                    let stagger = tier.head_offset_minutes() + idx as i64 * tier.step_minutes();
                    let local = date.and_time(self.preferred_time(tenant));

                    let first = self.planned_run(tenant, timezone, local, stagger);
                    runs.push(first);
                    if tenant.frequency == Frequency::TwiceDaily {
                        runs.push(self.planned_run(
                            tenant,
                            timezone,
                            local + Duration::hours(12),
                            stagger,
                        ));
                    }
                }
            }
        }

        runs.sort_by(|a, b| a.utc_run_time.cmp(&b.utc_run_time));
        tracing::info!(
            date = %date,
            tenants = tenants.len(),
            runs = runs.len(),
            zones = by_zone.len(),
            "staggered schedule planned"
        );
        runs
    }
}
