use dealerflow::config;
use dealerflow::db;
use dealerflow::events::TracingEventSink;
use dealerflow::graph::PrecedenceTable;
use dealerflow::jobs::{JobRunner, JobsRepo};
use dealerflow::planner::Planner;
use dealerflow::resilience::CircuitBreaker;
use dealerflow::scheduler::BatchScheduler;
use dealerflow::tenants::{TenantDirectory, TenantsRepo};

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod executors;
use executors::build_registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::Config::from_env()?;

    tracing::info!(
        worker_id = %cfg.worker_id,
        budget = cfg.pass_budget,
        interval_secs = cfg.pass_interval.as_secs(),
        max_concurrent_tenants = cfg.scheduler.max_concurrent_tenants,
        max_jobs_per_tenant = cfg.scheduler.max_jobs_per_tenant,
        pass_timeout_secs = cfg.scheduler.pass_timeout.map(|t| t.as_secs()),
        tz_mode = ?cfg.tz_mode,
        run_once = cfg.run_once,
        "dealerflow worker starting"
    );

    let table = PrecedenceTable::default();
    table.validate()?;

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }

    let store = Arc::new(JobsRepo::new(pool.clone()));
    let tenants = TenantsRepo::new(pool.clone());
    let events = Arc::new(TracingEventSink);
    let breaker = Arc::new(CircuitBreaker::new(cfg.resilience_policies()));
    let runner = JobRunner::new(
        store.clone(),
        build_registry(),
        breaker,
        cfg.retry.clone(),
        events.clone(),
    );
    let scheduler = BatchScheduler::new(
        store,
        table,
        runner,
        events,
        cfg.scheduler.clone(),
        cfg.worker_id.clone(),
    );

    if cfg.run_once {
        let summary = scheduler.run_pass(cfg.pass_budget).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    // ---- Planner task: log the day's intended run times ----
    let planner = Planner::new(cfg.tz_mode);
    let planner_handle = tokio::spawn(async move {
        let mut planned_for: Option<NaiveDate> = None;
        loop {
            let today = Utc::now().date_naive();
            if planned_for != Some(today) {
                match tenants.list_active_tenants().await {
                    Ok(active) => {
                        for run in planner.staggered_schedule(&active, today) {
                            tracing::info!(
                                tenant_id = %run.tenant_id,
                                tier = run.priority_tier.as_str(),
                                utc_run_time = %run.utc_run_time,
                                local_run_time = %run.local_run_time,
                                "planned run"
                            );
                        }
                        planned_for = Some(today);
                    }
                    Err(e) => tracing::error!(error = %e, "failed to load tenants for planning"),
                }
            }
            tokio::time::sleep(Duration::from_secs(300)).await;
        }
    });

    // ---- Scheduling loop ----
    let budget = cfg.pass_budget;
    let mut ticker = tokio::time::interval(cfg.pass_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let scheduler_handle = tokio::spawn(async move {
        loop {
            ticker.tick().await;
            // a failed graph build skips this pass only
            if let Err(e) = scheduler.run_pass(budget).await {
                tracing::error!(error = %e, "pass failed to start");
            }
        }
    });

    tokio::select! {
        res = planner_handle => res?,
        res = scheduler_handle => res?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
    }

    Ok(())
}
