use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde_json::json;

use dealerflow::config::Config;
use dealerflow::db;
use dealerflow::graph::PrecedenceTable;
use dealerflow::jobs::{JobStore, JobType, JobsRepo, NewJob};
use dealerflow::planner::{Planner, PriorityTier, TenantScheduleConfig, TzMode};
use dealerflow::tenants::{TenantDirectory, TenantsRepo};

#[derive(Parser)]
#[command(name = "dflowctl", about = "Operator tooling for the dealer inventory pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the staggered run plan for a date (defaults to today, UTC).
    Plan {
        #[arg(long)]
        date: Option<NaiveDate>,
        /// `static` (fixed offsets) or `iana` (DST-aware)
        #[arg(long)]
        tz_mode: Option<String>,
    },
    /// Dealer count per timezone and the UTC hour that 01:00 local lands in.
    Distribution,
    /// Insert demo tenants and a full job chain for each.
    Seed {
        #[arg(default_value_t = 10)]
        n: usize,
    },
    /// Truncate the jobs table.
    Reset,
    /// Job counts by status.
    Counts,
    /// Verify the precedence table is acyclic.
    CheckPrecedence,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    if let Command::CheckPrecedence = cli.command {
        PrecedenceTable::default().validate()?;
        println!("precedence table OK");
        return Ok(());
    }

    let cfg = Config::from_env()?;
    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
    }
    let jobs = JobsRepo::new(pool.clone());
    let tenants = TenantsRepo::new(pool.clone());

    match cli.command {
        Command::Plan { date, tz_mode } => {
            let mode = match tz_mode {
                Some(raw) => TzMode::from_str(&raw)
                    .ok_or_else(|| anyhow::anyhow!("unknown tz mode: {raw}"))?,
                None => cfg.tz_mode,
            };
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let active = tenants.list_active_tenants().await?;
            let plan = Planner::new(mode).staggered_schedule(&active, date);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Distribution => {
            let active = tenants.list_active_tenants().await?;
            let loads = Planner::new(cfg.tz_mode).analyze_distribution(&active);
            for load in loads {
                println!(
                    "{:<32} dealers={:<5} utc_window={}-{}",
                    load.timezone,
                    load.dealer_count,
                    load.utc_window_start.format("%H:%M"),
                    load.utc_window_end.format("%H:%M")
                );
            }
        }
        Command::Seed { n } => seed(&jobs, &tenants, n).await?,
        Command::Reset => {
            jobs.reset().await?;
            println!("reset OK");
        }
        Command::Counts => {
            for (status, count) in jobs.counts_by_status().await? {
                println!("{status:<12} {count}");
            }
        }
        Command::CheckPrecedence => {}
    }

    Ok(())
}

const DEMO_ADDRESSES: &[&str] = &[
    "456 Oak Ave, New York, NY 10001",
    "12 Lake Shore Dr, Chicago, IL 60601",
    "900 Colfax Ave, Denver, CO 80203",
    "1 Harbor Blvd, Los Angeles, CA 90012",
    "77 Main St, Phoenix, AZ 85004",
];

async fn seed(jobs: &JobsRepo, tenants: &TenantsRepo, n: usize) -> anyhow::Result<()> {
    for i in 0..n {
        let tenant_id = format!("dealer-{:03}", i + 1);
        let tier = PriorityTier::ALL[i % PriorityTier::ALL.len()];
        let tenant = TenantScheduleConfig::new(&tenant_id, tier)
            .preferred_local_time("01:00")
            .address(DEMO_ADDRESSES[i % DEMO_ADDRESSES.len()]);
        tenants.upsert(&tenant).await?;

        for job_type in JobType::ALL {
            let payload = json!({ "feed_url": format!("https://feeds.example.com/{tenant_id}.xml") });
            match jobs.enqueue(NewJob::now(&tenant_id, job_type, payload)).await? {
                Some(id) => println!("+ {tenant_id} {job_type} id={id}"),
                None => println!("= {tenant_id} {job_type} already live"),
            }
        }
    }
    Ok(())
}
