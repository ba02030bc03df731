use async_trait::async_trait;
use sqlx::PgPool;

use crate::planner::{Frequency, PriorityTier, TenantScheduleConfig};

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn list_active_tenants(&self) -> anyhow::Result<Vec<TenantScheduleConfig>>;
}

/// Fixed tenant list, for tests and one-off plans.
#[derive(Debug, Clone, Default)]
pub struct StaticTenantDirectory {
    tenants: Vec<TenantScheduleConfig>,
}

impl StaticTenantDirectory {
    pub fn new(tenants: Vec<TenantScheduleConfig>) -> Self {
        Self { tenants }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenantDirectory {
    async fn list_active_tenants(&self) -> anyhow::Result<Vec<TenantScheduleConfig>> {
        Ok(self.tenants.clone())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    tenant_id: String,
    timezone: Option<String>,
    preferred_local_time: Option<String>,
    priority_tier: String,
    frequency: String,
    address: Option<String>,
}

impl From<TenantRow> for TenantScheduleConfig {
    fn from(row: TenantRow) -> Self {
        Self {
            priority_tier: PriorityTier::parse_or_default(&row.priority_tier),
            frequency: Frequency::parse_or_default(&row.frequency),
            tenant_id: row.tenant_id,
            timezone: row.timezone,
            preferred_local_time: row.preferred_local_time,
            address: row.address,
        }
    }
}

#[derive(Clone)]
pub struct TenantsRepo {
    pool: PgPool,
}

impl TenantsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, tenant: &TenantScheduleConfig) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenants (tenant_id, timezone, preferred_local_time, priority_tier, frequency, address, active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (tenant_id) DO UPDATE
            SET timezone = EXCLUDED.timezone,
                preferred_local_time = EXCLUDED.preferred_local_time,
                priority_tier = EXCLUDED.priority_tier,
                frequency = EXCLUDED.frequency,
                address = EXCLUDED.address,
                active = TRUE
            "#,
        )
        .bind(&tenant.tenant_id)
        .bind(&tenant.timezone)
        .bind(&tenant.preferred_local_time)
        .bind(tenant.priority_tier.as_str())
        .bind(tenant.frequency.as_str())
        .bind(&tenant.address)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for TenantsRepo {
    async fn list_active_tenants(&self) -> anyhow::Result<Vec<TenantScheduleConfig>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT tenant_id, timezone, preferred_local_time, priority_tier, frequency, address
            FROM tenants
            WHERE active
            ORDER BY tenant_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TenantScheduleConfig::from).collect())
    }
}
