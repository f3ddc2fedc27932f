//! Optional durable storage for devices, readings, alerts and settings.
//!
//! The in-memory pipeline never waits on this under a lock and never rolls
//! back when it fails; see [`crate::telemetry::Telemetry`].

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::PersistenceError;
use crate::models::{AlertItem, Device, Level, ProcessedReading, ThresholdSettings};

// ---

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    async fn upsert_device(&self, device: &Device) -> Result<(), PersistenceError>;

    /// Deletes the device and every row keyed by it.
    async fn delete_device(&self, device_id: &str) -> Result<(), PersistenceError>;

    async fn insert_reading(&self, reading: &ProcessedReading) -> Result<(), PersistenceError>;

    async fn insert_alert(&self, alert: &AlertItem) -> Result<(), PersistenceError>;

    async fn upsert_settings(&self, settings: &ThresholdSettings) -> Result<(), PersistenceError>;

    /// Stored readings with `from <= ts <= to`, in arrival order.
    async fn history(
        &self,
        device_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<ProcessedReading>, PersistenceError>;
}

/// Postgres-backed repository.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        PgRepository { pool }
    }

    fn ensure_open(&self) -> Result<(), PersistenceError> {
        if self.pool.is_closed() {
            return Err(PersistenceError::Unavailable("connection pool is closed".into()));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TelemetryRow {
    // ---
    device_id: String,
    ts: i64,
    temp: Option<f64>,
    hum: Option<f64>,
    gas: Option<f64>,
    dust: Option<f64>,
    iaq: i16,
    level: String,
}

impl TryFrom<TelemetryRow> for ProcessedReading {
    type Error = PersistenceError;

    fn try_from(row: TelemetryRow) -> Result<Self, Self::Error> {
        // ---
        let level = row
            .level
            .parse::<Level>()
            .map_err(|e| PersistenceError::CorruptRow(e.to_string()))?;
        let index = u8::try_from(row.iaq)
            .ok()
            .filter(|i| *i <= 100)
            .ok_or_else(|| PersistenceError::CorruptRow(format!("iaq {} out of range", row.iaq)))?;

        Ok(ProcessedReading {
            device_id: row.device_id,
            ts: row.ts,
            temp: row.temp,
            hum: row.hum,
            gas: row.gas,
            dust: row.dust,
            index,
            level,
        })
    }
}

#[async_trait]
impl TelemetryRepository for PgRepository {
    // ---
    async fn upsert_device(&self, device: &Device) -> Result<(), PersistenceError> {
        // ---
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO devices (device_id, name, created_ts, last_seen_ts)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (device_id) DO UPDATE SET
                name = EXCLUDED.name,
                last_seen_ts = EXCLUDED.last_seen_ts
            "#,
        )
        .bind(&device.device_id)
        .bind(&device.name)
        .bind(chrono::Utc::now().timestamp())
        .bind(device.last_seen)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_device(&self, device_id: &str) -> Result<(), PersistenceError> {
        // ---
        self.ensure_open()?;
        let mut tx = self.pool.begin().await?;
        for table in ["alerts", "telemetry", "settings", "devices"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE device_id = $1"))
                .bind(device_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    async fn insert_reading(&self, reading: &ProcessedReading) -> Result<(), PersistenceError> {
        // ---
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO telemetry (device_id, ts, temp, hum, gas, dust, iaq, level)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&reading.device_id)
        .bind(reading.ts)
        .bind(reading.temp)
        .bind(reading.hum)
        .bind(reading.gas)
        .bind(reading.dust)
        .bind(i16::from(reading.index))
        .bind(reading.level.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_alert(&self, alert: &AlertItem) -> Result<(), PersistenceError> {
        // ---
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO alerts (id, device_id, ts, value, level, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET ts = EXCLUDED.ts
            "#,
        )
        .bind(alert.id)
        .bind(&alert.device_id)
        .bind(alert.ts)
        .bind(alert.value)
        .bind(alert.level.as_str())
        .bind(&alert.message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_settings(&self, s: &ThresholdSettings) -> Result<(), PersistenceError> {
        // ---
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO settings (
                device_id, gas_warn, gas_danger, dust_warn, dust_danger,
                temp_low, temp_high, hum_low, hum_high, updated_ts
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (device_id) DO UPDATE SET
                gas_warn = EXCLUDED.gas_warn,
                gas_danger = EXCLUDED.gas_danger,
                dust_warn = EXCLUDED.dust_warn,
                dust_danger = EXCLUDED.dust_danger,
                temp_low = EXCLUDED.temp_low,
                temp_high = EXCLUDED.temp_high,
                hum_low = EXCLUDED.hum_low,
                hum_high = EXCLUDED.hum_high,
                updated_ts = EXCLUDED.updated_ts
            "#,
        )
        .bind(&s.device_id)
        .bind(s.gas_warn)
        .bind(s.gas_danger)
        .bind(s.dust_warn)
        .bind(s.dust_danger)
        .bind(s.temp_low)
        .bind(s.temp_high)
        .bind(s.hum_low)
        .bind(s.hum_high)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(
        &self,
        device_id: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<ProcessedReading>, PersistenceError> {
        // ---
        self.ensure_open()?;
        let rows: Vec<TelemetryRow> = sqlx::query_as(
            r#"
            SELECT device_id, ts, temp, hum, gas, dust, iaq, level
            FROM telemetry
            WHERE device_id = $1 AND ts BETWEEN $2 AND $3
            ORDER BY id ASC
            "#,
        )
        .bind(device_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ProcessedReading::try_from).collect()
    }
}
