//! Database schema management for `codemetal-airwatch`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs`, and only when persistence is
//! configured.

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates `devices`, `telemetry`, `alerts` and `settings`. Safe to call on
/// every startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS devices (
            device_id     TEXT PRIMARY KEY,
            name          TEXT   NOT NULL DEFAULT '',
            created_ts    BIGINT NOT NULL,
            last_seen_ts  BIGINT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Processed readings, in arrival order (id) rather than ts order
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS telemetry (
            id         BIGSERIAL PRIMARY KEY,
            device_id  TEXT             NOT NULL,
            ts         BIGINT           NOT NULL,
            temp       DOUBLE PRECISION,
            hum        DOUBLE PRECISION,
            gas        DOUBLE PRECISION,
            dust       DOUBLE PRECISION,
            iaq        SMALLINT         NOT NULL,
            level      TEXT             NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS alerts (
            id         UUID PRIMARY KEY,
            device_id  TEXT    NOT NULL,
            ts         BIGINT  NOT NULL,
            type       TEXT    NOT NULL DEFAULT 'iaq',
            value      INTEGER NOT NULL,
            level      TEXT    NOT NULL,
            message    TEXT    NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            device_id    TEXT PRIMARY KEY,
            gas_warn     DOUBLE PRECISION NOT NULL,
            gas_danger   DOUBLE PRECISION NOT NULL,
            dust_warn    DOUBLE PRECISION NOT NULL,
            dust_danger  DOUBLE PRECISION NOT NULL,
            temp_low     DOUBLE PRECISION NOT NULL,
            temp_high    DOUBLE PRECISION NOT NULL,
            hum_low      DOUBLE PRECISION NOT NULL,
            hum_high     DOUBLE PRECISION NOT NULL,
            updated_ts   BIGINT           NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Basic indexes for range queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_telemetry_device_ts
            ON telemetry (device_id, ts);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_alerts_device_ts
            ON alerts (device_id, ts);
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
