use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Provision the attendance schema (idempotent — safe to call on every run).
///
/// The unique indexes here are the engine's only synchronization mechanism:
/// parent contact identity, child natural key, one attendance row per
/// (child, service, date).
pub async fn provision_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql("CREATE EXTENSION IF NOT EXISTS pgcrypto")
        .execute(pool)
        .await?;

    // --- Parents ---
    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS parents (
            id                      UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            full_name               VARCHAR(255) NOT NULL,
            gender                  VARCHAR(16) NOT NULL,
            email                   VARCHAR(255),
            phone_number            VARCHAR(32),
            secondary_phone_number  VARCHAR(32),
            role_in_church          VARCHAR(128),
            department_in_church    VARCHAR(128),
            address                 TEXT,
            is_active               BOOLEAN NOT NULL DEFAULT TRUE,
            created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT parents_contact_method_check CHECK (
                email IS NOT NULL
                OR phone_number IS NOT NULL
                OR secondary_phone_number IS NOT NULL
            )
        )"#,
    )
    .execute(pool)
    .await?;

    // Partial indexes: NULL contact fields must not collide with each other.
    sqlx::raw_sql(
        "CREATE UNIQUE INDEX IF NOT EXISTS parents_phone_number_key
         ON parents (phone_number) WHERE phone_number IS NOT NULL",
    )
    .execute(pool)
    .await?;
    sqlx::raw_sql(
        "CREATE UNIQUE INDEX IF NOT EXISTS parents_email_key
         ON parents (email) WHERE email IS NOT NULL",
    )
    .execute(pool)
    .await?;

    // --- Children ---
    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS children (
            id                      UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            parent_id               UUID NOT NULL REFERENCES parents(id) ON DELETE CASCADE,
            full_name               VARCHAR(255) NOT NULL,
            birth_date              DATE,
            age                     INTEGER NOT NULL,
            age_bracket             VARCHAR(64) NOT NULL,
            gender                  VARCHAR(16) NOT NULL,
            special_needs           TEXT,
            allergies               TEXT,
            relationship_to_parent  VARCHAR(64) NOT NULL,
            is_active               BOOLEAN NOT NULL DEFAULT TRUE,
            created_at              TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at              TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        "CREATE UNIQUE INDEX IF NOT EXISTS children_natural_key
         ON children (parent_id, UPPER(full_name), age)",
    )
    .execute(pool)
    .await?;

    // --- Attendance ---
    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS attendance (
            id               UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            child_id         UUID NOT NULL REFERENCES children(id) ON DELETE CASCADE,
            service_name     VARCHAR(64) NOT NULL,
            attendance_date  DATE NOT NULL,
            check_in_time    TIME,
            check_out_time   TIME,
            was_present      BOOLEAN NOT NULL DEFAULT TRUE,
            recorded_by      VARCHAR(128),
            notes            TEXT,
            created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT attendance_event_key UNIQUE (child_id, service_name, attendance_date),
            CONSTRAINT attendance_times_check CHECK (
                check_in_time IS NULL
                OR check_out_time IS NULL
                OR check_out_time >= check_in_time
            )
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
