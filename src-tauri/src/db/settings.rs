use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: i64,
}

pub async fn list_settings(pool: &SqlitePool) -> Result<Vec<SettingRow>, String> {
    sqlx::query_as::<_, SettingRow>(
        r#"
        SELECT key, value, updated_at
        FROM settings
        ORDER BY key ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|error| format!("Failed to read settings: {error}"))
}

/// Upserts every entry inside one transaction; either all keys land or none do.
pub async fn write_settings(pool: &SqlitePool, entries: &[(&str, String)]) -> Result<(), String> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|error| format!("Failed to open settings transaction: {error}"))?;
    let now = Utc::now().timestamp();

    for (key, value) in entries {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(*key)
        .bind(value)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|error| format!("Failed to write setting '{key}': {error}"))?;
    }

    tx.commit()
        .await
        .map_err(|error| format!("Failed to commit settings: {error}"))
}
