use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use draw_core::store::{
    ApplyCommitError, CommitPlan, CommitReceipt, CouponStore, DrawStore, PrizeLogStore,
    RequirementsStore,
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{CouponEntry, PrizeRecord, Requirements, UserId},
    protocol::{ReportFilter, UserSummary},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// Registers an operator under the next sequential `IIPL-nnnn` id.
    pub async fn register_user(&self, user_name: &str) -> Result<UserId> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(anyhow!("user name cannot be empty"));
        }

        let mut tx = self.pool.begin().await?;
        let next: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) + 1 FROM registered_users")
            .fetch_one(&mut *tx)
            .await?;
        let user_id = UserId::from_sequence(next);
        sqlx::query("INSERT INTO registered_users (seq, user_id, user_name) VALUES (?, ?, ?)")
            .bind(next)
            .bind(user_id.as_str())
            .bind(user_name)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to register user '{user_name}'"))?;
        tx.commit().await?;
        Ok(user_id)
    }

    pub async fn find_user(&self, user_id: &UserId) -> Result<Option<UserSummary>> {
        let row = sqlx::query("SELECT user_id, user_name FROM registered_users WHERE user_id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| UserSummary {
            user_id: UserId(r.get::<String, _>(0)),
            user_name: r.get::<String, _>(1),
        }))
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let rows = sqlx::query("SELECT user_id, user_name FROM registered_users ORDER BY seq ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| UserSummary {
                user_id: UserId(r.get::<String, _>(0)),
                user_name: r.get::<String, _>(1),
            })
            .collect())
    }

    pub async fn clear_coupons(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM coupons")
            .execute(&self.pool)
            .await
            .context("failed to clear coupon inventory")?;
        Ok(result.rows_affected())
    }
}

fn requirements_from_row(row: &SqliteRow) -> Result<Requirements> {
    let count = |column: &str| -> Result<u32> {
        let value = row.get::<i64, _>(column);
        u32::try_from(value).with_context(|| format!("requirements.{column} out of range: {value}"))
    };
    Ok(Requirements {
        event_name: row.get::<String, _>("event_name"),
        main_prize_count: count("main_prize_count")?,
        consolation_prize_count: count("consolation_prize_count")?,
        total_digits: count("total_digits")?,
        min_range: row.get::<i64, _>("min_range"),
        max_range: row.get::<i64, _>("max_range"),
    })
}

fn prize_record_from_row(row: &SqliteRow) -> PrizeRecord {
    PrizeRecord {
        event_name: row.get::<String, _>("event_name"),
        prize_type_label: row.get::<String, _>("prize_type_info"),
        coupon_number: row.get::<String, _>("coupon_number"),
        run_user_id: UserId(row.get::<String, _>("run_user_id")),
        run_at: row.get::<DateTime<Utc>, _>("run_at"),
    }
}

#[async_trait]
impl RequirementsStore for Storage {
    async fn get_requirements(&self) -> Result<Option<Requirements>> {
        let row = sqlx::query(
            "SELECT event_name, main_prize_count, consolation_prize_count, total_digits, min_range, max_range
             FROM requirements WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .context("failed to read requirements")?;
        row.as_ref().map(requirements_from_row).transpose()
    }

    async fn save_requirements(&self, requirements: &Requirements) -> Result<()> {
        sqlx::query(
            "INSERT INTO requirements (id, event_name, main_prize_count, consolation_prize_count, total_digits, min_range, max_range, updated_at)
             VALUES (1, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(id) DO UPDATE SET
                event_name = excluded.event_name,
                main_prize_count = excluded.main_prize_count,
                consolation_prize_count = excluded.consolation_prize_count,
                total_digits = excluded.total_digits,
                min_range = excluded.min_range,
                max_range = excluded.max_range,
                updated_at = CURRENT_TIMESTAMP",
        )
        .bind(&requirements.event_name)
        .bind(i64::from(requirements.main_prize_count))
        .bind(i64::from(requirements.consolation_prize_count))
        .bind(i64::from(requirements.total_digits))
        .bind(requirements.min_range)
        .bind(requirements.max_range)
        .execute(&self.pool)
        .await
        .context("failed to save requirements")?;
        Ok(())
    }
}

#[async_trait]
impl CouponStore for Storage {
    async fn list_coupons(&self) -> Result<Vec<CouponEntry>> {
        let rows = sqlx::query("SELECT coupon_number, prize_number FROM coupons ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .context("failed to list coupons")?;
        Ok(rows
            .into_iter()
            .map(|r| CouponEntry {
                coupon_number: r.get::<String, _>(0),
                prize_number: r.get::<Option<i64>, _>(1),
            })
            .collect())
    }

    async fn replace_coupons(&self, numbers: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM coupons")
            .execute(&mut *tx)
            .await
            .context("failed to clear coupon inventory")?;
        for number in numbers {
            sqlx::query("INSERT INTO coupons (coupon_number, prize_number) VALUES (?, NULL)")
                .bind(number)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to insert coupon '{number}'"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn stamp_coupon(&self, coupon_number: &str, rank: i64) -> Result<u64> {
        let result = sqlx::query("UPDATE coupons SET prize_number = ? WHERE coupon_number = ?")
            .bind(rank)
            .bind(coupon_number)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to stamp coupon '{coupon_number}'"))?;
        Ok(result.rows_affected())
    }

    async fn has_prize_stamps(&self) -> Result<bool> {
        let stamped: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM coupons WHERE prize_number IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(stamped > 0)
    }

    async fn clear_prize_stamps(&self) -> Result<u64> {
        let result =
            sqlx::query("UPDATE coupons SET prize_number = NULL WHERE prize_number IS NOT NULL")
                .execute(&self.pool)
                .await
                .context("failed to clear prize stamps")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PrizeLogStore for Storage {
    async fn list_event_names(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT event_name FROM prizes GROUP BY event_name ORDER BY MIN(id) ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>(0)).collect())
    }

    async fn clear_event_records(&self, event_name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM prizes WHERE event_name = ?")
            .bind(event_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn append_prize_record(&self, record: &PrizeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO prizes (event_name, prize_type_info, coupon_number, run_user_id, run_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&record.event_name)
        .bind(&record.prize_type_label)
        .bind(&record.coupon_number)
        .bind(record.run_user_id.as_str())
        .bind(record.run_at)
        .execute(&self.pool)
        .await
        .context("failed to append prize record")?;
        Ok(())
    }

    async fn list_prize_records(&self, filter: &ReportFilter) -> Result<Vec<PrizeRecord>> {
        let rows = match filter.event_name.as_deref() {
            Some(event_name) => {
                sqlx::query(
                    "SELECT event_name, prize_type_info, coupon_number, run_user_id, run_at
                     FROM prizes WHERE event_name = ? ORDER BY run_at ASC, id ASC",
                )
                .bind(event_name)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT event_name, prize_type_info, coupon_number, run_user_id, run_at
                     FROM prizes ORDER BY run_at ASC, id ASC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        // Date bounds compare calendar days in UTC, same as the in-memory store.
        Ok(rows
            .iter()
            .map(prize_record_from_row)
            .filter(|record| filter.matches(record))
            .collect())
    }
}

#[async_trait]
impl DrawStore for Storage {
    /// Runs the whole plan in one transaction. Nothing is written unless every
    /// winning number stamps at least one coupon.
    async fn apply_commit(&self, plan: &CommitPlan) -> Result<CommitReceipt, ApplyCommitError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open commit transaction")?;
        let mut receipt = CommitReceipt::default();

        if plan.supersede {
            receipt.cleared_records = sqlx::query("DELETE FROM prizes WHERE event_name = ?")
                .bind(&plan.event_name)
                .execute(&mut *tx)
                .await
                .context("failed to clear previous prize records")?
                .rows_affected();
        }

        for record in &plan.records {
            sqlx::query(
                "INSERT INTO prizes (event_name, prize_type_info, coupon_number, run_user_id, run_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&record.event_name)
            .bind(&record.prize_type_label)
            .bind(&record.coupon_number)
            .bind(record.run_user_id.as_str())
            .bind(record.run_at)
            .execute(&mut *tx)
            .await
            .context("failed to append prize record")?;
            receipt.logged += 1;
        }

        for stamp in &plan.stamps {
            let updated = sqlx::query("UPDATE coupons SET prize_number = ? WHERE coupon_number = ?")
                .bind(stamp.rank)
                .bind(&stamp.coupon_number)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to stamp coupon '{}'", stamp.coupon_number))?
                .rows_affected();
            if updated == 0 {
                // Dropping the transaction rolls back everything above.
                return Err(ApplyCommitError::Aborted(anyhow!(
                    "coupon {} is not present in the inventory",
                    stamp.coupon_number
                )));
            }
            receipt.stamped += 1;
        }

        tx.commit()
            .await
            .context("failed to commit draw transaction")?;
        Ok(receipt)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
