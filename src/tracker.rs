use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info};

use crate::database::{table_exists, DbPool};
use crate::eligibility::EligibilityChecker;
use crate::error::DiscountError;
use crate::models::CustomerStatus;

/// Per-customer discount ledger: one row per email, tracking whether a
/// discount email went out and which coupon it carried. The table name is
/// explicit constructor input; nothing here caches it process-wide.
#[derive(Clone)]
pub struct CustomerTracker {
    db_pool: DbPool,
    table: String,
    retention_days: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerRecord {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub status: CustomerStatus,
    pub coupon_code: Option<String>,
    pub discount_email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recent shop customer joined with their ledger entry, as shown in the
/// admin listing.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerOverview {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub order_count: i64,
    pub last_order_at: String,
    pub status: Option<CustomerStatus>,
    pub coupon_code: Option<String>,
    pub discount_email_sent_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CustomerFilter {
    /// Window of recent shop orders to list, in days.
    pub days: u32,
    pub status: Option<CustomerStatus>,
    /// Post-filter rows through the eligibility checker. Runs one order
    /// history query per row; fine at admin-listing scale.
    pub only_new: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for CustomerFilter {
    fn default() -> Self {
        Self {
            days: 30,
            status: None,
            only_new: false,
            limit: 50,
            offset: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CustomerStatistics {
    pub total: i64,
    pub pending: i64,
    pub sent: i64,
    pub used: i64,
    pub expired: i64,
}

fn parse_timestamp(idx: usize, value: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            rusqlite::Error::InvalidColumnType(idx, value, rusqlite::types::Type::Text)
        })
}

impl CustomerTracker {
    pub fn new(db_pool: DbPool, table: impl Into<String>, retention_days: u32) -> Self {
        Self {
            db_pool,
            table: table.into(),
            retention_days,
        }
    }

    /// Creates the ledger table and its indexes if missing. Called once at
    /// startup; `get_statistics` stays usable even before this ran.
    pub async fn ensure_table(&self) -> Result<(), DiscountError> {
        let conn = self.db_pool.get().await?;

        conn.execute(
            &format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    customer_email TEXT UNIQUE NOT NULL,
                    customer_first_name TEXT,
                    customer_last_name TEXT,
                    status TEXT NOT NULL DEFAULT 'pending',
                    coupon_code TEXT,
                    discount_email_sent_at TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )
                "#,
                self.table
            ),
            [],
        )?;

        for column in ["status", "created_at"] {
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table}({column})",
                    table = self.table,
                    column = column
                ),
                [],
            )?;
        }

        debug!("✅ Ledger table '{}' ready", self.table);
        Ok(())
    }

    /// Inserts a new `pending` row. A second row for the same email is
    /// rejected by the UNIQUE constraint and surfaces as an error.
    pub async fn add_customer(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<i64, DiscountError> {
        let conn = self.db_pool.get().await?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            &format!(
                "INSERT INTO {} (customer_email, customer_first_name, customer_last_name, \
                 status, created_at, updated_at) VALUES (?1, ?2, ?3, 'pending', ?4, ?4)",
                self.table
            ),
            params![email, first_name, last_name, now],
        )?;

        let id = conn.last_insert_rowid();
        debug!("➕ Tracking customer {} (id {})", email, id);
        Ok(id)
    }

    /// Moves a customer to `status`. For `sent` with a coupon code this
    /// also stamps the dispatch time and stores the code; this is the only
    /// write the issuance workflow performs here. `Ok(false)` means no row
    /// matched the email.
    pub async fn update_customer_status(
        &self,
        email: &str,
        status: CustomerStatus,
        coupon_code: Option<&str>,
    ) -> Result<bool, DiscountError> {
        let conn = self.db_pool.get().await?;
        let now = Utc::now().to_rfc3339();

        let changed = match (status, coupon_code) {
            (CustomerStatus::Sent, Some(code)) if !code.is_empty() => conn.execute(
                &format!(
                    "UPDATE {} SET status = ?1, coupon_code = ?2, \
                     discount_email_sent_at = ?3, updated_at = ?3 \
                     WHERE customer_email = ?4",
                    self.table
                ),
                params![status.as_str(), code, now, email],
            )?,
            _ => conn.execute(
                &format!(
                    "UPDATE {} SET status = ?1, updated_at = ?2 WHERE customer_email = ?3",
                    self.table
                ),
                params![status.as_str(), now, email],
            )?,
        };

        Ok(changed > 0)
    }

    /// The idempotent "already handled?" lookup. A miss is `None`, not an
    /// error.
    pub async fn get_customer(&self, email: &str) -> Result<Option<CustomerRecord>, DiscountError> {
        let conn = self.db_pool.get().await?;

        let record = conn
            .query_row(
                &format!(
                    "SELECT id, customer_email, customer_first_name, customer_last_name, \
                     status, coupon_code, discount_email_sent_at, created_at, updated_at \
                     FROM {} WHERE customer_email = ?1",
                    self.table
                ),
                [email],
                |row| {
                    let status_str: String = row.get(4)?;
                    let status = status_str.parse::<CustomerStatus>().map_err(|_| {
                        rusqlite::Error::InvalidColumnType(
                            4,
                            status_str,
                            rusqlite::types::Type::Text,
                        )
                    })?;

                    let sent_at: Option<String> = row.get(6)?;
                    let sent_at = match sent_at {
                        Some(s) => Some(parse_timestamp(6, s)?),
                        None => None,
                    };

                    Ok(CustomerRecord {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        first_name: row.get(2)?,
                        last_name: row.get(3)?,
                        status,
                        coupon_code: row.get(5)?,
                        discount_email_sent_at: sent_at,
                        created_at: parse_timestamp(7, row.get(7)?)?,
                        updated_at: parse_timestamp(8, row.get(8)?)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    /// Recent shop customers with their ledger state, newest order first.
    pub async fn get_customers(
        &self,
        filter: &CustomerFilter,
        checker: &EligibilityChecker,
    ) -> Result<Vec<CustomerOverview>, DiscountError> {
        let conn = self.db_pool.get().await?;
        let window_start = (Utc::now() - Duration::days(i64::from(filter.days))).to_rfc3339();

        let mut stmt = conn.prepare(
            "SELECT o.billing_email, MAX(o.billing_first_name), MAX(o.billing_last_name), \
                    COUNT(*), MAX(o.placed_at) \
             FROM orders o \
             WHERE o.placed_at >= ?1 AND o.status IN ('completed', 'processing') \
             GROUP BY o.billing_email \
             ORDER BY MAX(o.placed_at) DESC \
             LIMIT ?2 OFFSET ?3",
        )?;

        let rows = stmt.query_map(
            params![window_start, filter.limit, filter.offset],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;

        let mut customers = Vec::new();
        for row in rows {
            let (email, first_name, last_name, order_count, last_order_at) = row?;

            let tracking = conn
                .query_row(
                    &format!(
                        "SELECT status, coupon_code, discount_email_sent_at \
                         FROM {} WHERE customer_email = ?1",
                        self.table
                    ),
                    [&email],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, Option<String>>(1)?,
                            row.get::<_, Option<String>>(2)?,
                        ))
                    },
                )
                .optional()?;

            let (status, coupon_code, discount_email_sent_at) = match tracking {
                Some((status_str, code, sent_at)) => {
                    (status_str.parse::<CustomerStatus>().ok(), code, sent_at)
                }
                None => (None, None, None),
            };

            if let Some(wanted) = filter.status {
                if status != Some(wanted) {
                    continue;
                }
            }

            customers.push(CustomerOverview {
                email,
                first_name,
                last_name,
                order_count,
                last_order_at,
                status,
                coupon_code,
                discount_email_sent_at,
            });
        }

        // Expensive per-row history check, so it runs last on the already
        // narrowed list.
        if filter.only_new {
            let mut eligible = Vec::new();
            for customer in customers {
                if checker.is_new_customer(&customer.email).await? {
                    eligible.push(customer);
                }
            }
            customers = eligible;
        }

        Ok(customers)
    }

    /// Prunes terminal-state rows older than the retention window. Runs
    /// from the daily scheduler task; a plain filtered DELETE.
    pub async fn cleanup_old_entries(&self) -> Result<usize, DiscountError> {
        let conn = self.db_pool.get().await?;
        let threshold = (Utc::now() - Duration::days(i64::from(self.retention_days))).to_rfc3339();

        let deleted = conn.execute(
            &format!(
                "DELETE FROM {} WHERE created_at < ?1 AND status IN ('used', 'expired')",
                self.table
            ),
            [threshold],
        )?;

        if deleted > 0 {
            info!("🧹 Pruned {} old ledger entries", deleted);
        }
        Ok(deleted)
    }

    /// Counts per status. Returns all zeros when the ledger table does not
    /// exist yet, so first-run statistics queries never fail.
    pub async fn get_statistics(&self) -> Result<CustomerStatistics, DiscountError> {
        let conn = self.db_pool.get().await?;

        if !table_exists(&conn, &self.table)? {
            debug!("Ledger table '{}' missing, returning zero counts", self.table);
            return Ok(CustomerStatistics::default());
        }

        let mut stmt = conn.prepare(&format!("SELECT status, COUNT(*) FROM {} GROUP BY status", self.table))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut stats = CustomerStatistics::default();
        for row in rows {
            let (status, count) = row?;
            stats.total += count;
            match status.parse::<CustomerStatus>() {
                Ok(CustomerStatus::Pending) => stats.pending = count,
                Ok(CustomerStatus::Sent) => stats.sent = count,
                Ok(CustomerStatus::Used) => stats.used = count,
                Ok(CustomerStatus::Expired) => stats.expired = count,
                Err(_) => {}
            }
        }

        Ok(stats)
    }
}
