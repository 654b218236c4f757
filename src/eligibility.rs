use chrono::{Duration, Utc};
use rusqlite::ToSql;
use tracing::debug;

use crate::config::EligibilityConfig;
use crate::database::DbPool;
use crate::error::DiscountError;

/// Decides whether a customer qualifies as new. Reads order history only;
/// never writes. A failed read surfaces as `PersistenceFailed` rather than
/// being treated as "no prior orders".
#[derive(Clone)]
pub struct EligibilityChecker {
    db_pool: DbPool,
    config: EligibilityConfig,
}

impl EligibilityChecker {
    pub fn new(db_pool: DbPool, config: EligibilityConfig) -> Self {
        Self { db_pool, config }
    }

    /// True when the customer's count of qualifying prior orders does not
    /// exceed `max_prior_orders`. Callers validate email syntax first.
    pub async fn is_new_customer(&self, email: &str) -> Result<bool, DiscountError> {
        let count = self.count_prior_orders(email).await?;
        debug!("🔍 {} has {} qualifying prior orders", email, count);
        Ok(count <= i64::from(self.config.max_prior_orders))
    }

    /// Completed/processing orders placed strictly before the cutoff,
    /// narrowed by the optional lookback window, minimum total, and
    /// excluded-category rules.
    async fn count_prior_orders(&self, email: &str) -> Result<i64, DiscountError> {
        let conn = self.db_pool.get().await?;

        let mut sql = String::from(
            "SELECT COUNT(*) FROM orders o \
             WHERE o.billing_email = ? \
             AND o.status IN ('completed', 'processing') \
             AND o.placed_at < ?",
        );
        let mut params: Vec<Box<dyn ToSql>> = vec![
            Box::new(email.to_string()),
            Box::new(self.config.cutoff_date.to_rfc3339()),
        ];

        if let Some(days) = self.config.lookback_days {
            sql.push_str(" AND o.placed_at >= ?");
            let window_start = Utc::now() - Duration::days(i64::from(days));
            params.push(Box::new(window_start.to_rfc3339()));
        }

        if self.config.min_order_amount > 0.0 {
            sql.push_str(" AND o.total >= ?");
            params.push(Box::new(self.config.min_order_amount));
        }

        // An order counts only if at least one item lies outside the
        // excluded categories. Ids come from validated config, not input.
        if !self.config.excluded_category_ids.is_empty() {
            let id_list = self
                .config
                .excluded_category_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM order_items i \
                 WHERE i.order_id = o.id AND i.category_id NOT IN ({}))",
                id_list
            ));
        }

        let count: i64 =
            conn.query_row(&sql, rusqlite::params_from_iter(params), |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::database::create_db_pool;
    use chrono::{NaiveDate, TimeZone};
    use rusqlite::params;

    async fn test_pool(dir: &tempfile::TempDir) -> DbPool {
        let path = dir.path().join("shop.db");
        create_db_pool(path.to_str().unwrap()).await.unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> String {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .to_rfc3339()
    }

    async fn insert_order(
        pool: &DbPool,
        email: &str,
        status: &str,
        total: f64,
        placed_at: &str,
        categories: &[i64],
    ) {
        let conn = pool.get().await.unwrap();
        conn.execute(
            "INSERT INTO orders (billing_email, status, total, placed_at) VALUES (?1, ?2, ?3, ?4)",
            params![email, status, total, placed_at],
        )
        .unwrap();
        let order_id = conn.last_insert_rowid();
        for category in categories {
            conn.execute(
                "INSERT INTO order_items (order_id, category_id) VALUES (?1, ?2)",
                params![order_id, category],
            )
            .unwrap();
        }
    }

    fn config_2024_cutoff() -> EligibilityConfig {
        let mut config = Config::default().eligibility;
        config.cutoff_date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        config.max_prior_orders = 0;
        config
    }

    #[tokio::test]
    async fn zero_prior_orders_is_always_eligible() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let checker = EligibilityChecker::new(pool, config_2024_cutoff());

        assert!(checker.is_new_customer("nobody@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn order_before_cutoff_disqualifies_with_zero_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        insert_order(&pool, "a@x.com", "completed", 50.0, &day(2023, 12, 31), &[]).await;
        insert_order(&pool, "b@x.com", "completed", 50.0, &day(2024, 6, 1), &[]).await;

        let checker = EligibilityChecker::new(pool, config_2024_cutoff());
        assert!(!checker.is_new_customer("a@x.com").await.unwrap());
        assert!(checker.is_new_customer("b@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn order_exactly_at_cutoff_does_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let config = config_2024_cutoff();
        insert_order(
            &pool,
            "edge@x.com",
            "completed",
            50.0,
            &config.cutoff_date.to_rfc3339(),
            &[],
        )
        .await;

        let checker = EligibilityChecker::new(pool, config);
        assert!(checker.is_new_customer("edge@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn threshold_allows_up_to_max_prior_orders() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        insert_order(&pool, "one@x.com", "completed", 50.0, &day(2023, 5, 1), &[]).await;
        insert_order(&pool, "two@x.com", "completed", 50.0, &day(2023, 5, 1), &[]).await;
        insert_order(&pool, "two@x.com", "processing", 50.0, &day(2023, 6, 1), &[]).await;

        let mut config = config_2024_cutoff();
        config.max_prior_orders = 1;
        let checker = EligibilityChecker::new(pool, config);

        assert!(checker.is_new_customer("one@x.com").await.unwrap());
        assert!(!checker.is_new_customer("two@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn cancelled_orders_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        insert_order(&pool, "c@x.com", "cancelled", 50.0, &day(2023, 5, 1), &[]).await;

        let checker = EligibilityChecker::new(pool, config_2024_cutoff());
        assert!(checker.is_new_customer("c@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn orders_below_minimum_amount_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        insert_order(&pool, "small@x.com", "completed", 9.99, &day(2023, 5, 1), &[]).await;

        let mut config = config_2024_cutoff();
        config.min_order_amount = 10.0;
        let checker = EligibilityChecker::new(pool, config);

        assert!(checker.is_new_customer("small@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn orders_of_only_excluded_categories_do_not_count() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        // Gift cards only: excluded. Mixed basket: still a real order.
        insert_order(&pool, "gift@x.com", "completed", 25.0, &day(2023, 5, 1), &[7]).await;
        insert_order(
            &pool,
            "mixed@x.com",
            "completed",
            60.0,
            &day(2023, 5, 1),
            &[7, 3],
        )
        .await;

        let mut config = config_2024_cutoff();
        config.excluded_category_ids = vec![7];
        let checker = EligibilityChecker::new(pool, config);

        assert!(checker.is_new_customer("gift@x.com").await.unwrap());
        assert!(!checker.is_new_customer("mixed@x.com").await.unwrap());
    }

    #[tokio::test]
    async fn lookback_window_ignores_older_orders() {
        let dir = tempfile::tempdir().unwrap();
        let pool = test_pool(&dir).await;
        let old = (Utc::now() - Duration::days(400)).to_rfc3339();
        insert_order(&pool, "old@x.com", "completed", 50.0, &old, &[]).await;

        let mut config = config_2024_cutoff();
        // Cutoff in the future so only the lookback window filters here.
        config.cutoff_date = Utc::now() + Duration::days(1);
        config.lookback_days = Some(90);
        let checker = EligibilityChecker::new(pool, config);

        assert!(checker.is_new_customer("old@x.com").await.unwrap());
    }
}
