use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{CodeFormatConfig, CouponConfig};
use crate::database::DbPool;
use crate::error::{CodeFormatError, DiscountError};
use crate::models::is_valid_email;

/// Upper bound on random draws before code generation gives up. Running
/// into it means the code space is close to saturated; uniqueness is never
/// traded for availability.
const MAX_CODE_ATTEMPTS: u32 = 100;

/// Creates, inspects and deactivates single-use discount coupons in the
/// shop's coupon store.
#[derive(Clone)]
pub struct CouponIssuer {
    db_pool: DbPool,
    format: CodeFormatConfig,
    settings: CouponConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedCoupon {
    pub id: i64,
    pub code: String,
    pub discount_percent: u32,
    pub expiry_date: DateTime<Utc>,
    pub restricted_email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponStatus {
    pub exists: bool,
    pub valid: bool,
    pub usage_count: i64,
    pub usage_limit: i64,
    pub expiry_date: Option<DateTime<Utc>>,
    pub is_expired: bool,
    pub message: String,
}

impl CouponStatus {
    fn missing() -> Self {
        Self {
            exists: false,
            valid: false,
            usage_count: 0,
            usage_limit: 0,
            expiry_date: None,
            is_expired: false,
            message: "Coupon does not exist.".to_string(),
        }
    }
}

/// One issued coupon with its derived status, for the statistics surface.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedCoupon {
    pub code: String,
    pub email: String,
    pub created_at: String,
    pub status: CouponStatus,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct CouponStatistics {
    pub total: i64,
    pub active: i64,
    pub used: i64,
    pub expired: i64,
    pub deactivated: i64,
}

impl CouponIssuer {
    pub fn new(db_pool: DbPool, format: CodeFormatConfig, settings: CouponConfig) -> Self {
        Self {
            db_pool,
            format,
            settings,
        }
    }

    /// Draws random codes until one is unused in the coupon store, or the
    /// attempt bound is hit.
    pub async fn generate_unique_code(&self) -> Result<String, DiscountError> {
        let conn = self.db_pool.get().await?;
        self.generate_unique_code_with(&conn)
    }

    fn generate_unique_code_with(&self, conn: &Connection) -> Result<String, DiscountError> {
        let alphabet = self.format.alphabet();
        let chars = alphabet.as_bytes();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let mut code = self.format.prefix.clone();
            for _ in 0..self.format.code_length {
                code.push(chars[fastrand::usize(..chars.len())] as char);
            }

            if !coupon_exists(conn, &code)? {
                debug!("🎟️ Generated code {} on attempt {}", code, attempt);
                return Ok(code);
            }
        }

        warn!(
            "Code space for prefix '{}' length {} looks saturated",
            self.format.prefix, self.format.code_length
        );
        Err(DiscountError::CodeGenerationExhausted {
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    /// Creates a coupon restricted to `email` with the configured discount,
    /// usage limit and expiry. The UNIQUE constraint on the code column
    /// backstops concurrent issuance.
    pub async fn create_coupon(&self, email: &str) -> Result<IssuedCoupon, DiscountError> {
        if !is_valid_email(email) {
            return Err(DiscountError::InvalidEmail(email.to_string()));
        }

        let conn = self.db_pool.get().await?;
        let code = self.generate_unique_code_with(&conn)?;

        let now = Utc::now();
        let expiry_date = now + Duration::days(i64::from(self.settings.expiry_days));
        let excluded_categories = if self.settings.excluded_category_ids.is_empty() {
            None
        } else {
            serde_json::to_string(&self.settings.excluded_category_ids).ok()
        };

        conn.execute(
            r#"
            INSERT INTO coupons (
                code, discount_percent, usage_limit, usage_count, expiry_date,
                restricted_email, minimum_order_amount, excluded_categories,
                trashed, created_at
            ) VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6, ?7, 0, ?8)
            "#,
            params![
                code,
                self.settings.discount_percent,
                self.settings.usage_limit,
                expiry_date.to_rfc3339(),
                email,
                self.settings.minimum_order_amount,
                excluded_categories,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| DiscountError::CouponCreationFailed(Box::new(e)))?;

        let id = conn.last_insert_rowid();
        info!(
            "✓ Created coupon {} ({}%, expires {}) for {}",
            code,
            self.settings.discount_percent,
            expiry_date.format("%Y-%m-%d"),
            email
        );

        Ok(IssuedCoupon {
            id,
            code,
            discount_percent: self.settings.discount_percent,
            expiry_date,
            restricted_email: email.to_string(),
        })
    }

    /// Soft-deletes a coupon. Unknown codes return `Ok(false)`; having
    /// nothing to deactivate is not a failure.
    pub async fn deactivate_coupon(&self, code: &str) -> Result<bool, DiscountError> {
        let conn = self.db_pool.get().await?;
        let changed = conn.execute("UPDATE coupons SET trashed = 1 WHERE code = ?1", [code])?;

        if changed > 0 {
            info!("🗑️ Deactivated coupon {}", code);
            Ok(true)
        } else {
            debug!("Nothing to deactivate for code {}", code);
            Ok(false)
        }
    }

    /// Reports a coupon's derived validity. Expiry is checked before the
    /// usage limit, so an expired-and-redeemed coupon reports as expired.
    pub async fn get_coupon_status(&self, code: &str) -> Result<CouponStatus, DiscountError> {
        let conn = self.db_pool.get().await?;

        let row = conn
            .query_row(
                "SELECT usage_count, usage_limit, expiry_date, trashed \
                 FROM coupons WHERE code = ?1",
                [code],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((usage_count, usage_limit, expiry_str, trashed)) = row else {
            return Ok(CouponStatus::missing());
        };

        let expiry_date = DateTime::parse_from_rfc3339(&expiry_str)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        let is_expired = expiry_date.map(|dt| dt < Utc::now()).unwrap_or(false);

        let mut status = CouponStatus {
            exists: true,
            valid: true,
            usage_count,
            usage_limit,
            expiry_date,
            is_expired,
            message: "Coupon is valid.".to_string(),
        };

        if trashed != 0 {
            status.valid = false;
            status.message = "Coupon was deactivated.".to_string();
        } else if status.is_expired {
            status.valid = false;
            status.message = "Coupon has expired.".to_string();
        } else if usage_count >= usage_limit {
            status.valid = false;
            status.message = "Coupon was already redeemed.".to_string();
        }

        Ok(status)
    }

    /// Validates that a code matches the configured format. The length
    /// bounds are the global prefix+4..prefix+12 window, independent of
    /// the currently configured code length.
    pub fn validate_code_format(&self, code: &str) -> Result<(), CodeFormatError> {
        let prefix_len = self.format.prefix.chars().count();
        let min = prefix_len + CodeFormatConfig::MIN_CODE_LENGTH;
        let max = prefix_len + CodeFormatConfig::MAX_CODE_LENGTH;

        let actual = code.chars().count();
        if actual < min || actual > max {
            return Err(CodeFormatError::InvalidLength { actual, min, max });
        }

        let Some(remainder) = code.strip_prefix(&self.format.prefix) else {
            return Err(CodeFormatError::InvalidPrefix {
                expected: self.format.prefix.clone(),
            });
        };

        let alphabet = self.format.alphabet();
        if !remainder.chars().all(|c| alphabet.contains(c)) {
            return Err(CodeFormatError::InvalidCharacters);
        }

        Ok(())
    }

    /// All coupons this service has issued, newest first, with their
    /// derived status.
    pub async fn get_generated_coupons(
        &self,
        limit: i64,
    ) -> Result<Vec<GeneratedCoupon>, DiscountError> {
        let conn = self.db_pool.get().await?;
        let now = Utc::now();

        let mut stmt = conn.prepare(
            "SELECT code, restricted_email, created_at, usage_count, usage_limit, \
                    expiry_date, trashed \
             FROM coupons ORDER BY created_at DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let code: String = row.get(0)?;
            let email: String = row.get(1)?;
            let created_at: String = row.get(2)?;
            let usage_count: i64 = row.get(3)?;
            let usage_limit: i64 = row.get(4)?;
            let expiry_str: String = row.get(5)?;
            let trashed: i64 = row.get(6)?;
            Ok((
                code,
                email,
                created_at,
                usage_count,
                usage_limit,
                expiry_str,
                trashed,
            ))
        })?;

        let mut coupons = Vec::new();
        for row in rows {
            let (code, email, created_at, usage_count, usage_limit, expiry_str, trashed) = row?;

            let expiry_date = DateTime::parse_from_rfc3339(&expiry_str)
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
            let is_expired = expiry_date.map(|dt| dt < now).unwrap_or(false);

            let mut status = CouponStatus {
                exists: true,
                valid: true,
                usage_count,
                usage_limit,
                expiry_date,
                is_expired,
                message: "Coupon is valid.".to_string(),
            };
            if trashed != 0 {
                status.valid = false;
                status.message = "Coupon was deactivated.".to_string();
            } else if is_expired {
                status.valid = false;
                status.message = "Coupon has expired.".to_string();
            } else if usage_count >= usage_limit {
                status.valid = false;
                status.message = "Coupon was already redeemed.".to_string();
            }

            coupons.push(GeneratedCoupon {
                code,
                email,
                created_at,
                status,
            });
        }

        Ok(coupons)
    }

    /// Aggregate counts over every issued coupon, bucketed the same way
    /// `get_coupon_status` buckets a single one.
    pub async fn get_statistics(&self) -> Result<CouponStatistics, DiscountError> {
        let conn = self.db_pool.get().await?;
        let now = Utc::now();

        let mut stmt =
            conn.prepare("SELECT usage_count, usage_limit, expiry_date, trashed FROM coupons")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut stats = CouponStatistics::default();
        for row in rows {
            let (usage_count, usage_limit, expiry_str, trashed) = row?;
            stats.total += 1;

            let is_expired = DateTime::parse_from_rfc3339(&expiry_str)
                .ok()
                .map(|dt| dt.with_timezone(&Utc) < now)
                .unwrap_or(false);

            if trashed != 0 {
                stats.deactivated += 1;
            } else if is_expired {
                stats.expired += 1;
            } else if usage_count >= usage_limit {
                stats.used += 1;
            } else {
                stats.active += 1;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CharacterSet, Config};
    use crate::database::create_db_pool;
    use std::collections::HashSet;

    async fn test_issuer(dir: &tempfile::TempDir) -> CouponIssuer {
        let path = dir.path().join("shop.db");
        let pool = create_db_pool(path.to_str().unwrap()).await.unwrap();
        let config = Config::default();
        CouponIssuer::new(pool, config.code_format, config.coupon)
    }

    #[tokio::test]
    async fn generated_codes_are_unique_and_format_valid() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        let mut codes = HashSet::new();
        for i in 0..40 {
            let coupon = issuer
                .create_coupon(&format!("customer{}@x.com", i))
                .await
                .unwrap();
            assert!(
                codes.insert(coupon.code.clone()),
                "duplicate code {}",
                coupon.code
            );
            issuer.validate_code_format(&coupon.code).unwrap();

            // Default format: NL + 6 chars of digits/uppercase
            assert!(coupon.code.starts_with("NL"));
            assert_eq!(coupon.code.len(), 8);
            assert!(coupon.code[2..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        }
    }

    #[tokio::test]
    async fn exhausted_code_space_fails_instead_of_looping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let pool = create_db_pool(path.to_str().unwrap()).await.unwrap();

        // Ten possible codes: NL0 .. NL9. Take them all.
        let format = CodeFormatConfig {
            prefix: "NL".to_string(),
            code_length: 1,
            character_sets: vec![CharacterSet::Digits],
        };
        {
            let conn = pool.get().await.unwrap();
            for d in 0..10 {
                conn.execute(
                    "INSERT INTO coupons (code, discount_percent, usage_limit, usage_count, \
                     expiry_date, restricted_email, trashed, created_at) \
                     VALUES (?1, 10, 1, 0, ?2, 'x@x.com', 0, ?2)",
                    params![format!("NL{}", d), Utc::now().to_rfc3339()],
                )
                .unwrap();
            }
        }

        let issuer = CouponIssuer::new(pool, format, Config::default().coupon);
        let err = issuer.generate_unique_code().await.unwrap_err();
        assert!(matches!(
            err,
            DiscountError::CodeGenerationExhausted { attempts: 100 }
        ));
    }

    #[tokio::test]
    async fn create_coupon_rejects_invalid_email() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        let err = issuer.create_coupon("not-an-email").await.unwrap_err();
        assert!(matches!(err, DiscountError::InvalidEmail(_)));
    }

    #[tokio::test]
    async fn fresh_coupon_is_valid_and_restricted() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        let coupon = issuer.create_coupon("fresh@x.com").await.unwrap();
        assert_eq!(coupon.restricted_email, "fresh@x.com");
        assert_eq!(coupon.discount_percent, 20);

        let status = issuer.get_coupon_status(&coupon.code).await.unwrap();
        assert!(status.exists);
        assert!(status.valid);
        assert_eq!(status.usage_limit, 1);
        assert_eq!(status.usage_count, 0);
    }

    #[tokio::test]
    async fn deactivate_marks_coupon_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        let coupon = issuer.create_coupon("gone@x.com").await.unwrap();
        assert!(issuer.deactivate_coupon(&coupon.code).await.unwrap());

        let status = issuer.get_coupon_status(&coupon.code).await.unwrap();
        assert!(status.exists);
        assert!(!status.valid);
        assert_eq!(status.message, "Coupon was deactivated.");
    }

    #[tokio::test]
    async fn deactivating_unknown_code_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        assert!(!issuer.deactivate_coupon("NLNOPE99").await.unwrap());
    }

    #[tokio::test]
    async fn missing_coupon_reports_not_existing() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        let status = issuer.get_coupon_status("NL404404").await.unwrap();
        assert!(!status.exists);
        assert!(!status.valid);
    }

    #[tokio::test]
    async fn expiry_is_reported_before_redemption() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        let coupon = issuer.create_coupon("late@x.com").await.unwrap();
        {
            let conn = issuer.db_pool.get().await.unwrap();
            // Expired a month ago and already redeemed
            conn.execute(
                "UPDATE coupons SET expiry_date = ?1, usage_count = 1 WHERE code = ?2",
                params![(Utc::now() - Duration::days(30)).to_rfc3339(), coupon.code],
            )
            .unwrap();
        }

        let status = issuer.get_coupon_status(&coupon.code).await.unwrap();
        assert!(status.is_expired);
        assert!(!status.valid);
        assert_eq!(status.message, "Coupon has expired.");
    }

    #[tokio::test]
    async fn redeemed_coupon_reports_already_used() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        let coupon = issuer.create_coupon("spent@x.com").await.unwrap();
        {
            let conn = issuer.db_pool.get().await.unwrap();
            conn.execute(
                "UPDATE coupons SET usage_count = usage_limit WHERE code = ?1",
                [&coupon.code],
            )
            .unwrap();
        }

        let status = issuer.get_coupon_status(&coupon.code).await.unwrap();
        assert!(!status.valid);
        assert_eq!(status.message, "Coupon was already redeemed.");
    }

    #[tokio::test]
    async fn code_format_failures_have_distinct_reasons() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        assert!(matches!(
            issuer.validate_code_format("NL1"),
            Err(CodeFormatError::InvalidLength { .. })
        ));
        assert!(matches!(
            issuer.validate_code_format("NL0123456789ABC"),
            Err(CodeFormatError::InvalidLength { .. })
        ));
        assert!(matches!(
            issuer.validate_code_format("XX123456"),
            Err(CodeFormatError::InvalidPrefix { .. })
        ));
        assert!(matches!(
            issuer.validate_code_format("NLabc123"),
            Err(CodeFormatError::InvalidCharacters)
        ));
        assert!(issuer.validate_code_format("NL123ABC").is_ok());
    }

    #[tokio::test]
    async fn statistics_bucket_coupons_by_derived_state() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = test_issuer(&dir).await;

        issuer.create_coupon("active@x.com").await.unwrap();
        let used = issuer.create_coupon("used@x.com").await.unwrap();
        let expired = issuer.create_coupon("expired@x.com").await.unwrap();
        let dropped = issuer.create_coupon("dropped@x.com").await.unwrap();

        {
            let conn = issuer.db_pool.get().await.unwrap();
            conn.execute(
                "UPDATE coupons SET usage_count = usage_limit WHERE code = ?1",
                [&used.code],
            )
            .unwrap();
            conn.execute(
                "UPDATE coupons SET expiry_date = ?1 WHERE code = ?2",
                params![(Utc::now() - Duration::days(1)).to_rfc3339(), expired.code],
            )
            .unwrap();
        }
        issuer.deactivate_coupon(&dropped.code).await.unwrap();

        let stats = issuer.get_statistics().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.used, 1);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.deactivated, 1);
    }
}
