use std::sync::Arc;

use tracing::{error, info, warn};

use crate::coupons::{CouponIssuer, IssuedCoupon};
use crate::database::DbPool;
use crate::eligibility::EligibilityChecker;
use crate::email_sender::{log_email_sent, DiscountMailer, DiscountRecipient};
use crate::error::DiscountError;
use crate::models::{is_valid_email, CustomerStatus};
use crate::tracker::CustomerTracker;

/// The issuance workflow: eligibility check, coupon creation, email
/// dispatch and ledger update, with the dispatch-failure rollback wired
/// in. Per-email serialization is delegated to the UNIQUE constraints of
/// the ledger and the coupon store; there is no in-process locking.
#[derive(Clone)]
pub struct DiscountService {
    checker: EligibilityChecker,
    issuer: CouponIssuer,
    tracker: CustomerTracker,
    mailer: Arc<dyn DiscountMailer>,
    db_pool: DbPool,
}

impl DiscountService {
    pub fn new(
        checker: EligibilityChecker,
        issuer: CouponIssuer,
        tracker: CustomerTracker,
        mailer: Arc<dyn DiscountMailer>,
        db_pool: DbPool,
    ) -> Self {
        Self {
            checker,
            issuer,
            tracker,
            mailer,
            db_pool,
        }
    }

    /// First observation of a customer: starts tracking them as `pending`
    /// if they qualify as new and are not tracked yet. Returns the new
    /// ledger id, or `None` when nothing was recorded.
    pub async fn record_new_customer(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<i64>, DiscountError> {
        if !is_valid_email(email) {
            return Err(DiscountError::InvalidEmail(email.to_string()));
        }

        if self.tracker.get_customer(email).await?.is_some() {
            return Ok(None);
        }

        if !self.checker.is_new_customer(email).await? {
            return Ok(None);
        }

        let id = self.tracker.add_customer(email, first_name, last_name).await?;
        info!("👤 Now tracking new customer {}", email);
        Ok(Some(id))
    }

    /// The `pending → sent` transition. Creates the coupon, dispatches the
    /// email, then updates the ledger. A dispatch failure deactivates the
    /// coupon again and leaves the customer `pending`, safe to retry.
    ///
    /// Eligibility is not re-verified here: sending is a manual action
    /// against a previously computed eligibility view.
    pub async fn send_discount(
        &self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<IssuedCoupon, DiscountError> {
        if !is_valid_email(email) {
            return Err(DiscountError::InvalidEmail(email.to_string()));
        }

        // Defensive guard against double issuance
        match self.tracker.get_customer(email).await? {
            Some(record) if record.status != CustomerStatus::Pending => {
                if let Some(code) = record.coupon_code {
                    warn!("{} already has coupon {}, refusing re-issue", email, code);
                    return Err(DiscountError::AlreadyIssued {
                        email: email.to_string(),
                        code,
                    });
                }
            }
            Some(_) => {}
            None => {
                self.tracker.add_customer(email, first_name, last_name).await?;
            }
        }

        let coupon = self.issuer.create_coupon(email).await?;

        let recipient = DiscountRecipient {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            coupon_code: coupon.code.clone(),
            discount_percent: coupon.discount_percent,
            expiry_date: coupon.expiry_date,
        };

        if let Err(dispatch_err) = self.mailer.send_discount_email(&recipient).await {
            // Mandatory rollback: no active coupon may outlive a failed
            // send. The ledger is left untouched so a retry is possible.
            match self.issuer.deactivate_coupon(&coupon.code).await {
                Ok(_) => info!("↩️ Rolled back coupon {} after dispatch failure", coupon.code),
                Err(e) => error!("Rollback of coupon {} failed: {}", coupon.code, e),
            }
            return Err(dispatch_err);
        }

        self.tracker
            .update_customer_status(email, CustomerStatus::Sent, Some(&coupon.code))
            .await?;
        log_email_sent(&self.db_pool, email, &coupon.code).await?;

        info!("✓ Discount {} sent to {}", coupon.code, email);
        Ok(coupon)
    }

    /// Sends a rendered email with placeholder data. No coupon is created
    /// and the ledger is not touched.
    pub async fn send_test_email(&self, email: &str) -> Result<(), DiscountError> {
        if !is_valid_email(email) {
            return Err(DiscountError::InvalidEmail(email.to_string()));
        }
        self.mailer.send_test_email(email).await
    }
}
