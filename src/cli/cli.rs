use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::coupons::CouponIssuer;
use crate::database::DbPool;
use crate::eligibility::EligibilityChecker;
use crate::email_sender::{DiscountMailer, MailgunSender};
use crate::issuance::DiscountService;
use crate::models::CliApp;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Debug, Clone)]
pub enum MenuAction {
    ListCustomers,
    SendDiscount,
    SendTestEmail,
    ShowStatistics,
    RunCleanup,
    StartApiServer,
    Exit,
}

impl std::fmt::Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MenuAction::ListCustomers => {
                write!(f, "👥 List recent customers")
            }
            MenuAction::SendDiscount => {
                write!(f, "🎟️  Send discount coupon to a customer")
            }
            MenuAction::SendTestEmail => {
                write!(f, "📧 Send a test email")
            }
            MenuAction::ShowStatistics => write!(f, "📊 Show statistics"),
            MenuAction::RunCleanup => write!(f, "🧹 Prune old ledger entries now"),
            MenuAction::StartApiServer => write!(f, "🌐 Start the API server"),
            MenuAction::Exit => write!(f, "🚪 Exit"),
        }
    }
}

impl CliApp {
    pub async fn new(config: Config, db_pool: DbPool) -> Result<Self> {
        let tracker = crate::tracker::CustomerTracker::new(
            db_pool.clone(),
            config.database.tracking_table.clone(),
            config.cleanup.retention_days,
        );
        tracker.ensure_table().await?;

        let checker = EligibilityChecker::new(db_pool.clone(), config.eligibility.clone());
        let issuer = CouponIssuer::new(
            db_pool.clone(),
            config.code_format.clone(),
            config.coupon.clone(),
        );

        info!(
            "Tracking table '{}', coupon prefix '{}'",
            config.database.tracking_table, config.code_format.prefix
        );

        Ok(Self {
            config,
            db_pool,
            tracker,
            issuer,
            checker,
        })
    }

    /// Wires the issuance workflow together. The Mailgun credentials come
    /// from the environment, so this is built on demand by the actions
    /// that actually send email.
    pub async fn discount_service(&self) -> Result<DiscountService> {
        let sender = MailgunSender::from_env(self.config.email.clone()).await?;
        Ok(DiscountService::new(
            self.checker.clone(),
            self.issuer.clone(),
            self.tracker.clone(),
            Arc::new(sender) as Arc<dyn DiscountMailer>,
            self.db_pool.clone(),
        ))
    }
}
