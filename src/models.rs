use serde::{Deserialize, Serialize};

use crate::{
    config::Config, coupons::CouponIssuer, database::DbPool, eligibility::EligibilityChecker,
    tracker::CustomerTracker,
};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Lifecycle state of a tracked customer. `pending → sent` is driven by
/// the issuance workflow; `used`/`expired` are observed from the coupon
/// store, not written by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Pending,
    Sent,
    Used,
    Expired,
}

impl CustomerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomerStatus::Pending => "pending",
            CustomerStatus::Sent => "sent",
            CustomerStatus::Used => "used",
            CustomerStatus::Expired => "expired",
        }
    }

}

impl std::str::FromStr for CustomerStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CustomerStatus::Pending),
            "sent" => Ok(CustomerStatus::Sent),
            "used" => Ok(CustomerStatus::Used),
            "expired" => Ok(CustomerStatus::Expired),
            other => Err(format!("unknown customer status: {}", other)),
        }
    }
}

impl std::fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Syntactic email check used before any coupon or ledger write.
pub fn is_valid_email(email: &str) -> bool {
    regex::Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

pub struct CliApp {
    pub config: Config,
    pub db_pool: DbPool,
    pub tracker: CustomerTracker,
    pub issuer: CouponIssuer,
    pub checker: EligibilityChecker,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("jane.doe+promo@shop.example.co"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("two words@x.com"));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            CustomerStatus::Pending,
            CustomerStatus::Sent,
            CustomerStatus::Used,
            CustomerStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<CustomerStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<CustomerStatus>().is_err());
    }
}
