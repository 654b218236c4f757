use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub eligibility: EligibilityConfig,
    pub code_format: CodeFormatConfig,
    pub coupon: CouponConfig,
    pub email: EmailConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub tracking_table: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Rules deciding whether a customer counts as new. Loaded once and passed
/// into the eligibility checker; there is no per-call fallback logic.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EligibilityConfig {
    /// Orders placed strictly before this instant count as prior orders.
    #[serde(deserialize_with = "deserialize_date")]
    pub cutoff_date: DateTime<Utc>,

    /// A customer with more than this many prior orders is not new.
    pub max_prior_orders: u32,

    /// Restrict the prior-order count to the last N days. Absent = all-time.
    #[serde(default)]
    pub lookback_days: Option<u32>,

    /// Orders below this total are ignored. Zero disables the check.
    #[serde(default)]
    pub min_order_amount: f64,

    /// Orders composed solely of these categories are ignored.
    #[serde(default)]
    pub excluded_category_ids: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CharacterSet {
    Digits,
    Uppercase,
    Lowercase,
}

impl CharacterSet {
    pub fn chars(self) -> &'static str {
        match self {
            CharacterSet::Digits => "0123456789",
            CharacterSet::Uppercase => "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
            CharacterSet::Lowercase => "abcdefghijklmnopqrstuvwxyz",
        }
    }
}

/// Shape of generated coupon codes: prefix + `code_length` characters
/// drawn from the union of the selected character sets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodeFormatConfig {
    pub prefix: String,
    pub code_length: usize,
    pub character_sets: Vec<CharacterSet>,
}

impl CodeFormatConfig {
    pub const MIN_CODE_LENGTH: usize = 4;
    pub const MAX_CODE_LENGTH: usize = 12;
    pub const MAX_PREFIX_LENGTH: usize = 5;

    /// The concrete alphabet codes are drawn from. An empty character-set
    /// selection falls back to digits + uppercase.
    pub fn alphabet(&self) -> String {
        let mut alphabet = String::new();
        for set in &self.character_sets {
            for c in set.chars().chars() {
                if !alphabet.contains(c) {
                    alphabet.push(c);
                }
            }
        }
        if alphabet.is_empty() {
            alphabet.push_str(CharacterSet::Digits.chars());
            alphabet.push_str(CharacterSet::Uppercase.chars());
        }
        alphabet
    }

    fn normalize(&mut self) {
        if self.prefix.chars().count() > Self::MAX_PREFIX_LENGTH {
            warn!(
                "Code prefix '{}' longer than {} chars, truncating",
                self.prefix,
                Self::MAX_PREFIX_LENGTH
            );
            self.prefix = self.prefix.chars().take(Self::MAX_PREFIX_LENGTH).collect();
        }
        let clamped = self
            .code_length
            .clamp(Self::MIN_CODE_LENGTH, Self::MAX_CODE_LENGTH);
        if clamped != self.code_length {
            warn!(
                "Code length {} outside {}-{}, clamping to {}",
                self.code_length,
                Self::MIN_CODE_LENGTH,
                Self::MAX_CODE_LENGTH,
                clamped
            );
            self.code_length = clamped;
        }
        self.character_sets.dedup();
        if self.character_sets.is_empty() {
            warn!("No character sets configured, falling back to digits + uppercase");
            self.character_sets = vec![CharacterSet::Digits, CharacterSet::Uppercase];
        }
    }
}

/// Settings applied to every coupon the issuer creates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CouponConfig {
    pub discount_percent: u32,
    pub usage_limit: u32,
    pub expiry_days: u32,
    #[serde(default)]
    pub minimum_order_amount: Option<f64>,
    #[serde(default)]
    pub excluded_category_ids: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub shop_name: String,
    pub mailgun_domain: String,
    pub mailgun_base_url: String,
    /// Optional HTML template file overriding the built-in one.
    #[serde(default)]
    pub template_path: Option<String>,
    /// Optional logo image inlined into the email as a data URI.
    #[serde(default)]
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CleanupConfig {
    /// Terminal-state ledger rows older than this many days are pruned.
    pub retention_days: u32,
    pub interval_hours: u64,
}

// Custom deserializer for flexible date formats
fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;

    // Try full date format first (YYYY-MM-DD)
    if let Ok(naive_date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        if let Some(datetime) = naive_date.and_hms_opt(0, 0, 0) {
            return Ok(datetime.and_utc());
        }
    }

    // Try year-only format (YYYY) - defaults to January 1st
    if let Ok(year) = s.parse::<i32>() {
        if let Some(naive_date) = NaiveDate::from_ymd_opt(year, 1, 1) {
            if let Some(datetime) = naive_date.and_hms_opt(0, 0, 0) {
                return Ok(datetime.and_utc());
            }
        }
    }

    Err(serde::de::Error::custom(format!(
        "Invalid date format: {}",
        s
    )))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "data/shop.db".to_string(),
                tracking_table: "customer_discount_tracking".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            eligibility: EligibilityConfig {
                cutoff_date: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    .and_utc(),
                max_prior_orders: 0,
                lookback_days: None,
                min_order_amount: 0.0,
                excluded_category_ids: Vec::new(),
            },
            code_format: CodeFormatConfig {
                prefix: "NL".to_string(),
                code_length: 6,
                character_sets: vec![CharacterSet::Digits, CharacterSet::Uppercase],
            },
            coupon: CouponConfig {
                discount_percent: 20,
                usage_limit: 1,
                expiry_days: 30,
                minimum_order_amount: None,
                excluded_category_ids: Vec::new(),
            },
            email: EmailConfig {
                from_name: "Shop".to_string(),
                from_email: "shop@example.com".to_string(),
                subject: "Your personal new-customer discount".to_string(),
                shop_name: "Shop".to_string(),
                mailgun_domain: "mg.example.com".to_string(),
                mailgun_base_url: "https://api.mailgun.net/v3".to_string(),
                template_path: None,
                logo_path: None,
            },
            cleanup: CleanupConfig {
                retention_days: 365,
                interval_hours: 24,
            },
        }
    }
}

pub async fn load_config(
    path: &str,
) -> std::result::Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut config: Config = serde_yaml::from_str(&content)?;
    normalize(&mut config);
    Ok(config)
}

/// Applies the defaulting rules once at load time so downstream components
/// can trust the values as-is.
fn normalize(config: &mut Config) {
    config.code_format.normalize();

    if config.eligibility.max_prior_orders > 10 {
        warn!(
            "max_prior_orders {} above 10, clamping",
            config.eligibility.max_prior_orders
        );
        config.eligibility.max_prior_orders = 10;
    }
    if config.eligibility.min_order_amount < 0.0 {
        warn!("Negative min_order_amount, treating as disabled");
        config.eligibility.min_order_amount = 0.0;
    }
    if config.eligibility.lookback_days == Some(0) {
        config.eligibility.lookback_days = None;
    }
    if config.coupon.usage_limit == 0 {
        warn!("usage_limit 0 would make coupons unusable, forcing 1");
        config.coupon.usage_limit = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_valid_code_format() {
        let config = Config::default();
        assert_eq!(config.code_format.prefix, "NL");
        assert_eq!(config.code_format.alphabet().len(), 36);
    }

    #[test]
    fn normalize_clamps_code_format() {
        let mut config = Config::default();
        config.code_format.prefix = "WELCOME".to_string();
        config.code_format.code_length = 20;
        config.code_format.character_sets.clear();
        normalize(&mut config);

        assert_eq!(config.code_format.prefix, "WELCO");
        assert_eq!(config.code_format.code_length, 12);
        assert_eq!(
            config.code_format.character_sets,
            vec![CharacterSet::Digits, CharacterSet::Uppercase]
        );
    }

    #[test]
    fn normalize_clamps_eligibility_bounds() {
        let mut config = Config::default();
        config.eligibility.max_prior_orders = 50;
        config.eligibility.min_order_amount = -5.0;
        config.eligibility.lookback_days = Some(0);
        normalize(&mut config);

        assert_eq!(config.eligibility.max_prior_orders, 10);
        assert_eq!(config.eligibility.min_order_amount, 0.0);
        assert_eq!(config.eligibility.lookback_days, None);
    }

    #[test]
    fn cutoff_date_accepts_full_date_and_year() {
        let yaml = "cutoff_date: \"2024-06-15\"\nmax_prior_orders: 1\n";
        let parsed: EligibilityConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            parsed.cutoff_date.format("%Y-%m-%d").to_string(),
            "2024-06-15"
        );

        let yaml = "cutoff_date: \"2023\"\nmax_prior_orders: 0\n";
        let parsed: EligibilityConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            parsed.cutoff_date.format("%Y-%m-%d").to_string(),
            "2023-01-01"
        );
    }

    #[test]
    fn empty_character_sets_fall_back_to_digits_uppercase() {
        let format = CodeFormatConfig {
            prefix: "NL".to_string(),
            code_length: 6,
            character_sets: Vec::new(),
        };
        let alphabet = format.alphabet();
        assert!(alphabet.contains('0'));
        assert!(alphabet.contains('Z'));
        assert!(!alphabet.contains('a'));
    }
}
