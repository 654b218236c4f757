// src/email_sender/mod.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::config::EmailConfig;
use crate::database::DbPool;
use crate::error::DiscountError;

pub mod logo;
pub mod template;

use template::{render, validate_template, TemplateData, DEFAULT_TEMPLATE};

/// Everything needed to address and personalize one discount email.
#[derive(Debug, Clone, Serialize)]
pub struct DiscountRecipient {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub coupon_code: String,
    pub discount_percent: u32,
    pub expiry_date: DateTime<Utc>,
}

/// Outbound mail seam of the issuance workflow. The workflow only knows
/// this trait; the concrete transport lives behind it.
#[async_trait]
pub trait DiscountMailer: Send + Sync {
    async fn send_discount_email(&self, recipient: &DiscountRecipient) -> Result<(), DiscountError>;

    async fn send_test_email(&self, email: &str) -> Result<(), DiscountError>;
}

#[derive(Debug, Deserialize)]
pub struct MailgunResponse {
    pub id: String,
    pub message: String,
}

pub struct MailgunSender {
    email: EmailConfig,
    api_key: String,
    template: String,
    logo_data_uri: Option<String>,
    client: Client,
}

impl MailgunSender {
    /// Builds the sender from the email config plus the `MAILGUN_API_KEY`
    /// environment variable. Loads and validates the template (file
    /// override or built-in) and the optional logo up front.
    pub async fn from_env(
        email: EmailConfig,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let api_key = std::env::var("MAILGUN_API_KEY")
            .map_err(|_| "MAILGUN_API_KEY environment variable required")?;

        let template = match &email.template_path {
            Some(path) => tokio::fs::read_to_string(path).await?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        validate_template(&template)?;

        let logo_data_uri = logo::load_logo_data_uri(email.logo_path.as_deref()).await;

        debug!("Created MailgunSender for domain: {}", email.mailgun_domain);
        Ok(Self {
            email,
            api_key,
            template,
            logo_data_uri,
            client: Client::new(),
        })
    }

    fn render_body(&self, data: &TemplateData) -> String {
        render(&self.template, data)
    }

    async fn post_message(
        &self,
        to: String,
        subject: &str,
        html: String,
    ) -> Result<(), DiscountError> {
        let url = format!(
            "{}/{}/messages",
            self.email.mailgun_base_url, self.email.mailgun_domain
        );

        let mut form_data = HashMap::new();
        form_data.insert(
            "from",
            format!("{} <{}>", self.email.from_name, self.email.from_email),
        );
        form_data.insert("to", to);
        form_data.insert("subject", subject.to_string());
        form_data.insert("html", html);
        form_data.insert("o:tracking", "yes".to_string());
        form_data.insert("o:tracking-opens", "yes".to_string());

        debug!("Sending POST request to: {}", url);

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .form(&form_data)
            .send()
            .await
            .map_err(|e| DiscountError::EmailDispatchFailed(Box::new(e)))?;

        debug!("Mailgun response status: {}", response.status());

        if response.status().is_success() {
            if let Ok(mailgun_response) = response.json::<MailgunResponse>().await {
                debug!("Mailgun accepted message: {}", mailgun_response.id);
            }
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable Mailgun error body".to_string());
            error!("Mailgun API error: {}", error_text);
            Err(DiscountError::EmailDispatchFailed(error_text.into()))
        }
    }
}

#[async_trait]
impl DiscountMailer for MailgunSender {
    async fn send_discount_email(&self, recipient: &DiscountRecipient) -> Result<(), DiscountError> {
        let data = TemplateData {
            coupon_code: recipient.coupon_code.clone(),
            first_name: recipient.first_name.clone(),
            last_name: recipient.last_name.clone(),
            discount_percent: recipient.discount_percent,
            expiry_date: recipient.expiry_date.format("%Y-%m-%d").to_string(),
            shop_name: self.email.shop_name.clone(),
            logo_data_uri: self.logo_data_uri.clone(),
        };
        let html = self.render_body(&data);

        let to = if recipient.first_name.is_empty() {
            recipient.email.clone()
        } else {
            format!(
                "{} {} <{}>",
                recipient.first_name, recipient.last_name, recipient.email
            )
        };

        self.post_message(to, &self.email.subject, html).await?;
        info!("📧 Discount email sent to {}", recipient.email);
        Ok(())
    }

    async fn send_test_email(&self, email: &str) -> Result<(), DiscountError> {
        let data = TemplateData {
            coupon_code: "TESTCODE123".to_string(),
            first_name: "Test".to_string(),
            last_name: "Customer".to_string(),
            discount_percent: 20,
            expiry_date: (Utc::now() + chrono::Duration::days(30))
                .format("%Y-%m-%d")
                .to_string(),
            shop_name: self.email.shop_name.clone(),
            logo_data_uri: self.logo_data_uri.clone(),
        };
        let html = self.render_body(&data);
        let subject = format!("[TEST] {}", self.email.subject);

        self.post_message(email.to_string(), &subject, html).await?;
        info!("📧 Test email sent to {}", email);
        Ok(())
    }
}

// Dispatch log kept alongside the ledger so the statistics surface can
// report send history without asking Mailgun.

#[derive(Debug, Clone, Serialize)]
pub struct EmailLogEntry {
    pub email: String,
    pub coupon_code: String,
    pub sent_at: String,
    pub status: String,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct EmailStatistics {
    pub total_sent: i64,
    pub unique_recipients: i64,
    pub last_sent_at: Option<String>,
}

pub async fn log_email_sent(
    pool: &DbPool,
    email: &str,
    coupon_code: &str,
) -> Result<(), DiscountError> {
    let conn = pool.get().await?;
    conn.execute(
        "INSERT INTO email_log (email, coupon_code, sent_at, status) VALUES (?1, ?2, ?3, 'sent')",
        rusqlite::params![email, coupon_code, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub async fn get_email_logs(pool: &DbPool, limit: i64) -> Result<Vec<EmailLogEntry>, DiscountError> {
    let conn = pool.get().await?;
    let mut stmt = conn.prepare(
        "SELECT email, coupon_code, sent_at, status FROM email_log \
         ORDER BY sent_at DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        Ok(EmailLogEntry {
            email: row.get(0)?,
            coupon_code: row.get(1)?,
            sent_at: row.get(2)?,
            status: row.get(3)?,
        })
    })?;

    let mut logs = Vec::new();
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

pub async fn get_email_statistics(pool: &DbPool) -> Result<EmailStatistics, DiscountError> {
    let conn = pool.get().await?;

    let (total_sent, unique_recipients, last_sent_at) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT email), MAX(sent_at) FROM email_log",
        [],
        |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        },
    )?;

    Ok(EmailStatistics {
        total_sent,
        unique_recipients,
        last_sent_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_db_pool;

    #[tokio::test]
    async fn email_log_round_trip_and_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        let pool = create_db_pool(path.to_str().unwrap()).await.unwrap();

        let stats = get_email_statistics(&pool).await.unwrap();
        assert_eq!(stats.total_sent, 0);
        assert!(stats.last_sent_at.is_none());

        log_email_sent(&pool, "jane@x.com", "NL111111").await.unwrap();
        log_email_sent(&pool, "jane@x.com", "NL222222").await.unwrap();
        log_email_sent(&pool, "mark@x.com", "NL333333").await.unwrap();

        let logs = get_email_logs(&pool, 10).await.unwrap();
        assert_eq!(logs.len(), 3);

        let stats = get_email_statistics(&pool).await.unwrap();
        assert_eq!(stats.total_sent, 3);
        assert_eq!(stats.unique_recipients, 2);
        assert!(stats.last_sent_at.is_some());
    }
}
