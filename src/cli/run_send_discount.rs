use dialoguer::{theme::ColorfulTheme, Confirm, Input};
use tracing::info;

use crate::cli::cli::Result;
use crate::models::{is_valid_email, CliApp};

impl CliApp {
    pub async fn run_send_discount(&self) -> Result<()> {
        println!("\n🎟️  Send Discount Coupon");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let email: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Customer email")
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                if is_valid_email(input) {
                    Ok(())
                } else {
                    Err("Please enter a valid email address")
                }
            })
            .interact_text()?;

        let first_name: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("First name")
            .allow_empty(true)
            .interact_text()?;

        let last_name: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Last name")
            .allow_empty(true)
            .interact_text()?;

        if self.checker.is_new_customer(&email).await? {
            println!("✅ {} qualifies as a new customer", email);
        } else {
            println!("⚠️  {} does NOT qualify as a new customer", email);
        }

        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Send a discount coupon to {}?", email))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }

        let service = self.discount_service().await?;
        match service.send_discount(&email, &first_name, &last_name).await {
            Ok(coupon) => {
                info!("Issued coupon {} to {}", coupon.code, email);
                println!(
                    "✅ Coupon {} ({}% off, valid until {}) sent to {}",
                    coupon.code,
                    coupon.discount_percent,
                    coupon.expiry_date.format("%Y-%m-%d"),
                    email
                );
            }
            Err(e) => {
                println!("❌ {}", e);
            }
        }

        Ok(())
    }
}
