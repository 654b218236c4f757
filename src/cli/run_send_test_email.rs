use dialoguer::{theme::ColorfulTheme, Input};

use crate::cli::cli::Result;
use crate::models::{is_valid_email, CliApp};

impl CliApp {
    pub async fn run_send_test_email(&self) -> Result<()> {
        println!("\n📧 Send Test Email");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━");
        println!("Sends the discount template with placeholder data. No coupon is created.");

        let email: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Recipient email")
            .validate_with(|input: &String| -> std::result::Result<(), &str> {
                if is_valid_email(input) {
                    Ok(())
                } else {
                    Err("Please enter a valid email address")
                }
            })
            .interact_text()?;

        let service = self.discount_service().await?;
        match service.send_test_email(&email).await {
            Ok(()) => println!("✅ Test email sent to {}", email),
            Err(e) => println!("❌ {}", e),
        }

        Ok(())
    }
}
