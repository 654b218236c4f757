use dialoguer::{theme::ColorfulTheme, Select};

use crate::{
    cli::cli::{MenuAction, Result},
    models::CliApp,
};
use tracing::error;

impl CliApp {
    pub async fn run(&self) -> Result<()> {
        println!("\n🎟️  Welcome Coupon Manager");
        println!("═══════════════════════════════════════");

        // Show where things stand before the first prompt
        self.show_statistics().await?;

        loop {
            let actions = vec![
                MenuAction::ListCustomers,
                MenuAction::SendDiscount,
                MenuAction::SendTestEmail,
                MenuAction::ShowStatistics,
                MenuAction::RunCleanup,
                MenuAction::StartApiServer,
                MenuAction::Exit,
            ];

            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("\nSelect an action")
                .default(0)
                .items(&actions)
                .interact()?;

            match &actions[selection] {
                MenuAction::ListCustomers => {
                    if let Err(e) = self.run_list_customers().await {
                        error!("Customer listing failed: {}", e);
                    }
                }
                MenuAction::SendDiscount => {
                    if let Err(e) = self.run_send_discount().await {
                        error!("Discount send failed: {}", e);
                    }
                }
                MenuAction::SendTestEmail => {
                    if let Err(e) = self.run_send_test_email().await {
                        error!("Test email failed: {}", e);
                    }
                }
                MenuAction::ShowStatistics => {
                    if let Err(e) = self.show_statistics().await {
                        error!("Failed to show statistics: {}", e);
                    }
                }
                MenuAction::RunCleanup => {
                    if let Err(e) = self.run_cleanup().await {
                        error!("Cleanup failed: {}", e);
                    }
                }
                MenuAction::StartApiServer => {
                    if let Err(e) = self.run_server().await {
                        error!("API server failed: {}", e);
                    }
                }
                MenuAction::Exit => {
                    println!("\n👋 Bye!");
                    break;
                }
            }
        }

        Ok(())
    }
}
