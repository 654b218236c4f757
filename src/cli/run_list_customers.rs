use dialoguer::{theme::ColorfulTheme, Confirm, Input};

use crate::cli::cli::Result;
use crate::models::CliApp;
use crate::tracker::CustomerFilter;

impl CliApp {
    pub async fn run_list_customers(&self) -> Result<()> {
        println!("\n👥 Recent Customers");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let days: u32 = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Look back how many days?")
            .default(30)
            .interact_text()?;

        let only_new = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("Show only customers eligible for the discount?")
            .default(false)
            .interact()?;

        let filter = CustomerFilter {
            days,
            only_new,
            ..CustomerFilter::default()
        };

        let customers = self.tracker.get_customers(&filter, &self.checker).await?;

        if customers.is_empty() {
            println!("No customers found in the last {} days.", days);
            return Ok(());
        }

        println!(
            "\n{} customer(s) in the last {} days:",
            customers.len(),
            days
        );
        for customer in &customers {
            let name = match (&customer.first_name, &customer.last_name) {
                (Some(first), Some(last)) => format!("{} {}", first, last),
                (Some(first), None) => first.clone(),
                _ => "-".to_string(),
            };
            let status = customer
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "untracked".to_string());
            let coupon = customer.coupon_code.as_deref().unwrap_or("-");

            println!(
                "  • {} ({}): {} order(s), last {}, status: {}, coupon: {}",
                customer.email, name, customer.order_count, customer.last_order_at, status, coupon
            );
        }

        Ok(())
    }
}
