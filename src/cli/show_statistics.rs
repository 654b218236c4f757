use crate::cli::cli::Result;
use crate::email_sender::get_email_statistics;
use crate::models::CliApp;

impl CliApp {
    pub async fn show_statistics(&self) -> Result<()> {
        println!("\n📊 Statistics");
        println!("━━━━━━━━━━━━━━━━━━━━━━━━━━");

        let customers = self.tracker.get_statistics().await?;
        println!("👥 Tracked customers: {}", customers.total);
        println!("  ⏳ Pending: {}", customers.pending);
        println!("  📨 Sent: {}", customers.sent);
        println!("  ✅ Used: {}", customers.used);
        println!("  ⌛ Expired: {}", customers.expired);

        let coupons = self.issuer.get_statistics().await?;
        println!("\n🎟️  Issued coupons: {}", coupons.total);
        println!("  🟢 Active: {}", coupons.active);
        println!("  ✅ Redeemed: {}", coupons.used);
        println!("  ⌛ Expired: {}", coupons.expired);
        println!("  🗑️  Deactivated: {}", coupons.deactivated);

        if coupons.total > 0 {
            let redemption_rate = (coupons.used * 100) / coupons.total;
            println!("  📈 Redemption rate: {}%", redemption_rate);
        }

        let emails = get_email_statistics(&self.db_pool).await?;
        println!("\n📧 Emails sent: {}", emails.total_sent);
        println!("  👤 Distinct recipients: {}", emails.unique_recipients);
        if let Some(last) = &emails.last_sent_at {
            println!("  🕐 Last sent: {}", last);
        }

        let recent = self.issuer.get_generated_coupons(5).await?;
        if !recent.is_empty() {
            println!("\n🧾 Latest coupons:");
            for coupon in &recent {
                println!(
                    "  • {} → {} ({})",
                    coupon.code, coupon.email, coupon.status.message
                );
            }
        }

        Ok(())
    }
}
