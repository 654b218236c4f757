use crate::cli::cli::Result;
use crate::models::CliApp;

impl CliApp {
    pub async fn run_cleanup(&self) -> Result<()> {
        println!("\n🧹 Pruning old ledger entries...");

        let deleted = self.tracker.cleanup_old_entries().await?;
        println!(
            "Removed {} used/expired entries older than {} days.",
            deleted, self.config.cleanup.retention_days
        );

        Ok(())
    }
}
