use crate::cli::cli::Result;
use crate::models::CliApp;
use crate::server::{build_rocket, ServerState};

impl CliApp {
    pub async fn run_server(&self) -> Result<()> {
        println!("\n🌐 Starting API server (Ctrl+C to stop)...");

        let state = ServerState {
            config: self.config.clone(),
            db_pool: self.db_pool.clone(),
            tracker: self.tracker.clone(),
            issuer: self.issuer.clone(),
            checker: self.checker.clone(),
            service: self.discount_service().await?,
        };

        build_rocket(state).launch().await?;
        Ok(())
    }
}
