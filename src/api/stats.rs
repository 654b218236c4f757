// src/api/stats.rs
use crate::coupons::CouponStatistics;
use crate::email_sender::{get_email_statistics, EmailStatistics};
use crate::server::ServerState;
use crate::tracker::CustomerStatistics;
use rocket::{get, serde::json::Json, State};
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

#[derive(Serialize)]
pub struct StatsOverview {
    pub customers: CustomerStatistics,
    pub coupons: CouponStatistics,
    pub emails: EmailStatistics,
}

#[get("/stats")]
pub async fn get_stats(state: &State<ServerState>) -> Json<ApiResponse<StatsOverview>> {
    let customers = match state.tracker.get_statistics().await {
        Ok(stats) => stats,
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };

    let coupons = match state.issuer.get_statistics().await {
        Ok(stats) => stats,
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };

    let emails = match get_email_statistics(&state.db_pool).await {
        Ok(stats) => stats,
        Err(e) => return Json(ApiResponse::error(e.to_string())),
    };

    Json(ApiResponse::success(StatsOverview {
        customers,
        coupons,
        emails,
    }))
}
