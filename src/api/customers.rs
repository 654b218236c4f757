// src/api/customers.rs
use crate::api::stats::ApiResponse;
use crate::models::CustomerStatus;
use crate::server::ServerState;
use crate::tracker::{CustomerFilter, CustomerOverview};
use rocket::{get, serde::json::Json, State};

#[get("/customers?<days>&<status>&<only_new>")]
pub async fn get_customers(
    state: &State<ServerState>,
    days: Option<u32>,
    status: Option<String>,
    only_new: Option<bool>,
) -> Json<ApiResponse<Vec<CustomerOverview>>> {
    let status = match status {
        Some(raw) => match raw.parse::<CustomerStatus>() {
            Ok(status) => Some(status),
            Err(e) => return Json(ApiResponse::error(e)),
        },
        None => None,
    };

    let filter = CustomerFilter {
        days: days.unwrap_or(30),
        status,
        only_new: only_new.unwrap_or(false),
        ..CustomerFilter::default()
    };

    match state.tracker.get_customers(&filter, &state.checker).await {
        Ok(customers) => Json(ApiResponse::success(customers)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}
