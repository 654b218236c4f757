// src/api/discounts.rs
use crate::api::stats::ApiResponse;
use crate::coupons::{CouponStatus, IssuedCoupon};
use crate::server::ServerState;
use rocket::{get, post, serde::json::Json, State};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct SendDiscountRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Deserialize)]
pub struct TestEmailRequest {
    pub email: String,
}

/// Runs the full issuance workflow for one customer.
#[post("/discounts", data = "<request>")]
pub async fn send_discount(
    state: &State<ServerState>,
    request: Json<SendDiscountRequest>,
) -> Json<ApiResponse<IssuedCoupon>> {
    match state
        .service
        .send_discount(&request.email, &request.first_name, &request.last_name)
        .await
    {
        Ok(coupon) => Json(ApiResponse::success(coupon)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

/// Sends the discount template with placeholder data; no coupon, no
/// ledger write.
#[post("/discounts/test", data = "<request>")]
pub async fn send_test_email(
    state: &State<ServerState>,
    request: Json<TestEmailRequest>,
) -> Json<ApiResponse<String>> {
    match state.service.send_test_email(&request.email).await {
        Ok(()) => Json(ApiResponse::success(format!(
            "Test email sent to {}",
            request.email
        ))),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

/// Authoritative redemption state comes from the coupon store, not the
/// ledger.
#[get("/coupons/<code>")]
pub async fn get_coupon(
    state: &State<ServerState>,
    code: &str,
) -> Json<ApiResponse<CouponStatus>> {
    match state.issuer.get_coupon_status(code).await {
        Ok(status) => Json(ApiResponse::success(status)),
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}
