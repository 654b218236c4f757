// src/server/routes.rs

pub mod health {
    use crate::server::ServerState;
    use rocket::{get, serde::json::Json, State};
    use serde_json::{json, Value};

    #[get("/health")]
    pub async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "service": "welcome-coupon-api"
        }))
    }

    #[get("/")]
    pub async fn index(state: &State<ServerState>) -> Json<Value> {
        Json(json!({
            "name": "Welcome Coupon API",
            "version": "0.1.0",
            "shop": state.config.email.shop_name,
            "endpoints": {
                "health": "/api/health",
                "stats": "/api/stats",
                "customers": "/api/customers",
                "coupons": "/api/coupons/<code>",
                "discounts": "/api/discounts",
                "test_email": "/api/discounts/test"
            }
        }))
    }
}
