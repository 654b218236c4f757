// src/server/mod.rs
use crate::api::*;
use crate::config::Config;
use crate::coupons::CouponIssuer;
use crate::database::DbPool;
use crate::eligibility::EligibilityChecker;
use crate::issuance::DiscountService;
use crate::tracker::CustomerTracker;
use rocket::{routes, Build, Rocket};

pub mod routes;

pub struct ServerState {
    pub config: Config,
    pub db_pool: DbPool,
    pub tracker: CustomerTracker,
    pub issuer: CouponIssuer,
    pub checker: EligibilityChecker,
    pub service: DiscountService,
}

pub fn build_rocket(state: ServerState) -> Rocket<Build> {
    rocket::build().manage(state).mount(
        "/api",
        routes![
            // Health and info endpoints
            routes::health::health_check,
            routes::health::index,
            // Stats
            get_stats,
            // Customers
            get_customers,
            // Discounts and coupons
            send_discount,
            send_test_email,
            get_coupon,
        ],
    )
}
