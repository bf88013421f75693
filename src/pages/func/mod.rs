mod amc;
mod dashboard;
mod report;
mod service;
use axum::Router;

mod customer;

pub use amc::Amc;
pub use service::Service;

pub fn func_router() -> Router {
    customer::customer_router()
        .merge(amc::amc_router())
        .merge(service::service_router())
        .merge(dashboard::dashboard_router())
        .merge(report::report_router())
}
