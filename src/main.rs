use std::fs::create_dir;

use amc_crm_rust::{Config, Response, MYSQL_URI};
use axum::{http::Method, routing::get, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
#[tokio::main]
async fn main() {
    _create_all_dir().unwrap();
    let setting = Config::read();
    unsafe {
        MYSQL_URI = setting.mysql_addr();
    }
    amc_crm_rust::database::create_table().unwrap();
    let router = Router::new()
        .merge(amc_crm_rust::pages::pages_router())
        .merge(amc_crm_rust::perm::perm_router())
        .route("/health", get(health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(Any),
        );
    axum::serve(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", setting.port()))
            .await
            .unwrap(),
        router,
    )
    .await
    .unwrap()
}

async fn health() -> Response {
    Response::ok(json!("Server is running"))
}

fn _create_all_dir() -> std::io::Result<()> {
    _create_dir("config")?;
    _create_dir("data")?;
    Ok(())
}
fn _create_dir(path: &str) -> std::io::Result<()> {
    match create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) => match e.kind() {
            std::io::ErrorKind::AlreadyExists => Ok(()),
            _ => Err(e),
        },
    }
}
