use axum::{
    routing::{get, post},
    Router,
};
use mysql_common::prelude::FromRow;
use serde::Serialize;

mod history;
mod index;

use crate::libs::dser::{serialize_i32_to_bool, serialize_null_to_default};

pub fn customer_router() -> Router {
    Router::new()
        .route(
            "/customers",
            post(index::insert_customer).get(index::query_customers),
        )
        .route(
            "/customers/:id",
            get(index::query_customer_by_id)
                .put(index::update_customer)
                .delete(index::delete_customer),
        )
        .route("/customers/:id/history", get(history::customer_history))
}

/// 客户数据
#[derive(Debug, Serialize, FromRow)]
#[mysql(table_name = "customer")]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub mobile: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub email: Option<String>,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub address: Option<String>,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub city: Option<String>,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub state: Option<String>,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub pincode: Option<String>,
    #[serde(serialize_with = "serialize_i32_to_bool")]
    pub is_recurring: i32,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub notes: Option<String>,
    pub create_time: String,
}
