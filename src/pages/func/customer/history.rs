use axum::{extract::Path, http::HeaderMap};
use mysql::prelude::Queryable;
use serde_json::json;

use crate::{
    bearer,
    database::get_conn,
    pages::account::get_user,
    pages::func::{Amc, Service},
    parse_jwt_macro,
    perm::{action::CustomerGroup, verify_permissions},
    Response, ResponseResult,
};

/// 客户名下的全部服务与合同记录
pub async fn customer_history(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "customer", CustomerGroup::QUERY_HISTORY, None).await {
        return Err(Response::permission_denied());
    }
    let exist: Option<String> =
        conn.query_first(format!("SELECT id FROM customer WHERE id = '{id}'"))?;
    if exist.is_none() {
        return Err(Response::not_exist("客户不存在"));
    }
    let services: Vec<Service> = conn.query_map(
        format!("SELECT * FROM service WHERE customer = '{id}' ORDER BY service_date DESC"),
        |s| s,
    )?;
    let amcs: Vec<Amc> = conn.query_map(
        format!("SELECT * FROM amc WHERE customer = '{id}' ORDER BY start_date DESC"),
        |a| a,
    )?;
    Ok(Response::ok(json!({
        "services": services,
        "amcs": amcs
    })))
}
