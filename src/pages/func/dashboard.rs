use axum::{http::HeaderMap, routing::get, Router};
use chrono::{Days, TimeZone};
use mysql::{prelude::Queryable, PooledConn};
use mysql_common::prelude::FromRow;
use serde::Serialize;
use serde_json::json;

use crate::{
    bearer,
    database::get_conn,
    libs::{
        dser::serialize_null_to_default,
        time::{TimeFormat, TIME},
    },
    parse_jwt_macro, Response, ResponseResult,
};

pub fn dashboard_router() -> Router {
    Router::new()
        .route("/dashboard/metrics", get(metrics))
        .route("/dashboard/pending-services", get(pending_services))
}

pub fn count(conn: &mut PooledConn, query: &str) -> Result<i64, Response> {
    Ok(conn.query_first(query)?.unwrap_or(0))
}

/// 近 7/30 天按工单创建时间统计，不看服务日期
async fn metrics(headers: HeaderMap) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    parse_jwt_macro!(&bearer, &mut conn);
    let total_customers = count(&mut conn, "SELECT COUNT(*) FROM customer")?;
    let recurring_customers = count(
        &mut conn,
        "SELECT COUNT(*) FROM customer WHERE is_recurring = 1",
    )?;
    let pending_services = count(
        &mut conn,
        "SELECT COUNT(*) FROM service WHERE status = 'pending'",
    )?;
    let completed_services = count(
        &mut conn,
        "SELECT COUNT(*) FROM service WHERE status = 'completed'",
    )?;
    let amc_due = count(
        &mut conn,
        "SELECT COUNT(*) FROM amc WHERE is_due = 1 AND is_active = 1",
    )?;
    let active_amcs = count(&mut conn, "SELECT COUNT(*) FROM amc WHERE is_active = 1")?;

    let time = TIME::now()?;
    let local = chrono::Local.timestamp_nanos(time.naos() as i64);
    let week_ago = op::some!(local.checked_sub_days(Days::new(7));
        ret Err(Response::internal_server_error("时间计算失败")));
    let month_ago = op::some!(local.checked_sub_days(Days::new(30));
        ret Err(Response::internal_server_error("时间计算失败")));
    let weekly_services = count(
        &mut conn,
        &format!(
            "SELECT COUNT(*) FROM service WHERE create_time >= '{}'",
            TIME::from(week_ago).format(TimeFormat::YYYYMMDD)
        ),
    )?;
    let monthly_services = count(
        &mut conn,
        &format!(
            "SELECT COUNT(*) FROM service WHERE create_time >= '{}'",
            TIME::from(month_ago).format(TimeFormat::YYYYMMDD)
        ),
    )?;
    Ok(Response::ok(json!({
        "totalCustomers": total_customers,
        "recurringCustomers": recurring_customers,
        "pendingServices": pending_services,
        "completedServices": completed_services,
        "amcDue": amc_due,
        "activeAMCs": active_amcs,
        "weeklyServices": weekly_services,
        "monthlyServices": monthly_services
    })))
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct PendingRow {
    id: String,
    #[serde(rename = "customerId")]
    customer: String,
    customer_name: String,
    mobile: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    employee_name: Option<String>,
    #[serde(rename = "serviceType")]
    ty: String,
    service_date: String,
}

async fn pending_services(headers: HeaderMap) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    parse_jwt_macro!(&bearer, &mut conn);
    let list: Vec<PendingRow> = conn.query_map(
        "SELECT s.id, s.customer, c.name AS customer_name, c.mobile,
        u.name AS employee_name, s.ty, s.service_date
        FROM service s
        JOIN customer c ON c.id = s.customer
        LEFT JOIN user u ON u.id = s.employee
        WHERE s.status = 'pending' ORDER BY s.service_date",
        |r| r,
    )?;
    Ok(Response::ok(json!(list)))
}
