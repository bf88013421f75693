use axum::{extract::Query, http::HeaderMap, routing::get, Router};
use mysql::{prelude::Queryable, PooledConn};
use mysql_common::prelude::FromRow;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    bearer,
    database::get_conn,
    libs::{
        dser::{parse_date, serialize_null_to_default},
        time::{TimeFormat, TIME},
    },
    pages::account::get_user,
    parse_jwt_macro,
    perm::{action::ReportGroup, verify_permissions},
    Response, ResponseResult,
};

use super::dashboard::count;

pub fn report_router() -> Router {
    Router::new()
        .route("/reports/summary", get(summary_report))
        .route("/reports/services", get(service_report))
        .route("/reports/amc", get(amc_report))
        .route("/reports/export", get(export_report))
}

/// count/total*100，保留两位小数。total 为 0 时直接返回 0
pub fn percentage(count: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 10000.0).round() / 100.0
}

/// 包含逗号、引号或换行的字段整体加引号，内部引号翻倍
pub fn csv_escape(field: &str) -> String {
    if field.contains(['"', ',', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn amc_status_label(is_due: i32, is_active: i32) -> &'static str {
    if is_due == 1 {
        "Due"
    } else if is_active == 1 {
        "Active"
    } else {
        "Inactive"
    }
}

/// 日期窗口过滤，闭区间
fn window_filter(
    column: &str,
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> Result<String, Response> {
    let mut filter = String::new();
    if let Some(from) = date_from.filter(|s| !s.is_empty()) {
        if parse_date(from).is_none() {
            return Err(Response::invalid_value("dateFrom格式错误"));
        }
        filter.push_str(&format!(" AND {column} >= '{from}'"));
    }
    if let Some(to) = date_to.filter(|s| !s.is_empty()) {
        if parse_date(to).is_none() {
            return Err(Response::invalid_value("dateTo格式错误"));
        }
        filter.push_str(&format!(" AND {column} <= '{to} 24:00:00'"));
    }
    Ok(filter)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WindowParams {
    date_from: Option<String>,
    date_to: Option<String>,
}

async fn summary_report(headers: HeaderMap, Query(params): Query<WindowParams>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "report", ReportGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let window = window_filter(
        "create_time",
        params.date_from.as_deref(),
        params.date_to.as_deref(),
    )?;
    let total_customers = count(&mut conn, "SELECT COUNT(*) FROM customer")?;
    let total_services = count(
        &mut conn,
        &format!("SELECT COUNT(*) FROM service WHERE 1=1{window}"),
    )?;
    let completed_services = count(
        &mut conn,
        &format!("SELECT COUNT(*) FROM service WHERE status = 'completed'{window}"),
    )?;
    let pending_services = count(
        &mut conn,
        &format!("SELECT COUNT(*) FROM service WHERE status = 'pending'{window}"),
    )?;
    let total_amcs = count(&mut conn, "SELECT COUNT(*) FROM amc")?;
    let active_amcs = count(&mut conn, "SELECT COUNT(*) FROM amc WHERE is_active = 1")?;
    let due_amcs = count(&mut conn, "SELECT COUNT(*) FROM amc WHERE is_due = 1")?;
    let time = TIME::now()?;
    Ok(Response::ok(json!({
        "totalCustomers": total_customers,
        "totalServices": total_services,
        "completedServices": completed_services,
        "pendingServices": pending_services,
        "completedPercentage": percentage(completed_services, total_services),
        "pendingPercentage": percentage(pending_services, total_services),
        "totalAMCs": total_amcs,
        "activeAMCs": active_amcs,
        "dueAMCs": due_amcs,
        "generatedAt": time.format(TimeFormat::YYYYMMDD_HHMMSS)
    })))
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct ServiceRow {
    #[serde(rename = "serviceId")]
    id: String,
    customer_name: String,
    mobile: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    employee_name: Option<String>,
    #[serde(rename = "serviceType")]
    ty: String,
    service_date: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    completed_date: Option<String>,
    status: String,
    amount: Option<f64>,
}

fn query_service_rows(conn: &mut PooledConn, filter: &str) -> Result<Vec<ServiceRow>, Response> {
    let rows = conn.query_map(
        format!(
            "SELECT s.id, c.name AS customer_name, c.mobile, u.name AS employee_name,
            s.ty, s.service_date, s.completed_date, s.status, s.amount
            FROM service s
            JOIN customer c ON c.id = s.customer
            LEFT JOIN user u ON u.id = s.employee
            WHERE {filter}"
        ),
        |r| r,
    )?;
    Ok(rows)
}

#[derive(Debug, FromRow)]
struct AmcRow {
    customer: String,
    customer_name: String,
    mobile: String,
    amc_name: String,
    start_date: String,
    end_date: String,
    renewal_date: Option<String>,
    amc_value: f64,
    is_active: i32,
    is_due: i32,
}

fn query_amc_rows(conn: &mut PooledConn, filter: &str) -> Result<Vec<AmcRow>, Response> {
    let rows = conn.query_map(
        format!(
            "SELECT a.customer, c.name AS customer_name, c.mobile, a.amc_name,
            a.start_date, a.end_date, a.renewal_date, a.amc_value, a.is_active, a.is_due
            FROM amc a JOIN customer c ON c.id = a.customer
            WHERE {filter}"
        ),
        |r| r,
    )?;
    Ok(rows)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceReportParams {
    employee_id: Option<String>,
    customer_id: Option<String>,
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

async fn service_report(
    headers: HeaderMap,
    Query(params): Query<ServiceReportParams>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "report", ReportGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let mut filter = "1=1".to_string();
    if let Some(employee) = params.employee_id.as_deref().filter(|s| !s.is_empty()) {
        filter.push_str(&format!(" AND s.employee = '{employee}'"));
    }
    if let Some(customer) = params.customer_id.as_deref().filter(|s| !s.is_empty()) {
        filter.push_str(&format!(" AND s.customer = '{customer}'"));
    }
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        filter.push_str(&format!(" AND s.status = '{status}'"));
    }
    filter.push_str(&window_filter(
        "s.service_date",
        params.date_from.as_deref(),
        params.date_to.as_deref(),
    )?);
    let rows = query_service_rows(&mut conn, &filter)?;
    let total = rows.len();
    Ok(Response::ok(json!({
        "rows": rows,
        "total": total
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmcReportParams {
    customer_id: Option<String>,
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

fn amc_report_filter(params: &AmcReportParams) -> Result<String, Response> {
    let mut filter = "1=1".to_string();
    if let Some(customer) = params.customer_id.as_deref().filter(|s| !s.is_empty()) {
        filter.push_str(&format!(" AND a.customer = '{customer}'"));
    }
    match params.status.as_deref() {
        Some("due") => filter.push_str(" AND a.is_due = 1"),
        Some("active") => filter.push_str(" AND a.is_active = 1"),
        Some("") | None => (),
        Some(s) => return Err(Response::invalid_value(format!("status的值非法: {s}"))),
    }
    filter.push_str(&window_filter(
        "a.end_date",
        params.date_from.as_deref(),
        params.date_to.as_deref(),
    )?);
    Ok(filter)
}

async fn amc_report(headers: HeaderMap, Query(params): Query<AmcReportParams>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "report", ReportGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let filter = amc_report_filter(&params)?;
    let rows = query_amc_rows(&mut conn, &filter)?;
    let total = rows.len();
    let rows: Vec<_> = rows
        .into_iter()
        .map(|r| {
            json!({
                "customerId": r.customer,
                "customerName": r.customer_name,
                "mobile": r.mobile,
                "amcName": r.amc_name,
                "startDate": r.start_date,
                "endDate": r.end_date,
                "renewalDate": r.renewal_date.unwrap_or_default(),
                "amcValue": r.amc_value,
                "status": amc_status_label(r.is_due, r.is_active)
            })
        })
        .collect();
    Ok(Response::ok(json!({
        "rows": rows,
        "total": total
    })))
}

fn services_csv(rows: &[ServiceRow]) -> String {
    let mut csv =
        String::from("Service ID,Customer Name,Mobile,Employee,Type,Service Date,Status,Amount\n");
    for r in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            csv_escape(&r.id),
            csv_escape(&r.customer_name),
            csv_escape(&r.mobile),
            csv_escape(r.employee_name.as_deref().unwrap_or("Not Assigned")),
            csv_escape(&r.ty),
            csv_escape(&r.service_date),
            csv_escape(&r.status),
            r.amount.unwrap_or(0.0)
        ));
    }
    csv
}

fn amcs_csv(rows: &[AmcRow]) -> String {
    let mut csv = String::from("Customer Name,Mobile,AMC Name,Start Date,End Date,Value,Status\n");
    for r in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            csv_escape(&r.customer_name),
            csv_escape(&r.mobile),
            csv_escape(&r.amc_name),
            csv_escape(&r.start_date),
            csv_escape(&r.end_date),
            r.amc_value,
            amc_status_label(r.is_due, r.is_active)
        ));
    }
    csv
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportParams {
    #[serde(rename = "type")]
    ty: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

/// 导出 CSV，仅管理员可用
async fn export_report(
    headers: HeaderMap,
    Query(params): Query<ExportParams>,
) -> Result<axum::response::Response, Response> {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "report", ReportGroup::EXPORT, None).await {
        return Err(Response::permission_denied());
    }
    let (csv, filename) = match params.ty.as_deref().unwrap_or_default() {
        "services" => {
            let mut filter = "1=1".to_string();
            filter.push_str(&window_filter(
                "s.service_date",
                params.date_from.as_deref(),
                params.date_to.as_deref(),
            )?);
            let rows = query_service_rows(&mut conn, &filter)?;
            (services_csv(&rows), "services-report.csv")
        }
        "amcs" => {
            let mut filter = "1=1".to_string();
            filter.push_str(&window_filter(
                "a.end_date",
                params.date_from.as_deref(),
                params.date_to.as_deref(),
            )?);
            let rows = query_amc_rows(&mut conn, &filter)?;
            (amcs_csv(&rows), "amc-report.csv")
        }
        "" => return Err(Response::invalid_value("缺少type")),
        t => return Err(Response::invalid_value(format!("type的值非法: {t}"))),
    };
    axum::response::Response::builder()
        .header(axum::http::header::CONTENT_TYPE, mime::TEXT_CSV.as_ref())
        .header(
            axum::http::header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(axum::body::Body::from(csv))
        .map_err(Response::internal_server_error)
}

#[cfg(test)]
mod tests {
    use super::{amc_status_label, csv_escape, percentage, services_csv, ServiceRow};

    #[test]
    fn percentage_never_divides_by_zero() {
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(3, 3), 100.0);
    }

    #[test]
    fn csv_fields_are_escaped() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn amc_status_labels() {
        assert_eq!(amc_status_label(1, 1), "Due");
        assert_eq!(amc_status_label(1, 0), "Due");
        assert_eq!(amc_status_label(0, 1), "Active");
        assert_eq!(amc_status_label(0, 0), "Inactive");
    }

    #[test]
    fn services_csv_quotes_embedded_commas() {
        let rows = vec![ServiceRow {
            id: "s1".into(),
            customer_name: "Doe, John".into(),
            mobile: "9000000001".into(),
            employee_name: None,
            ty: "repair".into(),
            service_date: "2024-01-15".into(),
            completed_date: None,
            status: "pending".into(),
            amount: None,
        }];
        let csv = services_csv(&rows);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Service ID,Customer Name,Mobile,Employee,Type,Service Date,Status,Amount"
        );
        assert_eq!(
            lines.next().unwrap(),
            "s1,\"Doe, John\",9000000001,Not Assigned,repair,2024-01-15,pending,0"
        );
    }
}
