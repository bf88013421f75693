use axum::{
    extract::{Path, Query},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use mysql::{params, prelude::Queryable, PooledConn};
use mysql_common::prelude::FromRow;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    bearer, catch,
    database::get_conn,
    debug_info, do_if,
    libs::{
        dser::{
            deser_empty_to_none, deserialize_date, deserialize_opt_date, parse_date,
            serialize_i32_to_bool, serialize_null_to_default,
        },
        gen_id,
        time::{TimeFormat, TIME},
    },
    pages::account::get_user,
    pages::message::{service_completion_message, whatsapp_url},
    parse_jwt_macro,
    perm::{action::ServiceGroup, verify_permissions},
    Response, ResponseResult,
};

pub fn service_router() -> Router {
    Router::new()
        .route("/services", post(insert_service).get(query_services))
        .route(
            "/services/:id",
            get(query_service_by_id)
                .put(update_service)
                .delete(delete_service),
        )
        .route("/services/:id/complete", put(complete_service))
        .route("/services/employee/:id", get(query_employee_services))
}

/// 服务工单
#[derive(Debug, Serialize, FromRow)]
#[mysql(table_name = "service")]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    #[serde(rename = "customerId")]
    pub customer: String,
    #[serde(rename = "employeeId", serialize_with = "serialize_null_to_default")]
    pub employee: Option<String>,
    #[serde(rename = "serviceType")]
    pub ty: String,
    pub service_date: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub completed_date: Option<String>,
    pub status: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub description: Option<String>,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub notes: Option<String>,
    #[serde(serialize_with = "serialize_i32_to_bool")]
    pub otp_verification: i32,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub otp: Option<String>,
    pub amount: Option<f64>,
    pub create_time: String,
}

pub const STATUS: [&str; 4] = ["pending", "in-progress", "completed", "cancelled"];

/// 状态只能向前流转；cancelled 只能由非终态进入
pub fn valid_transition(from: &str, to: &str) -> bool {
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        ("pending", "in-progress")
            | ("pending", "completed")
            | ("pending", "cancelled")
            | ("in-progress", "completed")
            | ("in-progress", "cancelled")
    )
}

/// 开启校验时必须提供 OTP 且与存储值一致
pub fn otp_verified(required: bool, stored: Option<&str>, supplied: Option<&str>) -> bool {
    if !required {
        return true;
    }
    match (stored, supplied) {
        (Some(stored), Some(supplied)) => stored == supplied,
        _ => false,
    }
}

/// 6 位数字 OTP
fn gen_otp() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

fn query_service(id: &str, conn: &mut PooledConn) -> Result<Service, Response> {
    let service: Service = op::some!(
        conn.query_first(format!("SELECT * FROM service WHERE id = '{id}'"))?;
        ret Err(Response::not_exist("服务不存在")));
    Ok(service)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertParams {
    customer_id: String,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    employee_id: Option<String>,
    service_type: String,
    #[serde(deserialize_with = "deserialize_date")]
    service_date: String,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    description: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    notes: Option<String>,
    #[serde(default)]
    otp_verification: bool,
    amount: Option<f64>,
}

async fn insert_service(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "service", ServiceGroup::CREATE, None).await {
        return Err(Response::permission_denied());
    }
    let params: InsertParams = serde_json::from_value(value)?;
    if params.customer_id.is_empty() || params.service_type.trim().is_empty() {
        return Err(Response::invalid_value("customerId和serviceType均不能为空"));
    }
    debug_info(format!("添加服务，{} : {:?}", user.name, params));
    let time = TIME::now()?;
    let sid = gen_id(&time, params.service_type.trim());
    let otp = do_if!(params.otp_verification => Some(gen_otp()), None);
    catch!(conn.exec_drop(
        "INSERT INTO service
        (id, customer, employee, ty, service_date, completed_date, status, description,
        notes, otp_verification, otp, amount, create_time)
        VALUES
        (:id, :customer, :employee, :ty, :service_date, NULL, 'pending', :description,
        :notes, :otp_verification, :otp, :amount, :create_time)",
        params! {
            "id" => &sid,
            "customer" => &params.customer_id,
            "employee" => &params.employee_id,
            "ty" => params.service_type.trim(),
            "service_date" => &params.service_date,
            "description" => &params.description,
            "notes" => &params.notes,
            "otp_verification" => do_if!(params.otp_verification => 1, 0),
            "otp" => &otp,
            "amount" => params.amount,
            "create_time" => time.format(TimeFormat::YYYYMMDD_HHMMSS)
        }
    ) => fk "客户或员工不存在")?;
    let data = query_service(&sid, &mut conn)?;
    Ok(Response::created(json!(data)))
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
struct ListData {
    id: String,
    #[serde(rename = "customerId")]
    customer: String,
    customer_name: String,
    mobile: String,
    #[serde(rename = "employeeId", serialize_with = "serialize_null_to_default")]
    employee: Option<String>,
    #[serde(serialize_with = "serialize_null_to_default")]
    employee_name: Option<String>,
    #[serde(rename = "serviceType")]
    ty: String,
    service_date: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    completed_date: Option<String>,
    status: String,
    amount: Option<f64>,
    create_time: String,
}

fn query_service_list(conn: &mut PooledConn, filter: &str) -> Result<Vec<ListData>, Response> {
    let list = conn.query_map(
        format!(
            "SELECT s.id, s.customer, c.name AS customer_name, c.mobile, s.employee,
            u.name AS employee_name, s.ty, s.service_date, s.completed_date, s.status,
            s.amount, s.create_time
            FROM service s
            JOIN customer c ON c.id = s.customer
            LEFT JOIN user u ON u.id = s.employee
            WHERE {filter} ORDER BY s.service_date DESC"
        ),
        |s| s,
    )?;
    Ok(list)
}

/// 追加日期窗口过滤，闭区间
fn push_date_window(
    filter: &mut String,
    column: &str,
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> Result<(), Response> {
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
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    customer_id: Option<String>,
    employee_id: Option<String>,
    status: Option<String>,
    date_from: Option<String>,
    date_to: Option<String>,
}

async fn query_services(headers: HeaderMap, Query(params): Query<QueryParams>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "service", ServiceGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let mut filter = "1=1".to_string();
    if let Some(customer) = params.customer_id.as_deref().filter(|s| !s.is_empty()) {
        filter.push_str(&format!(" AND s.customer = '{customer}'"));
    }
    if let Some(employee) = params.employee_id.as_deref().filter(|s| !s.is_empty()) {
        filter.push_str(&format!(" AND s.employee = '{employee}'"));
    }
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        if !STATUS.contains(&status) {
            return Err(Response::invalid_value(format!("status的值非法: {status}")));
        }
        filter.push_str(&format!(" AND s.status = '{status}'"));
    }
    push_date_window(
        &mut filter,
        "s.service_date",
        params.date_from.as_deref(),
        params.date_to.as_deref(),
    )?;
    let list = query_service_list(&mut conn, &filter)?;
    Ok(Response::ok(json!(list)))
}

#[derive(Deserialize)]
struct EmployeeQueryParams {
    status: Option<String>,
}

async fn query_employee_services(
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<EmployeeQueryParams>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "service", ServiceGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let mut filter = format!("s.employee = '{id}'");
    if let Some(status) = params.status.as_deref().filter(|s| !s.is_empty()) {
        if !STATUS.contains(&status) {
            return Err(Response::invalid_value(format!("status的值非法: {status}")));
        }
        filter.push_str(&format!(" AND s.status = '{status}'"));
    }
    let list = query_service_list(&mut conn, &filter)?;
    Ok(Response::ok(json!(list)))
}

async fn query_service_by_id(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "service", ServiceGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let data = query_service(&id, &mut conn)?;
    Ok(Response::ok(json!(data)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    employee_id: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    service_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    service_date: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    status: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    description: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    notes: Option<String>,
    amount: Option<f64>,
}

/// 只更新提供的字段，状态变更必须是合法流转
async fn update_service(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(value): Json<Value>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "service", ServiceGroup::UPDATE, None).await {
        return Err(Response::permission_denied());
    }
    let params: UpdateParams = serde_json::from_value(value)?;
    let service = query_service(&id, &mut conn)?;
    let time = TIME::now()?;
    let mut sets = Vec::new();
    if let Some(employee) = &params.employee_id {
        sets.push(format!("employee='{employee}'"));
    }
    if let Some(ty) = &params.service_type {
        sets.push(format!("ty='{}'", ty.trim()));
    }
    if let Some(date) = &params.service_date {
        sets.push(format!("service_date='{date}'"));
    }
    if let Some(status) = &params.status {
        if !STATUS.contains(&status.as_str()) {
            return Err(Response::invalid_value(format!("status的值非法: {status}")));
        }
        if !valid_transition(&service.status, status) {
            return Err(Response::dissatisfy(format!(
                "状态不能从 {} 流转到 {}",
                service.status, status
            )));
        }
        sets.push(format!("status='{status}'"));
        if status == "completed" && service.status != "completed" {
            sets.push(format!(
                "completed_date='{}'",
                time.format(TimeFormat::YYYYMMDD_HHMMSS)
            ));
        }
    }
    if let Some(description) = &params.description {
        sets.push(format!("description='{description}'"));
    }
    if let Some(notes) = &params.notes {
        sets.push(format!("notes='{notes}'"));
    }
    if let Some(amount) = params.amount {
        sets.push(format!("amount={amount}"));
    }
    if sets.is_empty() {
        return Err(Response::invalid_value("没有需要更新的字段"));
    }
    debug_info(format!("更新服务 {id}，{} : {:?}", user.name, params));
    catch!(conn.query_drop(format!(
        "UPDATE service SET {} WHERE id = '{id}' LIMIT 1",
        sets.join(", ")
    )) => fk "员工不存在")?;
    let data = query_service(&id, &mut conn)?;
    Ok(Response::ok(json!(data)))
}

/// 终态服务不允许再次完成；开启 OTP 校验时必须提供正确的 OTP
async fn complete_service(
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Option<Json<Value>>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "service", ServiceGroup::COMPLETE, None).await {
        return Err(Response::permission_denied());
    }
    let service = query_service(&id, &mut conn)?;
    if service.status.eq("completed") || service.status.eq("cancelled") {
        return Err(Response::dissatisfy("该服务已完成或已取消"));
    }
    let otp = body.and_then(|Json(v)| {
        v.get("otp")
            .and_then(|otp| otp.as_str().map(|s| s.to_owned()))
    });
    if !otp_verified(
        service.otp_verification == 1,
        service.otp.as_deref(),
        otp.as_deref(),
    ) {
        return Err(Response::invalid_value("Invalid OTP"));
    }
    let time = TIME::now()?;
    conn.query_drop(format!(
        "UPDATE service SET status = 'completed', completed_date = '{}' WHERE id = '{id}' LIMIT 1",
        time.format(TimeFormat::YYYYMMDD_HHMMSS)
    ))?;
    debug_info(format!("服务 {id} 已完成，操作者 {}", user.name));
    let service = query_service(&id, &mut conn)?;
    let contact: Option<(String, String)> = conn.query_first(format!(
        "SELECT name, mobile FROM customer WHERE id = '{}'",
        service.customer
    ))?;
    let notify = contact
        .map(|(name, mobile)| whatsapp_url(&mobile, &service_completion_message(&name, &service.ty)));
    Ok(Response::ok_with_message(
        json!({
            "service": service,
            "notifyUrl": notify
        }),
        "服务已完成",
    ))
}

async fn delete_service(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "service", ServiceGroup::DELETE, None).await {
        return Err(Response::permission_denied());
    }
    let exist: Option<String> =
        conn.query_first(format!("SELECT id FROM service WHERE id = '{id}'"))?;
    if exist.is_none() {
        return Err(Response::not_exist("服务不存在"));
    }
    conn.query_drop(format!("DELETE FROM service WHERE id = '{id}' LIMIT 1"))?;
    debug_info(format!("删除服务 {id}，操作者 {}", user.name));
    Ok(Response::message("服务已删除"))
}

#[cfg(test)]
mod tests {
    use super::{gen_otp, otp_verified, valid_transition};

    #[test]
    fn transitions_flow_forward_only() {
        assert!(valid_transition("pending", "in-progress"));
        assert!(valid_transition("pending", "completed"));
        assert!(valid_transition("in-progress", "completed"));
        assert!(valid_transition("pending", "cancelled"));
        assert!(valid_transition("in-progress", "cancelled"));

        assert!(!valid_transition("in-progress", "pending"));
        assert!(!valid_transition("completed", "pending"));
        assert!(!valid_transition("completed", "in-progress"));
        assert!(!valid_transition("completed", "cancelled"));
        assert!(!valid_transition("cancelled", "pending"));
        assert!(!valid_transition("cancelled", "completed"));
    }

    #[test]
    fn same_status_is_noop() {
        for status in super::STATUS {
            assert!(valid_transition(status, status));
        }
    }

    #[test]
    fn otp_check_only_when_required() {
        assert!(otp_verified(false, None, None));
        assert!(otp_verified(false, Some("123456"), None));
        assert!(otp_verified(true, Some("123456"), Some("123456")));
        assert!(!otp_verified(true, Some("123456"), Some("654321")));
        assert!(!otp_verified(true, Some("123456"), None));
        assert!(!otp_verified(true, None, Some("123456")));
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..32 {
            let otp = gen_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
