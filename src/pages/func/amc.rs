use axum::{
    extract::{Path, Query},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Months;
use mysql::{params, prelude::Queryable, PooledConn};
use mysql_common::prelude::FromRow;
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
    pages::message::{amc_reminder_message, whatsapp_url},
    parse_jwt_macro,
    perm::{action::AmcGroup, verify_permissions},
    Response, ResponseResult,
};

pub fn amc_router() -> Router {
    Router::new()
        .route("/amcs", post(insert_amc).get(query_amcs))
        .route(
            "/amcs/:id",
            get(query_amc_by_id).put(update_amc).delete(delete_amc),
        )
        .route("/amcs/:id/mark-due", put(mark_amc_due))
        .route("/amcs/:id/renew", put(renew_amc))
}

/// 维保合同
#[derive(Debug, Serialize, FromRow)]
#[mysql(table_name = "amc")]
#[serde(rename_all = "camelCase")]
pub struct Amc {
    pub id: String,
    #[serde(rename = "customerId")]
    pub customer: String,
    pub amc_name: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub renewal_date: Option<String>,
    pub next_service_date: String,
    pub service_frequency: String,
    pub amc_value: f64,
    #[serde(serialize_with = "serialize_i32_to_bool")]
    pub is_active: i32,
    #[serde(serialize_with = "serialize_i32_to_bool")]
    pub is_due: i32,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub notes: Option<String>,
    pub create_time: String,
}

pub const FREQUENCIES: [&str; 4] = ["monthly", "quarterly", "half-yearly", "yearly"];

/// 按服务频率推进日历月，月末自动截断。只在创建时计算一次
pub fn next_service_date(start: chrono::NaiveDate, frequency: &str) -> Option<chrono::NaiveDate> {
    let months = match frequency {
        "monthly" => 1,
        "quarterly" => 3,
        "half-yearly" => 6,
        "yearly" => 12,
        _ => return None,
    };
    start.checked_add_months(Months::new(months))
}

fn query_amc(id: &str, conn: &mut PooledConn) -> Result<Amc, Response> {
    let amc: Amc = op::some!(
        conn.query_first(format!("SELECT * FROM amc WHERE id = '{id}'"))?;
        ret Err(Response::not_exist("合同不存在")));
    Ok(amc)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertParams {
    customer_id: String,
    amc_name: String,
    #[serde(deserialize_with = "deserialize_date")]
    start_date: String,
    #[serde(deserialize_with = "deserialize_date")]
    end_date: String,
    #[serde(default)]
    service_frequency: String,
    amc_value: f64,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    notes: Option<String>,
}

async fn insert_amc(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "amc", AmcGroup::CREATE, None).await {
        return Err(Response::permission_denied());
    }
    let params: InsertParams = serde_json::from_value(value)?;
    if params.customer_id.is_empty() || params.amc_name.trim().is_empty() {
        return Err(Response::invalid_value("customerId和amcName均不能为空"));
    }
    let frequency = do_if!(
        params.service_frequency.is_empty() => "quarterly".to_owned(),
        params.service_frequency.clone()
    );
    let start = op::some!(parse_date(&params.start_date);
        ret Err(Response::invalid_value("startDate格式错误")));
    let next = op::some!(next_service_date(start, &frequency);
        ret Err(Response::invalid_value(format!("serviceFrequency的值非法: {frequency}"))));
    debug_info(format!("添加合同，{} : {:?}", user.name, params));
    let time = TIME::now()?;
    let aid = gen_id(&time, params.amc_name.trim());
    catch!(conn.exec_drop(
        "INSERT INTO amc
        (id, customer, amc_name, start_date, end_date, renewal_date, next_service_date,
        service_frequency, amc_value, is_active, is_due, notes, create_time)
        VALUES
        (:id, :customer, :amc_name, :start_date, :end_date, NULL, :next_service_date,
        :service_frequency, :amc_value, 1, 0, :notes, :create_time)",
        params! {
            "id" => &aid,
            "customer" => &params.customer_id,
            "amc_name" => params.amc_name.trim(),
            "start_date" => &params.start_date,
            "end_date" => &params.end_date,
            "next_service_date" => next.format("%Y-%m-%d").to_string(),
            "service_frequency" => &frequency,
            "amc_value" => params.amc_value,
            "notes" => &params.notes,
            "create_time" => time.format(TimeFormat::YYYYMMDD_HHMMSS)
        }
    ) => fk "客户不存在")?;
    let data = query_amc(&aid, &mut conn)?;
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
    amc_name: String,
    start_date: String,
    end_date: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    renewal_date: Option<String>,
    next_service_date: String,
    service_frequency: String,
    amc_value: f64,
    #[serde(serialize_with = "serialize_i32_to_bool")]
    is_active: i32,
    #[serde(serialize_with = "serialize_i32_to_bool")]
    is_due: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryParams {
    customer_id: Option<String>,
    status: Option<String>,
}

async fn query_amcs(headers: HeaderMap, Query(params): Query<QueryParams>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "amc", AmcGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let mut filter = "1=1".to_string();
    if let Some(customer) = params.customer_id.as_deref() {
        if !customer.is_empty() {
            filter.push_str(&format!(" AND a.customer = '{customer}'"));
        }
    }
    match params.status.as_deref() {
        Some("due") => filter.push_str(" AND a.is_due = 1"),
        Some("active") => filter.push_str(" AND a.is_active = 1"),
        Some("") | None => (),
        Some(s) => return Err(Response::invalid_value(format!("status的值非法: {s}"))),
    }
    let list: Vec<ListData> = conn.query_map(
        format!(
            "SELECT a.id, a.customer, c.name AS customer_name, c.mobile, a.amc_name,
            a.start_date, a.end_date, a.renewal_date, a.next_service_date,
            a.service_frequency, a.amc_value, a.is_active, a.is_due
            FROM amc a JOIN customer c ON c.id = a.customer
            WHERE {filter} ORDER BY a.end_date"
        ),
        |a| a,
    )?;
    Ok(Response::ok(json!(list)))
}

async fn query_amc_by_id(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "amc", AmcGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let data = query_amc(&id, &mut conn)?;
    Ok(Response::ok(json!(data)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    amc_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    start_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    end_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    renewal_date: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    next_service_date: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    service_frequency: Option<String>,
    amc_value: Option<f64>,
    is_active: Option<bool>,
    is_due: Option<bool>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    notes: Option<String>,
}

/// 只更新提供的字段。next_service_date 不随 start_date/service_frequency
/// 的变更重算，除非显式提供
async fn update_amc(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(value): Json<Value>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "amc", AmcGroup::UPDATE, None).await {
        return Err(Response::permission_denied());
    }
    let params: UpdateParams = serde_json::from_value(value)?;
    let exist: Option<String> = conn.query_first(format!("SELECT id FROM amc WHERE id = '{id}'"))?;
    if exist.is_none() {
        return Err(Response::not_exist("合同不存在"));
    }
    let mut sets = Vec::new();
    if let Some(name) = &params.amc_name {
        sets.push(format!("amc_name='{}'", name.trim()));
    }
    if let Some(date) = &params.start_date {
        sets.push(format!("start_date='{date}'"));
    }
    if let Some(date) = &params.end_date {
        sets.push(format!("end_date='{date}'"));
    }
    if let Some(date) = &params.renewal_date {
        sets.push(format!("renewal_date='{date}'"));
    }
    if let Some(date) = &params.next_service_date {
        sets.push(format!("next_service_date='{date}'"));
    }
    if let Some(frequency) = &params.service_frequency {
        if !FREQUENCIES.contains(&frequency.as_str()) {
            return Err(Response::invalid_value(format!(
                "serviceFrequency的值非法: {frequency}"
            )));
        }
        sets.push(format!("service_frequency='{frequency}'"));
    }
    if let Some(value) = params.amc_value {
        sets.push(format!("amc_value={value}"));
    }
    if let Some(flag) = params.is_active {
        sets.push(format!("is_active={}", do_if!(flag => 1, 0)));
    }
    if let Some(flag) = params.is_due {
        sets.push(format!("is_due={}", do_if!(flag => 1, 0)));
    }
    if let Some(notes) = &params.notes {
        sets.push(format!("notes='{notes}'"));
    }
    if sets.is_empty() {
        return Err(Response::invalid_value("没有需要更新的字段"));
    }
    debug_info(format!("更新合同 {id}，{} : {:?}", user.name, params));
    conn.query_drop(format!(
        "UPDATE amc SET {} WHERE id = '{id}' LIMIT 1",
        sets.join(", ")
    ))?;
    let data = query_amc(&id, &mut conn)?;
    Ok(Response::ok(json!(data)))
}

async fn delete_amc(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "amc", AmcGroup::DELETE, None).await {
        return Err(Response::permission_denied());
    }
    let exist: Option<String> = conn.query_first(format!("SELECT id FROM amc WHERE id = '{id}'"))?;
    if exist.is_none() {
        return Err(Response::not_exist("合同不存在"));
    }
    conn.query_drop(format!("DELETE FROM amc WHERE id = '{id}' LIMIT 1"))?;
    debug_info(format!("删除合同 {id}，操作者 {}", user.name));
    Ok(Response::message("合同已删除"))
}

/// 标记到期只改 is_due，is_active 不变。顺带生成续约提醒链接
async fn mark_amc_due(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "amc", AmcGroup::MARK_DUE, None).await {
        return Err(Response::permission_denied());
    }
    let amc = query_amc(&id, &mut conn)?;
    conn.query_drop(format!("UPDATE amc SET is_due = 1 WHERE id = '{id}' LIMIT 1"))?;
    let amc = Amc { is_due: 1, ..amc };
    let contact: Option<(String, String)> = conn.query_first(format!(
        "SELECT name, mobile FROM customer WHERE id = '{}'",
        amc.customer
    ))?;
    let reminder = contact.map(|(name, mobile)| {
        whatsapp_url(
            &mobile,
            &amc_reminder_message(&name, &amc.amc_name, &amc.end_date),
        )
    });
    Ok(Response::ok_with_message(
        json!({
            "amc": amc,
            "reminderUrl": reminder
        }),
        "合同已标记为到期",
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewParams {
    #[serde(default, deserialize_with = "deserialize_opt_date")]
    new_end_date: Option<String>,
    new_amc_value: Option<f64>,
}

/// 续约的 SET 子句：无论之前处于什么状态，强制 is_due=0、is_active=1
fn renewal_sets(today: &str, new_end_date: &str, new_amc_value: Option<f64>) -> String {
    let value_set = new_amc_value
        .map(|v| format!(", amc_value = {v}"))
        .unwrap_or_default();
    format!(
        "renewal_date = '{today}', end_date = '{new_end_date}', is_due = 0, is_active = 1{value_set}"
    )
}

async fn renew_amc(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(value): Json<Value>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "amc", AmcGroup::RENEW, None).await {
        return Err(Response::permission_denied());
    }
    let params: RenewParams = serde_json::from_value(value)?;
    let Some(new_end_date) = &params.new_end_date else {
        return Err(Response::invalid_value("缺少newEndDate"));
    };
    let exist: Option<String> = conn.query_first(format!("SELECT id FROM amc WHERE id = '{id}'"))?;
    if exist.is_none() {
        return Err(Response::not_exist("合同不存在"));
    }
    let time = TIME::now()?;
    debug_info(format!("续约合同 {id}，{} : {:?}", user.name, params));
    conn.query_drop(format!(
        "UPDATE amc SET {} WHERE id = '{id}' LIMIT 1",
        renewal_sets(
            &time.format(TimeFormat::YYYYMMDD),
            new_end_date,
            params.new_amc_value
        )
    ))?;
    let data = query_amc(&id, &mut conn)?;
    Ok(Response::ok_with_message(json!(data), "合同续约成功"))
}

#[cfg(test)]
mod tests {
    use super::{next_service_date, renewal_sets};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(
            next_service_date(d(2024, 1, 31), "monthly"),
            Some(d(2024, 2, 29))
        );
        assert_eq!(
            next_service_date(d(2023, 1, 31), "monthly"),
            Some(d(2023, 2, 28))
        );
        assert_eq!(
            next_service_date(d(2024, 8, 31), "monthly"),
            Some(d(2024, 9, 30))
        );
    }

    #[test]
    fn quarterly_advances_three_months() {
        assert_eq!(
            next_service_date(d(2024, 1, 15), "quarterly"),
            Some(d(2024, 4, 15))
        );
        assert_eq!(
            next_service_date(d(2024, 11, 30), "quarterly"),
            Some(d(2025, 2, 28))
        );
    }

    #[test]
    fn half_yearly_advances_six_months() {
        assert_eq!(
            next_service_date(d(2024, 8, 31), "half-yearly"),
            Some(d(2025, 2, 28))
        );
    }

    #[test]
    fn yearly_keeps_month_and_day() {
        assert_eq!(
            next_service_date(d(2024, 1, 15), "yearly"),
            Some(d(2025, 1, 15))
        );
        // 闰日推进到平年按月末截断
        assert_eq!(
            next_service_date(d(2024, 2, 29), "yearly"),
            Some(d(2025, 2, 28))
        );
        assert_eq!(
            next_service_date(d(2023, 6, 1), "yearly"),
            Some(d(2024, 6, 1))
        );
    }

    #[test]
    fn unknown_frequency_rejected() {
        assert_eq!(next_service_date(d(2024, 1, 15), "weekly"), None);
        assert_eq!(next_service_date(d(2024, 1, 15), ""), None);
    }

    #[test]
    fn renewal_always_resets_flags() {
        let sets = renewal_sets("2024-06-01", "2025-01-15", None);
        assert!(sets.contains("is_due = 0"));
        assert!(sets.contains("is_active = 1"));
        assert!(sets.contains("end_date = '2025-01-15'"));
        assert!(sets.contains("renewal_date = '2024-06-01'"));
        assert!(!sets.contains("amc_value"));
    }

    #[test]
    fn renewal_replaces_value_only_when_given() {
        let sets = renewal_sets("2024-06-01", "2025-01-15", Some(1500.0));
        assert!(sets.contains("amc_value = 1500"));
    }
}
