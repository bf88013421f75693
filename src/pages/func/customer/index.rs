use axum::{
    extract::{Path, Query},
    http::HeaderMap,
    Json,
};
use mysql::{params, prelude::Queryable, PooledConn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    bearer, catch,
    common::is_valid_mobile,
    database::get_conn,
    debug_info, do_if,
    libs::{
        dser::{deser_empty_to_none, deserialize_bool_to_i32},
        gen_id,
        time::{TimeFormat, TIME},
    },
    pages::account::get_user,
    parse_jwt_macro,
    perm::{action::CustomerGroup, verify_permissions},
    Response, ResponseResult,
};

use super::Customer;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertParams {
    name: String,
    mobile: String,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    address: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    city: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    state: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pincode: Option<String>,
    #[serde(default, deserialize_with = "deserialize_bool_to_i32")]
    is_recurring: i32,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    notes: Option<String>,
}

pub async fn insert_customer(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(
        &user.role,
        "customer",
        CustomerGroup::ENTER_CUSTOMER_DATA,
        None,
    )
    .await
    {
        return Err(Response::permission_denied());
    }
    let params: InsertParams = serde_json::from_value(value)?;
    if params.name.trim().is_empty() {
        return Err(Response::invalid_value("客户姓名不能为空"));
    }
    if !is_valid_mobile(params.mobile.trim()) {
        return Err(Response::invalid_value("手机号必须是10位数字"));
    }
    debug_info(format!("添加客户，{} : {:?}", user.name, params));
    let time = TIME::now()?;
    let cid = gen_id(&time, params.name.trim());
    catch!(conn.exec_drop(
        "INSERT INTO customer
        (id, name, mobile, email, address, city, state, pincode, is_recurring, notes, create_time)
        VALUES
        (:id, :name, :mobile, :email, :address, :city, :state, :pincode, :is_recurring, :notes, :create_time)",
        params! {
            "id" => &cid,
            "name" => params.name.trim(),
            "mobile" => params.mobile.trim(),
            "email" => &params.email,
            "address" => &params.address,
            "city" => &params.city,
            "state" => &params.state,
            "pincode" => &params.pincode,
            "is_recurring" => params.is_recurring,
            "notes" => &params.notes,
            "create_time" => time.format(TimeFormat::YYYYMMDD_HHMMSS)
        }
    ) => dup format!("手机号 {} 已被注册", params.mobile))?;
    let data = query_customer(&cid, &mut conn)?;
    Ok(Response::created(json!(data)))
}

pub fn query_customer(id: &str, conn: &mut PooledConn) -> Result<Customer, Response> {
    let customer: Customer = op::some!(
        conn.query_first(format!("SELECT * FROM customer WHERE id = '{id}'"))?;
        ret Err(Response::not_exist("客户不存在")));
    Ok(customer)
}

#[derive(Deserialize)]
pub struct QueryParams {
    search: Option<String>,
}

pub async fn query_customers(
    headers: HeaderMap,
    Query(params): Query<QueryParams>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "customer", CustomerGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let filter = match params.search.as_deref() {
        Some(s) if !s.is_empty() => {
            format!("WHERE name LIKE '%{s}%' OR mobile LIKE '%{s}%'")
        }
        _ => String::new(),
    };
    let list: Vec<Customer> = conn.query_map(
        format!("SELECT * FROM customer {filter} ORDER BY create_time DESC"),
        |c| c,
    )?;
    Ok(Response::ok(json!(list)))
}

pub async fn query_customer_by_id(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "customer", CustomerGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let data = query_customer(&id, &mut conn)?;
    Ok(Response::ok(json!(data)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    name: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    address: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    city: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    state: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    pincode: Option<String>,
    is_recurring: Option<bool>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    notes: Option<String>,
}

/// 只更新提供的字段，手机号是客户标识不可变更
pub async fn update_customer(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(value): Json<Value>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "customer", CustomerGroup::UPDATE, None).await {
        return Err(Response::permission_denied());
    }
    let params: UpdateParams = serde_json::from_value(value)?;
    let exist: Option<String> =
        conn.query_first(format!("SELECT id FROM customer WHERE id = '{id}'"))?;
    if exist.is_none() {
        return Err(Response::not_exist("客户不存在"));
    }
    let mut sets = Vec::new();
    if let Some(name) = &params.name {
        sets.push(format!("name='{}'", name.trim()));
    }
    if let Some(email) = &params.email {
        sets.push(format!("email='{email}'"));
    }
    if let Some(address) = &params.address {
        sets.push(format!("address='{address}'"));
    }
    if let Some(city) = &params.city {
        sets.push(format!("city='{city}'"));
    }
    if let Some(state) = &params.state {
        sets.push(format!("state='{state}'"));
    }
    if let Some(pincode) = &params.pincode {
        sets.push(format!("pincode='{pincode}'"));
    }
    if let Some(flag) = params.is_recurring {
        sets.push(format!("is_recurring={}", do_if!(flag => 1, 0)));
    }
    if let Some(notes) = &params.notes {
        sets.push(format!("notes='{notes}'"));
    }
    if sets.is_empty() {
        return Err(Response::invalid_value("没有需要更新的字段"));
    }
    debug_info(format!("更新客户 {id}，{} : {:?}", user.name, params));
    conn.query_drop(format!(
        "UPDATE customer SET {} WHERE id = '{id}' LIMIT 1",
        sets.join(", ")
    ))?;
    let data = query_customer(&id, &mut conn)?;
    Ok(Response::ok(json!(data)))
}

pub async fn delete_customer(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(
        &user.role,
        "customer",
        CustomerGroup::DELETE_CUSTOMER_DATA,
        None,
    )
    .await
    {
        return Err(Response::permission_denied());
    }
    let exist: Option<String> =
        conn.query_first(format!("SELECT id FROM customer WHERE id = '{id}'"))?;
    if exist.is_none() {
        return Err(Response::not_exist("客户不存在"));
    }
    // 服务与合同记录随客户级联删除
    conn.query_drop(format!("DELETE FROM customer WHERE id = '{id}' LIMIT 1"))?;
    debug_info(format!("删除客户 {id}，操作者 {}", user.name));
    Ok(Response::message("客户已删除"))
}
