use axum::{
    extract::{Path, Query},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use mysql::{params, prelude::Queryable, PooledConn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    bearer, catch,
    database::{c_or_r, get_conn},
    debug_info, do_if,
    libs::{
        cache::USER_CACHE,
        dser::deser_empty_to_none,
        gen_id,
        time::{TimeFormat, TIME},
    },
    pages::account::{get_user, User},
    parse_jwt_macro,
    perm::{action::AccountGroup, verify_permissions},
    token::revoke_tokens,
    Response, ResponseResult,
};

pub fn user_router() -> Router {
    Router::new()
        .route("/employees", post(insert_employee).get(query_employees))
        .route("/employees/performance", get(employee_performance))
        .route(
            "/employees/:id",
            get(query_employee_by_id)
                .put(update_employee)
                .delete(delete_employee),
        )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertParams {
    full_name: String,
    email: String,
    password: String,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    department: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    phone: Option<String>,
}

/// 新建员工账号，仅管理员可用，角色固定为 employee
async fn insert_employee(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let operator = get_user(&id, &mut conn)?;
    if !verify_permissions(&operator.role, "account", AccountGroup::CREATE, None).await {
        return Err(Response::permission_denied());
    }
    let params: InsertParams = serde_json::from_value(value)?;
    if params.full_name.is_empty() || params.email.is_empty() || params.password.is_empty() {
        return Err(Response::invalid_value("姓名、邮箱和密码均不能为空"));
    }
    let time = TIME::now()?;
    let eid = gen_id(&time, &params.full_name);
    let digest = md5::compute(&params.password);
    catch!(conn.exec_drop(
        "INSERT INTO user
        (id, name, email, password, role, department, phone, is_active, create_time)
        VALUES
        (:id, :name, :email, :password, 'employee', :department, :phone, 1, :create_time)",
        params! {
            "id" => &eid,
            "name" => params.full_name.trim(),
            "email" => params.email.trim(),
            "password" => digest.0,
            "department" => &params.department,
            "phone" => &params.phone,
            "create_time" => time.format(TimeFormat::YYYYMMDD_HHMMSS)
        }
    ) => dup format!("邮箱 {} 已被注册", params.email))?;
    debug_info(format!("新建员工 {}，操作者 {}", params.email, operator.name));
    let data = query_employee(&eid, &mut conn)?;
    Ok(Response::created(json!(data)))
}

fn query_employee(id: &str, conn: &mut PooledConn) -> Result<User, Response> {
    let employee: User = op::some!(
        conn.query_first(format!(
            "SELECT * FROM user WHERE id = '{id}' AND role = 'employee'"
        ))?;
        ret Err(Response::not_exist("员工不存在")));
    Ok(employee)
}

#[derive(Deserialize)]
struct QueryParams {
    department: Option<String>,
}

async fn query_employees(headers: HeaderMap, Query(params): Query<QueryParams>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "account", AccountGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let filter = match params.department.as_deref() {
        Some(d) if !d.is_empty() => format!("AND department = '{d}'"),
        _ => String::new(),
    };
    let list: Vec<User> = conn.query_map(
        format!("SELECT * FROM user WHERE role = 'employee' {filter} ORDER BY name"),
        |u| u,
    )?;
    Ok(Response::ok(json!(list)))
}

/// 员工详情附带完成/待处理工单数
async fn query_employee_by_id(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "account", AccountGroup::QUERY, None).await {
        return Err(Response::permission_denied());
    }
    let employee = query_employee(&id, &mut conn)?;
    let completed: i64 = conn
        .query_first(format!(
            "SELECT COUNT(*) FROM service WHERE employee = '{id}' AND status = 'completed'"
        ))?
        .unwrap_or(0);
    let pending: i64 = conn
        .query_first(format!(
            "SELECT COUNT(*) FROM service WHERE employee = '{id}' AND status = 'pending'"
        ))?
        .unwrap_or(0);
    Ok(Response::ok(json!({
        "employee": employee,
        "completedServices": completed,
        "pendingServices": pending
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateParams {
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    full_name: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    department: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    phone: Option<String>,
    is_active: Option<bool>,
}

/// 只更新提供的字段，仅管理员可用。停用账号会顺带作废其全部 token
async fn update_employee(
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(value): Json<Value>,
) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "account", AccountGroup::UPDATE, None).await {
        return Err(Response::permission_denied());
    }
    let params: UpdateParams = serde_json::from_value(value)?;
    query_employee(&id, &mut conn)?;
    let mut sets = Vec::new();
    if let Some(name) = &params.full_name {
        sets.push(format!("name='{}'", name.trim()));
    }
    if let Some(department) = &params.department {
        sets.push(format!("department='{department}'"));
    }
    if let Some(phone) = &params.phone {
        sets.push(format!("phone='{phone}'"));
    }
    if let Some(flag) = params.is_active {
        sets.push(format!("is_active={}", do_if!(flag => 1, 0)));
    }
    if sets.is_empty() {
        return Err(Response::invalid_value("没有需要更新的字段"));
    }
    debug_info(format!("更新员工 {id}，{} : {:?}", user.name, params));
    conn.query_drop(format!(
        "UPDATE user SET {} WHERE id = '{id}' LIMIT 1",
        sets.join(", ")
    ))?;
    if params.is_active == Some(false) {
        revoke_tokens(&id, &mut conn)?;
    }
    USER_CACHE.remove(&id);
    let data = query_employee(&id, &mut conn)?;
    Ok(Response::ok(json!(data)))
}

fn __delete_employee(conn: &mut PooledConn, id: &String) -> Result<(), Response> {
    conn.query_drop(format!("DELETE FROM token WHERE id = '{id}'"))?;
    conn.query_drop(format!("DELETE FROM user WHERE id = '{id}' LIMIT 1"))?;
    Ok(())
}

async fn delete_employee(headers: HeaderMap, Path(id): Path<String>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let operator = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&operator, &mut conn)?;
    if !verify_permissions(&user.role, "account", AccountGroup::DELETE, None).await {
        return Err(Response::permission_denied());
    }
    query_employee(&id, &mut conn)?;
    // 名下工单保留，employee 列置空
    c_or_r(__delete_employee, &mut conn, &id)?;
    USER_CACHE.remove(&id);
    debug_info(format!("删除员工 {id}，操作者 {}", user.name));
    Ok(Response::message("员工已删除"))
}

/// 员工绩效统计，仅管理员可用
async fn employee_performance(headers: HeaderMap) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "account", AccountGroup::PERFORMANCE, None).await {
        return Err(Response::permission_denied());
    }
    let employees: Vec<(String, String)> = conn.query_map(
        "SELECT id, name FROM user WHERE role = 'employee' ORDER BY name",
        |(id, name)| (id, name),
    )?;
    let mut performance = Vec::new();
    for (eid, name) in employees {
        let completed: i64 = conn
            .query_first(format!(
                "SELECT COUNT(*) FROM service WHERE employee = '{eid}' AND status = 'completed'"
            ))?
            .unwrap_or(0);
        let pending: i64 = conn
            .query_first(format!(
                "SELECT COUNT(*) FROM service WHERE employee = '{eid}' AND status = 'pending'"
            ))?
            .unwrap_or(0);
        let total: i64 = conn
            .query_first(format!(
                "SELECT COUNT(*) FROM service WHERE employee = '{eid}'"
            ))?
            .unwrap_or(0);
        performance.push(json!({
            "id": eid,
            "name": name,
            "completedServices": completed,
            "pendingServices": pending,
            "totalServices": total
        }));
    }
    Ok(Response::ok(json!(performance)))
}
