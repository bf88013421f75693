use axum::{
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use mysql::{params, prelude::Queryable, PooledConn};
use mysql_common::prelude::FromRow;
use serde_json::{json, Value};

mod login;
mod register;
use crate::{
    bearer,
    database::get_conn,
    libs::{cache::USER_CACHE, dser::*},
    parse_jwt_macro,
    token::revoke_tokens,
    Response, ResponseResult,
};

/// 员工数据
#[derive(Debug, Clone, serde::Serialize, FromRow)]
#[mysql(table_name = "user")]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(rename = "fullName")]
    pub name: String,
    #[allow(unused)]
    #[serde(skip_serializing)]
    password: Vec<u8>,
    pub email: String,
    pub role: String,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub department: Option<String>,
    #[serde(serialize_with = "serialize_null_to_default")]
    pub phone: Option<String>,
    #[serde(serialize_with = "serialize_i32_to_bool")]
    pub is_active: i32,
    pub create_time: String,
}

pub fn account_router() -> Router {
    Router::new()
        .route("/auth/login", post(login::login))
        .route("/auth/register", post(register::register))
        .route("/auth/me", get(current_user))
        .route("/auth/password", put(update_password))
        .route("/auth/logout", post(logout))
}

/// 查询操作者信息，优先读缓存
pub fn get_user(id: &str, conn: &mut PooledConn) -> Result<User, Response> {
    if let Some(user) = USER_CACHE.get(id) {
        return Ok(user.clone());
    }
    let user: User = op::some!(conn.query_first(format!("SELECT * FROM user WHERE id = '{id}'"))?;
        ret Err(Response::not_exist("用户不存在")));
    USER_CACHE.insert(user.id.clone(), user.clone());
    Ok(user)
}

async fn current_user(headers: HeaderMap) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    Ok(Response::ok(json!(user)))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Password {
    old_password: String,
    new_password: String,
}
async fn update_password(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let password: Password = serde_json::from_value(value)?;
    if password.old_password.is_empty() || password.new_password.is_empty() {
        return Err(Response::invalid_value("新旧密码均不能为空"));
    }
    let stored: Option<Vec<u8>> =
        conn.query_first(format!("SELECT password FROM user WHERE id = '{id}'"))?;
    let stored = op::some!(stored; ret Err(Response::not_exist("用户不存在")));
    let old_digest = md5::compute(&password.old_password);
    if stored.as_slice() != old_digest.0.as_slice() {
        return Err(Response::wrong_password());
    }
    let digest = md5::compute(&password.new_password);
    conn.exec_drop(
        "UPDATE user SET password = :password WHERE id = :id",
        params! {
            "password" => digest.0,
            "id" => &id
        },
    )?;
    revoke_tokens(&id, &mut conn)?;
    USER_CACHE.remove(&id);
    Ok(Response::message("密码修改成功，请重新登录"))
}

async fn logout(headers: HeaderMap) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    revoke_tokens(&id, &mut conn)?;
    Ok(Response::message("已退出登录"))
}
