use crate::{
    bearer, catch,
    database::get_conn,
    debug_info,
    libs::{
        dser::deser_empty_to_none,
        gen_id,
        time::{TimeFormat, TIME},
    },
    parse_jwt_macro,
    perm::{action::AccountGroup, verify_permissions},
    token::generate_jwt,
    Response, ResponseResult,
};
use axum::{http::HeaderMap, Json};
use mysql::{params, prelude::Queryable};
use serde_json::{json, Value};

use super::get_user;

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterParams {
    full_name: String,
    email: String,
    password: String,
    #[serde(default)]
    role: String,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    department: Option<String>,
    #[serde(default, deserialize_with = "deser_empty_to_none")]
    phone: Option<String>,
}

/// 首个账号引导为管理员，其余注册需要 account::create 权限
pub async fn register(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let mut conn = get_conn()?;
    let params: RegisterParams = serde_json::from_value(value)?;
    if params.full_name.is_empty() || params.email.is_empty() || params.password.is_empty() {
        return Err(Response::invalid_value("姓名、邮箱和密码均不能为空"));
    }
    let count: i64 = conn.query_first("SELECT COUNT(*) FROM user")?.unwrap_or(0);
    let role = if count == 0 {
        "admin".to_owned()
    } else {
        let bearer = bearer!(&headers);
        let id = parse_jwt_macro!(&bearer, &mut conn);
        let operator = get_user(&id, &mut conn)?;
        if !verify_permissions(&operator.role, "account", AccountGroup::CREATE, None).await {
            return Err(Response::permission_denied());
        }
        match params.role.as_str() {
            "" | "employee" => "employee".to_owned(),
            "admin" => "admin".to_owned(),
            r => return Err(Response::invalid_value(format!("role的值非法: {r}"))),
        }
    };
    let time = TIME::now()?;
    let id = gen_id(&time, &params.full_name);
    let digest = md5::compute(&params.password);
    catch!(conn.exec_drop(
        "INSERT INTO user
        (id, name, email, password, role, department, phone, is_active, create_time)
        VALUES
        (:id, :name, :email, :password, :role, :department, :phone, 1, :create_time)",
        params! {
            "id" => &id,
            "name" => params.full_name.trim(),
            "email" => params.email.trim(),
            "password" => digest.0,
            "role" => &role,
            "department" => &params.department,
            "phone" => &params.phone,
            "create_time" => time.format(TimeFormat::YYYYMMDD_HHMMSS)
        }
    ) => dup format!("邮箱 {} 已被注册", params.email))?;
    debug_info(format!("注册账号 {}，角色 {}", params.email, role));
    let token = generate_jwt(&id);
    Ok(Response::created(json!({
        "id": id,
        "token": token,
        "role": role
    })))
}
