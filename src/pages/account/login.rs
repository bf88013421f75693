use axum::{http::HeaderMap, Json};
use mysql::prelude::Queryable;
use serde_json::{json, Value};

use crate::{
    bearer,
    database::get_conn,
    debug_info,
    token::{generate_jwt, parse_jwt, TokenVerification},
    Response, ResponseResult,
};

use super::get_user;

#[derive(serde::Deserialize)]
struct LoginID {
    email: String,
    password: String,
}

/// 携带 Bearer 时走 token 校验/刷新，否则按邮箱密码登录
pub async fn login(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let mut conn = get_conn()?;

    if let Some(bearer) = bearer!(&headers, Allow Missing) {
        let token = match parse_jwt(&bearer) {
            None => return Err(Response::token_error("Invalid token")),
            Some(token) => token,
        };
        match token.verify(&mut conn)? {
            TokenVerification::Ok => {
                let user = get_user(&token.id, &mut conn)?;
                if user.is_active == 0 {
                    return Err(Response::inactive_account());
                }
                Ok(Response::ok(json!({
                    "token": bearer.token(),
                    "user": user
                })))
            }
            TokenVerification::Expired => {
                if token.is_refresh() {
                    let user = get_user(&token.id, &mut conn)?;
                    if user.is_active == 0 {
                        return Err(Response::inactive_account());
                    }
                    let token = generate_jwt(&token.id);
                    Ok(Response::ok(json!({
                        "token": token,
                        "user": user
                    })))
                } else {
                    Err(Response::token_error("Token已过期，请重新登录"))
                }
            }
            TokenVerification::Error => Err(Response::token_error("Invalid token")),
        }
    } else {
        let data: LoginID = serde_json::from_value(value)?;
        if data.email.is_empty() || data.password.is_empty() {
            return Err(Response::invalid_value("邮箱和密码均不能为空"));
        }
        let digest = md5::compute(&data.password);
        let stored: Option<(String, Vec<u8>, i32)> = conn.query_first(format!(
            "SELECT id, password, is_active FROM user WHERE email = '{}'",
            data.email
        ))?;
        let Some((id, password, is_active)) = stored else {
            return Err(Response::wrong_password());
        };
        if password.as_slice() != digest.0.as_slice() {
            return Err(Response::wrong_password());
        }
        if is_active == 0 {
            return Err(Response::inactive_account());
        }
        let user = get_user(&id, &mut conn)?;
        debug_info(format!("员工 {} 登录成功", user.name));
        let token = generate_jwt(&id);
        Ok(Response::ok(json!({
            "token": token,
            "user": user
        })))
    }
}
