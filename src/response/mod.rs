use std::fmt::Display;

use axum::{http::StatusCode, Json};
use serde::{ser::SerializeStruct, Serialize};
use serde_json::Value;
/// 响应数据，统一 { success, data?, message? } 结构
#[derive(Debug)]
pub struct Response {
    /// 响应状态码
    code: StatusCode,
    success: bool,
    data: Value,
    message: Option<String>,
}

impl axum::response::IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        let code = self.code;
        (code, Json(self)).into_response()
    }
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut len = 1;
        if !self.data.is_null() {
            len += 1;
        }
        if self.message.is_some() {
            len += 1;
        }
        let mut s = serializer.serialize_struct("Response", len)?;
        s.serialize_field("success", &self.success)?;
        if !self.data.is_null() {
            s.serialize_field("data", &self.data)?;
        }
        if let Some(message) = &self.message {
            s.serialize_field("message", message)?;
        }
        s.end()
    }
}
impl Response {
    pub fn new(code: StatusCode, success: bool, data: Value, message: Option<String>) -> Response {
        Self {
            code,
            success,
            data,
            message,
        }
    }
    pub fn ok(data: Value) -> Self {
        Self::new(StatusCode::OK, true, data, None)
    }
    pub fn ok_with_message(data: Value, message: impl Display) -> Self {
        Self::new(StatusCode::OK, true, data, Some(message.to_string()))
    }
    pub fn created(data: Value) -> Self {
        Self::new(StatusCode::CREATED, true, data, None)
    }
    pub fn empty() -> Self {
        Self::new(StatusCode::OK, true, Value::Null, None)
    }
    pub fn message(message: impl Display) -> Self {
        Self::new(StatusCode::OK, true, Value::Null, Some(message.to_string()))
    }
    pub fn token_error(e: impl Display) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            false,
            Value::Null,
            Some(e.to_string()),
        )
    }
    /// 内部错误
    pub fn internal_server_error(e: impl Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            false,
            Value::Null,
            Some(e.to_string()),
        )
    }
    /// 参数格式错误
    pub fn invalid_format(e: impl Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            false,
            Value::Null,
            Some(e.to_string()),
        )
    }
    /// 缺少必填字段或字段值非法
    pub fn invalid_value(e: impl Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            false,
            Value::Null,
            Some(e.to_string()),
        )
    }
    /// 请求的数据不存在
    pub fn not_exist(e: impl Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            false,
            Value::Null,
            Some(e.to_string()),
        )
    }
    /// 要添加的数据已存在
    pub fn already_exist(e: impl Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            false,
            Value::Null,
            Some(e.to_string()),
        )
    }
    /// 当前状态不满足操作条件
    pub fn dissatisfy(e: impl Display) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            false,
            Value::Null,
            Some(e.to_string()),
        )
    }
    /// 权限不足
    pub fn permission_denied() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            false,
            Value::Null,
            Some("权限不足".to_string()),
        )
    }
    /// 账号或密码错误
    pub fn wrong_password() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            false,
            Value::Null,
            Some("账号或密码错误".to_string()),
        )
    }
    /// 账号已停用
    pub fn inactive_account() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            false,
            Value::Null,
            Some("账号已停用".to_string()),
        )
    }
    pub fn code(&self) -> StatusCode {
        self.code
    }
    pub fn success(&self) -> bool {
        self.success
    }
}

impl From<mysql::Error> for Response {
    fn from(value: mysql::Error) -> Self {
        Self::internal_server_error(value)
    }
}
impl From<std::io::Error> for Response {
    fn from(value: std::io::Error) -> Self {
        Self::internal_server_error(value)
    }
}

impl From<serde_json::Error> for Response {
    fn from(value: serde_json::Error) -> Self {
        Response::invalid_format(value)
    }
}
impl From<std::time::SystemTimeError> for Response {
    fn from(value: std::time::SystemTimeError) -> Self {
        Response::internal_server_error(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Response;
    use axum::http::StatusCode;

    #[test]
    fn error_taxonomy_status_codes() {
        assert_eq!(Response::invalid_value("x").code(), StatusCode::BAD_REQUEST);
        assert_eq!(Response::already_exist("x").code(), StatusCode::BAD_REQUEST);
        assert_eq!(Response::dissatisfy("x").code(), StatusCode::BAD_REQUEST);
        assert_eq!(Response::token_error("x").code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Response::permission_denied().code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(Response::wrong_password().code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Response::not_exist("x").code(), StatusCode::NOT_FOUND);
        assert_eq!(
            Response::internal_server_error("x").code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(Response::ok(serde_json::json!(1)).code(), StatusCode::OK);
        assert_eq!(
            Response::created(serde_json::json!(1)).code(),
            StatusCode::CREATED
        );
    }

    #[test]
    fn body_shape_is_success_data_message() {
        let body = serde_json::to_value(Response::ok(serde_json::json!({"a": 1}))).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["a"], 1);
        assert!(body.get("message").is_none());

        let body = serde_json::to_value(Response::not_exist("客户不存在")).unwrap();
        assert_eq!(body["success"], false);
        assert!(body.get("data").is_none());
        assert_eq!(body["message"], "客户不存在");
    }
}
