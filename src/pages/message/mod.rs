use axum::{http::HeaderMap, routing::post, Json, Router};
use mysql::prelude::Queryable;
use serde_json::{json, Value};

use crate::{
    bearer, database::get_conn, pages::account::get_user, parse_jwt_macro,
    perm::{action::MessageGroup, verify_permissions},
    Response, ResponseResult,
};

pub fn message_router() -> Router {
    Router::new()
        .route("/notifications/send", post(send_to_customer))
        .route("/notifications/send-all", post(send_to_all))
}

lazy_static::lazy_static! {
    static ref NON_DIGIT: regex::Regex = regex::Regex::new(r"\D").expect("正则非法");
}

/// 过滤非数字字符后拼 wa.me 链接，不做任何投递
pub fn whatsapp_url(phone: &str, message: &str) -> String {
    let digits = NON_DIGIT.replace_all(phone, "");
    format!("https://wa.me/{}?text={}", digits, urlencoding::encode(message))
}

/// 合同到期提醒文案
pub fn amc_reminder_message(customer: &str, amc_name: &str, end_date: &str) -> String {
    format!(
        "Hello {customer}, your AMC for {amc_name} expires on {end_date}. \
        Please renew it to continue services."
    )
}

/// 完工确认文案
pub fn service_completion_message(customer: &str, service_type: &str) -> String {
    format!(
        "Hello {customer}, your {service_type} service has been completed. \
        Thank you for choosing us!"
    )
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendParams {
    phone_number: String,
    message: String,
}

async fn send_to_customer(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "message", MessageGroup::SEND, None).await {
        return Err(Response::permission_denied());
    }
    let params: SendParams = serde_json::from_value(value)?;
    if params.phone_number.is_empty() || params.message.is_empty() {
        return Err(Response::invalid_value("phoneNumber和message均不能为空"));
    }
    let url = whatsapp_url(&params.phone_number, &params.message);
    Ok(Response::ok_with_message(
        json!({ "whatsappUrl": url }),
        "WhatsApp链接已生成",
    ))
}

/// 为当前全部客户各生成一条链接，一次性放在内存里返回
async fn send_to_all(headers: HeaderMap, Json(value): Json<Value>) -> ResponseResult {
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !verify_permissions(&user.role, "message", MessageGroup::SEND, None).await {
        return Err(Response::permission_denied());
    }
    let message = op::some!(
        value.get("message").and_then(|m| m.as_str()).filter(|m| !m.is_empty());
        ret Err(Response::invalid_value("message不能为空")));
    let customers = conn.query_map(
        "SELECT id, name, mobile FROM customer",
        |(id, name, mobile): (String, String, String)| (id, name, mobile),
    )?;
    if customers.is_empty() {
        return Err(Response::not_exist("没有客户"));
    }
    let total = customers.len();
    let list: Vec<Value> = customers
        .into_iter()
        .map(|(id, name, mobile)| {
            let url = whatsapp_url(&mobile, message);
            json!({
                "customerId": id,
                "customerName": name,
                "phoneNumber": mobile,
                "whatsappUrl": url,
                "message": message
            })
        })
        .collect();
    Ok(Response::ok_with_message(
        json!({
            "totalCustomers": total,
            "list": list
        }),
        "已为全部客户生成WhatsApp链接",
    ))
}

#[cfg(test)]
mod tests {
    use super::{amc_reminder_message, service_completion_message, whatsapp_url};

    #[test]
    fn strips_non_digits() {
        assert_eq!(
            whatsapp_url("+91 98765-43210", "hi"),
            "https://wa.me/919876543210?text=hi"
        );
        assert_eq!(
            whatsapp_url("9000000001", "hi"),
            "https://wa.me/9000000001?text=hi"
        );
    }

    #[test]
    fn encodes_message_text() {
        assert_eq!(
            whatsapp_url("9000000001", "Hello world & more"),
            "https://wa.me/9000000001?text=Hello%20world%20%26%20more"
        );
    }

    #[test]
    fn canned_messages_mention_subject() {
        let reminder = amc_reminder_message("A", "Annual", "2025-01-15");
        assert!(reminder.contains("Annual"));
        assert!(reminder.contains("2025-01-15"));
        let done = service_completion_message("A", "repair");
        assert!(done.contains("repair"));
    }
}
