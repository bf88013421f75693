use std::collections::BTreeMap;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use hmac::{Hmac, Mac};
use jwt::{AlgorithmType, Header, SignWithKey, Token, VerifyWithKey};
use mysql::{prelude::Queryable, PooledConn};
use sha2::Sha256;

use crate::{libs::time::TIME, Response};

const TOKEN_SECRET: &[u8] = b"amc-crm-rust-token-secret";
/// token 有效期，7 天
const TOKEN_MAX_AGE: i64 = 7 * 24 * 60 * 60;
/// 过期后 3 天内允许刷新
const TOKEN_REFRESH_AGE: i64 = 3 * 24 * 60 * 60;

pub struct Bearer {
    token: String,
}
impl Bearer {
    pub fn token(&self) -> &str {
        &self.token
    }
}

pub fn parse_bearer(headers: &HeaderMap) -> Option<Bearer> {
    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(Bearer {
        token: token.to_owned(),
    })
}

/// 提取 Authorization 头的 Bearer token。
/// 默认形式缺失即返回 401，`Allow Missing` 形式返回 Option
#[macro_export]
macro_rules! bearer {
    ($headers:expr) => {{
        match $crate::token::parse_bearer($headers) {
            Some(bearer) => bearer,
            None => return Err($crate::Response::token_error("Invalid token")),
        }
    }};
    ($headers:expr, Allow Missing) => {
        $crate::token::parse_bearer($headers)
    };
}

/// 解析并校验 token，返回操作者 id，校验失败直接返回 401
#[macro_export]
macro_rules! parse_jwt_macro {
    ($bearer:expr, $conn:expr) => {{
        let token = match $crate::token::parse_jwt($bearer) {
            Some(token) => token,
            None => return Err($crate::Response::token_error("Invalid token")),
        };
        match token.verify($conn)? {
            $crate::token::TokenVerification::Ok => token.id,
            $crate::token::TokenVerification::Expired => {
                return Err($crate::Response::token_error("Token已过期，请重新登录"))
            }
            $crate::token::TokenVerification::Error => {
                return Err($crate::Response::token_error("Invalid token"))
            }
        }
    }};
}

pub struct JwtToken {
    pub id: String,
    /// 签发时间，纳秒
    pub iat: i64,
}

pub enum TokenVerification {
    Ok,
    Expired,
    Error,
}

impl JwtToken {
    /// 校验签发时间，早于失效水位的 token 一律无效
    pub fn verify(&self, conn: &mut PooledConn) -> Result<TokenVerification, Response> {
        let tbn: Option<i64> = conn.query_first(format!(
            "SELECT tbn FROM token WHERE id = '{}'",
            self.id
        ))?;
        if tbn.is_some_and(|tbn| tbn >= self.iat) {
            return Ok(TokenVerification::Error);
        }
        let now = TIME::now()?.naos() as i64;
        Ok(match age_secs(self.iat, now) {
            Some(age) if age <= TOKEN_MAX_AGE => TokenVerification::Ok,
            Some(_) => TokenVerification::Expired,
            None => TokenVerification::Error,
        })
    }
    pub fn is_refresh(&self) -> bool {
        let now = TIME::now().unwrap_or_default().naos() as i64;
        age_secs(self.iat, now).is_some_and(|age| age <= TOKEN_MAX_AGE + TOKEN_REFRESH_AGE)
    }
}

/// 签发时间晚于当前时间视为非法
fn age_secs(iat: i64, now: i64) -> Option<i64> {
    let age = (now - iat) / 1_000_000_000;
    if age < 0 {
        None
    } else {
        Some(age)
    }
}

pub fn generate_jwt(id: &str) -> String {
    let key: Hmac<Sha256> = Hmac::new_from_slice(TOKEN_SECRET).expect("HMAC密钥初始化失败");
    let header = Header {
        algorithm: AlgorithmType::Hs256,
        ..Default::default()
    };
    let iat = TIME::now().unwrap_or_default().naos();
    let mut claims = BTreeMap::new();
    claims.insert("id", id.to_owned());
    claims.insert("iat", iat.to_string());
    let token = Token::new(header, claims)
        .sign_with_key(&key)
        .expect("签发token失败");
    token.as_str().into()
}

pub fn parse_jwt(bearer: &Bearer) -> Option<JwtToken> {
    let key: Hmac<Sha256> = Hmac::new_from_slice(TOKEN_SECRET).ok()?;
    let token: Token<Header, BTreeMap<String, String>, _> =
        VerifyWithKey::verify_with_key(bearer.token(), &key).ok()?;
    let claims = token.claims();
    Some(JwtToken {
        id: claims.get("id")?.clone(),
        iat: claims.get("iat")?.parse().ok()?,
    })
}

/// 上调失效水位，使该账号此前签发的所有 token 作废
pub fn revoke_tokens(id: &str, conn: &mut PooledConn) -> Result<(), Response> {
    let time = TIME::now()?;
    conn.query_drop(format!(
        "INSERT INTO token (id, tbn) VALUES ('{}', {}) ON DUPLICATE KEY UPDATE tbn = {}",
        id,
        time.naos(),
        time.naos()
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trip() {
        let token = generate_jwt("9000000001");
        let bearer = Bearer { token };
        let parsed = parse_jwt(&bearer).expect("解析失败");
        assert_eq!(parsed.id, "9000000001");
        assert!(parsed.iat > 0);
        assert!(parsed.is_refresh());
    }

    #[test]
    fn tampered_token_rejected() {
        let mut token = generate_jwt("9000000001");
        token.push('x');
        assert!(parse_jwt(&Bearer { token }).is_none());
    }

    #[test]
    fn age_rejects_future_iat() {
        assert_eq!(age_secs(2_000_000_000, 1_000_000_000), None);
        assert_eq!(age_secs(1_000_000_000, 3_000_000_000), Some(2));
    }
}
