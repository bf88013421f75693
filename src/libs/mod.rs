pub mod cache;
pub mod dser;
pub mod time;

use base64::prelude::Engine;
pub use time::{TimeFormat, TIME};

/// base64 url safe encode
pub fn base64_encode(input: impl AsRef<[u8]>) -> String {
    base64::prelude::BASE64_URL_SAFE_NO_PAD.encode(input)
}

/// base64 url safe decode
pub fn base64_decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, base64::DecodeError> {
    base64::prelude::BASE64_URL_SAFE_NO_PAD.decode(input)
}
/// 三目运算符，用宏简单实现
#[macro_export]
macro_rules! do_if {
    ($pat:expr => $suc:expr, $e:expr) => {
        if $pat {
            $suc
        } else {
            $e
        }
    };
}

/// 生成记录 id：种子 + 纳秒时间戳 + 随机数
pub fn gen_id(time: &TIME, seed: &str) -> String {
    let salt: u32 = rand::random();
    base64_encode(format!("{}{}{}", seed, time.naos(), salt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_id_distinct() {
        let time = TIME::now().unwrap();
        let a = gen_id(&time, "客户A");
        let b = gen_id(&time, "客户A");
        assert_ne!(a, b);
        assert!(!a.contains('/'));
        assert!(!a.contains('+'));
    }
}
