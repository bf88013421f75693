lazy_static::lazy_static! {
    static ref MOBILE_REGEX: regex::Regex = regex::Regex::new(r"^\d{10}$").expect("手机号正则非法");
}

/// 手机号固定 10 位数字
pub fn is_valid_mobile(mobile: &str) -> bool {
    MOBILE_REGEX.is_match(mobile)
}

#[cfg(test)]
mod tests {
    use super::is_valid_mobile;

    #[test]
    fn mobile_must_be_ten_digits() {
        assert!(is_valid_mobile("9000000001"));
        assert!(!is_valid_mobile("900000001"));
        assert!(!is_valid_mobile("90000000012"));
        assert!(!is_valid_mobile("90000000a1"));
        assert!(!is_valid_mobile(""));
    }
}
