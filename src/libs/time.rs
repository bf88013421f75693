use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use chrono::prelude::TimeZone;

/// 时间格式
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy)]
pub enum TimeFormat {
    YYYYMMDD_HHMMSS,
    YYYYMMDD,
    HHMMSS,
}

/// Unix 纪元以来的纳秒数
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Default, Clone, Copy)]
pub struct TIME(u64);

impl TIME {
    pub fn now() -> Result<TIME, SystemTimeError> {
        let naos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        Ok(TIME(naos as u64))
    }
    /// 纳秒
    pub fn naos(&self) -> u64 {
        self.0
    }
    pub fn format(&self, format: TimeFormat) -> String {
        let local = chrono::Local.timestamp_nanos(self.0 as i64);
        match format {
            TimeFormat::YYYYMMDD_HHMMSS => local.format("%Y-%m-%d %H:%M:%S").to_string(),
            TimeFormat::YYYYMMDD => local.format("%Y-%m-%d").to_string(),
            TimeFormat::HHMMSS => local.format("%H:%M:%S").to_string(),
        }
    }
}

impl From<chrono::DateTime<chrono::Local>> for TIME {
    fn from(value: chrono::DateTime<chrono::Local>) -> Self {
        TIME(value.timestamp_nanos_opt().unwrap_or_default() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_shapes() {
        let time = TIME::now().unwrap();
        assert_eq!(time.format(TimeFormat::YYYYMMDD).len(), 10);
        assert_eq!(time.format(TimeFormat::YYYYMMDD_HHMMSS).len(), 19);
        assert_eq!(time.format(TimeFormat::HHMMSS).len(), 8);
    }
}
