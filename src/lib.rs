pub mod response;
pub mod token;

pub mod common;
pub mod database;
pub mod libs;
pub mod pages;
pub mod perm;

use chrono::prelude::TimeZone;
use libs::time::TIME;
pub use libs::{base64_decode, base64_encode};
pub use response::Response;

pub type ResponseResult = Result<Response, Response>;
#[inline]
pub fn debug_info(info: String) {
    let time = TIME::now().unwrap_or_default().naos();
    println!(
        "{} -- {}",
        chrono::Local.timestamp_nanos(time as i64).to_rfc3339(),
        info
    )
}

pub static mut MYSQL_URI: String = String::new();

/// 服务配置，config/setting.json
#[derive(serde::Serialize, serde::Deserialize)]
pub struct Config {
    mysql_user: String,
    mysql_password: String,
    mysql_host: String,
    mysql_port: u16,
    mysql_database: String,
    port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mysql_user: "root".to_owned(),
            mysql_password: "password".to_owned(),
            mysql_host: "localhost".to_owned(),
            mysql_port: 3306,
            mysql_database: "amc_crm".to_owned(),
            port: 8080,
        }
    }
}

impl Config {
    /// 读取配置，文件不存在时写入默认配置
    pub fn read() -> Config {
        match std::fs::read("config/setting.json") {
            Ok(bytes) => {
                serde_json::from_slice(&bytes).expect("配置文件config/setting.json已遭到损坏")
            }
            Err(_) => {
                let config = Config::default();
                let buf = serde_json::to_string_pretty(&config).expect("序列化默认配置失败");
                std::fs::write("config/setting.json", buf.as_bytes()).expect("写入配置文件失败");
                config
            }
        }
    }
    pub fn mysql_addr(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.mysql_user,
            self.mysql_password,
            self.mysql_host,
            self.mysql_port,
            self.mysql_database
        )
    }
    pub fn port(&self) -> u16 {
        self.port
    }
}
