use mysql::{prelude::Queryable, Pool, PooledConn, Result};

use crate::{Response, MYSQL_URI};

pub struct Database;
impl Database {
    /// 主键或唯一键已存在
    pub const DUPLICATE_KEY_ERROR_CODE: u16 = 1062;
    /// 外键无法匹配
    pub const FOREIGN_KEY_ERROR_CODE: u16 = 1452;
}

/// 捕获唯一键/外键冲突并映射为业务错误
#[macro_export]
macro_rules! catch {
    ($result:expr => dup $msg:expr) => {
        match $result {
            Ok(ok) => Ok(ok),
            Err(err) => Err(match err {
                mysql::Error::MySqlError(e)
                    if e.code == $crate::database::Database::DUPLICATE_KEY_ERROR_CODE =>
                {
                    $crate::Response::already_exist($msg)
                }
                e => $crate::Response::internal_server_error(e),
            }),
        }
    };
    ($result:expr => fk $msg:expr) => {
        match $result {
            Ok(ok) => Ok(ok),
            Err(err) => Err(match err {
                mysql::Error::MySqlError(e)
                    if e.code == $crate::database::Database::FOREIGN_KEY_ERROR_CODE =>
                {
                    $crate::Response::not_exist($msg)
                }
                e => $crate::Response::internal_server_error(e),
            }),
        }
    };
}

/// 成功提交，失败回滚
pub fn c_or_r<F, T>(f: F, conn: &mut PooledConn, param: T) -> std::result::Result<(), Response>
where
    F: Fn(&mut PooledConn, T) -> std::result::Result<(), Response>,
{
    conn.query_drop("BEGIN")?;
    match f(conn, param) {
        Ok(_) => {
            conn.query_drop("COMMIT")?;
            Ok(())
        }
        Err(e) => {
            conn.query_drop("ROLLBACK")?;
            Err(e)
        }
    }
}

/// 连接数据库
pub fn get_conn() -> Result<PooledConn> {
    unsafe { Pool::new(MYSQL_URI.as_str())?.get_conn() }
}

pub fn create_table() -> Result<()> {
    let mut conn = get_conn()?;
    let sql = include_str!("./table.sql");
    conn.query_drop(sql)
}
