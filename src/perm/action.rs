use std::collections::HashMap;

lazy_static::lazy_static! {
    pub static ref PERMISSION_GROUPS: HashMap<&'static str, Vec<&'static str>> = {
        let mut map = HashMap::new();
        for (k, v) in groups() {
            map.insert(k, v);
        }
        map
    };
}

fn groups() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("customer", CUSTOMER.to_vec()),
        ("service", SERVICE.to_vec()),
        ("amc", AMC.to_vec()),
        ("account", ACCOUNT.to_vec()),
        ("report", REPORT.to_vec()),
        ("message", MESSAGE.to_vec()),
    ]
}

#[forbid(unused)]
pub static CUSTOMER: [&str; 5] = [
    CustomerGroup::QUERY,
    CustomerGroup::ENTER_CUSTOMER_DATA,
    CustomerGroup::UPDATE,
    CustomerGroup::DELETE_CUSTOMER_DATA,
    CustomerGroup::QUERY_HISTORY,
];

pub struct CustomerGroup;
impl CustomerGroup {
    pub const QUERY: &str = "query";
    pub const ENTER_CUSTOMER_DATA: &str = "enter_customer_data";
    pub const UPDATE: &str = "update_customer_data";
    pub const DELETE_CUSTOMER_DATA: &str = "delete_customer_data";
    /// 查看客户的服务与合同历史
    pub const QUERY_HISTORY: &str = "query_history";
}

#[forbid(unused)]
pub static SERVICE: [&str; 5] = [
    ServiceGroup::QUERY,
    ServiceGroup::CREATE,
    ServiceGroup::UPDATE,
    ServiceGroup::DELETE,
    ServiceGroup::COMPLETE,
];

pub struct ServiceGroup;
impl ServiceGroup {
    pub const QUERY: &str = "query";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const COMPLETE: &str = "complete";
}

#[forbid(unused)]
pub static AMC: [&str; 6] = [
    AmcGroup::QUERY,
    AmcGroup::CREATE,
    AmcGroup::UPDATE,
    AmcGroup::DELETE,
    AmcGroup::MARK_DUE,
    AmcGroup::RENEW,
];

pub struct AmcGroup;
impl AmcGroup {
    pub const QUERY: &str = "query";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const MARK_DUE: &str = "mark_due";
    pub const RENEW: &str = "renew";
}

#[forbid(unused)]
pub static ACCOUNT: [&str; 5] = [
    AccountGroup::QUERY,
    AccountGroup::CREATE,
    AccountGroup::UPDATE,
    AccountGroup::DELETE,
    AccountGroup::PERFORMANCE,
];

pub struct AccountGroup;
impl AccountGroup {
    pub const QUERY: &str = "query";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    /// 员工绩效统计
    pub const PERFORMANCE: &str = "performance";
}

#[forbid(unused)]
pub static REPORT: [&str; 2] = [ReportGroup::QUERY, ReportGroup::EXPORT];

pub struct ReportGroup;
impl ReportGroup {
    pub const QUERY: &str = "query";
    /// 导出 CSV
    pub const EXPORT: &str = "export";
}

#[forbid(unused)]
pub static MESSAGE: [&str; 1] = [MessageGroup::SEND];

pub struct MessageGroup;
impl MessageGroup {
    pub const SEND: &str = "send";
}
