use std::collections::HashMap;

use crate::{
    bearer, database::get_conn, pages::account::get_user, parse_jwt_macro, Response,
    ResponseResult,
};
use axum::{
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use mysql::{prelude::Queryable, PooledConn};
use serde_json::json;
use tokio::sync::Mutex;
pub type PermissionGroupMap = HashMap<String, HashMap<String, Vec<String>>>;
#[allow(elided_lifetimes_in_associated_constant)]
pub(crate) mod action;

lazy_static::lazy_static! {
    pub static ref ROLES_GROUP_MAP: Mutex<HashMap<String, PermissionGroupMap>> = {
        let map = if let Ok(bytes) = std::fs::read("data/perm") {
            serde_json::from_slice(&bytes).expect("权限文件结构遭到破坏，请联系开发人员进行修复")
        } else {
            let mut map = HashMap::new();
            map.insert("employee".to_owned(), role_employee());
            std::fs::write("data/perm", json!(map.clone()).to_string().as_bytes()).expect("写入权限文件失败");
            map
        };
        Mutex::new(map)
    };
}
pub async fn update_role_map(role: &str, perms: PermissionGroupMap) -> Result<(), Response> {
    use std::fs::write;
    let mut map = ROLES_GROUP_MAP.lock().await;
    map.insert(role.to_owned(), perms);
    write("data/perm", json!(map.clone()).to_string().as_bytes())?;
    Ok(())
}

/// 员工默认权限：员工管理与报表导出之外的全部操作
fn role_employee() -> PermissionGroupMap {
    use action::*;
    let mut map = HashMap::new();
    map.insert(
        "customer".to_string(),
        CUSTOMER.iter().map(|x| (x.to_string(), vec![])).collect(),
    );
    map.insert(
        "service".to_string(),
        SERVICE.iter().map(|x| (x.to_string(), vec![])).collect(),
    );
    map.insert(
        "amc".to_string(),
        AMC.iter().map(|x| (x.to_string(), vec![])).collect(),
    );
    map.insert("account".to_owned(), {
        let mut map = HashMap::new();
        map.insert(AccountGroup::QUERY.to_owned(), vec![]);
        map
    });
    map.insert("report".to_owned(), {
        let mut map = HashMap::new();
        map.insert(ReportGroup::QUERY.to_owned(), vec![]);
        map
    });
    map.insert("message".to_owned(), {
        let mut map = HashMap::new();
        map.insert(MessageGroup::SEND.to_owned(), vec![]);
        map
    });
    map
}

pub fn perm_router() -> Router {
    Router::new()
        .route("/get/perm", get(get_perm))
        .route("/set/perm", post(set_perm))
}

/// admin 放行一切，其余角色查权限表
pub async fn verify_permissions(
    role: &str,
    perm: &str,
    action: &str,
    data: Option<&[&str]>,
) -> bool {
    if role.eq("admin") {
        return true;
    }
    let role_perm_maps = ROLES_GROUP_MAP.lock().await;
    let role_perms = op::some!(role_perm_maps.get(role); ret false);

    op::some!(role_perms.get(perm); ret false)
        .get(action)
        .map_or(false, |v| {
            data.map_or(true, |d| d.iter().all(|k| v.contains(&k.to_string())))
        })
}

async fn get_perm(headers: HeaderMap) -> ResponseResult {
    let mut conn = get_conn()?;
    let bearer = bearer!(&headers);
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let role = get_role(&id, &mut conn)?;
    if role.eq("admin") {
        return Ok(Response::ok(json!("all")));
    }
    let perm_map = ROLES_GROUP_MAP.lock().await;
    if let Some(perms) = perm_map.get(&role) {
        Ok(Response::ok(json!(perms)))
    } else {
        Ok(Response::ok(json!(PermissionGroupMap::new())))
    }
}

/// 调整指定角色的权限表，仅管理员可用
async fn set_perm(headers: HeaderMap, Json(value): Json<serde_json::Value>) -> ResponseResult {
    #[derive(serde::Deserialize)]
    struct Params {
        role: String,
        perms: PermissionGroupMap,
    }
    let bearer = bearer!(&headers);
    let mut conn = get_conn()?;
    let id = parse_jwt_macro!(&bearer, &mut conn);
    let user = get_user(&id, &mut conn)?;
    if !user.role.eq("admin") {
        return Err(Response::permission_denied());
    }
    let params: Params = serde_json::from_value(value)?;
    if params.role.eq("admin") {
        return Err(Response::invalid_value("admin角色的权限不可修改"));
    }
    for (group, actions) in &params.perms {
        let known = op::some!(action::PERMISSION_GROUPS.get(group.as_str());
            ret Err(Response::invalid_value(format!("未知权限组: {group}"))));
        if let Some(action) = actions.keys().find(|a| !known.contains(&a.as_str())) {
            return Err(Response::invalid_value(format!("未知操作: {group}.{action}")));
        }
    }
    update_role_map(&params.role, params.perms).await?;
    Ok(Response::empty())
}
#[inline(always)]
pub fn get_role(id: &str, conn: &mut PooledConn) -> Result<String, Response> {
    let role = op::some!(conn.query_first(format!("SELECT role FROM user WHERE id = '{id}'"))?; ret Err(Response::not_exist("用户不存在")));
    Ok(role)
}
