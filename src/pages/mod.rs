use axum::Router;

pub mod account;
pub mod func;
mod message;
pub mod user;

pub use account::User;

pub fn pages_router() -> Router {
    account::account_router()
        .merge(func::func_router())
        .merge(message::message_router())
        .merge(user::user_router())
}
