use std::sync::Arc;

use dashmap::DashMap;

use crate::pages::User;

macro_rules! gen_cache {
    ($(($N:ident, $T:ty)), +) => {
        lazy_static::lazy_static! {
            $(
                pub static ref $N: Arc<DashMap<String, $T>> = {
                    Arc::new(DashMap::new())
                };
            )+
        }
    };
}

gen_cache! {
    (USER_CACHE, User)
}
