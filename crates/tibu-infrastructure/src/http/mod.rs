mod bridge;
mod cookies;

pub use bridge::{ReqwestInternetProvider, USER_AGENT};
