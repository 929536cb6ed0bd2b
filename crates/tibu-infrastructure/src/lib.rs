// Infrastructure layer - Technical implementations
// Depends on domain layer, implements its capability and repository traits

pub mod browser;
pub mod config;
pub mod counterparty;
pub mod http;
pub mod logging;
pub mod openid;
pub mod otp;
pub mod pdf;
pub mod persistence;
