// handlers/protected/mod.rs - Endpoints open to any authenticated, active user

pub mod auth;
pub mod notifications;
