// handlers/public/mod.rs - Token acquisition endpoints, no authentication

pub mod auth;
