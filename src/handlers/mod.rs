//! HTTP handlers

pub mod health;
pub mod auth;
pub mod profile;
pub mod forecast;
pub mod realtime;
pub mod info;
