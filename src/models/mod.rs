//! Data models

pub mod farmer;

pub use farmer::*;
