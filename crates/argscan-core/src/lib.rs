//! Core building blocks shared by every ARGscan crate.
//!
//! This crate provides:
//! - The unified [`error::AppError`] type and its [`error::ErrorKind`] taxonomy
//! - The [`result::AppResult`] alias used at crate boundaries
//! - Configuration schemas loaded from TOML files and environment variables

pub mod config;
pub mod error;
pub mod result;
