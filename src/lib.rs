// FieldOps session - library root

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod navigation;
pub mod pipeline;
pub mod storage;

#[cfg(test)]
mod test_support;

pub use client::SessionClient;
pub use error::ApiError;
pub use pipeline::AuthPipeline;
