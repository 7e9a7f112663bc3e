//! HTTP client for the Taskwise API.
//!
//! Every backend call goes through one [`ApiClient`]. It reads the bearer
//! token from a [`TokenStore`] before each request, so logging in or out
//! takes effect on the next call without rebuilding the client.

mod client;
mod config;
mod error;
mod token;
mod upload;

pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::ClientError;
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, AUTH_TOKEN_KEY};
pub use upload::UploadFile;
