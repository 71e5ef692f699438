pub mod client;
pub mod error;
pub mod http_client;
pub mod media;
pub mod prompts;
pub mod types;

pub use client::*;
pub use error::*;
pub use prompts::*;
pub use types::*;
