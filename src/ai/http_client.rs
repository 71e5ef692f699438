//! Shared HTTP Client Module
//!
//! Global, lazy-initialized HTTP clients with connection pooling, shared by
//! the generative AI client and the hosted backend wrappers.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Global HTTP client for generation requests
///
/// Image generation can take close to a minute; the timeout covers one
/// request, not a whole video job (that has its own polling budget).
pub static GENAI_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .tcp_nodelay(true)
        .build()
        .expect("Failed to create generation HTTP client")
});

/// Global HTTP client for the hosted backend (auth, gallery, storage)
pub static BACKEND_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(5)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create backend HTTP client")
});

#[inline]
pub fn genai_client() -> &'static Client {
    &GENAI_CLIENT
}

#[inline]
pub fn backend_client() -> &'static Client {
    &BACKEND_CLIENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_are_same_instance() {
        assert!(std::ptr::eq(genai_client(), genai_client()));
        assert!(std::ptr::eq(backend_client(), backend_client()));
    }
}
