use std::{sync::OnceLock, time::Duration};

use reqwest::header::HeaderMap;
use tracing::debug;

/// User agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("modwatch/", env!("CARGO_PKG_VERSION"));

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build a `reqwest::Client` with the crate's user agent, a request timeout
/// and headers that go on every request (auth keys and the like).
pub fn build_client(
    request_timeout: Duration,
    default_headers: HeaderMap,
) -> crate::Result<reqwest::Client> {
    install_rustls_provider();

    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(default_headers);

    if request_timeout > Duration::ZERO {
        builder = builder.timeout(request_timeout);
    }

    Ok(builder.build()?)
}
