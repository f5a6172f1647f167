//! Shared fixtures for unit tests.

use axum::Router;

use crate::config::Config;

/// A backend response frame carrying `text`, as observed on the wire.
pub fn frame(text: &str) -> Vec<u8> {
    let len = u8::try_from(text.len()).expect("test fragments stay under 256 bytes");
    let mut out = vec![0x00, 0x00, 0x00, 0x00, len + 2, 0x0A, len];
    out.extend_from_slice(text.as_bytes());
    out
}

/// Default configuration pointed at `base_url`, with `token` set verbatim.
pub fn config_for(base_url: &str, token: &str) -> Config {
    let mut config = Config::from_lookup(|_| None).expect("defaults are valid");
    config.cursor_api_url = base_url.to_string();
    config.cursor_token = token.to_string();
    config.api_key = "test-key".to_string();
    config
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}
