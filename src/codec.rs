//! Encoding of the disguised request and framing of the response header.
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use rand::Rng;

use crate::specification::{
    HEADER_TERMINATOR, REQUEST_LINE, USER_AGENT_MINOR_MAX, USER_AGENT_PATCH_MAX, WEBSOCKET_KEY_LEN,
};

/// Serializes the disguised request head followed by `body`.
pub(crate) fn encode_request(
    host_header: &str,
    user_agent: &str,
    websocket_key: &str,
    body: &[u8],
) -> Vec<u8> {
    let head = format!(
        "{REQUEST_LINE}\r\n\
         Host: {host_header}\r\n\
         User-Agent: {user_agent}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: {websocket_key}\r\n\
         Content-Length: {}\r\n\
         \r\n",
        body.len()
    );

    let mut request = Vec::with_capacity(head.len() + body.len());
    request.extend_from_slice(head.as_bytes());
    request.extend_from_slice(body);
    request
}

/// A command-line client identifier with randomized version numbers.
pub(crate) fn random_user_agent(rng: &mut impl Rng) -> String {
    format!(
        "curl/7.{}.{}",
        rng.random_range(0..USER_AGENT_MINOR_MAX),
        rng.random_range(0..USER_AGENT_PATCH_MAX)
    )
}

/// Encodes the key material of the `Sec-WebSocket-Key` header.
pub(crate) fn websocket_key(random: &[u8; WEBSOCKET_KEY_LEN]) -> String {
    URL_SAFE.encode(random)
}

/// Returns the offset of the first header terminator in `buf`.
pub(crate) fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}
