//! The informal specification of the HTTP obfuscation handshake.

// Request, sent once in place of the first three writes:
// ```text
// GET / HTTP/1.1\r\n
// Host: <host>[:<port> unless port is "80"]\r\n
// User-Agent: curl/7.<minor>.<patch>\r\n
// Upgrade: websocket\r\n
// Connection: Upgrade\r\n
// Sec-WebSocket-Key: <base64url(16 random bytes)>\r\n
// Content-Length: <N>\r\n
// \r\n
// <N bytes: write #1 | write #2 | write #3>
// ```
pub(crate) const REQUEST_LINE: &str = "GET / HTTP/1.1";
pub(crate) const FIRST_REQUEST_FRAGMENTS: usize = 2;
pub(crate) const WEBSOCKET_KEY_LEN: usize = 16;
pub(crate) const USER_AGENT_MINOR_MAX: u32 = 54;
pub(crate) const USER_AGENT_PATCH_MAX: u32 = 2;

// Response, received once before the payload:
// ```text
// | status line and headers (not validated) | \r\n\r\n | payload ... |
// ```
pub(crate) const HEADER_TERMINATOR: &[u8; 4] = b"\r\n\r\n";
