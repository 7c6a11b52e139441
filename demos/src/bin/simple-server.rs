use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use log::{info, warn};

const RESPONSE_HEAD: &[u8] = b"HTTP/1.1 101 Switching Protocols\r\n\
    Server: nginx/1.24.0\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    \r\n";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    const ADDRESS: &str = "127.0.0.1:9091";
    let listener = TcpListener::bind(ADDRESS).await?;
    info!("Listening on address: {:?}", ADDRESS);

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("receiving obfs stream from a new client: {:?}", addr);
        tokio::spawn(async move {
            if let Err(e) = serve(socket).await {
                warn!("connection from {:?} failed: {:?}", addr, e);
            }
            info!("client closed connection: {:?}", addr);
        });
    }
}

/// Strips the disguised request, answers with a response header carrying
/// the echoed request body, then echoes everything else.
async fn serve(mut socket: TcpStream) -> std::io::Result<()> {
    let mut received = Vec::new();
    let mut buf = vec![0; 4096];
    let (head, mut body) = loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        received.extend_from_slice(&buf[..n]);
        if let Some(idx) = received.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&received[..idx]).into_owned();
            break (head, received[idx + 4..].to_vec());
        }
    };
    let content_length: usize = head
        .split("\r\n")
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .and_then(|len| len.parse().ok())
        .unwrap_or(0);
    if body.len() < content_length {
        let mut rest = vec![0; content_length - body.len()];
        socket.read_exact(&mut rest).await?;
        body.extend_from_slice(&rest);
    }
    info!("received request: {}", head.lines().next().unwrap_or_default());
    info!("received message: {}", String::from_utf8_lossy(&body));

    let mut response = RESPONSE_HEAD.to_vec();
    response.extend_from_slice(&body);
    socket.write_all(&response).await?;

    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return socket.shutdown().await;
        }
        info!("received message: {}", String::from_utf8_lossy(&buf[..n]));
        socket.write_all(&buf[..n]).await?;
    }
}
