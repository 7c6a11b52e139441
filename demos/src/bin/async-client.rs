use httpobfs::{AsyncObfuscatedStream, Config};
use log::{error, info};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    const ADDRESS: &str = "127.0.0.1:9091";
    let socket = TcpStream::connect(ADDRESS).await?;
    let mut stream = AsyncObfuscatedStream::with_config_in(Config::from_address("example.com:8080")?, socket);
    info!("connected to server: {:?}", ADDRESS);

    stream.write_all(b"[iv]").await?;
    stream.write_all(b"[address]").await?;
    for i in 1..=2 {
        stream.write_all(format!("message {}", i).as_bytes()).await?;

        let mut buf = vec![0; 1024];
        match stream.read(&mut buf).await {
            Ok(n) if n > 0 => {
                info!("echo message received: {}", String::from_utf8_lossy(&buf[..n]));
            }
            Ok(_) => {
                info!("server closed connection");
                break;
            }
            Err(e) => {
                error!("read failed: {:?}", e);
                return Err(e);
            }
        }
    }
    stream.shutdown().await?;
    Ok(())
}
