use std::{
    io::{Read, Write},
    net::TcpStream,
    time::Duration,
};

use httpobfs::{Config, Connection, ObfuscatedStream};
use log::{error, info};

fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    const ADDRESS: &str = "127.0.0.1:9091";
    let socket = TcpStream::connect(ADDRESS)?;
    let mut stream = ObfuscatedStream::with_config_in(
        Config::builder_with_host("www.bing.com").with_default_port(),
        socket,
    );
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    info!("connected to server: {:?}", ADDRESS);

    // The first three writes leave as one disguised request.
    stream.write_all(b"[iv]")?;
    stream.write_all(b"[address]")?;
    stream.write_all(b"message 1")?;

    for i in 2..=3 {
        let mut buf = vec![0; 1024];
        match stream.read(&mut buf) {
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
        stream.write_all(format!("message {}", i).as_bytes())?;
    }
    stream.close()
}
