//! Мінімальний HTTP health-check для хостингу: на будь-яке з'єднання
//! відповідає `200 OK` і закриває його.

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK";

pub async fn bind(port: u16) -> std::io::Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Health check listener started");
    Ok(listener)
}

pub async fn serve(listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((socket, peer)) => {
                tokio::spawn(async move {
                    if let Err(error) = respond(socket).await {
                        tracing::debug!(peer = %peer, error = %error, "Health check response failed");
                    }
                });
            }
            Err(error) => {
                tracing::warn!(error = %error, "Health check accept failed");
            }
        }
    }
}

async fn respond(mut socket: TcpStream) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    // Запит не розбирається, його лише вичитуємо.
    let _ = socket.read(&mut buf).await?;
    socket.write_all(RESPONSE).await?;
    socket.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_ok_to_any_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        client.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.ends_with("\r\n\r\nOK"));
        server.abort();
    }
}
