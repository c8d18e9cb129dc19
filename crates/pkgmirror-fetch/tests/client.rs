use std::net::SocketAddr;
use std::time::Duration;

use pkgmirror_fetch::{
    HttpClient, HttpConfig, ReqwestClient, RedirectPolicy, RedirectResolver, Resolution,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serve one HTTP response whose body arrives in `chunks` pieces, `gap`
/// apart, after an initial `stall`.
async fn trickle_server(chunks: usize, gap: Duration, stall: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/octet-stream\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
            chunks * 10
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        tokio::time::sleep(stall).await;
        for _ in 0..chunks {
            if socket.write_all(&[b'x'; 10]).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
            tokio::time::sleep(gap).await;
        }
    });
    addr
}

fn short_timeout_client() -> ReqwestClient {
    ReqwestClient::new(&HttpConfig {
        timeout: Duration::from_millis(500),
        user_agent: "pkgmirror-test".into(),
    })
    .unwrap()
}

#[test]
fn client_builds_from_config() {
    let config = HttpConfig {
        timeout: Duration::from_secs(5),
        user_agent: "pkgmirror-test".into(),
    };
    assert!(ReqwestClient::new(&config).is_ok());
}

#[test]
fn default_timeout_is_thirty_seconds() {
    assert_eq!(HttpConfig::default().timeout, Duration::from_secs(30));
}

#[tokio::test]
async fn resolver_short_circuits_plain_links_with_real_client() {
    let client = ReqwestClient::new(&HttpConfig::default()).unwrap();
    let resolver = RedirectResolver::new(client, RedirectPolicy::default());

    let resolution = resolver
        .resolve("https://files.invalid/packages/source/a/alpha/alpha-1.0.tar.gz")
        .await;

    match resolution {
        Resolution::Resolved(download) => assert_eq!(download.filename, "alpha-1.0.tar.gz"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn slow_download_outlives_the_request_timeout() {
    let addr = trickle_server(6, Duration::from_millis(200), Duration::ZERO).await;
    let client = short_timeout_client();

    let response = client
        .get(&format!("http://{addr}/big.whl"), &[])
        .await
        .unwrap();
    let body = response.bytes().await.unwrap();

    assert_eq!(body.len(), 60);
}

#[tokio::test]
async fn stalled_download_times_out() {
    let addr = trickle_server(1, Duration::ZERO, Duration::from_secs(3)).await;
    let client = short_timeout_client();

    let result = match client.get(&format!("http://{addr}/stuck.whl"), &[]).await {
        Ok(response) => response.bytes().await.map(|_| ()),
        Err(e) => Err(e),
    };

    assert!(result.is_err());
}
