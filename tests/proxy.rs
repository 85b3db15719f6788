use cashmere::ruleset::{ConnectingRule, ProxyingRule, Ruleset, Target};
use cashmere::socks::{Socks, Socks4, Socks5, UserTable};
use cashmere::tcp::TcpTransport;
use cashmere::Proxy;
use std::collections::HashMap;
use std::net::{SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Echo server the proxy will tunnel to.
async fn spawn_echo() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut reader, mut writer) = stream.into_split();
            tokio::spawn(async move {
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

async fn spawn_proxy(socks: Socks, ruleset: Ruleset) -> SocketAddr {
    let mut transport = TcpTransport::bind("127.0.0.1", 0, None).await.unwrap();
    let addr = transport.local_addr().unwrap();
    let handler = Arc::new(Proxy::new(socks, ruleset));
    tokio::spawn(async move { transport.serve(handler).await });
    addr
}

fn net(s: &str) -> ipnetwork::IpNetwork {
    s.parse().unwrap()
}

fn allow_all() -> Ruleset {
    Ruleset::new(
        vec![ConnectingRule::new(net("0.0.0.0/0"))],
        vec![],
        vec![ProxyingRule::new(net("0.0.0.0/0"), Target::Net(net("0.0.0.0/0")))],
        vec![],
    )
}

fn v4(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(_) => panic!("expected an IPv4 listener"),
    }
}

#[tokio::test]
async fn socks5_tunnels_to_an_echo_server() {
    let echo = v4(spawn_echo().await);
    let proxy = spawn_proxy(Socks::V5(Socks5::new(None, None)), allow_all()).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(b"\x05\x01\x00").await.unwrap();
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await.unwrap();
    assert_eq!(&greeting, b"\x05\x00");

    let mut connect = vec![0x05, 0x01, 0x00, 0x01];
    connect.extend_from_slice(&echo.ip().octets());
    connect.extend_from_slice(&echo.port().to_be_bytes());
    stream.write_all(&connect).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    let mut expected = vec![0x05, 0x00, 0x00, 0x01];
    expected.extend_from_slice(&echo.ip().octets());
    expected.extend_from_slice(&echo.port().to_be_bytes());
    assert_eq!(&reply[..], &expected[..]);

    stream.write_all(b"hello world").await.unwrap();
    let mut echoed = [0u8; 11];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"hello world");
}

#[tokio::test]
async fn socks4_tunnels_to_an_echo_server() {
    let echo = v4(spawn_echo().await);
    let proxy = spawn_proxy(Socks::V4(Socks4::new(None, None)), allow_all()).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let mut request = vec![0x04, 0x01];
    request.extend_from_slice(&echo.port().to_be_bytes());
    request.extend_from_slice(&echo.ip().octets());
    request.push(0x00);
    stream.write_all(&request).await.unwrap();

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await.unwrap();
    let mut expected = vec![0x00, 0x5a];
    expected.extend_from_slice(&echo.port().to_be_bytes());
    expected.extend_from_slice(&echo.ip().octets());
    assert_eq!(&reply[..], &expected[..]);

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");
}

#[tokio::test]
async fn socks5_auth_tunnels_to_an_echo_server() {
    let echo = v4(spawn_echo().await);
    let mut users = HashMap::new();
    users.insert("user".to_string(), "passwd".to_string());
    let socks = Socks::V5(Socks5::new(Some(Arc::new(UserTable::new(users))), None));
    let proxy = spawn_proxy(socks, allow_all()).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(b"\x05\x01\x02").await.unwrap();
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await.unwrap();
    assert_eq!(&greeting, b"\x05\x02");

    stream.write_all(b"\x01\x04user\x06passwd").await.unwrap();
    let mut status = [0u8; 2];
    stream.read_exact(&mut status).await.unwrap();
    assert_eq!(&status, b"\x01\x00");

    let mut connect = vec![0x05, 0x01, 0x00, 0x01];
    connect.extend_from_slice(&echo.ip().octets());
    connect.extend_from_slice(&echo.port().to_be_bytes());
    stream.write_all(&connect).await.unwrap();
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[1], 0x00);

    stream.write_all(b"ping").await.unwrap();
    let mut echoed = [0u8; 4];
    stream.read_exact(&mut echoed).await.unwrap();
    assert_eq!(&echoed, b"ping");
}

#[tokio::test]
async fn blocked_destination_gets_rule_failure() {
    let ruleset = Ruleset::new(
        vec![ConnectingRule::new(net("0.0.0.0/0"))],
        vec![],
        vec![ProxyingRule::new(net("0.0.0.0/0"), Target::Net(net("0.0.0.0/0")))],
        vec![ProxyingRule::new(net("0.0.0.0/0"), Target::Net(net("8.8.8.8")))],
    );
    let proxy = spawn_proxy(Socks::V5(Socks5::new(None, None)), ruleset).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(b"\x05\x01\x00").await.unwrap();
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await.unwrap();

    stream
        .write_all(b"\x05\x01\x00\x01\x08\x08\x08\x08\x01\xbb")
        .await
        .unwrap();
    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    // connection not allowed by ruleset, destination echoed back
    assert_eq!(&reply, b"\x05\x02\x00\x01\x08\x08\x08\x08\x01\xbb");
}

#[tokio::test]
async fn unreachable_destination_gets_host_unreachable() {
    // grab a port nobody is listening on
    let vacated = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        v4(listener.local_addr().unwrap())
    };
    let proxy = spawn_proxy(Socks::V5(Socks5::new(None, None)), allow_all()).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(b"\x05\x01\x00").await.unwrap();
    let mut greeting = [0u8; 2];
    stream.read_exact(&mut greeting).await.unwrap();

    let mut connect = vec![0x05, 0x01, 0x00, 0x01];
    connect.extend_from_slice(&vacated.ip().octets());
    connect.extend_from_slice(&vacated.port().to_be_bytes());
    stream.write_all(&connect).await.unwrap();

    let mut reply = [0u8; 10];
    stream.read_exact(&mut reply).await.unwrap();
    assert_eq!(reply[1], 0x04);
}

#[tokio::test]
async fn blocked_client_is_dropped_without_a_reply() {
    let ruleset = Ruleset::new(
        vec![ConnectingRule::new(net("10.0.0.0/8"))],
        vec![],
        vec![],
        vec![],
    );
    let proxy = spawn_proxy(Socks::V5(Socks5::new(None, None)), ruleset).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let _ = stream.write_all(b"\x05\x01\x00").await;
    let mut buf = [0u8; 2];
    // closed before the greeting is ever read, so either EOF or a reset
    let read = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("proxy must close the connection");
    match read {
        Ok(n) => assert_eq!(n, 0),
        Err(_) => {}
    }
}

#[tokio::test]
async fn undecodable_bytes_close_the_client_silently() {
    let proxy = spawn_proxy(Socks::V5(Socks5::new(None, None)), allow_all()).await;

    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(b"\x00\x00\x00\x00").await.unwrap();
    let mut buf = [0u8; 2];
    let n = timeout(Duration::from_secs(2), stream.read(&mut buf))
        .await
        .expect("proxy must close the connection")
        .unwrap();
    assert_eq!(n, 0);
}
