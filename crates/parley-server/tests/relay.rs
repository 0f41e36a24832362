//! End-to-end relay behavior over real TCP sockets.

use std::net::SocketAddr;
use std::time::Duration;

use parley_core::{ConnectionId, FrameError, Header, HeaderKind, frame};
use parley_server::{DrainOutcome, RelayServer, ServerConfig};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const WAIT: Duration = Duration::from_secs(3);
const QUIET: Duration = Duration::from_millis(150);

async fn boot() -> (RelayServer, SocketAddr) {
    let server = RelayServer::new(ServerConfig::default());
    let addr = server.listen().await.unwrap();
    (server, addr)
}

async fn recv(stream: &mut TcpStream) -> String {
    let raw = tokio::time::timeout(WAIT, frame::read_frame(stream))
        .await
        .expect("timed out waiting for a frame")
        .expect("read failed");
    frame::decode(&raw).unwrap()
}

async fn recv_id(stream: &mut TcpStream, kind: HeaderKind) -> ConnectionId {
    let text = recv(stream).await;
    let header = Header::parse(&text).unwrap_or_else(|| panic!("untagged: {text}"));
    assert_eq!(header.kind, kind, "{text}");
    header.connection_id().unwrap()
}

async fn assert_quiet(stream: &mut TcpStream) {
    let read = tokio::time::timeout(QUIET, frame::read_frame(stream)).await;
    assert!(read.is_err(), "unexpected frame: {read:?}");
}

async fn send(stream: &mut TcpStream, text: &str) {
    stream.write_all(&frame::encode(text).unwrap()).await.unwrap();
}

/// Three peers that have learned each other's ids.
struct Room {
    a: TcpStream,
    b: TcpStream,
    c: TcpStream,
    b_id: ConnectionId,
    c_id: ConnectionId,
}

async fn room(addr: SocketAddr) -> Room {
    let mut a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();
    let b_id = recv_id(&mut a, HeaderKind::NewClient).await;
    let a_id = recv_id(&mut b, HeaderKind::ClientsList).await;

    let mut c = TcpStream::connect(addr).await.unwrap();
    let c_id = recv_id(&mut a, HeaderKind::NewClient).await;
    assert_eq!(recv_id(&mut b, HeaderKind::NewClient).await, c_id);

    let mut known = vec![
        recv_id(&mut c, HeaderKind::ClientsList).await,
        recv_id(&mut c, HeaderKind::ClientsList).await,
    ];
    known.sort();
    let mut expected = vec![a_id, b_id];
    expected.sort();
    assert_eq!(known, expected);

    Room { a, b, c, b_id, c_id }
}

#[tokio::test]
async fn first_client_gets_nothing_on_join() {
    let (server, addr) = boot().await;
    let mut a = TcpStream::connect(addr).await.unwrap();
    assert_quiet(&mut a).await;
    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn join_sequence_and_roster() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;
    // one join notice each for a and b, nothing else
    assert_quiet(&mut room.a).await;
    assert_quiet(&mut room.b).await;
    assert_quiet(&mut room.c).await;
    assert_eq!(server.registry().len(), 3);
    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn broadcast_reaches_everyone_but_author() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    send(&mut room.a, "[client-message]hello").await;
    assert_eq!(recv(&mut room.b).await, "[client-message]hello");
    assert_eq!(recv(&mut room.c).await, "[client-message]hello");
    assert_quiet(&mut room.a).await;

    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn direct_message_is_private() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    let text = format!("[client-message]@{} just for you", room.c_id);
    send(&mut room.a, &text).await;
    assert_eq!(recv(&mut room.c).await, text);
    assert_quiet(&mut room.b).await;
    assert_quiet(&mut room.a).await;

    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn three_peer_scenario() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    send(&mut room.a, "[client-message]hello").await;
    let expected = frame::encode("[client-message]hello").unwrap();
    for peer in [&mut room.b, &mut room.c] {
        let raw = tokio::time::timeout(WAIT, frame::read_frame(peer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw, expected);
    }

    let bare = format!("@{}hi", room.c_id);
    send(&mut room.a, &bare).await;
    assert_eq!(recv(&mut room.c).await, bare);
    assert_quiet(&mut room.b).await;

    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn messages_arrive_in_order() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    for i in 0..50 {
        send(&mut room.a, &format!("[client-message]{i}")).await;
    }
    for i in 0..50 {
        assert_eq!(recv(&mut room.b).await, format!("[client-message]{i}"));
    }

    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn disconnect_is_announced() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    drop(room.b);
    assert_eq!(recv_id(&mut room.a, HeaderKind::ClientDisconnect).await, room.b_id);
    assert_eq!(recv_id(&mut room.c, HeaderKind::ClientDisconnect).await, room.b_id);
    assert_quiet(&mut room.a).await;
    assert_quiet(&mut room.c).await;

    // a message to the departed peer falls back to broadcast
    let text = format!("[client-message]@{} gone?", room.b_id);
    send(&mut room.a, &text).await;
    assert_eq!(recv(&mut room.c).await, text);

    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn malformed_frame_keeps_connection() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    room.a.write_all(&[0x00, 0x03, 0xc3, 0x28, 0xff]).await.unwrap();
    send(&mut room.a, "[client-message]ok").await;
    assert_eq!(recv(&mut room.b).await, "[client-message]ok");

    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn split_writes_are_reassembled() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    let bytes = frame::encode("[client-message]in pieces").unwrap();
    for chunk in bytes.chunks(3) {
        room.a.write_all(chunk).await.unwrap();
        room.a.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(recv(&mut room.b).await, "[client-message]in pieces");

    let _ = server.stop(WAIT).await;
}

#[tokio::test]
async fn stop_closes_everything() {
    let (server, addr) = boot().await;
    let mut room = room(addr).await;

    let outcome = server.stop(WAIT).await;
    assert_eq!(outcome, DrainOutcome::Drained);
    assert!(server.registry().is_empty());
    assert_eq!(server.session_count(), 0);

    for stream in [&mut room.a, &mut room.b, &mut room.c] {
        let read = tokio::time::timeout(WAIT, frame::read_frame(stream)).await.unwrap();
        assert!(matches!(read, Err(FrameError::ConnectionClosed)), "{read:?}");
    }

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn concurrent_stops_do_not_run_twice() {
    let (server, addr) = boot().await;
    let _room = room(addr).await;

    let (first, second) = tokio::join!(server.stop(WAIT), server.stop(WAIT));
    let outcomes = [first, second];
    assert!(outcomes.contains(&DrainOutcome::Forced), "{outcomes:?}");
    assert!(server.is_stopping());
}

#[tokio::test]
async fn many_clients_fan_out() {
    let (server, addr) = boot().await;
    let mut peers = Vec::new();
    for _ in 0..8 {
        peers.push(TcpStream::connect(addr).await.unwrap());
    }
    // each peer sees one line per other peer: a roster entry or a join
    for peer in &mut peers {
        for _ in 0..7 {
            let _ = recv(peer).await;
        }
    }

    send(&mut peers[0], "[client-message]all").await;
    for peer in peers.iter_mut().skip(1) {
        assert_eq!(recv(peer).await, "[client-message]all");
    }
    assert_quiet(&mut peers[0]).await;

    let _ = server.stop(WAIT).await;
}
