//! TCP transport driven by real sockets against a running scheduler

use std::net::SocketAddr;
use std::time::Duration;

use crackpool_core::{
    message, AppEvent, CrackpoolConfig, HashAlgorithm, MessageType, ServerEvent, WorkerFrame,
};
use crackpool_runtime::{RuntimeBuilder, RuntimeHandle};
use crackpool_tcp::{decode_frame, encode_frame, FrameReader, TcpConfig, TcpTransportTask};
use tokio::io::AsyncWriteExt;
use tokio::net::{tcp::OwnedReadHalf, tcp::OwnedWriteHalf, TcpStream};
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

async fn start_server() -> (RuntimeHandle, SocketAddr) {
    let transport = TcpTransportTask::bind(TcpConfig::testing())
        .await
        .expect("listener binds");
    let addr = transport.local_addr().expect("bound address");
    let runtime = RuntimeBuilder::new()
        .with_config(CrackpoolConfig::testing())
        .add_transport(Box::new(transport))
        .build_and_start()
        .await
        .expect("runtime starts");
    (runtime, addr)
}

struct TestClient {
    frames: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connects");
        let (read_half, writer) = stream.into_split();
        Self {
            frames: FrameReader::new(read_half, 1 << 20),
            writer,
        }
    }

    async fn send(&mut self, frame: &WorkerFrame) {
        let line = encode_frame(frame).unwrap();
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn send_raw(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
    }

    /// Next event other than a probe; probes are acknowledged. `None` on close.
    async fn next_event(&mut self) -> Option<ServerEvent> {
        loop {
            let line = timeout(TEST_TIMEOUT, self.frames.next_line())
                .await
                .expect("server answers in time")
                .ok()??;
            match decode_frame::<ServerEvent>(&line).expect("server frames decode") {
                ServerEvent::Lifecheck => self.send(&WorkerFrame::Lifecheck).await,
                event => return Some(event),
            }
        }
    }
}

#[tokio::test]
async fn test_submission_is_acknowledged_over_tcp() {
    let (mut runtime, addr) = start_server().await;
    let mut client = TestClient::connect(addr).await;

    let target = HashAlgorithm::Md5.digest_hex(b"zz");
    client
        .send(&WorkerFrame::Data(message::encode(
            MessageType::SubmitHash,
            "md5",
            &target,
        )))
        .await;

    assert_eq!(
        client.next_event().await,
        Some(ServerEvent::Log("Hash added to queue".to_string()))
    );
    // the only worker is handed part of its own round
    assert!(matches!(client.next_event().await, Some(ServerEvent::Job(_))));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_malformed_frame_gets_error_log() {
    let (mut runtime, addr) = start_server().await;
    let mut client = TestClient::connect(addr).await;

    client.send_raw("this is not json\n").await;
    match client.next_event().await {
        Some(ServerEvent::Log(text)) => assert!(text.starts_with("[ERROR]: Invalid frame")),
        other => panic!("expected an error log, got {:?}", other),
    }

    // the connection survives a bad frame
    client
        .send(&WorkerFrame::Data(message::encode(
            MessageType::SubmitHash,
            "md5",
            "not-a-digest",
        )))
        .await;
    match client.next_event().await {
        Some(ServerEvent::Log(text)) => assert!(text.starts_with("[ERROR]:")),
        other => panic!("expected an intake error, got {:?}", other),
    }

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_force_disconnect_closes_socket() {
    let (mut runtime, addr) = start_server().await;
    let mut app_events = runtime.take_app_event_receiver().unwrap();
    let mut client = TestClient::connect(addr).await;

    client.send(&WorkerFrame::ForceDisconnect).await;
    assert_eq!(client.next_event().await, None);

    let left = timeout(TEST_TIMEOUT, async {
        while let Some(event) = app_events.recv().await {
            if let AppEvent::WorkerLeft { .. } = event {
                return true;
            }
        }
        false
    })
    .await
    .expect("membership change reported");
    assert!(left);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_peer_close_is_reported() {
    let (mut runtime, addr) = start_server().await;
    let mut app_events = runtime.take_app_event_receiver().unwrap();

    let client = TestClient::connect(addr).await;
    drop(client);

    let mut joined = false;
    let mut left = false;
    while !(joined && left) {
        match timeout(TEST_TIMEOUT, app_events.recv()).await {
            Ok(Some(AppEvent::WorkerJoined { .. })) => joined = true,
            Ok(Some(AppEvent::WorkerLeft { reason, .. })) => {
                assert_eq!(reason, "connection closed");
                left = true
            }
            Ok(Some(_)) => {}
            other => panic!("missing membership events: {:?}", other),
        }
    }

    runtime.shutdown().await.unwrap();
}
