//! End-to-end tests: a real server on 127.0.0.1 fed by an in-process bus

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use camfeed::{CodecRegistry, ImageFrame, LocalBus, Result, ServerConfig, VideoServer};

struct TestServer {
    addr: SocketAddr,
    bus: Arc<LocalBus>,
    server: Arc<VideoServer>,
    task: JoinHandle<Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let bus = Arc::new(LocalBus::with_handle(Handle::current()));
        bus.advertise("/cam1/image_raw", "sensor_msgs/Image");
        bus.advertise("/cam2/image_raw", "sensor_msgs/Image");
        bus.advertise("/spare/image_raw", "sensor_msgs/Image");
        bus.advertise("/cam1/camera_info", "sensor_msgs/CameraInfo");
        bus.advertise("/cam2/camera_info", "sensor_msgs/CameraInfo");

        let config = ServerConfig::with_addr("127.0.0.1:0".parse().unwrap());
        let server = Arc::new(
            VideoServer::new(config, bus.clone(), CodecRegistry::with_defaults()).unwrap(),
        );
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task_server = Arc::clone(&server);
        let task = tokio::spawn(async move {
            task_server
                .serve_until(listener, std::future::pending())
                .await
        });

        Self {
            addr,
            bus,
            server,
            task,
        }
    }

    async fn request(&self, uri: &str) -> TcpStream {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream
            .write_all(format!("GET {uri} HTTP/1.1\r\nHost: localhost\r\n\r\n").as_bytes())
            .await
            .unwrap();
        stream
    }

    /// Full response of a request the server answers and closes
    async fn get(&self, uri: &str) -> String {
        let mut stream = self.request(uri).await;
        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
            .await
            .expect("response timed out")
            .unwrap();
        response
    }

    fn session_count(&self) -> usize {
        self.server.sessions().len()
    }

    async fn wait_for_sessions(&self, count: usize) {
        wait_until(|| self.session_count() == count).await;
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Read from `stream` until the data seen so far contains `needle`
async fn read_until(stream: &mut TcpStream, needle: &[u8]) -> Vec<u8> {
    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    tokio::time::timeout(Duration::from_secs(5), async {
        while !received.windows(needle.len()).any(|w| w == needle) {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed early");
            received.extend_from_slice(&buf[..n]);
        }
    })
    .await
    .expect("data not received");
    received
}

fn jpeg(data: &'static [u8]) -> ImageFrame {
    ImageFrame::jpeg(640, 480, Bytes::from_static(data))
}

#[tokio::test]
async fn test_discovery_lists_cameras() {
    let server = TestServer::start().await;

    let response = server.get("/").await;
    let (head, body) = response.split_once("\r\n\r\n").unwrap();

    assert!(head.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(head.contains("Content-Type: text/html"));
    assert!(head.contains("Server: camfeed"));
    assert!(body.contains("<li>/cam1/<ul>"));
    assert!(body.contains("<li>/cam2/<ul>"));
    assert!(body.contains(">image_raw</a>"));
    assert!(body.contains("/stream_viewer?topic=%2Fcam1%2Fimage_raw"));
    assert!(!body.contains("spare"));

    // Cameras appear in metadata discovery order
    assert!(body.find("/cam1/").unwrap() < body.find("/cam2/").unwrap());
    assert_eq!(server.session_count(), 0);
}

#[tokio::test]
async fn test_listing_survives_half_close() {
    let server = TestServer::start().await;

    for _ in 0..20 {
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        stream.shutdown().await.unwrap();

        let mut response = String::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
            .await
            .expect("response timed out")
            .unwrap();

        assert!(response.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(response.contains("Available Image Topics"));
        assert!(response.trim_end().ends_with("</html>"));
    }
}

#[tokio::test]
async fn test_mjpeg_stream_delivers_frames() {
    let server = TestServer::start().await;

    let mut client = server.request("/stream?topic=/cam1/image_raw").await;
    server.wait_for_sessions(1).await;

    server.bus.publish("/cam1/image_raw", jpeg(b"FRAME-ONE"));
    let received = read_until(&mut client, b"FRAME-ONE\r\n").await;
    let text = String::from_utf8_lossy(&received);

    assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(text.contains("Content-Type: multipart/x-mixed-replace;boundary=boundarydonotcross"));
    assert!(text.contains("--boundarydonotcross\r\n"));
    assert!(text.contains("Content-Length: 9\r\n"));

    server.bus.publish("/cam1/image_raw", jpeg(b"FRAME-TWO"));
    read_until(&mut client, b"FRAME-TWO\r\n").await;
    assert_eq!(server.session_count(), 1);
}

#[tokio::test]
async fn test_raw_frames_streamed_as_jpeg() {
    let server = TestServer::start().await;
    let raw = || ImageFrame::new("rgb8", 2, 2, Bytes::from(vec![0x40u8; 12]));

    let mut client = server.request("/stream?topic=/cam1/image_raw&quality=50").await;
    server.wait_for_sessions(1).await;
    server.bus.publish("/cam1/image_raw", raw());
    let received = read_until(&mut client, b"\xff\xd9\r\n").await;
    let text = String::from_utf8_lossy(&received);
    assert!(text.contains("Content-Type: image/jpeg\r\n"));
    assert!(received.windows(2).any(|w| w == b"\xff\xd8"));

    let mut snapshot = server.request("/snapshot?topic=/cam2/image_raw").await;
    server.wait_for_sessions(2).await;
    server.bus.publish("/cam2/image_raw", raw());
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), snapshot.read_to_end(&mut response))
        .await
        .expect("snapshot not closed")
        .unwrap();
    let body_at = response.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
    assert!(response[body_at..].starts_with(b"\xff\xd8"));
    assert!(response.ends_with(b"\xff\xd9"));
}

#[tokio::test]
async fn test_unknown_type_not_found() {
    let server = TestServer::start().await;

    let response = server.get("/stream?type=bogus&topic=/cam1/image_raw").await;

    assert!(response.starts_with("HTTP/1.0 404 Not Found\r\n"));
    assert_eq!(server.session_count(), 0);
    assert_eq!(server.bus.subscriber_count("/cam1/image_raw"), 0);
}

#[tokio::test]
async fn test_client_disconnect_reclaims_session() {
    let server = TestServer::start().await;

    let client = server.request("/stream?topic=/cam1/image_raw").await;
    server.wait_for_sessions(1).await;
    assert_eq!(server.bus.subscriber_count("/cam1/image_raw"), 1);

    drop(client);
    server.bus.publish("/cam1/image_raw", jpeg(b"x"));

    // Gone within a sweep period or two, along with its subscription
    server.wait_for_sessions(0).await;
    wait_until(|| server.bus.subscriber_count("/cam1/image_raw") == 0).await;
}

#[tokio::test]
async fn test_sessions_accumulate() {
    let server = TestServer::start().await;

    let _first = server.request("/stream?topic=/cam1/image_raw").await;
    server.wait_for_sessions(1).await;
    let _second = server.request("/stream?type=vp8&topic=/cam2/image_raw").await;
    server.wait_for_sessions(2).await;

    let mut topics = server.server.sessions().topics();
    topics.sort();
    assert_eq!(topics, vec!["/cam1/image_raw", "/cam2/image_raw"]);
}

#[tokio::test]
async fn test_snapshot_single_frame() {
    let server = TestServer::start().await;

    let mut client = server.request("/snapshot?topic=/cam1/image_raw").await;
    server.wait_for_sessions(1).await;

    server.bus.publish("/cam1/image_raw", jpeg(b"SNAP"));

    // Closed once the sweeper reclaims the finished session
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut response))
        .await
        .expect("snapshot not closed")
        .unwrap();
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(text.contains("Content-Type: image/jpeg\r\n"));
    assert!(text.contains("Content-Length: 4\r\n"));
    assert!(text.ends_with("\r\n\r\nSNAP"));
    assert_eq!(server.session_count(), 0);
}

#[tokio::test]
async fn test_stream_viewer_page() {
    let server = TestServer::start().await;

    let mjpeg = server.get("/stream_viewer?topic=/cam1/image_raw").await;
    assert!(mjpeg.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(mjpeg.contains("<h1>/cam1/image_raw</h1>"));
    assert!(mjpeg.contains("<img src=\"/stream?topic=/cam1/image_raw\"></img>"));

    let vp8 = server.get("/stream_viewer?topic=/cam1/image_raw&type=vp8").await;
    assert!(vp8.contains("<video src=\"/stream?topic=/cam1/image_raw&amp;type=vp8\""));

    let bogus = server.get("/stream_viewer?topic=/cam1/image_raw&type=bogus").await;
    assert!(bogus.starts_with("HTTP/1.0 404 Not Found\r\n"));

    assert_eq!(server.session_count(), 0);
}

#[tokio::test]
async fn test_unknown_path_and_bad_request() {
    let server = TestServer::start().await;

    let response = server.get("/nothing/here").await;
    assert!(response.starts_with("HTTP/1.0 404 Not Found\r\n"));

    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"garbage\r\n\r\n").await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.0 400 Bad Request\r\n"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stream_starts() {
    let server = TestServer::start().await;

    let mut clients = Vec::new();
    for i in 0..100 {
        let addr = server.addr;
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(format!("GET /stream?topic=/cam{i}/image_raw HTTP/1.1\r\n\r\n").as_bytes())
                .await
                .unwrap();
            stream
        }));
    }

    let mut streams = Vec::new();
    for client in clients {
        streams.push(client.await.unwrap());
    }

    // Every insertion lands, however the sweeper interleaves
    server.wait_for_sessions(100).await;
    let mut topics = server.server.sessions().topics();
    topics.sort();
    topics.dedup();
    assert_eq!(topics.len(), 100);
    for i in 0..100 {
        assert_eq!(server.bus.subscriber_count(&format!("/cam{i}/image_raw")), 1);
    }

    drop(streams);
    server.wait_for_sessions(0).await;
}
