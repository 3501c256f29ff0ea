use agent_stream::prelude::*;
use agent_stream::{ByteStream, InvokeRequest};
use futures::StreamExt as _;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Accepts one connection, answers it with `response` and yields the raw request.
async fn serve_once(response: &'static str) -> (ClientConfig, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut raw = Vec::new();
        let mut buf = [0_u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.expect("read request");
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        socket
            .write_all(response.as_bytes())
            .await
            .expect("write response");
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&raw).into_owned()
    });
    let config = ClientConfig::default().base_url(format!("http://{addr}"));
    (config, handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(head_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let body_len = text[..head_end]
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= head_end + 4 + body_len
}

async fn open(config: ClientConfig) -> Result<ByteStream, TransportError> {
    let transport = HttpTransport::new(config).expect("transport");
    transport
        .open_stream(&InvokeRequest::streaming(SessionId::new("session_1"), "hi"))
        .await
}

fn open_error(result: Result<ByteStream, TransportError>) -> TransportError {
    match result {
        Ok(_) => panic!("expected the stream to be refused"),
        Err(err) => err,
    }
}

#[tokio::test]
async fn stream_request_asks_for_event_stream_and_yields_body() {
    let (config, server) = serve_once(concat!(
        "HTTP/1.1 200 OK\r\n",
        "content-type: text/event-stream\r\n",
        "connection: close\r\n",
        "\r\n",
        "data: {\"type\":\"model\",\"content\":\"Hi\"}\n\n",
        "data: [DONE]\n\n",
    ))
    .await;

    let mut stream = open(config).await.expect("stream opens");
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.expect("chunk"));
    }
    assert_eq!(
        String::from_utf8(body).expect("utf8"),
        "data: {\"type\":\"model\",\"content\":\"Hi\"}\n\ndata: [DONE]\n\n"
    );

    let request = server.await.expect("server task");
    let lowered = request.to_ascii_lowercase();
    assert!(request.starts_with("POST /agent/invoke "), "{request}");
    assert!(lowered.contains("accept: text/event-stream"), "{request}");
    assert!(
        request.contains(r#"{"session_id":"session_1","query":"hi","stream":true}"#),
        "{request}"
    );
}

#[tokio::test]
async fn empty_success_body_is_no_stream() {
    let (config, server) = serve_once(concat!(
        "HTTP/1.1 200 OK\r\n",
        "content-length: 0\r\n",
        "connection: close\r\n",
        "\r\n",
    ))
    .await;

    assert_eq!(open_error(open(config).await), TransportError::NoStream);
    server.await.expect("server task");
}

#[tokio::test]
async fn no_content_status_is_no_stream() {
    let (config, server) = serve_once("HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n").await;

    assert_eq!(open_error(open(config).await), TransportError::NoStream);
    server.await.expect("server task");
}

#[tokio::test]
async fn rejected_method_and_origin_are_classified() {
    let (config, server) = serve_once(concat!(
        "HTTP/1.1 405 Method Not Allowed\r\n",
        "content-length: 0\r\n",
        "connection: close\r\n",
        "\r\n",
    ))
    .await;
    assert_eq!(
        open_error(open(config).await),
        TransportError::MethodNotAllowed
    );
    server.await.expect("server task");

    let (config, server) = serve_once(concat!(
        "HTTP/1.1 403 Forbidden\r\n",
        "content-length: 0\r\n",
        "connection: close\r\n",
        "\r\n",
    ))
    .await;
    assert_eq!(
        open_error(open(config).await),
        TransportError::CrossOrigin { status: 403 }
    );
    server.await.expect("server task");
}

#[tokio::test]
async fn other_statuses_pass_through_with_body() {
    let (config, server) = serve_once(concat!(
        "HTTP/1.1 500 Internal Server Error\r\n",
        "content-length: 5\r\n",
        "connection: close\r\n",
        "\r\n",
        "oops!",
    ))
    .await;

    let err = open_error(open(config).await);
    assert_eq!(err.status(), Some(500));
    assert_eq!(err.to_string(), "HTTP error: 500 Internal Server Error");
    assert!(matches!(err, TransportError::Status { body, .. } if body == "oops!"));
    server.await.expect("server task");
}

#[tokio::test]
async fn history_is_fetched_for_the_session() {
    let (config, server) = serve_once(concat!(
        "HTTP/1.1 200 OK\r\n",
        "content-type: application/json\r\n",
        "content-length: 75\r\n",
        "connection: close\r\n",
        "\r\n",
        r#"{"session_id":"session_1","history":[{"role":"user","content":"weather?"}]}"#,
    ))
    .await;

    let transport = HttpTransport::new(config).expect("transport");
    let history = transport
        .history(&SessionId::new("session_1"))
        .await
        .expect("history");
    assert_eq!(history.session_id, SessionId::new("session_1"));
    assert_eq!(history.history.len(), 1);
    assert_eq!(history.history[0].role, "user");

    let request = server.await.expect("server task");
    assert!(request.starts_with("GET /agent/history/session_1 "), "{request}");
}
