#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::oneshot,
};

/// How the simulated console reacts to submissions.
#[derive(Clone, Copy)]
pub enum PrinterBehavior {
    /// Accept every login and submission.
    Healthy,
    /// Answer every settings POST with the login failure marker.
    RejectLogins,
    /// Answer the media setup POST with HTTP 500.
    FailMediaSetup,
    /// Answer the root page with HTTP 500, everything else normally.
    ErrorRoot,
}

pub type RecordedRequests = Arc<Mutex<Vec<(String, String)>>>;

/// Minimal HTTP/1.1 server imitating the printer's embedded console.
///
/// Records every (path, body) pair it receives and answers according to the
/// configured behavior.
pub async fn start_mock_printer(
    behavior: PrinterBehavior,
    requests: RecordedRequests,
    ready_tx: oneshot::Sender<u16>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;

    // Signal that the server is ready and which port it bound
    let _ = ready_tx.send(listener.local_addr()?.port());

    loop {
        let (stream, _) = listener.accept().await?;
        let requests = requests.clone();

        tokio::spawn(async move {
            let _ = handle_connection(behavior, requests, stream).await;
        });
    }
}

async fn handle_connection(
    behavior: PrinterBehavior,
    requests: RecordedRequests,
    stream: TcpStream,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    // The client keeps the connection alive, so serve requests until EOF
    loop {
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).await? == 0 {
            return Ok(());
        }
        if request_line.trim().is_empty() {
            continue;
        }

        let path = request_line
            .split_whitespace()
            .nth(1)
            .unwrap_or("/")
            .to_string();

        // Read headers, keeping only the content length
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let lowered = line.to_ascii_lowercase();
            if let Some(value) = lowered.strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body).await?;
        let body = String::from_utf8_lossy(&body).to_string();

        requests.lock().unwrap().push((path.clone(), body));

        let (status, response_body) = response_for(behavior, &path);
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\n\r\n{response_body}",
            response_body.len()
        );
        reader.get_mut().write_all(response.as_bytes()).await?;
    }
}

fn response_for(behavior: PrinterBehavior, path: &str) -> (&'static str, &'static str) {
    match behavior {
        PrinterBehavior::RejectLogins if path == "/settings" => {
            ("200 OK", "<html>Error: Incorrect password</html>")
        }
        PrinterBehavior::FailMediaSetup if path == "/setmed" => {
            ("500 Internal Server Error", "<html>error</html>")
        }
        PrinterBehavior::ErrorRoot if path == "/" => {
            ("500 Internal Server Error", "<html>error</html>")
        }
        _ => ("200 OK", "<html>Zebra Technologies ZTC ZD421</html>"),
    }
}

/// Spawn the mock printer in the background and wait until it listens.
pub async fn spawn_mock_printer(behavior: PrinterBehavior) -> (u16, RecordedRequests) {
    let requests: RecordedRequests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();
    let (ready_tx, ready_rx) = oneshot::channel();

    tokio::spawn(async move {
        let _ = start_mock_printer(behavior, recorded, ready_tx).await;
    });

    let port = ready_rx.await.expect("mock printer failed to start");
    (port, requests)
}
