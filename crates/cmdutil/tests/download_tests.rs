use cmdutil::download::Url;
use cmdutil::{DownloadError, DownloadOptions, Downloader, ProxySetting};
use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

/// Serves `response` verbatim to a single connection and returns its URL.
fn serve_once(response: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        // Drain the request head
        while reader.read_line(&mut line).unwrap() > 0 {
            if line == "\r\n" {
                break;
            }
            line.clear();
        }
        let _ = stream.write_all(&response);
        let _ = stream.flush();
    });

    format!("http://{addr}/file.bin")
}

fn response(status: &str, headers: &[&str], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status}\r\nConnection: close\r\n");
    for header in headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    let mut out = out.into_bytes();
    out.extend_from_slice(body);
    out
}

fn direct() -> DownloadOptions {
    DownloadOptions::new().proxy(ProxySetting::None)
}

/// Progress sink the test can read back
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_download_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let dst = temp_dir.path().join("nested/dir/file.bin");
    let url = serve_once(response("200 OK", &["Content-Length: 11"], b"hello world"));

    let copied = Downloader::new(direct()).download(&url, &dst).unwrap();

    assert_eq!(copied, 11);
    assert_eq!(fs::read(&dst).unwrap(), b"hello world");
}

#[test]
fn test_download_without_content_length() {
    let url = serve_once(response("200 OK", &[], b"streamed until close"));

    let mut out = Vec::new();
    let copied = Downloader::new(direct()).download_to_writer(&url, &mut out).unwrap();

    assert_eq!(copied, 20);
    assert_eq!(out, b"streamed until close");
}

#[test]
fn test_short_body_is_length_mismatch_and_removes_file() {
    let temp_dir = TempDir::new().unwrap();
    let dst = temp_dir.path().join("partial.bin");
    let url = serve_once(response("200 OK", &["Content-Length: 100"], b"only ten b"));

    let result = Downloader::new(direct()).download(&url, &dst);

    match result {
        Err(DownloadError::LengthMismatch { copied, expected }) => {
            assert_eq!(expected, 100);
            assert!(copied < 100);
        }
        other => panic!("Expected LengthMismatch, got: {:?}", other),
    }
    assert!(!dst.exists());
}

#[test]
fn test_non_200_status() {
    let temp_dir = TempDir::new().unwrap();
    let dst = temp_dir.path().join("missing.bin");
    let url = serve_once(response("404 Not Found", &["Content-Length: 9"], b"not found"));

    let result = Downloader::new(direct()).download(&url, &dst);

    match result {
        Err(DownloadError::Status(status)) => assert_eq!(status.as_u16(), 404),
        other => panic!("Expected Status, got: {:?}", other),
    }
    assert!(!dst.exists());
}

#[test]
fn test_progress_lines() {
    let url = serve_once(response("200 OK", &["Content-Length: 5"], b"12345"));
    let sink = SharedBuf::default();

    let mut out = Vec::new();
    Downloader::new(direct())
        .progress(sink.clone())
        .download_to_writer(&url, &mut out)
        .unwrap();

    let lines = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    assert!(lines.starts_with("Downloaded "));
    assert!(lines.ends_with("Downloaded 100.0% (5 / 5 bytes)\n"));
}

#[test]
fn test_custom_proxy_resolver_is_consulted() {
    let url = serve_once(response("200 OK", &["Content-Length: 2"], b"ok"));
    let asked = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&asked);

    let options = DownloadOptions::new().proxy(ProxySetting::Custom(Arc::new(move |url: &Url| -> Option<Url> {
        seen.lock().unwrap().push(url.to_string());
        None
    })));

    let mut out = Vec::new();
    Downloader::new(options).download_to_writer(&url, &mut out).unwrap();

    assert_eq!(out, b"ok");
    let asked = asked.lock().unwrap();
    assert!(!asked.is_empty());
    assert!(asked.iter().all(|u| *u == url));
}

#[test]
fn test_connection_refused() {
    // Bind then drop to get a port with no listener
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let temp_dir = TempDir::new().unwrap();
    let dst = temp_dir.path().join("refused.bin");

    let result = Downloader::new(direct()).download(&format!("http://127.0.0.1:{port}/"), &dst);

    assert!(matches!(result, Err(DownloadError::Http(_))));
    assert!(!dst.exists());
}

/// Runs `f` with debug-level logs captured as plain text.
fn capture_logs(f: impl FnOnce()) -> String {
    let buf = SharedBuf::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = buf.0.lock().unwrap().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_connect_outcome_is_logged() {
    let url = serve_once(response("200 OK", &["Content-Length: 2"], b"ok"));
    let logs = capture_logs(|| {
        let mut out = Vec::new();
        Downloader::new(direct()).download_to_writer(&url, &mut out).unwrap();
    });
    assert!(logs.contains("connect start"), "{logs}");
    assert!(logs.contains("connect success"), "{logs}");
    assert!(logs.contains("cost="), "{logs}");

    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let logs = capture_logs(|| {
        let mut out = Vec::new();
        let result = Downloader::new(direct()).download_to_writer(&format!("http://127.0.0.1:{port}/"), &mut out);
        assert!(result.is_err());
    });
    assert!(logs.contains("connect failed"), "{logs}");
}
