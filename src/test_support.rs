//! Minimal in-process registry used by unit tests.
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct StubBehavior {
    pub token_status: u16,
    pub token_body: String,
    pub manifest_status: u16,
}

impl Default for StubBehavior {
    fn default() -> Self {
        Self {
            token_status: 200,
            token_body: r#"{"token":"stub-token"}"#.to_owned(),
            manifest_status: 200,
        }
    }
}

pub(crate) struct StubRegistry {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl StubRegistry {
    pub(crate) fn spawn(behavior: StubBehavior) -> Result<Self, String> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|err| format!("bind stub registry failed: {}", err))?;
        let addr = listener
            .local_addr()
            .map_err(|err| format!("stub addr failed: {}", err))?;
        listener
            .set_nonblocking(true)
            .map_err(|err| format!("set_nonblocking failed: {}", err))?;

        let requests = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let recorded = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }
                match listener.accept() {
                    Ok((stream, _)) => {
                        let behavior = behavior.clone();
                        let recorded = Arc::clone(&recorded);
                        thread::spawn(move || handle_client(stream, &behavior, &recorded));
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            requests,
            shutdown: shutdown_tx,
            thread: Some(handle),
        })
    }

    /// Raw request heads received so far, in arrival order.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Drop for StubRegistry {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

fn handle_client(mut stream: TcpStream, behavior: &StubBehavior, recorded: &Mutex<Vec<String>>) {
    drop(stream.set_nonblocking(false));
    let mut buffer = [0u8; 4096];
    let read = match stream.read(&mut buffer) {
        Ok(read) => read,
        Err(_) => return,
    };
    let head = String::from_utf8_lossy(buffer.get(..read).unwrap_or_default()).into_owned();
    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_owned();
    if let Ok(mut guard) = recorded.lock() {
        guard.push(head);
    }

    let (status, body) = if path.starts_with("/token") {
        (behavior.token_status, behavior.token_body.clone())
    } else if path.starts_with("/v2/") {
        (behavior.manifest_status, "{}".to_owned())
    } else {
        (404, String::new())
    };
    let response = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    drop(stream.flush());
    drop(stream.shutdown(Shutdown::Both));
}

/// Cloneable in-memory writer for capturing relay output.
#[derive(Debug, Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        self.0
            .lock()
            .map(|guard| String::from_utf8_lossy(&guard).into_owned())
            .unwrap_or_default()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self
            .0
            .lock()
            .map_err(|err| std::io::Error::other(format!("buffer lock poisoned: {}", err)))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
