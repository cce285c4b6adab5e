use std::ffi::OsStr;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Request counters for the stub registry.
#[derive(Debug, Default)]
pub struct Hits {
    pub token: AtomicU64,
    pub manifest: AtomicU64,
}

pub struct RegistryHandle {
    pub base_url: String,
    pub hits: Arc<Hits>,
    shutdown: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Drop for RegistryHandle {
    fn drop(&mut self) {
        let _send_result = self.shutdown.send(());
        if let Some(handle) = self.thread.take() {
            drop(handle.join());
        }
    }
}

/// Spawn a registry that hands out a token on `/token` and answers every
/// `/v2/` path with an empty manifest.
///
/// # Errors
///
/// Returns an error if the listener cannot be created or configured.
pub fn spawn_registry() -> Result<RegistryHandle, String> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .map_err(|err| format!("bind test server failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("server addr failed: {}", err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("set_nonblocking failed: {}", err))?;

    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    let hits = Arc::new(Hits::default());
    let server_hits = Arc::clone(&hits);

    let handle = thread::spawn(move || {
        loop {
            if shutdown_rx.try_recv().is_ok() {
                break;
            }

            match listener.accept() {
                Ok((stream, _)) => {
                    let hits = Arc::clone(&server_hits);
                    thread::spawn(move || handle_client(stream, &hits));
                }
                Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(_) => break,
            }
        }
    });

    Ok(RegistryHandle {
        base_url: format!("http://{}", addr),
        hits,
        shutdown: shutdown_tx,
        thread: Some(handle),
    })
}

fn handle_client(mut stream: TcpStream, hits: &Hits) {
    if stream.set_nonblocking(false).is_err() {
        return;
    }
    let mut buffer = [0u8; 4096];
    let read = match stream.read(&mut buffer) {
        Ok(read) => read,
        Err(_) => return,
    };
    let head = String::from_utf8_lossy(buffer.get(..read).unwrap_or_default());
    let path = head.split_whitespace().nth(1).unwrap_or_default();
    let body = if path.starts_with("/token") {
        hits.token.fetch_add(1, Ordering::SeqCst);
        r#"{"token":"e2e-token"}"#
    } else {
        hits.manifest.fetch_add(1, Ordering::SeqCst);
        "{}"
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    if stream.write_all(response.as_bytes()).is_err() {
        return;
    }
    if stream.flush().is_err() {
        return;
    }
    drop(stream.shutdown(Shutdown::Both));
}

/// Writes a TOML config that registers the stub under the `stub` key.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_stub_config(dir: &Path, base_url: &str) -> Result<String, String> {
    let path = dir.join("pullstress.toml");
    let content = format!(
        r#"
[registries.stub]
name = "Stub Registry"
auth_url = "{base_url}/token"
registry_url = "{base_url}"
service = "stub.local"
normalization = "dockerhub"
"#
    );
    std::fs::write(&path, content).map_err(|err| format!("write config failed: {}", err))?;
    Ok(path.to_string_lossy().into_owned())
}

/// Run the `pullstress` binary and capture output.
///
/// # Errors
///
/// Returns an error if the binary cannot be executed.
pub fn run_pullstress<I, S>(args: I, cwd: &Path) -> Result<Output, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let bin = pullstress_bin()?;
    Command::new(bin)
        .args(args)
        .current_dir(cwd)
        .env("RUST_LOG", "error")
        .env_remove("PULLSTRESS_LOG")
        .env_remove("NO_COLOR")
        .output()
        .map_err(|err| format!("run pullstress failed: {}", err))
}

fn pullstress_bin() -> Result<String, String> {
    option_env!("CARGO_BIN_EXE_pullstress").map_or_else(
        || Err("CARGO_BIN_EXE_pullstress missing at compile time.".to_owned()),
        |path| Ok(path.to_owned()),
    )
}
