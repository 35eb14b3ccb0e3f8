//! TCP streaming writer
//!
//! Listens on a local address and streams every record, rendered as text,
//! to all connected clients. Clients can narrow the stream interactively:
//! sending `filter` pauses the stream and prompts for a substring, the next
//! line becomes the filter (an empty line shows everything again).
//!
//! ```text
//! $ nc localhost 9999
//! Logger streaming activated for TCP channel.
//! filter
//!
//! Filter: database
//! Show logs for "database"
//! ```

use super::base::{FeedbackSlot, Lifecycle};
use crate::core::worker::join_with_timeout;
use crate::core::{
    FeedbackSender, LogRecord, LoggerError, Result, TextLayout, Worker, Writer,
    DEFAULT_CLOSE_TIMEOUT, DEFAULT_WORKER_CAPACITY,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const GREETING: &str = "Logger streaming activated for TCP channel.\n";
const FILTER_COMMAND: &str = "filter";
const FILTER_PROMPT: &str = "\nFilter: ";
const HIGHLIGHT_START: &str = "\x1b[91m";
const HIGHLIGHT_END: &str = "\x1b[39m";

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const CLIENT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Called with `true` when the first client connects and `false` when the
/// last one disconnects.
pub type StateCallback = Box<dyn Fn(bool) + Send + Sync>;

struct Client {
    /// Write side; locked per client so a stalled viewer only blocks itself.
    stream: Arc<Mutex<TcpStream>>,
    /// Handle used to shut the socket down without waiting for a writer.
    control: TcpStream,
    peer: Option<SocketAddr>,
    paused: bool,
    filter: String,
}

impl Client {
    /// Apply the client's filter; `None` when the line must not be sent.
    fn render(&self, line: &str) -> Option<String> {
        if self.paused {
            return None;
        }
        if self.filter.is_empty() {
            return Some(line.to_string());
        }
        highlight(line, &self.filter)
    }
}

fn highlight(line: &str, filter: &str) -> Option<String> {
    let start = line.find(filter)?;
    let end = start + filter.len();
    Some(format!(
        "{}{}{}{}{}",
        &line[..start],
        HIGHLIGHT_START,
        &line[start..end],
        HIGHLIGHT_END,
        &line[end..]
    ))
}

/// A rendered line bound for one client, written outside the hub lock.
struct Outgoing {
    id: u64,
    peer: Option<SocketAddr>,
    stream: Arc<Mutex<TcpStream>>,
    text: String,
}

/// Connected clients, shared by the listener, connection and worker threads.
struct Hub {
    clients: Mutex<HashMap<u64, Client>>,
    connected: AtomicUsize,
    next_id: AtomicU64,
    on_state: Option<StateCallback>,
}

impl Hub {
    fn client_count(&self) -> usize {
        self.connected.load(Ordering::Acquire)
    }

    fn connect(&self, mut stream: TcpStream) -> io::Result<(u64, TcpStream)> {
        stream.set_nonblocking(false)?;
        stream.set_write_timeout(Some(CLIENT_WRITE_TIMEOUT))?;
        stream.set_nodelay(true)?;
        stream.write_all(GREETING.as_bytes())?;

        let reader = stream.try_clone()?;
        let control = stream.try_clone()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let first = {
            let mut clients = self.clients.lock();
            clients.insert(
                id,
                Client {
                    peer: stream.peer_addr().ok(),
                    stream: Arc::new(Mutex::new(stream)),
                    control,
                    paused: false,
                    filter: String::new(),
                },
            );
            self.connected.store(clients.len(), Ordering::Release);
            clients.len() == 1
        };

        if first {
            self.notify(true);
        }
        Ok((id, reader))
    }

    fn disconnect(&self, id: u64) {
        let last = {
            let mut clients = self.clients.lock();
            match clients.remove(&id) {
                Some(client) => {
                    let _ = client.control.shutdown(Shutdown::Both);
                    self.connected.store(clients.len(), Ordering::Release);
                    clients.is_empty()
                }
                None => false,
            }
        };

        if last {
            self.notify(false);
        }
    }

    fn notify(&self, connected: bool) {
        if let Some(callback) = &self.on_state {
            callback(connected);
        }
    }

    /// Send `line` to every client; returns the clients that failed.
    fn broadcast(&self, line: &str) -> Vec<(u64, Option<SocketAddr>, io::Error)> {
        let outgoing: Vec<Outgoing> = {
            let clients = self.clients.lock();
            clients
                .iter()
                .filter_map(|(id, client)| {
                    client.render(line).map(|text| Outgoing {
                        id: *id,
                        peer: client.peer,
                        stream: Arc::clone(&client.stream),
                        text,
                    })
                })
                .collect()
        };

        outgoing
            .into_iter()
            .filter_map(|out| {
                let result = out.stream.lock().write_all(out.text.as_bytes());
                result.err().map(|e| (out.id, out.peer, e))
            })
            .collect()
    }

    /// Handle one line typed by a client. `awaiting_filter` is the
    /// connection's input mode.
    fn handle_input(&self, id: u64, line: &str, awaiting_filter: &mut bool) -> io::Result<()> {
        let (stream, reply) = {
            let mut clients = self.clients.lock();
            let Some(client) = clients.get_mut(&id) else {
                return Ok(());
            };

            let reply = if *awaiting_filter {
                *awaiting_filter = false;
                client.filter = line.trim().to_string();
                client.paused = false;

                if client.filter.is_empty() {
                    "Show all logs\n".to_string()
                } else {
                    format!("Show logs for \"{}\"\n", client.filter)
                }
            } else if line.trim() == FILTER_COMMAND {
                *awaiting_filter = true;
                client.paused = true;
                FILTER_PROMPT.to_string()
            } else {
                return Ok(());
            };
            (Arc::clone(&client.stream), reply)
        };

        let result = stream.lock().write_all(reply.as_bytes());
        result
    }

    fn shutdown_all(&self) {
        for client in self.clients.lock().values() {
            let _ = client.control.shutdown(Shutdown::Both);
        }
    }
}

/// Streams records to TCP clients
///
/// Records are only queued while at least one client is connected.
///
/// # Example
///
/// ```no_run
/// use rust_logging_core::writers::TcpStreamWriter;
///
/// let writer = TcpStreamWriter::bind_with_callback("0.0.0.0:9999", |connected| {
///     eprintln!("log viewer connected: {}", connected);
/// })
/// .expect("Failed to bind log stream port");
/// println!("streaming logs on {}", writer.local_addr());
/// ```
pub struct TcpStreamWriter {
    local_addr: SocketAddr,
    hub: Arc<Hub>,
    worker: Worker<Arc<LogRecord>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    running: Arc<AtomicBool>,
    lifecycle: Lifecycle,
    feedback: Arc<FeedbackSlot>,
}

impl TcpStreamWriter {
    /// Bind `address` and start accepting clients.
    ///
    /// # Errors
    ///
    /// Returns [`LoggerError::BindError`] if the address cannot be bound.
    pub fn bind(address: &str) -> Result<Self> {
        Self::start(address, None)
    }

    pub fn bind_with_callback<F>(address: &str, on_state: F) -> Result<Self>
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        Self::start(address, Some(Box::new(on_state)))
    }

    fn start(address: &str, on_state: Option<StateCallback>) -> Result<Self> {
        let listener = TcpListener::bind(address).map_err(|e| LoggerError::bind(address, e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| LoggerError::bind(address, e))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| LoggerError::bind(address, e))?;

        let hub = Arc::new(Hub {
            clients: Mutex::new(HashMap::new()),
            connected: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
            on_state,
        });
        let feedback = Arc::new(FeedbackSlot::new());

        let worker_hub = Arc::clone(&hub);
        let worker_feedback = Arc::clone(&feedback);
        let layout = TextLayout::default();
        let worker = Worker::new(
            "logger-tcp",
            DEFAULT_WORKER_CAPACITY,
            move |record: Arc<LogRecord>| {
                let mut line = record.to_text(&layout);
                line.push('\n');
                for (id, peer, e) in worker_hub.broadcast(&line) {
                    worker_hub.disconnect(id);
                    let peer = peer.map_or_else(|| "unknown".to_string(), |p| p.to_string());
                    worker_feedback.report_failure(
                        &record,
                        LoggerError::writer(format!("TCP client {} dropped: {}", peer, e)),
                    );
                }
            },
        )?;

        let running = Arc::new(AtomicBool::new(true));
        let accept_hub = Arc::clone(&hub);
        let accept_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("logger-tcp-listener".to_string())
            .spawn(move || accept_loop(listener, accept_hub, accept_running))
            .map_err(|e| {
                LoggerError::io_operation("spawn listener", "Failed to spawn TCP listener thread", e)
            })?;

        let lifecycle = Lifecycle::new();
        lifecycle.open();

        Ok(Self {
            local_addr,
            hub,
            worker,
            listener: Mutex::new(Some(handle)),
            running,
            lifecycle,
            feedback,
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn client_count(&self) -> usize {
        self.hub.client_count()
    }
}

fn accept_loop(listener: TcpListener, hub: Arc<Hub>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, _)) => {
                let (id, reader) = match hub.connect(stream) {
                    Ok(connected) => connected,
                    Err(e) => {
                        eprintln!("[LOGGER WARNING] Failed to set up TCP client: {}", e);
                        continue;
                    }
                };

                let client_hub = Arc::clone(&hub);
                let spawned = thread::Builder::new()
                    .name("logger-tcp-client".to_string())
                    .spawn(move || serve_client(client_hub, id, reader));
                if let Err(e) = spawned {
                    eprintln!("[LOGGER ERROR] Failed to spawn TCP client thread: {}", e);
                    hub.disconnect(id);
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                eprintln!("[LOGGER WARNING] Failed to accept TCP client: {}", e);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn serve_client(hub: Arc<Hub>, id: u64, stream: TcpStream) {
    let mut reader = BufReader::new(stream);
    let mut awaiting_filter = false;
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                if hub.handle_input(id, &line, &mut awaiting_filter).is_err() {
                    break;
                }
            }
        }
    }

    hub.disconnect(id);
}

impl Writer for TcpStreamWriter {
    fn write(&self, record: &Arc<LogRecord>) {
        if self.lifecycle.is_open() && self.hub.client_count() > 0 {
            self.worker.enqueue(Arc::clone(record));
        }
    }

    fn close(&self) {
        if !self.lifecycle.close() {
            return;
        }

        self.worker.close(DEFAULT_CLOSE_TIMEOUT);
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.listener.lock().take() {
            join_with_timeout(handle, DEFAULT_CLOSE_TIMEOUT, "logger-tcp-listener");
        }
        self.hub.shutdown_all();
    }

    fn set_feedback(&self, feedback: FeedbackSender) {
        self.feedback.set(feedback);
    }

    fn name(&self) -> &str {
        "tcp"
    }
}

impl Drop for TcpStreamWriter {
    fn drop(&mut self) {
        self.close();
    }
}
