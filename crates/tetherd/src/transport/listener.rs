//! Accept loop for bridge endpoints.
//!
//! The listening socket is polled without blocking so the loop notices a stop
//! request promptly. Every accepted connection runs on its own named worker
//! thread; the loop never waits for a worker.

use std::io;
use std::net::{TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use tether_config::SocketEndpoint;

use super::{ConnectionHandler, ConnectionStream, LISTENER_TARGET, ListenerError};

#[cfg(unix)]
use super::SocketConflict;
#[cfg(unix)]
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::FileTypeExt;
#[cfg(unix)]
use std::os::unix::net::{UnixListener, UnixStream};
#[cfg(unix)]
use std::path::Path;

const IDLE_POLL: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

enum Acceptor {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Acceptor {
    fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let bind_error = |source| ListenerError::Bind {
            endpoint: endpoint.clone(),
            source,
        };
        match endpoint {
            SocketEndpoint::Tcp { host, port } => {
                let address = (host.as_str(), *port)
                    .to_socket_addrs()
                    .and_then(|mut addresses| {
                        addresses.next().ok_or_else(|| {
                            io::Error::new(io::ErrorKind::NotFound, "no addresses resolved")
                        })
                    })
                    .map_err(|source| ListenerError::Resolve {
                        endpoint: endpoint.clone(),
                        source,
                    })?;
                TcpListener::bind(address).map(Self::Tcp).map_err(bind_error)
            }
            #[cfg(unix)]
            SocketEndpoint::Unix { path } => {
                reclaim_stale_socket(endpoint, path.as_std_path())?;
                UnixListener::bind(path.as_std_path())
                    .map(Self::Unix)
                    .map_err(bind_error)
            }
            #[cfg(not(unix))]
            SocketEndpoint::Unix { .. } => Err(bind_error(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are unavailable on this platform",
            ))),
        }
    }

    fn set_nonblocking(&self) -> io::Result<()> {
        match self {
            Self::Tcp(listener) => listener.set_nonblocking(true),
            #[cfg(unix)]
            Self::Unix(listener) => listener.set_nonblocking(true),
        }
    }

    /// Next pending connection, switched back to blocking I/O.
    fn accept(&self) -> io::Result<Option<ConnectionStream>> {
        let accepted = match self {
            Self::Tcp(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                stream.set_nodelay(true)?;
                Ok(ConnectionStream::Tcp(stream))
            }),
            #[cfg(unix)]
            Self::Unix(listener) => listener.accept().and_then(|(stream, _)| {
                stream.set_nonblocking(false)?;
                Ok(ConnectionStream::Unix(stream))
            }),
        };
        match accepted {
            Ok(stream) => Ok(Some(stream)),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(error),
        }
    }

    fn tcp_port(&self) -> Option<u16> {
        match self {
            Self::Tcp(listener) => listener.local_addr().ok().map(|address| address.port()),
            #[cfg(unix)]
            Self::Unix(_) => None,
        }
    }
}

/// Socket bound to a bridge endpoint but not yet accepting.
pub struct SocketListener {
    endpoint: SocketEndpoint,
    acceptor: Acceptor,
}

impl SocketListener {
    /// Binds `endpoint`. A Unix socket file left behind by a dead process is
    /// removed first.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError`] when the endpoint cannot be resolved or
    /// bound, or when its Unix socket path is still in use.
    pub fn bind(endpoint: &SocketEndpoint) -> Result<Self, ListenerError> {
        let acceptor = Acceptor::bind(endpoint)?;
        Ok(Self {
            endpoint: endpoint.clone(),
            acceptor,
        })
    }

    /// Endpoint clients should connect to. A TCP port of zero is replaced by
    /// the port the operating system assigned.
    #[must_use]
    pub fn local_endpoint(&self) -> SocketEndpoint {
        match (&self.endpoint, self.acceptor.tcp_port()) {
            (SocketEndpoint::Tcp { host, .. }, Some(port)) => {
                SocketEndpoint::tcp(host.clone(), port)
            }
            _ => self.endpoint.clone(),
        }
    }

    /// Starts the accept loop on a background thread.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Start`] when the socket cannot be polled or
    /// the thread cannot be spawned.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Result<ListenerHandle, ListenerError> {
        let endpoint = self.local_endpoint();
        if let Err(source) = self.acceptor.set_nonblocking() {
            self.release();
            return Err(ListenerError::Start { endpoint, source });
        }

        let stop = Arc::new(AtomicBool::new(false));
        let accept_loop = AcceptLoop {
            listener: self,
            handler,
            stop: Arc::clone(&stop),
            accepted: 0,
        };
        let thread = thread::Builder::new()
            .name("tetherd-accept".to_owned())
            .spawn(move || accept_loop.run())
            .map_err(|source| ListenerError::Start {
                endpoint: endpoint.clone(),
                source,
            })?;
        Ok(ListenerHandle {
            endpoint,
            stop,
            thread: Some(thread),
        })
    }

    fn release(&self) {
        #[cfg(unix)]
        {
            if let SocketEndpoint::Unix { path } = &self.endpoint
                && let Err(error) = fs::remove_file(path.as_std_path())
                && error.kind() != io::ErrorKind::NotFound
            {
                warn!(
                    target: LISTENER_TARGET,
                    path = %path,
                    error = %error,
                    "failed to remove unix socket file"
                );
            }
        }
    }
}

impl std::fmt::Debug for SocketListener {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SocketListener")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Control over a running accept loop.
///
/// Dropping the handle asks the loop to stop without waiting for it.
#[derive(Debug)]
pub struct ListenerHandle {
    endpoint: SocketEndpoint,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Asks the accept loop to stop. Connections already accepted run to
    /// completion on their own threads.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::AcceptLoopPanicked`] when the loop panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| ListenerError::AcceptLoopPanicked {
                    endpoint: self.endpoint.clone(),
                }),
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct AcceptLoop {
    listener: SocketListener,
    handler: Arc<dyn ConnectionHandler>,
    stop: Arc<AtomicBool>,
    accepted: u64,
}

impl AcceptLoop {
    fn run(mut self) {
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.listener.endpoint,
            "accepting legacy connections"
        );
        let mut failing = None::<io::ErrorKind>;
        while !self.stop.load(Ordering::SeqCst) {
            match self.listener.acceptor.accept() {
                Ok(Some(stream)) => {
                    failing = None;
                    self.spawn_worker(stream);
                }
                Ok(None) => thread::sleep(IDLE_POLL),
                Err(error) => {
                    // Repeated failures of one kind are logged once.
                    if failing.replace(error.kind()) != Some(error.kind()) {
                        warn!(target: LISTENER_TARGET, error = %error, "accept failed");
                    }
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
        info!(
            target: LISTENER_TARGET,
            endpoint = %self.listener.endpoint,
            accepted = self.accepted,
            "stopped accepting"
        );
        self.listener.release();
    }

    fn spawn_worker(&mut self, stream: ConnectionStream) {
        self.accepted += 1;
        debug!(
            target: LISTENER_TARGET,
            connection = self.accepted,
            peer = stream.peer_address().as_deref().unwrap_or("unnamed"),
            "accepted connection"
        );
        let handler = Arc::clone(&self.handler);
        let spawned = thread::Builder::new()
            .name(format!("tetherd-conn-{}", self.accepted))
            .spawn(move || handler.handle(stream));
        if let Err(error) = spawned {
            warn!(
                target: LISTENER_TARGET,
                error = %error,
                "failed to spawn connection worker"
            );
        }
    }
}

/// Removes a socket file whose owner is gone, leaving live sockets and
/// non-socket files alone.
#[cfg(unix)]
fn reclaim_stale_socket(endpoint: &SocketEndpoint, path: &Path) -> Result<(), ListenerError> {
    let bind_error = |source| ListenerError::Bind {
        endpoint: endpoint.clone(),
        source,
    };
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(bind_error(error)),
    };
    let conflict = |conflict| ListenerError::Conflict {
        endpoint: endpoint.clone(),
        conflict,
    };
    if !metadata.file_type().is_socket() {
        return Err(conflict(SocketConflict::NotSocket));
    }
    match UnixStream::connect(path) {
        Ok(_) => Err(conflict(SocketConflict::Live)),
        Err(error)
            if matches!(
                error.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ) =>
        {
            debug!(
                target: LISTENER_TARGET,
                path = %path.display(),
                "removing stale unix socket"
            );
            fs::remove_file(path).map_err(bind_error)
        }
        Err(error) => Err(bind_error(error)),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpStream;
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;

    /// Records the worker thread name of every handled connection.
    #[derive(Default)]
    struct ThreadNames {
        names: Mutex<Vec<String>>,
    }

    impl ThreadNames {
        fn wait_for(&self, expected: usize) -> Vec<String> {
            let deadline = Instant::now() + Duration::from_secs(2);
            loop {
                let names = self.names.lock().expect("names mutex").clone();
                if names.len() >= expected || Instant::now() >= deadline {
                    return names;
                }
                thread::sleep(Duration::from_millis(10));
            }
        }
    }

    impl ConnectionHandler for ThreadNames {
        fn handle(&self, _stream: ConnectionStream) {
            let name = thread::current().name().unwrap_or_default().to_owned();
            self.names.lock().expect("names mutex").push(name);
        }
    }

    fn connect_tcp(endpoint: &SocketEndpoint) -> TcpStream {
        let SocketEndpoint::Tcp { host, port } = endpoint else {
            panic!("expected a tcp endpoint, got {endpoint}");
        };
        TcpStream::connect((host.as_str(), *port)).expect("connect tcp client")
    }

    #[test]
    fn tcp_connections_run_on_named_workers() {
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind listener");
        let endpoint = listener.local_endpoint();
        let names = Arc::new(ThreadNames::default());
        let handle = listener
            .start(Arc::clone(&names) as Arc<dyn ConnectionHandler>)
            .expect("start");

        let _first = connect_tcp(&endpoint);
        let _second = connect_tcp(&endpoint);

        let mut seen = names.wait_for(2);
        seen.sort();
        assert_eq!(seen, ["tetherd-conn-1", "tetherd-conn-2"]);
        handle.shutdown();
        handle.join().expect("join listener");
    }

    #[test]
    fn local_endpoint_reports_the_assigned_port() {
        let listener =
            SocketListener::bind(&SocketEndpoint::tcp("127.0.0.1", 0)).expect("bind listener");
        let SocketEndpoint::Tcp { host, port } = listener.local_endpoint() else {
            panic!("expected a tcp endpoint");
        };
        assert_eq!(host, "127.0.0.1");
        assert_ne!(port, 0);
    }

    #[test]
    fn occupied_tcp_ports_fail_to_bind() {
        let occupied = TcpListener::bind(("127.0.0.1", 0)).expect("occupy port");
        let port = occupied.local_addr().expect("local address").port();
        let endpoint = SocketEndpoint::tcp("127.0.0.1", port);

        let error = SocketListener::bind(&endpoint).expect_err("port in use");
        assert!(matches!(error, ListenerError::Bind { .. }), "{error}");
        assert!(error.to_string().starts_with(&format!("cannot bind {endpoint}: ")));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn endpoint(path: &Path) -> SocketEndpoint {
            SocketEndpoint::unix(path.to_str().expect("utf8 path"))
        }

        #[test]
        fn stale_socket_files_are_replaced_and_removed_on_stop() {
            let dir = tempfile::tempdir().expect("temp dir");
            let path = dir.path().join("tetherd.sock");
            drop(UnixListener::bind(&path).expect("bind stale listener"));
            assert!(path.exists(), "stale socket should remain");

            let listener = SocketListener::bind(&endpoint(&path)).expect("bind over stale socket");
            let names = Arc::new(ThreadNames::default());
            let handle = listener
                .start(Arc::clone(&names) as Arc<dyn ConnectionHandler>)
                .expect("start");

            let _client = UnixStream::connect(&path).expect("connect unix client");
            assert_eq!(names.wait_for(1).len(), 1);

            handle.shutdown();
            handle.join().expect("join listener");
            assert!(!path.exists(), "socket file should be removed on stop");
        }

        #[test]
        fn live_sockets_are_left_alone() {
            let dir = tempfile::tempdir().expect("temp dir");
            let path = dir.path().join("tetherd.sock");
            let _live = UnixListener::bind(&path).expect("bind live listener");

            let error = SocketListener::bind(&endpoint(&path)).expect_err("socket in use");
            assert!(matches!(
                error,
                ListenerError::Conflict {
                    conflict: SocketConflict::Live,
                    ..
                }
            ));
            assert!(path.exists());
        }

        #[test]
        fn regular_files_are_not_replaced() {
            let dir = tempfile::tempdir().expect("temp dir");
            let path = dir.path().join("tetherd.sock");
            fs::write(&path, b"not a socket").expect("write file");

            let error = SocketListener::bind(&endpoint(&path)).expect_err("not a socket");
            assert!(matches!(
                error,
                ListenerError::Conflict {
                    conflict: SocketConflict::NotSocket,
                    ..
                }
            ));
            assert_eq!(fs::read(&path).expect("read file"), b"not a socket");
        }
    }
}
