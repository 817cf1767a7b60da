//! Connection handling
//!
//! A [`Connection`] is one authenticated session to a store instance, bound
//! to a logical database. Every command is a single request/reply round
//! trip bounded by a deadline.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{KeyferryError, Result};
use crate::protocol::{encode_frame, parse_frame_with_limits, Frame, ParserLimits};

/// Default port of a RESP store
pub const DEFAULT_PORT: u16 = 6379;

/// Default I/O timeout (2 seconds)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default buffer size (4KB)
const DEFAULT_CONNECTION_BUFFER_SIZE: usize = 4 * 1024;

/// Address of a store instance plus the I/O bound used when talking to it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Connect and per-command timeout
    pub timeout: Duration,
}

impl Endpoint {
    /// Create an endpoint with the default timeout
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `host:port` form suitable for `TcpStream::connect`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Something that can carry one command to a store and bring back its reply.
///
/// [`Connection`] is the production implementation; the migration
/// coordinator only depends on this trait.
#[async_trait]
pub trait CommandTransport: Send {
    /// Send `command` and wait at most `deadline` for the reply.
    ///
    /// Error replies are returned as `Ok(Frame::Error(..))`; only transport
    /// failures are `Err`.
    async fn round_trip(&mut self, command: &Frame, deadline: Duration) -> Result<Frame>;
}

/// A client connection to a store instance
pub struct Connection {
    stream: TcpStream,
    endpoint: Endpoint,
    read_buf: BytesMut,
    write_buf: BytesMut,
    limits: ParserLimits,
    database: u32,
    broken: bool,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("database", &self.database)
            .field("broken", &self.broken)
            .finish()
    }
}

impl Connection {
    /// Open a connection to `endpoint`, bounded by the endpoint timeout
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        let addr = endpoint.addr();
        debug!(%addr, "connecting");

        let stream = match timeout(endpoint.timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(KeyferryError::Io(e)),
            Err(_) => return Err(KeyferryError::Timeout(endpoint.timeout)),
        };
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            endpoint: endpoint.clone(),
            read_buf: BytesMut::with_capacity(DEFAULT_CONNECTION_BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(DEFAULT_CONNECTION_BUFFER_SIZE),
            limits: ParserLimits::default(),
            database: 0,
            broken: false,
        })
    }

    /// The endpoint this connection talks to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Currently selected database index
    pub fn database(&self) -> u32 {
        self.database
    }

    /// True once a command timed out or the stream failed; the connection
    /// refuses further commands.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Override the reply parser limits
    pub fn set_parser_limits(&mut self, limits: ParserLimits) {
        self.limits = limits;
    }

    /// Send a command and return the raw reply, error replies included
    pub async fn send<I, A>(&mut self, args: I) -> Result<Frame>
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        let command = Frame::command(args);
        let deadline = self.endpoint.timeout;
        self.round_trip(&command, deadline).await
    }

    /// Send a command and turn an error reply into [`KeyferryError::Server`]
    pub async fn execute<I, A>(&mut self, args: I) -> Result<Frame>
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        match self.send(args).await? {
            Frame::Error(msg) => Err(KeyferryError::Server(
                String::from_utf8_lossy(&msg).into_owned(),
            )),
            reply => Ok(reply),
        }
    }

    /// Authenticate with `AUTH [username] password`
    pub async fn authenticate(&mut self, username: Option<&str>, password: &str) -> Result<()> {
        let reply = match username {
            Some(user) => {
                self.send([
                    Bytes::from_static(b"AUTH"),
                    Bytes::copy_from_slice(user.as_bytes()),
                    Bytes::copy_from_slice(password.as_bytes()),
                ])
                .await?
            }
            None => {
                self.send([
                    Bytes::from_static(b"AUTH"),
                    Bytes::copy_from_slice(password.as_bytes()),
                ])
                .await?
            }
        };

        match reply {
            Frame::Simple(_) => Ok(()),
            Frame::Error(msg) => {
                let msg = String::from_utf8_lossy(&msg).into_owned();
                warn!(endpoint = %self.endpoint, "authentication rejected");
                Err(KeyferryError::Authentication(msg))
            }
            other => Err(KeyferryError::UnexpectedReply(other.describe())),
        }
    }

    /// Bind the session to database `db`
    pub async fn select(&mut self, db: u32) -> Result<()> {
        self.execute([Bytes::from_static(b"SELECT"), Bytes::from(db.to_string())])
            .await?;
        self.database = db;
        Ok(())
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_buf.clear();
        encode_frame(frame, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = parse_frame_with_limits(&mut self.read_buf, &self.limits)? {
                return Ok(frame);
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(KeyferryError::ConnectionClosed);
            }
        }
    }
}

#[async_trait]
impl CommandTransport for Connection {
    async fn round_trip(&mut self, command: &Frame, deadline: Duration) -> Result<Frame> {
        if self.broken {
            return Err(KeyferryError::ConnectionBroken);
        }

        if let Some(name) = command_name(command) {
            debug!(endpoint = %self.endpoint, command = %name, "sending command");
        }

        let exchange = async {
            self.write_frame(command).await?;
            self.read_frame().await
        };

        let outcome = timeout(deadline, exchange).await;
        match outcome {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                if e.is_fatal() {
                    self.broken = true;
                }
                Err(e)
            }
            Err(_) => {
                warn!(endpoint = %self.endpoint, ?deadline, "command timed out, dropping connection state");
                self.broken = true;
                Err(KeyferryError::Timeout(deadline))
            }
        }
    }
}

/// Upper-cased command name of a command array, for logging.
/// Only the name is logged: arguments may carry credentials.
fn command_name(command: &Frame) -> Option<String> {
    match command {
        Frame::Array(Some(parts)) => parts
            .first()
            .and_then(Frame::as_str)
            .map(str::to_ascii_uppercase),
        _ => None,
    }
}
