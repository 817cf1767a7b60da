//! Shared test utilities for keyferry integration tests.
//!
//! Provides an in-process RESP store that answers the handful of commands the
//! migration tests need, including a real store-to-store `MIGRATE` that talks
//! to the destination over TCP with `RESTORE`.
//!
//! Import via `mod common;` in integration test files:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use keyferry::protocol::{encode_to_bytes, parse_frame, Frame};
use keyferry::{Connection, Endpoint};

/// Password used by the protected test stores.
#[allow(dead_code)]
pub const TEST_PASSWORD: &str = "foobared";

/// Database index used by the "selected db" scenarios.
#[allow(dead_code)]
pub const DB_AUTH: u32 = 3;

/// Client timeout used by tests, matching the usual 2 second client default.
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_millis(2000);

// ============================================================================
// Store
// ============================================================================

/// In-memory keyspace split into numbered databases.
#[derive(Default)]
pub struct TestStore {
    dbs: Mutex<HashMap<u32, HashMap<Bytes, Bytes>>>,
    password: Option<String>,
    acl_user: Option<(String, String)>,
}

impl TestStore {
    #[allow(dead_code)]
    pub fn get(&self, db: u32, key: &[u8]) -> Option<Bytes> {
        self.dbs.lock().get(&db).and_then(|m| m.get(key).cloned())
    }

    #[allow(dead_code)]
    pub fn set(&self, db: u32, key: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.dbs
            .lock()
            .entry(db)
            .or_default()
            .insert(key.into(), value.into());
    }

    fn del(&self, db: u32, key: &[u8]) -> bool {
        self.dbs
            .lock()
            .get_mut(&db)
            .map(|m| m.remove(key).is_some())
            .unwrap_or(false)
    }

    fn flush(&self) {
        self.dbs.lock().clear();
    }

    fn check_auth(&self, username: Option<&[u8]>, password: &[u8]) -> bool {
        match username {
            None | Some(b"default") => self
                .password
                .as_deref()
                .map(|p| p.as_bytes() == password)
                .unwrap_or(false),
            Some(user) => self
                .acl_user
                .as_ref()
                .map(|(u, p)| u.as_bytes() == user && p.as_bytes() == password)
                .unwrap_or(false),
        }
    }
}

// ============================================================================
// Server helpers
// ============================================================================

/// A running in-process store.
pub struct TestServer {
    pub port: u16,
    pub store: Arc<TestStore>,
}

impl TestServer {
    #[allow(dead_code)]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.port).with_timeout(TEST_TIMEOUT)
    }

    /// Open a client connection, authenticating when the store is protected.
    #[allow(dead_code)]
    pub async fn connect(&self) -> Connection {
        let mut conn = Connection::connect(&self.endpoint())
            .await
            .expect("should connect to test server");
        if let Some(password) = &self.store.password {
            conn.authenticate(None, password)
                .await
                .expect("should authenticate");
        }
        conn
    }

    /// Connect and select `db`.
    #[allow(dead_code)]
    pub async fn connect_db(&self, db: u32) -> Connection {
        let mut conn = self.connect().await;
        conn.select(db).await.expect("should select db");
        conn
    }
}

/// Start an open store on a random port.
#[allow(dead_code)]
pub async fn start_server() -> TestServer {
    spawn_store(TestStore::default()).await
}

/// Start a store that requires `AUTH <password>` before any other command.
#[allow(dead_code)]
pub async fn start_protected_server(password: &str) -> TestServer {
    spawn_store(TestStore {
        password: Some(password.to_string()),
        ..TestStore::default()
    })
    .await
}

/// Start a store that requires `AUTH <user> <password>`.
#[allow(dead_code)]
pub async fn start_acl_server(user: &str, password: &str) -> TestServer {
    spawn_store(TestStore {
        password: Some(format!("{password}-default")),
        acl_user: Some((user.to_string(), password.to_string())),
        ..TestStore::default()
    })
    .await
}

/// Start a listener that accepts and reads commands but never answers.
#[allow(dead_code)]
pub async fn start_silent_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind to random port");
    let port = listener.local_addr().expect("should have local addr").port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    port
}

async fn spawn_store(store: TestStore) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind to random port");
    let port = listener.local_addr().expect("should have local addr").port();
    let store = Arc::new(store);

    let shared = Arc::clone(&store);
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let store = Arc::clone(&shared);
            tokio::spawn(async move {
                let _ = serve(socket, store).await;
            });
        }
    });

    TestServer { port, store }
}

// ============================================================================
// Connection loop and command dispatch
// ============================================================================

struct Session {
    authenticated: bool,
    db: u32,
}

async fn serve(mut socket: TcpStream, store: Arc<TestStore>) -> std::io::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);
    let mut session = Session {
        authenticated: store.password.is_none(),
        db: 0,
    };

    loop {
        while let Some(frame) = parse_frame(&mut buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?
        {
            let reply = match command_args(frame) {
                Some(args) if !args.is_empty() => dispatch(&store, &mut session, args).await,
                _ => Frame::error("ERR Protocol error: expected command array"),
            };
            socket.write_all(&encode_to_bytes(&reply)).await?;
        }

        if socket.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}

fn command_args(frame: Frame) -> Option<Vec<Bytes>> {
    frame
        .into_array()?
        .into_iter()
        .map(Frame::into_bytes)
        .collect()
}

fn wrong_args(name: &str) -> Frame {
    Frame::error(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

async fn dispatch(store: &TestStore, session: &mut Session, args: Vec<Bytes>) -> Frame {
    let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();

    if name == "AUTH" {
        return auth(store, session, &args);
    }
    if !session.authenticated {
        return Frame::error("NOAUTH Authentication required.");
    }

    let db = session.db;
    match (name.as_str(), args.len()) {
        ("PING", _) => Frame::simple("PONG"),
        ("SELECT", 2) => match std::str::from_utf8(&args[1]).ok().and_then(|s| s.parse().ok()) {
            Some(index) => {
                session.db = index;
                Frame::simple("OK")
            }
            None => Frame::error("ERR value is not an integer or out of range"),
        },
        ("SET", 3) => {
            store.set(db, args[1].clone(), args[2].clone());
            Frame::simple("OK")
        }
        ("GET", 2) => match store.get(db, &args[1]) {
            Some(value) => Frame::bulk(value),
            None => Frame::null(),
        },
        ("MSET", n) if n >= 3 && n % 2 == 1 => {
            for pair in args[1..].chunks(2) {
                store.set(db, pair[0].clone(), pair[1].clone());
            }
            Frame::simple("OK")
        }
        ("DEL", n) if n >= 2 => {
            let removed = args[1..].iter().filter(|k| store.del(db, k)).count();
            Frame::Integer(removed as i64)
        }
        ("EXISTS", n) if n >= 2 => {
            let found = args[1..]
                .iter()
                .filter(|k| store.get(db, k).is_some())
                .count();
            Frame::Integer(found as i64)
        }
        ("FLUSHALL", _) => {
            store.flush();
            Frame::simple("OK")
        }
        ("RESTORE", n) if n == 4 || n == 5 => restore(store, db, &args),
        ("MIGRATE", n) if n >= 6 => migrate(store, db, &args).await,
        ("SELECT" | "SET" | "GET" | "MSET" | "DEL" | "EXISTS" | "RESTORE" | "MIGRATE", _) => {
            wrong_args(&name)
        }
        _ => Frame::error(format!("ERR unknown command '{}'", name.to_ascii_lowercase())),
    }
}

fn auth(store: &TestStore, session: &mut Session, args: &[Bytes]) -> Frame {
    let (user, password) = match args.len() {
        2 => (None, &args[1]),
        3 => (Some(args[1].as_ref()), &args[2]),
        _ => return wrong_args("AUTH"),
    };

    if store.password.is_none() && store.acl_user.is_none() {
        return Frame::error(
            "ERR AUTH <password> called without any password configured for the default user.",
        );
    }
    if store.check_auth(user, password) {
        session.authenticated = true;
        Frame::simple("OK")
    } else {
        Frame::error("WRONGPASS invalid username-password pair or user is disabled.")
    }
}

/// `RESTORE key ttl value [REPLACE]`; values are stored verbatim.
fn restore(store: &TestStore, db: u32, args: &[Bytes]) -> Frame {
    let replace = match args.get(4) {
        Some(opt) if opt.eq_ignore_ascii_case(b"REPLACE") => true,
        Some(_) => return Frame::error("ERR syntax error"),
        None => false,
    };
    if !replace && store.get(db, &args[1]).is_some() {
        return Frame::error("BUSYKEY Target key name already exists.");
    }
    store.set(db, args[1].clone(), args[3].clone());
    Frame::simple("OK")
}

struct MigrateCommand {
    host: String,
    port: u16,
    db: u32,
    timeout: Duration,
    copy: bool,
    replace: bool,
    auth: Option<(Option<Bytes>, Bytes)>,
    keys: Vec<Bytes>,
}

fn parse_migrate(args: &[Bytes]) -> Result<MigrateCommand, Frame> {
    let text = |b: &Bytes| String::from_utf8_lossy(b).into_owned();
    let number = |b: &Bytes| {
        std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| Frame::error("ERR value is not an integer or out of range"))
    };

    let mut cmd = MigrateCommand {
        host: text(&args[1]),
        port: number(&args[2])? as u16,
        db: number(&args[4])? as u32,
        timeout: Duration::from_millis(number(&args[5])?),
        copy: false,
        replace: false,
        auth: None,
        keys: Vec::new(),
    };

    let mut i = 6;
    while i < args.len() {
        let opt = text(&args[i]).to_ascii_uppercase();
        match opt.as_str() {
            "COPY" => cmd.copy = true,
            "REPLACE" => cmd.replace = true,
            "AUTH" if i + 1 < args.len() => {
                cmd.auth = Some((None, args[i + 1].clone()));
                i += 1;
            }
            "AUTH2" if i + 2 < args.len() => {
                cmd.auth = Some((Some(args[i + 1].clone()), args[i + 2].clone()));
                i += 2;
            }
            "KEYS" => {
                if !args[3].is_empty() {
                    return Err(Frame::error(
                        "ERR When using MIGRATE KEYS option, the key argument must be set to the empty string",
                    ));
                }
                cmd.keys = args[i + 1..].to_vec();
                break;
            }
            _ => return Err(Frame::error("ERR syntax error")),
        }
        i += 1;
    }

    if cmd.keys.is_empty() {
        cmd.keys.push(args[3].clone());
    }
    Ok(cmd)
}

/// Store-side MIGRATE: RESTORE every existing key on the destination, delete
/// the moved ones locally unless COPY, report the last destination error.
async fn migrate(store: &TestStore, db: u32, args: &[Bytes]) -> Frame {
    let cmd = match parse_migrate(args) {
        Ok(cmd) => cmd,
        Err(reply) => return reply,
    };

    let present: Vec<(Bytes, Bytes)> = cmd
        .keys
        .iter()
        .filter_map(|k| store.get(db, k).map(|v| (k.clone(), v)))
        .collect();
    if present.is_empty() {
        return Frame::simple("NOKEY");
    }

    let endpoint = Endpoint::new(cmd.host.clone(), cmd.port).with_timeout(cmd.timeout);
    let mut target = match Connection::connect(&endpoint).await {
        Ok(conn) => conn,
        Err(_) => return Frame::error("IOERR error or timeout connecting to the client"),
    };

    let target_error = |msg: String| {
        Frame::error(format!("ERR Target instance replied with error: {msg}"))
    };

    if let Some((user, password)) = &cmd.auth {
        let mut auth = vec![Bytes::from_static(b"AUTH")];
        auth.extend(user.iter().cloned());
        auth.push(password.clone());
        match target.send(auth).await {
            Ok(Frame::Error(msg)) => return target_error(String::from_utf8_lossy(&msg).into_owned()),
            Ok(_) => {}
            Err(_) => return Frame::error("IOERR error or timeout writing to target instance"),
        }
    }

    match target
        .send([Bytes::from_static(b"SELECT"), Bytes::from(cmd.db.to_string())])
        .await
    {
        Ok(Frame::Error(msg)) => return target_error(String::from_utf8_lossy(&msg).into_owned()),
        Ok(_) => {}
        Err(_) => return Frame::error("IOERR error or timeout writing to target instance"),
    }

    let mut last_error = None;
    for (key, value) in present {
        let mut restore = vec![
            Bytes::from_static(b"RESTORE"),
            key.clone(),
            Bytes::from_static(b"0"),
            value,
        ];
        if cmd.replace {
            restore.push(Bytes::from_static(b"REPLACE"));
        }

        match target.send(restore).await {
            Ok(Frame::Error(msg)) => {
                last_error = Some(String::from_utf8_lossy(&msg).into_owned());
            }
            Ok(_) => {
                if !cmd.copy {
                    store.del(db, &key);
                }
            }
            Err(_) => return Frame::error("IOERR error or timeout reading to target instance"),
        }
    }

    match last_error {
        Some(msg) => target_error(msg),
        None => Frame::simple("OK"),
    }
}

// ============================================================================
// Client helpers
// ============================================================================

/// `SET key value` over a client connection.
#[allow(dead_code)]
pub async fn set(conn: &mut Connection, key: impl Into<Bytes>, value: impl Into<Bytes>) {
    conn.execute([Bytes::from_static(b"SET"), key.into(), value.into()])
        .await
        .expect("SET should succeed");
}

/// `GET key` over a client connection.
#[allow(dead_code)]
pub async fn get(conn: &mut Connection, key: impl Into<Bytes>) -> Option<Bytes> {
    conn.execute([Bytes::from_static(b"GET"), key.into()])
        .await
        .expect("GET should succeed")
        .into_bytes()
}

/// `MSET k1 v1 k2 v2 ...` over a client connection.
#[allow(dead_code)]
pub async fn mset<K, V>(conn: &mut Connection, pairs: impl IntoIterator<Item = (K, V)>)
where
    K: Into<Bytes>,
    V: Into<Bytes>,
{
    let mut args = vec![Bytes::from_static(b"MSET")];
    for (k, v) in pairs {
        args.push(k.into());
        args.push(v.into());
    }
    conn.execute(args).await.expect("MSET should succeed");
}
