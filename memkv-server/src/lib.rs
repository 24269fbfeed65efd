//! The TCP front end: acceptor loop, per-connection parser-execute-reply
//! loop, signal-driven graceful shutdown, and the glue that wires a
//! [`Config`] into a running [`Server`] (with AOF persistence, if enabled).

pub mod config;
pub mod connection;
pub mod logging;
pub mod options;

use std::sync::Arc;

use bytes::Bytes;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_stream::StreamExt;

use memkv_aof::Persister;
use memkv_db::{DbEngine, Server};
use memkv_resp::{parse_stream, Payload, Reply};

use crate::config::Config;
use crate::connection::Connection;

/// Builds the server (and, if configured, its AOF persister), then runs
/// the acceptor loop until a shutdown signal arrives.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let server = Arc::new(Server::new(config.databases));

    if config.appendonly {
        let engine: Arc<dyn DbEngine> = Arc::clone(&server) as Arc<dyn DbEngine>;
        let databases = config.databases;
        let factory: memkv_aof::DbEngineFactory = Arc::new(move || Arc::new(Server::new(databases)) as Arc<dyn DbEngine>);
        let persister = Persister::new(engine, true, config.appendfilename.as_str(), config.appendfsync.as_str(), factory).await?;
        server.install_aof(Arc::new(persister));
        tracing::info!(file = %config.appendfilename, fsync = %config.appendfsync, "aof persistence enabled");
    }

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    tracing::info!(bind = %config.bind, port = config.port, runid = %config.runid, "memkv-server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(signal_listener(shutdown_tx));

    accept_loop(listener, server, shutdown_rx).await;
    Ok(())
}

/// Waits for the first of SIGHUP/SIGQUIT/SIGTERM/SIGINT and trips the
/// shutdown signal.
async fn signal_listener(shutdown_tx: watch::Sender<bool>) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut hangup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = hangup.recv() => tracing::info!("received SIGHUP"),
        _ = quit.recv() => tracing::info!("received SIGQUIT"),
        _ = term.recv() => tracing::info!("received SIGTERM"),
        _ = interrupt.recv() => tracing::info!("received SIGINT"),
    }
    let _ = shutdown_tx.send(true);
}

async fn accept_loop(listener: TcpListener, server: Arc<Server>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut tasks = tokio::task::JoinSet::new();
    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("shutting down: no longer accepting connections");
                    break;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, addr)) => {
                        tracing::info!(%addr, "connection accepted");
                        let server = Arc::clone(&server);
                        let shutdown_rx = shutdown_rx.clone();
                        tasks.spawn(handle_connection(socket, server, shutdown_rx));
                    }
                    Err(e) => tracing::warn!(error = %e, "accept failed"),
                }
            }
        }
    }

    // Let in-flight connections drain; each is bounded by its own 10s
    // close timeout, so this loop cannot hang indefinitely.
    while tasks.join_next().await.is_some() {}
}

async fn handle_connection(socket: TcpStream, server: Arc<Server>, mut shutdown_rx: watch::Receiver<bool>) {
    let _ = socket.set_nodelay(true);
    let (read_half, write_half) = tokio::io::split(socket);
    let conn = Arc::new(Connection::new(write_half));
    let reader = tokio::io::BufReader::new(read_half);
    let mut stream = Box::pin(parse_stream(reader));

    loop {
        let payload = tokio::select! {
            payload = stream.next() => payload,
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
                continue;
            }
        };
        let payload = match payload {
            Some(p) => p,
            None => break,
        };
        match payload {
            Payload::Err(e) => {
                let _ = conn.write(&Reply::Error(e.wire_message()).to_bytes()).await;
                break;
            }
            Payload::Reply(Reply::MultiBulk(items)) => {
                let cmdline: Vec<Bytes> = match items.into_iter().collect::<Option<Vec<Bytes>>>() {
                    Some(c) if !c.is_empty() => c,
                    _ => continue,
                };
                let reply = server.exec(&conn.db, &cmdline).await;
                if conn.write(&reply.to_bytes()).await.is_err() {
                    break;
                }
            }
            Payload::Reply(_) => continue,
        }
    }

    conn.close().await;
    tracing::info!("connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn round_trips_a_command_over_the_wire() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(1));
        let (_tx, rx) = watch::channel(false);

        tokio::spawn({
            let server = Arc::clone(&server);
            async move {
                let (socket, _) = listener.accept().await.unwrap();
                handle_connection(socket, server, rx).await;
            }
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n").await.unwrap();
        client.write_all(b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n").await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+OK\r\n");
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$1\r\nv\r\n");
    }

    #[tokio::test]
    async fn closes_connection_on_protocol_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(Server::new(1));
        let (_tx, rx) = watch::channel(false);

        tokio::spawn({
            let server = Arc::clone(&server);
            async move {
                let (socket, _) = listener.accept().await.unwrap();
                handle_connection(socket, server, rx).await;
            }
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"$abc\r\n").await.unwrap();

        let mut buf = vec![0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"-"));
        // the handler closes its side after the error reply.
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }
}
