//! Line-delimited TCP server
//!
//! Thread-per-connection accept loop. Each connection is read line by line;
//! every line is one request frame and produces exactly one response line.

use crate::wire;
use capstan_engine::Store;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Serve requests against `store` until the listener fails.
pub fn serve(listener: TcpListener, store: Arc<Store>) -> io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "listening");
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    if let Err(e) = handle_connection(stream, &store) {
                        tracing::warn!(error = %e, "connection closed with error");
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "accept failed"),
        }
    }
    Ok(())
}

fn handle_connection(stream: TcpStream, store: &Store) -> io::Result<()> {
    let peer = stream.peer_addr()?;
    tracing::debug!(%peer, "client connected");

    let reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = wire::dispatch_line(store, &line);
        let frame = serde_json::to_vec(&response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        writer.write_all(&frame)?;
        writer.write_all(b"\n")?;
    }

    tracing::debug!(%peer, "client disconnected");
    Ok(())
}
