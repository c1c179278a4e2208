//! Capstan server binary
//!
//! Serves a single-node engine over the newline-delimited JSON protocol:
//!
//! ```text
//! capstan-server --host 127.0.0.1 --port 7171 --wal data/node.wal
//! ```

use capstan_engine::Store;
use capstan_server::serve;
use clap::{Arg, Command};
use std::net::TcpListener;
use std::process;
use std::sync::Arc;

fn build_cli() -> Command {
    Command::new("capstan-server")
        .about("Durable key-value store speaking newline-delimited JSON")
        .arg(
            Arg::new("host")
                .long("host")
                .default_value("127.0.0.1")
                .help("Bind address"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .default_value("7171")
                .value_parser(clap::value_parser!(u16))
                .help("Bind port"),
        )
        .arg(
            Arg::new("wal")
                .long("wal")
                .default_value("capstan.wal")
                .help("Path to the write-ahead log"),
        )
}

fn main() {
    tracing_subscriber::fmt().init();

    let matches = build_cli().get_matches();
    let host = matches
        .get_one::<String>("host")
        .expect("has default")
        .clone();
    let port = *matches.get_one::<u16>("port").expect("has default");
    let wal = matches
        .get_one::<String>("wal")
        .expect("has default")
        .clone();

    let store = match Store::open(&wal) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("failed to open store at {wal}: {e}");
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind((host.as_str(), port)) {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("failed to bind {host}:{port}: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = serve(listener, store) {
        eprintln!("server error: {e}");
        process::exit(1);
    }
}
