use anyhow::Result;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

/// A Carbon plaintext listener on an ephemeral port that keeps every line it receives.
pub struct FakeCarbon {
    addr: SocketAddr,
    lines: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<usize>>,
    handle: JoinHandle<()>,
}

impl FakeCarbon {
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let lines = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(0usize));

        let handle = {
            let lines = lines.clone();
            let connections = connections.clone();
            tokio::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    *connections.lock().unwrap() += 1;
                    let lines = lines.clone();
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            lines.lock().unwrap().push(line);
                        }
                    });
                }
            })
        };

        Ok(Self {
            addr,
            lines,
            connections,
            handle,
        })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        *self.connections.lock().unwrap()
    }

    /// Polls until at least `count` lines arrived or `timeout` passes.
    pub async fn wait_for_lines(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let lines = self.lines();
            if lines.len() >= count || Instant::now() >= deadline {
                return lines;
            }
            sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakeCarbon {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A port nothing listens on, for exercising connection failures.
pub async fn closed_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}
