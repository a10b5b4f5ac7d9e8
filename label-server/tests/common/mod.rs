//! Loopback devices shared by the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use zpl_printer::ClientSettings;

pub fn fast_client() -> ClientSettings {
    ClientSettings {
        send_timeout: Duration::from_secs(2),
        probe_timeout: Duration::from_secs(1),
        query_window: Duration::from_millis(200),
        close_grace: Duration::from_millis(50),
    }
}

/// Poll `check` until it holds or three seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..150 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

/// Printer on a loopback port.
///
/// Answers `sensor.peeler` queries ("clear" while taken labels are pending,
/// else "present") and records every other payload as a print job.
#[derive(Clone)]
pub struct FakePrinter {
    pub address: String,
    jobs: Arc<Mutex<Vec<String>>>,
    pending_taken: Arc<AtomicUsize>,
    pub peel_queries: Arc<AtomicUsize>,
}

impl FakePrinter {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let printer = Self {
            address: listener.local_addr().unwrap().to_string(),
            jobs: Arc::default(),
            pending_taken: Arc::default(),
            peel_queries: Arc::default(),
        };

        let device = printer.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let device = device.clone();
                tokio::spawn(async move { device.serve(socket).await });
            }
        });
        printer
    }

    async fn serve(&self, mut socket: TcpStream) {
        let mut chunk = [0u8; 4096];
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let mut data = chunk[..n].to_vec();

        if data.starts_with(b"! U1 getvar") {
            self.peel_queries.fetch_add(1, Ordering::SeqCst);
            let taken = self
                .pending_taken
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            let reply: &[u8] = if taken { b"\"clear\"" } else { b"\"present\"" };
            let _ = socket.write_all(reply).await;
            return;
        }

        loop {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => data.extend_from_slice(&chunk[..n]),
            }
        }
        self.jobs
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(&data).into_owned());
    }

    pub fn take_label(&self) {
        self.pending_taken.fetch_add(1, Ordering::SeqCst);
    }

    pub fn jobs(&self) -> Vec<String> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}
