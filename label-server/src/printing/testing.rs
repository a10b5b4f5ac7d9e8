//! In-memory printer for unit tests

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use zpl_printer::{
    Driver, ExtendedStatus, PeelSensorReading, PrintError, PrintResult, PrinterClient,
    ProbeStatus, parse_extended_status, parse_peel_response,
};

#[derive(Default)]
pub struct MockPrinter {
    pub sends: AtomicUsize,
    pub peel_queries: AtomicUsize,
    pub send_fails: AtomicBool,
    pub peel_fails: AtomicBool,
    pub offline: AtomicBool,
    /// Peel readings of "clear" still to hand out
    pub pending_taken: AtomicUsize,
    /// (address, payload) of every successful send
    pub jobs: Mutex<Vec<(String, String)>>,
}

impl MockPrinter {
    pub fn push_label_taken(&self) {
        self.pending_taken.fetch_add(1, Ordering::SeqCst);
    }

    pub fn payloads(&self) -> Vec<String> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl PrinterClient for MockPrinter {
    async fn send(&self, address: &str, _driver: Driver, payload: &str) -> PrintResult<String> {
        if self.send_fails.load(Ordering::SeqCst) {
            return Err(PrintError::Connection(format!("{} refused", address)));
        }
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.jobs
            .lock()
            .unwrap()
            .push((address.to_string(), payload.to_string()));
        Ok(String::new())
    }

    async fn probe(&self, address: &str, _driver: Driver) -> ProbeStatus {
        if self.offline.load(Ordering::SeqCst) {
            ProbeStatus::offline(format!("{} unreachable", address))
        } else {
            ProbeStatus::online()
        }
    }

    async fn peel_sensor(&self, address: &str, _driver: Driver) -> PrintResult<PeelSensorReading> {
        self.peel_queries.fetch_add(1, Ordering::SeqCst);
        if self.peel_fails.load(Ordering::SeqCst) {
            return Err(PrintError::Timeout(format!("{} peel query", address)));
        }
        let taken = self
            .pending_taken
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(parse_peel_response(if taken { "\"clear\"" } else { "\"present\"" }))
    }

    async fn extended_status(&self, _address: &str, _driver: Driver) -> PrintResult<ExtendedStatus> {
        Ok(parse_extended_status("PRINTER STATUS,0,1,00000000,0,0,0,0"))
    }
}
