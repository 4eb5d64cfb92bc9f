use crate::logging_transport::Exchange;
use snc_core::transport::Method;
use std::sync::{Arc, Mutex};

/// Requests the client sent, in order.
pub struct RequestLog {
    log: Arc<Mutex<Vec<Exchange>>>,
}

impl RequestLog {
    pub(crate) fn new(log: Arc<Mutex<Vec<Exchange>>>) -> Self {
        Self { log }
    }

    pub fn len(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().unwrap().is_empty()
    }

    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Exchange) -> bool,
    {
        self.log.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }

    /// Number of table API list/get calls against `table`.
    pub fn table_reads(&self, table: &str) -> usize {
        let prefix = format!("/api/now/table/{table}");
        self.count(|e| e.method == Method::Get && e.path.starts_with(&prefix))
    }

    pub fn batch_calls(&self) -> usize {
        self.count(|e| e.path == "/api/now/v1/batch")
    }

    pub fn clear(&mut self) {
        self.log.lock().unwrap().clear();
    }

    /// Remove and return the oldest request.
    pub fn pop(&mut self) -> Option<Exchange> {
        let mut log = self.log.lock().unwrap();
        if log.is_empty() {
            None
        } else {
            Some(log.remove(0))
        }
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.log.lock().unwrap().clone()
    }
}
