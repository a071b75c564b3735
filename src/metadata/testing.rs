//! In-memory provider used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use metaforge_common::{Candidate, Record};

use super::provider::ProviderClient;

pub struct StubProvider {
    name: String,
    hits: Vec<Candidate>,
    records: HashMap<String, Record>,
    delay: Option<Duration>,
    pub query_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            hits: Vec::new(),
            records: HashMap::new(),
            delay: None,
            query_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Serve `record` as both a search hit and its detail.
    pub fn with_record(mut self, record: Record) -> Self {
        self.hits.push(Candidate {
            provider: self.name.clone(),
            remote_ref: record.remote_ref.clone(),
            num: record.num.clone(),
            title: record.title.clone(),
            ..Default::default()
        });
        self.records.insert(record.remote_ref.clone(), record);
        self
    }

    /// A search hit with no detail behind it.
    pub fn with_dead_hit(mut self, num: &str, remote_ref: &str) -> Self {
        self.hits.push(Candidate {
            provider: self.name.clone(),
            remote_ref: remote_ref.to_string(),
            num: num.to_string(),
            ..Default::default()
        });
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ProviderClient for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_key(&self, _key: &str) -> bool {
        true
    }

    async fn query(&self, _key: &str) -> Vec<Candidate> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.hits.clone()
    }

    async fn fetch(&self, remote_ref: &str) -> Option<Record> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.records.get(remote_ref).cloned()
    }
}
