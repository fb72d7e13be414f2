//! Scripted cluster transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tenant_proxy::cluster::{ClusterTransport, DirectConnection, UpstreamError};
use tenant_proxy::command::Command;
use tenant_proxy::protocol::RespValue;
use tenant_proxy::tenant::{hash_password, Tenant, TenantDirectory};

pub type Reply = Result<RespValue, UpstreamError>;

#[derive(Default)]
struct MockState {
    cluster_replies: Mutex<VecDeque<Reply>>,
    direct_replies: Mutex<VecDeque<Reply>>,
    cluster_calls: Mutex<Vec<Command>>,
    direct_calls: Mutex<Vec<(String, Command)>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    fail_open: AtomicBool,
}

/// Replies are consumed in order; once a queue is empty every call gets `+OK`.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_cluster(&self, reply: Reply) {
        self.state.cluster_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_direct(&self, reply: Reply) {
        self.state.direct_replies.lock().unwrap().push_back(reply);
    }

    pub fn fail_open(&self) {
        self.state.fail_open.store(true, Ordering::SeqCst);
    }

    pub fn cluster_calls(&self) -> Vec<Command> {
        self.state.cluster_calls.lock().unwrap().clone()
    }

    pub fn direct_calls(&self) -> Vec<(String, Command)> {
        self.state.direct_calls.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterTransport for MockTransport {
    async fn execute(&self, command: &Command) -> Reply {
        self.state.cluster_calls.lock().unwrap().push(command.clone());
        self.state
            .cluster_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RespValue::ok()))
    }

    async fn open_direct(&self, addr: &str) -> Result<Box<dyn DirectConnection>, UpstreamError> {
        if self.state.fail_open.load(Ordering::SeqCst) {
            return Err(UpstreamError::new(format!(
                "ERR connection refused to {}",
                addr
            )));
        }
        self.state.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDirect {
            addr: addr.to_string(),
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockDirect {
    addr: String,
    state: Arc<MockState>,
}

#[async_trait]
impl DirectConnection for MockDirect {
    async fn execute(&mut self, command: &Command) -> Reply {
        self.state
            .direct_calls
            .lock()
            .unwrap()
            .push((self.addr.clone(), command.clone()));
        self.state
            .direct_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RespValue::ok()))
    }
}

impl Drop for MockDirect {
    fn drop(&mut self) {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn cmd(parts: &[&str]) -> Command {
    Command::from_parts(parts.iter())
}

/// `t1` authenticates with a hashed `s`, `t2` with plaintext `pw`.
pub fn directory() -> Arc<TenantDirectory> {
    let hash = hash_password("s").unwrap();
    Arc::new(
        TenantDirectory::new(vec![
            Tenant::new("t1", "t1:").with_password_hash(hash),
            Tenant::new("t2", "t2:").with_password("pw"),
        ])
        .unwrap(),
    )
}
