//! Shared fakes and fixtures for integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use haproxy_lb_manager::dataplane::{DataPlaneError, DataPlaneResult, ProxyControl};
use haproxy_lb_manager::lbapi::{
    DesiredStateSource, LbApiError, LbApiResult, LoadBalancer, Origin, Pool, Port,
};
use haproxy_lb_manager::reconcile::{ReadinessPolicy, ReconcilerSettings};

pub const MANAGED_ID: &str = "loadbal-managedbythisprocess";
pub const TOPIC_PATTERN: &str = "com.infratographer.changes.*.load-balancer";

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

pub fn topic(event_type: &str) -> String {
    format!("com.infratographer.changes.{event_type}.load-balancer")
}

pub fn settings(loadbalancer_id: &str) -> ReconcilerSettings {
    ReconcilerSettings {
        loadbalancer_id: loadbalancer_id.to_string(),
        base_config_path: fixture_path("haproxy.cfg"),
        address_family: "ipv4".to_string(),
        readiness: ReadinessPolicy {
            retry_limit: 3,
            retry_interval: Duration::from_millis(5),
        },
    }
}

fn origin(id: &str, target: &str, port_number: u32, weight: u32, active: bool) -> Origin {
    Origin {
        id: id.into(),
        name: id.into(),
        target: target.into(),
        port_number,
        weight,
        active,
    }
}

/// One ssh port, one pool, three origins (the last inactive).
pub fn ssh_lb(id: &str) -> LoadBalancer {
    LoadBalancer {
        id: id.into(),
        name: "ssh".into(),
        ports: vec![Port {
            id: "loadprt-ssh".into(),
            name: "ssh-service".into(),
            number: 22,
            pools: vec![Pool {
                id: "loadpol-ssh".into(),
                name: "ssh-pool".into(),
                protocol: "tcp".into(),
                origins: vec![
                    origin("loadogn-ssh1", "1.2.3.4", 2222, 20, true),
                    origin("loadogn-ssh2", "1.2.3.4", 222, 30, true),
                    origin("loadogn-ssh3", "4.3.2.1", 2222, 50, false),
                ],
            }],
        }],
    }
}

/// Desired-state source serving one fixed document.
pub struct FakeLbApi {
    lb: Mutex<Option<LoadBalancer>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeLbApi {
    pub fn new(lb: LoadBalancer) -> Self {
        Self {
            lb: Mutex::new(Some(lb)),
            fetched: Mutex::new(Vec::new()),
        }
    }

    /// Every fetch returns not-found.
    pub fn missing() -> Self {
        Self {
            lb: Mutex::new(None),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn set(&self, lb: Option<LoadBalancer>) {
        *self.lb.lock().unwrap() = lb;
    }

    pub fn calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched_ids(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl DesiredStateSource for FakeLbApi {
    async fn fetch(&self, id: &str) -> LbApiResult<LoadBalancer> {
        self.fetched.lock().unwrap().push(id.to_string());
        match self.lb.lock().unwrap().clone() {
            Some(lb) if lb.id == id => Ok(lb),
            _ => Err(LbApiError::NotFound(id.to_string())),
        }
    }
}

/// Proxy control API that records what it was asked to do.
pub struct FakeProxy {
    ready_after: u32,
    probes: AtomicU32,
    reject: AtomicBool,
    validate_delay: Mutex<Duration>,
    validated: Mutex<Vec<String>>,
    applied: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeProxy {
    pub fn new() -> Self {
        Self::ready_after(1)
    }

    /// Report ready from the `n`th probe on.
    pub fn ready_after(n: u32) -> Self {
        Self {
            ready_after: n,
            probes: AtomicU32::new(0),
            reject: AtomicBool::new(false),
            validate_delay: Mutex::new(Duration::ZERO),
            validated: Mutex::new(Vec::new()),
            applied: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn never_ready() -> Self {
        Self::ready_after(u32::MAX)
    }

    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn set_validate_delay(&self, delay: Duration) {
        *self.validate_delay.lock().unwrap() = delay;
    }

    pub fn probes(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn validated(&self) -> Vec<String> {
        self.validated.lock().unwrap().clone()
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyControl for FakeProxy {
    async fn ready(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst) + 1 >= self.ready_after
    }

    async fn validate(&self, config: &str) -> DataPlaneResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.validate_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.validated.lock().unwrap().push(config.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.reject.load(Ordering::SeqCst) {
            return Err(DataPlaneError::Rejected("[ALERT] parsing error".into()));
        }
        Ok(())
    }

    async fn apply(&self, config: &str) -> DataPlaneResult<()> {
        self.applied.lock().unwrap().push(config.to_string());
        Ok(())
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
