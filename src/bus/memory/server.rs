// src/bus/memory/server.rs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use super::super::fanout::Fanout;
use super::super::lock_ignore_poison;
use crate::{ErrorCode, PublishError, RealmProperties, Result, Step, SubscriptionHandle};

/// Running in-memory realm servers, keyed by realm name.
type Registry = Mutex<HashMap<String, Arc<ServerState>>>;

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Look up a running server by realm name.
pub(super) fn lookup(name: &str) -> Option<Arc<ServerState>> {
    lock_ignore_poison(registry()).get(name).cloned()
}

/// Acquire and release counts observed by an in-memory realm server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub connects: u64,
    pub realm_closes: u64,
    pub publishers_created: u64,
    pub publishers_closed: u64,
    pub messages_created: u64,
    pub messages_destroyed: u64,
    pub sends: u64,
}

impl LedgerSnapshot {
    /// Every acquired realm, publisher and message has been released.
    pub fn is_balanced(&self) -> bool {
        self.connects == self.realm_closes
            && self.publishers_created == self.publishers_closed
            && self.messages_created == self.messages_destroyed
    }
}

#[derive(Default)]
pub(super) struct Ledger {
    pub(super) connects: AtomicU64,
    pub(super) realm_closes: AtomicU64,
    pub(super) publishers_created: AtomicU64,
    pub(super) publishers_closed: AtomicU64,
    pub(super) messages_created: AtomicU64,
    pub(super) messages_destroyed: AtomicU64,
    pub(super) sends: AtomicU64,
}

impl Ledger {
    pub(super) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> LedgerSnapshot {
        // ---
        let read = |c: &AtomicU64| c.load(Ordering::SeqCst);
        LedgerSnapshot {
            connects: read(&self.connects),
            realm_closes: read(&self.realm_closes),
            publishers_created: read(&self.publishers_created),
            publishers_closed: read(&self.publishers_closed),
            messages_created: read(&self.messages_created),
            messages_destroyed: read(&self.messages_destroyed),
            sends: read(&self.sends),
        }
    }
}

/// State shared between a server handle and the connections made to it.
pub(super) struct ServerState {
    name: String,
    running: AtomicBool,
    credentials: Mutex<Option<(String, String)>>,
    faults: Mutex<HashMap<Step, ErrorCode>>,
    pub(super) ledger: Ledger,
    pub(super) fanout: Fanout,
    releases: Mutex<Vec<Step>>,
}

impl ServerState {
    /// Count a release and append it to the release order.
    pub(super) fn record_release(&self, step: Step, counter: &AtomicU64) {
        Ledger::bump(counter);
        lock_ignore_poison(&self.releases).push(step);
    }

    pub(super) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Consume an injected failure for `step`, if one is armed.
    pub(super) fn take_fault(&self, step: Step) -> Result<()> {
        // ---
        match lock_ignore_poison(&self.faults).remove(&step) {
            Some(code) => Err(PublishError::bus(
                step,
                code,
                format!("injected failure on realm {}", self.name),
            )),
            None => Ok(()),
        }
    }

    pub(super) fn authenticate(&self, properties: &RealmProperties) -> Result<()> {
        // ---
        let required = lock_ignore_poison(&self.credentials).clone();
        let Some((username, password)) = required else {
            return Ok(());
        };

        let presented = (
            properties.username.as_deref(),
            properties.password.as_deref(),
        );
        if presented == (Some(username.as_str()), Some(password.as_str())) {
            Ok(())
        } else {
            Err(PublishError::bus(
                Step::Connect,
                ErrorCode::NotPermitted,
                format!("realm {} rejected the supplied credentials", self.name),
            ))
        }
    }
}

/// An in-process realm server reachable at `memory://<name>`.
///
/// The server is registered for as long as the handle lives; dropping it or
/// calling [`shutdown`](Self::shutdown) makes the name unreachable again.
///
/// # Example
///
/// ```
/// # async fn example() -> realm_publisher::Result<()> {
/// use realm_publisher::{Fields, MemoryRealmServer, PublishOnceClient};
///
/// let server = MemoryRealmServer::start("docs")?;
/// let mut sub = server.subscribe("default").await;
///
/// let client = PublishOnceClient::default();
/// client
///     .publish(&server.endpoint(), &Fields::new().with("type", "hello"))
///     .await?;
///
/// let delivered = sub.inbox.recv().await.expect("delivered");
/// assert_eq!(delivered.message.get_string("type"), Some("hello"));
/// assert!(server.ledger().is_balanced());
/// # Ok(())
/// # }
/// ```
pub struct MemoryRealmServer {
    state: Arc<ServerState>,
}

impl MemoryRealmServer {
    /// Start a realm server under `name`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorCode::IllegalState`] if a server with that name is
    /// already running in this process.
    pub fn start(name: impl Into<String>) -> Result<Self> {
        // ---
        let name = name.into();
        let state = Arc::new(ServerState {
            name: name.clone(),
            running: AtomicBool::new(true),
            credentials: Mutex::new(None),
            faults: Mutex::new(HashMap::new()),
            ledger: Ledger::default(),
            fanout: Fanout::new(),
            releases: Mutex::new(Vec::new()),
        });

        let mut servers = lock_ignore_poison(registry());
        if servers.contains_key(&name) {
            return Err(PublishError::bus(
                Step::Connect,
                ErrorCode::IllegalState,
                format!("memory realm {name} is already running"),
            ));
        }
        servers.insert(name.clone(), state.clone());
        drop(servers);

        crate::log_debug!("memory realm {name} started");
        Ok(Self { state })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Endpoint string clients connect to.
    pub fn endpoint(&self) -> String {
        format!("memory://{}", self.state.name)
    }

    /// Reject connections that do not present these credentials.
    pub fn require_credentials(&self, username: impl Into<String>, password: impl Into<String>) {
        *lock_ignore_poison(&self.state.credentials) = Some((username.into(), password.into()));
    }

    /// Fail the next operation at `step` with `code`.
    ///
    /// Release steps still release the resource before reporting the failure.
    pub fn fail_next(&self, step: Step, code: ErrorCode) {
        lock_ignore_poison(&self.state.faults).insert(step, code);
    }

    /// Receive every message sent on the publisher endpoint `endpoint_name`.
    pub async fn subscribe(&self, endpoint_name: &str) -> SubscriptionHandle {
        self.state.fanout.subscribe(endpoint_name).await
    }

    /// Current acquire and release counts.
    pub fn ledger(&self) -> LedgerSnapshot {
        self.state.ledger.snapshot()
    }

    /// Release steps in the order connections performed them.
    pub fn release_order(&self) -> Vec<Step> {
        lock_ignore_poison(&self.state.releases).clone()
    }

    /// Stop the server and end all subscriptions.
    ///
    /// Connections already open see `ClientShutdown` on their next send.
    pub async fn shutdown(self) {
        // ---
        self.unregister();
        self.state.fanout.clear().await;
    }

    fn unregister(&self) {
        // ---
        if !self.state.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut servers = lock_ignore_poison(registry());
        if let Some(current) = servers.get(&self.state.name) {
            if Arc::ptr_eq(current, &self.state) {
                servers.remove(&self.state.name);
            }
        }
        crate::log_debug!("memory realm {} stopped", self.state.name);
    }
}

impl Drop for MemoryRealmServer {
    fn drop(&mut self) {
        self.unregister();
    }
}
