//! Display agent: validates a rendered surface against the registry.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::status::StatusReport;
use super::surface::{observed_classes, Surface};
use crate::error::{Error, Result, SurfaceError};
use crate::protocol::SurfaceRequest;
use crate::registry::Registry;
use crate::relay::{RelayAgent, Subscription};
use crate::server::observability::spans;

const INITIALIZING: &str = "Initializing...";
const CHECKING: &str = "Checking classes...";
const COMPLETE: &str = "Validation complete";
const FAILED: &str = "Validation failed";

/// Agent lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Idle,
    Checking,
    Disposed,
}

/// Local state, replaced as a whole on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayState {
    /// Registry the agent currently validates against.
    pub registry: Arc<Registry>,
    /// Registry identifiers present on the surface.
    pub valid: BTreeSet<String>,
    /// Registry identifiers absent from the surface.
    pub invalid: BTreeSet<String>,
    /// Completion time of the last successful pass.
    pub last_checked: Option<DateTime<Utc>>,
    /// A pass is running. Presentation only.
    pub checking: bool,
    /// Whether the detail view is shown.
    pub visible: bool,
    /// Latest status message.
    pub message: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        Self {
            registry: Arc::new(Registry::empty()),
            valid: BTreeSet::new(),
            invalid: BTreeSet::new(),
            last_checked: None,
            checking: false,
            visible: true,
            message: INITIALIZING.to_string(),
        }
    }
}

/// Split the registry's identifiers into those `observed` on the surface
/// and those missing from it.
#[must_use]
pub fn partition(
    registry: &Registry,
    observed: &HashSet<String>,
) -> (BTreeSet<String>, BTreeSet<String>) {
    registry
        .classes
        .iter()
        .cloned()
        .partition(|class| observed.contains(class))
}

struct Phase {
    lifecycle: Lifecycle,
    in_flight: usize,
}

struct DisplayInner {
    surface: Arc<dyn Surface>,
    relay: RelayAgent,
    state: watch::Sender<Arc<DisplayState>>,
    phase: Mutex<Phase>,
    subscription: Mutex<Option<Subscription>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

/// Per-surface consumer of the relay.
///
/// Validation passes may overlap. Each pass reads the registry current at
/// its start and only publishes its partition if that registry is still
/// current when it finishes, so a slow pass never overwrites a newer one.
#[derive(Clone)]
pub struct DisplayAgent {
    inner: Arc<DisplayInner>,
}

impl DisplayAgent {
    /// Create an agent for `surface`, fed by `relay`.
    pub fn new(surface: Arc<dyn Surface>, relay: RelayAgent) -> Self {
        let (state, _) = watch::channel(Arc::new(DisplayState::default()));
        Self {
            inner: Arc::new(DisplayInner {
                surface,
                relay,
                state,
                phase: Mutex::new(Phase {
                    lifecycle: Lifecycle::Uninitialized,
                    in_flight: 0,
                }),
                subscription: Mutex::new(None),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to relay pushes, pull the cached registry and run the
    /// first validation pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent was already initialized or disposed.
    /// A failed first pass is not an error.
    pub async fn init(&self) -> Result<()> {
        {
            let mut phase = self.inner.phase.lock();
            if phase.lifecycle != Lifecycle::Uninitialized {
                return Err(Error::internal(format!(
                    "display agent cannot initialize from {:?}",
                    phase.lifecycle
                )));
            }
            phase.lifecycle = Lifecycle::Initializing;
        }

        let name = self.inner.surface.name();
        tracing::info!(surface = %name, "Initializing display agent");

        // Subscribe first so a push racing the pull is not lost.
        let (subscription, mut pushes) = self.inner.relay.subscribe();
        let weak = Arc::downgrade(&self.inner);
        let listener = tokio::spawn(
            async move {
                while let Some(message) = pushes.recv().await {
                    let Some(inner) = weak.upgrade() else { break };
                    let agent = Self { inner };
                    tracing::debug!("Received registry push");
                    agent.accept(Arc::clone(message.registry()));
                    let _ = agent.validate().await;
                }
            }
            .instrument(spans::surface_span(&name)),
        );
        *self.inner.subscription.lock() = Some(subscription);
        *self.inner.listener.lock() = Some(listener);

        self.pull();
        {
            let mut phase = self.inner.phase.lock();
            if phase.lifecycle == Lifecycle::Initializing {
                phase.lifecycle = Lifecycle::Idle;
            }
        }

        let _ = self.validate().await;
        Ok(())
    }

    /// Adopt `registry` as the one to validate against.
    pub fn accept(&self, registry: Arc<Registry>) {
        self.replace(|state| state.registry = registry);
    }

    /// Re-pull from the relay cache and validate again.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface could not be inspected.
    pub async fn refresh(&self) -> std::result::Result<(), SurfaceError> {
        self.pull();
        self.validate().await
    }

    /// Run one validation pass against the current registry.
    ///
    /// On success the partition and `last_checked` are replaced; on failure
    /// both keep their previous values. A disposed agent ignores the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface could not be inspected.
    pub async fn validate(&self) -> std::result::Result<(), SurfaceError> {
        let registry = {
            let mut phase = self.inner.phase.lock();
            if phase.lifecycle == Lifecycle::Disposed {
                return Ok(());
            }
            phase.lifecycle = Lifecycle::Checking;
            phase.in_flight += 1;

            let registry = Arc::clone(&self.inner.state.borrow().registry);
            self.replace(|state| {
                state.checking = true;
                state.message = CHECKING.to_string();
            });
            registry
        };

        let surface = Arc::clone(&self.inner.surface);
        let observed = tokio::task::spawn_blocking(move || observed_classes(surface.as_ref()))
            .await
            .unwrap_or_else(|e| Err(SurfaceError::unreadable(self.inner.surface.name(), e)));

        let mut phase = self.inner.phase.lock();
        phase.in_flight = phase.in_flight.saturating_sub(1);
        let settled = phase.in_flight == 0;
        if phase.lifecycle == Lifecycle::Disposed {
            return observed.map(|_| ());
        }
        if settled {
            phase.lifecycle = Lifecycle::Idle;
        }

        match observed {
            Ok(observed) => {
                let (valid, invalid) = partition(&registry, &observed);
                tracing::debug!(
                    surface = %self.inner.surface.name(),
                    valid = valid.len(),
                    invalid = invalid.len(),
                    "Validation complete"
                );
                self.replace(|state| {
                    if Arc::ptr_eq(&state.registry, &registry) {
                        state.valid = valid;
                        state.invalid = invalid;
                    }
                    state.last_checked = Some(Utc::now());
                    state.checking = !settled;
                    state.message = COMPLETE.to_string();
                });
                Ok(())
            }
            Err(e) => {
                tracing::warn!(surface = %self.inner.surface.name(), error = %e, "Validation failed");
                self.replace(|state| {
                    state.checking = !settled;
                    state.message = FAILED.to_string();
                });
                Err(e)
            }
        }
    }

    /// Flip the detail view; returns the new visibility.
    pub fn toggle_visibility(&self) -> bool {
        let mut visible = false;
        self.replace(|state| {
            state.visible = !state.visible;
            visible = state.visible;
        });
        visible
    }

    /// Stop listening for pushes. Later passes are ignored.
    pub fn dispose(&self) {
        self.inner.phase.lock().lifecycle = Lifecycle::Disposed;
        if let Some(subscription) = self.inner.subscription.lock().take() {
            subscription.cancel();
        }
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.abort();
        }
        tracing::info!(surface = %self.inner.surface.name(), "Display agent disposed");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.phase.lock().lifecycle
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<DisplayState> {
        Arc::clone(&self.inner.state.borrow())
    }

    /// Receiver notified on every state replacement.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Arc<DisplayState>> {
        self.inner.state.subscribe()
    }

    /// Status view of the current state.
    #[must_use]
    pub fn status(&self) -> StatusReport {
        StatusReport::from_state(&self.state())
    }

    fn pull(&self) {
        let registry = self.inner.relay.request(SurfaceRequest::Query).into_registry();
        self.accept(registry);
    }

    fn replace(&self, change: impl FnOnce(&mut DisplayState)) {
        self.inner.state.send_modify(|current| {
            let mut next = DisplayState::clone(current);
            change(&mut next);
            *current = Arc::new(next);
        });
    }
}
