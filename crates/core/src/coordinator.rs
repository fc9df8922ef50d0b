//! Frame request coordination.
//!
//! Every submission gets a fresh [`Generation`]. A request's outcome is
//! applied only if its generation is still the current one when it settles;
//! anything older is dropped on arrival. The remote call is not aborted, its
//! effect is just suppressed.
//!
//! The coordinator is the single owner of the displayed [`FramedImage`].
//! Replacing or clearing it drops the previous handle, which releases its
//! lease with the [`HandleTracker`] exactly once.

use crate::catalog::Catalog;
use crate::error::FrameApplyError;
use crate::image_processing::decode_dimensions;
use crate::selection::{Selection, SelectionState};
use crate::service::{ApplyFrameRequest, FrameService};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Monotonically increasing submission token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single frame request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Succeeded,
    Failed(FrameApplyError),
    /// A newer submission (or a reset) started before this one settled.
    Superseded,
}

/// One submitted "apply frame" operation.
#[derive(Clone, Debug)]
pub struct FrameRequest {
    pub generation: Generation,
    pub status: RequestStatus,
    pub payload: ApplyFrameRequest,
}

/// What the presentation layer should show.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FrameStatus {
    #[default]
    Idle,
    Pending { generation: Generation },
    Succeeded { generation: Generation },
    Failed { generation: Generation, error: FrameApplyError },
}

impl FrameStatus {
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn generation(&self) -> Option<Generation> {
        match self {
            Self::Idle => None,
            Self::Pending { generation }
            | Self::Succeeded { generation }
            | Self::Failed { generation, .. } => Some(*generation),
        }
    }

    pub fn error(&self) -> Option<&FrameApplyError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Counts outstanding result handles.
#[derive(Clone, Debug, Default)]
pub struct HandleTracker {
    live: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl HandleTracker {
    fn acquire(&self, generation: Generation, bytes: Vec<u8>, dimensions: (u32, u32)) -> FramedImage {
        self.live.fetch_add(1, Ordering::SeqCst);
        FramedImage {
            generation,
            bytes,
            dimensions,
            tracker: self.clone(),
        }
    }

    /// Handles acquired and not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Handles released so far.
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

/// A framed screenshot returned by the service.
///
/// Dropping it releases its lease.
pub struct FramedImage {
    generation: Generation,
    bytes: Vec<u8>,
    dimensions: (u32, u32),
    tracker: HandleTracker,
}

impl FramedImage {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Encoded PNG bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }
}

impl fmt::Debug for FramedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramedImage")
            .field("generation", &self.generation)
            .field("len", &self.bytes.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl Drop for FramedImage {
    fn drop(&mut self) {
        self.tracker.live.fetch_sub(1, Ordering::SeqCst);
        self.tracker.released.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(generation = %self.generation, "released framed image");
    }
}

#[derive(Default)]
struct CoordinatorState {
    generation: Generation,
    /// The current request plus any superseded ones still in flight.
    requests: Vec<FrameRequest>,
    result: Option<FramedImage>,
}

impl CoordinatorState {
    /// Drops settled requests and marks the pending ones superseded.
    fn supersede_all(&mut self) {
        self.requests.retain(|r| {
            matches!(r.status, RequestStatus::Pending | RequestStatus::Superseded)
        });
        for request in &mut self.requests {
            if request.status == RequestStatus::Pending {
                request.status = RequestStatus::Superseded;
                tracing::debug!(generation = %request.generation, "frame request superseded");
            }
        }
    }

    fn request_mut(&mut self, generation: Generation) -> Option<&mut FrameRequest> {
        self.requests.iter_mut().find(|r| r.generation == generation)
    }
}

struct Shared {
    state: Mutex<CoordinatorState>,
    status: watch::Sender<FrameStatus>,
    tracker: HandleTracker,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, generation: Generation, outcome: Result<Vec<u8>, FrameApplyError>) {
        // Acquire before the generation check so a stale result still goes
        // through exactly one acquire/release pair.
        let outcome = outcome.and_then(|bytes| {
            let dimensions = decode_dimensions(&bytes)?;
            Ok(self.tracker.acquire(generation, bytes, dimensions))
        });

        let mut state = self.lock();
        if state.generation != generation {
            state.requests.retain(|r| r.generation != generation);
            tracing::debug!(
                %generation,
                current = %state.generation,
                "discarding result of superseded frame request"
            );
            return;
        }

        match outcome {
            Ok(image) => {
                tracing::info!(%generation, len = image.bytes().len(), "frame applied");
                state.result = Some(image);
                if let Some(request) = state.request_mut(generation) {
                    request.status = RequestStatus::Succeeded;
                }
                self.status.send_replace(FrameStatus::Succeeded { generation });
            }
            Err(error) => {
                tracing::warn!(%generation, %error, "frame request failed");
                if let Some(request) = state.request_mut(generation) {
                    request.status = RequestStatus::Failed(error.clone());
                }
                self.status.send_replace(FrameStatus::Failed { generation, error });
            }
        }
    }
}

/// Drives "apply frame" calls so that only the latest submission is ever visible.
pub struct FrameRequestCoordinator {
    service: Arc<dyn FrameService>,
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FrameRequestCoordinator {
    pub fn new(service: Arc<dyn FrameService>) -> Self {
        Self::with_tracker(service, HandleTracker::default())
    }

    /// Like [`new`](Self::new) but reporting handle leases to `tracker`.
    pub fn with_tracker(service: Arc<dyn FrameService>, tracker: HandleTracker) -> Self {
        let (status, _) = watch::channel(FrameStatus::Idle);
        Self {
            service,
            shared: Arc::new(Shared {
                state: Mutex::new(CoordinatorState::default()),
                status,
                tracker,
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Starts an "apply frame" request for the current selection.
    ///
    /// Returns the request's generation, or `None` without doing anything
    /// when the selection does not resolve in `catalog` or no source image
    /// is present. The outcome is published through [`subscribe`](Self::subscribe).
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, catalog: &Catalog, state: &SelectionState) -> Option<Generation> {
        let Some(image) = state.source_image.clone() else {
            tracing::debug!("frame request skipped: no source image");
            return None;
        };
        let Selection { category, device, variation } = &state.selection;
        if !state.selection.is_complete() || state.selection.resolve(catalog).is_none() {
            tracing::debug!(%category, %device, %variation, "frame request skipped: selection does not resolve");
            return None;
        }

        let payload = ApplyFrameRequest {
            category: Some(category.clone()),
            device_type: device.clone(),
            device_variation: variation.clone(),
            background_color: state.background_color.clone(),
            image,
        };

        let generation = {
            let mut inner = self.shared.lock();
            inner.supersede_all();
            inner.generation = inner.generation.next();
            let generation = inner.generation;
            // the previous result belongs to an older screenshot/selection
            inner.result = None;
            inner.requests.push(FrameRequest {
                generation,
                status: RequestStatus::Pending,
                payload: payload.clone(),
            });
            self.shared.status.send_replace(FrameStatus::Pending { generation });
            generation
        };

        tracing::info!(
            %generation,
            device = %payload.device_type,
            variation = %payload.device_variation,
            "submitting frame request"
        );

        let service = Arc::clone(&self.service);
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(async move {
            let outcome = service.apply_frame(payload).await;
            shared.complete(generation, outcome);
        });

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);

        Some(generation)
    }

    /// Invalidates any in-flight request and drops the current result.
    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        inner.supersede_all();
        inner.generation = inner.generation.next();
        inner.result = None;
        self.shared.status.send_replace(FrameStatus::Idle);
        tracing::debug!(generation = %inner.generation, "frame requests reset");
    }

    /// Waits until every request submitted so far has settled.
    pub async fn settle(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = {
                let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
                tasks.drain(..).collect()
            };
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    tracing::error!(error = %e, "frame request task failed");
                }
            }
        }
    }

    pub fn status(&self) -> FrameStatus {
        self.shared.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<FrameStatus> {
        self.shared.status.subscribe()
    }

    /// Generation of the most recent submission or reset.
    pub fn current_generation(&self) -> Generation {
        self.shared.lock().generation
    }

    /// Snapshot of the most recent request, if one is active.
    pub fn active_request(&self) -> Option<FrameRequest> {
        let inner = self.shared.lock();
        let current = inner.generation;
        inner.requests.iter().find(|r| r.generation == current).cloned()
    }

    /// Snapshot of the request submitted as `generation`.
    ///
    /// Superseded requests stay listed until their remote call settles;
    /// settled requests other than the current one are forgotten.
    pub fn request(&self, generation: Generation) -> Option<FrameRequest> {
        self.shared
            .lock()
            .requests
            .iter()
            .find(|r| r.generation == generation)
            .cloned()
    }

    /// Runs `f` against the visible result, if any.
    pub fn with_result<R>(&self, f: impl FnOnce(&FramedImage) -> R) -> Option<R> {
        self.shared.lock().result.as_ref().map(f)
    }

    pub fn has_result(&self) -> bool {
        self.shared.lock().result.is_some()
    }

    pub fn tracker(&self) -> &HandleTracker {
        &self.shared.tracker
    }
}
