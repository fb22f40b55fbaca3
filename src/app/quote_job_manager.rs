use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::debug;

use crate::domain::{FetchError, Quote, QuoteRequest};

use super::QuoteService;

const MAX_BUFFERED_UPDATES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteJobState {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteJobUpdate {
    pub job_id: u64,
    pub state: QuoteJobState,
    pub quote: Option<Quote>,
    pub error: Option<FetchError>,
}

impl QuoteJobUpdate {
    fn running(job_id: u64) -> Self {
        Self {
            job_id,
            state: QuoteJobState::Running,
            quote: None,
            error: None,
        }
    }

    fn finished(job_id: u64, result: Result<Quote, FetchError>) -> Self {
        match result {
            Ok(quote) => Self {
                job_id,
                state: QuoteJobState::Succeeded,
                quote: Some(quote),
                error: None,
            },
            Err(FetchError::Cancelled) => Self::cancelled(job_id),
            Err(error) => Self {
                job_id,
                state: QuoteJobState::Failed,
                quote: None,
                error: Some(error),
            },
        }
    }

    fn cancelled(job_id: u64) -> Self {
        Self {
            job_id,
            state: QuoteJobState::Cancelled,
            quote: None,
            error: None,
        }
    }
}

/// Runs quote fetches on a background thread, one at a time.
///
/// A second submit while a fetch is in flight is rejected with
/// [`FetchError::Busy`]. A cancelled fetch still counts as in flight until its
/// thread returns, so provider calls never overlap. Dropping the manager
/// cancels the active fetch and waits for its thread.
///
/// Updates are buffered for [`QuoteJobManager::drain_updates`]; only the most
/// recent 64 are kept.
pub struct QuoteJobManager {
    service: QuoteService,
    next_job_id: AtomicU64,
    shared: Arc<Mutex<SharedState>>,
    task_handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl QuoteJobManager {
    pub fn new(service: QuoteService) -> Self {
        Self {
            service,
            next_job_id: AtomicU64::new(1),
            shared: Arc::new(Mutex::new(SharedState::default())),
            task_handles: Mutex::new(Vec::new()),
        }
    }

    pub fn submit_fetch(&self, request: QuoteRequest) -> Result<u64, FetchError> {
        let job_id = self.next_job_id.fetch_add(1, Ordering::SeqCst);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        {
            let mut shared = self.shared.lock().expect("quote job state lock poisoned");
            if shared.in_flight.is_some() {
                return Err(FetchError::Busy);
            }
            shared.in_flight = Some(job_id);
            shared.active = Some(ActiveJob {
                job_id,
                cancel_flag: Arc::clone(&cancel_flag),
            });
            shared.push(QuoteJobUpdate::running(job_id));
        }

        let service = self.service.clone();
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("quote-fetch-job-{job_id}"))
            .spawn(move || {
                let result =
                    service.fetch_with_cancel(request, || cancel_flag.load(Ordering::SeqCst));
                complete_job(&shared, job_id, result);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(error) => {
                let error =
                    FetchError::internal(format!("failed to start quote fetch thread: {error}"));
                complete_job(&self.shared, job_id, Err(error.clone()));
                return Err(error);
            }
        };

        let mut task_handles = self
            .task_handles
            .lock()
            .expect("quote job handle lock poisoned");
        reap_finished(&mut task_handles);
        task_handles.push(handle);
        Ok(job_id)
    }

    /// Flags the active fetch as cancelled. Its eventual result is discarded.
    pub fn cancel_active(&self) {
        let mut shared = self.shared.lock().expect("quote job state lock poisoned");
        if let Some(active) = shared.active.take() {
            active.cancel_flag.store(true, Ordering::SeqCst);
            shared.push(QuoteJobUpdate::cancelled(active.job_id));
        }
    }

    /// True while a fetch thread is running, including one that was cancelled
    /// but has not returned yet.
    pub fn is_loading(&self) -> bool {
        self.shared
            .lock()
            .expect("quote job state lock poisoned")
            .in_flight
            .is_some()
    }

    pub fn state(&self) -> QuoteJobState {
        self.shared
            .lock()
            .expect("quote job state lock poisoned")
            .state
    }

    pub fn latest_update(&self) -> Option<QuoteJobUpdate> {
        self.shared
            .lock()
            .expect("quote job state lock poisoned")
            .latest
            .clone()
    }

    pub fn drain_updates(&self) -> Vec<QuoteJobUpdate> {
        let mut shared = self.shared.lock().expect("quote job state lock poisoned");
        shared.updates.drain(..).collect()
    }
}

impl Drop for QuoteJobManager {
    fn drop(&mut self) {
        self.cancel_active();

        let handles = match self.task_handles.get_mut() {
            Ok(handles) => std::mem::take(handles),
            Err(poisoned) => std::mem::take(poisoned.into_inner()),
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}

#[derive(Default)]
struct SharedState {
    state: QuoteJobState,
    in_flight: Option<u64>,
    active: Option<ActiveJob>,
    latest: Option<QuoteJobUpdate>,
    updates: VecDeque<QuoteJobUpdate>,
}

impl SharedState {
    fn push(&mut self, update: QuoteJobUpdate) {
        self.state = update.state;
        self.latest = Some(update.clone());
        self.updates.push_back(update);
        while self.updates.len() > MAX_BUFFERED_UPDATES {
            self.updates.pop_front();
        }
    }
}

struct ActiveJob {
    job_id: u64,
    cancel_flag: Arc<AtomicBool>,
}

fn complete_job(shared: &Mutex<SharedState>, job_id: u64, result: Result<Quote, FetchError>) {
    let mut shared = shared
        .lock()
        .expect("quote job state lock poisoned during completion");
    if shared.in_flight == Some(job_id) {
        shared.in_flight = None;
    }

    let is_active = shared
        .active
        .as_ref()
        .is_some_and(|active| active.job_id == job_id);
    if !is_active {
        debug!("discarding result of cancelled quote job {job_id}");
        return;
    }

    shared.active = None;
    shared.push(QuoteJobUpdate::finished(job_id, result));
}

fn reap_finished(task_handles: &mut Vec<thread::JoinHandle<()>>) {
    let (finished, running): (Vec<_>, Vec<_>) = task_handles
        .drain(..)
        .partition(|handle| handle.is_finished());
    for handle in finished {
        let _ = handle.join();
    }
    *task_handles = running;
}
