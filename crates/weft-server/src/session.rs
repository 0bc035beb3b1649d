//! Stream sessions: the append-only replay log behind every chat run.
//!
//! A session records each SSE frame of one run. Live and resumed readers both
//! attach at a frame offset and follow the log until it closes, so a reader
//! that reconnects at the number of frames it already received sees every
//! remaining frame exactly once. Every session carries a run id so a reader
//! never continues one run's offset inside another run's log.

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Generation is running; the log may still grow.
    InProgress,
    /// The run ended and the log is complete.
    Completed,
    /// The run was cancelled; the log is frozen.
    Cancelled,
}

#[derive(Debug)]
struct SessionLog {
    frames: Vec<Bytes>,
    status: SessionStatus,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One run's replay log.
#[derive(Debug)]
pub struct StreamSession {
    key: String,
    run_id: String,
    log: Mutex<SessionLog>,
    version: watch::Sender<u64>,
    cancellation_token: CancellationToken,
}

impl StreamSession {
    fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            run_id: uuid::Uuid::now_v7().to_string(),
            log: Mutex::new(SessionLog {
                frames: Vec::new(),
                status: SessionStatus::InProgress,
            }),
            version: watch::Sender::new(0),
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Identity of the run recording into this session.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.log).status
    }

    /// Number of frames recorded so far.
    pub fn len(&self) -> usize {
        lock(&self.log).frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token observed by the run; cancelled when the session is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v += 1);
    }

    /// Append one frame. Returns `false` once the log is closed.
    pub fn append(&self, frame: Bytes) -> bool {
        {
            let mut log = lock(&self.log);
            if log.status != SessionStatus::InProgress {
                return false;
            }
            log.frames.push(frame);
        }
        self.bump();
        true
    }

    /// Mark the log complete. No effect after cancellation.
    pub fn complete(&self) {
        {
            let mut log = lock(&self.log);
            if log.status != SessionStatus::InProgress {
                return;
            }
            log.status = SessionStatus::Completed;
        }
        tracing::debug!(key = %self.key, "stream session completed");
        self.bump();
    }

    /// Freeze the log and signal the run to stop.
    pub fn cancel(&self) {
        {
            let mut log = lock(&self.log);
            if log.status == SessionStatus::InProgress {
                log.status = SessionStatus::Cancelled;
            }
        }
        self.cancellation_token.cancel();
        self.bump();
    }

    fn read_from(&self, offset: usize) -> (Vec<Bytes>, bool) {
        let log = lock(&self.log);
        let frames = log.frames.get(offset..).map(<[Bytes]>::to_vec).unwrap_or_default();
        (frames, log.status != SessionStatus::InProgress)
    }

    /// Follow the log from frame `offset` until it closes.
    pub fn attach(self: &Arc<Self>, offset: usize) -> impl Stream<Item = Bytes> + Send + 'static {
        let session = Arc::clone(self);
        // Subscribe before the first read so no append can slip between them.
        let mut changes = session.version.subscribe();
        stream! {
            let mut next = offset;
            loop {
                let (frames, closed) = session.read_from(next);
                next += frames.len();
                for frame in frames {
                    yield frame;
                }
                if closed {
                    break;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
            tracing::trace!(key = %session.key, offset = next, "reader detached");
        }
    }
}

/// Outcome of [`StreamRegistry::get_or_create`].
#[derive(Debug, Clone)]
pub enum Acquired {
    /// A new session was registered; the caller must start the run.
    Started(Arc<StreamSession>),
    /// A run is already in progress for the key.
    Attached(Arc<StreamSession>),
}

impl Acquired {
    pub fn session(&self) -> &Arc<StreamSession> {
        match self {
            Self::Started(session) | Self::Attached(session) => session,
        }
    }
}

/// Status as reported by the side-channel GET.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamState {
    pub in_progress: bool,
    pub completed: bool,
}

/// How long a completed session stays replayable by default.
pub const DEFAULT_COMPLETED_RETENTION: Duration = Duration::from_secs(300);

/// Keyed set of stream sessions.
///
/// At most one in-progress session exists per key. A completed session stays
/// answerable for the retention window, then is dropped unless the key was
/// reused or cancelled in the meantime.
#[derive(Debug)]
pub struct StreamRegistry {
    sessions: Mutex<HashMap<String, Arc<StreamSession>>>,
    retention: Duration,
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::with_retention(DEFAULT_COMPLETED_RETENTION)
    }
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            retention,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Attach to the in-progress session for `key`, or register a new one.
    pub fn get_or_create(&self, key: &str) -> Acquired {
        let mut sessions = lock(&self.sessions);
        if let Some(existing) = sessions.get(key) {
            if existing.status() == SessionStatus::InProgress {
                return Acquired::Attached(Arc::clone(existing));
            }
        }
        let session = Arc::new(StreamSession::new(key));
        sessions.insert(key.to_string(), Arc::clone(&session));
        Acquired::Started(session)
    }

    pub fn get(&self, key: &str) -> Option<Arc<StreamSession>> {
        lock(&self.sessions).get(key).cloned()
    }

    pub fn state(&self, key: &str) -> StreamState {
        match self.get(key).map(|s| s.status()) {
            Some(SessionStatus::InProgress) => StreamState {
                in_progress: true,
                completed: false,
            },
            Some(SessionStatus::Completed) => StreamState {
                in_progress: false,
                completed: true,
            },
            Some(SessionStatus::Cancelled) | None => StreamState::default(),
        }
    }

    /// Cancel and forget the session for `key`. Returns `false` when unknown.
    pub fn cancel(&self, key: &str) -> bool {
        let removed = lock(&self.sessions).remove(key);
        match removed {
            Some(session) => {
                session.cancel();
                true
            }
            None => false,
        }
    }

    /// Forget `session` if it is still the one registered for `key`.
    pub fn remove_if_same(&self, key: &str, session: &Arc<StreamSession>) -> bool {
        let mut sessions = lock(&self.sessions);
        match sessions.get(key) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Drop `session` once the retention window has passed.
    pub fn expire_after_retention(self: &Arc<Self>, session: Arc<StreamSession>) {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(registry.retention).await;
            if registry.remove_if_same(session.key(), &session) {
                tracing::debug!(key = %session.key(), "completed stream session expired");
            }
        });
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
