use async_stream::stream;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use url::Url;
use weft_contract::Message;
use weft_protocol_ui_stream::{SseDecoder, SseFrame, UIStreamEvent, RUN_ID_HEADER};

use crate::error::TransportError;
use crate::fingerprint::Fingerprint;
use crate::registry::{Claim, InflightEntry, InflightRegistry};

/// Server-side state of a chat stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    in_progress: bool,
    completed: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [Message],
}

/// Client for resumable chat streams.
///
/// Every chat id maps to one fingerprint (`POST {base}/api/chat/{id}`). While
/// a response for a fingerprint is being consumed, further `start` calls
/// attach to it instead of issuing a second request, and `resume` continues
/// after the last frame handed to the caller.
#[derive(Debug, Clone)]
pub struct ResumableClient {
    http: reqwest::Client,
    base_url: Url,
    inflight: Arc<InflightRegistry>,
}

impl ResumableClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_http(reqwest::Client::new(), base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            inflight: Arc::new(InflightRegistry::new()),
        }
    }

    /// Share in-flight tracking with other clients.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<InflightRegistry>) -> Self {
        self.inflight = registry;
        self
    }

    pub fn registry(&self) -> &Arc<InflightRegistry> {
        &self.inflight
    }

    fn chat_url(&self, chat_id: &str) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["api", "chat", chat_id]);
        Ok(url)
    }

    fn stream_url(chat_url: &Url, offset: usize, run: Option<&str>) -> Result<Url, TransportError> {
        let mut url = chat_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(chat_url.to_string()))?
            .push("stream");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("offset", &offset.to_string());
            if let Some(run) = run {
                query.append_pair("run", run);
            }
        }
        Ok(url)
    }

    /// Fingerprint of the chat request for `chat_id`.
    pub fn fingerprint(&self, chat_id: &str) -> Result<Fingerprint, TransportError> {
        Ok(Fingerprint::new(Method::POST, &self.chat_url(chat_id)?))
    }

    /// Ask the server whether the chat is streaming or finished.
    pub async fn status(&self, chat_id: &str) -> Result<StreamStatus, TransportError> {
        let response = self.http.get(self.chat_url(chat_id)?).send().await?;
        let body: StatusBody = ensure_success(response).await?.json().await?;
        Ok(if body.in_progress {
            StreamStatus::InProgress
        } else if body.completed {
            StreamStatus::Completed
        } else {
            StreamStatus::NotStarted
        })
    }

    /// Send `messages` and stream the response.
    ///
    /// If a request for the same chat is already in flight, the returned
    /// stream attaches to that run from its first frame.
    pub async fn start(
        &self,
        chat_id: &str,
        messages: &[Message],
    ) -> Result<ResumableStream, TransportError> {
        let url = self.chat_url(chat_id)?;
        let fingerprint = Fingerprint::new(Method::POST, &url);

        let entry = loop {
            match self.inflight.get_or_create(&fingerprint) {
                Claim::Owner(entry) => break entry,
                Claim::Follower(entry) => {
                    if !entry.wait_open().await {
                        return Err(TransportError::NotFound(fingerprint.to_string()));
                    }
                    if self.status(chat_id).await? == StreamStatus::InProgress {
                        tracing::debug!(%fingerprint, "request in flight; attaching from start");
                        let response = self.open_stream(&fingerprint, &url, 0, None).await?;
                        return Ok(ResumableStream::new(response, None));
                    }
                    // Left behind by a reader dropped before the run finished.
                    self.inflight.release(&fingerprint, &entry);
                }
            }
        };

        let sent = match self
            .http
            .post(url)
            .json(&ChatRequest { messages })
            .send()
            .await
        {
            Ok(response) => ensure_success(response).await,
            Err(e) => Err(e.into()),
        };
        match sent {
            Ok(response) => {
                if let Some(run_id) = run_id_of(&response) {
                    entry.set_run_id(run_id);
                }
                entry.mark_open();
                tracing::debug!(%fingerprint, "chat request opened");
                let tracking = Tracking::new(self.inflight.clone(), fingerprint, entry);
                Ok(ResumableStream::new(response, Some(tracking)))
            }
            Err(e) => {
                entry.mark_failed();
                self.inflight.release(&fingerprint, &entry);
                Err(e)
            }
        }
    }

    /// Continue the chat's stream after the last frame delivered locally.
    ///
    /// Without local progress the stream is read from its first frame, so a
    /// completed chat replays its full output. Returns
    /// [`TransportError::NotFound`] when the server has no stream for the chat,
    /// or when the run the local progress belongs to has been replaced; the
    /// stale progress is dropped so the next call reads the current run.
    pub async fn resume(&self, chat_id: &str) -> Result<ResumableStream, TransportError> {
        let url = self.chat_url(chat_id)?;
        let fingerprint = Fingerprint::new(Method::POST, &url);

        let entry = match self.inflight.get_or_create(&fingerprint) {
            Claim::Owner(entry) => {
                entry.mark_open();
                entry
            }
            Claim::Follower(entry) => {
                if !entry.wait_open().await {
                    return Err(TransportError::NotFound(fingerprint.to_string()));
                }
                entry
            }
        };

        let offset = entry.delivered();
        let run = entry.run_id();
        tracing::debug!(%fingerprint, offset, run = ?run, "resuming stream");
        match self
            .open_stream(&fingerprint, &url, offset, run.as_deref())
            .await
        {
            Ok(response) => {
                if let Some(run_id) = run_id_of(&response) {
                    entry.set_run_id(run_id);
                }
                let tracking = Tracking::new(self.inflight.clone(), fingerprint, entry);
                Ok(ResumableStream::new(response, Some(tracking)))
            }
            Err(e) => {
                if e.is_not_found() {
                    self.inflight.release(&fingerprint, &entry);
                }
                Err(e)
            }
        }
    }

    /// Abort the chat's run on the server and drop local tracking.
    pub async fn cancel(&self, chat_id: &str) -> Result<(), TransportError> {
        let url = self.chat_url(chat_id)?;
        let fingerprint = Fingerprint::new(Method::POST, &url);
        let response = self.http.delete(url).send().await?;
        self.inflight.remove(&fingerprint);

        if response.status() == StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(fingerprint.to_string()));
        }
        ensure_success(response).await?;
        tracing::debug!(%fingerprint, "stream cancelled");
        Ok(())
    }

    async fn open_stream(
        &self,
        fingerprint: &Fingerprint,
        chat_url: &Url,
        offset: usize,
        run: Option<&str>,
    ) -> Result<reqwest::Response, TransportError> {
        let response = self
            .http
            .get(Self::stream_url(chat_url, offset, run)?)
            .send()
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Err(TransportError::NotFound(fingerprint.to_string()));
        }
        ensure_success(response).await
    }
}

fn run_id_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(RUN_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Progress tracking held by the stream that currently owns an entry.
struct Tracking {
    registry: Arc<InflightRegistry>,
    fingerprint: Fingerprint,
    entry: Arc<InflightEntry>,
    reader: u64,
}

impl Tracking {
    fn new(registry: Arc<InflightRegistry>, fingerprint: Fingerprint, entry: Arc<InflightEntry>) -> Self {
        let reader = entry.take_over();
        Self {
            registry,
            fingerprint,
            entry,
            reader,
        }
    }

    fn advance(&self) {
        self.entry.advance(self.reader);
    }

    fn release(self) {
        self.registry.release(&self.fingerprint, &self.entry);
    }
}

/// Decoded UI stream events of one response.
///
/// Ends after the `[DONE]` trailer. A connection that closes before it
/// yields [`TransportError::Closed`] as its last item.
pub struct ResumableStream {
    inner: Pin<Box<dyn Stream<Item = Result<UIStreamEvent, TransportError>> + Send>>,
}

impl ResumableStream {
    fn new(response: reqwest::Response, tracking: Option<Tracking>) -> Self {
        let inner = stream! {
            let mut body = Box::pin(response.bytes_stream());
            let mut decoder = SseDecoder::new();
            let mut done = false;
            'read: while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(TransportError::Http(e));
                        return;
                    }
                };
                for frame in decoder.push(&chunk) {
                    match frame {
                        Ok(SseFrame::Event(event)) => {
                            if let Some(tracking) = &tracking {
                                tracking.advance();
                            }
                            yield Ok(event);
                        }
                        Ok(SseFrame::Done) => {
                            done = true;
                            break 'read;
                        }
                        Err(e) => {
                            yield Err(TransportError::Decode(e));
                            return;
                        }
                    }
                }
            }
            if done {
                if let Some(tracking) = tracking {
                    tracking.release();
                }
            } else {
                yield Err(TransportError::Closed);
            }
        };
        Self {
            inner: Box::pin(inner),
        }
    }

    /// Drain the stream, failing on the first error.
    pub async fn collect_events(self) -> Result<Vec<UIStreamEvent>, TransportError> {
        self.try_collect().await
    }
}

impl Stream for ResumableStream {
    type Item = Result<UIStreamEvent, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ResumableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumableStream").finish_non_exhaustive()
    }
}
