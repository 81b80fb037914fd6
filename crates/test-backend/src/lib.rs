//! A scripted in-memory backend for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use brook_api::{
    BackendError, ChatBackend, ChatRequest, ChatStream, ErrorKind, Fragment,
    HistorySummary, HistoryStore, StoredMessage,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct ScriptedStream {
    fragments: VecDeque<Fragment>,
    fail_after: Option<usize>,
    delivered: usize,
    sleep: Option<Pin<Box<Sleep>>>,
    delay: Duration,
}

impl ChatStream for ScriptedStream {
    type Error = crate::Error;

    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Fragment>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;

            if this.fail_after == Some(this.delivered) {
                return Poll::Ready(Err(Error {
                    message: "scripted mid-stream failure",
                    kind: ErrorKind::Http,
                }));
            }
            let Some(fragment) = this.fragments.pop_front() else {
                return Poll::Ready(Ok(None));
            };
            this.delivered += 1;
            return Poll::Ready(Ok(Some(fragment)));
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_fragment(cx)
    }
}

struct StoredHistory {
    summary: HistorySummary,
    messages: Vec<StoredMessage>,
}

struct Shared {
    scripts: Mutex<VecDeque<PresetStream>>,
    histories: Mutex<Vec<StoredHistory>>,
}

/// A scripted backend for testing purpose.
///
/// Chat requests consume preset streams in the order they were added; a
/// request with no remaining preset is refused. The history directory is
/// a plain in-memory list, so delete really removes entries.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone)]
pub struct ScriptedBackend {
    shared: Arc<Shared>,
    models: Vec<String>,
    delay: Duration,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                scripts: Mutex::new(VecDeque::new()),
                histories: Mutex::new(Vec::new()),
            }),
            models: vec![],
            delay: Duration::from_millis(1),
        }
    }
}

impl ScriptedBackend {
    /// Appends a preset stream to serve the next chat request.
    pub fn add_stream(&self, preset: PresetStream) {
        self.shared.scripts.lock().unwrap().push_back(preset);
    }

    /// Adds a stored conversation to the in-memory directory.
    pub fn add_history(
        &self,
        summary: HistorySummary,
        messages: impl Into<Vec<StoredMessage>>,
    ) {
        self.shared.histories.lock().unwrap().push(StoredHistory {
            summary,
            messages: messages.into(),
        });
    }

    /// Sets the model identifiers reported by the directory.
    pub fn set_models(&mut self, models: impl Into<Vec<String>>) {
        self.models = models.into();
    }

    /// Sets the delay between delivered fragments.
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }
}

impl ChatBackend for ScriptedBackend {
    type Error = crate::Error;
    type Stream = ScriptedStream;

    fn send_chat(
        &self,
        _req: &ChatRequest,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let preset = self.shared.scripts.lock().unwrap().pop_front();
        let res = match preset {
            None => Err(Error {
                message: "no preset stream left",
                kind: ErrorKind::Other,
            }),
            Some(preset) if preset.refuse => Err(Error {
                message: "scripted request refusal",
                kind: ErrorKind::Http,
            }),
            Some(preset) => Ok(ScriptedStream {
                fragments: preset.fragments.into(),
                fail_after: preset.fail_after,
                delivered: 0,
                sleep: None,
                delay: self.delay,
            }),
        };
        ready(res)
    }
}

impl HistoryStore for ScriptedBackend {
    type Error = crate::Error;

    fn list(
        &self,
    ) -> impl Future<Output = Result<Vec<HistorySummary>, Self::Error>> + Send + 'static
    {
        let summaries = self
            .shared
            .histories
            .lock()
            .unwrap()
            .iter()
            .map(|h| h.summary.clone())
            .collect();
        ready(Ok(summaries))
    }

    fn detail(
        &self,
        history_id: &str,
    ) -> impl Future<Output = Result<Vec<StoredMessage>, Self::Error>> + Send + 'static
    {
        let histories = self.shared.histories.lock().unwrap();
        let res = histories
            .iter()
            .find(|h| h.summary.history_id == history_id)
            .map(|h| h.messages.clone())
            .ok_or(Error {
                message: "no such history",
                kind: ErrorKind::Http,
            });
        ready(res)
    }

    fn delete(
        &self,
        history_id: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let mut histories = self.shared.histories.lock().unwrap();
        let before = histories.len();
        histories.retain(|h| h.summary.history_id != history_id);
        let res = if histories.len() == before {
            Err(Error {
                message: "no such history",
                kind: ErrorKind::Http,
            })
        } else {
            Ok(())
        };
        ready(res)
    }

    fn models(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'static
    {
        ready(Ok(self.models.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn test_scripted_stream() {
        let backend = ScriptedBackend::default();
        backend.add_stream(PresetStream::with_fragments([
            Fragment::content("Hello, "),
            Fragment::content("world!"),
        ]));

        let req = ChatRequest::new(vec![], "m", "");
        let stream = backend.send_chat(&req).await.unwrap();
        let mut stream = pin!(stream);
        let mut collected = String::new();
        while let Some(fragment) =
            poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
                .await
                .unwrap()
        {
            collected.push_str(fragment.content.as_deref().unwrap());
        }
        assert_eq!(collected, "Hello, world!");

        // A second request has no script to serve.
        assert!(backend.send_chat(&req).await.is_err());
    }

    #[tokio::test]
    async fn test_mid_stream_failure() {
        let backend = ScriptedBackend::default();
        backend.add_stream(
            PresetStream::with_fragments([
                Fragment::content("one"),
                Fragment::content("two"),
            ])
            .failing_after(1),
        );

        let req = ChatRequest::new(vec![], "m", "");
        let stream = backend.send_chat(&req).await.unwrap();
        let mut stream = pin!(stream);
        let first = poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.content.as_deref(), Some("one"));
        let err = poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Http);
    }

    #[tokio::test]
    async fn test_directory_roundtrip() {
        let backend = ScriptedBackend::default();
        backend.add_history(
            HistorySummary {
                history_id: "h-1".to_owned(),
                title: "Greetings".to_owned(),
                created_at: Utc::now(),
                model: "deepseek-r1:7b".to_owned(),
            },
            [StoredMessage {
                role: "user".to_owned(),
                content: "hi".to_owned(),
            }],
        );

        assert_eq!(backend.list().await.unwrap().len(), 1);
        assert_eq!(backend.detail("h-1").await.unwrap().len(), 1);
        backend.delete("h-1").await.unwrap();
        assert!(backend.list().await.unwrap().is_empty());
        assert!(backend.delete("h-1").await.is_err());
    }
}
