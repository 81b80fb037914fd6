use std::pin::Pin;
use std::task::{Context, Poll, ready};

use brook_api::{ChatStream, ErrorKind, Fragment};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::NdjsonLines;

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextFragment = Result<(Option<Fragment>, NdjsonLines), Error>;

pin_project! {
    /// The streaming half of a chat request.
    pub struct HttpChatStream {
        next_fragment_fut: Option<PinnedFuture<NextFragment>>,
    }
}

impl HttpChatStream {
    #[inline]
    pub fn from_lines(lines: NdjsonLines) -> Self {
        Self {
            next_fragment_fut: Some(Box::pin(next_fragment(lines))),
        }
    }
}

impl ChatStream for HttpChatStream {
    type Error = crate::Error;

    fn poll_next_fragment(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<Fragment>, Self::Error>> {
        let this = self.project();
        let Some(next_fragment_fut) = this.next_fragment_fut else {
            // The stream has been exhausted or failed before.
            return Poll::Ready(Ok(None));
        };
        let (fragment, lines) = match ready!(next_fragment_fut.as_mut().poll(cx))
        {
            Ok((Some(fragment), lines)) => (fragment, lines),
            Ok((None, _)) => {
                *this.next_fragment_fut = None;
                return Poll::Ready(Ok(None));
            }
            Err(err) => {
                *this.next_fragment_fut = None;
                return Poll::Ready(Err(err));
            }
        };

        // The stream may still have more data to pull, create a new future
        // for the next fragment.
        *this.next_fragment_fut = Some(Box::pin(next_fragment(lines)));

        Poll::Ready(Ok(Some(fragment)))
    }
}

async fn next_fragment(mut lines: NdjsonLines) -> NextFragment {
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Ok((None, lines)),
            Err(err) => {
                return Err(Error::new(format!("{err:?}"), ErrorKind::Http));
            }
        };
        trace!("got stream line: {line}");

        match serde_json::from_str::<crate::proto::StreamLine>(&line) {
            Ok(stream_line) => {
                return Ok((Some(stream_line.into_fragment()), lines));
            }
            Err(err) => {
                // A single malformed line never aborts the stream.
                warn!("skipping malformed stream line: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::Chunks;

    fn stream_from(chunks: Vec<Bytes>) -> HttpChatStream {
        let chunks = Chunks::from_vec_deque(VecDeque::from(chunks));
        HttpChatStream::from_lines(NdjsonLines::new(chunks))
    }

    async fn collect_contents(mut stream: Pin<&mut HttpChatStream>) -> String {
        let mut collected = String::new();
        while let Some(fragment) =
            poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
                .await
                .unwrap()
        {
            collected.push_str(fragment.content.as_deref().unwrap_or_default());
        }
        collected
    }

    #[tokio::test]
    async fn test_fragments_from_lines() {
        let stream = stream_from(vec![Bytes::from_static(
            b"{\"message\":{\"content\":\"Hello\"}}\n\
              {\"message\":{\"content\":\", world\"}}\n",
        )]);
        let stream = pin!(stream);
        assert_eq!(collect_contents(stream).await, "Hello, world");
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped() {
        let stream = stream_from(vec![Bytes::from_static(
            b"{\"message\":{\"content\":\"keep\"}}\n\
              this is not json\n\
              {\"message\":{\"content\":\" going\"}}\n",
        )]);
        let stream = pin!(stream);
        assert_eq!(collect_contents(stream).await, "keep going");
    }

    #[tokio::test]
    async fn test_history_id_fragment() {
        let stream = stream_from(vec![Bytes::from_static(
            b"{\"history_id\":\"h-42\"}\n",
        )]);
        let mut stream = pin!(stream);
        let fragment = poll_fn(|cx| stream.as_mut().poll_next_fragment(cx))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fragment.history_id.as_deref(), Some("h-42"));
        assert_eq!(fragment.content, None);
    }
}
