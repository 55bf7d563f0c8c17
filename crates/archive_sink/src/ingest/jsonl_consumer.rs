use crate::domain::ArchiveSink;
use crate::ingest::wire::decode_wire_line;
use futures::{StreamExt, stream};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tally of a replay
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl IngestReport {
    fn record(&mut self, outcome: LineOutcome) {
        match outcome {
            LineOutcome::Blank => {}
            LineOutcome::Accepted => self.accepted += 1,
            LineOutcome::Rejected => self.rejected += 1,
            LineOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOutcome {
    Blank,
    Accepted,
    Rejected,
    Failed,
}

/// Feeds newline-delimited JSON messages into the archive sink
///
/// Up to `concurrency` messages are pushed at once. A bad line is counted
/// and skipped. A read error on the input ends the replay once the pushes
/// already in flight have finished.
pub struct JsonlConsumer {
    sink: Arc<ArchiveSink>,
    concurrency: usize,
}

impl JsonlConsumer {
    pub fn new(sink: Arc<ArchiveSink>, concurrency: usize) -> Self {
        Self {
            sink,
            concurrency: concurrency.max(1),
        }
    }

    /// Consume `reader` until EOF, a read error, or cancellation of `ctx`
    pub async fn run<R>(&self, reader: R, ctx: CancellationToken) -> anyhow::Result<IngestReport>
    where
        R: AsyncBufRead + Unpin,
    {
        // The stream ends after the first read error, which is carried as its last item
        let segments = stream::unfold(Some(reader.split(b'\n')), |state| async move {
            let mut segments = state?;
            match segments.next_segment().await {
                Ok(Some(segment)) => Some((Ok(segment), Some(segments))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });

        let (report, read_error) = segments
            .take_until(ctx.cancelled())
            .enumerate()
            .map(|(index, segment)| async move {
                match segment {
                    Ok(bytes) => Ok(self.process_line(index + 1, bytes).await),
                    Err(e) => Err(anyhow::Error::new(e)
                        .context(format!("failed to read line {}", index + 1))),
                }
            })
            .buffer_unordered(self.concurrency)
            .fold(
                (IngestReport::default(), None),
                |(mut report, mut read_error), outcome| async move {
                    match outcome {
                        Ok(outcome) => report.record(outcome),
                        Err(e) => read_error = Some(e),
                    }
                    (report, read_error)
                },
            )
            .await;

        if let Some(e) = read_error {
            error!(
                accepted = report.accepted,
                rejected = report.rejected,
                failed = report.failed,
                error = %e,
                "replay stopped by read error"
            );
            return Err(e);
        }

        if ctx.is_cancelled() {
            warn!(
                accepted = report.accepted,
                rejected = report.rejected,
                failed = report.failed,
                "replay cancelled before end of input"
            );
        } else {
            info!(
                accepted = report.accepted,
                rejected = report.rejected,
                failed = report.failed,
                "replay complete"
            );
        }

        Ok(report)
    }

    async fn process_line(&self, line_number: usize, mut bytes: Vec<u8>) -> LineOutcome {
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }

        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                warn!(line = line_number, error = %e, "rejecting line that is not UTF-8");
                return LineOutcome::Rejected;
            }
        };

        if line.trim().is_empty() {
            return LineOutcome::Blank;
        }

        let message = match decode_wire_line(&line, chrono::Utc::now().timestamp()) {
            Ok(message) => message,
            Err(e) => {
                warn!(line = line_number, error = %e, "rejecting undecodable message");
                return LineOutcome::Rejected;
            }
        };

        match self.sink.push_message(message).await {
            Ok(outcome) => {
                debug!(line = line_number, ?outcome, "message archived");
                LineOutcome::Accepted
            }
            Err(e) if e.is_rejection() => {
                warn!(line = line_number, error = %e, "rejecting invalid message");
                LineOutcome::Rejected
            }
            Err(e) => {
                error!(line = line_number, error = %e, "failed to archive message");
                LineOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ArchiveSinkConfig;
    use common::domain::{DomainError, MockDocumentStore, Revision};

    fn consumer(store: MockDocumentStore, concurrency: usize) -> JsonlConsumer {
        let sink = Arc::new(ArchiveSink::new(
            Arc::new(store),
            ArchiveSinkConfig::default(),
        ));
        JsonlConsumer::new(sink, concurrency)
    }

    #[tokio::test]
    async fn test_run_counts_each_outcome() {
        let mut mock_store = MockDocumentStore::new();
        mock_store
            .expect_put_document()
            .returning(|input| match input.document.as_listener() {
                Some(doc) if doc.callsign == "broken" => Err(DomainError::RepositoryError(
                    anyhow::anyhow!("store unavailable"),
                )),
                _ => Ok(Revision("1-a".to_string())),
            });

        let input = concat!(
            r#"{"callsign":"habitat","type":"LISTENER_TELEM","data":{"latitude":1.0},"time_created":1,"time_uploaded":2}"#,
            "\n",
            "\n",
            "garbage\n",
            r#"{"callsign":"","type":"LISTENER_TELEM","data":{},"time_created":1,"time_uploaded":2}"#,
            "\n",
            r#"{"callsign":"broken","type":"LISTENER_TELEM","data":{},"time_created":1,"time_uploaded":2}"#,
            "\n",
        );

        let report = consumer(mock_store, 4)
            .run(input.as_bytes(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                accepted: 1,
                rejected: 2,
                failed: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_run_rejects_non_utf8_line_and_continues() {
        let mut mock_store = MockDocumentStore::new();
        mock_store
            .expect_put_document()
            .times(2)
            .returning(|_| Ok(Revision("1-a".to_string())));

        let telem = br#"{"callsign":"habitat","type":"LISTENER_TELEM","data":{},"time_created":1,"time_uploaded":2}"#;
        let mut input = Vec::new();
        input.extend_from_slice(telem);
        input.extend_from_slice(b"\r\n\xff\xfe garbage\n");
        input.extend_from_slice(telem);
        input.push(b'\n');

        let report = consumer(mock_store, 2)
            .run(&input[..], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            report,
            IngestReport {
                accepted: 2,
                rejected: 1,
                failed: 0,
            }
        );
    }

    /// Yields its bytes, then fails every read
    struct FailingReader {
        data: &'static [u8],
    }

    impl tokio::io::AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.data.is_empty() {
                return std::task::Poll::Ready(Err(std::io::Error::other("disk gone")));
            }
            let n = self.data.len().min(buf.remaining());
            buf.put_slice(&self.data[..n]);
            self.data = &self.data[n..];
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_read_error_is_fatal_after_in_flight_pushes_finish() {
        let mut mock_store = MockDocumentStore::new();
        mock_store
            .expect_put_document()
            .times(1)
            .returning(|_| Ok(Revision("1-a".to_string())));

        let reader = tokio::io::BufReader::new(FailingReader {
            data: b"{\"callsign\":\"habitat\",\"type\":\"LISTENER_TELEM\",\"data\":{},\"time_created\":1,\"time_uploaded\":2}\n",
        });

        let err = consumer(mock_store, 4)
            .run(reader, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("line 2"));
    }

    #[tokio::test]
    async fn test_run_on_empty_input() {
        let report = consumer(MockDocumentStore::new(), 1)
            .run(&b""[..], CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report, IngestReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let mut mock_store = MockDocumentStore::new();
        mock_store.expect_put_document().never();

        let ctx = CancellationToken::new();
        ctx.cancel();

        let input = r#"{"callsign":"habitat","type":"LISTENER_TELEM","data":{},"time_created":1}"#;
        let report = consumer(mock_store, 1)
            .run(input.as_bytes(), ctx)
            .await
            .unwrap();

        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        assert_eq!(consumer(MockDocumentStore::new(), 0).concurrency, 1);
    }
}
