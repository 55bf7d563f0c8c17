use crate::domain::{ArchiveSink, ArchiveSinkConfig};
use crate::ingest::{IngestReport, JsonlConsumer};
use common::domain::DocumentStore;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ArchiveWorkerConfig {
    pub sink: ArchiveSinkConfig,
    pub ingest_concurrency: usize,
}

pub struct ArchiveWorker {
    consumer: JsonlConsumer,
}

impl ArchiveWorker {
    pub fn new(store: Arc<dyn DocumentStore>, config: ArchiveWorkerConfig) -> Self {
        info!(
            max_merge_attempts = config.sink.max_merge_attempts,
            time_tolerance_secs = config.sink.time_tolerance_secs,
            ingest_concurrency = config.ingest_concurrency,
            "Initializing archive worker"
        );

        let sink = Arc::new(ArchiveSink::new(store, config.sink));
        let consumer = JsonlConsumer::new(sink, config.ingest_concurrency);

        Self { consumer }
    }

    /// Replay a message log through the sink
    pub async fn run<R>(&self, reader: R, ctx: CancellationToken) -> anyhow::Result<IngestReport>
    where
        R: AsyncBufRead + Unpin,
    {
        self.consumer.run(reader, ctx).await
    }
}
