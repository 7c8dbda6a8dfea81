mod queue;

pub use queue::{FrameQueue, OverflowPolicy, PushOutcome};

use crate::{
    config::StreamConfig,
    pipeline::{FrameError, FrameInput, FramePipeline, PipelineConfig},
    telemetry::{Metrics, ROUTE_STREAM},
};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::{fmt::Display, sync::Arc, time::Instant};
use tracing::instrument;

/// Transport-neutral inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `data:image/<fmt>;base64,<payload>` or bare base64.
    Text(String),
    /// Raw container bytes.
    Binary(Bytes),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    Transport(String),
    Pipeline(String),
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::PeerClosed => "peer_closed",
            CloseReason::Transport(_) => "transport",
            CloseReason::Pipeline(_) => "pipeline",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed(CloseReason),
}

/// One streaming connection.
///
/// A reader task moves inbound messages into a bounded [`FrameQueue`]; the
/// session takes them out one at a time, so a frame never starts while the
/// previous one is in flight. Undecodable frames are skipped without a
/// reply. Any failure after decoding closes the session.
pub struct StreamSession {
    pipeline: FramePipeline,
    config: PipelineConfig,
    inbound_buffer: usize,
    overflow_policy: OverflowPolicy,
    metrics: Arc<Metrics>,
    state: SessionState,
}

impl StreamSession {
    pub fn new(pipeline: FramePipeline, stream_config: &StreamConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            pipeline,
            config: PipelineConfig::low_latency(),
            inbound_buffer: stream_config.inbound_buffer,
            overflow_policy: stream_config.overflow_policy,
            metrics,
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[instrument(skip_all)]
    pub async fn run<S, E, K>(&mut self, inbound: S, mut outbound: K) -> CloseReason
    where
        S: Stream<Item = Result<InboundFrame, E>> + Send + Unpin + 'static,
        E: Display + Send + 'static,
        K: Sink<String> + Unpin,
        K::Error: Display,
    {
        self.metrics.session_opened();
        tracing::info!("Streaming session opened");

        let queue = Arc::new(FrameQueue::new(self.inbound_buffer, self.overflow_policy));
        let mut reader = tokio::spawn(read_inbound(inbound, queue.clone(), self.metrics.clone()));

        let reason = loop {
            let Some(input) = queue.pop().await else {
                break match (&mut reader).await {
                    Ok(reason) => reason,
                    Err(e) => CloseReason::Transport(format!("reader task failed: {}", e)),
                };
            };

            if let Err(reason) = self.handle_frame(input, &mut outbound).await {
                break reason;
            }
        };

        reader.abort();
        queue.close();
        if let Err(e) = outbound.close().await {
            tracing::debug!("Failed to close outbound sink: {}", e);
        }

        match &reason {
            CloseReason::PeerClosed => tracing::info!("Streaming session closed by peer"),
            CloseReason::Transport(e) => tracing::warn!("Streaming session transport error: {}", e),
            CloseReason::Pipeline(e) => tracing::error!("Streaming session aborted: {}", e),
        }
        self.metrics.session_closed(reason.as_str());
        self.state = SessionState::Closed(reason.clone());
        reason
    }

    async fn handle_frame<K>(&self, input: FrameInput, outbound: &mut K) -> Result<(), CloseReason>
    where
        K: Sink<String> + Unpin,
        K::Error: Display,
    {
        let started = Instant::now();

        let image = match self.pipeline.decode(input).await {
            Ok(image) => image,
            Err(FrameError::Decode(e)) => {
                tracing::debug!("Skipping undecodable frame: {}", e);
                self.metrics.record_frame_skipped();
                return Ok(());
            }
            Err(FrameError::Pipeline(e)) => return Err(CloseReason::Pipeline(e.to_string())),
        };

        let output = self
            .pipeline
            .process(image, &self.config)
            .await
            .map_err(|e| CloseReason::Pipeline(e.to_string()))?;

        self.metrics
            .record_pipeline_duration(started.elapsed().as_millis() as u64, ROUTE_STREAM);

        outbound
            .send(output.data_uri)
            .await
            .map_err(|e| CloseReason::Transport(e.to_string()))
    }
}

async fn read_inbound<S, E>(
    mut inbound: S,
    queue: Arc<FrameQueue<FrameInput>>,
    metrics: Arc<Metrics>,
) -> CloseReason
where
    S: Stream<Item = Result<InboundFrame, E>> + Unpin,
    E: Display,
{
    let reason = loop {
        let input = match inbound.next().await {
            None | Some(Ok(InboundFrame::Close)) => break CloseReason::PeerClosed,
            Some(Err(e)) => break CloseReason::Transport(e.to_string()),
            Some(Ok(InboundFrame::Text(text))) => FrameInput::Envelope(text),
            Some(Ok(InboundFrame::Binary(bytes))) => FrameInput::Raw(bytes),
        };

        metrics.record_frame_received();
        match queue.push(input) {
            PushOutcome::Queued => {}
            PushOutcome::DroppedOldest => {
                tracing::debug!("Inbound buffer full, dropped oldest frame");
                metrics.record_frame_dropped("drop_oldest");
            }
            PushOutcome::Rejected => {
                tracing::debug!("Inbound buffer full, rejected new frame");
                metrics.record_frame_dropped("reject_new");
            }
            PushOutcome::Closed => break CloseReason::PeerClosed,
        }
    };

    queue.close();
    reason
}
