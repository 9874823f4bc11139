//! Single worker task that owns the model runtime.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{ModelRuntime, SamplingParams, StepDecision};
use crate::config::WorkerConfig;
use crate::latch::FinishOnce;
use crate::registry::ModelCapabilities;
use crate::stopper::{first_stop, CancellationStopper, MaxTokensStopper, Stopper};
use crate::types::{FinishReason, GenerationRequest, RuntimeError, StreamChunk};

/// Receiving side of a generation stream.
pub type ChunkReceiver = mpsc::Receiver<Result<StreamChunk, RuntimeError>>;
type ChunkSender = mpsc::Sender<Result<StreamChunk, RuntimeError>>;

#[derive(Debug, Default)]
struct WorkerMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    pending: AtomicUsize,
    tokens_generated: AtomicU64,
}

impl WorkerMetrics {
    fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_finished(&self, reason: Option<&FinishReason>, tokens: usize) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        self.tokens_generated
            .fetch_add(tokens as u64, Ordering::Relaxed);
        let counter = match reason {
            Some(reason) if reason.is_cancelled() => &self.cancelled,
            Some(FinishReason::Failed(_)) | None => &self.failed,
            Some(_) => &self.completed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn stats(&self) -> WorkerStats {
        WorkerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            tokens_generated: self.tokens_generated.load(Ordering::Relaxed),
        }
    }
}

/// Counters describing the work the runtime worker has done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub pending: usize,
    pub tokens_generated: u64,
}

enum RuntimeJob {
    Load {
        model: ModelCapabilities,
        reply: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Generate {
        request: GenerationRequest,
        cancel: CancellationToken,
        stream: ChunkSender,
        submitted_at: Instant,
    },
}

/// Serializes every load and generation against one [`ModelRuntime`].
///
/// Jobs are queued on a bounded channel and run one at a time on a blocking
/// thread, so the runtime never sees two operations at once.
pub struct RuntimeWorker {
    sender: mpsc::Sender<RuntimeJob>,
    runtime: Arc<dyn ModelRuntime>,
    metrics: Arc<WorkerMetrics>,
    stream_buffer: usize,
    handle: JoinHandle<()>,
}

impl RuntimeWorker {
    /// Spawn the worker task. Must be called inside a Tokio runtime.
    pub fn spawn(runtime: Arc<dyn ModelRuntime>, config: &WorkerConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.max_pending_jobs.max(1));
        let metrics = Arc::new(WorkerMetrics::default());

        let handle = tokio::spawn(Self::worker_loop(
            receiver,
            runtime.clone(),
            metrics.clone(),
        ));

        info!(
            "RuntimeWorker started, max pending jobs: {}",
            config.max_pending_jobs
        );

        Self {
            sender,
            runtime,
            metrics,
            stream_buffer: config.stream_buffer.max(1),
            handle,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.runtime.is_loaded()
    }

    pub fn loaded_model(&self) -> Option<String> {
        self.runtime.loaded_model()
    }

    /// Load a model, waiting behind any queued generation.
    pub async fn load(&self, model: &ModelCapabilities) -> Result<(), RuntimeError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(RuntimeJob::Load {
                model: model.clone(),
                reply,
            })
            .await
            .map_err(|_| RuntimeError::WorkerUnavailable)?;
        response.await.map_err(|_| RuntimeError::WorkerUnavailable)?
    }

    /// Queue a generation and return its chunk stream.
    ///
    /// Chunks carry cumulative text. The stream ends with exactly one
    /// terminal item: a chunk with `is_complete` set, or an error.
    pub fn submit(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<ChunkReceiver, RuntimeError> {
        if !self.runtime.is_loaded() {
            return Err(RuntimeError::ModelNotLoaded);
        }

        let (stream, receiver) = mpsc::channel(self.stream_buffer);
        let generation_id = request.generation_id;
        self.metrics.record_submitted();

        let job = RuntimeJob::Generate {
            request,
            cancel,
            stream,
            submitted_at: Instant::now(),
        };
        match self.sender.try_send(job) {
            Ok(()) => {
                debug!("Queued generation {}", generation_id);
                Ok(receiver)
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Runtime queue is full, rejecting generation {}", generation_id);
                self.metrics.record_rejected();
                Err(RuntimeError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_rejected();
                Err(RuntimeError::WorkerUnavailable)
            }
        }
    }

    /// Ask the runtime to abandon whatever it is generating.
    pub fn cancel_current(&self) {
        self.runtime.cancel_current();
    }

    pub fn stats(&self) -> WorkerStats {
        self.metrics.stats()
    }

    async fn worker_loop(
        mut receiver: mpsc::Receiver<RuntimeJob>,
        runtime: Arc<dyn ModelRuntime>,
        metrics: Arc<WorkerMetrics>,
    ) {
        while let Some(job) = receiver.recv().await {
            match job {
                RuntimeJob::Load { model, reply } => {
                    info!("Loading model {}", model.id);
                    let runtime = runtime.clone();
                    let model_id = model.id.clone();
                    let result = tokio::task::spawn_blocking(move || runtime.load(&model))
                        .await
                        .unwrap_or_else(|e| Err(RuntimeError::LoadFailed(e.to_string())));
                    match &result {
                        Ok(()) => info!("Model {} loaded", model_id),
                        Err(e) => error!("Failed to load model {}: {}", model_id, e),
                    }
                    let _ = reply.send(result);
                }
                RuntimeJob::Generate {
                    request,
                    cancel,
                    stream,
                    submitted_at,
                } => {
                    let generation_id = request.generation_id;
                    debug!(
                        "Starting generation {} (queued for {:?})",
                        generation_id,
                        submitted_at.elapsed()
                    );

                    if cancel.is_cancelled() {
                        debug!("Dropping generation {} cancelled while queued", generation_id);
                        let _ = stream
                            .send(Ok(StreamChunk::finished("", 0, FinishReason::Cancelled)))
                            .await;
                        metrics.record_finished(Some(&FinishReason::Cancelled), 0);
                        continue;
                    }

                    let runtime = runtime.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        run_generation(runtime.as_ref(), request, cancel, stream)
                    })
                    .await;

                    match outcome {
                        Ok((reason, tokens)) => metrics.record_finished(reason.as_ref(), tokens),
                        Err(e) => {
                            error!("Generation {} task failed: {}", generation_id, e);
                            metrics.record_finished(None, 0);
                        }
                    }
                }
            }
        }
        info!("RuntimeWorker shutting down - channel closed");
    }

    /// Stop accepting jobs and wait for queued work to drain.
    pub async fn shutdown(self) {
        let Self {
            sender, handle, ..
        } = self;
        drop(sender);
        if let Err(e) = handle.await {
            warn!("RuntimeWorker panicked during shutdown: {}", e);
        }
    }
}

/// Run one generation on the calling (blocking) thread.
///
/// Both the step callback and the code after `generate` returns may decide
/// the stream is finished; the [`FinishOnce`] latch lets only the first one
/// send the terminal item. Returns the finish reason (None on error) and
/// the token count.
fn run_generation(
    runtime: &dyn ModelRuntime,
    request: GenerationRequest,
    cancel: CancellationToken,
    stream: ChunkSender,
) -> (Option<FinishReason>, usize) {
    let generation_id = request.generation_id;
    let latch = FinishOnce::new();
    let finish = |item: Result<StreamChunk, RuntimeError>| {
        latch.finish_with(|| {
            if stream.blocking_send(item).is_err() {
                debug!("Receiver for generation {} already dropped", generation_id);
            }
        })
    };

    let input = match runtime.prepare(&request.system_prompt, &request.turns) {
        Ok(input) => input,
        Err(e) => {
            error!("Failed to prepare generation {}: {}", generation_id, e);
            finish(Err(e));
            return (None, 0);
        }
    };

    if cancel.is_cancelled() {
        finish(Ok(StreamChunk::finished("", 0, FinishReason::Cancelled)));
        return (Some(FinishReason::Cancelled), 0);
    }

    let mut stoppers: Vec<Box<dyn Stopper>> =
        vec![Box::new(CancellationStopper::new(cancel.clone()))];
    if let Some(max_tokens) = request.max_tokens {
        stoppers.push(Box::new(MaxTokensStopper::new(max_tokens)));
    }

    let sampling = SamplingParams {
        temperature: request.temperature,
        top_p: request.top_p,
    };
    let mut delivered = String::new();
    let mut delivered_tokens = 0usize;
    let mut stopped: Option<FinishReason> = None;

    let result = runtime.generate(input, sampling, &mut |step| {
        if latch.is_finished() {
            return StepDecision::Stop;
        }
        trace!(
            "Generation {} step {} ({} chars)",
            generation_id,
            step.token_count,
            step.text.len()
        );

        if let Some(reason) = first_stop(&mut stoppers, step) {
            let chunk = if reason.is_cancelled() {
                StreamChunk::finished(delivered.clone(), delivered_tokens, reason.clone())
            } else {
                delivered = step.text.to_string();
                delivered_tokens = step.token_count;
                StreamChunk::finished(step.text, step.token_count, reason.clone())
            };
            stopped = Some(reason);
            finish(Ok(chunk));
            return StepDecision::Stop;
        }

        if stream
            .blocking_send(Ok(StreamChunk::progress(step.text, step.token_count)))
            .is_err()
        {
            debug!("Receiver for generation {} dropped, stopping", generation_id);
            cancel.cancel();
            return StepDecision::Stop;
        }
        delivered = step.text.to_string();
        delivered_tokens = step.token_count;
        StepDecision::Continue
    });

    match result {
        Ok(text) => {
            let reason = if let Some(reason) = stopped {
                reason
            } else if cancel.is_cancelled() {
                FinishReason::Cancelled
            } else if text.is_empty() {
                FinishReason::Empty
            } else {
                FinishReason::Completed
            };

            let chunk = if reason.is_cancelled() {
                StreamChunk::finished(delivered.clone(), delivered_tokens, reason.clone())
            } else {
                StreamChunk::finished(text, delivered_tokens, reason.clone())
            };
            finish(Ok(chunk));
            info!(
                "Generation {} finished: {:?} after {} tokens",
                generation_id, reason, delivered_tokens
            );
            (Some(reason), delivered_tokens)
        }
        Err(e) => {
            error!(
                "Generation {} failed after {} tokens: {}",
                generation_id, delivered_tokens, e
            );
            finish(Err(e));
            (None, delivered_tokens)
        }
    }
}
