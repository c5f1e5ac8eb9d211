use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{future, Stream, StreamExt};

#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    /// A single row failed parsing or validation and was dropped.
    #[error("row rejected: {0}")]
    Rejected(String),
    #[error("sink error: {0}")]
    Sink(String),
}

impl PipelineError {
    /// Rejected rows shrink the working set; everything else aborts the render.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::Rejected(_))
    }
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

/// A same-shape step over each envelope. Returning `Ok(None)` filters the
/// item out without counting it as rejected.
#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Option<Envelope<O>>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    type Output: Send;

    async fn run<S>(&self, input: S) -> Result<Self::Output, PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>, // same-type transforms chain
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<K::Output, PipelineError> {
        let mut stream = self.source.stream().await;

        // Apply transforms in sequence (if any).
        for t in self.transforms {
            let t_arc = t.clone();
            stream = Box::pin(
                stream
                    .then(move |item| {
                        let t_inner = t_arc.clone();
                        async move {
                            match item {
                                Ok(env) => t_inner.apply(env).await.transpose(),
                                Err(e) => Some(Err(e)),
                            }
                        }
                    })
                    .filter_map(future::ready),
            );
        }

        self.sink.run(stream).await
    }
}
