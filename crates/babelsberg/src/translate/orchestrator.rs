//! Bounded-concurrency translation orchestration.
//!
//! Tasks are issued in ascending priority order through a semaphore that
//! caps in-flight requests; each task sleeps the configured request delay
//! before calling the backend, giving a soft rate limit. Failures and
//! timeouts never escape the batch: the affected task falls back to its
//! original text. Results are returned in input order regardless of
//! completion order, and cancellation drops pending tasks cooperatively.

use crate::cache::TwoTierCache;
use crate::config::TranslationConfig;
use crate::error::BabelsbergError;
use crate::source::TranslationBackend;
use crate::translate::markup::translate_markup_aware;
use crate::types::TranslationTask;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Outcome of one translation task.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationOutcome {
    pub task_id: String,
    pub text: String,
    pub from_cache: bool,
    /// True when the original text was substituted after an error or timeout.
    pub fell_back: bool,
}

/// Counters accumulated across batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorStats {
    pub api_calls: u64,
    pub translation_errors: u64,
    pub timeouts: u64,
    pub cancelled_tasks: u64,
}

/// Concurrent translation driver over one backend and one shared cache.
pub struct TranslationOrchestrator {
    backend: Arc<dyn TranslationBackend>,
    cache: Arc<TwoTierCache>,
    config: TranslationConfig,
    model_name: String,
    cancel_flag: Arc<AtomicBool>,
    api_calls: AtomicU64,
    translation_errors: AtomicU64,
    timeouts: AtomicU64,
    cancelled_tasks: AtomicU64,
}

impl TranslationOrchestrator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        cache: Arc<TwoTierCache>,
        config: TranslationConfig,
        model_name: Option<String>,
    ) -> Self {
        let model_name = model_name.unwrap_or_else(|| backend.model_name().to_string());
        TranslationOrchestrator {
            backend,
            cache,
            config,
            model_name,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            api_calls: AtomicU64::new(0),
            translation_errors: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            cancelled_tasks: AtomicU64::new(0),
        }
    }

    /// Request cooperative cancellation: in-flight tasks finish or time
    /// out, pending tasks fall back to their original text.
    pub fn request_cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    /// Reset the cancellation flag for a new batch.
    pub fn reset_cancel(&self) {
        self.cancel_flag.store(false, Ordering::SeqCst);
    }

    pub fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            api_calls: self.api_calls.load(Ordering::Relaxed),
            translation_errors: self.translation_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            cancelled_tasks: self.cancelled_tasks.load(Ordering::Relaxed),
        }
    }

    /// Translate a batch, returning outcomes in input order.
    pub async fn translate_batch(&self, tasks: Vec<TranslationTask>) -> Vec<TranslationOutcome> {
        if tasks.is_empty() {
            return Vec::new();
        }

        // Fallback texts for panicked or dropped tasks, and the dispatch
        // order: ascending priority, stable on input index.
        let fallbacks: Vec<(String, String)> =
            tasks.iter().map(|t| (t.task_id.clone(), t.text.clone())).collect();
        let mut dispatch_order: Vec<usize> = (0..tasks.len()).collect();
        dispatch_order.sort_by_key(|&i| (tasks[i].priority, i));

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let request_delay = Duration::from_millis(self.config.request_delay_ms);
        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));

        let mut indexed_tasks: Vec<Option<TranslationTask>> = tasks.into_iter().map(Some).collect();
        let mut join_set: JoinSet<(usize, TranslationOutcome)> = JoinSet::new();

        for index in dispatch_order {
            let task = indexed_tasks[index].take().expect("each task is dispatched once");
            let backend = Arc::clone(&self.backend);
            let cache = Arc::clone(&self.cache);
            let semaphore = Arc::clone(&semaphore);
            let cancel_flag = Arc::clone(&self.cancel_flag);
            let model_name = self.model_name.clone();

            join_set.spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");

                if cancel_flag.load(Ordering::SeqCst) {
                    return (
                        index,
                        TranslationOutcome {
                            task_id: task.task_id.clone(),
                            text: task.text.clone(),
                            from_cache: false,
                            fell_back: true,
                        },
                    );
                }

                let outcome = translate_one(&*backend, &cache, &model_name, request_delay, timeout, &task).await;
                (index, outcome)
            });
        }

        let mut results: Vec<Option<TranslationOutcome>> = vec![None; fallbacks.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    if outcome.fell_back {
                        if self.cancel_flag.load(Ordering::SeqCst) {
                            self.cancelled_tasks.fetch_add(1, Ordering::Relaxed);
                        } else {
                            self.translation_errors.fetch_add(1, Ordering::Relaxed);
                        }
                    } else if !outcome.from_cache {
                        self.api_calls.fetch_add(1, Ordering::Relaxed);
                    }
                    results[index] = Some(outcome);
                }
                Err(join_err) => {
                    // A panicked task loses only itself; the batch continues.
                    warn!(error = %join_err, "translation task panicked");
                    self.translation_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let (task_id, text) = fallbacks[index].clone();
                    TranslationOutcome {
                        task_id,
                        text,
                        from_cache: false,
                        fell_back: true,
                    }
                })
            })
            .collect()
    }
}

/// Translate one task: cache first, then a rate-limited, timed backend call
/// with original-text fallback.
async fn translate_one(
    backend: &dyn TranslationBackend,
    cache: &TwoTierCache,
    model_name: &str,
    request_delay: Duration,
    timeout: Duration,
    task: &TranslationTask,
) -> TranslationOutcome {
    if let Some(hit) = cache.lookup(
        &task.text,
        &task.target_language,
        model_name,
        &task.context_before,
        &task.context_after,
    ) {
        return TranslationOutcome {
            task_id: task.task_id.clone(),
            text: hit,
            from_cache: true,
            fell_back: false,
        };
    }

    // Soft rate limit before the request.
    tokio::time::sleep(request_delay).await;

    let attempt = tokio::time::timeout(
        timeout,
        translate_markup_aware(
            backend,
            &task.text,
            &task.target_language,
            &task.item_type,
            &task.context_before,
            &task.context_after,
            Some(model_name),
        ),
    )
    .await;

    let result = match attempt {
        Ok(inner) => inner,
        Err(_) => Err(BabelsbergError::Timeout(timeout.as_secs())),
    };

    match result {
        Ok(translated) => {
            cache.store(
                &task.text,
                &translated,
                &task.target_language,
                model_name,
                &task.context_before,
                &task.context_after,
            );
            TranslationOutcome {
                task_id: task.task_id.clone(),
                text: translated,
                from_cache: false,
                fell_back: false,
            }
        }
        Err(e) => {
            debug!(task_id = %task.task_id, error = %e, "translation failed, using original text");
            TranslationOutcome {
                task_id: task.task_id.clone(),
                text: task.text.clone(),
                from_cache: false,
                fell_back: true,
            }
        }
    }
}
