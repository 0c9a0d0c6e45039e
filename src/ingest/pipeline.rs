//! Upload pipeline
//!
//! One request moves through:
//!
//! ```text
//! Unauthenticated -> Authenticated -> Transformed -> Validated -> Committed
//!        \                 \               \             \
//!         +-----------------+---------------+-------------+--> Rejected
//! ```
//!
//! - Transitions only move forward; `Committed` and `Rejected` are terminal
//! - The first failing row or field rejects the whole request
//! - The store is called at most once, and only from `Validated`
//!
//! Transformation and validation run fused, one pass per row. A row-length
//! failure rejects from `Authenticated`; a validation failure rejects from
//! `Transformed`.

use super::batch::{write_batch, BatchResult};
use super::errors::{IngestError, IngestResult};
use super::request::UploadRequest;
use super::signature;
use super::transform::{transform_row, Document};
use crate::context::AppContext;

/// Pipeline state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Request received, signature not yet checked
    Unauthenticated,
    /// Uploader known and signature accepted
    Authenticated,
    /// Every row mapped onto the uploader's columns
    Transformed,
    /// Every field passed its rule
    Validated,
    /// Batch written by the store
    Committed,
    /// Request failed; nothing was written
    Rejected,
}

impl PipelineState {
    /// Get the state name for logs.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Unauthenticated",
            Self::Authenticated => "Authenticated",
            Self::Transformed => "Transformed",
            Self::Validated => "Validated",
            Self::Committed => "Committed",
            Self::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Rejected)
    }

    /// Whether `next` may follow this state.
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Unauthenticated, Authenticated) => true,
            (Authenticated, Transformed) => true,
            (Transformed, Validated) => true,
            (Validated, Committed) => true,
            (from, Rejected) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.state_name())
    }
}

/// The finished run of one request: every state it passed through plus its
/// outcome.
#[derive(Debug)]
pub struct PipelineRun {
    history: Vec<PipelineState>,
    result: IngestResult<BatchResult>,
}

impl PipelineRun {
    /// Final state, always terminal.
    pub fn state(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Unauthenticated)
    }

    /// States in the order they were entered, starting at `Unauthenticated`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    pub fn result(&self) -> &IngestResult<BatchResult> {
        &self.result
    }

    pub fn into_result(self) -> IngestResult<BatchResult> {
        self.result
    }
}

struct Tracker<'a> {
    uploader: &'a str,
    history: Vec<PipelineState>,
}

impl<'a> Tracker<'a> {
    fn new(uploader: &'a str) -> Self {
        Self {
            uploader,
            history: vec![PipelineState::Unauthenticated],
        }
    }

    fn current(&self) -> PipelineState {
        self.history
            .last()
            .copied()
            .unwrap_or(PipelineState::Unauthenticated)
    }

    fn advance(&mut self, next: PipelineState) {
        let from = self.current();
        debug_assert!(
            from.can_transition_to(next),
            "illegal pipeline transition {} -> {}",
            from,
            next
        );
        tracing::debug!(uploader = self.uploader, from = %from, to = %next, "pipeline transition");
        self.history.push(next);
    }

    fn reject(mut self, error: IngestError) -> PipelineRun {
        tracing::warn!(
            uploader = self.uploader,
            state = %self.current(),
            code = error.code(),
            error = %error,
            "upload rejected"
        );
        self.advance(PipelineState::Rejected);
        PipelineRun {
            history: self.history,
            result: Err(error),
        }
    }

    fn commit(mut self, result: BatchResult) -> PipelineRun {
        self.advance(PipelineState::Committed);
        tracing::info!(
            uploader = self.uploader,
            collection = %result.collection,
            batch_id = %result.batch_id,
            inserted = result.inserted_count,
            "batch committed"
        );
        PipelineRun {
            history: self.history,
            result: Ok(result),
        }
    }
}

/// Runs one request through the pipeline and keeps the full state history.
pub async fn run(ctx: &AppContext, request: UploadRequest) -> PipelineRun {
    let UploadRequest {
        uploader: identity,
        timestamp,
        signature: supplied,
        rows,
    } = request;
    let mut tracker = Tracker::new(&identity);

    let uploader = match signature::verify(ctx.uploaders(), &identity, &timestamp, &supplied) {
        Ok(uploader) => uploader,
        Err(e) => return tracker.reject(e),
    };
    tracker.advance(PipelineState::Authenticated);

    let columns = uploader.columns();
    let validators = ctx.validators();
    let mut documents: Vec<Document> = Vec::with_capacity(rows.len());
    for (row_index, row) in rows.into_iter().enumerate() {
        let document = match transform_row(columns, row_index, row) {
            Ok(document) => document,
            Err(e) => return tracker.reject(e),
        };
        if let Err(e) = validators.validate_document(row_index, columns, &document) {
            tracker.advance(PipelineState::Transformed);
            return tracker.reject(e);
        }
        documents.push(document);
    }
    tracker.advance(PipelineState::Transformed);
    tracker.advance(PipelineState::Validated);

    if documents.is_empty() {
        return tracker.reject(IngestError::EmptyBatch);
    }

    match write_batch(ctx.store(), uploader.collection(), &documents).await {
        Ok(result) => tracker.commit(result),
        Err(e) => tracker.reject(e),
    }
}

/// Runs one request and returns only its outcome.
pub async fn ingest(ctx: &AppContext, request: UploadRequest) -> IngestResult<BatchResult> {
    run(ctx, request).await.into_result()
}
