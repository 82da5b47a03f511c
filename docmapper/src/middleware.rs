// Middleware execution: ordered pre/post hook chains per operation invocation

use crate::document::Document;
use crate::error::{Error, Result};
use crate::query::QueryContext;
use crate::schema::Schema;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Save,
    Remove,
    Find,
    FindOne,
    Count,
    UpdateOne,
    FindOneAndUpdate,
}

impl OperationKind {
    /// Which hook scopes an operation kind dispatches to.
    pub fn accepts(&self, scope: HookScope) -> bool {
        match self {
            OperationKind::Save => scope == HookScope::Document,
            OperationKind::Remove => true,
            _ => scope == HookScope::Query,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Save => "save",
            OperationKind::Remove => "remove",
            OperationKind::Find => "find",
            OperationKind::FindOne => "findOne",
            OperationKind::Count => "count",
            OperationKind::UpdateOne => "updateOne",
            OperationKind::FindOneAndUpdate => "findOneAndUpdate",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookScope {
    Document,
    Query,
}

impl fmt::Display for HookScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookScope::Document => f.write_str("document"),
            HookScope::Query => f.write_str("query"),
        }
    }
}

/// Hook body exposed to the document under save/remove.
///
/// In the pre phase an `Err` aborts the operation. In the post phase the
/// document has already been persisted; edits made here stay in memory until
/// the caller saves again.
#[async_trait]
pub trait DocumentHook: Send + Sync {
    async fn run(&self, doc: &mut Document) -> Result<()>;
}

/// Hook body exposed to a query or update in flight.
///
/// Pre hooks may replace the filter, update payload or options. Post hooks
/// see a sealed context with [`QueryContext::result`] populated.
#[async_trait]
pub trait QueryHook: Send + Sync {
    async fn run(&self, query: &mut QueryContext) -> Result<()>;
}

#[async_trait]
impl<F> DocumentHook for F
where
    F: Fn(&mut Document) -> Result<()> + Send + Sync,
{
    async fn run(&self, doc: &mut Document) -> Result<()> {
        self(doc)
    }
}

#[async_trait]
impl<F> QueryHook for F
where
    F: Fn(&mut QueryContext) -> Result<()> + Send + Sync,
{
    async fn run(&self, query: &mut QueryContext) -> Result<()> {
        self(query)
    }
}

/// A registered hook, tagged by the context shape it expects.
#[derive(Clone)]
pub enum HookBody {
    Document(Arc<dyn DocumentHook>),
    Query(Arc<dyn QueryHook>),
}

impl HookBody {
    pub fn document(hook: impl DocumentHook + 'static) -> Self {
        HookBody::Document(Arc::new(hook))
    }

    pub fn query(hook: impl QueryHook + 'static) -> Self {
        HookBody::Query(Arc::new(hook))
    }

    pub fn scope(&self) -> HookScope {
        match self {
            HookBody::Document(_) => HookScope::Document,
            HookBody::Query(_) => HookScope::Query,
        }
    }
}

impl fmt::Debug for HookBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookBody({})", self.scope())
    }
}

// ── Cancellation ─────────────────────────────────────────────────

/// Shared flag a caller flips to cancel an in-flight operation.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        CancelHandle::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Invocation state machine ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pending,
    RunningPre,
    Executing,
    RunningPost,
    Completed,
    /// A pre hook failed, or the caller cancelled before storage ran.
    Aborted,
    /// Storage failed, or the caller cancelled after storage ran.
    Failed,
}

static NEXT_INVOCATION: AtomicU64 = AtomicU64::new(1);

/// One run of one operation: drives the hook chains and tracks state.
pub struct Invocation {
    id: u64,
    schema: Arc<Schema>,
    kind: OperationKind,
    state: InvocationState,
    cancel: Option<CancelHandle>,
}

impl Invocation {
    pub fn new(schema: Arc<Schema>, kind: OperationKind, cancel: Option<CancelHandle>) -> Self {
        Invocation {
            id: NEXT_INVOCATION.fetch_add(1, Ordering::Relaxed),
            schema,
            kind,
            state: InvocationState::Pending,
            cancel,
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    fn transition(&mut self, to: InvocationState) {
        log::debug!(
            "invocation #{} {}: {:?} -> {:?}",
            self.id,
            self.kind,
            self.state,
            to
        );
        self.state = to;
    }

    fn expect_state(&self, expected: InvocationState) -> Result<()> {
        if self.state != expected {
            return Err(Error::Configuration(format!(
                "invocation #{} {} is {:?}, expected {:?}",
                self.id, self.kind, self.state, expected
            )));
        }
        Ok(())
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelHandle::is_cancelled)
    }

    fn abort<T>(&mut self, err: Error) -> Result<T> {
        self.transition(InvocationState::Aborted);
        Err(err)
    }

    pub async fn run_pre_document(&mut self, doc: &mut Document) -> Result<()> {
        self.expect_state(InvocationState::Pending)?;
        self.transition(InvocationState::RunningPre);
        let schema = Arc::clone(&self.schema);
        for hook in schema.scoped_hooks(self.kind, HookPhase::Pre, HookScope::Document) {
            if let HookBody::Document(body) = hook {
                if let Err(e) = body.run(doc).await {
                    log::debug!("invocation #{} {}: pre hook failed: {e}", self.id, self.kind);
                    return self.abort(e);
                }
            }
        }
        Ok(())
    }

    pub async fn run_pre_query(&mut self, query: &mut QueryContext) -> Result<()> {
        self.expect_state(InvocationState::Pending)?;
        self.transition(InvocationState::RunningPre);
        let schema = Arc::clone(&self.schema);
        for hook in schema.scoped_hooks(self.kind, HookPhase::Pre, HookScope::Query) {
            if let HookBody::Query(body) = hook {
                if let Err(e) = body.run(query).await {
                    log::debug!("invocation #{} {}: pre hook failed: {e}", self.id, self.kind);
                    return self.abort(e);
                }
            }
        }
        Ok(())
    }

    /// Gate between the pre chain and storage.
    pub fn begin_execution(&mut self) -> Result<()> {
        self.expect_state(InvocationState::RunningPre)?;
        if self.cancelled() {
            log::warn!("invocation #{} {}: cancelled before storage", self.id, self.kind);
            return self.abort(Error::Cancelled {
                operation: self.kind.to_string(),
                storage_applied: false,
            });
        }
        self.transition(InvocationState::Executing);
        Ok(())
    }

    /// Record a storage failure. Hooks already run are not undone.
    pub fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.transition(InvocationState::Failed);
        Err(err)
    }

    /// Gate between storage and the post chain.
    fn begin_post(&mut self) -> Result<()> {
        self.expect_state(InvocationState::Executing)?;
        if self.cancelled() {
            log::warn!(
                "invocation #{} {}: cancelled after storage, post hooks skipped",
                self.id,
                self.kind
            );
            return self.fail(Error::Cancelled {
                operation: self.kind.to_string(),
                storage_applied: true,
            });
        }
        self.transition(InvocationState::RunningPost);
        Ok(())
    }

    fn post_failed<T>(&mut self, err: Error) -> Result<T> {
        log::warn!(
            "invocation #{} {}: post hook failed, storage effect kept: {err}",
            self.id,
            self.kind
        );
        self.transition(InvocationState::Failed);
        Err(Error::PostHook {
            operation: self.kind.to_string(),
            source: Box::new(err),
        })
    }

    pub async fn run_post_document(&mut self, doc: &mut Document) -> Result<()> {
        self.begin_post()?;
        let schema = Arc::clone(&self.schema);
        for hook in schema.scoped_hooks(self.kind, HookPhase::Post, HookScope::Document) {
            if let HookBody::Document(body) = hook {
                if let Err(e) = body.run(doc).await {
                    return self.post_failed(e);
                }
            }
        }
        self.transition(InvocationState::Completed);
        Ok(())
    }

    pub async fn run_post_query(&mut self, query: &mut QueryContext) -> Result<()> {
        self.begin_post()?;
        let schema = Arc::clone(&self.schema);
        for hook in schema.scoped_hooks(self.kind, HookPhase::Post, HookScope::Query) {
            if let HookBody::Query(body) = hook {
                if let Err(e) = body.run(query).await {
                    return self.post_failed(e);
                }
            }
        }
        self.transition(InvocationState::Completed);
        Ok(())
    }
}
