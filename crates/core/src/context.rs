use std::cell::RefCell;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::{Result, SpanweaveError};
use crate::ids::{ContextId, IdSource, SpanId, TraceId, default_id_source};
use crate::logger::{Logger, LoggerConfig};
use crate::model::span::{SENTINEL_ATTR, Span, SpanData};
use crate::tree::{self, SpanNode};

/// Options for creating a root context or a fork.
#[derive(Default)]
pub struct ContextOptions {
    /// Module segment, appended to the parent's dotted module path. When
    /// omitted the parent's path is reused verbatim.
    pub module: Option<String>,
    /// Caller-defined parameters carried by the context.
    pub params: Map<String, Value>,
    /// Identifier source; inherited from the parent (or the UUID default)
    /// when omitted.
    pub id_source: Option<Rc<dyn IdSource>>,
    /// Depth offset for the context's sentinel. Defaults to 0 for roots and
    /// parent depth + 1 for forks.
    pub root_span_depth: Option<u32>,
}

struct ContextInner {
    trace_id: TraceId,
    id: ContextId,
    parent_id: Option<ContextId>,
    created_at: DateTime<Utc>,
    module: String,
    params: Map<String, Value>,
    root_span_depth: u32,
    /// Insertion-ordered span arena; index 0 is always the sentinel.
    spans: Vec<Span>,
    /// Index of the current head span (top of the local stack).
    head: usize,
    /// Non-owning back-references to forked children, kept only for global
    /// tree traversal. A child dropped by its creator disappears from the
    /// merged tree.
    children: Vec<Weak<RefCell<ContextInner>>>,
    ids: Rc<dyn IdSource>,
}

/// Owner of one local span stack/tree, optionally forked from a parent.
///
/// A context is driven by a single logical thread of control: there is no
/// internal locking, and racing callers on one context are a caller bug.
/// Concurrent work gets its own context via [`Context::fork`].
#[derive(Clone)]
pub struct Context {
    inner: Rc<RefCell<ContextInner>>,
}

/// Frozen snapshot of a context: metadata plus deep span snapshots.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ContextSnapshot {
    pub trace_id: TraceId,
    pub id: ContextId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ContextId>,
    pub created_at: DateTime<Utc>,
    pub module: String,
    pub params: Map<String, Value>,
    pub root_span_depth: u32,
    pub head_span_id: SpanId,
    pub spans: Vec<SpanData>,
}

impl Context {
    /// Creates a root context: fresh trace id, no parent.
    pub fn root(options: ContextOptions) -> Self {
        Self::build(None, options)
    }

    /// Forks a child context for logically-independent sub-work.
    ///
    /// The child keeps its own span stack; the parent only records a weak
    /// back-reference for later tree assembly. Keep the returned handle
    /// alive until after [`Context::global_span_tree`], or the child's
    /// subtree will not appear in the merged output.
    pub fn fork(&self, options: ContextOptions) -> Self {
        Self::build(Some(self), options)
    }

    fn build(parent: Option<&Context>, options: ContextOptions) -> Self {
        let ids = options
            .id_source
            .or_else(|| parent.map(|p| Rc::clone(&p.inner.borrow().ids)))
            .unwrap_or_else(default_id_source);

        let (trace_id, parent_id, parent_module, default_depth) = match parent {
            Some(p) => {
                let b = p.inner.borrow();
                (
                    b.trace_id.clone(),
                    Some(b.id.clone()),
                    b.module.clone(),
                    b.root_span_depth + 1,
                )
            }
            None => (TraceId::new(ids.as_ref()), None, String::new(), 0),
        };

        let root_span_depth = options.root_span_depth.unwrap_or(default_depth);
        let module = full_module_path(&parent_module, options.module.as_deref());

        let sentinel_name = if module.is_empty() {
            "root-sentinel".to_string()
        } else {
            format!("{module}-sentinel")
        };
        let mut sentinel_attrs = Map::new();
        sentinel_attrs.insert(SENTINEL_ATTR.to_string(), json!(true));
        let sentinel = Span::start(
            SpanId::new(ids.as_ref()),
            trace_id.clone(),
            None,
            sentinel_name,
            sentinel_attrs,
            root_span_depth,
        );

        let inner = Rc::new(RefCell::new(ContextInner {
            trace_id,
            id: ContextId::new(ids.as_ref()),
            parent_id,
            created_at: Utc::now(),
            module,
            params: options.params,
            root_span_depth,
            spans: vec![sentinel],
            head: 0,
            children: Vec::new(),
            ids,
        }));

        if let Some(p) = parent {
            p.inner.borrow_mut().children.push(Rc::downgrade(&inner));
        }

        Self { inner }
    }

    /// Starts a new span under the current head and makes it the new head.
    ///
    /// All spans started directly on a context share one logical call level:
    /// depth is fixed at `root_span_depth + 1` and increases only across
    /// forks, never across nested `start_span` calls.
    pub fn start_span(&self, name: impl Into<String>, attributes: Map<String, Value>) -> Span {
        let mut inner = self.inner.borrow_mut();
        let parent_id = inner.spans[inner.head].id();
        let span = Span::start(
            SpanId::new(inner.ids.as_ref()),
            inner.trace_id.clone(),
            Some(parent_id),
            name.into(),
            attributes,
            inner.root_span_depth + 1,
        );
        inner.spans.push(span.clone());
        inner.head = inner.spans.len() - 1;
        span
    }

    /// Ends the current head span, recording `error` first when supplied,
    /// and pops the head back to the span's parent.
    pub fn end_span(&self, error: Option<&str>) -> Result<Span> {
        let mut inner = self.inner.borrow_mut();
        let head = inner.spans[inner.head].clone();
        let parent_id = head.parent_id().ok_or(SpanweaveError::SentinelEnd)?;
        let parent_index = inner
            .spans
            .iter()
            .position(|s| s.id() == parent_id)
            .ok_or(SpanweaveError::MissingParent(parent_id))?;

        if let Some(message) = error {
            head.record_error(message)?;
        }
        head.end();
        inner.head = parent_index;
        Ok(head)
    }

    /// Builds the tree over this context's own spans only.
    pub fn local_span_tree(&self) -> Result<SpanNode> {
        let inner = self.inner.borrow();
        tree::build_local_tree(&inner.spans, &inner.id)
    }

    /// Assembles the full tree across this context and all live forked
    /// descendants. Valid only on a root context.
    ///
    /// Each descendant's global tree is grafted onto every childless
    /// non-sentinel leaf of its parent's local tree; with several qualifying
    /// leaves the subtree is duplicated under each. If no leaf qualifies the
    /// forked subtrees are dropped from the output, so open at least one
    /// span before forking. Do not call concurrently with mutation of any
    /// traversed context; merge after forked work has completed.
    pub fn global_span_tree(&self) -> Result<SpanNode> {
        if self.inner.borrow().parent_id.is_some() {
            return Err(SpanweaveError::NotRoot(self.id()));
        }
        self.assemble_global()
    }

    fn assemble_global(&self) -> Result<SpanNode> {
        let mut local = self.local_span_tree()?;
        let children: Vec<Context> = self
            .inner
            .borrow()
            .children
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| Context { inner })
            .collect();

        let mut subtrees = Vec::with_capacity(children.len());
        for child in &children {
            subtrees.push(child.assemble_global()?);
        }
        tree::attach_subtrees(&mut local, &subtrees);
        Ok(local)
    }

    /// Returns a frozen snapshot of the context and deep copies of its spans.
    pub fn get(&self) -> ContextSnapshot {
        let inner = self.inner.borrow();
        ContextSnapshot {
            trace_id: inner.trace_id.clone(),
            id: inner.id.clone(),
            parent_id: inner.parent_id.clone(),
            created_at: inner.created_at,
            module: inner.module.clone(),
            params: inner.params.clone(),
            root_span_depth: inner.root_span_depth,
            head_span_id: inner.spans[inner.head].id(),
            spans: inner.spans.iter().map(Span::get).collect(),
        }
    }

    /// A logger bound to this context (and no particular span).
    pub fn logger(&self, config: LoggerConfig) -> Logger {
        Logger::bound(config, Some(self.clone()), None)
    }

    pub fn id(&self) -> ContextId {
        self.inner.borrow().id.clone()
    }

    pub fn trace_id(&self) -> TraceId {
        self.inner.borrow().trace_id.clone()
    }

    pub fn module(&self) -> String {
        self.inner.borrow().module.clone()
    }

    pub fn root_span_depth(&self) -> u32 {
        self.inner.borrow().root_span_depth
    }

    /// Handle to the current head span (the sentinel when the stack is empty).
    pub fn head_span(&self) -> Span {
        let inner = self.inner.borrow();
        inner.spans[inner.head].clone()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Context")
            .field("trace_id", &inner.trace_id)
            .field("id", &inner.id)
            .field("module", &inner.module)
            .field("spans", &inner.spans.len())
            .finish()
    }
}

/// Dotted concatenation of module paths. An omitted own module reuses the
/// parent's path verbatim.
fn full_module_path(parent_module: &str, module: Option<&str>) -> String {
    match module {
        None | Some("") => parent_module.to_string(),
        Some(own) if parent_module.is_empty() => own.to_string(),
        Some(own) => format!("{parent_module}.{own}"),
    }
}
