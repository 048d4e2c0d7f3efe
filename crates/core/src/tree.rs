use serde::{Deserialize, Serialize};

use crate::error::{Result, SpanweaveError};
use crate::ids::ContextId;
use crate::model::span::{Span, SpanData};

/// One node of an assembled span tree.
///
/// A query-time projection: built on demand from span snapshots, never held
/// as authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanNode {
    pub span: SpanData,
    pub children: Vec<SpanNode>,
    pub context_id: ContextId,
}

impl SpanNode {
    /// Total number of nodes in this subtree, this node included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SpanNode::node_count).sum::<usize>()
    }
}

/// Builds the local tree over one context's spans.
///
/// Requires exactly one rootless span (the sentinel). Sibling order is the
/// insertion order of the span arena, i.e. chronological `start_span` order.
pub(crate) fn build_local_tree(spans: &[Span], context_id: &ContextId) -> Result<SpanNode> {
    let snapshots: Vec<SpanData> = spans.iter().map(Span::get).collect();
    let roots: Vec<&SpanData> = snapshots
        .iter()
        .filter(|s| s.parent_id.is_none())
        .collect();
    if roots.len() != 1 {
        return Err(SpanweaveError::InvalidTreeState(roots.len()));
    }
    Ok(build_node(roots[0], &snapshots, context_id))
}

fn build_node(span: &SpanData, all: &[SpanData], context_id: &ContextId) -> SpanNode {
    let children = all
        .iter()
        .filter(|s| s.parent_id.as_ref() == Some(&span.id))
        .map(|s| build_node(s, all, context_id))
        .collect();
    SpanNode {
        span: span.clone(),
        children,
        context_id: context_id.clone(),
    }
}

/// Grafts forked-child trees onto a local tree.
///
/// An attachment point is a node with zero children that is not the
/// sentinel. Every attachment point receives a copy of every subtree; when
/// several leaves qualify the subtrees are duplicated under each of them.
/// A node that received subtrees is not walked further.
pub(crate) fn attach_subtrees(node: &mut SpanNode, subtrees: &[SpanNode]) {
    if subtrees.is_empty() {
        return;
    }
    if node.children.is_empty() && !node.span.is_sentinel() {
        node.children.extend_from_slice(subtrees);
    } else {
        for child in &mut node.children {
            attach_subtrees(child, subtrees);
        }
    }
}
