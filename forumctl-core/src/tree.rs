//! Tree materializer: flat depth-tagged batches to navigable post trees
//!
//! The build is a pure function of `(batch, expanded)`. Children are grouped
//! by `parent_post_id` (child points at parent, never the reverse), so a
//! committed batch cannot produce a cycle. Posts whose parent is absent from
//! the batch become roots of the returned forest.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ContextEntry, ContextType, Post};

/// Levels rendered before a "continue thread" affordance replaces children
pub const DEFAULT_RENDER_DEPTH: u32 = 5;

/// Marker left on a node whose subtree was cut by the depth limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinueThread {
    /// Root to re-fetch from
    pub from_post_id: Uuid,
    /// Direct replies waiting below the cut
    pub replies_count: i64,
}

/// A post with its materialized children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostNode {
    pub post: Post,
    pub children: Vec<PostNode>,
    pub has_children: bool,
    pub children_loaded: bool,
    pub is_expanded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_thread: Option<ContinueThread>,
}

impl PostNode {
    fn leaf(post: Post, expanded: &HashSet<Uuid>) -> Self {
        let has_children = post.has_children();
        let is_expanded = expanded.contains(&post.id);
        Self {
            post,
            children: Vec::new(),
            has_children,
            children_loaded: !has_children,
            is_expanded,
            continue_thread: None,
        }
    }

    /// True when expanding this node requires a fetch.
    pub fn needs_fetch(&self) -> bool {
        self.has_children && !self.children_loaded
    }

    /// Every direct reply the post reports is present as a child.
    fn is_fully_loaded(&self) -> bool {
        self.children.len() as i64 >= self.post.replies_count
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

fn chronological(a: &Post, b: &Post) -> std::cmp::Ordering {
    a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id))
}

/// Build a forest from a flat batch.
///
/// Every children list (and the root list) is ordered by ascending creation
/// time, ties broken by id. Duplicate ids keep their first occurrence.
pub fn build_tree(batch: &[Post], expanded: &HashSet<Uuid>) -> Vec<PostNode> {
    // pass 1: id -> index
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(batch.len());
    for (i, post) in batch.iter().enumerate() {
        index.entry(post.id).or_insert(i);
    }

    // pass 2: group under parents present in the batch
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); batch.len()];
    let mut roots: Vec<usize> = Vec::new();
    for (i, post) in batch.iter().enumerate() {
        if index.get(&post.id) != Some(&i) {
            continue;
        }
        match post.parent_post_id.and_then(|p| index.get(&p)) {
            Some(&parent) if parent != i => children[parent].push(i),
            _ => roots.push(i),
        }
    }

    roots.sort_by(|&a, &b| chronological(&batch[a], &batch[b]));
    for list in children.iter_mut() {
        list.sort_by(|&a, &b| chronological(&batch[a], &batch[b]));
    }

    // breadth-first order from the roots, then assemble bottom-up
    let mut order = roots.clone();
    let mut cursor = 0;
    while cursor < order.len() {
        let i = order[cursor];
        order.extend(children[i].iter().copied());
        cursor += 1;
    }

    let mut built: Vec<Option<PostNode>> = vec![None; batch.len()];
    for &i in order.iter().rev() {
        let mut node = PostNode::leaf(batch[i].clone(), expanded);
        node.children = children[i]
            .iter()
            .filter_map(|&c| built[c].take())
            .collect();
        node.children_loaded = node.is_fully_loaded();
        built[i] = Some(node);
    }

    roots.iter().filter_map(|&r| built[r].take()).collect()
}

/// Cut the forest after `max_depth` levels (roots are level 1).
///
/// A node on the last level that still has replies loses its children and
/// gets a [`ContinueThread`] carrying its reply count. A shallower node whose
/// batch held only some of its replies keeps those and gets the marker too.
pub fn limit_depth(nodes: &mut [PostNode], max_depth: u32) {
    let max_depth = max_depth.max(1);
    for node in nodes {
        limit_node(node, 1, max_depth);
    }
}

fn limit_node(node: &mut PostNode, level: u32, max_depth: u32) {
    if level >= max_depth {
        if node.has_children {
            node.continue_thread = Some(ContinueThread {
                from_post_id: node.post.id,
                replies_count: node.post.replies_count,
            });
            node.children.clear();
            node.children_loaded = false;
        }
        return;
    }
    // a truncated batch left some replies behind
    if node.needs_fetch() {
        node.continue_thread = Some(ContinueThread {
            from_post_id: node.post.id,
            replies_count: node.post.replies_count,
        });
    }
    for child in &mut node.children {
        limit_node(child, level + 1, max_depth);
    }
}

/// Build and depth-limit in one step.
pub fn materialize(batch: &[Post], expanded: &HashSet<Uuid>, max_depth: u32) -> Vec<PostNode> {
    let mut forest = build_tree(batch, expanded);
    limit_depth(&mut forest, max_depth);
    forest
}

/// Find a node anywhere in the forest.
pub fn find_node_mut(nodes: &mut [PostNode], id: Uuid) -> Option<&mut PostNode> {
    let mut stack: Vec<&mut PostNode> = nodes.iter_mut().collect();
    while let Some(node) = stack.pop() {
        if node.post.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter_mut());
    }
    None
}

/// Attach a lazily fetched batch below `parent_id`.
///
/// Only posts (transitively) under `parent_id` are kept. The node is marked
/// expanded and loaded so later toggles don't fetch again. Returns `false`
/// when the parent isn't in the forest.
pub fn graft_children(
    nodes: &mut [PostNode],
    parent_id: Uuid,
    batch: &[Post],
    expanded: &HashSet<Uuid>,
) -> bool {
    let Some(parent) = find_node_mut(nodes, parent_id) else {
        return false;
    };

    // the batch may carry the parent itself as its root
    let mut children = Vec::new();
    for node in build_tree(batch, expanded) {
        if node.post.id == parent_id {
            children.extend(node.children);
        } else if node.post.parent_post_id == Some(parent_id) {
            children.push(node);
        }
    }
    parent.children = children;
    parent.children_loaded = parent.is_fully_loaded();
    parent.is_expanded = true;
    parent.continue_thread = None;
    true
}

/// Flip a post's membership in the caller-owned expansion set.
///
/// Returns the new expanded state.
pub fn toggle_expanded(expanded: &mut HashSet<Uuid>, id: Uuid) -> bool {
    if expanded.remove(&id) {
        false
    } else {
        expanded.insert(id);
        true
    }
}

/// Assemble a context response: ancestors root-first, the target, then its
/// siblings in creation order.
pub fn post_context(target: Post, ancestors: Vec<Post>, siblings: Vec<Post>) -> Vec<ContextEntry> {
    let mut ancestors = ancestors;
    ancestors.sort_by_key(|p| p.depth);

    let mut siblings: Vec<Post> = siblings.into_iter().filter(|p| p.id != target.id).collect();
    siblings.sort_by(chronological);

    let mut entries = Vec::with_capacity(ancestors.len() + siblings.len() + 1);
    entries.extend(ancestors.into_iter().map(|post| ContextEntry {
        post,
        context_type: ContextType::Ancestor,
    }));
    entries.push(ContextEntry {
        post: target,
        context_type: ContextType::Target,
    });
    entries.extend(siblings.into_iter().map(|post| ContextEntry {
        post,
        context_type: ContextType::Sibling,
    }));
    entries
}

/// Ids of posts breaking the depth rule relative to parents in the batch.
pub fn depth_violations(batch: &[Post]) -> Vec<Uuid> {
    let depths: HashMap<Uuid, i32> = batch.iter().map(|p| (p.id, p.depth)).collect();
    batch
        .iter()
        .filter(|p| match p.parent_post_id {
            None => p.depth != 0,
            Some(parent) => depths.get(&parent).is_some_and(|d| p.depth != d + 1),
        })
        .map(|p| p.id)
        .collect()
}
