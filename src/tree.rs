//! Permission tree assembly.
//!
//! Flat `permissions` rows are turned into a nested forest, pruned to the ids an
//! admin may see, and finally mapped onto the route objects the console
//! frontend mounts. Every walk uses an explicit queue or stack: walks over raw
//! rows are guarded by a visited set, so a malformed parent graph surfaces as
//! `AppError::MalformedHierarchy`, and walks over built trees are post-order
//! with one frame per open node. Writes keep stored chains within `MAX_DEPTH`
//! so serializing a tree stays shallow.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{PermissionNode, PermissionType},
};

/// The parent id shared by all top-level nodes.
pub const ROOT_PARENT_ID: i64 = 0;

/// Deepest nesting a stored node may have, top-level nodes being at depth 1.
pub const MAX_DEPTH: usize = 16;

/// PermissionTree
///
/// A permission node together with its ordered children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PermissionTree {
    pub id: i64,
    pub parent_id: i64,
    #[serde(rename = "type")]
    pub kind: PermissionType,
    pub title: String,
    pub path: String,
    pub component: String,
    pub perms: String,
    pub icon: String,
    pub sort: i32,
    pub hidden: bool,
    pub is_frame: bool,
    pub children: Vec<PermissionTree>,
}

impl PermissionTree {
    fn leaf(node: &PermissionNode) -> Self {
        PermissionTree {
            id: node.id,
            parent_id: node.parent_id,
            kind: node.kind,
            title: node.title.clone(),
            path: node.path.clone(),
            component: node.component.clone(),
            perms: node.perms.clone(),
            icon: node.icon.clone(),
            sort: node.sort,
            hidden: node.hidden,
            is_frame: node.is_frame,
            children: Vec::new(),
        }
    }

    /// The node without its children.
    pub fn to_node(&self) -> PermissionNode {
        PermissionNode {
            id: self.id,
            parent_id: self.parent_id,
            kind: self.kind,
            title: self.title.clone(),
            path: self.path.clone(),
            component: self.component.clone(),
            perms: self.perms.clone(),
            icon: self.icon.clone(),
            sort: self.sort,
            hidden: self.hidden,
            is_frame: self.is_frame,
        }
    }
}

/// build_tree
///
/// Groups `nodes` by `parent_id` and nests them under `root_parent_id`.
/// Siblings are ordered by `sort`, then `id`. Nodes whose parent chain never
/// reaches the root (missing parent) are left out.
///
/// # Errors
/// `MalformedHierarchy` when an id is reached twice (duplicate id or a loop
/// through the root) or when any parent chain in `nodes` closes on itself.
pub fn build_tree(nodes: &[PermissionNode], root_parent_id: i64) -> AppResult<Vec<PermissionTree>> {
    ensure_acyclic(nodes)?;

    let mut by_parent: HashMap<i64, Vec<&PermissionNode>> = HashMap::new();
    for node in nodes {
        by_parent.entry(node.parent_id).or_default().push(node);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|n| (n.sort, n.id));
    }

    // Breadth-first from the root, recording the visit order.
    let mut visited: HashSet<i64> = HashSet::new();
    let mut order: Vec<&PermissionNode> = Vec::new();
    let mut queue: VecDeque<i64> = VecDeque::from([root_parent_id]);
    while let Some(parent) = queue.pop_front() {
        for &child in by_parent.get(&parent).map(Vec::as_slice).unwrap_or_default() {
            if !visited.insert(child.id) {
                return Err(AppError::MalformedHierarchy(format!(
                    "permission {} is reachable more than once",
                    child.id
                )));
            }
            order.push(child);
            queue.push_back(child.id);
        }
    }

    // Assemble bottom-up: every child is finished before its parent is.
    let mut built: HashMap<i64, PermissionTree> = HashMap::with_capacity(order.len());
    for node in order.iter().rev() {
        let mut subtree = PermissionTree::leaf(node);
        if let Some(children) = by_parent.get(&node.id) {
            subtree.children = children.iter().filter_map(|c| built.remove(&c.id)).collect();
        }
        built.insert(node.id, subtree);
    }

    Ok(by_parent
        .get(&root_parent_id)
        .map(|roots| roots.iter().filter_map(|n| built.remove(&n.id)).collect())
        .unwrap_or_default())
}

/// filter_tree
///
/// Keeps the nodes whose id is in `allowed` plus every ancestor of such a
/// node, so granted leaves stay reachable from the roots. Membership is the
/// only criterion; a node's `perms` string is never consulted.
///
/// Post-order over an explicit stack: a node is judged once all its children
/// have been.
pub fn filter_tree(tree: Vec<PermissionTree>, allowed: &HashSet<i64>) -> Vec<PermissionTree> {
    struct Frame {
        // `None` for the virtual root holding the top-level nodes.
        node: Option<PermissionTree>,
        pending: std::vec::IntoIter<PermissionTree>,
        kept: Vec<PermissionTree>,
    }

    let mut stack = vec![Frame {
        node: None,
        pending: tree.into_iter(),
        kept: Vec::new(),
    }];
    while let Some(frame) = stack.last_mut() {
        match frame.pending.next() {
            Some(mut node) => {
                let children = std::mem::take(&mut node.children);
                stack.push(Frame {
                    node: Some(node),
                    pending: children.into_iter(),
                    kept: Vec::new(),
                });
            }
            None => {
                let Some(Frame { node, kept, .. }) = stack.pop() else {
                    break;
                };
                match (node, stack.last_mut()) {
                    (Some(mut node), Some(parent)) => {
                        if allowed.contains(&node.id) || !kept.is_empty() {
                            node.children = kept;
                            parent.kept.push(node);
                        }
                    }
                    _ => return kept,
                }
            }
        }
    }
    Vec::new()
}

/// Pre-order flattening of a tree back into rows.
pub fn flatten_tree(tree: &[PermissionTree]) -> Vec<PermissionNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&PermissionTree> = tree.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node.to_node());
        stack.extend(node.children.iter().rev());
    }
    out
}

/// All ids strictly below `id`.
pub fn descendants(nodes: &[PermissionNode], id: i64) -> HashSet<i64> {
    let mut by_parent: HashMap<i64, Vec<i64>> = HashMap::new();
    for node in nodes {
        by_parent.entry(node.parent_id).or_default().push(node.id);
    }

    let mut found = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        for &child in by_parent.get(&current).map(Vec::as_slice).unwrap_or_default() {
            if child != id && found.insert(child) {
                stack.push(child);
            }
        }
    }
    found
}

/// depth_of
///
/// Number of nodes on the chain from `id` up to the root, `id` included, so a
/// top-level node has depth 1 and `ROOT_PARENT_ID` depth 0. The walk stops at
/// a missing parent or a repeated id.
pub fn depth_of(nodes: &[PermissionNode], id: i64) -> usize {
    let parent_of: HashMap<i64, i64> = nodes.iter().map(|n| (n.id, n.parent_id)).collect();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut current = id;
    while let Some(&parent) = parent_of.get(&current) {
        if !seen.insert(current) {
            break;
        }
        current = parent;
    }
    seen.len()
}

/// Levels in the subtree rooted at `id`, `id` included.
pub fn subtree_height(nodes: &[PermissionNode], id: i64) -> usize {
    let mut by_parent: HashMap<i64, Vec<i64>> = HashMap::new();
    for node in nodes {
        by_parent.entry(node.parent_id).or_default().push(node.id);
    }

    let mut seen = HashSet::from([id]);
    let mut level = vec![id];
    let mut height = 0;
    while !level.is_empty() {
        height += 1;
        level = level
            .iter()
            .flat_map(|parent| by_parent.get(parent).map(Vec::as_slice).unwrap_or_default())
            .copied()
            .filter(|child| seen.insert(*child))
            .collect();
    }
    height
}

/// Fails when following `parent_id` from any node revisits a node.
pub fn ensure_acyclic(nodes: &[PermissionNode]) -> AppResult<()> {
    let parent_of: HashMap<i64, i64> = nodes.iter().map(|n| (n.id, n.parent_id)).collect();
    // Nodes whose chain is known to end at a root or a missing parent.
    let mut settled: HashSet<i64> = HashSet::new();

    for node in nodes {
        let mut path: HashSet<i64> = HashSet::new();
        let mut current = node.id;
        while parent_of.contains_key(&current) && !settled.contains(&current) {
            if !path.insert(current) {
                return Err(AppError::MalformedHierarchy(format!(
                    "permission {} is its own ancestor",
                    current
                )));
            }
            current = parent_of[&current];
        }
        settled.extend(path);
    }
    Ok(())
}

// --- Frontend routes ---

/// Route metadata consumed by the console's router.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MenuMeta {
    pub icon: Option<String>,
    pub title: String,
    #[serde(rename = "keepAlive")]
    pub keep_alive: bool,
    pub target: bool,
}

/// MenuRoute
///
/// One entry of the dynamic route table sent with `auth/menus`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MenuRoute {
    pub name: String,
    pub path: String,
    pub component: String,
    pub meta: MenuMeta,
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuRoute>,
}

/// Component mounted for directories that do not name one.
pub const ROUTE_VIEW: &str = "RouteView";

/// menu_routes
///
/// Maps a menu tree onto frontend routes. Action nodes are skipped together
/// with anything below them. Built post-order over an explicit stack.
pub fn menu_routes(tree: &[PermissionTree]) -> Vec<MenuRoute> {
    struct Frame<'a> {
        // `None` for the virtual root holding the top-level routes.
        route: Option<MenuRoute>,
        pending: std::slice::Iter<'a, PermissionTree>,
        built: Vec<MenuRoute>,
    }

    let mut stack = vec![Frame {
        route: None,
        pending: tree.iter(),
        built: Vec::new(),
    }];
    while let Some(frame) = stack.last_mut() {
        match frame.pending.next() {
            Some(node) if node.kind.is_navigable() => stack.push(Frame {
                route: Some(route_for(node)),
                pending: node.children.iter(),
                built: Vec::new(),
            }),
            Some(_) => {}
            None => {
                let Some(Frame { route, built, .. }) = stack.pop() else {
                    break;
                };
                match (route, stack.last_mut()) {
                    (Some(mut route), Some(parent)) => {
                        route.children = built;
                        parent.built.push(route);
                    }
                    _ => return built,
                }
            }
        }
    }
    Vec::new()
}

// The route for one node, children left empty.
fn route_for(node: &PermissionTree) -> MenuRoute {
    let component = if node.kind == PermissionType::Directory && node.component.is_empty() {
        ROUTE_VIEW.to_string()
    } else {
        node.component.clone()
    };
    MenuRoute {
        name: node.path.clone(),
        path: node.path.clone(),
        component,
        meta: MenuMeta {
            icon: (!node.icon.is_empty()).then(|| node.icon.clone()),
            title: node.title.clone(),
            keep_alive: false,
            target: node.is_frame,
        },
        hidden: node.hidden,
        children: Vec::new(),
    }
}
