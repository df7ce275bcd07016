mod common;

use std::collections::HashSet;

use common::{node, seed_permissions};
use rbac_admin::{
    AppError,
    models::{PermissionNode, PermissionType},
    tree::{
        PermissionTree, ROOT_PARENT_ID, ROUTE_VIEW, build_tree, depth_of, descendants,
        filter_tree, flatten_tree, menu_routes, subtree_height,
    },
};

fn ids(tree: &[PermissionTree]) -> Vec<i64> {
    tree.iter().map(|n| n.id).collect()
}

fn id_set(nodes: &[PermissionNode]) -> HashSet<i64> {
    nodes.iter().map(|n| n.id).collect()
}

#[test]
fn test_build_tree_keeps_every_reachable_node() {
    let nodes = seed_permissions();
    let tree = build_tree(&nodes, ROOT_PARENT_ID).unwrap();

    assert_eq!(ids(&tree), vec![2]);
    assert_eq!(id_set(&flatten_tree(&tree)), id_set(&nodes));
}

#[test]
fn test_build_tree_orders_siblings_by_sort_then_id() {
    let tree = build_tree(&seed_permissions(), ROOT_PARENT_ID).unwrap();
    let system = &tree[0];

    // 4 and 5 share sort 3, so id breaks the tie.
    assert_eq!(ids(&system.children), vec![3, 4, 5]);
    assert_eq!(
        ids(&system.children[0].children),
        vec![6, 7, 122, 8, 96, 36, 121]
    );
}

#[test]
fn test_build_tree_skips_nodes_with_missing_parent() {
    let mut nodes = seed_permissions();
    nodes.push(node(500, 999, PermissionType::Menu, 0));

    let tree = build_tree(&nodes, ROOT_PARENT_ID).unwrap();
    let flat = id_set(&flatten_tree(&tree));

    assert!(!flat.contains(&500));
    assert_eq!(flat.len(), seed_permissions().len());
}

#[test]
fn test_build_tree_rejects_cycle() {
    let nodes = vec![
        node(1, 0, PermissionType::Directory, 0),
        node(10, 11, PermissionType::Menu, 0),
        node(11, 10, PermissionType::Menu, 0),
    ];

    let result = build_tree(&nodes, ROOT_PARENT_ID);

    assert!(matches!(result, Err(AppError::MalformedHierarchy(_))));
}

#[test]
fn test_build_tree_rejects_self_parent() {
    let nodes = vec![
        node(1, 0, PermissionType::Directory, 0),
        node(5, 5, PermissionType::Menu, 0),
    ];

    assert!(matches!(
        build_tree(&nodes, ROOT_PARENT_ID),
        Err(AppError::MalformedHierarchy(_))
    ));
}

#[test]
fn test_build_tree_rejects_duplicate_ids() {
    let nodes = vec![
        node(1, 0, PermissionType::Directory, 0),
        node(2, 1, PermissionType::Menu, 0),
        node(2, 1, PermissionType::Menu, 1),
    ];

    assert!(matches!(
        build_tree(&nodes, ROOT_PARENT_ID),
        Err(AppError::MalformedHierarchy(_))
    ));
}

#[test]
fn test_filter_tree_keeps_ancestors_of_allowed_nodes() {
    let nodes = vec![
        node(1, 0, PermissionType::Directory, 0),
        node(2, 1, PermissionType::Menu, 0),
        node(3, 1, PermissionType::Menu, 0),
    ];
    let tree = build_tree(&nodes, ROOT_PARENT_ID).unwrap();

    let filtered = filter_tree(tree, &HashSet::from([3]));

    assert_eq!(ids(&filtered), vec![1]);
    assert_eq!(ids(&filtered[0].children), vec![3]);
    assert!(filtered[0].children[0].children.is_empty());
}

#[test]
fn test_filter_tree_with_empty_and_full_sets() {
    let nodes = seed_permissions();
    let tree = build_tree(&nodes, ROOT_PARENT_ID).unwrap();

    assert!(filter_tree(tree.clone(), &HashSet::new()).is_empty());
    assert_eq!(filter_tree(tree.clone(), &id_set(&nodes)), tree);
}

#[test]
fn test_filter_tree_ignores_perms_strings() {
    // Directory 2 and menu 3 carry no perms, but they lead to the granted action.
    let tree = build_tree(&seed_permissions(), ROOT_PARENT_ID).unwrap();

    let filtered = filter_tree(tree, &HashSet::from([7]));
    let flat: Vec<i64> = flatten_tree(&filtered).iter().map(|n| n.id).collect();

    assert_eq!(flat, vec![2, 3, 7]);
}

#[test]
fn test_depth_and_subtree_height() {
    let nodes = seed_permissions();

    assert_eq!(depth_of(&nodes, ROOT_PARENT_ID), 0);
    assert_eq!(depth_of(&nodes, 2), 1);
    assert_eq!(depth_of(&nodes, 7), 3);
    assert_eq!(depth_of(&nodes, 999), 0);
    assert_eq!(subtree_height(&nodes, 2), 3);
    assert_eq!(subtree_height(&nodes, 3), 2);
    assert_eq!(subtree_height(&nodes, 7), 1);
}

#[test]
fn test_descendants_excludes_the_node_itself() {
    let nodes = seed_permissions();

    let below = descendants(&nodes, 4);

    assert_eq!(below, HashSet::from([9, 37, 38, 39, 93]));
    assert!(descendants(&nodes, 7).is_empty());
}

#[test]
fn test_menu_routes_maps_navigable_nodes() {
    let menus: Vec<PermissionNode> = seed_permissions()
        .into_iter()
        .filter(|n| n.kind.is_navigable())
        .collect();
    let tree = build_tree(&menus, ROOT_PARENT_ID).unwrap();

    let routes = menu_routes(&tree);

    assert_eq!(routes.len(), 1);
    let system = &routes[0];
    assert_eq!(system.path, "/system");
    assert_eq!(system.name, "/system");
    assert_eq!(system.component, ROUTE_VIEW);
    assert_eq!(system.meta.icon.as_deref(), Some("solution"));

    let users = &system.children[0];
    assert_eq!(users.component, "SystemUserPage");
    assert_eq!(users.meta.icon, None);
    assert!(users.children.is_empty());

    let json = serde_json::to_value(users).unwrap();
    assert!(json.get("children").is_none());
    assert_eq!(json["meta"]["keepAlive"], false);
}

#[test]
fn test_menu_routes_skips_actions() {
    let tree = build_tree(&seed_permissions(), ROOT_PARENT_ID).unwrap();

    let routes = menu_routes(&tree);
    let users = &routes[0].children[0];

    assert!(users.children.is_empty());
}

// --- Deep hierarchies ---

/// A single chain 1 -> 2 -> ... -> `len`, every node a menu.
fn chain(len: i64) -> Vec<PermissionNode> {
    (1..=len)
        .map(|id| PermissionNode {
            path: format!("/n{}", id),
            ..node(id, id - 1, PermissionType::Menu, 0)
        })
        .collect()
}

fn depth(tree: &[PermissionTree]) -> usize {
    let mut depth = 0;
    let mut level: Vec<&PermissionTree> = tree.iter().collect();
    while !level.is_empty() {
        depth += 1;
        level = level.iter().flat_map(|n| n.children.iter()).collect();
    }
    depth
}

#[test]
fn test_deep_chain_filters_and_maps_without_recursion() {
    let nodes = chain(1_000);
    let tree = build_tree(&nodes, ROOT_PARENT_ID).unwrap();
    assert_eq!(depth(&tree), 1_000);

    let filtered = filter_tree(tree, &HashSet::from([1_000]));
    assert_eq!(depth(&filtered), 1_000);
    assert_eq!(flatten_tree(&filtered).len(), 1_000);

    let routes = menu_routes(&filtered);
    let mut route_depth = 0;
    let mut level: Vec<_> = routes.iter().collect();
    while !level.is_empty() {
        route_depth += 1;
        level = level.iter().flat_map(|r| r.children.iter()).collect();
    }
    assert_eq!(route_depth, 1_000);
    assert_eq!(depth_of(&nodes, 1_000), 1_000);
}

#[test]
fn test_deep_chain_pruned_when_leaf_not_allowed() {
    let nodes = chain(1_000);
    let tree = build_tree(&nodes, ROOT_PARENT_ID).unwrap();

    let filtered = filter_tree(tree, &HashSet::from([10]));

    assert_eq!(depth(&filtered), 10);
    assert_eq!(flatten_tree(&filtered).last().map(|n| n.id), Some(10));
}
