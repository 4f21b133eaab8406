//! Model-level tests: editing invariants, cleanup behavior, optimization
//! scenarios, the molecule pipeline, and document round trips.

use proptest::prelude::*;

use crate::error::Error;
use crate::geom::Vec2;
use crate::nlco::Nlco;
use crate::optim::{EdgeOptimizer, ScaleOptimizer, StrainOptimizer};
use crate::tol::DIST_TOL;
use crate::tree::parts::{CreaseKind, FacetColor, Fold};
use crate::tree::status::CpStatus;
use crate::tree::{NodeId, Tree};
use crate::{io, tree::EdgeId};

/// A star: one central branch node with `leaves` unit edges.
fn make_star(leaves: &[Vec2]) -> (Tree, NodeId, Vec<NodeId>, Vec<EdgeId>) {
    let mut tree = Tree::new();
    let mut center_loc = Vec2::zeros();
    for &l in leaves {
        center_loc += l;
    }
    center_loc /= leaves.len() as f64;
    let (center, _) = tree.add_node(None, center_loc);
    let mut leaf_ids = Vec::new();
    let mut edge_ids = Vec::new();
    for &loc in leaves {
        let (n, e) = tree.add_node(Some(center), loc);
        leaf_ids.push(n);
        edge_ids.push(e.unwrap());
    }
    (tree, center, leaf_ids, edge_ids)
}

fn assert_structural_invariants(tree: &Tree) {
    // n tree nodes pair into exactly n(n-1)/2 tree paths.
    let n = tree.owned_nodes().len();
    assert_eq!(tree.owned_paths().len(), n * n.saturating_sub(1) / 2);

    // Each edge's endpoints share exactly that one edge record.
    for &e in tree.owned_edges() {
        let edge = tree.edge(e);
        let shared = tree
            .node(edge.nodes[0])
            .edges
            .iter()
            .filter(|&&e2| tree.edge(e2).nodes.contains(&edge.nodes[1]))
            .count();
        assert_eq!(shared, 1);
    }

    // Leaf nodes carry one edge; branch nodes at least two; leaves cache at
    // least one leaf path (in a tree with more than one node).
    for &nid in tree.owned_nodes() {
        let node = tree.node(nid);
        if node.is_leaf_node {
            assert_eq!(node.edges.len(), 1);
            if n > 1 {
                assert!(!node.leaf_paths.is_empty());
            }
        } else {
            assert!(node.edges.len() >= 2);
        }
    }

    // Path minimum length is the sum of its strained edge lengths.
    for &p in tree.owned_paths() {
        let path = tree.path(p);
        let sum: f64 = path
            .edges
            .iter()
            .map(|&e| tree.edge(e).strained_length())
            .sum();
        assert!((path.min_tree_length - sum).abs() < 1e-12);
    }
}

#[test]
fn star_counts_and_invariants() {
    let (tree, center, leaves, _) = make_star(&[
        Vec2::new(0.1, 0.1),
        Vec2::new(0.9, 0.1),
        Vec2::new(0.5, 0.9),
        Vec2::new(0.1, 0.9),
    ]);
    assert_eq!(tree.owned_nodes().len(), 5);
    assert_eq!(tree.owned_edges().len(), 4);
    assert_eq!(tree.owned_paths().len(), 10);
    assert_eq!(tree.leaf_paths().len(), 6);
    assert!(!tree.node(center).is_leaf_node);
    for n in leaves {
        assert!(tree.node(n).is_leaf_node);
    }
    assert_structural_invariants(&tree);
}

#[test]
fn split_then_absorb_restores_structure() {
    let (mut tree, _, _, edges) = make_star(&[
        Vec2::new(0.1, 0.1),
        Vec2::new(0.9, 0.1),
        Vec2::new(0.5, 0.9),
    ]);
    let num_nodes = tree.owned_nodes().len();
    let num_edges = tree.owned_edges().len();
    let num_paths = tree.owned_paths().len();
    let total_length: f64 = tree
        .owned_edges()
        .iter()
        .map(|&e| tree.edge(e).strained_length())
        .sum();

    let new_node = tree.split_edge(edges[0], 0.4).unwrap();
    assert_eq!(tree.owned_nodes().len(), num_nodes + 1);
    assert_eq!(tree.owned_edges().len(), num_edges + 1);
    assert_structural_invariants(&tree);

    tree.absorb_node(new_node).unwrap();
    assert_eq!(tree.owned_nodes().len(), num_nodes);
    assert_eq!(tree.owned_edges().len(), num_edges);
    assert_eq!(tree.owned_paths().len(), num_paths);
    let total_after: f64 = tree
        .owned_edges()
        .iter()
        .map(|&e| tree.edge(e).strained_length())
        .sum();
    assert!((total_length - total_after).abs() < 1e-12);
    assert_structural_invariants(&tree);
}

#[test]
fn split_edge_rejects_ends() {
    let (mut tree, _, _, edges) = make_star(&[Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.1)]);
    let before = io::write_to_string(&tree);
    assert!(matches!(
        tree.split_edge(edges[0], 0.0),
        Err(Error::BadSplitEdge)
    ));
    assert!(matches!(
        tree.split_edge(edges[0], 1.0),
        Err(Error::BadSplitEdge)
    ));
    assert!(matches!(
        tree.split_edge(edges[0], 1.5),
        Err(Error::BadSplitEdge)
    ));
    // A failed precondition leaves the tree untouched.
    assert_eq!(io::write_to_string(&tree), before);
}

#[test]
fn node_locations_clamp_to_paper() {
    let (mut tree, _, leaves, _) = make_star(&[Vec2::new(0.2, 0.2), Vec2::new(0.8, 0.2)]);
    tree.set_node_locs(&[leaves[0]], &[Vec2::new(-0.5, 1.7)]);
    let loc = tree.node(leaves[0]).loc;
    assert_eq!(loc.x, 0.0);
    assert_eq!(loc.y, 1.0);
}

#[test]
fn empty_tree_reports_polys_not_valid() {
    let mut tree = Tree::make_tree_blank();
    assert_eq!(tree.cp_status(), CpStatus::PolysNotValid);
}

#[test]
fn short_edge_reported_with_the_edge() {
    let (mut tree, _, _, edges) = make_star(&[Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.1)]);
    tree.set_edge_lengths(&[edges[0]], 0.001);
    match tree.cp_status() {
        CpStatus::EdgesTooShort { edges: short } => assert_eq!(short, vec![edges[0]]),
        other => panic!("expected EdgesTooShort, got {other:?}"),
    }
}

#[test]
fn strain_relief_laws() {
    let (mut tree, _, _, edges) = make_star(&[
        Vec2::new(0.1, 0.1),
        Vec2::new(0.9, 0.1),
        Vec2::new(0.5, 0.9),
    ]);
    tree.with_cleanup(|t| {
        t.edge_mut(edges[0]).strain = 0.25;
        t.edge_mut(edges[1]).strain = -0.1;
    });
    let strained: Vec<f64> = edges
        .iter()
        .map(|&e| tree.edge(e).strained_length())
        .collect();

    tree.relieve_all_strain();
    for (&e, &len) in edges.iter().zip(&strained) {
        assert_eq!(tree.edge(e).strain, 0.0);
        assert!((tree.edge(e).length - len).abs() < 1e-12);
    }

    tree.with_cleanup(|t| t.edge_mut(edges[2]).strain = 0.5);
    tree.remove_all_strain();
    for &e in &edges {
        assert_eq!(tree.edge(e).strain, 0.0);
    }
}

#[test]
fn cleanup_is_idempotent() {
    let mut tree = Tree::make_tree_unoptimized();
    let first = io::write_to_string(&tree);
    tree.with_cleanup(|_| ());
    let second = io::write_to_string(&tree);
    assert_eq!(first, second);
}

#[test]
fn root_depth_is_zero_and_node_depths_accumulate() {
    let mut tree = Tree::make_tree_optimized();
    tree.build_polys_and_crease_pattern();
    let root = tree.root_node();
    assert_eq!(tree.node(root).index, 1);
    if tree.is_polygon_filled() {
        assert_eq!(tree.node(root).depth, 0.0);
        for &n in tree.owned_nodes() {
            if n == root {
                continue;
            }
            let path = tree.get_path(root, n);
            assert!((tree.node(n).depth - tree.path(path).min_paper_length).abs() < 1e-9);
        }
    }
}

// ---- scenario: three-star scale optimization ------------------------------

#[test]
fn three_star_scale_optimization() {
    let (mut tree, _, _, _) = make_star(&[
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.5, 0.866),
    ]);
    tree.set_scale(0.2);

    let mut nlco = Nlco::new();
    let mut opt = ScaleOptimizer::new(&tree);
    opt.initialize(&tree, &mut nlco);
    opt.optimize(&mut tree, &mut nlco).unwrap();

    // The optimizer must do at least as well as the symmetric optimum of
    // 1/sqrt(12), and every leaf path must come out feasible with at least
    // one active.
    assert!(
        tree.scale() >= 1.0 / 12.0f64.sqrt() - 1.0e-4,
        "scale = {}",
        tree.scale()
    );
    assert!(tree.is_feasible());
    let mut any_active = false;
    for p in tree.leaf_paths() {
        let path = tree.path(p);
        assert!(path.act_paper_length >= path.min_paper_length - DIST_TOL);
        any_active |= path.is_active_path;
    }
    assert!(any_active);
}

// ---- scenario: symmetric centipede ----------------------------------------

/// Eight-leaf centipede: a four-node spine, each spine node carrying a left
/// and right leg, paired across the vertical symmetry line.
fn make_centipede() -> (Tree, Vec<(NodeId, NodeId)>) {
    let mut tree = Tree::new();
    let (s1, _) = tree.add_node(None, Vec2::new(0.5, 0.2));
    let (s2, _) = tree.add_node(Some(s1), Vec2::new(0.5, 0.4));
    let (s3, _) = tree.add_node(Some(s2), Vec2::new(0.5, 0.6));
    let (s4, _) = tree.add_node(Some(s3), Vec2::new(0.5, 0.8));
    let spine = [s1, s2, s3, s4];
    let mut pairs = Vec::new();
    for (i, &s) in spine.iter().enumerate() {
        let y = 0.2 + 0.2 * i as f64;
        let (left, _) = tree.add_node(Some(s), Vec2::new(0.15, y + 0.07));
        let (right, _) = tree.add_node(Some(s), Vec2::new(0.82, y - 0.04));
        pairs.push((left, right));
    }
    tree.set_symmetry(Vec2::new(0.5, 0.5), 90.0);
    for &(l, r) in &pairs {
        tree.with_cleanup(|t| {
            t.add_condition(crate::tree::conditions::Condition::new(
                crate::tree::conditions::ConditionKind::NodesPaired { node1: l, node2: r },
            ));
        });
    }
    tree.set_scale(0.1);
    (tree, pairs)
}

#[test]
fn centipede_scale_optimization_keeps_symmetry() {
    let (mut tree, pairs) = make_centipede();

    let mut nlco = Nlco::new();
    let mut opt = ScaleOptimizer::new(&tree);
    opt.initialize(&tree, &mut nlco);
    opt.optimize(&mut tree, &mut nlco).unwrap();

    assert!(tree.has_symmetry());
    assert!(tree.is_feasible());
    for &(l, r) in &pairs {
        let ll = tree.node(l).loc;
        let rl = tree.node(r).loc;
        // Mirrored about the vertical line x = 0.5.
        assert!(
            (ll.x + rl.x - 1.0).abs() < 1.0e-5,
            "midpoint off the line: {} {}",
            ll.x,
            rl.x
        );
        assert!((ll.y - rl.y).abs() < 1.0e-5, "heights differ");
    }
}

// ---- scenario: stub round trip --------------------------------------------

#[test]
fn stub_add_remove_round_trip() {
    let mut tree = Tree::new();
    let (n1, _) = tree.add_node(None, Vec2::new(0.2, 0.5));
    let (_n2, e) = tree.add_node(Some(n1), Vec2::new(0.8, 0.5));
    let e = e.unwrap();
    assert_eq!(tree.edge(e).length, 1.0);

    let (_stub_node, stub_edge) = tree.add_stub(e, 0.5, 0.3, Vec2::new(0.3, 0.1)).unwrap();
    assert_eq!(tree.owned_nodes().len(), 4);
    assert_eq!(tree.owned_edges().len(), 3);
    assert_eq!(tree.leaf_paths().len(), 3);
    assert_structural_invariants(&tree);

    let merged = tree.remove_stub(stub_edge).unwrap();
    assert!(merged.is_some());
    assert_eq!(tree.owned_nodes().len(), 2);
    assert_eq!(tree.owned_edges().len(), 1);
    assert_eq!(tree.leaf_paths().len(), 1);
    let survivor = tree.owned_edges()[0];
    assert_eq!(tree.edge(survivor).strain, 0.0);
    assert!((tree.edge(survivor).length - 1.0).abs() < 1e-12);
}

#[test]
fn remove_stub_rejects_non_stub() {
    let (mut tree, _, _, edges) = make_star(&[Vec2::new(0.1, 0.1), Vec2::new(0.9, 0.1)]);
    // Both endpoints of a two-leaf star's edge... are leaves; a three-leaf
    // star's edges are stubs. Use a leaf-leaf edge from a two-node tree.
    let mut two = Tree::new();
    let (a, _) = two.add_node(None, Vec2::new(0.1, 0.1));
    let (_b, e) = two.add_node(Some(a), Vec2::new(0.9, 0.1));
    assert!(matches!(
        two.remove_stub(e.unwrap()),
        Err(Error::BadRemoveStub)
    ));
    // And a proper stub is removable.
    assert!(tree.remove_stub(edges[0]).is_ok());
}

// ---- the molecule pipeline -------------------------------------------------

/// A three-star scaled so all three leaf paths are exactly active: the
/// classic single-triangle molecule.
fn make_active_three_star() -> Tree {
    let h = 3.0f64.sqrt() / 2.0;
    let (mut tree, _, _, _) = make_star(&[
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.5, h),
    ]);
    tree.set_scale(0.5);
    tree
}

#[test]
fn three_star_builds_full_crease_pattern() {
    let mut tree = make_active_three_star();
    assert!(tree.is_feasible());
    for p in tree.leaf_paths() {
        assert!(tree.path(p).is_active_path);
    }

    tree.build_polys_and_crease_pattern();

    assert!(tree.is_polygon_valid());
    assert!(tree.is_polygon_filled());
    assert!(tree.is_vertex_depth_valid());
    assert!(tree.is_facet_data_valid());
    assert!(tree.is_local_root_connectable());
    assert!(tree.has_full_cp());
    assert_eq!(tree.cp_status(), CpStatus::HasFullCp);

    // One triangle, filled with the rabbit-ear molecule: six facets.
    assert_eq!(tree.owned_polys().len(), 1);
    assert_eq!(tree.facets.len(), 6);

    // Every facet is well formed (axial bottom), colored, and ordered.
    let mut orders: Vec<usize> = Vec::new();
    for (_, f) in tree.facets.iter() {
        assert!(f.is_well_formed);
        assert!(f.vertices.len() >= 3);
        assert_eq!(f.vertices.len(), f.creases.len());
        assert!(tree.crease(f.creases[0]).kind.is_axial_or_gusset());
        assert_ne!(f.color, FacetColor::NotOriented);
        orders.push(f.order);
    }
    orders.sort_unstable();
    assert_eq!(orders, (0..6).collect::<Vec<_>>());

    // Exactly one source and one sink in the ordering graph.
    let sources = tree
        .facets
        .iter()
        .filter(|(_, f)| f.is_source_facet())
        .count();
    let sinks = tree.facets.iter().filter(|(_, f)| f.is_sink_facet()).count();
    assert_eq!(sources, 1);
    assert_eq!(sinks, 1);

    // Fold assignment: border creases are Border, interior creases are
    // assigned, and the folded hinges got a direction.
    for (_, c) in tree.creases.iter() {
        if c.fwd_facet.is_none() || c.bkd_facet.is_none() {
            assert_eq!(c.fold, Fold::Border);
        } else if c.kind == CreaseKind::FoldedHinge {
            assert!(matches!(c.fold, Fold::Mountain | Fold::Valley));
        }
    }

    // The three hinges of the rabbit ear are folded hinges.
    let folded = tree
        .creases
        .iter()
        .filter(|(_, c)| c.kind == CreaseKind::FoldedHinge)
        .count();
    assert_eq!(folded, 3);

    // Every facet belongs to some edge's corridor.
    for (_, f) in tree.facets.iter() {
        assert!(f.corridor_edge.is_some());
    }
}

#[test]
fn moving_a_node_invalidates_the_molecule() {
    let mut tree = make_active_three_star();
    tree.build_polys_and_crease_pattern();
    assert!(tree.has_full_cp());

    let leaf = *tree
        .owned_nodes()
        .iter()
        .find(|&&n| tree.node(n).is_leaf_node)
        .unwrap();
    let loc = tree.node(leaf).loc;
    tree.set_node_locs(&[leaf], &[loc + Vec2::new(0.05, 0.05)]);
    // The poly died with the move; the crease pattern is gone.
    assert!(!tree.is_polygon_filled());
    assert!(!tree.has_full_cp());
    assert_eq!(tree.owned_polys().len(), 0);
}

// ---- serialization ---------------------------------------------------------

#[test]
fn v5_round_trip_preserves_everything() {
    let tree = Tree::make_tree_conditioned();
    let text = io::write_to_string(&tree);
    let mut copy = Tree::new();
    io::read_from_string(&mut copy, &text).unwrap();
    assert_eq!(io::write_to_string(&copy), text);
    assert_eq!(copy.owned_nodes().len(), tree.owned_nodes().len());
    assert_eq!(copy.conditions.len(), tree.conditions.len());
}

#[test]
fn v5_round_trip_with_crease_pattern() {
    let mut tree = make_active_three_star();
    tree.build_polys_and_crease_pattern();
    assert!(tree.has_full_cp());
    let text = io::write_to_string(&tree);
    let mut copy = Tree::new();
    io::read_from_string(&mut copy, &text).unwrap();
    assert!(copy.has_full_cp());
    assert_eq!(io::write_to_string(&copy), text);
}

#[test]
fn carriage_return_input_is_tolerated() {
    let tree = Tree::make_tree_conditioned();
    let text = io::write_to_string(&tree);
    let crlf = text.replace('\n', "\r\n");
    let mut copy = Tree::new();
    io::read_from_string(&mut copy, &crlf).unwrap();
    assert_eq!(io::write_to_string(&copy), text);
}

#[test]
fn legacy_nan_token_reads_as_zero() {
    let tree = Tree::make_tree_blank();
    let text = io::write_to_string(&tree);
    // The scale is the third float line of the header.
    let scale_line = format!("{:.10}", tree.scale());
    let hacked = text.replacen(&scale_line, "NAN(017)", 1);
    assert_ne!(hacked, text);
    let mut copy = Tree::new();
    io::read_from_string(&mut copy, &hacked).unwrap();
    assert_eq!(copy.scale(), 0.0);
}

#[test]
fn unknown_condition_tags_are_skipped_and_counted() {
    let tree = Tree::make_tree_conditioned();
    let num_conditions = tree.conditions.len();
    let text = io::write_to_string(&tree);
    // Disguise the paired-nodes condition as an unknown type with the same
    // body shape.
    let hacked = text.replace("CNpn", "CNzz");
    let mut copy = Tree::new();
    match io::read_from_string(&mut copy, &hacked) {
        Err(Error::Io(crate::error::IoError::UnrecognizedConditions(1))) => {}
        other => panic!("expected one skipped condition, got {other:?}"),
    }
    // The rest of the document loaded.
    assert_eq!(copy.owned_nodes().len(), tree.owned_nodes().len());
    assert_eq!(copy.conditions.len(), num_conditions - 1);
}

#[test]
fn bad_documents_leave_the_tree_blank() {
    let mut tree = Tree::make_tree_conditioned();
    assert!(matches!(
        io::read_from_string(&mut tree, "nonsense"),
        Err(Error::Io(crate::error::IoError::BadTreeTag(_)))
    ));
    assert_eq!(tree.owned_nodes().len(), 0);

    let mut tree = Tree::make_tree_conditioned();
    assert!(matches!(
        io::read_from_string(&mut tree, "tree\n9.9\n"),
        Err(Error::Io(crate::error::IoError::BadTreeVersion(_)))
    ));
    assert_eq!(tree.owned_nodes().len(), 0);
}

#[test]
fn v4_export_uses_classic_line_endings() {
    let tree = Tree::make_tree_conditioned();
    let mut out = Vec::new();
    io::export_v4(&tree, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.starts_with("tree\r4.0\r"));
    assert!(!text.contains('\n'));

    // And the export reads back in.
    let mut copy = Tree::new();
    io::read_from_string(&mut copy, &text).unwrap();
    assert_eq!(copy.owned_nodes().len(), tree.owned_nodes().len());
    assert_eq!(copy.conditions.len(), tree.conditions.len());
}

#[test]
fn clone_via_serialization_is_deep() {
    let mut tree = Tree::make_tree_unoptimized();
    let copy = tree.clone_via_serialization().unwrap();
    let before = io::write_to_string(&copy);
    tree.perturb_all_nodes();
    // The clone does not follow the original.
    assert_eq!(io::write_to_string(&copy), before);
}

// ---- edge and strain optimization -----------------------------------------

#[test]
fn edge_optimization_grows_strain_on_slack_tree() {
    // A two-leg star with lots of slack paper: the common strain can grow.
    let (mut tree, _, _, _) = make_star(&[Vec2::new(0.1, 0.5), Vec2::new(0.9, 0.5)]);
    tree.set_scale(0.1);

    let nodes = tree.owned_nodes().to_vec();
    let edges = tree.owned_edges().to_vec();
    let mut nlco = Nlco::new();
    let mut opt = EdgeOptimizer::new(&tree);
    opt.initialize(&tree, &mut nlco, nodes, edges).unwrap();
    opt.optimize(&mut tree, &mut nlco).unwrap();

    let strain = tree.edge(tree.owned_edges()[0]).strain;
    assert!(strain > 0.0, "strain = {strain}");
    assert!(tree.is_feasible());
}

#[test]
fn strain_optimization_relaxes_infeasible_tree() {
    // Leaves too close for the scale: negative strain must appear.
    let (mut tree, _, _, _) = make_star(&[Vec2::new(0.45, 0.5), Vec2::new(0.55, 0.5)]);
    tree.set_scale(0.2);
    assert!(!tree.is_feasible());

    let nodes = tree.owned_nodes().to_vec();
    let edges = tree.owned_edges().to_vec();
    let mut nlco = Nlco::new();
    let mut opt = StrainOptimizer::new(&tree);
    opt.initialize(&tree, &mut nlco, nodes, edges).unwrap();
    opt.optimize(&mut tree, &mut nlco).unwrap();

    assert!(tree.is_feasible());
}

#[test]
fn edge_optimizer_rejects_fully_pinned_input() {
    let (tree, _, _, _) = make_star(&[Vec2::new(0.1, 0.5), Vec2::new(0.9, 0.5)]);
    let mut nlco = Nlco::new();
    let mut opt = EdgeOptimizer::new(&tree);
    match opt.initialize(&tree, &mut nlco, Vec::new(), Vec::new()) {
        Err(Error::NoMovingNodes) => {}
        other => panic!("expected NoMovingNodes, got {other:?}"),
    }
}

#[test]
fn optimizer_revert_restores_snapshot() {
    let (mut tree, _, _, _) = make_star(&[
        Vec2::new(0.0, 0.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.5, 0.866),
    ]);
    tree.set_scale(0.2);
    let before = io::write_to_string(&tree);

    let mut nlco = Nlco::new();
    let mut opt = ScaleOptimizer::new(&tree);
    opt.initialize(&tree, &mut nlco);
    opt.optimize(&mut tree, &mut nlco).unwrap();
    assert_ne!(io::write_to_string(&tree), before);

    opt.revert(&mut tree).unwrap();
    assert_eq!(io::write_to_string(&tree), before);
}

// ---- properties ------------------------------------------------------------

proptest! {
    #[test]
    fn prop_star_invariants_hold(
        xs in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0), 3..7)
    ) {
        let leaves: Vec<Vec2> = xs.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
        let (tree, _, _, _) = make_star(&leaves);
        assert_structural_invariants(&tree);
    }

    #[test]
    fn prop_split_absorb_preserves_counts(
        split in 0.05f64..0.95,
        edge_pick in 0usize..3,
    ) {
        let (mut tree, _, _, edges) = make_star(&[
            Vec2::new(0.1, 0.1),
            Vec2::new(0.9, 0.1),
            Vec2::new(0.5, 0.9),
        ]);
        let num_nodes = tree.owned_nodes().len();
        let num_paths = tree.owned_paths().len();
        let node = tree.split_edge(edges[edge_pick], split).unwrap();
        assert_structural_invariants(&tree);
        tree.absorb_node(node).unwrap();
        prop_assert_eq!(tree.owned_nodes().len(), num_nodes);
        prop_assert_eq!(tree.owned_paths().len(), num_paths);
        assert_structural_invariants(&tree);
    }

    #[test]
    fn prop_cleanup_idempotent_on_random_stars(
        xs in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0), 3..6)
    ) {
        let leaves: Vec<Vec2> = xs.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
        let (mut tree, _, _, _) = make_star(&leaves);
        let first = io::write_to_string(&tree);
        tree.with_cleanup(|_| ());
        prop_assert_eq!(io::write_to_string(&tree), first);
    }

    #[test]
    fn prop_serialization_round_trips(
        xs in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0), 3..6),
        strain in -0.5f64..0.5,
    ) {
        let leaves: Vec<Vec2> = xs.iter().map(|&(x, y)| Vec2::new(x, y)).collect();
        let (mut tree, _, _, edges) = make_star(&leaves);
        tree.with_cleanup(|t| t.edge_mut(edges[0]).strain = strain);
        let text = io::write_to_string(&tree);
        let mut copy = Tree::new();
        io::read_from_string(&mut copy, &text).unwrap();
        prop_assert_eq!(io::write_to_string(&copy), text);
    }
}
