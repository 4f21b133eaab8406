//! Ready-made sample trees. Used throughout the test suite, and handy for
//! driving the optimizers from examples.

use crate::geom::Vec2;
use crate::tree::conditions::{Condition, ConditionKind};
use crate::tree::Tree;

impl Tree {
    /// An empty tree.
    pub fn make_tree_blank() -> Tree {
        let mut tree = Tree::new();
        tree.set_scale(0.1);
        tree
    }

    /// An 8-node, 6-appendage tree in an unoptimized configuration, with a
    /// vertical symmetry line and a few symmetry conditions.
    pub fn make_tree_unoptimized() -> Tree {
        let mut tree = Tree::new();
        let (n1, _) = tree.add_node(None, Vec2::new(0.40, 0.80));
        tree.node_mut(n1).label = "node1".into();
        let (n2, e1) = tree.add_node(Some(n1), Vec2::new(0.45, 0.60));
        tree.node_mut(n2).label = "node2".into();
        tree.edge_mut(e1.unwrap()).label = "edge1".into();
        let (n3, e2) = tree.add_node(Some(n2), Vec2::new(0.55, 0.35));
        tree.node_mut(n3).label = "node3".into();
        tree.edge_mut(e2.unwrap()).label = "edge2".into();
        let (n4, e3) = tree.add_node(Some(n3), Vec2::new(0.55, 0.01));
        tree.node_mut(n4).label = "node4".into();
        tree.edge_mut(e3.unwrap()).label = "edge3".into();
        let (n5, e4) = tree.add_node(Some(n2), Vec2::new(0.05, 0.95));
        tree.node_mut(n5).label = "node5".into();
        let e4 = e4.unwrap();
        tree.edge_mut(e4).label = "edge4".into();
        let (n6, e5) = tree.add_node(Some(n2), Vec2::new(0.95, 0.95));
        tree.node_mut(n6).label = "node6".into();
        let e5 = e5.unwrap();
        tree.edge_mut(e5).label = "edge5".into();
        let (n7, e6) = tree.add_node(Some(n3), Vec2::new(0.05, 0.05));
        tree.node_mut(n7).label = "node7".into();
        tree.edge_mut(e6.unwrap()).label = "edge6".into();
        let (n8, e7) = tree.add_node(Some(n3), Vec2::new(0.95, 0.05));
        tree.node_mut(n8).label = "node8".into();
        tree.edge_mut(e7.unwrap()).label = "edge7".into();

        tree.set_symmetry(Vec2::new(0.5, 0.5), 90.0);
        tree.with_cleanup(|t| {
            t.add_condition(Condition::new(ConditionKind::NodesPaired {
                node1: n5,
                node2: n6,
            }));
            t.add_condition(Condition::new(ConditionKind::EdgesSameStrain {
                edge1: e4,
                edge2: e5,
            }));
            t.add_condition(Condition::new(ConditionKind::NodeSymmetric { node: n1 }));
        });
        // A small scale keeps every path feasible at these locations.
        tree.set_scale(0.1);
        tree
    }

    /// The same tree shape as [`Tree::make_tree_unoptimized`], but with the
    /// node positions and scale of an optimized configuration.
    pub fn make_tree_optimized() -> Tree {
        let mut tree = Tree::new();
        let (n1, _) = tree.add_node(None, Vec2::new(0.5, 0.812792));
        tree.node_mut(n1).label = "node1".into();
        let (n2, e1) = tree.add_node(Some(n1), Vec2::new(0.45, 0.60));
        tree.node_mut(n2).label = "node2".into();
        tree.edge_mut(e1.unwrap()).label = "edge1".into();
        let (n2a, e1a) = tree.add_node(Some(n2), Vec2::new(0.52, 0.48));
        tree.node_mut(n2a).label = "node2a".into();
        let e1a = e1a.unwrap();
        tree.edge_mut(e1a).label = "edge1a".into();
        tree.edge_mut(e1a).length = 0.5;
        let (n3, e2) = tree.add_node(Some(n2a), Vec2::new(0.55, 0.35));
        tree.node_mut(n3).label = "node3".into();
        let e2 = e2.unwrap();
        tree.edge_mut(e2).label = "edge2".into();
        tree.edge_mut(e2).length = 0.5;
        let (n4, e3) = tree.add_node(Some(n3), Vec2::new(0.5, 0.0));
        tree.node_mut(n4).label = "node4".into();
        tree.edge_mut(e3.unwrap()).label = "edge3".into();
        let (n5, e4) = tree.add_node(Some(n2), Vec2::new(0.0, 1.0));
        tree.node_mut(n5).label = "node5".into();
        tree.edge_mut(e4.unwrap()).label = "edge4".into();
        let (n6, e5) = tree.add_node(Some(n2), Vec2::new(1.0, 1.0));
        tree.node_mut(n6).label = "node6".into();
        tree.edge_mut(e5.unwrap()).label = "edge5".into();
        let (n7, e6) = tree.add_node(Some(n3), Vec2::new(0.0, 0.187208));
        tree.node_mut(n7).label = "node7".into();
        tree.edge_mut(e6.unwrap()).label = "edge6".into();
        let (n8, e7) = tree.add_node(Some(n3), Vec2::new(1.0, 0.187208));
        tree.node_mut(n8).label = "node8".into();
        tree.edge_mut(e7.unwrap()).label = "edge7".into();

        tree.set_scale(0.266949);
        tree
    }

    /// A 5-node, 4-appendage tree whose central quad inset produces a
    /// gusset.
    pub fn make_tree_gusset() -> Tree {
        let mut tree = Tree::new();
        let (n1, _) = tree.add_node(None, Vec2::new(0.0, 0.0));
        tree.node_mut(n1).label = "node1".into();
        let (n2, e1) = tree.add_node(Some(n1), Vec2::new(0.45, 0.50));
        tree.node_mut(n2).label = "node2".into();
        let e1 = e1.unwrap();
        tree.edge_mut(e1).label = "edge1".into();
        tree.edge_mut(e1).length = 0.6;
        let (n3, e2) = tree.add_node(Some(n2), Vec2::new(1.0, 0.0));
        tree.node_mut(n3).label = "node3".into();
        let e2 = e2.unwrap();
        tree.edge_mut(e2).label = "edge2".into();
        tree.edge_mut(e2).length = 0.4;
        let (n4, e3) = tree.add_node(Some(n2), Vec2::new(0.0, 1.0));
        tree.node_mut(n4).label = "node4".into();
        let e3 = e3.unwrap();
        tree.edge_mut(e3).label = "edge3".into();
        tree.edge_mut(e3).length = 0.4;
        let (n5, e4) = tree.add_node(Some(n2), Vec2::new(1.0, 1.0));
        tree.node_mut(n5).label = "node5".into();
        let e4 = e4.unwrap();
        tree.edge_mut(e4).label = "edge4".into();
        tree.edge_mut(e4).length = 0.6;

        tree.set_scale(1.0);
        tree
    }

    /// A tree carrying one of every condition type.
    pub fn make_tree_conditioned() -> Tree {
        let mut tree = Tree::new();
        let (n1, _) = tree.add_node(None, Vec2::new(0.50, 0.10));
        let (n2, _e1) = tree.add_node(Some(n1), Vec2::new(0.60, 0.50));
        let (n3, e2) = tree.add_node(Some(n2), Vec2::new(0.65, 0.75));
        let (n4, _e3) = tree.add_node(Some(n2), Vec2::new(0.05, 0.05));
        let (n5, _e4) = tree.add_node(Some(n2), Vec2::new(1.00, 0.5));
        let (n6, e5) = tree.add_node(Some(n3), Vec2::new(0.05, 0.95));
        let (n7, e6) = tree.add_node(Some(n3), Vec2::new(1.00, 1.00));
        let (n8, _e7) = tree.add_node(Some(n3), Vec2::new(0.50, 0.85));

        tree.set_symmetry(Vec2::new(0.5, 0.5), 90.0);
        tree.with_cleanup(|t| {
            t.add_condition(Condition::new(ConditionKind::NodeFixed {
                node: n1,
                x_fixed: true,
                x_fix_value: 0.5,
                y_fixed: false,
                y_fix_value: 0.0,
            }));
            t.add_condition(Condition::new(ConditionKind::NodeOnCorner { node: n7 }));
            t.add_condition(Condition::new(ConditionKind::NodeOnEdge { node: n5 }));
            t.add_condition(Condition::new(ConditionKind::NodesCollinear {
                node1: n4,
                node2: n1,
                node3: n5,
            }));
            t.add_condition(Condition::new(ConditionKind::NodesPaired {
                node1: n6,
                node2: n7,
            }));
            t.add_condition(Condition::new(ConditionKind::NodeSymmetric { node: n8 }));
            t.add_condition(Condition::new(ConditionKind::EdgeLengthFixed {
                edge: e2.unwrap(),
            }));
            t.add_condition(Condition::new(ConditionKind::EdgesSameStrain {
                edge1: e5.unwrap(),
                edge2: e6.unwrap(),
            }));
            let p57 = t.get_leaf_path(n5, n7);
            t.add_condition(Condition::new(ConditionKind::PathActive {
                path: p57,
                node1: n5,
                node2: n7,
            }));
            let p41 = t.get_leaf_path(n4, n1);
            t.add_condition(Condition::new(ConditionKind::PathAngleFixed {
                path: p41,
                node1: n4,
                node2: n1,
                angle: 22.5,
            }));
            let p46 = t.get_leaf_path(n4, n6);
            t.add_condition(Condition::new(ConditionKind::PathAngleQuant {
                path: p46,
                node1: n4,
                node2: n6,
                quant: 8,
                quant_offset: 0.0,
            }));
        });
        tree.set_scale(0.1);
        tree
    }
}
