use cladepurity::{CharacterTable, LineageTree, ProfileParams, ShapedTree, TraitColumn};

fn main() {
    // root -> A, B; A -> leaf1, leaf2; B -> leaf3, leaf4
    let tree = LineageTree::from_edges([
        ("root", "A"),
        ("root", "B"),
        ("A", "leaf1"),
        ("A", "leaf2"),
        ("B", "leaf3"),
        ("B", "leaf4"),
    ])
    .unwrap();
    let shaped = ShapedTree::shape(tree, &CharacterTable::new()).unwrap();

    let mut column = TraitColumn::new("label");
    for (leaf, label) in [("leaf1", "X"), ("leaf2", "X"), ("leaf3", "Y"), ("leaf4", "Y")] {
        column.push(leaf, label);
    }

    let params = ProfileParams {
        first_depth: 0,
        ..ProfileParams::default()
    };
    let profile = shaped.profile_trait(&column, &params).unwrap();

    // The root mixes both labels evenly; each depth-1 clade is pure.
    assert!((profile.mean_observed()[0] - 1.0).abs() < 1e-12);
    assert!(profile.mean_observed()[1].abs() < 1e-12);

    for s in &profile.summaries {
        println!(
            "depth={} H_obs={:.4} H_exp={:.4} chi2={:.4} p={:.4}",
            s.depth, s.mean_observed, s.mean_expected, s.mean_chi_square, s.p_value
        );
    }
}
