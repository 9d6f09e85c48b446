//! Lineage tree arena and the shaping passes that normalize it.
//!
//! Nodes live in a flat arena addressed by [`NodeId`]; names are unique and map back to ids.
//! Shaping runs in a fixed order:
//!
//! 1. [`LineageTree::assign_depth`] -- BFS distance from the root.
//! 2. [`LineageTree::extend_to_uniform_depth`] -- pad every leaf with dummy nodes until it
//!    reaches the maximum depth.
//! 3. [`LineageTree::reattach_redundant_leaves`] -- re-insert samples that were collapsed
//!    because their character string duplicated another sample's.
//!
//! Progeny sizes are computed afterwards by [`crate::ProgenyIndex::build`].

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::character::CharacterTable;
use crate::{PurityError, Result};

/// Index of a node in a [`LineageTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Where a node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeOrigin {
    /// Present in the input tree.
    Input,
    /// Filler inserted by [`LineageTree::extend_to_uniform_depth`].
    Dummy,
    /// Redundant sample re-inserted by [`LineageTree::reattach_redundant_leaves`].
    Reattached,
}

/// A node record. Attributes that are only known after a shaping pass are optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Distance from the root; set by [`LineageTree::assign_depth`].
    pub depth: Option<usize>,
    /// Number of leaf descendants; set by [`crate::ProgenyIndex::build`].
    pub progeny_size: Option<usize>,
    pub origin: NodeOrigin,
}

impl Node {
    fn new(name: String, origin: NodeOrigin) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            depth: None,
            progeny_size: None,
            origin,
        }
    }
}

/// A rooted tree: one parentless root, every other node has exactly one parent.
///
/// The single-parent invariant is enforced on insertion; the single-root and reachability
/// invariants are checked by [`LineageTree::validate`] (called from
/// [`LineageTree::from_edges`] and [`LineageTree::assign_depth`]).
#[derive(Debug, Clone, Default)]
pub struct LineageTree {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
}

impl LineageTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(parent, child)` name pairs and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::MalformedTree`] if a node would get a second parent, an edge is
    /// a self loop, there is not exactly one root, or some node is unreachable from the root.
    pub fn from_edges<I, P, C>(edges: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<str>,
    {
        let mut tree = Self::new();
        for (parent, child) in edges {
            tree.add_edge(parent.as_ref(), child.as_ref())?;
        }
        tree.validate()?;
        Ok(tree)
    }

    /// Return the id for `name`, inserting an unattached input node if it is new.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        self.push_node(Node::new(name.to_string(), NodeOrigin::Input))
    }

    /// Add a `parent -> child` edge, creating either endpoint if needed.
    ///
    /// Repeating an existing edge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::MalformedTree`] for self loops and for a child that already
    /// has a different parent.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<()> {
        if parent == child {
            return Err(PurityError::MalformedTree(format!(
                "self loop on node `{parent}`"
            )));
        }
        let p = self.add_node(parent);
        let c = self.add_node(child);
        match self.nodes[c.0].parent {
            Some(existing) if existing == p => return Ok(()),
            Some(existing) => {
                return Err(PurityError::MalformedTree(format!(
                    "node `{child}` has two parents (`{}` and `{parent}`)",
                    self.nodes[existing.0].name
                )));
            }
            None => {}
        }
        self.nodes[c.0].parent = Some(p);
        self.nodes[p.0].children.push(c);
        Ok(())
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.by_name.insert(node.name.clone(), id);
        self.nodes.push(node);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Like [`LineageTree::get`], but an absent name is an error.
    pub fn id_of(&self, name: &str) -> Result<NodeId> {
        self.get(name)
            .ok_or_else(|| PurityError::UnknownNode(name.to_string()))
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    #[must_use]
    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[must_use]
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.nodes[id.0].depth
    }

    #[must_use]
    pub fn progeny_size(&self, id: NodeId) -> Option<usize> {
        self.nodes[id.0].progeny_size
    }

    pub(crate) fn set_progeny_size(&mut self, id: NodeId, size: usize) {
        self.nodes[id.0].progeny_size = Some(size);
    }

    /// A leaf has no children and one parent. A lone root is not a leaf.
    #[must_use]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        let n = &self.nodes[id.0];
        n.children.is_empty() && n.parent.is_some()
    }

    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.ids().filter(move |&id| self.is_leaf(id))
    }

    /// The unique parentless node.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::MalformedTree`] unless exactly one node has no parent.
    pub fn root(&self) -> Result<NodeId> {
        let mut roots = self.ids().filter(|&id| self.nodes[id.0].parent.is_none());
        let root = roots
            .next()
            .ok_or_else(|| PurityError::MalformedTree("no root (empty graph or cycle)".into()))?;
        if let Some(other) = roots.next() {
            return Err(PurityError::MalformedTree(format!(
                "multiple roots (`{}` and `{}`)",
                self.name(root),
                self.name(other)
            )));
        }
        Ok(root)
    }

    /// Check the single-root and reachability invariants; return the root.
    pub fn validate(&self) -> Result<NodeId> {
        let root = self.root()?;
        let reached = self.bfs(root, |_, _| {});
        if reached != self.nodes.len() {
            return Err(PurityError::MalformedTree(format!(
                "{} node(s) unreachable from root `{}`",
                self.nodes.len() - reached,
                self.name(root)
            )));
        }
        Ok(root)
    }

    // Breadth-first walk from `start`, calling `visit(id, distance)`; returns the number
    // of nodes reached.
    fn bfs<F>(&self, start: NodeId, mut visit: F) -> usize
    where
        F: FnMut(NodeId, usize),
    {
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut reached = 0;
        while let Some((id, d)) = queue.pop_front() {
            visit(id, d);
            reached += 1;
            for &c in &self.nodes[id.0].children {
                queue.push_back((c, d + 1));
            }
        }
        reached
    }

    /// Set `depth` on every node to its distance from the root; return the root.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::MalformedTree`] if the graph is not a single rooted tree.
    pub fn assign_depth(&mut self) -> Result<NodeId> {
        let root = self.validate()?;
        let mut depths = vec![0usize; self.nodes.len()];
        self.bfs(root, |id, d| depths[id.0] = d);
        for (node, d) in self.nodes.iter_mut().zip(depths) {
            node.depth = Some(d);
        }
        Ok(root)
    }

    /// Largest assigned depth, or `None` before [`LineageTree::assign_depth`].
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.nodes.iter().filter_map(|n| n.depth).max()
    }

    /// Pad every leaf shallower than `max_depth` with dummy nodes.
    ///
    /// Each insertion splices a dummy between the leaf and its current parent: the dummy
    /// takes the leaf's depth and the leaf moves one level down. Dummies are named
    /// `"{leaf}-{k}"` with `k = 1, 2, ...` per leaf, skipping names already in use.
    /// Returns the number of dummies inserted.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::Invalid`] if depths have not been assigned.
    pub fn extend_to_uniform_depth(&mut self, max_depth: usize) -> Result<usize> {
        self.extend_to_uniform_depth_reserving(max_depth, |_| false)
    }

    /// [`LineageTree::extend_to_uniform_depth`], additionally skipping every dummy name for
    /// which `reserved` holds (e.g. sample ids that are about to be reattached).
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::Invalid`] if depths have not been assigned.
    pub fn extend_to_uniform_depth_reserving<F>(
        &mut self,
        max_depth: usize,
        reserved: F,
    ) -> Result<usize>
    where
        F: Fn(&str) -> bool,
    {
        let leaves: Vec<NodeId> = self.leaves().collect();
        let mut inserted = 0;
        for leaf in leaves {
            let mut k = 1usize;
            loop {
                let d = self.nodes[leaf.0]
                    .depth
                    .ok_or(PurityError::Invalid("depths must be assigned before extension"))?;
                if d >= max_depth {
                    break;
                }
                let Some(parent) = self.nodes[leaf.0].parent else {
                    break;
                };

                let name = self.dummy_name(leaf, &mut k, &reserved);
                let mut dummy = Node::new(name, NodeOrigin::Dummy);
                dummy.parent = Some(parent);
                dummy.children.push(leaf);
                dummy.depth = Some(d);
                let dummy = self.push_node(dummy);

                if let Some(slot) = self.nodes[parent.0]
                    .children
                    .iter_mut()
                    .find(|c| **c == leaf)
                {
                    *slot = dummy;
                }
                let node = &mut self.nodes[leaf.0];
                node.parent = Some(dummy);
                node.depth = Some(d + 1);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn dummy_name<F>(&self, leaf: NodeId, k: &mut usize, reserved: &F) -> String
    where
        F: Fn(&str) -> bool,
    {
        loop {
            let name = format!("{}-{}", self.nodes[leaf.0].name, k);
            *k += 1;
            if !self.by_name.contains_key(&name) && !reserved(&name) {
                return name;
            }
        }
    }

    /// Re-insert samples of `characters` that are missing from the tree.
    ///
    /// Every missing sample (ascending name order) becomes a new leaf child of the parent of
    /// the surviving leaf with the identical lookup string, at that leaf's depth. When
    /// several surviving leaves share the lookup string, the lowest leaf name wins. Only
    /// leaves present before this call are match candidates.
    ///
    /// Returns the ids of the reattached nodes.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::NoMatch`] if a missing sample matches no surviving leaf, and
    /// [`PurityError::MalformedTree`] if a sample id is held by a dummy node.
    pub fn reattach_redundant_leaves(&mut self, characters: &CharacterTable) -> Result<Vec<NodeId>> {
        // lookup string -> lowest-named surviving leaf
        let mut survivors: BTreeMap<String, NodeId> = BTreeMap::new();
        for leaf in self.leaves() {
            let Some(key) = characters.lookup_key(self.name(leaf)) else {
                continue;
            };
            survivors
                .entry(key)
                .and_modify(|best| {
                    if self.nodes[leaf.0].name < self.nodes[best.0].name {
                        *best = leaf;
                    }
                })
                .or_insert(leaf);
        }

        // A sample whose name was taken by a dummy would otherwise look present.
        if let Some(sample) = characters
            .samples()
            .find(|s| self.get(s).is_some_and(|id| self.nodes[id.0].origin == NodeOrigin::Dummy))
        {
            return Err(PurityError::MalformedTree(format!(
                "sample `{sample}` collides with a dummy node name"
            )));
        }

        let missing: Vec<&str> = characters
            .samples()
            .filter(|s| !self.contains(s))
            .collect();

        let mut added = Vec::with_capacity(missing.len());
        for sample in missing {
            let key = characters
                .lookup_key(sample)
                .ok_or_else(|| PurityError::UnknownNode(sample.to_string()))?;
            let &matched = survivors.get(&key).ok_or_else(|| PurityError::NoMatch {
                sample: sample.to_string(),
            })?;
            let Some(parent) = self.nodes[matched.0].parent else {
                return Err(PurityError::NoMatch {
                    sample: sample.to_string(),
                });
            };

            let mut node = Node::new(sample.to_string(), NodeOrigin::Reattached);
            node.parent = Some(parent);
            node.depth = self.nodes[matched.0].depth;
            let id = self.push_node(node);
            self.nodes[parent.0].children.push(id);
            added.push(id);
        }
        Ok(added)
    }
}
