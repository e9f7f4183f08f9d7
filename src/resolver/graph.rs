// src/resolver/graph.rs

//! Arena-backed dependency graph of one (project, platform) walk
//!
//! Nodes and edges live in flat vectors and refer to each other by index, so
//! a library reached along many paths is stored once and paths can be
//! enumerated without shared mutable references. Node 0 is always the root
//! project. An edge that was never attached to a node (its library failed to
//! resolve, or it closes a cycle) keeps `target == None` but still takes
//! part in path enumeration.

use crate::diagnostics::{DependencyPath, DiagnosticCode, PathSegment};
use crate::model::library_key;
use crate::version::VersionRange;
use semver::Version;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Project,
    Package,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Project => write!(f, "project"),
            NodeKind::Package => write!(f, "package"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EdgeId(pub usize);

/// A resolved library (or project) in the walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub library_id: String,
    pub kind: NodeKind,
    /// None for projects
    pub version: Option<Version>,
    /// Depth of the first (shallowest) edge that reached this node
    pub depth: usize,
    pub incoming: Vec<EdgeId>,
    pub outgoing: Vec<EdgeId>,
}

impl GraphNode {
    /// `id version` for packages, `id` for projects
    pub fn label(&self) -> String {
        match &self.version {
            Some(version) => format!("{} {}", self.library_id, version),
            None => self.library_id.clone(),
        }
    }
}

/// One requirement link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to_library: String,
    pub to_kind: NodeKind,
    pub range: VersionRange,
    pub suppressions: BTreeSet<DiagnosticCode>,
    /// Path length from the root project
    pub depth: usize,
    pub target: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyArena {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl DependencyArena {
    pub const ROOT: NodeId = NodeId(0);

    /// New arena holding only the root project
    pub fn new(root_project: &str) -> Self {
        Self {
            nodes: vec![GraphNode {
                library_id: root_project.to_string(),
                kind: NodeKind::Project,
                version: None,
                depth: 0,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            }],
            edges: Vec::new(),
        }
    }

    pub fn root(&self) -> &GraphNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &GraphEdge {
        &self.edges[id.0]
    }

    pub fn add_node(&mut self, library_id: &str, kind: NodeKind, version: Option<Version>, depth: usize) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(GraphNode {
            library_id: library_id.to_string(),
            kind,
            version,
            depth,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        });
        id
    }

    /// Record a requirement declared by `from`; the edge starts unattached
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to_library: &str,
        to_kind: NodeKind,
        range: VersionRange,
        suppressions: BTreeSet<DiagnosticCode>,
    ) -> EdgeId {
        let id = EdgeId(self.edges.len());
        let depth = self.nodes[from.0].depth + 1;
        self.edges.push(GraphEdge {
            from,
            to_library: to_library.to_string(),
            to_kind,
            range,
            suppressions,
            depth,
            target: None,
        });
        self.nodes[from.0].outgoing.push(id);
        id
    }

    /// Point `edge` at `node`
    pub fn attach(&mut self, edge: EdgeId, node: NodeId) {
        self.edges[edge.0].target = Some(node);
        self.nodes[node.0].incoming.push(edge);
    }

    /// Is `library_id` the library of `node` or of any node that reaches it?
    pub fn has_ancestor(&self, node: NodeId, library_id: &str) -> bool {
        let key = library_key(library_id);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([node]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let n = &self.nodes[current.0];
            if library_key(&n.library_id) == key {
                return true;
            }
            queue.extend(n.incoming.iter().map(|e| self.edges[e.0].from));
        }
        false
    }

    /// Detached copy of an edge for use in a diagnostic path
    pub fn segment(&self, edge: EdgeId) -> PathSegment {
        let e = &self.edges[edge.0];
        let from = &self.nodes[e.from.0];
        PathSegment {
            from: from.library_id.clone(),
            from_kind: from.kind,
            from_version: from.version.clone(),
            to: e.to_library.clone(),
            to_kind: e.to_kind,
            range: e.range.clone(),
            suppressions: e.suppressions.clone(),
            depth: e.depth,
        }
    }

    /// Every simple path from the root that ends with `edge`, at most `limit`
    ///
    /// Paths come out in edge-creation order, which follows declaration
    /// order, so the result is deterministic.
    pub fn paths_to_edge(&self, edge: EdgeId, limit: usize) -> Vec<DependencyPath> {
        let mut paths = Vec::new();
        let mut trail = vec![edge];
        let mut on_path = HashSet::new();
        self.collect_paths(self.edges[edge.0].from, &mut trail, &mut on_path, limit, &mut paths);
        paths
    }

    /// Every simple path from the root to `node`, at most `limit`
    pub fn paths_to_node(&self, node: NodeId, limit: usize) -> Vec<DependencyPath> {
        let mut paths = Vec::new();
        for edge in &self.nodes[node.0].incoming {
            if paths.len() >= limit {
                break;
            }
            paths.extend(self.paths_to_edge(*edge, limit - paths.len()));
        }
        paths
    }

    fn collect_paths(
        &self,
        node: NodeId,
        trail: &mut Vec<EdgeId>,
        on_path: &mut HashSet<NodeId>,
        limit: usize,
        out: &mut Vec<DependencyPath>,
    ) {
        if out.len() >= limit {
            return;
        }

        if node == Self::ROOT {
            let segments = trail.iter().rev().map(|e| self.segment(*e)).collect();
            out.push(DependencyPath::new(segments));
            return;
        }

        if !on_path.insert(node) {
            return;
        }

        for incoming in &self.nodes[node.0].incoming {
            trail.push(*incoming);
            self.collect_paths(self.edges[incoming.0].from, trail, on_path, limit, out);
            trail.pop();
        }

        on_path.remove(&node);
    }
}
