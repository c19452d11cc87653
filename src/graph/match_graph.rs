//! Labeled vertex graph wrapped around a molecular structure for matching.
//!
//! A [`MatchGraph`] owns its vertices, their neighbor lists in discovery order, and a
//! mutable position array. Signatures, groupings, and connectivity are derived lazily and
//! cached; none of them is invalidated by moving the positions, which only happens through
//! superposition of the whole graph.

use super::grouping::TwoLevelGrouping;
use super::signature::GraphSignatures;
use super::vocabulary::LabelVocabulary;
use crate::error::{Error, Result};
use crate::matching::GraphOptions;
use crate::model::structure::Structure;
use crate::model::types::{Point, Vector};
use crate::superpose::OptimalTransformation;
use smol_str::SmolStr;
use std::sync::{Arc, OnceLock};

/// One atom (or any payload) wrapped for matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex<T> {
    /// Position of the vertex in its graph's vertex array.
    pub index: usize,
    /// Original element the vertex was created from.
    pub payload: T,
    /// Compatibility label; only equally labeled vertices are matched.
    pub label: SmolStr,
    /// Coarse symmetry key used by the combinatorial matcher.
    pub group_label: SmolStr,
    /// Number of rings containing the vertex; zero when the ring heuristic is off.
    pub ring_score: u32,
    neighbors: Vec<usize>,
}

impl<T> Vertex<T> {
    pub fn neighbors(&self) -> &[usize] {
        &self.neighbors
    }

    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }
}

/// Description of a vertex handed to [`GraphBuilder::add_vertex`].
#[derive(Debug, Clone)]
pub struct VertexSpec<T> {
    pub payload: T,
    pub label: SmolStr,
    pub group_label: SmolStr,
    pub position: Point,
    pub ring_score: u32,
}

impl<T> VertexSpec<T> {
    pub fn new(
        payload: T,
        label: impl Into<SmolStr>,
        group_label: impl Into<SmolStr>,
        position: Point,
    ) -> Self {
        Self {
            payload,
            label: label.into(),
            group_label: group_label.into(),
            position,
            ring_score: 0,
        }
    }

    pub fn with_ring_score(mut self, ring_score: u32) -> Self {
        self.ring_score = ring_score;
        self
    }
}

/// Incremental constructor for [`MatchGraph`].
#[derive(Debug, Clone)]
pub struct GraphBuilder<T> {
    token: String,
    specs: Vec<VertexSpec<T>>,
    edges: Vec<(usize, usize)>,
}

impl<T> GraphBuilder<T> {
    /// Adds a vertex and returns its index.
    pub fn add_vertex(&mut self, spec: VertexSpec<T>) -> usize {
        self.specs.push(spec);
        self.specs.len() - 1
    }

    /// Records an undirected edge; invalid, looping, and repeated edges are dropped on build.
    pub fn add_edge(&mut self, a: usize, b: usize) {
        self.edges.push((a, b));
    }

    /// Finalizes the graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyGraph`] when no vertex was added.
    pub fn build(self) -> Result<MatchGraph<T>> {
        if self.specs.is_empty() {
            return Err(Error::empty_graph(self.token));
        }

        let n = self.specs.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (a, b) in self.edges {
            if a == b || a >= n || b >= n || adjacency[a].contains(&b) {
                continue;
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }

        let mut positions = Vec::with_capacity(n);
        let vertices = self
            .specs
            .into_iter()
            .zip(adjacency)
            .enumerate()
            .map(|(index, (spec, neighbors))| {
                positions.push(spec.position);
                Vertex {
                    index,
                    payload: spec.payload,
                    label: spec.label,
                    group_label: spec.group_label,
                    ring_score: spec.ring_score,
                    neighbors,
                }
            })
            .collect();

        Ok(MatchGraph {
            token: self.token,
            vertices,
            positions,
            signatures: OnceLock::new(),
            group_grouping: OnceLock::new(),
            label_grouping: OnceLock::new(),
            connected: OnceLock::new(),
        })
    }
}

/// Vertex graph of one structure, immutable apart from its positions.
#[derive(Debug, Clone)]
pub struct MatchGraph<T> {
    token: String,
    vertices: Vec<Vertex<T>>,
    positions: Vec<Point>,
    signatures: OnceLock<Arc<GraphSignatures>>,
    group_grouping: OnceLock<Arc<TwoLevelGrouping>>,
    label_grouping: OnceLock<Arc<TwoLevelGrouping>>,
    connected: OnceLock<bool>,
}

impl<T> MatchGraph<T> {
    pub fn builder(token: impl Into<String>) -> GraphBuilder<T> {
        GraphBuilder {
            token: token.into(),
            specs: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Wraps a subset of `elements` into a graph.
    ///
    /// # Arguments
    ///
    /// * `token` - Name used in diagnostics.
    /// * `elements` - Candidate elements, addressed by their slice index.
    /// * `include` - Filter deciding which elements become vertices.
    /// * `neighbors` - Adjacent element indices of an element; edges to excluded elements
    ///   are dropped.
    /// * `describe` - Builds the vertex description of an included element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyGraph`] when the filter keeps nothing.
    pub fn from_elements<E, I, N, NI, D>(
        token: impl Into<String>,
        elements: &[E],
        include: I,
        neighbors: N,
        describe: D,
    ) -> Result<Self>
    where
        I: Fn(&E) -> bool,
        N: Fn(usize) -> NI,
        NI: IntoIterator<Item = usize>,
        D: Fn(usize, &E) -> VertexSpec<T>,
    {
        let mut builder = Self::builder(token);
        let mut vertex_of = vec![None; elements.len()];
        for (idx, element) in elements.iter().enumerate() {
            if include(element) {
                vertex_of[idx] = Some(builder.add_vertex(describe(idx, element)));
            }
        }
        for (idx, vertex) in vertex_of.iter().enumerate() {
            let Some(a) = *vertex else { continue };
            for neighbor in neighbors(idx) {
                if let Some(Some(b)) = vertex_of.get(neighbor) {
                    if a < *b {
                        builder.add_edge(a, *b);
                    }
                }
            }
        }
        builder.build()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[Vertex<T>] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> &Vertex<T> {
        &self.vertices[index]
    }

    pub fn neighbors(&self, index: usize) -> &[usize] {
        &self.vertices[index].neighbors
    }

    pub fn degree(&self, index: usize) -> usize {
        self.vertices[index].neighbors.len()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.vertices.iter().map(|v| v.label.as_str())
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn position(&self, index: usize) -> Point {
        self.positions[index]
    }

    /// Copies positions from a graph with the same vertex layout.
    pub fn reset_positions(&mut self, template: &MatchGraph<T>) {
        debug_assert_eq!(self.positions.len(), template.positions.len());
        self.positions.copy_from_slice(&template.positions);
    }

    pub fn centroid(&self) -> Point {
        let sum = self
            .positions
            .iter()
            .fold(Vector::zeros(), |acc, p| acc + p.coords);
        Point::from(sum / self.positions.len() as f64)
    }

    /// Moves the graph so its centroid sits at the origin.
    pub fn center(&mut self) {
        let shift = self.centroid().coords;
        for p in &mut self.positions {
            *p -= shift;
        }
    }

    pub fn transform(&mut self, transformation: &OptimalTransformation) {
        transformation.apply_all(&mut self.positions);
    }

    /// Vertex signatures, computed on first use with a vocabulary of this graph's labels.
    pub fn signatures(&self) -> &GraphSignatures {
        self.signatures.get_or_init(|| {
            let vocabulary = Arc::new(LabelVocabulary::from_labels(self.labels()));
            Arc::new(GraphSignatures::compute(self, vocabulary))
        })
    }

    /// Recomputes signatures against a shared vocabulary, unless already built with it.
    pub fn prepare_signatures(&mut self, vocabulary: &Arc<LabelVocabulary>) {
        if let Some(existing) = self.signatures.get() {
            if Arc::ptr_eq(existing.vocabulary(), vocabulary) {
                return;
            }
        }
        let computed = Arc::new(GraphSignatures::compute(self, Arc::clone(vocabulary)));
        self.signatures = OnceLock::from(computed);
    }

    /// Reports whether both graphs carry signatures built from one vocabulary instance.
    pub fn shares_vocabulary(&self, other: &MatchGraph<T>) -> bool {
        match (self.signatures.get(), other.signatures.get()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a.vocabulary(), b.vocabulary()),
            _ => false,
        }
    }

    /// Whether every vertex is reachable from vertex 0; memoized.
    pub fn is_connected(&self) -> bool {
        *self.connected.get_or_init(|| {
            let mut visited = vec![false; self.vertices.len()];
            let mut stack = vec![0usize];
            visited[0] = true;
            let mut reached = 0;
            while let Some(current) = stack.pop() {
                reached += 1;
                for &next in &self.vertices[current].neighbors {
                    if !visited[next] {
                        visited[next] = true;
                        stack.push(next);
                    }
                }
            }
            reached == self.vertices.len()
        })
    }

    /// Grouping by group label, then by label.
    pub fn group_grouping(&self) -> &TwoLevelGrouping {
        self.group_grouping.get_or_init(|| {
            Arc::new(TwoLevelGrouping::build(&self.vertices, |v| {
                v.group_label.clone()
            }))
        })
    }

    /// Grouping by label only: every label is its own exchangeable group.
    pub fn label_grouping(&self) -> &TwoLevelGrouping {
        self.label_grouping
            .get_or_init(|| Arc::new(TwoLevelGrouping::build(&self.vertices, |v| v.label.clone())))
    }
}

impl MatchGraph<usize> {
    /// Builds a graph over the atoms of `structure`; payloads are atom indices.
    ///
    /// Labels are element symbols, group labels residue sequence numbers, and the token is
    /// the structure id.
    pub fn from_structure(structure: &Structure, options: &GraphOptions) -> Result<Self> {
        let ring_scores = if options.use_ring_heuristic {
            structure.ring_memberships(options.only_selection)
        } else {
            vec![0; structure.atom_count()]
        };

        Self::from_elements(
            structure.id(),
            structure.atoms(),
            |atom| {
                (!options.only_selection || atom.selected)
                    && !(options.ignore_hydrogens && atom.is_hydrogen())
            },
            |idx| structure.neighbors_of(idx).iter().copied(),
            |idx, atom| {
                VertexSpec::new(
                    idx,
                    atom.element.clone(),
                    atom.residue_seq.to_string(),
                    atom.pos,
                )
                .with_ring_score(ring_scores[idx])
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::atom::Atom;

    fn ring_with_tail() -> Structure {
        let mut s = Structure::new("mol");
        for i in 0..5 {
            let angle = i as f64 * 2.0 * std::f64::consts::PI / 5.0;
            s.add_atom(Atom::new(
                &format!("C{i}"),
                "C",
                1,
                Point::new(angle.cos(), angle.sin(), 0.0),
            ));
        }
        for i in 0..5 {
            s.add_bond(i, (i + 1) % 5);
        }
        let o = s.add_atom(Atom::new("O1", "O", 2, Point::new(2.0, 0.0, 0.0)));
        s.add_bond(0, o);
        let h = s.add_atom(Atom::new("H1", "H", 2, Point::new(2.8, 0.4, 0.0)));
        s.add_bond(o, h);
        s
    }

    #[test]
    fn builder_rejects_empty_graph() {
        let err = MatchGraph::<usize>::builder("nothing").build().unwrap_err();
        assert!(matches!(err, Error::EmptyGraph { ref token } if token == "nothing"));
    }

    #[test]
    fn builder_drops_invalid_edges() {
        let mut builder = MatchGraph::builder("g");
        let a = builder.add_vertex(VertexSpec::new((), "C", "1", Point::origin()));
        let b = builder.add_vertex(VertexSpec::new((), "C", "1", Point::new(1.0, 0.0, 0.0)));
        builder.add_edge(a, b);
        builder.add_edge(b, a);
        builder.add_edge(a, a);
        builder.add_edge(a, 7);
        let graph = builder.build().unwrap();

        assert_eq!(graph.neighbors(a), &[b]);
        assert_eq!(graph.neighbors(b), &[a]);
    }

    #[test]
    fn from_structure_uses_element_residue_and_rings() {
        let graph = MatchGraph::from_structure(&ring_with_tail(), &GraphOptions::default()).unwrap();

        assert_eq!(graph.token(), "mol");
        assert_eq!(graph.len(), 7);
        assert_eq!(graph.vertex(5).label, "O");
        assert_eq!(graph.vertex(5).group_label, "2");
        assert_eq!(graph.vertex(0).ring_score, 1);
        assert_eq!(graph.vertex(5).ring_score, 0);
        assert!(graph.is_connected());
    }

    #[test]
    fn from_structure_filters_hydrogens_and_selection() {
        let mut structure = ring_with_tail();
        structure.iter_atoms_mut().nth(3).unwrap().selected = false;
        let options = GraphOptions {
            only_selection: true,
            ignore_hydrogens: true,
            use_ring_heuristic: true,
        };

        let graph = MatchGraph::from_structure(&structure, &options).unwrap();

        assert_eq!(graph.len(), 5);
        assert!(graph.vertices().iter().all(|v| v.label != "H"));
        assert!(graph.vertices().iter().all(|v| v.payload != 3));
        assert!(graph.vertices().iter().all(|v| v.ring_score == 0));
        assert!(graph.is_connected());
    }

    #[test]
    fn ring_heuristic_can_be_disabled() {
        let options = GraphOptions {
            use_ring_heuristic: false,
            ..GraphOptions::default()
        };
        let graph = MatchGraph::from_structure(&ring_with_tail(), &options).unwrap();
        assert!(graph.vertices().iter().all(|v| v.ring_score == 0));
    }

    #[test]
    fn empty_selection_reports_token() {
        let mut structure = ring_with_tail();
        for atom in structure.iter_atoms_mut() {
            atom.selected = false;
        }
        let options = GraphOptions {
            only_selection: true,
            ..GraphOptions::default()
        };

        let err = MatchGraph::from_structure(&structure, &options).unwrap_err();
        assert!(err.to_string().contains("mol"));
    }

    #[test]
    fn disconnected_graph_is_detected() {
        let mut builder = MatchGraph::builder("split");
        builder.add_vertex(VertexSpec::new(0, "C", "1", Point::origin()));
        builder.add_vertex(VertexSpec::new(1, "C", "1", Point::new(5.0, 0.0, 0.0)));
        let graph = builder.build().unwrap();
        assert!(!graph.is_connected());
    }

    #[test]
    fn center_moves_centroid_to_origin() {
        let mut graph =
            MatchGraph::from_structure(&ring_with_tail(), &GraphOptions::default()).unwrap();
        graph.center();
        let c = graph.centroid();
        assert!(c.coords.norm() < 1e-12);
    }

    #[test]
    fn prepare_signatures_switches_vocabulary() {
        let mut a = MatchGraph::from_structure(&ring_with_tail(), &GraphOptions::default()).unwrap();
        let mut b = a.clone();
        assert!(!a.shares_vocabulary(&b));

        let vocab = Arc::new(LabelVocabulary::from_labels(["C", "H", "N", "O"]));
        a.prepare_signatures(&vocab);
        b.prepare_signatures(&vocab);

        assert!(a.shares_vocabulary(&b));
        assert_eq!(a.signatures().vertex(0).three_hop().len(), 4);
    }

    #[test]
    fn clone_shares_cached_signatures() {
        let graph = MatchGraph::from_structure(&ring_with_tail(), &GraphOptions::default()).unwrap();
        let _ = graph.signatures();
        let copy = graph.clone();
        assert!(graph.shares_vocabulary(&copy));
    }
}
