use super::atom::Atom;
use super::topology::{Bond, Ring, perceive_rings};
use super::types::{MAX_RING_SIZE, Point};
use std::fmt;

/// Flat molecular model: atoms, canonical bonds, and adjacency kept in sync.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    id: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<usize>>,
}

impl Structure {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Appends an atom and returns its index.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.adjacency.push(Vec::new());
        self.atoms.len() - 1
    }

    /// Connects two atoms.
    ///
    /// Returns `false` without modifying the structure when an index is out of range, the
    /// endpoints coincide, or the bond already exists.
    pub fn add_bond(&mut self, idx1: usize, idx2: usize) -> bool {
        if idx1 == idx2 || idx1 >= self.atoms.len() || idx2 >= self.atoms.len() {
            return false;
        }
        if self.adjacency[idx1].contains(&idx2) {
            return false;
        }
        self.bonds.push(Bond::new(idx1, idx2));
        self.adjacency[idx1].push(idx2);
        self.adjacency[idx2].push(idx1);
        true
    }

    pub fn atom(&self, idx: usize) -> Option<&Atom> {
        self.atoms.get(idx)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn iter_atoms(&self) -> std::slice::Iter<'_, Atom> {
        self.atoms.iter()
    }

    pub fn iter_atoms_mut(&mut self) -> std::slice::IterMut<'_, Atom> {
        self.atoms.iter_mut()
    }

    /// Indices of atoms bonded to `idx`, in bond insertion order.
    pub fn neighbors_of(&self, idx: usize) -> &[usize] {
        self.adjacency.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn geometric_center(&self) -> Point {
        if self.atoms.is_empty() {
            return Point::origin();
        }
        let sum = self
            .atoms
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, atom| acc + atom.pos.coords);
        Point::from(sum / self.atoms.len() as f64)
    }

    /// Rewrites every atom position through `map`.
    pub fn transform_positions<F>(&mut self, mut map: F)
    where
        F: FnMut(&Point) -> Point,
    {
        for atom in &mut self.atoms {
            atom.pos = map(&atom.pos);
        }
    }

    /// Rings of at most ten atoms, one per distinct shortest cycle through a bond.
    pub fn rings(&self) -> Vec<Ring> {
        perceive_rings(&self.adjacency, &self.bonds, MAX_RING_SIZE)
    }

    /// Number of perceived rings containing each atom.
    ///
    /// With `only_selection`, rings that contain an unselected atom are not counted.
    pub fn ring_memberships(&self, only_selection: bool) -> Vec<u32> {
        let mut counts = vec![0u32; self.atoms.len()];
        for ring in self.rings() {
            if only_selection && !ring.atoms().iter().all(|&idx| self.atoms[idx].selected) {
                continue;
            }
            for &idx in ring.atoms() {
                counts[idx] += 1;
            }
        }
        counts
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Structure {{ id: \"{}\", atoms: {}, bonds: {} }}",
            self.id,
            self.atoms.len(),
            self.bonds.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn benzene_like() -> Structure {
        let mut structure = Structure::new("ring");
        for i in 0..6 {
            let angle = i as f64 * std::f64::consts::PI / 3.0;
            structure.add_atom(Atom::new(
                &format!("C{}", i + 1),
                "C",
                1,
                Point::new(1.4 * angle.cos(), 1.4 * angle.sin(), 0.0),
            ));
        }
        for i in 0..6 {
            structure.add_bond(i, (i + 1) % 6);
        }
        let h = structure.add_atom(Atom::new("H1", "H", 1, Point::new(2.5, 0.0, 0.0)));
        structure.add_bond(0, h);
        structure
    }

    #[test]
    fn add_bond_rejects_invalid_and_duplicate_bonds() {
        let mut structure = Structure::new("s");
        let a = structure.add_atom(Atom::new("A", "C", 1, Point::origin()));
        let b = structure.add_atom(Atom::new("B", "C", 1, Point::new(1.0, 0.0, 0.0)));

        assert!(structure.add_bond(a, b));
        assert!(!structure.add_bond(b, a));
        assert!(!structure.add_bond(a, a));
        assert!(!structure.add_bond(a, 9));
        assert_eq!(structure.bonds().len(), 1);
        assert_eq!(structure.neighbors_of(a), &[b]);
        assert_eq!(structure.neighbors_of(b), &[a]);
    }

    #[test]
    fn neighbors_of_out_of_range_is_empty() {
        let structure = Structure::new("s");
        assert!(structure.neighbors_of(3).is_empty());
    }

    #[test]
    fn geometric_center_averages_positions() {
        let mut structure = Structure::new("s");
        structure.add_atom(Atom::new("A", "C", 1, Point::new(0.0, 0.0, 0.0)));
        structure.add_atom(Atom::new("B", "C", 1, Point::new(2.0, 4.0, -6.0)));

        let center = structure.geometric_center();
        assert!((center.x - 1.0).abs() < 1e-10);
        assert!((center.y - 2.0).abs() < 1e-10);
        assert!((center.z + 3.0).abs() < 1e-10);
    }

    #[test]
    fn transform_positions_applies_map_to_all_atoms() {
        let mut structure = benzene_like();
        structure.transform_positions(|p| Point::new(p.x + 1.0, p.y, p.z - 2.0));

        let first = structure.atom(0).unwrap();
        assert!((first.pos.x - 2.4).abs() < 1e-10);
        assert!((first.pos.z + 2.0).abs() < 1e-10);
    }

    #[test]
    fn ring_memberships_count_ring_atoms_only() {
        let structure = benzene_like();
        let counts = structure.ring_memberships(false);

        assert_eq!(&counts[..6], &[1, 1, 1, 1, 1, 1]);
        assert_eq!(counts[6], 0);
    }

    #[test]
    fn ring_memberships_skip_partially_selected_rings() {
        let mut structure = benzene_like();
        structure.iter_atoms_mut().nth(2).unwrap().selected = false;

        let counts = structure.ring_memberships(true);
        assert!(counts.iter().all(|&c| c == 0));
    }
}
