//! Bonded connectivity and ring perception for [`Structure`](super::structure::Structure).
//!
//! Bonds are stored canonically so duplicates collapse. Rings are perceived as the shortest
//! cycle through every bond, which is enough to score ring membership of atoms for the
//! matching heuristics without computing a full smallest set of smallest rings.

use std::collections::{HashSet, VecDeque};

/// Undirected bond connecting two atoms of a structure.
///
/// Endpoints are stored in ascending order so equality and hashing are symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bond {
    /// Index of the first atom (always the lesser index after canonicalization).
    pub a1_idx: usize,
    /// Index of the second atom.
    pub a2_idx: usize,
}

impl Bond {
    /// Creates a new bond while canonicalizing the endpoint ordering.
    ///
    /// # Arguments
    ///
    /// * `idx1` - Index of one bonded atom.
    /// * `idx2` - Index of the partner atom.
    ///
    /// # Returns
    ///
    /// A `Bond` whose indices are sorted so `a1_idx <= a2_idx`.
    pub fn new(idx1: usize, idx2: usize) -> Self {
        if idx1 <= idx2 {
            Self {
                a1_idx: idx1,
                a2_idx: idx2,
            }
        } else {
            Self {
                a1_idx: idx2,
                a2_idx: idx1,
            }
        }
    }

    /// Returns the endpoint opposite to `idx`, if `idx` belongs to the bond.
    pub fn partner(&self, idx: usize) -> Option<usize> {
        if self.a1_idx == idx {
            Some(self.a2_idx)
        } else if self.a2_idx == idx {
            Some(self.a1_idx)
        } else {
            None
        }
    }
}

/// Closed cycle of bonded atoms, listed in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    atoms: Vec<usize>,
}

impl Ring {
    pub fn atoms(&self) -> &[usize] {
        &self.atoms
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.atoms.contains(&idx)
    }
}

/// Finds the shortest ring through every bond, up to `max_size` atoms.
///
/// Each bond is temporarily removed and the shortest remaining path between its endpoints
/// is searched breadth-first; closing that path with the bond yields a ring. Rings found
/// from several bonds are reported once.
///
/// # Arguments
///
/// * `adjacency` - Neighbor lists indexed by atom.
/// * `bonds` - Canonical bond list consistent with `adjacency`.
/// * `max_size` - Largest ring size, in atoms, to report.
///
/// # Returns
///
/// Rings in discovery order.
pub fn perceive_rings(adjacency: &[Vec<usize>], bonds: &[Bond], max_size: usize) -> Vec<Ring> {
    let n = adjacency.len();
    let mut parent = vec![usize::MAX; n];
    let mut depth = vec![usize::MAX; n];
    let mut touched = Vec::new();
    let mut queue = VecDeque::new();
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut rings = Vec::new();

    for bond in bonds {
        let (start, goal) = (bond.a1_idx, bond.a2_idx);
        if start == goal || start >= n || goal >= n {
            continue;
        }

        for &idx in &touched {
            parent[idx] = usize::MAX;
            depth[idx] = usize::MAX;
        }
        touched.clear();
        queue.clear();

        depth[start] = 0;
        touched.push(start);
        queue.push_back(start);

        let mut found = false;
        while let Some(current) = queue.pop_front() {
            if current == goal {
                found = true;
                break;
            }
            if depth[current] + 2 > max_size {
                continue;
            }
            for &next in &adjacency[current] {
                if current == start && next == goal {
                    continue;
                }
                if depth[next] == usize::MAX {
                    depth[next] = depth[current] + 1;
                    parent[next] = current;
                    touched.push(next);
                    queue.push_back(next);
                }
            }
        }

        if !found {
            continue;
        }

        let mut atoms = vec![goal];
        let mut cursor = goal;
        while cursor != start {
            cursor = parent[cursor];
            atoms.push(cursor);
        }

        let mut key = atoms.clone();
        key.sort_unstable();
        if seen.insert(key) {
            rings.push(Ring { atoms });
        }
    }

    rings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjacency_from(n: usize, bonds: &[Bond]) -> Vec<Vec<usize>> {
        let mut adjacency = vec![Vec::new(); n];
        for bond in bonds {
            adjacency[bond.a1_idx].push(bond.a2_idx);
            adjacency[bond.a2_idx].push(bond.a1_idx);
        }
        adjacency
    }

    fn cycle(n: usize) -> Vec<Bond> {
        (0..n).map(|i| Bond::new(i, (i + 1) % n)).collect()
    }

    #[test]
    fn bond_new_canonicalizes_indices() {
        let bond = Bond::new(5, 2);
        assert_eq!(bond.a1_idx, 2);
        assert_eq!(bond.a2_idx, 5);
        assert_eq!(bond, Bond::new(2, 5));
    }

    #[test]
    fn bond_partner_returns_opposite_endpoint() {
        let bond = Bond::new(1, 4);
        assert_eq!(bond.partner(1), Some(4));
        assert_eq!(bond.partner(4), Some(1));
        assert_eq!(bond.partner(3), None);
    }

    #[test]
    fn chain_has_no_rings() {
        let bonds = vec![Bond::new(0, 1), Bond::new(1, 2), Bond::new(2, 3)];
        let adjacency = adjacency_from(4, &bonds);
        assert!(perceive_rings(&adjacency, &bonds, 10).is_empty());
    }

    #[test]
    fn six_membered_ring_is_found_once() {
        let bonds = cycle(6);
        let adjacency = adjacency_from(6, &bonds);
        let rings = perceive_rings(&adjacency, &bonds, 10);

        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 6);
        assert!((0..6).all(|i| rings[0].contains(i)));
    }

    #[test]
    fn fused_rings_report_both_smallest_cycles() {
        // Naphthalene-like skeleton: two six-membered rings sharing bond 0-5.
        let mut bonds = cycle(6);
        bonds.extend([
            Bond::new(0, 6),
            Bond::new(6, 7),
            Bond::new(7, 8),
            Bond::new(8, 9),
            Bond::new(9, 5),
        ]);
        let adjacency = adjacency_from(10, &bonds);
        let rings = perceive_rings(&adjacency, &bonds, 10);

        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|ring| ring.len() == 6));
        assert!(rings.iter().all(|ring| ring.contains(0) && ring.contains(5)));
    }

    #[test]
    fn rings_larger_than_limit_are_ignored() {
        let bonds = cycle(12);
        let adjacency = adjacency_from(12, &bonds);
        assert!(perceive_rings(&adjacency, &bonds, 10).is_empty());
        assert_eq!(perceive_rings(&adjacency, &bonds, 12).len(), 1);
    }
}
