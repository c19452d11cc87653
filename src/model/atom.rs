//! Fundamental atom representation comprising name, element symbol, residue, and position.
//!
//! Atoms are the payload that match graphs wrap into vertices. The element symbol becomes
//! the vertex label, the residue sequence number becomes the symmetry group label, and the
//! selection flag decides whether the atom takes part in matching at all.

use super::types::{HYDROGEN, Point, Vector};
use smol_str::SmolStr;
use std::fmt;

/// Labeled atom with residue membership, selection state, and mutable position.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom name as it appears in the source model (e.g., `CA`).
    pub name: SmolStr,
    /// Element symbol used as the matching label (e.g., `C`, `N`).
    pub element: SmolStr,
    /// Residue sequence number, used to group exchangeable atoms.
    pub residue_seq: i32,
    /// Cartesian coordinates measured in ångströms.
    pub pos: Point,
    /// Whether the atom belongs to the user selection.
    pub selected: bool,
}

impl Atom {
    /// Creates a new, selected atom.
    ///
    /// # Arguments
    ///
    /// * `name` - Atom label such as `"CA"` or `"O1"`.
    /// * `element` - Element symbol; compared verbatim when matching.
    /// * `residue_seq` - Sequence number of the owning residue.
    /// * `pos` - `Point` describing the Cartesian coordinates in ångströms.
    ///
    /// # Returns
    ///
    /// A fully initialized `Atom` with `selected` set to `true`.
    pub fn new(name: &str, element: &str, residue_seq: i32, pos: Point) -> Self {
        Self {
            name: SmolStr::new(name),
            element: SmolStr::new(element),
            residue_seq,
            pos,
            selected: true,
        }
    }

    /// Returns a copy of the atom with the given selection state.
    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    /// Reports whether the element symbol denotes hydrogen.
    pub fn is_hydrogen(&self) -> bool {
        self.element == HYDROGEN
    }

    /// Computes the squared Euclidean distance to another atom.
    ///
    /// # Arguments
    ///
    /// * `other` - Reference atom to measure against.
    ///
    /// # Returns
    ///
    /// The squared distance as `f64`.
    pub fn distance_squared(&self, other: &Atom) -> f64 {
        nalgebra::distance_squared(&self.pos, &other.pos)
    }

    /// Computes the Euclidean distance to another atom in ångströms.
    pub fn distance(&self, other: &Atom) -> f64 {
        nalgebra::distance(&self.pos, &other.pos)
    }

    /// Translates the atom by the provided vector.
    ///
    /// # Arguments
    ///
    /// * `vector` - Displacement applied component-wise to the position.
    pub fn translate_by(&mut self, vector: &Vector) {
        self.pos += vector;
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Atom {{ name: \"{}\", element: {}, residue: {}, pos: [{:.3}, {:.3}, {:.3}] }}",
            self.name, self.element, self.residue_seq, self.pos.x, self.pos.y, self.pos.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_new_creates_selected_atom() {
        let atom = Atom::new("CA", "C", 7, Point::new(1.0, 2.0, 3.0));

        assert_eq!(atom.name, "CA");
        assert_eq!(atom.element, "C");
        assert_eq!(atom.residue_seq, 7);
        assert!(atom.selected);
        assert_eq!(atom.pos, Point::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn with_selected_overrides_selection() {
        let atom = Atom::new("O1", "O", 1, Point::origin()).with_selected(false);
        assert!(!atom.selected);
    }

    #[test]
    fn is_hydrogen_matches_symbol_exactly() {
        assert!(Atom::new("H1", "H", 1, Point::origin()).is_hydrogen());
        assert!(!Atom::new("HG", "Hg", 1, Point::origin()).is_hydrogen());
        assert!(!Atom::new("C1", "C", 1, Point::origin()).is_hydrogen());
    }

    #[test]
    fn distance_helpers_agree() {
        let a = Atom::new("A", "C", 1, Point::new(0.0, 0.0, 0.0));
        let b = Atom::new("B", "C", 1, Point::new(3.0, 4.0, 0.0));

        assert!((a.distance_squared(&b) - 25.0).abs() < 1e-10);
        assert!((a.distance(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn translate_by_moves_position() {
        let mut atom = Atom::new("N", "N", 2, Point::new(1.0, 1.0, 1.0));
        atom.translate_by(&Vector::new(-1.0, 0.5, 2.0));

        assert!((atom.pos.x - 0.0).abs() < 1e-10);
        assert!((atom.pos.y - 1.5).abs() < 1e-10);
        assert!((atom.pos.z - 3.0).abs() < 1e-10);
    }

    #[test]
    fn display_includes_name_element_and_residue() {
        let atom = Atom::new("C4'", "C", 12, Point::new(0.5, -1.25, 3.0));
        let rendered = atom.to_string();

        assert!(rendered.contains("C4'"));
        assert!(rendered.contains("element: C"));
        assert!(rendered.contains("residue: 12"));
        assert!(rendered.contains("-1.250"));
    }
}
