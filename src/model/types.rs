use nalgebra::{Point3, Vector3};

/// Cartesian position in ångströms.
pub type Point = Point3<f64>;

/// Displacement between two [`Point`]s.
pub type Vector = Vector3<f64>;

/// Element symbol treated as hydrogen by graph filters.
pub const HYDROGEN: &str = "H";

/// Largest ring, in atoms, reported by ring perception.
pub const MAX_RING_SIZE: usize = 10;
