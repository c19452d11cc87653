//! Closed-form optimal rigid superposition of two ordered point sets.
//!
//! Both sets are centered, a 4×4 symmetric key matrix is accumulated from the centered
//! coordinate pairs, and the eigenvector of its dominant eigenvalue is the unit quaternion
//! rotating the "other" set onto the "pivot" set. The RMSD follows from the same eigenvalue
//! without applying the rotation.

use super::eigen::{EigenWorkspace, decompose};
use crate::error::{Error, Result};
use crate::model::structure::Structure;
use crate::model::types::{Point, Vector};
use nalgebra::{Quaternion, UnitQuaternion};

/// Rigid transformation mapping an "other" point set onto a "pivot" point set.
///
/// Applying it to a point `p` yields `rotation * (p - other_center) + pivot_center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimalTransformation {
    /// Centroid of the pivot set.
    pub pivot_center: Point,
    /// Centroid of the other set.
    pub other_center: Point,
    /// Rotation applied after moving the other centroid to the origin.
    pub rotation: UnitQuaternion<f64>,
    /// Root-mean-square deviation of the superimposed sets.
    pub rmsd: f64,
}

impl Default for OptimalTransformation {
    fn default() -> Self {
        Self::identity()
    }
}

impl OptimalTransformation {
    pub fn identity() -> Self {
        Self {
            pivot_center: Point::origin(),
            other_center: Point::origin(),
            rotation: UnitQuaternion::identity(),
            rmsd: 0.0,
        }
    }

    /// Finds the transformation superimposing `other` onto `pivot`.
    ///
    /// Allocates a fresh [`EigenWorkspace`]; use [`OptimalTransformation::find_with`] in loops.
    ///
    /// # Errors
    ///
    /// Fails on empty or differently sized inputs, or if the eigensolver does not converge.
    pub fn find(pivot: &[Point], other: &[Point]) -> Result<Self> {
        let mut ws = EigenWorkspace::new();
        Self::find_with(&mut ws, pivot, other)
    }

    /// Finds the transformation using caller-owned scratch space.
    pub fn find_with(ws: &mut EigenWorkspace, pivot: &[Point], other: &[Point]) -> Result<Self> {
        check_lengths(pivot, other)?;
        Self::find_pairs(ws, pivot.iter().copied().zip(other.iter().copied()))
    }

    /// Finds the transformation for an iterator of `(pivot, other)` point pairs.
    ///
    /// The iterator is walked twice: once for the centroids and once for the key matrix.
    pub fn find_pairs<I>(ws: &mut EigenWorkspace, pairs: I) -> Result<Self>
    where
        I: Iterator<Item = (Point, Point)> + Clone,
    {
        let (pivot_center, other_center) = centroids(pairs.clone())?;
        let (rotation, rmsd) = solve(ws, pairs, &pivot_center.coords, &other_center.coords)?;
        Ok(Self {
            pivot_center,
            other_center,
            rotation,
            rmsd,
        })
    }

    /// Optimal RMSD of two point sets without building the transformation.
    pub fn rmsd_with(ws: &mut EigenWorkspace, pivot: &[Point], other: &[Point]) -> Result<f64> {
        check_lengths(pivot, other)?;
        Self::rmsd_pairs(ws, pivot.iter().copied().zip(other.iter().copied()))
    }

    /// Optimal RMSD for an iterator of `(pivot, other)` point pairs.
    pub fn rmsd_pairs<I>(ws: &mut EigenWorkspace, pairs: I) -> Result<f64>
    where
        I: Iterator<Item = (Point, Point)> + Clone,
    {
        let (pivot_center, other_center) = centroids(pairs.clone())?;
        solve(ws, pairs, &pivot_center.coords, &other_center.coords).map(|(_, rmsd)| rmsd)
    }

    /// Optimal RMSD of pairs that are already centered; only the rotation is optimized.
    pub fn rmsd_centered<I>(ws: &mut EigenWorkspace, pairs: I) -> Result<f64>
    where
        I: Iterator<Item = (Point, Point)>,
    {
        let zero = Vector::zeros();
        solve(ws, pairs, &zero, &zero).map(|(_, rmsd)| rmsd)
    }

    /// Maps a single point of the "other" frame into the pivot frame.
    pub fn apply(&self, point: &Point) -> Point {
        self.pivot_center + self.rotation * (point - self.other_center)
    }

    /// Maps every point in place.
    pub fn apply_all(&self, points: &mut [Point]) {
        for point in points.iter_mut() {
            *point = self.apply(point);
        }
    }

    /// Maps every atom of `structure` in place.
    pub fn apply_to_structure(&self, structure: &mut Structure) {
        structure.transform_positions(|p| self.apply(p));
    }
}

fn check_lengths(pivot: &[Point], other: &[Point]) -> Result<()> {
    if pivot.len() != other.len() {
        return Err(Error::PointCountMismatch {
            pivot: pivot.len(),
            other: other.len(),
        });
    }
    Ok(())
}

fn centroids<I>(pairs: I) -> Result<(Point, Point)>
where
    I: Iterator<Item = (Point, Point)>,
{
    let mut count = 0usize;
    let mut pivot_sum = Vector::zeros();
    let mut other_sum = Vector::zeros();
    for (p, o) in pairs {
        pivot_sum += p.coords;
        other_sum += o.coords;
        count += 1;
    }
    if count == 0 {
        return Err(Error::EmptyPointSet);
    }
    let n = count as f64;
    Ok((Point::from(pivot_sum / n), Point::from(other_sum / n)))
}

fn solve<I>(
    ws: &mut EigenWorkspace,
    pairs: I,
    pivot_center: &Vector,
    other_center: &Vector,
) -> Result<(UnitQuaternion<f64>, f64)>
where
    I: Iterator<Item = (Point, Point)>,
{
    let mut count = 0usize;
    let mut sum_sq = 0.0;
    let mut n = [0.0f64; 10];

    for (p, o) in pairs {
        let b = p.coords - pivot_center;
        let a = o.coords - other_center;
        let (ax, ay, az) = (a.x, a.y, a.z);
        let (bx, by, bz) = (b.x, b.y, b.z);

        sum_sq += a.norm_squared() + b.norm_squared();
        n[0] += ax * bx + ay * by + az * bz;
        n[1] += ay * bz - az * by;
        n[2] += az * bx - ax * bz;
        n[3] += ax * by - ay * bx;
        n[4] += ax * bx - ay * by - az * bz;
        n[5] += ay * bx + ax * by;
        n[6] += az * bx + ax * bz;
        n[7] += -ax * bx + ay * by - az * bz;
        n[8] += az * by + ay * bz;
        n[9] += -ax * bx - ay * by + az * bz;
        count += 1;
    }

    if count == 0 {
        return Err(Error::EmptyPointSet);
    }

    ws.clear();
    ws.set_symmetric(0, 0, n[0]);
    ws.set_symmetric(0, 1, n[1]);
    ws.set_symmetric(0, 2, n[2]);
    ws.set_symmetric(0, 3, n[3]);
    ws.set_symmetric(1, 1, n[4]);
    ws.set_symmetric(1, 2, n[5]);
    ws.set_symmetric(1, 3, n[6]);
    ws.set_symmetric(2, 2, n[7]);
    ws.set_symmetric(2, 3, n[8]);
    ws.set_symmetric(3, 3, n[9]);
    decompose(ws)?;

    let lambda = ws.values()[3];
    let rmsd = ((sum_sq - 2.0 * lambda.abs()).max(0.0) / count as f64).sqrt();

    let rotation = if n.iter().all(|&v| v == 0.0) {
        UnitQuaternion::identity()
    } else {
        let q = ws.vector(3);
        UnitQuaternion::from_quaternion(Quaternion::new(q[0], q[1], q[2], q[3]))
    };

    Ok((rotation, rmsd))
}
