//! Symmetric 4×4 eigen-decomposition used by the quaternion superposition.
//!
//! The solver reduces the matrix to tridiagonal form with Householder reflections and then
//! diagonalizes it with implicit-shift QL iterations. Everything lives in a caller-owned
//! [`EigenWorkspace`], so repeated superpositions in hot loops never allocate.

use crate::error::{Error, Result};

const ORDER: usize = 4;

/// Iteration cap for a single eigenvalue before the decomposition is declared divergent.
pub const MAX_ITERATIONS: usize = 1000;

/// Scratch buffers for one decomposition at a time.
///
/// Load the symmetric input with [`EigenWorkspace::set_symmetric`], call [`decompose`], then
/// read eigenvalues (ascending) and the matching eigenvectors (matrix columns).
#[derive(Debug, Clone, Default)]
pub struct EigenWorkspace {
    vectors: [[f64; ORDER]; ORDER],
    values: [f64; ORDER],
    off_diagonal: [f64; ORDER],
}

impl EigenWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `value` into both `(row, col)` and `(col, row)`.
    pub fn set_symmetric(&mut self, row: usize, col: usize, value: f64) {
        self.vectors[row][col] = value;
        self.vectors[col][row] = value;
    }

    pub fn clear(&mut self) {
        self.vectors = [[0.0; ORDER]; ORDER];
        self.values = [0.0; ORDER];
        self.off_diagonal = [0.0; ORDER];
    }

    /// Eigenvalues in ascending order, valid after [`decompose`].
    pub fn values(&self) -> &[f64; ORDER] {
        &self.values
    }

    /// Eigenvector belonging to `values()[index]`.
    pub fn vector(&self, index: usize) -> [f64; ORDER] {
        [
            self.vectors[0][index],
            self.vectors[1][index],
            self.vectors[2][index],
            self.vectors[3][index],
        ]
    }

    fn is_zero(&self) -> bool {
        self.vectors.iter().flatten().all(|&v| v == 0.0)
    }
}

/// Decomposes the symmetric matrix loaded into `ws` in place.
///
/// # Errors
///
/// Returns [`Error::NotConverging`] when a QL sweep exceeds [`MAX_ITERATIONS`].
pub fn decompose(ws: &mut EigenWorkspace) -> Result<()> {
    if ws.is_zero() {
        ws.values = [0.0; ORDER];
        ws.vectors = identity();
        return Ok(());
    }
    tridiagonalize(ws);
    diagonalize(ws)
}

fn identity() -> [[f64; ORDER]; ORDER] {
    let mut m = [[0.0; ORDER]; ORDER];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

fn tridiagonalize(ws: &mut EigenWorkspace) {
    let n = ORDER;
    let v = &mut ws.vectors;
    let d = &mut ws.values;
    let e = &mut ws.off_diagonal;

    for j in 0..n {
        d[j] = v[n - 1][j];
    }

    for i in (1..n).rev() {
        let mut scale = 0.0;
        let mut h = 0.0;
        for dk in d.iter().take(i) {
            scale += dk.abs();
        }

        if scale == 0.0 {
            e[i] = d[i - 1];
            for j in 0..i {
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
                v[j][i] = 0.0;
            }
        } else {
            for k in 0..i {
                d[k] /= scale;
                h += d[k] * d[k];
            }
            let mut f = d[i - 1];
            let mut g = h.sqrt();
            if f > 0.0 {
                g = -g;
            }
            e[i] = scale * g;
            h -= f * g;
            d[i - 1] = f - g;
            for ej in e.iter_mut().take(i) {
                *ej = 0.0;
            }

            for j in 0..i {
                f = d[j];
                v[j][i] = f;
                g = e[j] + v[j][j] * f;
                for k in (j + 1)..i {
                    g += v[k][j] * d[k];
                    e[k] += v[k][j] * f;
                }
                e[j] = g;
            }

            f = 0.0;
            for j in 0..i {
                e[j] /= h;
                f += e[j] * d[j];
            }
            let hh = f / (h + h);
            for j in 0..i {
                e[j] -= hh * d[j];
            }
            for j in 0..i {
                f = d[j];
                g = e[j];
                for k in j..i {
                    v[k][j] -= f * e[k] + g * d[k];
                }
                d[j] = v[i - 1][j];
                v[i][j] = 0.0;
            }
        }
        d[i] = h;
    }

    for i in 0..(n - 1) {
        v[n - 1][i] = v[i][i];
        v[i][i] = 1.0;
        let h = d[i + 1];
        if h != 0.0 {
            for k in 0..=i {
                d[k] = v[k][i + 1] / h;
            }
            for j in 0..=i {
                let mut g = 0.0;
                for k in 0..=i {
                    g += v[k][i + 1] * v[k][j];
                }
                for k in 0..=i {
                    v[k][j] -= g * d[k];
                }
            }
        }
        for row in v.iter_mut().take(i + 1) {
            row[i + 1] = 0.0;
        }
    }

    for j in 0..n {
        d[j] = v[n - 1][j];
        v[n - 1][j] = 0.0;
    }
    v[n - 1][n - 1] = 1.0;
    e[0] = 0.0;
}

fn diagonalize(ws: &mut EigenWorkspace) -> Result<()> {
    let n = ORDER;
    let v = &mut ws.vectors;
    let d = &mut ws.values;
    let e = &mut ws.off_diagonal;

    for i in 1..n {
        e[i - 1] = e[i];
    }
    e[n - 1] = 0.0;

    let mut f = 0.0;
    let mut tst1: f64 = 0.0;
    let eps = f64::EPSILON;

    for l in 0..n {
        tst1 = tst1.max(d[l].abs() + e[l].abs());
        let mut m = l;
        while m < n - 1 {
            if e[m].abs() <= eps * tst1 {
                break;
            }
            m += 1;
        }

        if m > l {
            let mut iterations = 0;
            loop {
                iterations += 1;
                if iterations > MAX_ITERATIONS {
                    return Err(Error::NotConverging {
                        iterations: MAX_ITERATIONS,
                    });
                }

                let mut g = d[l];
                let mut p = (d[l + 1] - g) / (2.0 * e[l]);
                let mut r = p.hypot(1.0);
                if p < 0.0 {
                    r = -r;
                }
                d[l] = e[l] / (p + r);
                d[l + 1] = e[l] * (p + r);
                let dl1 = d[l + 1];
                let mut h = g - d[l];
                for di in d.iter_mut().skip(l + 2) {
                    *di -= h;
                }
                f += h;

                p = d[m];
                let mut c = 1.0;
                let mut c2 = c;
                let mut c3 = c;
                let el1 = e[l + 1];
                let mut s = 0.0;
                let mut s2 = 0.0;
                for i in (l..m).rev() {
                    c3 = c2;
                    c2 = c;
                    s2 = s;
                    g = c * e[i];
                    h = c * p;
                    r = p.hypot(e[i]);
                    e[i + 1] = s * r;
                    s = e[i] / r;
                    c = p / r;
                    p = c * d[i] - s * g;
                    d[i + 1] = h + s * (c * g + s * d[i]);

                    for row in v.iter_mut() {
                        h = row[i + 1];
                        row[i + 1] = s * row[i] + c * h;
                        row[i] = c * row[i] - s * h;
                    }
                }
                p = -s * s2 * c3 * el1 * e[l] / dl1;
                e[l] = s * p;
                d[l] = c * p;

                if e[l].abs() <= eps * tst1 {
                    break;
                }
            }
        }
        d[l] += f;
        e[l] = 0.0;
    }

    for i in 0..(n - 1) {
        let mut k = i;
        let mut p = d[i];
        for (j, &dj) in d.iter().enumerate().skip(i + 1) {
            if dj < p {
                k = j;
                p = dj;
            }
        }
        if k != i {
            d[k] = d[i];
            d[i] = p;
            for row in v.iter_mut() {
                row.swap(i, k);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix4, SymmetricEigen};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn load(ws: &mut EigenWorkspace, m: &Matrix4<f64>) {
        ws.clear();
        for i in 0..4 {
            for j in i..4 {
                ws.set_symmetric(i, j, m[(i, j)]);
            }
        }
    }

    fn random_symmetric(rng: &mut StdRng) -> Matrix4<f64> {
        let mut m = Matrix4::zeros();
        for i in 0..4 {
            for j in i..4 {
                let value: f64 = rng.random_range(-10.0..10.0);
                m[(i, j)] = value;
                m[(j, i)] = value;
            }
        }
        m
    }

    #[test]
    fn diagonal_matrix_yields_sorted_diagonal() {
        let mut ws = EigenWorkspace::new();
        ws.set_symmetric(0, 0, 3.0);
        ws.set_symmetric(1, 1, -1.0);
        ws.set_symmetric(2, 2, 7.0);
        ws.set_symmetric(3, 3, 0.5);

        decompose(&mut ws).unwrap();

        let values = ws.values();
        assert!((values[0] + 1.0).abs() < 1e-12);
        assert!((values[1] - 0.5).abs() < 1e-12);
        assert!((values[2] - 3.0).abs() < 1e-12);
        assert!((values[3] - 7.0).abs() < 1e-12);

        let top = ws.vector(3);
        assert!((top[2].abs() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn zero_matrix_decomposes_to_identity() {
        let mut ws = EigenWorkspace::new();
        decompose(&mut ws).unwrap();

        assert!(ws.values().iter().all(|&v| v == 0.0));
        assert_eq!(ws.vector(3), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn eigenpairs_agree_with_nalgebra() {
        let mut rng = StdRng::seed_from_u64(17);
        let mut ws = EigenWorkspace::new();

        for _ in 0..50 {
            let m = random_symmetric(&mut rng);
            load(&mut ws, &m);
            decompose(&mut ws).unwrap();

            let mut expected: Vec<f64> = SymmetricEigen::new(m).eigenvalues.iter().copied().collect();
            expected.sort_by(|a, b| a.total_cmp(b));
            for (actual, expected) in ws.values().iter().zip(&expected) {
                assert!((actual - expected).abs() < 1e-9);
            }

            for k in 0..4 {
                let v = nalgebra::Vector4::from(ws.vector(k));
                let residual = m * v - ws.values()[k] * v;
                assert!(residual.norm() < 1e-9);
                assert!((v.norm() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn values_are_ascending() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ws = EigenWorkspace::new();
        let m = random_symmetric(&mut rng);
        load(&mut ws, &m);
        decompose(&mut ws).unwrap();

        let values = ws.values();
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
    }
}
