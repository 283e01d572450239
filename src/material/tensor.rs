//! Fourth-order elasticity tensors for anisotropic vessel walls.
//!
//! Material components are authored in the cylindrical frame of the vessel
//! path, indexed `q` (circumferential) = 0, `z` (axial) = 1, `r` (radial) = 2.
//! Each mesh face has its own geometric frame built from the triangle edges.
//! [`rotate`] carries the tensor from one frame to the other and [`project`]
//! reduces it to the 5x5 stiffness matrix consumed by the wall solver.

use nalgebra::{Matrix3, SMatrix, Vector3};

pub type Tensor4 = [[[[f64; 3]; 3]; 3]; 3];
pub type Stiffness = SMatrix<f64, 5, 5>;

const Q: usize = 0;
const Z: usize = 1;
const R: usize = 2;

/// Index pairs of the rows and columns of the projected stiffness matrix.
const PAIRS: [(usize, usize); 5] = [(0, 0), (1, 1), (0, 1), (2, 0), (2, 1)];

const DEGENERATE_EPS: f64 = 1e-12;

/// Set `c[i][j][k][l]` and every entry related to it by minor and major
/// symmetry.
fn set_symmetric(c: &mut Tensor4, (i, j, k, l): (usize, usize, usize, usize), value: f64) {
    for (a, b, m, n) in [
        (i, j, k, l), (j, i, k, l), (i, j, l, k), (j, i, l, k),
        (k, l, i, j), (l, k, i, j), (k, l, j, i), (l, k, j, i),
    ] {
        c[a][b][m][n] = value;
    }
}

/// Build the tensor from its six independent components, in the order
/// `C_qqqq, C_qqzz, C_zzzz, 0.25*(C_qzqz+C_qzzq+C_zqzq+C_zqqz), C_rqrq, C_rzrz`.
pub fn elasticity_tensor(components: &[f64; 6]) -> Tensor4 {
    let [qqqq, qqzz, zzzz, qzqz, rqrq, rzrz] = *components;
    let mut c = [[[[0.0; 3]; 3]; 3]; 3];
    set_symmetric(&mut c, (Q, Q, Q, Q), qqqq);
    set_symmetric(&mut c, (Q, Q, Z, Z), qqzz);
    set_symmetric(&mut c, (Z, Z, Z, Z), zzzz);
    set_symmetric(&mut c, (Q, Z, Q, Z), qzqz);
    set_symmetric(&mut c, (R, Q, R, Q), rqrq);
    set_symmetric(&mut c, (R, Z, R, Z), rzrz);
    c
}

/// Orthonormal frame of a triangle, as matrix columns `(e1, e2, n)`.
///
/// `e1` runs along the first edge and `n` is the face normal. Returns `None`
/// for a degenerate triangle.
pub fn geometric_triad(p0: Vector3<f64>, p1: Vector3<f64>, p2: Vector3<f64>) -> Option<Matrix3<f64>> {
    let e1 = (p1 - p0).try_normalize(DEGENERATE_EPS)?;
    let n = e1.cross(&(p2 - p0)).try_normalize(DEGENERATE_EPS)?;
    let e2 = n.cross(&e1);
    Some(Matrix3::from_columns(&[e1, e2, n]))
}

/// Material frame at a path point, as matrix columns `(q, z, r)`.
///
/// `z` follows the tangent and `r` is the path normal with its tangential
/// part removed. Returns `None` when the two are parallel.
pub fn path_triad(tangent: Vector3<f64>, normal: Vector3<f64>) -> Option<Matrix3<f64>> {
    let z = tangent.try_normalize(DEGENERATE_EPS)?;
    let r = (normal - z * normal.dot(&z)).try_normalize(DEGENERATE_EPS)?;
    let q = z.cross(&r);
    Some(Matrix3::from_columns(&[q, z, r]))
}

/// `R_ij = g_i . m_j` for target frame `g` and source frame `m`.
pub fn rotation_between(target: &Matrix3<f64>, source: &Matrix3<f64>) -> Matrix3<f64> {
    target.transpose() * source
}

/// `C'_ijkl = R_ia R_jb R_kc R_ld C_abcd`, contracted one index at a time.
pub fn rotate(c: &Tensor4, rot: &Matrix3<f64>) -> Tensor4 {
    let mut a = [[[[0.0; 3]; 3]; 3]; 3];
    let mut b = [[[[0.0; 3]; 3]; 3]; 3];
    for i in 0..3 { for j in 0..3 { for k in 0..3 { for l in 0..3 {
        a[i][j][k][l] = (0..3).map(|m| rot[(i, m)] * c[m][j][k][l]).sum();
    }}}}
    for i in 0..3 { for j in 0..3 { for k in 0..3 { for l in 0..3 {
        b[i][j][k][l] = (0..3).map(|m| rot[(j, m)] * a[i][m][k][l]).sum();
    }}}}
    for i in 0..3 { for j in 0..3 { for k in 0..3 { for l in 0..3 {
        a[i][j][k][l] = (0..3).map(|m| rot[(k, m)] * b[i][j][m][l]).sum();
    }}}}
    for i in 0..3 { for j in 0..3 { for k in 0..3 { for l in 0..3 {
        b[i][j][k][l] = (0..3).map(|m| rot[(l, m)] * a[i][j][k][m]).sum();
    }}}}
    b
}

/// Symmetrised contraction onto the five in-plane/transverse index pairs.
pub fn project(c: &Tensor4) -> Stiffness {
    Stiffness::from_fn(|row, col| {
        let (i, j) = PAIRS[row];
        let (k, l) = PAIRS[col];
        0.25 * (c[i][j][k][l] + c[j][i][k][l] + c[i][j][l][k] + c[j][i][l][k])
    })
}

/// Upper triangle of `k`, row by row.
pub fn upper_triangle(k: &Stiffness) -> [f64; 15] {
    let mut out = [0.0; 15];
    let mut n = 0;
    for row in 0..5 {
        for col in row..5 {
            out[n] = k[(row, col)];
            n += 1;
        }
    }
    out
}
