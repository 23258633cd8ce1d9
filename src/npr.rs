//! Gamma-matrix catalogue and momentum-tagged propagator matrices for
//! nonperturbative renormalization.

use crate::error::GammetError;
use ndarray::{Array1, Array2};
use num_complex::Complex64;

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// Euclidean gamma matrices in the chiral (Grid) basis.
pub fn gamma_x() -> Array2<Complex64> {
    let o = c(0.0, 0.0);
    let i = c(0.0, 1.0);
    Array2::from_shape_vec(
        (4, 4),
        vec![o, o, o, i, o, o, i, o, o, -i, o, o, -i, o, o, o],
    )
    .unwrap()
}

pub fn gamma_y() -> Array2<Complex64> {
    let o = c(0.0, 0.0);
    let u = c(1.0, 0.0);
    Array2::from_shape_vec(
        (4, 4),
        vec![o, o, o, -u, o, o, u, o, o, u, o, o, -u, o, o, o],
    )
    .unwrap()
}

pub fn gamma_z() -> Array2<Complex64> {
    let o = c(0.0, 0.0);
    let i = c(0.0, 1.0);
    Array2::from_shape_vec(
        (4, 4),
        vec![o, o, i, o, o, o, o, -i, -i, o, o, o, o, i, o, o],
    )
    .unwrap()
}

pub fn gamma_t() -> Array2<Complex64> {
    let o = c(0.0, 0.0);
    let u = c(1.0, 0.0);
    Array2::from_shape_vec(
        (4, 4),
        vec![o, o, u, o, o, o, o, u, u, o, o, o, o, u, o, o],
    )
    .unwrap()
}

pub fn gamma_5() -> Array2<Complex64> {
    let o = c(0.0, 0.0);
    let u = c(1.0, 0.0);
    Array2::from_shape_vec(
        (4, 4),
        vec![u, o, o, o, o, u, o, o, o, o, -u, o, o, o, o, -u],
    )
    .unwrap()
}

pub fn identity() -> Array2<Complex64> {
    Array2::eye(4)
}

/// sigma_{mu nu} = 1/2 [gamma_mu, gamma_nu]
fn sigma(mu: &Array2<Complex64>, nu: &Array2<Complex64>) -> Array2<Complex64> {
    (mu.dot(nu) - nu.dot(mu)).mapv(|x| x * 0.5)
}

/// Look up a gamma structure by its Grid tag.
///
/// The closed set is `Identity`, `Gamma5`, `GammaX/Y/Z/T`,
/// `Gamma{X,Y,Z,T}Gamma5` and `Sigma{XY,XZ,XT,YZ,YT,ZT}`; any other tag is an
/// error.
pub fn grid_gamma(tag: &str) -> Result<Array2<Complex64>, GammetError> {
    let g = match tag {
        "Identity" => identity(),
        "Gamma5" => gamma_5(),
        "GammaX" => gamma_x(),
        "GammaY" => gamma_y(),
        "GammaZ" => gamma_z(),
        "GammaT" => gamma_t(),
        "GammaXGamma5" => gamma_x().dot(&gamma_5()),
        "GammaYGamma5" => gamma_y().dot(&gamma_5()),
        "GammaZGamma5" => gamma_z().dot(&gamma_5()),
        "GammaTGamma5" => gamma_t().dot(&gamma_5()),
        "SigmaXY" => sigma(&gamma_x(), &gamma_y()),
        "SigmaXZ" => sigma(&gamma_x(), &gamma_z()),
        "SigmaXT" => sigma(&gamma_x(), &gamma_t()),
        "SigmaYZ" => sigma(&gamma_y(), &gamma_z()),
        "SigmaYT" => sigma(&gamma_y(), &gamma_t()),
        "SigmaZT" => sigma(&gamma_z(), &gamma_t()),
        _ => return Err(GammetError::UnknownGammaTag(tag.to_string())),
    };
    Ok(g)
}

/// Complex matrix annotated with the incoming and outgoing momenta of the
/// vertex it was measured at. Plain composition around an `ndarray` matrix;
/// the operators delegate to the inner matrix and propagate the labels.
#[derive(Debug, Clone)]
pub struct NprMatrix {
    matrix: Array2<Complex64>,
    mom_in: Option<Array1<f64>>,
    mom_out: Option<Array1<f64>>,
}

impl NprMatrix {
    pub fn new(matrix: Array2<Complex64>) -> NprMatrix {
        NprMatrix {
            matrix,
            mom_in: None,
            mom_out: None,
        }
    }

    pub fn with_momenta(
        matrix: Array2<Complex64>,
        mom_in: Option<Array1<f64>>,
        mom_out: Option<Array1<f64>>,
    ) -> NprMatrix {
        NprMatrix {
            matrix,
            mom_in,
            mom_out,
        }
    }

    pub fn matrix(&self) -> &Array2<Complex64> {
        &self.matrix
    }

    pub fn mom_in(&self) -> Option<&Array1<f64>> {
        self.mom_in.as_ref()
    }

    pub fn mom_out(&self) -> Option<&Array1<f64>> {
        self.mom_out.as_ref()
    }

    /// Matrix product with momentum-flow compatibility: the incoming momentum
    /// of the left operand has to match the outgoing momentum of the right
    /// operand when both are tagged; absent tags propagate from whichever
    /// operand carries them.
    pub fn matmul(&self, rhs: &NprMatrix) -> Result<NprMatrix, GammetError> {
        if let (Some(a), Some(b)) = (&self.mom_in, &rhs.mom_out) {
            if !momenta_close(a, b) {
                return Err(GammetError::StateMismatch(format!(
                    "Momentum flow does not match: {:?} vs {:?}",
                    a, b
                )));
            }
        }
        Ok(NprMatrix {
            matrix: self.matrix.dot(&rhs.matrix),
            mom_out: self.mom_out.clone().or_else(|| rhs.mom_out.clone()),
            mom_in: rhs.mom_in.clone().or_else(|| self.mom_in.clone()),
        })
    }

    /// Gamma_5 hermitean conjugate:
    /// `(I_3 x gamma_5) M^H (I_3 x gamma_5)` with incoming and outgoing
    /// momenta exchanged. Defined for 12x12 matrices only.
    pub fn g5h(&self) -> Result<NprMatrix, GammetError> {
        if self.matrix.dim() != (12, 12) {
            return Err(GammetError::ShapeMismatch(format!(
                "g5H only works for 12x12 matrices, got {:?}",
                self.matrix.dim()
            )));
        }
        let extended_g5 = kron_eye3(&gamma_5());
        let m_dagger = self.matrix.t().mapv(|x| x.conj());
        Ok(NprMatrix {
            matrix: extended_g5.dot(&m_dagger).dot(&extended_g5),
            mom_in: self.mom_out.clone(),
            mom_out: self.mom_in.clone(),
        })
    }
}

/// `I_3 (x) g`: block-diagonal embedding of a 4x4 spin matrix into the
/// 12-dimensional color-spin space.
fn kron_eye3(g: &Array2<Complex64>) -> Array2<Complex64> {
    let mut out = Array2::<Complex64>::zeros((12, 12));
    for b in 0..3 {
        for i in 0..4 {
            for j in 0..4 {
                out[[4 * b + i, 4 * b + j]] = g[[i, j]];
            }
        }
    }
    out
}

fn momenta_close(a: &Array1<f64>, b: &Array1<f64>) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= 1e-8 + 1e-5 * y.abs())
}
