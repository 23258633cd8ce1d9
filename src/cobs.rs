use crate::derived::{binary, Operand};
use crate::obs::Obs;
use num_complex::Complex64;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Complex-valued observable: a pair of real observables with component-wise
/// arithmetic and conjugation. The magnitude goes through the derived engine
/// like any other nonlinear function.
#[derive(Debug, Clone)]
pub struct CObs {
    real: Obs,
    imag: Obs,
}

impl CObs {
    pub fn new(real: Obs, imag: Obs) -> CObs {
        CObs { real, imag }
    }

    /// Purely real complex observable (vanishing imaginary part on the same
    /// replicas).
    pub fn from_real(real: Obs) -> CObs {
        let imag = &real * 0.0;
        CObs { real, imag }
    }

    pub fn real(&self) -> &Obs {
        &self.real
    }

    pub fn imag(&self) -> &Obs {
        &self.imag
    }

    pub fn conjugate(&self) -> CObs {
        CObs {
            real: self.real.clone(),
            imag: -&self.imag,
        }
    }

    /// |z| = sqrt(re^2 + im^2), fluctuations propagated through the derived
    /// engine.
    pub fn abs(&self) -> Obs {
        binary(
            Operand::Obs(&self.real),
            Operand::Obs(&self.imag),
            |re, im| (re * re + im * im).sqrt(),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.real.is_zero() && self.imag.is_zero()
    }
}

impl fmt::Display for CObs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CObs[({}) + ({})j]", self.real.value(), self.imag.value())
    }
}

impl PartialEq for CObs {
    fn eq(&self, other: &CObs) -> bool {
        (self - other).is_zero()
    }
}

impl Add<&CObs> for &CObs {
    type Output = CObs;
    fn add(self, rhs: &CObs) -> CObs {
        CObs {
            real: &self.real + &rhs.real,
            imag: &self.imag + &rhs.imag,
        }
    }
}

impl Sub<&CObs> for &CObs {
    type Output = CObs;
    fn sub(self, rhs: &CObs) -> CObs {
        CObs {
            real: &self.real - &rhs.real,
            imag: &self.imag - &rhs.imag,
        }
    }
}

impl Mul<&CObs> for &CObs {
    type Output = CObs;
    fn mul(self, rhs: &CObs) -> CObs {
        CObs {
            real: (&self.real * &rhs.real) - (&self.imag * &rhs.imag),
            imag: (&self.real * &rhs.imag) + (&self.imag * &rhs.real),
        }
    }
}

impl Div<&CObs> for &CObs {
    type Output = CObs;
    fn div(self, rhs: &CObs) -> CObs {
        let denom = (&rhs.real * &rhs.real) + (&rhs.imag * &rhs.imag);
        let num = self * &rhs.conjugate();
        CObs {
            real: &num.real / &denom,
            imag: &num.imag / &denom,
        }
    }
}

impl Neg for &CObs {
    type Output = CObs;
    fn neg(self) -> CObs {
        CObs {
            real: -&self.real,
            imag: -&self.imag,
        }
    }
}

impl Neg for CObs {
    type Output = CObs;
    fn neg(self) -> CObs {
        -&self
    }
}

impl Add<Complex64> for &CObs {
    type Output = CObs;
    fn add(self, rhs: Complex64) -> CObs {
        CObs {
            real: &self.real + rhs.re,
            imag: &self.imag + rhs.im,
        }
    }
}

impl Sub<Complex64> for &CObs {
    type Output = CObs;
    fn sub(self, rhs: Complex64) -> CObs {
        CObs {
            real: &self.real - rhs.re,
            imag: &self.imag - rhs.im,
        }
    }
}

impl Mul<Complex64> for &CObs {
    type Output = CObs;
    fn mul(self, rhs: Complex64) -> CObs {
        CObs {
            real: (&self.real * rhs.re) - (&self.imag * rhs.im),
            imag: (&self.real * rhs.im) + (&self.imag * rhs.re),
        }
    }
}

impl Div<Complex64> for &CObs {
    type Output = CObs;
    fn div(self, rhs: Complex64) -> CObs {
        self * (Complex64::new(1.0, 0.0) / rhs)
    }
}

impl Add<f64> for &CObs {
    type Output = CObs;
    fn add(self, rhs: f64) -> CObs {
        CObs {
            real: &self.real + rhs,
            imag: self.imag.clone(),
        }
    }
}

impl Sub<f64> for &CObs {
    type Output = CObs;
    fn sub(self, rhs: f64) -> CObs {
        CObs {
            real: &self.real - rhs,
            imag: self.imag.clone(),
        }
    }
}

impl Mul<f64> for &CObs {
    type Output = CObs;
    fn mul(self, rhs: f64) -> CObs {
        CObs {
            real: &self.real * rhs,
            imag: &self.imag * rhs,
        }
    }
}

impl Div<f64> for &CObs {
    type Output = CObs;
    fn div(self, rhs: f64) -> CObs {
        CObs {
            real: &self.real / rhs,
            imag: &self.imag / rhs,
        }
    }
}

// Scalar on the left of a complex observable.
macro_rules! cobs_scalar_lhs {
    ($scalar:ty) => {
        impl Add<&CObs> for $scalar {
            type Output = CObs;
            fn add(self, rhs: &CObs) -> CObs {
                rhs + self
            }
        }

        impl Add<CObs> for $scalar {
            type Output = CObs;
            fn add(self, rhs: CObs) -> CObs {
                &rhs + self
            }
        }

        impl Sub<&CObs> for $scalar {
            type Output = CObs;
            fn sub(self, rhs: &CObs) -> CObs {
                -rhs + self
            }
        }

        impl Sub<CObs> for $scalar {
            type Output = CObs;
            fn sub(self, rhs: CObs) -> CObs {
                -&rhs + self
            }
        }

        impl Mul<&CObs> for $scalar {
            type Output = CObs;
            fn mul(self, rhs: &CObs) -> CObs {
                rhs * self
            }
        }

        impl Mul<CObs> for $scalar {
            type Output = CObs;
            fn mul(self, rhs: CObs) -> CObs {
                &rhs * self
            }
        }

        impl Div<&CObs> for $scalar {
            type Output = CObs;
            fn div(self, rhs: &CObs) -> CObs {
                let denom = (&rhs.real * &rhs.real) + (&rhs.imag * &rhs.imag);
                let num = &rhs.conjugate() * self;
                CObs {
                    real: &num.real / &denom,
                    imag: &num.imag / &denom,
                }
            }
        }

        impl Div<CObs> for $scalar {
            type Output = CObs;
            fn div(self, rhs: CObs) -> CObs {
                self / &rhs
            }
        }
    };
}

cobs_scalar_lhs!(Complex64);
cobs_scalar_lhs!(f64);

// By-value forwarding for the pairwise operators and scalar right-hand sides.
macro_rules! cobs_forward {
    ($trait:ident, $method:ident) => {
        impl $trait<CObs> for CObs {
            type Output = CObs;
            fn $method(self, rhs: CObs) -> CObs {
                $trait::$method(&self, &rhs)
            }
        }

        impl $trait<CObs> for &CObs {
            type Output = CObs;
            fn $method(self, rhs: CObs) -> CObs {
                $trait::$method(self, &rhs)
            }
        }

        impl $trait<&CObs> for CObs {
            type Output = CObs;
            fn $method(self, rhs: &CObs) -> CObs {
                $trait::$method(&self, rhs)
            }
        }

        impl $trait<Complex64> for CObs {
            type Output = CObs;
            fn $method(self, rhs: Complex64) -> CObs {
                $trait::$method(&self, rhs)
            }
        }

        impl $trait<f64> for CObs {
            type Output = CObs;
            fn $method(self, rhs: f64) -> CObs {
                $trait::$method(&self, rhs)
            }
        }
    };
}

cobs_forward!(Add, add);
cobs_forward!(Sub, sub);
cobs_forward!(Mul, mul);
cobs_forward!(Div, div);
