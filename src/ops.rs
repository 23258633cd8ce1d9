//! Operator overloads and elementary functions for [`Obs`].
//!
//! Every operation, including plain `+`, flows through the derived-observable
//! engine so that fluctuations propagate with analytic gradients and scalar
//! operands behave as constant observables.

use crate::derived::{binary, unary, Operand};
use crate::obs::Obs;
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! obs_binop {
    ($trait:ident, $method:ident, $f:expr) => {
        impl $trait<&Obs> for &Obs {
            type Output = Obs;
            fn $method(self, rhs: &Obs) -> Obs {
                binary(Operand::Obs(self), Operand::Obs(rhs), $f)
            }
        }

        impl $trait<Obs> for Obs {
            type Output = Obs;
            fn $method(self, rhs: Obs) -> Obs {
                $trait::$method(&self, &rhs)
            }
        }

        impl $trait<&Obs> for Obs {
            type Output = Obs;
            fn $method(self, rhs: &Obs) -> Obs {
                $trait::$method(&self, rhs)
            }
        }

        impl $trait<Obs> for &Obs {
            type Output = Obs;
            fn $method(self, rhs: Obs) -> Obs {
                $trait::$method(self, &rhs)
            }
        }

        impl $trait<f64> for &Obs {
            type Output = Obs;
            fn $method(self, rhs: f64) -> Obs {
                binary(Operand::Obs(self), Operand::Scalar(rhs), $f)
            }
        }

        impl $trait<f64> for Obs {
            type Output = Obs;
            fn $method(self, rhs: f64) -> Obs {
                $trait::$method(&self, rhs)
            }
        }

        impl $trait<&Obs> for f64 {
            type Output = Obs;
            fn $method(self, rhs: &Obs) -> Obs {
                binary(Operand::Scalar(self), Operand::Obs(rhs), $f)
            }
        }

        impl $trait<Obs> for f64 {
            type Output = Obs;
            fn $method(self, rhs: Obs) -> Obs {
                $trait::$method(self, &rhs)
            }
        }
    };
}

obs_binop!(Add, add, |a, b| a + b);
obs_binop!(Sub, sub, |a, b| a - b);
obs_binop!(Mul, mul, |a, b| a * b);
obs_binop!(Div, div, |a, b| a / b);

impl Neg for &Obs {
    type Output = Obs;
    fn neg(self) -> Obs {
        unary(self, |x| -x)
    }
}

impl Neg for Obs {
    type Output = Obs;
    fn neg(self) -> Obs {
        -&self
    }
}

impl Obs {
    pub fn exp(&self) -> Obs {
        unary(self, |x| x.exp())
    }

    pub fn ln(&self) -> Obs {
        unary(self, |x| x.ln())
    }

    pub fn sqrt(&self) -> Obs {
        unary(self, |x| x.sqrt())
    }

    pub fn sin(&self) -> Obs {
        unary(self, |x| x.sin())
    }

    pub fn cos(&self) -> Obs {
        unary(self, |x| x.cos())
    }

    pub fn tan(&self) -> Obs {
        unary(self, |x| x.tan())
    }

    pub fn sinh(&self) -> Obs {
        unary(self, |x| x.sinh())
    }

    pub fn cosh(&self) -> Obs {
        unary(self, |x| x.cosh())
    }

    pub fn tanh(&self) -> Obs {
        unary(self, |x| x.tanh())
    }

    pub fn asinh(&self) -> Obs {
        unary(self, |x| x.asinh())
    }

    pub fn acosh(&self) -> Obs {
        unary(self, |x| x.acosh())
    }

    /// |x|; the gradient at exactly zero is taken as zero.
    pub fn abs(&self) -> Obs {
        unary(self, |x| x.abs())
    }

    pub fn powi(&self, n: i32) -> Obs {
        unary(self, move |x| x.powi(n))
    }

    pub fn powf(&self, p: f64) -> Obs {
        unary(self, move |x| x.powf(p))
    }

    pub fn recip(&self) -> Obs {
        unary(self, |x| x.recip())
    }
}
