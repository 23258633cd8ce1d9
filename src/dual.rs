use std::ops::{Add, Div, Mul, Neg, Sub};

/// Forward-mode dual number `(primal, tangent)`.
///
/// The derived-observable engine evaluates user functions on duals to obtain
/// analytic gradients: seeding `eps = 1` on one argument at a time yields the
/// partial derivative with respect to that argument. The elementary operation
/// set is fixed; anything expressible in it differentiates exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual {
    pub re: f64,
    pub eps: f64,
}

impl Dual {
    /// A constant: zero tangent.
    pub fn constant(re: f64) -> Dual {
        Dual { re, eps: 0.0 }
    }

    /// A seeded variable: unit tangent.
    pub fn variable(re: f64) -> Dual {
        Dual { re, eps: 1.0 }
    }

    pub fn exp(self) -> Dual {
        let e = self.re.exp();
        Dual { re: e, eps: self.eps * e }
    }

    pub fn ln(self) -> Dual {
        Dual {
            re: self.re.ln(),
            eps: self.eps / self.re,
        }
    }

    pub fn sqrt(self) -> Dual {
        let s = self.re.sqrt();
        Dual {
            re: s,
            eps: self.eps / (2.0 * s),
        }
    }

    pub fn sin(self) -> Dual {
        Dual {
            re: self.re.sin(),
            eps: self.eps * self.re.cos(),
        }
    }

    pub fn cos(self) -> Dual {
        Dual {
            re: self.re.cos(),
            eps: -self.eps * self.re.sin(),
        }
    }

    pub fn tan(self) -> Dual {
        let c = self.re.cos();
        Dual {
            re: self.re.tan(),
            eps: self.eps / (c * c),
        }
    }

    pub fn sinh(self) -> Dual {
        Dual {
            re: self.re.sinh(),
            eps: self.eps * self.re.cosh(),
        }
    }

    pub fn cosh(self) -> Dual {
        Dual {
            re: self.re.cosh(),
            eps: self.eps * self.re.sinh(),
        }
    }

    pub fn tanh(self) -> Dual {
        let c = self.re.cosh();
        Dual {
            re: self.re.tanh(),
            eps: self.eps / (c * c),
        }
    }

    pub fn asinh(self) -> Dual {
        Dual {
            re: self.re.asinh(),
            eps: self.eps / (self.re * self.re + 1.0).sqrt(),
        }
    }

    pub fn acosh(self) -> Dual {
        Dual {
            re: self.re.acosh(),
            eps: self.eps / (self.re * self.re - 1.0).sqrt(),
        }
    }

    /// |x|; the derivative at zero is taken as zero.
    pub fn abs(self) -> Dual {
        Dual {
            re: self.re.abs(),
            eps: self.eps * signum_or_zero(self.re),
        }
    }

    pub fn powi(self, n: i32) -> Dual {
        Dual {
            re: self.re.powi(n),
            eps: self.eps * f64::from(n) * self.re.powi(n - 1),
        }
    }

    pub fn powf(self, p: f64) -> Dual {
        Dual {
            re: self.re.powf(p),
            eps: self.eps * p * self.re.powf(p - 1.0),
        }
    }

    pub fn recip(self) -> Dual {
        Dual {
            re: 1.0 / self.re,
            eps: -self.eps / (self.re * self.re),
        }
    }
}

fn signum_or_zero(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl Add for Dual {
    type Output = Dual;
    fn add(self, rhs: Dual) -> Dual {
        Dual {
            re: self.re + rhs.re,
            eps: self.eps + rhs.eps,
        }
    }
}

impl Sub for Dual {
    type Output = Dual;
    fn sub(self, rhs: Dual) -> Dual {
        Dual {
            re: self.re - rhs.re,
            eps: self.eps - rhs.eps,
        }
    }
}

impl Mul for Dual {
    type Output = Dual;
    fn mul(self, rhs: Dual) -> Dual {
        Dual {
            re: self.re * rhs.re,
            eps: self.eps * rhs.re + self.re * rhs.eps,
        }
    }
}

impl Div for Dual {
    type Output = Dual;
    fn div(self, rhs: Dual) -> Dual {
        Dual {
            re: self.re / rhs.re,
            eps: (self.eps * rhs.re - self.re * rhs.eps) / (rhs.re * rhs.re),
        }
    }
}

impl Neg for Dual {
    type Output = Dual;
    fn neg(self) -> Dual {
        Dual {
            re: -self.re,
            eps: -self.eps,
        }
    }
}

impl Add<f64> for Dual {
    type Output = Dual;
    fn add(self, rhs: f64) -> Dual {
        Dual {
            re: self.re + rhs,
            eps: self.eps,
        }
    }
}

impl Add<Dual> for f64 {
    type Output = Dual;
    fn add(self, rhs: Dual) -> Dual {
        rhs + self
    }
}

impl Sub<f64> for Dual {
    type Output = Dual;
    fn sub(self, rhs: f64) -> Dual {
        Dual {
            re: self.re - rhs,
            eps: self.eps,
        }
    }
}

impl Sub<Dual> for f64 {
    type Output = Dual;
    fn sub(self, rhs: Dual) -> Dual {
        Dual {
            re: self - rhs.re,
            eps: -rhs.eps,
        }
    }
}

impl Mul<f64> for Dual {
    type Output = Dual;
    fn mul(self, rhs: f64) -> Dual {
        Dual {
            re: self.re * rhs,
            eps: self.eps * rhs,
        }
    }
}

impl Mul<Dual> for f64 {
    type Output = Dual;
    fn mul(self, rhs: Dual) -> Dual {
        rhs * self
    }
}

impl Div<f64> for Dual {
    type Output = Dual;
    fn div(self, rhs: f64) -> Dual {
        Dual {
            re: self.re / rhs,
            eps: self.eps / rhs,
        }
    }
}

impl Div<Dual> for f64 {
    type Output = Dual;
    fn div(self, rhs: Dual) -> Dual {
        Dual::constant(self) / rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deriv(f: impl Fn(Dual) -> Dual, x: f64) -> f64 {
        f(Dual::variable(x)).eps
    }

    #[test]
    fn test_arithmetic_derivatives() {
        let x = Dual::variable(3.0);
        let y = Dual::constant(2.0);
        assert_eq!((x + y).eps, 1.0);
        assert_eq!((x * y).eps, 2.0);
        assert_eq!((x / y).eps, 0.5);
        assert_eq!((y / x).eps, -2.0 / 9.0);
        assert_eq!((-x).eps, -1.0);
        assert_eq!((2.0 - x).eps, -1.0);
    }

    #[test]
    fn test_elementary_derivatives() {
        let x = 0.7;
        assert!((deriv(|d| d.exp(), x) - x.exp()).abs() < 1e-15);
        assert!((deriv(|d| d.ln(), x) - 1.0 / x).abs() < 1e-15);
        assert!((deriv(|d| d.sin(), x) - x.cos()).abs() < 1e-15);
        assert!((deriv(|d| d.cos(), x) + x.sin()).abs() < 1e-15);
        assert!((deriv(|d| d.tan(), x) - 1.0 / (x.cos() * x.cos())).abs() < 1e-14);
        assert!((deriv(|d| d.sinh(), x) - x.cosh()).abs() < 1e-15);
        assert!((deriv(|d| d.cosh(), x) - x.sinh()).abs() < 1e-15);
        assert!((deriv(|d| d.tanh(), x) - 1.0 / (x.cosh() * x.cosh())).abs() < 1e-15);
        assert!((deriv(|d| d.asinh(), x) - 1.0 / (x * x + 1.0).sqrt()).abs() < 1e-15);
        assert!((deriv(|d| d.acosh(), 1.5) - 1.0 / (1.5f64 * 1.5 - 1.0).sqrt()).abs() < 1e-15);
        assert!((deriv(|d| d.sqrt(), x) - 0.5 / x.sqrt()).abs() < 1e-15);
        assert!((deriv(|d| d.powi(3), x) - 3.0 * x * x).abs() < 1e-14);
        assert!((deriv(|d| d.powf(1.5), x) - 1.5 * x.powf(0.5)).abs() < 1e-15);
        assert!((deriv(|d| d.recip(), x) + 1.0 / (x * x)).abs() < 1e-14);
        assert_eq!(deriv(|d| d.abs(), -2.0), -1.0);
        assert_eq!(deriv(|d| d.abs(), 2.0), 1.0);
    }

    #[test]
    fn test_chain_rule() {
        // d/dx sin(x^2) = 2x cos(x^2)
        let x = 1.3;
        let got = deriv(|d| (d * d).sin(), x);
        assert!((got - 2.0 * x * (x * x).cos()).abs() < 1e-14);
    }
}
