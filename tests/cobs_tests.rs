use gammet::{pseudo_obs_using, CObs};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn sample_cobs(seed: u64) -> CObs {
    let mut rng = StdRng::seed_from_u64(seed);
    let re = pseudo_obs_using(1.0, 0.1, "t", 1000, &mut rng).unwrap();
    let im = pseudo_obs_using(-0.2, 0.03, "t", 1000, &mut rng).unwrap();
    CObs::new(re, im)
}

#[test]
fn test_conjugation() {
    let z = sample_cobs(401);

    let plus = &z + &z.conjugate();
    assert!(!plus.real().is_zero());
    assert!(plus.imag().is_zero());

    let minus = &z - &z.conjugate();
    assert!(minus.real().is_zero());
    assert!(!minus.imag().is_zero());
}

#[test]
fn test_abs() {
    let z = sample_cobs(403);
    let mut magnitude = z.abs();
    magnitude.gamma_method().unwrap();

    let expected = (z.real().value().powi(2) + z.imag().value().powi(2)).sqrt();
    assert!((magnitude.value() - expected).abs() <= 10.0 * f64::EPSILON * expected);
    assert!(magnitude.dvalue() > 0.0);
}

#[test]
fn test_algebraic_identities() {
    let z = sample_cobs(409);

    assert!((&(&(&z * &z) / &z) - &z).is_zero());
    assert!((&(&z + &z) - &(2.0 * &z)).is_zero());
}

#[test]
fn test_mixed_operand_arithmetic() {
    let z = sample_cobs(419);
    let w = sample_cobs(421);

    let scalars = [
        Complex64::new(3.0, 0.0),
        Complex64::new(1.1, -0.2),
        Complex64::new(2.3, 0.0),
        Complex64::new(0.0, 7.7),
    ];

    for &other in &scalars {
        // Commutativity of addition and multiplication.
        assert!((&(&z + other) - &(other + &z)).is_zero());
        assert!((&(&z * other) - &(other * &z)).is_zero());

        // Subtraction in both orders adds to zero.
        let ta = &z - other;
        let tb = other - &z;
        assert!((&ta + &tb).is_zero());

        // Division round trips.
        assert!((&(&(&z / other) * other) - &z).is_zero());
        let ratio = other / &z;
        assert!((&(&ratio * &z) - other).is_zero());
    }

    // The same laws with a complex observable operand.
    assert!((&(&z + &w) - &(&w + &z)).is_zero());
    assert!((&(&z * &w) - &(&w * &z)).is_zero());
    assert!((&(&(&z / &w) * &w) - &z).is_zero());

    // And with a plain float.
    assert!((&(&z * 1.1) - &(1.1 * &z)).is_zero());
    assert!((&(&(&z / 1.1) * 1.1) - &z).is_zero());
}

#[test]
fn test_from_real() {
    let mut rng = StdRng::seed_from_u64(431);
    let re = pseudo_obs_using(2.5, 0.2, "t", 500, &mut rng).unwrap();
    let z = CObs::from_real(re.clone());

    assert!(z.imag().is_zero());
    assert!((&z * &z.conjugate()).imag().is_zero());
    assert!((z.real() - &re).is_zero());
}

#[test]
fn test_equality() {
    let z = sample_cobs(433);
    assert!(z == z.clone());
    assert!(!(z == &z + Complex64::new(0.1, 0.0)));
}
