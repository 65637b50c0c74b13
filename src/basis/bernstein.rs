use super::Basis;

/// Bernstein polynomials b(k, n)(x) = C(n, k) x^k (1 - x)^(n-k) of degree n = nbasis - 1.
/// The family spans every polynomial of degree n over [0, 1] and is a partition of unity,
/// so straight and slightly curved trajectories are represented exactly.
#[derive(Debug, Clone)]
pub struct Bernstein {

    binom : Vec<f64>

}

impl Bernstein {

    pub fn new(nbasis : usize) -> Self {
        assert!(nbasis >= 2, "Bernstein basis requires at least two functions");
        let n = nbasis - 1;
        let mut binom = Vec::with_capacity(nbasis);
        let mut c = 1.0;
        for k in 0..=n {
            binom.push(c);
            c = c * (n - k) as f64 / (k + 1) as f64;
        }
        Self { binom }
    }

    pub fn degree(&self) -> usize {
        self.binom.len() - 1
    }

}

impl Basis for Bernstein {

    fn nbasis(&self) -> usize {
        self.binom.len()
    }

    fn eval_into(&self, x : f64, row : &mut [f64]) {
        let n = self.degree() as i32;
        for (k, (r, c)) in row.iter_mut().zip(self.binom.iter()).enumerate() {
            let k = k as i32;
            *r = c * x.powi(k) * (1.0 - x).powi(n - k);
        }
    }

}
