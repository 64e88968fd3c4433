//! Derivative-free minimisation used for ARIMA parameter estimation.

use std::cmp::Ordering;

/// Result of a Nelder-Mead run.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best point found.
    pub optimal_point: Vec<f64>,
    /// Objective value at the best point.
    pub optimal_value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the simplex collapsed below tolerance before `max_iter`.
    pub converged: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Spread of objective values (or simplex radius) treated as converged.
    pub tolerance: f64,
    /// Initial simplex step, relative to the coordinate when it is non-zero.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            initial_step: 0.05,
        }
    }
}

impl NelderMeadConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
}

// standard reflection / expansion / contraction / shrink coefficients
const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Minimise `objective` starting from `initial`.
///
/// # Arguments
/// * `objective` - Function to minimise; non-finite values are treated as +inf
/// * `initial` - Starting point
/// * `bounds` - Optional `(min, max)` box per coordinate; points are clamped into it
/// * `config` - Iteration limits and tolerances
///
/// # Example
/// ```
/// use market_analytics::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     &NelderMeadConfig::default(),
/// );
/// assert!((result.optimal_point[0] - 2.0).abs() < 1e-3);
/// assert!((result.optimal_point[1] + 1.0).abs() < 1e-3);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    let clamp = |p: Vec<f64>| -> Vec<f64> {
        match bounds {
            None => p,
            Some(b) => p
                .into_iter()
                .enumerate()
                .map(|(i, x)| b.get(i).map_or(x, |&(lo, hi)| x.clamp(lo, hi)))
                .collect(),
        }
    };
    let eval = |p: &[f64]| {
        let v = objective(p);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let mut vertices: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    let start = clamp(initial.to_vec());
    let start_value = eval(&start);
    vertices.push((start, start_value));
    for i in 0..n {
        let mut v = initial.to_vec();
        v[i] += if initial[i].abs() > 1e-10 {
            config.initial_step * initial[i].abs()
        } else {
            config.initial_step
        };
        let v = clamp(v);
        let value = eval(&v);
        vertices.push((v, value));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;
        vertices.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        let best = vertices[0].1;
        let worst = vertices[n].1;
        let second_worst = vertices[n - 1].1;

        let centroid: Vec<f64> = (0..n)
            .map(|j| vertices[..n].iter().map(|(v, _)| v[j]).sum::<f64>() / n as f64)
            .collect();

        let radius = vertices
            .iter()
            .map(|(v, _)| distance(v, &centroid))
            .fold(0.0, f64::max);
        if (worst - best).abs() < config.tolerance || radius < config.tolerance {
            converged = true;
            break;
        }

        let toward = |from: &[f64], coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, p)| c + coef * (p - c))
                .collect()
        };

        let reflected = clamp(toward(&vertices[n].0, -ALPHA));
        let reflected_value = eval(&reflected);

        if reflected_value < best {
            let expanded = clamp(toward(&reflected, GAMMA));
            let expanded_value = eval(&expanded);
            vertices[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < second_worst {
            vertices[n] = (reflected, reflected_value);
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < worst {
            let c = clamp(toward(&reflected, RHO));
            let value = eval(&c);
            (c, value)
        } else {
            let c = clamp(toward(&vertices[n].0, RHO));
            let value = eval(&c);
            (c, value)
        };
        if contracted_value < worst.min(reflected_value) {
            vertices[n] = (contracted, contracted_value);
            continue;
        }

        let anchor = vertices[0].0.clone();
        for (v, value) in vertices.iter_mut().skip(1) {
            let shrunk: Vec<f64> = anchor
                .iter()
                .zip(v.iter())
                .map(|(a, x)| a + SIGMA * (x - a))
                .collect();
            *v = clamp(shrunk);
            *value = eval(v);
        }
    }

    vertices.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    let (optimal_point, optimal_value) = vertices.swap_remove(0);

    NelderMeadResult {
        optimal_point,
        optimal_value,
        iterations,
        converged,
    }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadratic_bowl() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
            &[0.0, 0.0],
            None,
            &NelderMeadConfig::default(),
        );

        assert!(result.converged);
        assert_relative_eq!(result.optimal_point[0], 2.0, epsilon = 1e-3);
        assert_relative_eq!(result.optimal_point[1], 3.0, epsilon = 1e-3);
        assert_relative_eq!(result.optimal_value, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn rosenbrock_valley() {
        let config = NelderMeadConfig::default()
            .with_max_iter(5000)
            .with_tolerance(1e-12);

        let result = nelder_mead(
            |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0].powi(2)).powi(2),
            &[0.0, 0.0],
            None,
            &config,
        );

        assert_relative_eq!(result.optimal_point[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(result.optimal_point[1], 1.0, epsilon = 2e-2);
    }

    #[test]
    fn bounded_minimum_sits_on_boundary() {
        let result = nelder_mead(
            |x| (x[0] - 5.0).powi(2),
            &[1.0],
            Some(&[(0.0, 3.0)]),
            &NelderMeadConfig::default(),
        );

        assert_relative_eq!(result.optimal_point[0], 3.0, epsilon = 1e-4);
    }

    #[test]
    fn non_finite_objective_is_avoided() {
        let result = nelder_mead(
            |x| {
                if x[0] <= 0.0 {
                    f64::NAN
                } else {
                    (x[0] - 1.0).powi(2)
                }
            },
            &[0.5],
            None,
            &NelderMeadConfig::default(),
        );
        assert!(result.optimal_value.is_finite());
        assert_relative_eq!(result.optimal_point[0], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn empty_point() {
        let result = nelder_mead(|_| 0.0, &[], None, &NelderMeadConfig::default());
        assert!(!result.converged);
        assert!(result.optimal_point.is_empty());
    }
}
