//! Two-layer Elman recurrent network with a dense head, trained by BPTT and Adam.
//!
//! Parameters live in one flat vector so the optimiser, gradient clipping and
//! best-weight snapshots all operate on a single buffer.

use rand::rngs::StdRng;
use rand::Rng;

/// Offsets of each parameter block inside the flat parameter vector.
#[derive(Debug, Clone, Copy)]
struct Layout {
    hidden: usize,
    dense: usize,
    wx1: usize,
    wh1: usize,
    b1: usize,
    wx2: usize,
    wh2: usize,
    b2: usize,
    wd: usize,
    bd: usize,
    wo: usize,
    bo: usize,
    len: usize,
}

impl Layout {
    fn new(hidden: usize, dense: usize) -> Self {
        let wx1 = 0;
        let wh1 = wx1 + hidden;
        let b1 = wh1 + hidden * hidden;
        let wx2 = b1 + hidden;
        let wh2 = wx2 + hidden * hidden;
        let b2 = wh2 + hidden * hidden;
        let wd = b2 + hidden;
        let bd = wd + dense * hidden;
        let wo = bd + dense;
        let bo = wo + dense;
        Self {
            hidden,
            dense,
            wx1,
            wh1,
            b1,
            wx2,
            wh2,
            b2,
            wd,
            bd,
            wo,
            bo,
            len: bo + 1,
        }
    }
}

/// Activations kept from a forward pass for backpropagation.
struct Trace {
    inputs: Vec<f64>,
    /// h1[0] is the zero initial state; h1[t + 1] follows input t.
    h1: Vec<Vec<f64>>,
    mask: Vec<f64>,
    h2: Vec<Vec<f64>>,
    dense_pre: Vec<f64>,
    dense: Vec<f64>,
    output: f64,
}

/// out += W x for the `rows × cols` block at `offset`.
fn matvec(params: &[f64], offset: usize, rows: usize, cols: usize, x: &[f64], out: &mut [f64]) {
    for r in 0..rows {
        let row = &params[offset + r * cols..offset + (r + 1) * cols];
        out[r] += row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
    }
}

/// out += Wᵀ y for the `rows × cols` block at `offset`.
fn matvec_t(params: &[f64], offset: usize, rows: usize, cols: usize, y: &[f64], out: &mut [f64]) {
    for r in 0..rows {
        for c in 0..cols {
            out[c] += params[offset + r * cols + c] * y[r];
        }
    }
}

/// grad += u vᵀ for the `u.len() × v.len()` block at `offset`.
fn outer_acc(grad: &mut [f64], offset: usize, u: &[f64], v: &[f64]) {
    let cols = v.len();
    for (r, ur) in u.iter().enumerate() {
        if *ur == 0.0 {
            continue;
        }
        for (c, vc) in v.iter().enumerate() {
            grad[offset + r * cols + c] += ur * vc;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecurrentNetwork {
    layout: Layout,
    params: Vec<f64>,
}

impl RecurrentNetwork {
    /// Xavier-uniform weights and zero biases from a seeded generator.
    pub(crate) fn new(hidden: usize, dense: usize, rng: &mut StdRng) -> Self {
        let layout = Layout::new(hidden, dense);
        let mut params = vec![0.0; layout.len];

        let blocks = [
            (layout.wx1, hidden, 1),
            (layout.wh1, hidden, hidden),
            (layout.wx2, hidden, hidden),
            (layout.wh2, hidden, hidden),
            (layout.wd, dense, hidden),
            (layout.wo, 1, dense),
        ];
        for (offset, rows, cols) in blocks {
            let limit = (6.0 / (rows + cols) as f64).sqrt();
            for w in &mut params[offset..offset + rows * cols] {
                *w = rng.gen_range(-limit..limit);
            }
        }

        Self { layout, params }
    }

    pub(crate) fn num_params(&self) -> usize {
        self.layout.len
    }

    pub(crate) fn params(&self) -> &[f64] {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: &[f64]) {
        self.params.copy_from_slice(params);
    }

    /// Inference forward pass (no dropout).
    pub(crate) fn predict(&self, inputs: &[f64]) -> f64 {
        self.forward(inputs, None).output
    }

    fn forward(&self, inputs: &[f64], mask: Option<&[f64]>) -> Trace {
        let Layout { hidden, dense, .. } = self.layout;
        let l = self.layout;
        let p = &self.params;
        let mask = mask.map(<[f64]>::to_vec).unwrap_or_else(|| vec![1.0; hidden]);

        let mut h1 = vec![vec![0.0; hidden]];
        let mut h2 = vec![vec![0.0; hidden]];
        for (t, &x) in inputs.iter().enumerate() {
            let mut pre = p[l.b1..l.b1 + hidden].to_vec();
            for (i, v) in pre.iter_mut().enumerate() {
                *v += p[l.wx1 + i] * x;
            }
            matvec(p, l.wh1, hidden, hidden, &h1[t], &mut pre);
            let state1: Vec<f64> = pre.iter().map(|v| v.tanh()).collect();

            let dropped: Vec<f64> = state1.iter().zip(&mask).map(|(h, m)| h * m).collect();
            let mut pre = p[l.b2..l.b2 + hidden].to_vec();
            matvec(p, l.wx2, hidden, hidden, &dropped, &mut pre);
            matvec(p, l.wh2, hidden, hidden, &h2[t], &mut pre);
            let state2: Vec<f64> = pre.iter().map(|v| v.tanh()).collect();

            h1.push(state1);
            h2.push(state2);
        }

        let last = &h2[inputs.len()];
        let mut dense_pre = p[l.bd..l.bd + dense].to_vec();
        matvec(p, l.wd, dense, hidden, last, &mut dense_pre);
        let dense_out: Vec<f64> = dense_pre.iter().map(|v| v.max(0.0)).collect();
        let output = p[l.bo]
            + p[l.wo..l.wo + dense]
                .iter()
                .zip(&dense_out)
                .map(|(w, z)| w * z)
                .sum::<f64>();

        Trace {
            inputs: inputs.to_vec(),
            h1,
            mask,
            h2,
            dense_pre,
            dense: dense_out,
            output,
        }
    }

    /// Accumulate parameter gradients for `d_output = ∂loss/∂output`.
    fn backward(&self, trace: &Trace, d_output: f64, grad: &mut [f64]) {
        let Layout { hidden, dense, .. } = self.layout;
        let l = self.layout;
        let p = &self.params;
        let steps = trace.inputs.len();

        // head
        grad[l.bo] += d_output;
        let mut d_dense = vec![0.0; dense];
        for k in 0..dense {
            grad[l.wo + k] += d_output * trace.dense[k];
            if trace.dense_pre[k] > 0.0 {
                d_dense[k] = d_output * p[l.wo + k];
            }
        }
        outer_acc(grad, l.wd, &d_dense, &trace.h2[steps]);
        for k in 0..dense {
            grad[l.bd + k] += d_dense[k];
        }
        let mut d_h2 = vec![0.0; hidden];
        matvec_t(p, l.wd, dense, hidden, &d_dense, &mut d_h2);

        // second layer, collecting gradients w.r.t. its inputs
        let mut d_inputs2 = vec![vec![0.0; hidden]; steps];
        for t in (0..steps).rev() {
            let state = &trace.h2[t + 1];
            let d_pre: Vec<f64> = d_h2.iter().zip(state).map(|(d, h)| d * (1.0 - h * h)).collect();
            let dropped: Vec<f64> = trace.h1[t + 1]
                .iter()
                .zip(&trace.mask)
                .map(|(h, m)| h * m)
                .collect();
            outer_acc(grad, l.wx2, &d_pre, &dropped);
            outer_acc(grad, l.wh2, &d_pre, &trace.h2[t]);
            for i in 0..hidden {
                grad[l.b2 + i] += d_pre[i];
            }
            matvec_t(p, l.wx2, hidden, hidden, &d_pre, &mut d_inputs2[t]);
            d_h2 = vec![0.0; hidden];
            matvec_t(p, l.wh2, hidden, hidden, &d_pre, &mut d_h2);
        }

        // first layer
        let mut d_next = vec![0.0; hidden];
        for t in (0..steps).rev() {
            let state = &trace.h1[t + 1];
            let d_pre: Vec<f64> = (0..hidden)
                .map(|i| (d_inputs2[t][i] * trace.mask[i] + d_next[i]) * (1.0 - state[i] * state[i]))
                .collect();
            for i in 0..hidden {
                grad[l.wx1 + i] += d_pre[i] * trace.inputs[t];
                grad[l.b1 + i] += d_pre[i];
            }
            outer_acc(grad, l.wh1, &d_pre, &trace.h1[t]);
            d_next = vec![0.0; hidden];
            matvec_t(p, l.wh1, hidden, hidden, &d_pre, &mut d_next);
        }
    }

    /// One optimiser step on a mini-batch; returns the batch MSE before the update.
    pub(crate) fn train_batch(
        &mut self,
        batch: &[(&[f64], f64)],
        dropout: f64,
        rng: &mut StdRng,
        optimizer: &mut Adam,
    ) -> f64 {
        let hidden = self.layout.hidden;
        let keep = 1.0 - dropout;
        let mut grad = vec![0.0; self.layout.len];
        let mut loss = 0.0;
        let scale = 1.0 / batch.len() as f64;

        for (inputs, target) in batch {
            let mask: Vec<f64> = (0..hidden)
                .map(|_| {
                    if dropout > 0.0 && rng.gen::<f64>() < dropout {
                        0.0
                    } else {
                        1.0 / keep
                    }
                })
                .collect();
            let trace = self.forward(inputs, Some(&mask));
            let error = trace.output - target;
            loss += error * error * scale;
            self.backward(&trace, 2.0 * error * scale, &mut grad);
        }

        if loss.is_finite() {
            clip_norm(&mut grad, MAX_GRAD_NORM);
            optimizer.step(&mut self.params, &grad);
        }
        loss
    }
}

const MAX_GRAD_NORM: f64 = 5.0;

fn clip_norm(grad: &mut [f64], max_norm: f64) {
    let norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
    if norm > max_norm {
        let factor = max_norm / norm;
        for g in grad.iter_mut() {
            *g *= factor;
        }
    }
}

/// Adam optimiser (Kingma & Ba) over a flat parameter vector.
#[derive(Debug, Clone)]
pub(crate) struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
}

impl Adam {
    pub(crate) fn new(num_params: usize, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            m: vec![0.0; num_params],
            v: vec![0.0; num_params],
            t: 0,
        }
    }

    fn step(&mut self, params: &mut [f64], grad: &[f64]) {
        self.t += 1;
        let bias1 = 1.0 - self.beta1.powi(self.t);
        let bias2 = 1.0 - self.beta2.powi(self.t);
        for i in 0..params.len() {
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * grad[i];
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * grad[i] * grad[i];
            let m_hat = self.m[i] / bias1;
            let v_hat = self.v[i] / bias2;
            params[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn loss(net: &RecurrentNetwork, batch: &[(&[f64], f64)]) -> f64 {
        batch
            .iter()
            .map(|(x, y)| (net.predict(x) - y).powi(2))
            .sum::<f64>()
            / batch.len() as f64
    }

    #[test]
    fn same_seed_same_weights() {
        let a = RecurrentNetwork::new(4, 3, &mut StdRng::seed_from_u64(1));
        let b = RecurrentNetwork::new(4, 3, &mut StdRng::seed_from_u64(1));
        assert_eq!(a.params(), b.params());
        assert_eq!(a.num_params(), 4 + 16 + 4 + 16 + 16 + 4 + 12 + 3 + 3 + 1);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = RecurrentNetwork::new(3, 2, &mut rng);
        let inputs = [0.1, 0.5, -0.3, 0.8];
        let target = 0.4;

        let mut grad = vec![0.0; net.num_params()];
        let trace = net.forward(&inputs, None);
        net.backward(&trace, 2.0 * (trace.output - target), &mut grad);

        let h = 1e-6;
        for i in 0..net.num_params() {
            let mut plus = net.clone();
            plus.params[i] += h;
            let mut minus = net.clone();
            minus.params[i] -= h;
            let numeric = ((plus.predict(&inputs) - target).powi(2)
                - (minus.predict(&inputs) - target).powi(2))
                / (2.0 * h);
            assert!(
                (numeric - grad[i]).abs() < 1e-5,
                "param {}: numeric {} analytic {}",
                i,
                numeric,
                grad[i]
            );
        }
    }

    #[test]
    fn training_reduces_loss() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = RecurrentNetwork::new(6, 4, &mut rng);
        let mut adam = Adam::new(net.num_params(), 0.01);
        let windows: Vec<Vec<f64>> = (0..20)
            .map(|i| (0..5).map(|j| ((i + j) as f64 * 0.3).sin() * 0.5 + 0.5).collect())
            .collect();
        let batch: Vec<(&[f64], f64)> = windows
            .iter()
            .enumerate()
            .map(|(i, w)| (w.as_slice(), ((i + 5) as f64 * 0.3).sin() * 0.5 + 0.5))
            .collect();

        let before = loss(&net, &batch);
        for _ in 0..200 {
            net.train_batch(&batch, 0.0, &mut rng, &mut adam);
        }
        assert!(loss(&net, &batch) < before);
    }
}
