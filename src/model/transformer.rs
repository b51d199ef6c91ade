//! Attention-based sequence model
//!
//! A compact single-head self-attention encoder: linear embedding, scaled
//! dot-product attention with a residual connection, mean pooling over time
//! and a linear head. Layer normalization and multi-head splits are omitted
//! to keep the on-device footprint and the gradient code small; the
//! architecture is interchangeable with the LSTM behind [`SequenceModel`].
//!
//! Unlike the recurrent model, classification pools over all time steps
//! (mean), since attention has no privileged final state.

use crate::model::linalg::{softmax_inplace, Matrix};
use crate::model::{
    activate_logits, loss_and_dlogits, Architecture, Gradients, ModelDims, SequenceModel, Target,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeMap;

/// Forward cache for backpropagation
struct ForwardCache {
    /// Embedded input, (T x d)
    h0: Matrix,
    /// Attention weights, (T x T), rows sum to 1
    attn: Matrix,
    /// Value projections, (T x d)
    v: Matrix,
    /// Query projections, (T x d)
    q: Matrix,
    /// Key projections, (T x d)
    k: Matrix,
    /// Mean-pooled representation, (d)
    pooled: Vec<f64>,
}

/// Single-head attention encoder classifier
#[derive(Debug, Clone)]
pub struct TransformerModel {
    dims: ModelDims,
    /// Embedding, (d x input)
    embed_w: Matrix,
    /// Embedding bias, (d x 1)
    embed_b: Matrix,
    /// Query projection, (d x d), applied as `H0 * Wq`
    wq: Matrix,
    /// Key projection, (d x d)
    wk: Matrix,
    /// Value projection, (d x d)
    wv: Matrix,
    /// Output head, (output x d)
    head_w: Matrix,
    /// Output bias, (output x 1)
    head_b: Matrix,
}

impl TransformerModel {
    /// Fresh model with uniform(-1/sqrt(d), 1/sqrt(d)) initialization
    pub fn new(dims: ModelDims, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let d = dims.hidden_dim;
        let bound = 1.0 / (d as f64).sqrt();
        Self {
            dims,
            embed_w: Matrix::uniform(d, dims.input_dim, bound, &mut rng),
            embed_b: Matrix::uniform(d, 1, bound, &mut rng),
            wq: Matrix::uniform(d, d, bound, &mut rng),
            wk: Matrix::uniform(d, d, bound, &mut rng),
            wv: Matrix::uniform(d, d, bound, &mut rng),
            head_w: Matrix::uniform(dims.output_dim, d, bound, &mut rng),
            head_b: Matrix::uniform(dims.output_dim, 1, bound, &mut rng),
        }
    }

    fn scale(&self) -> f64 {
        1.0 / (self.dims.hidden_dim as f64).sqrt()
    }

    fn forward_cached(&self, rows: &[Vec<f64>]) -> (ForwardCache, Vec<f64>) {
        let d = self.dims.hidden_dim;
        let t_len = rows.len();

        // Embed: h0_t = W_e x_t + b_e
        let mut h0 = Matrix::zeros(t_len, d);
        for (t, x) in rows.iter().enumerate() {
            let e = self.embed_w.matvec(x);
            for (j, (ej, bj)) in e.iter().zip(&self.embed_b.data).enumerate() {
                h0.set(t, j, ej + bj);
            }
        }

        let q = h0.matmul(&self.wq);
        let k = h0.matmul(&self.wk);
        let v = h0.matmul(&self.wv);

        // Scaled dot-product attention
        let mut attn = q.matmul(&k.transpose());
        for s in attn.data.iter_mut() {
            *s *= self.scale();
        }
        for t in 0..t_len {
            softmax_inplace(&mut attn.data[t * t_len..(t + 1) * t_len]);
        }

        // Residual + mean pooling
        let ctx = attn.matmul(&v);
        let mut pooled = vec![0.0; d];
        for t in 0..t_len {
            for j in 0..d {
                pooled[j] += (h0.get(t, j) + ctx.get(t, j)) / t_len as f64;
            }
        }

        let mut logits = self.head_w.matvec(&pooled);
        for (l, b) in logits.iter_mut().zip(&self.head_b.data) {
            *l += b;
        }

        (
            ForwardCache {
                h0,
                attn,
                v,
                q,
                k,
                pooled,
            },
            logits,
        )
    }
}

impl SequenceModel for TransformerModel {
    fn architecture(&self) -> Architecture {
        Architecture::Transformer
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
        let d = self.dims.hidden_dim;
        let t_len = rows.len();
        let (cache, mut logits) = self.forward_cached(rows);
        activate_logits(&mut logits);
        let (loss, dlogits) = loss_and_dlogits(&logits, target);

        let mut grads: Gradients = BTreeMap::new();

        // Head
        let mut d_head_w = Matrix::zeros(self.dims.output_dim, d);
        d_head_w.add_outer(&dlogits, &cache.pooled);
        grads.insert("head.w".to_string(), d_head_w);
        grads.insert(
            "head.b".to_string(),
            Matrix {
                rows: self.dims.output_dim,
                cols: 1,
                data: dlogits.clone(),
            },
        );
        let d_pooled = self.head_w.matvec_transposed(&dlogits);

        // Mean pooling spreads the gradient evenly over time; the residual
        // sends it to both the embedding and the attention context
        let mut d_h1 = Matrix::zeros(t_len, d);
        for t in 0..t_len {
            for j in 0..d {
                d_h1.set(t, j, d_pooled[j] / t_len as f64);
            }
        }
        let mut d_h0 = d_h1.clone();
        let d_ctx = d_h1;

        // ctx = attn * v
        let d_attn = d_ctx.matmul(&cache.v.transpose());
        let d_v = cache.attn.transpose().matmul(&d_ctx);

        // Row-wise softmax backward: ds = a .* (da - (da . a))
        let mut d_scores = Matrix::zeros(t_len, t_len);
        for t in 0..t_len {
            let a = cache.attn.row(t);
            let da = &d_attn.data[t * t_len..(t + 1) * t_len];
            let dot: f64 = da.iter().zip(a).map(|(x, y)| x * y).sum();
            for u in 0..t_len {
                d_scores.set(t, u, a[u] * (da[u] - dot));
            }
        }
        for s in d_scores.data.iter_mut() {
            *s *= self.scale();
        }

        // scores = q * k^T (pre-scale handled above)
        let d_q = d_scores.matmul(&cache.k);
        let d_k = d_scores.transpose().matmul(&cache.q);

        // q = h0 * wq, etc.
        grads.insert("attn.wq".to_string(), cache.h0.transpose().matmul(&d_q));
        grads.insert("attn.wk".to_string(), cache.h0.transpose().matmul(&d_k));
        grads.insert("attn.wv".to_string(), cache.h0.transpose().matmul(&d_v));

        d_h0.add_scaled(&d_q.matmul(&self.wq.transpose()), 1.0);
        d_h0.add_scaled(&d_k.matmul(&self.wk.transpose()), 1.0);
        d_h0.add_scaled(&d_v.matmul(&self.wv.transpose()), 1.0);

        // Embedding
        let mut d_embed_w = Matrix::zeros(d, self.dims.input_dim);
        let mut d_embed_b = Matrix::zeros(d, 1);
        for (t, x) in rows.iter().enumerate() {
            d_embed_w.add_outer(d_h0.row(t), x);
            for (bj, &gj) in d_embed_b.data.iter_mut().zip(d_h0.row(t)) {
                *bj += gj;
            }
        }
        grads.insert("embed.w".to_string(), d_embed_w);
        grads.insert("embed.b".to_string(), d_embed_b);

        (loss, grads)
    }

    fn parameters(&self) -> BTreeMap<String, &Matrix> {
        BTreeMap::from([
            ("embed.w".to_string(), &self.embed_w),
            ("embed.b".to_string(), &self.embed_b),
            ("attn.wq".to_string(), &self.wq),
            ("attn.wk".to_string(), &self.wk),
            ("attn.wv".to_string(), &self.wv),
            ("head.w".to_string(), &self.head_w),
            ("head.b".to_string(), &self.head_b),
        ])
    }

    fn parameters_mut(&mut self) -> BTreeMap<String, &mut Matrix> {
        BTreeMap::from([
            ("embed.w".to_string(), &mut self.embed_w),
            ("embed.b".to_string(), &mut self.embed_b),
            ("attn.wq".to_string(), &mut self.wq),
            ("attn.wk".to_string(), &mut self.wk),
            ("attn.wv".to_string(), &mut self.wv),
            ("head.w".to_string(), &mut self.head_w),
            ("head.b".to_string(), &mut self.head_b),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests_support::check_gradients;

    fn tiny_dims(output_dim: usize) -> ModelDims {
        ModelDims {
            input_dim: 3,
            hidden_dim: 4,
            output_dim,
            num_layers: 1,
        }
    }

    fn sample_rows() -> Vec<Vec<f64>> {
        vec![
            vec![0.5, -0.2, 0.1],
            vec![0.1, 0.4, -0.3],
            vec![-0.6, 0.2, 0.8],
        ]
    }

    #[test]
    fn test_forward_shapes_and_ranges() {
        let model = TransformerModel::new(tiny_dims(4), 1);
        let probs = model.forward(&sample_rows());
        assert_eq!(probs.len(), 4);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);

        let binary = TransformerModel::new(tiny_dims(1), 1);
        let p = binary.forward(&sample_rows());
        assert!(p[0] > 0.0 && p[0] < 1.0);
    }

    #[test]
    fn test_attention_rows_are_distributions() {
        let model = TransformerModel::new(tiny_dims(1), 2);
        let (cache, _) = model.forward_cached(&sample_rows());
        for t in 0..3 {
            let sum: f64 = cache.attn.row(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gradients_match_finite_differences_binary() {
        let mut model = TransformerModel::new(tiny_dims(1), 3);
        check_gradients(&mut model, &sample_rows(), &Target::Binary(0.0));
    }

    #[test]
    fn test_gradients_match_finite_differences_multiclass() {
        let mut model = TransformerModel::new(tiny_dims(4), 3);
        check_gradients(&mut model, &sample_rows(), &Target::Class(1));
    }
}
