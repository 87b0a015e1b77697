use burn::{
    nn::{
        loss::BinaryCrossEntropyLossConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Initializer,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::WideDeepBatch;
use crate::data::dense_preprocessor::EmbeddingInput;

// ─── Weight initialisers ──────────────────────────────────────────────────────
/// Initialiser applied to every linear layer of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeightInit {
    KaimingNormal,
    KaimingUniform,
    XavierNormal,
    XavierUniform,
    /// Keep burn's own default for the layer
    Default,
}

impl WeightInit {
    pub fn initializer(&self) -> Option<Initializer> {
        let relu_gain = std::f64::consts::SQRT_2;
        match self {
            WeightInit::KaimingNormal  => Some(Initializer::KaimingNormal { gain: relu_gain, fan_out_only: false }),
            WeightInit::KaimingUniform => Some(Initializer::KaimingUniform { gain: relu_gain, fan_out_only: false }),
            WeightInit::XavierNormal   => Some(Initializer::XavierNormal { gain: 1.0 }),
            WeightInit::XavierUniform  => Some(Initializer::XavierUniform { gain: 1.0 }),
            WeightInit::Default        => None,
        }
    }
}

fn linear<B: Backend>(d_in: usize, d_out: usize, init: WeightInit, device: &B::Device) -> Linear<B> {
    let mut cfg = LinearConfig::new(d_in, d_out);
    if let Some(initializer) = init.initializer() {
        cfg = cfg.with_initializer(initializer);
    }
    cfg.init(device)
}

/// Which network sits behind the embeddings in the deep component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeepArchitecture {
    /// Linear → ReLU → Dropout per hidden layer
    Dense,
    /// Residual blocks between consecutive hidden sizes
    Resnet,
}

// ─── Wide component ───────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct WideConfig {
    /// Width of the one-hot input
    pub wide_dim: usize,
    #[config(default = 1)]
    pub pred_dim: usize,
    #[config(default = "WeightInit::KaimingNormal")]
    pub initializer: WeightInit,
}

impl WideConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Wide<B> {
        Wide { linear: linear(self.wide_dim, self.pred_dim, self.initializer, device) }
    }
}

/// Linear model over the one-hot wide matrix.
#[derive(Module, Debug)]
pub struct Wide<B: Backend> {
    pub linear: Linear<B>,
}

impl<B: Backend> Wide<B> {
    /// x: [batch, wide_dim] → [batch, pred_dim]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(x)
    }
}

// ─── Deep component ───────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct DeepDenseConfig {
    pub embed_input:   Vec<EmbeddingInput>,
    pub n_continuous:  usize,
    pub hidden_layers: Vec<usize>,
    /// Dropout per hidden layer; shorter lists repeat their last value
    pub dropout:       Vec<f64>,
    #[config(default = "DeepArchitecture::Dense")]
    pub architecture:  DeepArchitecture,
    #[config(default = "WeightInit::XavierNormal")]
    pub initializer:   WeightInit,
    #[config(default = 1)]
    pub pred_dim:      usize,
}

impl DeepDenseConfig {
    /// Width of embeddings plus continuous values.
    pub fn input_dim(&self) -> usize {
        self.embed_input.iter().map(|e| e.dim).sum::<usize>() + self.n_continuous
    }

    fn dropout_at(&self, i: usize) -> f64 {
        self.dropout
            .get(i)
            .or_else(|| self.dropout.last())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> DeepDense<B> {
        let embeddings: Vec<Embedding<B>> = self
            .embed_input
            .iter()
            .map(|e| EmbeddingConfig::new(e.n_categories, e.dim).init(device))
            .collect();

        let input_dim = self.input_dim();
        let last_dim  = self.hidden_layers.last().copied().unwrap_or(input_dim);

        let mut dense_layers    = Vec::new();
        let mut residual_blocks = Vec::new();
        let mut input_proj      = None;

        match self.architecture {
            DeepArchitecture::Dense => {
                let mut d_in = input_dim;
                for (i, &d_out) in self.hidden_layers.iter().enumerate() {
                    dense_layers.push(DenseLayer {
                        linear:  linear(d_in, d_out, self.initializer, device),
                        dropout: DropoutConfig::new(self.dropout_at(i)).init(),
                    });
                    d_in = d_out;
                }
            }
            DeepArchitecture::Resnet => {
                if let Some(&first) = self.hidden_layers.first() {
                    input_proj = Some(linear(input_dim, first, self.initializer, device));
                    for (i, pair) in self.hidden_layers.windows(2).enumerate() {
                        residual_blocks.push(self.residual_block(pair[0], pair[1], i, device));
                    }
                }
            }
        }

        DeepDense {
            embeddings,
            input_proj,
            dense_layers,
            residual_blocks,
            head: linear(last_dim, self.pred_dim, self.initializer, device),
        }
    }

    fn residual_block<B: Backend>(
        &self,
        d_in:   usize,
        d_out:  usize,
        i:      usize,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        ResidualBlock {
            lin1:     linear(d_in, d_out, self.initializer, device),
            norm1:    LayerNormConfig::new(d_out).init(device),
            lin2:     linear(d_out, d_out, self.initializer, device),
            norm2:    LayerNormConfig::new(d_out).init(device),
            dropout:  DropoutConfig::new(self.dropout_at(i)).init(),
            shortcut: (d_in != d_out).then(|| linear(d_in, d_out, self.initializer, device)),
        }
    }
}

#[derive(Module, Debug)]
pub struct DenseLayer<B: Backend> {
    pub linear:  Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> DenseLayer<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        self.dropout.forward(relu(self.linear.forward(x)))
    }
}

#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    pub lin1:     Linear<B>,
    pub norm1:    LayerNorm<B>,
    pub lin2:     Linear<B>,
    pub norm2:    LayerNorm<B>,
    pub dropout:  Dropout,
    /// Projection for the skip path when the block changes width
    pub shortcut: Option<Linear<B>>,
}

impl<B: Backend> ResidualBlock<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let identity = match &self.shortcut {
            Some(proj) => proj.forward(x.clone()),
            None       => x.clone(),
        };
        let out = relu(self.norm1.forward(self.lin1.forward(x)));
        let out = self.dropout.forward(out);
        let out = self.norm2.forward(self.lin2.forward(out));
        relu(out + identity)
    }
}

/// Embeddings + continuous values through a dense or residual network.
#[derive(Module, Debug)]
pub struct DeepDense<B: Backend> {
    pub embeddings:      Vec<Embedding<B>>,
    pub input_proj:      Option<Linear<B>>,
    pub dense_layers:    Vec<DenseLayer<B>>,
    pub residual_blocks: Vec<ResidualBlock<B>>,
    pub head:            Linear<B>,
}

impl<B: Backend> DeepDense<B> {
    /// categorical: [batch, n_embed], continuous: [batch, n_cont] → [batch, pred_dim]
    pub fn forward(
        &self,
        categorical: Option<Tensor<B, 2, Int>>,
        continuous:  Option<Tensor<B, 2>>,
    ) -> Tensor<B, 2> {
        let mut parts: Vec<Tensor<B, 2>> = Vec::with_capacity(self.embeddings.len() + 1);

        if let Some(cat) = categorical {
            let [batch, _] = cat.dims();
            for (i, emb) in self.embeddings.iter().enumerate() {
                let column = cat.clone().slice([0..batch, i..i + 1]);
                let vectors = emb.forward(column); // [batch, 1, dim]
                let [_, _, dim] = vectors.dims();
                parts.push(vectors.reshape([batch, dim]));
            }
        }
        if let Some(cont) = continuous {
            parts.push(cont);
        }

        let mut x = Tensor::cat(parts, 1);
        if let Some(proj) = &self.input_proj {
            x = relu(proj.forward(x));
        }
        for layer in &self.dense_layers {
            x = layer.forward(x);
        }
        for block in &self.residual_blocks {
            x = block.forward(x);
        }
        self.head.forward(x)
    }
}

// ─── Composed model ───────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct WideDeepConfig {
    pub wide: WideConfig,
    pub deep: DeepDenseConfig,
}

impl WideDeepConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> WideDeep<B> {
        WideDeep {
            wide: self.wide.init(device),
            deep: self.deep.init(device),
        }
    }
}

/// Sum of the wide and deep logits.
#[derive(Module, Debug)]
pub struct WideDeep<B: Backend> {
    pub wide: Wide<B>,
    pub deep: DeepDense<B>,
}

impl<B: Backend> WideDeep<B> {
    pub fn forward(
        &self,
        wide:        Tensor<B, 2>,
        categorical: Option<Tensor<B, 2, Int>>,
        continuous:  Option<Tensor<B, 2>>,
    ) -> Tensor<B, 2> {
        self.wide.forward(wide) + self.deep.forward(categorical, continuous)
    }

    /// Logits for a batch, flattened to [batch].
    pub fn forward_batch(&self, batch: WideDeepBatch<B>) -> Tensor<B, 1> {
        let logits = self.forward(batch.wide, batch.categorical, batch.continuous);
        let [n, _] = logits.dims();
        logits.reshape([n])
    }

    /// Binary cross-entropy on the logits, plus the logits themselves.
    pub fn forward_loss(&self, batch: WideDeepBatch<B>) -> (Tensor<B, 1>, Tensor<B, 1>) {
        let targets = batch.targets.clone();
        let logits  = self.forward_batch(batch);
        let bce = BinaryCrossEntropyLossConfig::new()
            .with_logits(true)
            .init(&logits.device());
        (bce.forward(logits.clone(), targets), logits)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::{ElementConversion, TensorData};

    type TestBackend = NdArray;

    fn deep_config(arch: DeepArchitecture) -> DeepDenseConfig {
        DeepDenseConfig::new(
            vec![
                EmbeddingInput { column: "a".into(), n_categories: 4, dim: 3 },
                EmbeddingInput { column: "b".into(), n_categories: 3, dim: 2 },
            ],
            1,
            vec![8, 4],
            vec![0.1],
        )
        .with_architecture(arch)
    }

    fn inputs(device: &<TestBackend as Backend>::Device)
        -> (Tensor<TestBackend, 2>, Tensor<TestBackend, 2, Int>, Tensor<TestBackend, 2>)
    {
        let wide = Tensor::from_data(TensorData::new(vec![1.0f32, 0.0, 0.0, 1.0, 1.0, 0.0], [2, 3]), device);
        let cat  = Tensor::from_data(TensorData::new(vec![1i64, 2, 3, 0], [2, 2]), device);
        let cont = Tensor::from_data(TensorData::new(vec![0.5f32, -1.0], [2, 1]), device);
        (wide, cat, cont)
    }

    #[test]
    fn test_dense_forward_shape() {
        let device = Default::default();
        let model: WideDeep<TestBackend> =
            WideDeepConfig::new(WideConfig::new(3), deep_config(DeepArchitecture::Dense)).init(&device);
        let (wide, cat, cont) = inputs(&device);
        let out = model.forward(wide, Some(cat), Some(cont));
        assert_eq!(out.dims(), [2, 1]);
        assert_eq!(model.deep.dense_layers.len(), 2);
        assert!(model.deep.residual_blocks.is_empty());
    }

    #[test]
    fn test_resnet_swaps_only_the_deep_network() {
        let device = Default::default();
        let dense: WideDeep<TestBackend> =
            WideDeepConfig::new(WideConfig::new(3), deep_config(DeepArchitecture::Dense)).init(&device);
        let resnet: WideDeep<TestBackend> =
            WideDeepConfig::new(WideConfig::new(3), deep_config(DeepArchitecture::Resnet)).init(&device);

        assert_eq!(dense.wide.num_params(), resnet.wide.num_params());
        assert_eq!(resnet.deep.residual_blocks.len(), 1);
        assert!(resnet.deep.residual_blocks[0].shortcut.is_some());

        let (wide, cat, cont) = inputs(&device);
        assert_eq!(resnet.forward(wide, Some(cat), Some(cont)).dims(), [2, 1]);
    }

    #[test]
    fn test_dropout_list_is_padded() {
        let cfg = deep_config(DeepArchitecture::Dense);
        assert_eq!(cfg.dropout_at(0), 0.1);
        assert_eq!(cfg.dropout_at(1), 0.1);
        let empty = DeepDenseConfig::new(vec![], 1, vec![4], vec![]);
        assert_eq!(empty.dropout_at(0), 0.0);
    }

    #[test]
    fn test_continuous_only_deep() {
        let device = Default::default();
        let deep: DeepDense<TestBackend> = DeepDenseConfig::new(vec![], 2, vec![4], vec![]).init(&device);
        let cont = Tensor::from_data(TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0], [2, 2]), &device);
        assert_eq!(deep.forward(None, Some(cont)).dims(), [2, 1]);
    }

    #[test]
    fn test_loss_is_finite() {
        let device = Default::default();
        let model: WideDeep<TestBackend> =
            WideDeepConfig::new(WideConfig::new(3), deep_config(DeepArchitecture::Dense)).init(&device);
        let (wide, cat, cont) = inputs(&device);
        let batch = WideDeepBatch {
            wide,
            categorical: Some(cat),
            continuous:  Some(cont),
            targets:     Tensor::from_data(TensorData::new(vec![1i64, 0], [2]), &device),
            labels:      vec![1, 0],
        };
        let (loss, logits) = model.forward_loss(batch);
        let loss: f64 = loss.into_scalar().elem();
        assert!(loss.is_finite() && loss > 0.0);
        assert_eq!(logits.dims(), [2]);
    }
}
