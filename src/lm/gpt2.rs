use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{embedding, layer_norm, Embedding, LayerNorm, Module, VarBuilder};
use serde::Deserialize;
use tokenizers::Tokenizer;

use super::{LanguageModel, ModelError};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PTH_FILE: &str = "pytorch_model.bin";

/// Subset of the Hugging Face GPT-2 config.json that the forward pass needs.
#[derive(Debug, Clone, Deserialize)]
pub struct Gpt2Config {
    pub vocab_size: usize,
    #[serde(default = "default_n_positions")]
    pub n_positions: usize,
    pub n_embd: usize,
    pub n_layer: usize,
    pub n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    pub layer_norm_epsilon: f64,
}

fn default_n_positions() -> usize {
    1024
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

/// GPT-2 "Conv1D": a linear layer with (in, out) weights.
struct Conv1D {
    weight: Tensor,
    bias: Tensor,
}

impl Conv1D {
    fn load(n_in: usize, n_out: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let weight = vb.get((n_in, n_out), "weight")?;
        let bias = vb.get(n_out, "bias")?;
        Ok(Self { weight, bias })
    }
}

impl Module for Conv1D {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        xs.matmul(&self.weight)?.broadcast_add(&self.bias)
    }
}

struct Attention {
    c_attn: Conv1D,
    c_proj: Conv1D,
    n_head: usize,
    head_dim: usize,
}

impl Attention {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            c_attn: Conv1D::load(cfg.n_embd, 3 * cfg.n_embd, vb.pp("c_attn"))?,
            c_proj: Conv1D::load(cfg.n_embd, cfg.n_embd, vb.pp("c_proj"))?,
            n_head: cfg.n_head,
            head_dim: cfg.n_embd / cfg.n_head,
        })
    }

    /// xs: (seq, n_embd), mask: (seq, seq) additive causal mask.
    fn forward(&self, xs: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
        let (t, c) = xs.dims2()?;
        let qkv = self.c_attn.forward(xs)?;

        // (seq, 3c) -> 3 x (heads, seq, head_dim)
        let split = |i: usize| -> candle_core::Result<Tensor> {
            qkv.narrow(1, i * c, c)?
                .contiguous()?
                .reshape((t, self.n_head, self.head_dim))?
                .transpose(0, 1)?
                .contiguous()
        };
        let (q, k, v) = (split(0)?, split(1)?, split(2)?);

        let att = (q.matmul(&k.t()?.contiguous()?)? / (self.head_dim as f64).sqrt())?;
        let att = candle_nn::ops::softmax_last_dim(&att.broadcast_add(mask)?)?;
        let ys = att
            .matmul(&v)?
            .transpose(0, 1)?
            .contiguous()?
            .reshape((t, c))?;

        self.c_proj.forward(&ys)
    }
}

struct Mlp {
    c_fc: Conv1D,
    c_proj: Conv1D,
}

impl Mlp {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            c_fc: Conv1D::load(cfg.n_embd, 4 * cfg.n_embd, vb.pp("c_fc"))?,
            c_proj: Conv1D::load(4 * cfg.n_embd, cfg.n_embd, vb.pp("c_proj"))?,
        })
    }
}

impl Module for Mlp {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        self.c_proj.forward(&self.c_fc.forward(xs)?.gelu()?)
    }
}

struct Block {
    ln_1: LayerNorm,
    attn: Attention,
    ln_2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        let eps = cfg.layer_norm_epsilon;
        Ok(Self {
            ln_1: layer_norm(cfg.n_embd, eps, vb.pp("ln_1"))?,
            attn: Attention::load(cfg, vb.pp("attn"))?,
            ln_2: layer_norm(cfg.n_embd, eps, vb.pp("ln_2"))?,
            mlp: Mlp::load(cfg, vb.pp("mlp"))?,
        })
    }

    fn forward(&self, xs: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
        let h = (xs + self.attn.forward(&self.ln_1.forward(xs)?, mask)?)?;
        &h + self.mlp.forward(&self.ln_2.forward(&h)?)?
    }
}

/// The GPT-2 network: embeddings, transformer blocks and a tied LM head.
struct Gpt2 {
    wte: Embedding,
    wpe: Embedding,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    lm_head: Tensor,
    n_positions: usize,
    device: Device,
}

impl Gpt2 {
    fn load(cfg: &Gpt2Config, vb: VarBuilder) -> candle_core::Result<Self> {
        if cfg.n_head == 0 || cfg.n_embd % cfg.n_head != 0 {
            candle_core::bail!("n_embd {} not divisible by n_head {}", cfg.n_embd, cfg.n_head);
        }

        let wte = embedding(cfg.vocab_size, cfg.n_embd, vb.pp("wte"))?;
        let wpe = embedding(cfg.n_positions, cfg.n_embd, vb.pp("wpe"))?;
        let blocks = (0..cfg.n_layer)
            .map(|i| Block::load(cfg, vb.pp("h").pp(i)))
            .collect::<candle_core::Result<Vec<_>>>()?;
        let ln_f = layer_norm(cfg.n_embd, cfg.layer_norm_epsilon, vb.pp("ln_f"))?;

        // Output projection shares the token embedding matrix.
        let lm_head = wte.embeddings().t()?.contiguous()?;

        Ok(Self {
            wte,
            wpe,
            blocks,
            ln_f,
            lm_head,
            n_positions: cfg.n_positions,
            device: vb.device().clone(),
        })
    }

    /// Softmax over the vocabulary for the position after `ids`. Prefixes
    /// longer than the context window keep their last `n_positions` tokens.
    fn next_token_probs(&self, ids: &[u32]) -> candle_core::Result<Vec<f32>> {
        if ids.is_empty() {
            candle_core::bail!("empty input");
        }
        let ids = &ids[ids.len().saturating_sub(self.n_positions)..];
        let t = ids.len();

        let input = Tensor::new(ids, &self.device)?;
        let pos = Tensor::arange(0u32, t as u32, &self.device)?;
        let mut h = (self.wte.forward(&input)? + self.wpe.forward(&pos)?)?;

        let mask = causal_mask(t, &self.device)?;
        for b in &self.blocks {
            h = b.forward(&h, &mask)?;
        }
        let h = self.ln_f.forward(&h)?;

        let last = h.get(t - 1)?.unsqueeze(0)?;
        let logits = last.matmul(&self.lm_head)?;
        candle_nn::ops::softmax_last_dim(&logits)?
            .squeeze(0)?
            .to_vec1::<f32>()
    }
}

/// Additive mask that hides future positions.
fn causal_mask(t: usize, device: &Device) -> candle_core::Result<Tensor> {
    let mask: Vec<f32> = (0..t)
        .flat_map(|i| (0..t).map(move |j| if j > i { f32::NEG_INFINITY } else { 0.0 }))
        .collect();
    Tensor::from_vec(mask, (t, t), device)
}

/// GPT-2 causal LM with a Hugging Face tokenizer, loaded from a model
/// directory holding config.json, tokenizer.json and the weights.
pub struct Gpt2Model {
    name: String,
    tokenizer: Tokenizer,
    net: Gpt2,
}

impl Gpt2Model {
    pub fn from_dir(dir: &Path) -> Result<Self, ModelError> {
        if !dir.is_dir() {
            return Err(ModelError::Invalid(format!(
                "model directory '{}' not found",
                dir.display()
            )));
        }

        let raw = std::fs::read_to_string(dir.join(CONFIG_FILE))?;
        let cfg: Gpt2Config = serde_json::from_str(&raw)?;
        log::info!(
            "gpt2: vocab={} layers={} heads={} embd={} ctx={}",
            cfg.vocab_size,
            cfg.n_layer,
            cfg.n_head,
            cfg.n_embd,
            cfg.n_positions
        );

        let tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;

        let device = Device::Cpu;
        let vb = load_weights(dir, &device)?;

        // GPT2LMHeadModel checkpoints nest the network under "transformer.".
        let vb = if vb.contains_tensor("transformer.wte.weight") {
            vb.pp("transformer")
        } else {
            vb
        };
        let net = Gpt2::load(&cfg, vb)?;

        let name = dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("gpt2")
            .to_string();

        Ok(Self {
            name,
            tokenizer,
            net,
        })
    }
}

fn load_weights(dir: &Path, device: &Device) -> Result<VarBuilder<'static>, ModelError> {
    let st = dir.join(SAFETENSORS_FILE);
    if st.exists() {
        // Safety: the weights file must not change while it's mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[st], DType::F32, device)? };
        return Ok(vb);
    }

    let pth = dir.join(PTH_FILE);
    if pth.exists() {
        return Ok(VarBuilder::from_pth(pth, DType::F32, device)?);
    }

    Err(ModelError::Invalid(format!(
        "no {} or {} in '{}'",
        SAFETENSORS_FILE,
        PTH_FILE,
        dir.display()
    )))
}

impl LanguageModel for Gpt2Model {
    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>, ModelError> {
        let enc = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))?;
        Ok(enc.get_ids().to_vec())
    }

    fn infer(&self, ids: &[u32]) -> Result<Vec<f32>, ModelError> {
        Ok(self.net.next_token_probs(ids)?)
    }

    fn decode(&self, id: u32) -> Result<String, ModelError> {
        self.tokenizer
            .decode(&[id], false)
            .map_err(|e| ModelError::Tokenizer(e.to_string()))
    }
}
