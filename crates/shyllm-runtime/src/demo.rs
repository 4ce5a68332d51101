//! Tiny deterministic word model.
//!
//! The vocabulary is a fixed word list. Next-token logits come from a bigram-ish
//! table of seeded pseudo-random weights: the row of the last token plus half the
//! row of the token before it. Good enough to exercise sampling, stop conditions
//! and streaming; it does not produce meaningful text.

use shyllm_engine::{
    ChunkSink, FinishReason, GenerationError, GenerationRequest, GenerationResponse, Precision,
    TextGenerator, Usage,
};
use shyllm_sampling::{Sampler, SamplingParams, SeededRng};

pub const DEMO_MODEL_ID: &str = "demo-model";

/// End-of-sequence token.
const EOS: usize = 0;

/// Longest token sequence (prompt plus completion) the model attends over.
pub const CONTEXT_WINDOW: usize = 2048;

const WEIGHT_SEED: u64 = 12345;
const WEIGHT_SCALE: f32 = 4.0;
const EOS_BIAS: f32 = -1.5;

const VOCAB: &[&str] = &[
    "</s>", "the", "a", "model", "is", "running", "locally", "and", "ready", "to", "serve",
    "your", "request", "with", "small", "words", "that", "make", "little", "sense", "but",
    "stay", "stable", "for", "each", "seed", "hello", "world", "from", "inside", "container",
    "text", "flows", "quietly", "through", "tokens", "one", "at", "time", "server", "answers",
    "prompt", "slowly", "light", "river", "stone", "bright", "morning",
];

pub struct DemoModel {
    id: String,
    /// Row-major `[vocab, vocab]` transition weights.
    weights: Vec<f32>,
}

impl DemoModel {
    pub fn new(id: impl Into<String>, precision: Precision) -> Self {
        let v = VOCAB.len();
        let mut rng = SeededRng::new(WEIGHT_SEED);
        let weights = (0..v * v)
            .map(|_| (rng.next_f32() - 0.5) * WEIGHT_SCALE)
            .map(|w| quantize(w, precision))
            .collect();
        Self {
            id: id.into(),
            weights,
        }
    }

    /// Bytes held by the weight table.
    pub fn footprint_bytes() -> u64 {
        (VOCAB.len() * VOCAB.len() * std::mem::size_of::<f32>()) as u64
    }

    pub fn vocab_size(&self) -> usize {
        VOCAB.len()
    }

    /// Whitespace-split, case-insensitive. Unknown words hash onto a non-EOS id.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        text.split_whitespace()
            .map(|word| {
                let word = word.to_lowercase();
                VOCAB
                    .iter()
                    .skip(1)
                    .position(|w| *w == word)
                    .map(|i| i + 1)
                    .unwrap_or_else(|| 1 + (fnv1a(&word) % (VOCAB.len() as u64 - 1)) as usize)
            })
            .collect()
    }

    fn logits(&self, context: &[usize]) -> Vec<f32> {
        let v = VOCAB.len();
        let mut logits = vec![0.0; v];
        if let Some(&last) = context.last() {
            logits.copy_from_slice(&self.weights[last * v..(last + 1) * v]);
        }
        if context.len() >= 2 {
            let prev = context[context.len() - 2];
            for (logit, w) in logits.iter_mut().zip(&self.weights[prev * v..(prev + 1) * v]) {
                *logit += 0.5 * w;
            }
        }
        logits[EOS] += EOS_BIAS;
        logits
    }
}

impl TextGenerator for DemoModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn generate(
        &mut self,
        request: &GenerationRequest,
        on_chunk: &mut ChunkSink<'_>,
    ) -> shyllm_engine::Result<GenerationResponse> {
        let options = &request.options;
        let prompt = self.encode(&request.prompt);
        if prompt.is_empty() {
            return Err(GenerationError::InvalidPrompt(
                "prompt contains no tokens".to_string(),
            ));
        }
        if prompt.len() >= CONTEXT_WINDOW {
            return Err(GenerationError::InvalidPrompt(format!(
                "prompt is {} tokens, context window is {CONTEXT_WINDOW}",
                prompt.len()
            )));
        }

        let params = SamplingParams {
            temperature: options.temperature,
            top_k: options.top_k,
            top_p: options.top_p,
        };
        let seed = options.seed.unwrap_or_else(rand::random);
        let mut sampler = Sampler::new(params, seed)
            .map_err(|e| GenerationError::InvalidOptions(e.to_string()))?;

        let mut context = prompt.clone();
        let mut text = String::new();
        let mut completion_tokens = 0;
        let mut finish_reason = FinishReason::Length;

        for step in 0..options.max_tokens {
            if context.len() >= CONTEXT_WINDOW {
                break;
            }
            let mut logits = self.logits(&context);
            if step == 0 {
                // Always emit at least one word.
                logits[EOS] = f32::NEG_INFINITY;
            }
            let token = sampler
                .sample(&logits)
                .map_err(|e| GenerationError::Inference(e.to_string()))?;
            if token == EOS {
                finish_reason = FinishReason::Stop;
                break;
            }

            let chunk = if text.is_empty() {
                VOCAB[token].to_string()
            } else {
                format!(" {}", VOCAB[token])
            };
            text.push_str(&chunk);
            context.push(token);
            completion_tokens += 1;

            if on_chunk(&chunk).is_break() {
                finish_reason = FinishReason::Cancelled;
                break;
            }
        }

        tracing::debug!(model = %self.id, seed, completion_tokens, "demo generation finished");

        Ok(GenerationResponse {
            text,
            finish_reason,
            usage: Usage {
                prompt_tokens: prompt.len(),
                completion_tokens,
            },
        })
    }

    fn unload(&mut self) {
        self.weights = Vec::new();
    }
}

/// Half precisions keep 8 mantissa bits (bf16 layout).
fn quantize(w: f32, precision: Precision) -> f32 {
    match precision {
        Precision::F32 => w,
        Precision::F16 | Precision::Bf16 => f32::from_bits(w.to_bits() & 0xFFFF_0000),
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}
