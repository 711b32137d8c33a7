use std::sync::Arc;

use crate::{
    filter::{Candidate, GateDecision, GateReason, Policy, Reducer, MAX_CANDIDATES},
    lm::{top_k, LanguageModel, ModelError, ModelHandle},
    models::PredictReq,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Model not loaded")]
    ModelUnavailable,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Outcome of a prediction that didn't fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Candidates(Vec<Candidate>),
    Gated(GateReason),
}

/// Predictor runs the gate, the model and the reducer for a piece of text.
/// It holds no per-request state and is shared across requests.
pub struct Predictor {
    model: ModelHandle,
    policy: Policy,
    max_candidates: usize,
    top_k: usize,
}

impl Predictor {
    /// `max_candidates` 0 means the default of 5; `top_k` 0 means four times
    /// `max_candidates`, to leave room for tokens lost to filtering.
    pub fn new(model: ModelHandle, policy: Policy, max_candidates: usize, top_k: usize) -> Self {
        let max_candidates = if max_candidates == 0 {
            MAX_CANDIDATES
        } else {
            max_candidates
        };
        let top_k = if top_k == 0 {
            max_candidates * 4
        } else {
            top_k.max(max_candidates)
        };

        Self {
            model,
            policy,
            max_candidates,
            top_k,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Handle a prediction request. The model is checked before the payload,
    /// so an unavailable model fails every request the same way.
    pub fn handle(&self, req: &PredictReq) -> Result<Prediction, Error> {
        let model = self.model.get().ok_or(Error::ModelUnavailable)?;
        let text = req
            .text
            .as_deref()
            .ok_or_else(|| Error::InvalidRequest("No text provided".to_string()))?;

        self.run(model, text)
    }

    /// Predict the next words for `text`.
    pub fn predict(&self, text: &str) -> Result<Prediction, Error> {
        let model = self.model.get().ok_or(Error::ModelUnavailable)?;
        self.run(model, text)
    }

    fn run(&self, model: &Arc<dyn LanguageModel>, text: &str) -> Result<Prediction, Error> {
        let text = text.trim();
        if let GateDecision::Reject(reason) = self.policy.gate(text) {
            log::debug!("gated '{}': {}", text, reason);
            return Ok(Prediction::Gated(reason));
        }

        let ids = model.encode(text)?;
        let probs = model.infer(&ids)?;

        // Decode lazily; the reducer stops pulling once it's full.
        let mut decode_err: Option<ModelError> = None;
        let tokens = top_k(&probs, self.top_k)
            .into_iter()
            .map_while(|(id, p)| match model.decode(id) {
                Ok(t) => Some((t, p as f64)),
                Err(e) => {
                    decode_err = Some(e);
                    None
                }
            });

        let markers = [model.space_marker()];
        let out = Reducer::new(&self.policy)
            .max_candidates(self.max_candidates)
            .space_markers(&markers)
            .reduce(tokens);

        if let Some(e) = decode_err {
            return Err(e.into());
        }

        Ok(Prediction::Candidates(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::testing::FakeModel;

    fn fake() -> FakeModel {
        FakeModel::new(&[
            ("xin", 0.05),
            ("Ġchào", 0.3),
            ("<|endoftext|>", 0.2),
            ("Ġqwer", 0.15),
            ("Ġbạn", 0.1),
            (" chào", 0.25),
            (",", 0.01),
        ])
    }

    fn predictor(m: FakeModel) -> Predictor {
        Predictor::new(ModelHandle::ready(Arc::new(m)), Policy::default(), 0, 0)
    }

    fn words(p: Prediction) -> Vec<String> {
        match p {
            Prediction::Candidates(c) => c.into_iter().map(|c| c.word).collect(),
            Prediction::Gated(r) => panic!("unexpected gate: {}", r),
        }
    }

    #[test]
    fn predicts_in_probability_order() {
        let p = predictor(fake());
        let out = p.predict("xin chào").unwrap();
        match out {
            Prediction::Candidates(c) => {
                assert_eq!(c.len(), 3);
                assert_eq!(c[0].word, "chào");
                assert_eq!(c[0].probability, 0.3);
                assert_eq!(c[1].word, "bạn");
                assert_eq!(c[1].probability, 0.1);
                assert_eq!(c[2].word, "xin");
                assert_eq!(c[2].probability, 0.05);
            }
            Prediction::Gated(r) => panic!("unexpected gate: {}", r),
        }
    }

    #[test]
    fn repeatable() {
        let p = predictor(fake());
        assert_eq!(p.predict("xin chào").unwrap(), p.predict("xin chào").unwrap());
    }

    #[test]
    fn gated_inputs() {
        let p = predictor(fake());
        assert_eq!(
            p.predict("   ").unwrap(),
            Prediction::Gated(GateReason::EmptyText)
        );
        assert_eq!(
            p.predict("xin qwer").unwrap(),
            Prediction::Gated(GateReason::LastWordInvalid)
        );
        assert_eq!(
            p.predict("qwer asdf zxcv chào").unwrap(),
            Prediction::Gated(GateReason::Gibberish)
        );
    }

    #[test]
    fn three_words_reach_the_model() {
        let p = predictor(fake());
        assert!(!words(p.predict("qwer asdf chào").unwrap()).is_empty());
    }

    #[test]
    fn model_unavailable() {
        let p = Predictor::new(
            ModelHandle::Unavailable("no weights".to_string()),
            Policy::default(),
            0,
            0,
        );
        assert!(matches!(p.predict("xin chào"), Err(Error::ModelUnavailable)));
        // Checked before the request payload.
        let req = PredictReq { text: None };
        assert!(matches!(p.handle(&req), Err(Error::ModelUnavailable)));
    }

    #[test]
    fn missing_text() {
        let p = predictor(fake());
        let err = p.handle(&PredictReq { text: None }).unwrap_err();
        assert_eq!(err.to_string(), "No text provided");

        let req = PredictReq {
            text: Some("xin chào".to_string()),
        };
        assert_eq!(words(p.handle(&req).unwrap()), vec!["chào", "bạn", "xin"]);
    }

    #[test]
    fn inference_failure() {
        let mut m = fake();
        m.fail_infer = true;
        let p = predictor(m);
        assert!(matches!(p.predict("xin chào"), Err(Error::Model(_))));
    }

    #[test]
    fn decode_failure() {
        let m = FakeModel {
            vocab: vec!["chào".to_string()],
            probs: vec![0.1, 0.9],
            fail_infer: false,
        };
        let p = predictor(m);
        assert!(matches!(p.predict("chào"), Err(Error::Model(_))));
    }

    #[test]
    fn caps_and_top_k() {
        let p = Predictor::new(ModelHandle::ready(Arc::new(fake())), Policy::default(), 1, 0);
        assert_eq!(words(p.predict("xin chào").unwrap()), vec!["chào"]);

        // top_k is never below max_candidates.
        let p = Predictor::new(ModelHandle::ready(Arc::new(fake())), Policy::default(), 5, 1);
        assert_eq!(words(p.predict("xin chào").unwrap()), vec!["chào", "bạn"]);
    }
}
