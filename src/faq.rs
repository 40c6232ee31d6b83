//! FAQ semantic matcher — embeds questions and ranks stored entries by
//! cosine similarity.
//!
//! Similarity is computed in-process over the candidate set re-read from the
//! store on every call. The FAQ set is small; there is no index and no cache.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{DatabaseError, Error};
use crate::llm::LlmProvider;
use crate::store::{FaqEntry, Store};

/// A FAQ ranked above the similarity threshold.
#[derive(Debug, Clone)]
pub struct FaqMatch {
    pub entry: FaqEntry,
    pub similarity: f32,
}

/// FAQ storage and similarity matching.
pub struct FaqMatcher {
    llm: Arc<dyn LlmProvider>,
    store: Arc<dyn Store>,
    threshold: f32,
}

impl FaqMatcher {
    pub fn new(llm: Arc<dyn LlmProvider>, store: Arc<dyn Store>, threshold: f32) -> Self {
        Self {
            llm,
            store,
            threshold,
        }
    }

    /// Find the stored FAQ most similar to the question.
    ///
    /// Returns the best entry when its similarity reaches the threshold and
    /// increments its match counter. Entries without an embedding are never
    /// candidates. Provider or store failures degrade to `None` — this stage
    /// never aborts the pipeline.
    pub async fn find_match(&self, question: &str) -> Option<FaqMatch> {
        let embedding = match self.llm.embed(question).await {
            Ok(e) => e,
            Err(e) => {
                error!(error = %e, "FAQ matching failed: question embedding");
                return None;
            }
        };

        let candidates = match self.store.faqs_with_embeddings().await {
            Ok(c) => c,
            Err(e) => {
                error!(error = %e, "FAQ matching failed: loading candidates");
                return None;
            }
        };

        if candidates.is_empty() {
            warn!("No FAQs with embeddings found");
            return None;
        }

        // Ties resolve to whichever entry ranked first; callers must not
        // depend on which tied entry wins.
        let mut best: Option<(FaqEntry, f32)> = None;
        for entry in candidates {
            let Some(ref stored) = entry.embedding else {
                continue;
            };
            let similarity = cosine_similarity(&embedding, stored);
            match best {
                Some((_, s)) if s >= similarity => {}
                _ => best = Some((entry, similarity)),
            }
        }

        let (entry, similarity) = best?;

        if similarity < self.threshold {
            info!(best = similarity, "No FAQ match above threshold");
            return None;
        }

        info!(faq = %entry.id, similarity, "FAQ match found");
        if let Err(e) = self.store.increment_faq_matches(entry.id).await {
            error!(error = %e, "Failed to increment FAQ match counter");
        }

        Some(FaqMatch { entry, similarity })
    }

    /// Add a new FAQ with its question embedding.
    ///
    /// The embedding is computed first; if that fails, nothing is persisted.
    pub async fn add_entry(
        &self,
        question: &str,
        answer: &str,
        category: Option<&str>,
        created_by: Option<Uuid>,
    ) -> Result<FaqEntry, Error> {
        let embedding = self.llm.embed(question).await?;
        let entry = self
            .store
            .insert_faq(question, answer, category, &embedding, created_by)
            .await?;
        info!(faq = %entry.id, "Created FAQ");
        Ok(entry)
    }

    /// Delete a FAQ by id. Returns whether a row existed.
    pub async fn delete_entry(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let existed = self.store.delete_faq(id).await?;
        if existed {
            info!(faq = %id, "Deleted FAQ");
        }
        Ok(existed)
    }

    /// All stored entries, for the admin list command.
    pub async fn list_entries(&self) -> Result<Vec<FaqEntry>, DatabaseError> {
        self.store.list_faqs().await
    }
}

/// Cosine similarity: `dot(a, b) / (‖a‖ · ‖b‖)`.
///
/// Returns 0.0 when either vector has zero norm — never divides by zero.
/// Vectors of mismatched length compare over the shorter prefix.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
