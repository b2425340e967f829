//! Term suggestions from similar annotations.
//!
//! Similarity scores of retrieved annotations are summed per term (only
//! terms of the current ontology count) and the two heaviest terms are
//! offered, each with its share of the total as a confidence.

use crate::context::{LayerContext, TermDirectory};
use crate::state::Services;
use anno_core::{
    AnnotationId, AnnotationTerm, Result, RetrievalHit, SuggestedTerm, SuggestionState, TermId,
    TermSuggestion,
};
use std::rc::Rc;

/// Number of suggestions shown.
pub const SUGGESTION_COUNT: usize = 2;

/// Per-term similarity sums, in the order terms are first met while
/// scanning `hits`.
pub fn aggregate(hits: &[RetrievalHit], terms: &TermDirectory) -> Vec<(TermId, f64)> {
    let mut sums: Vec<(TermId, f64)> = Vec::new();
    for hit in hits {
        for term in hit.terms.iter().filter(|t| terms.contains(**t)) {
            match sums.iter_mut().find(|(t, _)| t == term) {
                Some((_, sum)) => *sum += hit.similarity,
                None => sums.push((*term, hit.similarity)),
            }
        }
    }
    sums
}

/// The `limit` heaviest terms. On equal sums the term met first wins.
/// Confidence is relative to the sum of every aggregated term, not just
/// the ones kept.
pub fn rank(sums: &[(TermId, f64)], limit: usize) -> Vec<TermSuggestion> {
    let total: f64 = sums.iter().map(|(_, s)| s).sum();
    if total <= 0.0 {
        return vec![];
    }
    let mut ordered: Vec<&(TermId, f64)> = sums.iter().filter(|(_, s)| *s > 0.0).collect();
    // Stable sort keeps scan order among equal sums.
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1));
    ordered
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (term, sum))| TermSuggestion {
            term: *term,
            aggregated_similarity: *sum,
            rank: i + 1,
            confidence: (sum / total * 100.0).round() as u32,
        })
        .collect()
}

#[derive(Clone)]
pub struct SuggestionEngine {
    services: Services,
    context: Rc<LayerContext>,
}

impl SuggestionEngine {
    pub fn new(services: Services, context: Rc<LayerContext>) -> Self {
        Self { services, context }
    }

    /// Ranked suggestions for `annotation`.
    pub async fn suggest(&self, annotation: AnnotationId) -> Result<Vec<TermSuggestion>> {
        let hits = self.services.retrieval.similar(annotation).await?;
        let sums = aggregate(&hits, &self.context.terms);
        let ranked = rank(&sums, SUGGESTION_COUNT);
        log::debug!(
            "suggest: annotation {annotation}: {} hit(s), {} term(s), {} suggestion(s)",
            hits.len(),
            sums.len(),
            ranked.len()
        );
        Ok(ranked)
    }

    /// Suggestion section of a popup. A retrieval failure degrades to
    /// `Unavailable`, never to an error.
    pub async fn popup_state(&self, annotation: AnnotationId) -> SuggestionState {
        match self.suggest(annotation).await {
            Ok(ranked) => SuggestionState::Ready(
                ranked
                    .into_iter()
                    .map(|s| SuggestedTerm {
                        term: s.term,
                        name: self
                            .context
                            .terms
                            .get(s.term)
                            .map(|t| t.name.clone())
                            .unwrap_or_default(),
                        confidence: s.confidence,
                    })
                    .collect(),
            ),
            Err(e) => {
                log::warn!("suggest: cannot reach retrieval for annotation {annotation}: {e}");
                SuggestionState::Unavailable
            }
        }
    }

    /// Replace the annotation's terms with the suggested one, then reload
    /// the ontology tree for it.
    pub async fn accept(&self, annotation: AnnotationId, term: TermId) -> Result<()> {
        let link = AnnotationTerm::replacing(annotation, term);
        match self.services.store.add_annotation_term(&link).await {
            Ok(ack) => {
                log::info!("suggest: annotation {annotation} now carries term {term}");
                self.services.notifier.message("Correct Term", &ack.message);
                self.services.ontology.refresh(annotation);
                Ok(())
            }
            Err(e) => {
                self.services.notifier.message("Correct term", &e.user_message());
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anno_core::{Color, OntologyId, Term};
    use pretty_assertions::assert_eq;

    fn directory(ids: &[u64]) -> TermDirectory {
        TermDirectory::new(ids.iter().map(|id| Term {
            id: TermId(*id),
            name: format!("term {id}"),
            color: Color::BLACK,
            ontology: OntologyId(1),
        }))
    }

    fn hit(annotation: u64, terms: &[u64], similarity: f64) -> RetrievalHit {
        RetrievalHit {
            annotation: AnnotationId(annotation),
            terms: terms.iter().map(|t| TermId(*t)).collect(),
            similarity,
        }
    }

    #[test]
    fn ranks_top_two_with_share_of_total() {
        let sums = vec![(TermId(1), 6.0), (TermId(2), 3.0), (TermId(3), 1.0)];
        let ranked = rank(&sums, SUGGESTION_COUNT);
        assert_eq!(
            ranked,
            vec![
                TermSuggestion {
                    term: TermId(1),
                    aggregated_similarity: 6.0,
                    rank: 1,
                    confidence: 60,
                },
                TermSuggestion {
                    term: TermId(2),
                    aggregated_similarity: 3.0,
                    rank: 2,
                    confidence: 30,
                },
            ]
        );
    }

    #[test]
    fn empty_retrieval_gives_nothing() {
        assert!(rank(&aggregate(&[], &directory(&[1, 2])), SUGGESTION_COUNT).is_empty());
    }

    #[test]
    fn aggregation_ignores_foreign_terms() {
        let hits = vec![
            hit(10, &[1, 99], 0.5),
            hit(11, &[2], 0.25),
            hit(12, &[1], 0.25),
            hit(13, &[99], 5.0),
        ];
        assert_eq!(
            aggregate(&hits, &directory(&[1, 2])),
            vec![(TermId(1), 0.75), (TermId(2), 0.25)]
        );
    }

    #[test]
    fn only_foreign_terms_gives_nothing() {
        let hits = vec![hit(10, &[99], 0.9)];
        assert!(rank(&aggregate(&hits, &directory(&[1])), SUGGESTION_COUNT).is_empty());
    }

    #[test]
    fn tie_goes_to_first_met() {
        let sums = vec![(TermId(5), 2.0), (TermId(3), 2.0), (TermId(4), 2.0)];
        let ranked = rank(&sums, SUGGESTION_COUNT);
        assert_eq!(ranked[0].term, TermId(5));
        assert_eq!(ranked[1].term, TermId(3));
        assert_eq!(ranked[0].confidence, 33);
    }
}
