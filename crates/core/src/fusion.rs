use crate::config::DEFAULT_RRF_K;
use crate::SearchHit;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RrfFusion {
    k: f64,
}

impl Default for RrfFusion {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

/// One page of a fused ranking. `total` is the number of distinct ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusedPage {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

impl RrfFusion {
    pub fn new(k: f64) -> Self {
        Self { k }
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn contribution(&self, rank: usize) -> f64 {
        1.0 / (self.k + rank as f64)
    }

    /// Full fused ranking, best first.
    pub fn fuse(&self, fulltext: Vec<SearchHit>, vector: Vec<SearchHit>) -> Vec<SearchHit> {
        let mut positions = HashMap::<String, usize>::new();
        let mut fused: Vec<(SearchHit, f64)> = Vec::with_capacity(fulltext.len() + vector.len());

        for list in [fulltext, vector] {
            for (position, hit) in list.into_iter().enumerate() {
                let contribution = self.contribution(position + 1);
                match positions.get(&hit.id) {
                    Some(&slot) => fused[slot].1 += contribution,
                    None => {
                        positions.insert(hit.id.clone(), fused.len());
                        fused.push((hit, contribution));
                    }
                }
            }
        }

        // stable: ties stay in first-seen order
        fused.sort_by(|left, right| right.1.total_cmp(&left.1));

        fused
            .into_iter()
            .map(|(mut hit, score)| {
                hit.score = score;
                hit
            })
            .collect()
    }

    /// Fuses both lists, then cuts page `page` (1-based) of `size` hits.
    pub fn merge(
        &self,
        fulltext: Vec<SearchHit>,
        vector: Vec<SearchHit>,
        page: u32,
        size: u32,
    ) -> FusedPage {
        let ranked = self.fuse(fulltext, vector);
        let total = ranked.len() as u64;
        FusedPage {
            hits: paginate(ranked, page, size),
            total,
        }
    }
}

pub fn paginate(hits: Vec<SearchHit>, page: u32, size: u32) -> Vec<SearchHit> {
    let skip = (page.max(1) as usize - 1).saturating_mul(size as usize);
    hits.into_iter().skip(skip).take(size as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SearchResponse;

    fn hit(id: &str, score: f64) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            doc_type: "document".to_string(),
            title: format!("title {id}"),
            score,
            ..SearchHit::default()
        }
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|hit| hit.id.as_str()).collect()
    }

    #[test]
    fn overlap_is_promoted_above_single_source_hits() {
        let fusion = RrfFusion::default();
        let fused = fusion.fuse(
            vec![hit("A", 3.0), hit("B", 2.0), hit("C", 1.0)],
            vec![hit("B", 0.9), hit("C", 0.8), hit("D", 0.7)],
        );

        assert_eq!(fused[0].id, "B");
        let b = fused[0].score;
        assert!((b - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        let a = fused.iter().find(|h| h.id == "A").unwrap().score;
        let d = fused.iter().find(|h| h.id == "D").unwrap().score;
        assert!(b > a);
        assert!(b > d);
        assert!((a - 1.0 / 61.0).abs() < 1e-12);
        assert!((d - 1.0 / 63.0).abs() < 1e-12);
    }

    #[test]
    fn total_counts_distinct_ids() {
        let page = RrfFusion::default().merge(
            vec![hit("A", 1.0), hit("B", 1.0), hit("C", 1.0)],
            vec![hit("B", 1.0), hit("C", 1.0), hit("D", 1.0)],
            1,
            10,
        );
        assert_eq!(page.total, 4);
        assert_eq!(page.hits.len(), 4);
    }

    #[test]
    fn score_is_overwritten_with_fused_value() {
        let fused = RrfFusion::default().fuse(vec![hit("A", 9.8)], vec![hit("A", 0.91)]);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 2.0 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn fulltext_payload_wins_over_vector_payload() {
        let mut highlighted = hit("A", 5.0);
        highlighted.highlight_title = Some("<em>A</em>".to_string());
        let mut from_vector = hit("A", 0.9);
        from_vector.title = "vector copy".to_string();

        let fused = RrfFusion::default().fuse(vec![highlighted], vec![from_vector]);
        assert_eq!(fused[0].title, "title A");
        assert_eq!(fused[0].highlight_title.as_deref(), Some("<em>A</em>"));
    }

    #[test]
    fn equal_scores_keep_first_seen_order() {
        let fused = RrfFusion::default().fuse(
            vec![hit("ft-1", 1.0), hit("ft-2", 1.0)],
            vec![hit("vec-1", 1.0), hit("vec-2", 1.0)],
        );
        assert_eq!(ids(&fused), vec!["ft-1", "vec-1", "ft-2", "vec-2"]);
    }

    #[test]
    fn scenario_orders_overlap_then_rank_one_then_rank_two() {
        let page = RrfFusion::default().merge(
            vec![hit("doc_1", 9.8), hit("doc_2", 7.1)],
            vec![hit("doc_2", 0.91), hit("doc_3", 0.85)],
            1,
            10,
        );
        assert_eq!(ids(&page.hits), vec!["doc_2", "doc_1", "doc_3"]);
        assert_eq!(page.total, 3);
    }

    #[test]
    fn pagination_is_applied_after_fusion() {
        let fulltext: Vec<_> = (0..30).map(|i| hit(&format!("ft-{i}"), 1.0)).collect();
        let vector: Vec<_> = (0..15).map(|i| hit(&format!("vec-{i}"), 1.0)).collect();
        let fusion = RrfFusion::default();

        let first = fusion.merge(fulltext.clone(), vector.clone(), 1, 20);
        assert_eq!(first.total, 45);
        assert_eq!(first.hits.len(), 20);
        assert!(SearchResponse::new(first.hits, first.total, 1, 20).has_more);

        let third = fusion.merge(fulltext.clone(), vector.clone(), 3, 20);
        assert_eq!(third.hits.len(), 5);
        assert!(!SearchResponse::new(third.hits, third.total, 3, 20).has_more);

        let fourth = fusion.merge(fulltext, vector, 4, 20);
        assert!(fourth.hits.is_empty());
        assert!(!SearchResponse::new(fourth.hits, fourth.total, 4, 20).has_more);
    }

    #[test]
    fn smaller_k_widens_the_gap_between_ranks() {
        let gap = |fusion: RrfFusion| fusion.contribution(1) - fusion.contribution(2);
        assert!(gap(RrfFusion::new(1.0)) > gap(RrfFusion::new(60.0)));
    }

    #[test]
    fn empty_inputs_give_empty_page() {
        let page = RrfFusion::default().merge(Vec::new(), Vec::new(), 1, 20);
        assert!(page.hits.is_empty());
        assert_eq!(page.total, 0);
    }
}
