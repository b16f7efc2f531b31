//! Label aggregation over a ranked neighbor list

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};
use crate::knn;
use crate::record::Neighbor;

/// How neighbor labels are combined into one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotingMode {
    /// Equal blend of normalised inverse-distance weight and normalised vote count.
    #[default]
    Hybrid,
    /// Majority vote; confidence is the winner's share of `k`.
    Plurality,
}

/// Outcome of a classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteResult {
    pub winning_label: String,
    /// In `[0, 100]`.
    pub confidence_percent: f64,
    /// Score per label, in the order labels were first seen among the neighbors.
    pub per_label_scores: IndexMap<String, f64>,
    pub neighbors_considered: Vec<Neighbor>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    votes: usize,
    weight: f64,
}

/// Aggregate the first `k` of `neighbors` (already ranked closest first).
///
/// Ties between labels go to the label encountered first.
pub fn aggregate(mut neighbors: Vec<Neighbor>, k: usize, mode: VotingMode) -> Result<VoteResult> {
    knn::validate_k(k)?;
    if neighbors.is_empty() {
        return Err(ClassifierError::NoNeighbors);
    }
    neighbors.truncate(k);
    if let Some(bad) = neighbors
        .iter()
        .find(|n| !n.distance.is_finite() || n.distance < 0.0)
    {
        return Err(ClassifierError::InvalidArgument {
            reason: format!("neighbor {} has invalid distance {}", bad.id, bad.distance),
        });
    }

    let mut tallies: IndexMap<String, Tally> = IndexMap::new();
    for n in &neighbors {
        let t = tallies.entry(n.label.clone()).or_default();
        t.votes += 1;
        t.weight += 1.0 / (f64::from(n.distance) + 1.0);
    }

    let per_label_scores: IndexMap<String, f64> = match mode {
        VotingMode::Hybrid => {
            let max_votes = tallies.values().map(|t| t.votes).max().unwrap_or(1) as f64;
            let total_weight: f64 = tallies.values().map(|t| t.weight).sum();
            tallies
                .iter()
                .map(|(label, t)| {
                    let vote_norm = t.votes as f64 / max_votes;
                    let weight_norm = t.weight / total_weight;
                    let score = 0.5 * weight_norm + 0.5 * vote_norm;
                    tracing::debug!(
                        label = %label,
                        votes = t.votes,
                        weight = t.weight,
                        vote_norm,
                        weight_norm,
                        score,
                        "label tally"
                    );
                    (label.clone(), score)
                })
                .collect()
        }
        VotingMode::Plurality => tallies
            .iter()
            .map(|(label, t)| {
                let score = t.votes as f64 / k as f64;
                tracing::debug!(label = %label, votes = t.votes, score, "label tally");
                (label.clone(), score)
            })
            .collect(),
    };

    let mut winner: Option<(&String, f64)> = None;
    for (label, &score) in &per_label_scores {
        if winner.map_or(true, |(_, best)| score > best) {
            winner = Some((label, score));
        }
    }
    let (winning_label, best) = winner.ok_or(ClassifierError::NoNeighbors)?;

    let confidence_percent = match mode {
        VotingMode::Hybrid => {
            let total: f64 = per_label_scores.values().sum();
            100.0 * best / total
        }
        VotingMode::Plurality => 100.0 * best,
    };

    Ok(VoteResult {
        winning_label: winning_label.clone(),
        confidence_percent: confidence_percent.clamp(0.0, 100.0),
        per_label_scores,
        neighbors_considered: neighbors,
    })
}
