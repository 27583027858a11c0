use crate::scoring::tabular::{NoteStatusTable, NoteTopicsTable, RatingsTable, UserEnrollmentTable};
use std::collections::BTreeMap;

pub const CRH_INTERCEPT_THRESHOLD: f64 = 0.40;
pub const CRNH_INTERCEPT_THRESHOLD: f64 = -0.05;
const MIN_RATINGS_FOR_STATUS: usize = 5;
const EPOCHS: usize = 60;
const LEARNING_RATE: f64 = 0.05;
const REGULARIZATION: f64 = 0.03;

#[derive(Debug, Clone)]
pub struct PrescoringArgs {
    pub ratings: RatingsTable,
    pub note_status_history: NoteStatusTable,
    pub user_enrollment: UserEnrollmentTable,
    pub note_topics: NoteTopicsTable,
}

/// Intermediate model state handed from the prescore phase to final scoring.
#[derive(Debug, Clone)]
pub struct PrescoreOutput {
    pub global_mean: f64,
    pub note_intercepts: BTreeMap<i64, f64>,
    pub rater_intercepts: BTreeMap<i64, f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredNote {
    pub note_id: i64,
    pub intercept: f64,
    pub factor: f64,
    pub rating_status: String,
}

/// Matrix-factorization core scorer.
///
/// Models each rating as `global_mean + rater_intercept + note_intercept +
/// rater_factor * note_factor` and fits by gradient descent with L2
/// regularization. Everything is seedless and iterates in sorted-id order, so
/// identical inputs produce identical outputs.
pub struct MfCoreScorer;

impl MfCoreScorer {
    pub fn new() -> Self {
        MfCoreScorer
    }

    /// Phase one: center the data. Produces the global mean and residual
    /// per-note / per-rater means used to initialize the final fit.
    pub fn prescore(&self, args: &PrescoringArgs) -> PrescoreOutput {
        let ratings = &args.ratings;
        if ratings.is_empty() {
            return PrescoreOutput {
                global_mean: 0.5,
                note_intercepts: BTreeMap::new(),
                rater_intercepts: BTreeMap::new(),
            };
        }

        let global_mean: f64 = ratings.helpfulness.iter().sum::<f64>() / ratings.len() as f64;

        let mut note_sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        let mut rater_sums: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
        for i in 0..ratings.len() {
            let residual = ratings.helpfulness[i] - global_mean;
            let note = note_sums.entry(ratings.note_ids[i]).or_insert((0.0, 0));
            note.0 += residual;
            note.1 += 1;
            let rater = rater_sums.entry(ratings.rater_ids[i]).or_insert((0.0, 0));
            rater.0 += residual;
            rater.1 += 1;
        }

        let note_intercepts = note_sums
            .into_iter()
            .map(|(id, (sum, count))| (id, sum / count as f64))
            .collect();
        let rater_intercepts = rater_sums
            .into_iter()
            .map(|(id, (sum, count))| (id, sum / count as f64))
            .collect();

        PrescoreOutput {
            global_mean,
            note_intercepts,
            rater_intercepts,
        }
    }

    /// Phase two: fit intercepts and one-dimensional factors starting from the
    /// prescore state, then derive a rating status per note.
    pub fn score_final(&self, args: &PrescoringArgs, prescore: &PrescoreOutput) -> Vec<ScoredNote> {
        let ratings = &args.ratings;
        if ratings.is_empty() {
            return Vec::new();
        }

        let mut note_intercepts = prescore.note_intercepts.clone();
        let mut rater_intercepts = prescore.rater_intercepts.clone();
        let mut note_factors: BTreeMap<i64, f64> = note_intercepts.keys().map(|id| (*id, factor_init(*id))).collect();
        let mut rater_factors: BTreeMap<i64, f64> =
            rater_intercepts.keys().map(|id| (*id, factor_init(*id))).collect();
        // Enrolled participants without ratings still get model slots so the
        // fit does not panic when they appear later.
        for participant in &args.user_enrollment.participant_ids {
            rater_intercepts.entry(*participant).or_insert(0.0);
            rater_factors.entry(*participant).or_insert_with(|| factor_init(*participant));
        }

        let mu = prescore.global_mean;
        for _epoch in 0..EPOCHS {
            for i in 0..ratings.len() {
                let note_id = ratings.note_ids[i];
                let rater_id = ratings.rater_ids[i];
                let b_n = *note_intercepts.get(&note_id).unwrap_or(&0.0);
                let b_u = *rater_intercepts.get(&rater_id).unwrap_or(&0.0);
                let f_n = *note_factors.get(&note_id).unwrap_or(&0.0);
                let f_u = *rater_factors.get(&rater_id).unwrap_or(&0.0);

                let prediction = mu + b_u + b_n + f_u * f_n;
                let error = ratings.helpfulness[i] - prediction;

                note_intercepts.insert(note_id, b_n + LEARNING_RATE * (error - REGULARIZATION * b_n));
                rater_intercepts.insert(rater_id, b_u + LEARNING_RATE * (error - REGULARIZATION * b_u));
                note_factors.insert(note_id, f_n + LEARNING_RATE * (error * f_u - REGULARIZATION * f_n));
                rater_factors.insert(rater_id, f_u + LEARNING_RATE * (error * f_n - REGULARIZATION * f_u));
            }
        }

        let mut rating_counts: BTreeMap<i64, usize> = BTreeMap::new();
        for note_id in &ratings.note_ids {
            *rating_counts.entry(*note_id).or_insert(0) += 1;
        }

        note_intercepts
            .iter()
            .map(|(note_id, intercept)| {
                let factor = *note_factors.get(note_id).unwrap_or(&0.0);
                let count = *rating_counts.get(note_id).unwrap_or(&0);
                ScoredNote {
                    note_id: *note_id,
                    intercept: *intercept,
                    factor,
                    rating_status: rating_status(*intercept, factor, count).to_string(),
                }
            })
            .collect()
    }
}

impl Default for MfCoreScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic, nonzero factor initialization. Zero init would freeze the
/// factor gradients entirely.
fn factor_init(id: i64) -> f64 {
    (((id % 7) - 3) as f64) / 30.0 + 0.01
}

fn rating_status(intercept: f64, factor: f64, rating_count: usize) -> &'static str {
    if rating_count < MIN_RATINGS_FOR_STATUS {
        return "NEEDS_MORE_RATINGS";
    }
    // A strong factor signals polarized raters; hold the note back from CRH.
    if intercept >= CRH_INTERCEPT_THRESHOLD && factor.abs() < 0.5 {
        "CURRENTLY_RATED_HELPFUL"
    } else if intercept <= CRNH_INTERCEPT_THRESHOLD {
        "CURRENTLY_RATED_NOT_HELPFUL"
    } else {
        "NEEDS_MORE_RATINGS"
    }
}
