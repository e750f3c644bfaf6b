use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::QuestionId;

/// Freeze the question list for a new session.
///
/// Shuffles the pool when requested, otherwise keeps pool order, then
/// truncates to `count`.
#[must_use]
pub fn select_questions(mut pool: Vec<QuestionId>, count: u32, shuffle: bool) -> Vec<QuestionId> {
    if shuffle {
        let mut rng = rng();
        pool.as_mut_slice().shuffle(&mut rng);
    }
    let limit = usize::try_from(count).unwrap_or(usize::MAX);
    pool.truncate(limit);
    pool
}
