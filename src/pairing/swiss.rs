//! Swiss-system pairing.
//!
//! Players arrive in standings order and are split into score groups. The
//! highest unpaired player is offered opponents in fold order: the player
//! half a group below first, then the rest of its group, then the next score
//! groups down. An odd group's lowest player is held back as a floater for
//! the group below. Rematches are never proposed, and a choice is only taken
//! when a maximum matching shows the rest of the field still pairs.
//!
//! On an odd field the bye goes to the lowest-ranked player for whom the
//! remaining field still pairs, preferring players without an earlier bye.

use tracing::{debug, warn};

use super::colors::assign_colors;
use super::matching::perfect_matching;
use super::{PairingError, PairingHistory, PairingOptions, PairingStrategy, RankedPlayer, RoundPlan};

/// The Swiss pairing strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwissPairing;

impl PairingStrategy for SwissPairing {
    fn name(&self) -> &'static str {
        "swiss"
    }

    fn pair(
        &self,
        ranked: &[RankedPlayer],
        history: &PairingHistory,
        options: &PairingOptions,
    ) -> Result<RoundPlan, PairingError> {
        pair_swiss(ranked, history, options)
    }
}

/// Pair `ranked` (standings order) without rematches.
pub fn pair_swiss(
    ranked: &[RankedPlayer],
    history: &PairingHistory,
    options: &PairingOptions,
) -> Result<RoundPlan, PairingError> {
    if ranked.len() < 2 {
        return Err(PairingError::Impossible(format!(
            "need at least 2 players, have {}",
            ranked.len()
        )));
    }

    let mut search = Search {
        ranked,
        history,
        steps: 0,
        budget: options.max_search_steps,
    };
    let pool: Vec<usize> = (0..ranked.len()).collect();

    let (bye, pairs) = if pool.len() % 2 == 1 {
        match search.with_bye(&pool) {
            Some((bye, pairs)) => (Some(bye), pairs),
            None => {
                return Err(PairingError::Impossible(format!(
                    "no bye leaves a rematch-free pairing of {} players",
                    ranked.len()
                )))
            }
        }
    } else {
        match search.solve(&pool) {
            Some(pairs) => (None, pairs),
            None => {
                return Err(PairingError::Impossible(format!(
                    "every pairing of {} players repeats an earlier game",
                    ranked.len()
                )))
            }
        }
    };

    debug!(
        "Swiss search paired {} boards in {} steps",
        pairs.len(),
        search.steps
    );

    let pairs: Vec<(&RankedPlayer, &RankedPlayer)> = pairs
        .into_iter()
        .map(|(hi, lo)| (&ranked[hi], &ranked[lo]))
        .collect();

    Ok(RoundPlan {
        pairings: assign_colors(&pairs, history),
        bye: bye.map(|i| ranked[i].id.clone()),
    })
}

struct Search<'a> {
    ranked: &'a [RankedPlayer],
    history: &'a PairingHistory,
    steps: u64,
    budget: u64,
}

type Pairs = Vec<(usize, usize)>;

impl Search<'_> {
    /// Try bye candidates from the bottom of the table upward.
    fn with_bye(&mut self, pool: &[usize]) -> Option<(usize, Pairs)> {
        let mut candidates: Vec<usize> = pool.iter().rev().copied().collect();
        // Stable: players without a bye first, each half still bottom-up
        candidates.sort_by_key(|&i| self.history.byes_received(&self.ranked[i].id) > 0);

        for candidate in candidates {
            let rest: Vec<usize> = pool.iter().copied().filter(|&i| i != candidate).collect();
            if let Some(pairs) = self.solve(&rest) {
                return Some((candidate, pairs));
            }
            debug!(
                "Bye for {} leaves no valid pairing, trying next candidate",
                self.ranked[candidate].id
            );
        }
        None
    }

    /// Perfectly match `pool` (indices in standings order), or `None` when
    /// no rematch-free matching exists.
    ///
    /// Prefers the fold-order pairing; once the step budget is spent it
    /// settles for any rematch-free matching.
    fn solve(&mut self, pool: &[usize]) -> Option<Pairs> {
        let fallback = self.feasible(pool)?;
        match self.descend(pool) {
            Some(pairs) => Some(pairs),
            None => {
                warn!(
                    "Swiss search budget of {} steps exhausted, using an unordered matching",
                    self.budget
                );
                Some(fallback)
            }
        }
    }

    /// Fold-order search over a pool that is known to be matchable. Every
    /// branch taken keeps the remainder matchable, so this only fails when
    /// the budget runs out.
    fn descend(&mut self, pool: &[usize]) -> Option<Pairs> {
        let Some((&top, rest)) = pool.split_first() else {
            return Some(Vec::new());
        };

        for candidate in self.candidates(top, rest) {
            if self.played(top, candidate) {
                continue;
            }
            self.steps += 1;
            if self.steps > self.budget {
                return None;
            }
            let remaining: Vec<usize> = rest.iter().copied().filter(|&i| i != candidate).collect();
            if self.feasible(&remaining).is_none() {
                continue;
            }
            let mut pairs = self.descend(&remaining)?;
            pairs.insert(0, (top, candidate));
            return Some(pairs);
        }
        None
    }

    fn feasible(&self, pool: &[usize]) -> Option<Pairs> {
        perfect_matching(pool, |a, b| !self.played(a, b))
    }

    /// Opponents for `top` in preference order.
    fn candidates(&self, top: usize, rest: &[usize]) -> Vec<usize> {
        let score = self.ranked[top].points;
        let group_len = rest
            .iter()
            .take_while(|&&i| self.ranked[i].points == score)
            .count();
        let (group, lower) = rest.split_at(group_len);

        // Score group including `top` is odd: its lowest player floats down
        let (foldable, floater) = if (group.len() + 1) % 2 == 1 && !group.is_empty() {
            (&group[..group.len() - 1], group.last())
        } else {
            (group, None)
        };

        let mut order = Vec::with_capacity(rest.len());
        if !foldable.is_empty() {
            let fold = (foldable.len() + 1) / 2 - 1;
            order.extend(foldable[fold..].iter().copied());
            order.extend(foldable[..fold].iter().rev().copied());
        }
        order.extend(floater.copied());
        order.extend(lower.iter().copied());
        order
    }

    fn played(&self, a: usize, b: usize) -> bool {
        self.history
            .has_played(&self.ranked[a].id, &self.ranked[b].id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Game, PlayerId, TournamentId};
    use std::collections::HashSet;

    fn field(entries: &[(&str, f64)]) -> Vec<RankedPlayer> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (id, pts))| RankedPlayer::new(PlayerId::from(*id), 2000 - i as u32 * 10, *pts))
            .collect()
    }

    fn played(pairs: &[(&str, &str)]) -> PairingHistory {
        let games: Vec<Game> = pairs
            .iter()
            .enumerate()
            .map(|(i, (a, b))| {
                Game::new(
                    TournamentId::from("t"),
                    1,
                    i as u32 + 1,
                    PlayerId::from(*a),
                    PlayerId::from(*b),
                )
            })
            .collect();
        PairingHistory::from_games(&games)
    }

    fn matchups(plan: &RoundPlan) -> HashSet<(String, String)> {
        plan.pairings
            .iter()
            .map(|p| {
                let (a, b) = (p.white.to_string(), p.black.to_string());
                if a < b {
                    (a, b)
                } else {
                    (b, a)
                }
            })
            .collect()
    }

    fn pair_set(pairs: &[(&str, &str)]) -> HashSet<(String, String)> {
        pairs
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn test_fold_pairing_first_round() {
        let ranked = field(&[("a", 0.0), ("b", 0.0), ("c", 0.0), ("d", 0.0)]);
        let plan = pair_swiss(&ranked, &PairingHistory::new(), &PairingOptions::default()).unwrap();
        assert_eq!(matchups(&plan), pair_set(&[("a", "c"), ("b", "d")]));
        assert!(plan.bye.is_none());
    }

    #[test]
    fn test_fold_pairing_eight_players() {
        let ids = ["p1", "p2", "p3", "p4", "p5", "p6", "p7", "p8"];
        let entries: Vec<(&str, f64)> = ids.iter().map(|id| (*id, 0.0)).collect();
        let plan =
            pair_swiss(&field(&entries), &PairingHistory::new(), &PairingOptions::default()).unwrap();
        assert_eq!(
            matchups(&plan),
            pair_set(&[("p1", "p5"), ("p2", "p6"), ("p3", "p7"), ("p4", "p8")])
        );
    }

    #[test]
    fn test_second_round_avoids_rematches() {
        // After A beat C and B drew D
        let ranked = field(&[("a", 1.0), ("b", 0.5), ("d", 0.5), ("c", 0.0)]);
        let history = played(&[("a", "c"), ("b", "d")]);
        let plan = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap();
        assert_eq!(matchups(&plan), pair_set(&[("a", "b"), ("c", "d")]));
    }

    #[test]
    fn test_blocked_fold_partner_takes_next_candidate() {
        // a's fold partner c is a rematch; a should take d, leaving b-c
        let ranked = field(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 1.0)]);
        let history = played(&[("a", "c")]);
        let plan = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap();
        assert_eq!(matchups(&plan), pair_set(&[("a", "d"), ("b", "c")]));
    }

    #[test]
    fn test_backtracks_when_greedy_choice_strands_a_player() {
        // Greedy a-c would leave b-d, already played; a-b would leave c-d, also played.
        let ranked = field(&[("a", 0.0), ("b", 0.0), ("c", 0.0), ("d", 0.0)]);
        let history = played(&[("b", "d"), ("c", "d")]);
        let plan = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap();
        assert_eq!(matchups(&plan), pair_set(&[("a", "d"), ("b", "c")]));
    }

    #[test]
    fn test_odd_group_floats_lowest_player_down() {
        let ranked = field(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 0.0), ("e", 0.0), ("f", 0.0)]);
        let plan = pair_swiss(&ranked, &PairingHistory::new(), &PairingOptions::default()).unwrap();
        // a-b inside the top group, c floats to meet d, e-f
        assert_eq!(matchups(&plan), pair_set(&[("a", "b"), ("c", "d"), ("e", "f")]));
    }

    #[test]
    fn test_five_players_bye_goes_to_lowest() {
        let ranked = field(&[("a", 0.0), ("b", 0.0), ("c", 0.0), ("d", 0.0), ("e", 0.0)]);
        let plan = pair_swiss(&ranked, &PairingHistory::new(), &PairingOptions::default()).unwrap();
        assert_eq!(plan.bye, Some(PlayerId::from("e")));
        assert_eq!(matchups(&plan), pair_set(&[("a", "c"), ("b", "d")]));
    }

    #[test]
    fn test_bye_skips_players_who_already_had_one() {
        let ranked = field(&[("a", 1.0), ("b", 1.0), ("e", 1.0), ("c", 0.0), ("d", 0.0)]);
        let mut history = played(&[("a", "c"), ("b", "d")]);
        history.record(&Game::bye(TournamentId::from("t"), 1, 3, PlayerId::from("e")));
        let plan = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap();
        assert_eq!(plan.bye, Some(PlayerId::from("d")));
    }

    #[test]
    fn test_bye_moves_up_when_lowest_would_strand_the_rest() {
        // If e sits out, a-b-c-d has no rematch-free pairing
        let ranked = field(&[("a", 0.0), ("b", 0.0), ("c", 0.0), ("d", 0.0), ("e", 0.0)]);
        let history = played(&[("a", "b"), ("a", "c"), ("a", "d")]);
        let plan = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap();
        assert_ne!(plan.bye, Some(PlayerId::from("e")));
        assert!(matchups(&plan).contains(&("a".to_string(), "e".to_string())));
    }

    #[test]
    fn test_impossible_when_everyone_has_met() {
        let ranked = field(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 0.0)]);
        let history = played(&[
            ("a", "b"),
            ("a", "c"),
            ("a", "d"),
            ("b", "c"),
            ("b", "d"),
            ("c", "d"),
        ]);
        let err = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap_err();
        assert!(matches!(err, PairingError::Impossible(_)));
    }

    #[test]
    fn test_exhausted_budget_settles_for_any_valid_matching() {
        let ranked = field(&[("a", 0.0), ("b", 0.0), ("c", 0.0), ("d", 0.0)]);
        let history = played(&[("a", "b")]);
        let options = PairingOptions { max_search_steps: 1 };
        let plan = pair_swiss(&ranked, &history, &options).unwrap();
        assert_eq!(plan.pairings.len(), 2);
        assert!(crate::pairing::validate_plan(&ranked, &history, &plan).is_ok());
    }

    #[test]
    fn test_large_field_with_cornered_trio_still_pairs() {
        // p15, p16 and p17 have met everyone except each other and p00, so
        // p00 must take one of them and the other two meet.
        for size in [18usize, 20] {
            let ids: Vec<String> = (0..size).map(|i| format!("p{:02}", i)).collect();
            let entries: Vec<(&str, f64)> = ids.iter().map(|id| (id.as_str(), 0.0)).collect();
            let ranked = field(&entries);

            let trio = ["p15", "p16", "p17"];
            let mut met = Vec::new();
            for t in trio {
                for other in &ids {
                    if other != "p00" && !trio.contains(&other.as_str()) {
                        met.push((t, other.as_str()));
                    }
                }
            }
            let history = played(&met);

            let plan = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap();
            assert!(crate::pairing::validate_plan(&ranked, &history, &plan).is_ok());
            let pairs = matchups(&plan);
            assert!(trio.iter().any(|t| pairs.contains(&("p00".to_string(), t.to_string()))));
        }
    }

    #[test]
    fn test_too_few_players() {
        let ranked = field(&[("a", 0.0)]);
        let err = pair_swiss(&ranked, &PairingHistory::new(), &PairingOptions::default()).unwrap_err();
        assert!(matches!(err, PairingError::Impossible(_)));
    }

    #[test]
    fn test_two_players_who_already_met() {
        let ranked = field(&[("a", 1.0), ("b", 0.0)]);
        let history = played(&[("a", "b")]);
        assert!(pair_swiss(&ranked, &history, &PairingOptions::default()).is_err());
    }

    #[test]
    fn test_plan_passes_validation() {
        let ids = ["a", "b", "c", "d", "e", "f", "g"];
        let entries: Vec<(&str, f64)> = ids.iter().map(|id| (*id, 0.0)).collect();
        let ranked = field(&entries);
        let history = played(&[("a", "e"), ("b", "f"), ("c", "g")]);
        let plan = pair_swiss(&ranked, &history, &PairingOptions::default()).unwrap();
        assert!(crate::pairing::validate_plan(&ranked, &history, &plan).is_ok());
        assert_eq!(plan.pairings.len(), 3);
        assert!(plan.bye.is_some());
    }
}
