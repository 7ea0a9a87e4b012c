//! Round tier planning.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::{ManualOrderingItem, RoundTypesConfig, TierSelectionMode};
use crate::types::RoundTier;

/// Tier used whenever the configuration yields nothing to pick from.
const FALLBACK_TIER: RoundTier = RoundTier::FullBuy;

/// Picks the tier of each successive round.
///
/// - `Random`: independent weighted draw per round
/// - `RandomFixedCounts`: draws without replacement from a deck holding the
///   configured count of each tier; a new deck is shuffled when it runs out
/// - `ManualOrdering`: plays the configured (tier, count) runs in order and
///   starts over after the last one
#[derive(Debug, Clone)]
pub struct RoundTierPlanner {
    config: RoundTypesConfig,
    deck: Vec<RoundTier>,
    /// Position in the manual ordering and rounds already played in that run
    manual_cursor: (usize, u32),
}

impl RoundTierPlanner {
    pub fn new(config: RoundTypesConfig) -> Self {
        Self {
            config,
            deck: Vec::new(),
            manual_cursor: (0, 0),
        }
    }

    pub fn mode(&self) -> TierSelectionMode {
        self.config.selection
    }

    /// Starts the sequence over, e.g. on a map change.
    pub fn reset(&mut self) {
        self.deck.clear();
        self.manual_cursor = (0, 0);
    }

    pub fn next_tier<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RoundTier {
        match self.config.selection {
            TierSelectionMode::Random => self.next_weighted(rng),
            TierSelectionMode::RandomFixedCounts => self.next_from_deck(rng),
            TierSelectionMode::ManualOrdering => self.next_manual(),
        }
    }

    fn next_weighted<R: Rng + ?Sized>(&self, rng: &mut R) -> RoundTier {
        let weights: Vec<u32> = RoundTier::ALL
            .iter()
            .map(|tier| self.config.percentages.get(tier).copied().unwrap_or(0))
            .collect();

        match WeightedIndex::new(&weights) {
            Ok(dist) => RoundTier::ALL[dist.sample(rng)],
            Err(_) => FALLBACK_TIER,
        }
    }

    fn next_from_deck<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RoundTier {
        if self.deck.is_empty() {
            for tier in RoundTier::ALL {
                let count = self.config.random_fixed_counts.get(&tier).copied().unwrap_or(0);
                self.deck.extend(std::iter::repeat(tier).take(count as usize));
            }
            self.deck.shuffle(rng);
        }

        self.deck.pop().unwrap_or(FALLBACK_TIER)
    }

    fn next_manual(&mut self) -> RoundTier {
        let ordering: &[ManualOrderingItem] = &self.config.manual_ordering;
        if ordering.iter().all(|item| item.count == 0) {
            return FALLBACK_TIER;
        }

        let (mut index, mut played) = self.manual_cursor;
        loop {
            index %= ordering.len();
            let item = ordering[index];
            if played < item.count {
                self.manual_cursor = (index, played + 1);
                return item.tier;
            }
            index += 1;
            played = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn planner(selection: TierSelectionMode) -> RoundTierPlanner {
        RoundTierPlanner::new(RoundTypesConfig {
            selection,
            ..Default::default()
        })
    }

    #[test]
    fn test_weighted_respects_zero_weights() {
        let mut config = RoundTypesConfig::default();
        config.percentages = HashMap::from([
            (RoundTier::Pistol, 0),
            (RoundTier::HalfBuy, 0),
            (RoundTier::FullBuy, 100),
        ]);
        let mut planner = RoundTierPlanner::new(config);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(planner.next_tier(&mut rng), RoundTier::FullBuy);
        }
    }

    #[test]
    fn test_weighted_produces_every_tier() {
        let mut planner = planner(TierSelectionMode::Random);
        let mut rng = StdRng::seed_from_u64(2);
        let mut counts: HashMap<RoundTier, usize> = HashMap::new();
        for _ in 0..1000 {
            *counts.entry(planner.next_tier(&mut rng)).or_default() += 1;
        }
        assert_eq!(counts.len(), 3);
        assert!(counts[&RoundTier::FullBuy] > counts[&RoundTier::Pistol]);
    }

    #[test]
    fn test_fixed_counts_deck() {
        let mut planner = planner(TierSelectionMode::RandomFixedCounts);
        let mut rng = StdRng::seed_from_u64(3);
        let mut counts: HashMap<RoundTier, usize> = HashMap::new();
        for _ in 0..30 {
            *counts.entry(planner.next_tier(&mut rng)).or_default() += 1;
        }
        assert_eq!(counts[&RoundTier::Pistol], 5);
        assert_eq!(counts[&RoundTier::HalfBuy], 10);
        assert_eq!(counts[&RoundTier::FullBuy], 15);

        // Deck refills
        planner.next_tier(&mut rng);
        assert_eq!(planner.deck.len(), 29);
    }

    #[test]
    fn test_manual_ordering_cycles() {
        let mut config = RoundTypesConfig {
            selection: TierSelectionMode::ManualOrdering,
            ..Default::default()
        };
        config.manual_ordering = vec![
            ManualOrderingItem { tier: RoundTier::Pistol, count: 2 },
            ManualOrderingItem { tier: RoundTier::HalfBuy, count: 0 },
            ManualOrderingItem { tier: RoundTier::FullBuy, count: 1 },
        ];
        let mut planner = RoundTierPlanner::new(config);
        let mut rng = StdRng::seed_from_u64(4);

        let tiers: Vec<RoundTier> = (0..6).map(|_| planner.next_tier(&mut rng)).collect();
        assert_eq!(
            tiers,
            vec![
                RoundTier::Pistol,
                RoundTier::Pistol,
                RoundTier::FullBuy,
                RoundTier::Pistol,
                RoundTier::Pistol,
                RoundTier::FullBuy,
            ]
        );

        planner.reset();
        assert_eq!(planner.next_tier(&mut rng), RoundTier::Pistol);
    }

    #[test]
    fn test_empty_configuration_falls_back() {
        let config = RoundTypesConfig {
            selection: TierSelectionMode::ManualOrdering,
            percentages: HashMap::new(),
            random_fixed_counts: HashMap::new(),
            manual_ordering: Vec::new(),
        };
        let mut rng = StdRng::seed_from_u64(5);
        let mut planner = RoundTierPlanner::new(config.clone());
        assert_eq!(planner.next_tier(&mut rng), RoundTier::FullBuy);

        let mut planner = RoundTierPlanner::new(RoundTypesConfig {
            selection: TierSelectionMode::RandomFixedCounts,
            ..config.clone()
        });
        assert_eq!(planner.next_tier(&mut rng), RoundTier::FullBuy);

        let mut planner = RoundTierPlanner::new(RoundTypesConfig {
            selection: TierSelectionMode::Random,
            ..config
        });
        assert_eq!(planner.next_tier(&mut rng), RoundTier::FullBuy);
    }
}
