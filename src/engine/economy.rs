use std::collections::VecDeque;

use crate::constants::{ELIXIR_CAP, HAND_SIZE, STARTER_DECK};
use crate::rng::Rng;
use crate::types::HandView;

/// One actor's elixir meter and card rotation.
///
/// The cards form a closed loop: `hand.len() + 1 + deck.len()` never
/// changes, because every played card goes back to the tail of the deck.
#[derive(Clone, Debug, PartialEq)]
pub struct Economy {
    elixir: f64,
    hand: Vec<String>,
    next: String,
    deck: VecDeque<String>,
}

impl Economy {
    pub fn deal(rng: &mut Rng, starting_elixir: f64) -> Self {
        let mut cards: Vec<String> = STARTER_DECK.iter().map(|key| key.to_string()).collect();
        rng.shuffle(&mut cards);
        let mut rest = cards.split_off(HAND_SIZE);
        let next = rest.remove(0);
        Self {
            elixir: starting_elixir.clamp(0.0, ELIXIR_CAP),
            hand: cards,
            next,
            deck: rest.into(),
        }
    }

    pub fn elixir(&self) -> f64 {
        self.elixir
    }

    pub fn hand(&self) -> &[String] {
        &self.hand
    }

    pub fn next(&self) -> &str {
        &self.next
    }

    pub fn deck_len(&self) -> usize {
        self.deck.len()
    }

    pub fn regenerate(&mut self, amount: f64) {
        if self.elixir < ELIXIR_CAP {
            self.elixir = (self.elixir + amount).min(ELIXIR_CAP);
        }
    }

    pub fn hand_slot(&self, key: &str) -> Option<usize> {
        self.hand.iter().position(|card| card == key)
    }

    /// Spends `cost` and cycles the card in `slot`. Callers check
    /// affordability and the slot first.
    pub(super) fn play(&mut self, slot: usize, cost: f64) -> String {
        self.elixir = (self.elixir - cost).max(0.0);
        let played = std::mem::replace(&mut self.hand[slot], self.next.clone());
        match self.deck.pop_front() {
            Some(drawn) => {
                self.next = drawn;
                self.deck.push_back(played.clone());
            }
            None => self.next = played.clone(),
        }
        played
    }

    pub fn view(&self) -> HandView {
        HandView {
            elixir: self.elixir,
            hand: self.hand.clone(),
            next: self.next.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_elixir(&mut self, value: f64) {
        self.elixir = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card_count(economy: &Economy) -> usize {
        economy.hand().len() + 1 + economy.deck_len()
    }

    #[test]
    fn deal_splits_starter_deck() {
        let mut rng = Rng::new(5);
        let economy = Economy::deal(&mut rng, 10.0);
        assert_eq!(economy.hand().len(), HAND_SIZE);
        assert_eq!(economy.deck_len(), STARTER_DECK.len() - HAND_SIZE - 1);
        assert_eq!(economy.elixir(), 10.0);

        let mut all: Vec<&str> = economy.hand().iter().map(String::as_str).collect();
        all.push(economy.next());
        all.extend(economy.deck.iter().map(String::as_str));
        all.sort_unstable();
        let mut expected = STARTER_DECK.to_vec();
        expected.sort_unstable();
        assert_eq!(all, expected);
    }

    #[test]
    fn regenerate_clamps_to_cap() {
        let mut economy = Economy::deal(&mut Rng::new(1), 9.9);
        economy.regenerate(0.5);
        assert_eq!(economy.elixir(), ELIXIR_CAP);
        economy.regenerate(3.0);
        assert_eq!(economy.elixir(), ELIXIR_CAP);
    }

    #[test]
    fn play_cycles_next_into_hand_and_played_to_tail() {
        let mut economy = Economy::deal(&mut Rng::new(11), 10.0);
        let played = economy.hand()[2].clone();
        let next_before = economy.next().to_string();
        let head_before = economy.deck.front().cloned().expect("deck has cards");

        economy.play(2, 3.0);

        assert_eq!(economy.elixir(), 7.0);
        assert_eq!(economy.hand()[2], next_before);
        assert_eq!(economy.next(), head_before);
        assert_eq!(economy.deck.back(), Some(&played));
    }

    #[test]
    fn card_loop_never_shrinks() {
        let mut economy = Economy::deal(&mut Rng::new(3), 10.0);
        let total = card_count(&economy);
        for round in 0..40 {
            economy.regenerate(10.0);
            economy.play(round % HAND_SIZE, 1.0);
            assert_eq!(economy.hand().len(), HAND_SIZE);
            assert_eq!(card_count(&economy), total);
        }
    }

    #[test]
    fn empty_deck_recycles_played_card_as_next() {
        let mut economy = Economy::deal(&mut Rng::new(3), 10.0);
        economy.deck.clear();
        let played = economy.hand()[0].clone();
        economy.play(0, 0.0);
        assert_eq!(economy.next(), played);
        assert_eq!(economy.deck_len(), 0);
    }
}
