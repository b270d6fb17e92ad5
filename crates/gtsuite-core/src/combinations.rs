//! Exhaustive option-subset enumeration.
//!
//! Every fragment is one digit of an odometer. Digit 0 (the first fragment)
//! turns fastest; enumeration runs from the all-low state to the all-high
//! state and skips the all-low state itself, so `n` present/absent fragments
//! yield exactly `2^n - 1` combinations numbered `1..2^n` in that order.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One self-contained CLI option unit, e.g. `-minlenltr 100`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionFragment(String);

impl OptionFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OptionFragment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OptionFragment {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// A selector state with one digit per fragment. For present/absent
/// fragments a digit is 0 (absent) or 1 (present).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Combination {
    digits: Vec<u32>,
}

impl Combination {
    pub fn selected_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.digits
            .iter()
            .enumerate()
            .filter(|(_, digit)| **digit != 0)
            .map(|(index, _)| index)
    }

    /// Concatenates, in fragment order, every selected fragment.
    pub fn render(&self, fragments: &[OptionFragment]) -> String {
        self.selected_indices()
            .filter_map(|index| fragments.get(index))
            .map(OptionFragment::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Mixed-radix counter. Position 0 is the least-significant digit.
#[derive(Debug, Clone)]
pub struct Odometer {
    radices: Vec<u32>,
    digits: Vec<u32>,
    exhausted: bool,
}

impl Odometer {
    /// Radices of 0 are treated as 1 (a wheel with a single position).
    pub fn new(radices: impl Into<Vec<u32>>) -> Self {
        let radices: Vec<u32> = radices
            .into()
            .into_iter()
            .map(|radix| radix.max(1))
            .collect();
        let digits = vec![0; radices.len()];
        Self {
            radices,
            digits,
            exhausted: false,
        }
    }

    pub fn binary(width: usize) -> Self {
        Self::new(vec![2; width])
    }

    /// Turns the wheels by one. Returns `false` once the most-significant
    /// wheel overflows, leaving every digit back at zero.
    fn advance(&mut self) -> bool {
        for (digit, radix) in self.digits.iter_mut().zip(&self.radices) {
            *digit += 1;
            if *digit < *radix {
                return true;
            }
            *digit = 0;
        }
        false
    }
}

impl Iterator for Odometer {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        if self.advance() {
            Some(self.digits.clone())
        } else {
            self.exhausted = true;
            None
        }
    }
}

/// Lazy stream of every non-empty fragment subset, in odometer order.
#[derive(Debug, Clone)]
pub struct Combinations {
    odometer: Odometer,
}

impl Iterator for Combinations {
    type Item = Combination;

    fn next(&mut self) -> Option<Self::Item> {
        self.odometer.next().map(|digits| Combination { digits })
    }
}

pub fn combinations(fragments: &[OptionFragment]) -> Combinations {
    Combinations {
        odometer: Odometer::binary(fragments.len()),
    }
}

/// Rendered option strings for every combination, in generation order.
pub fn rendered_combinations(fragments: &[OptionFragment]) -> Vec<String> {
    combinations(fragments)
        .map(|combination| combination.render(fragments))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Odometer, OptionFragment, combinations, rendered_combinations};
    use std::collections::BTreeSet;

    fn fragments(texts: &[&str]) -> Vec<OptionFragment> {
        texts.iter().copied().map(OptionFragment::from).collect()
    }

    #[test]
    fn single_fragment_yields_itself() {
        let list = fragments(&["-seed 100"]);
        assert_eq!(rendered_combinations(&list), vec!["-seed 100".to_string()]);
    }

    #[test]
    fn two_fragments_follow_odometer_order() {
        let list = fragments(&["A", "B"]);
        assert_eq!(rendered_combinations(&list), vec!["A", "B", "A B"]);
    }

    #[test]
    fn empty_fragment_list_yields_nothing() {
        assert_eq!(combinations(&[]).count(), 0);
    }

    #[test]
    fn every_non_empty_subset_appears_exactly_once() {
        for width in 1..=8 {
            let texts = (0..width).map(|i| format!("-opt{}", i)).collect::<Vec<_>>();
            let list = texts
                .iter()
                .map(|text| OptionFragment::new(text.clone()))
                .collect::<Vec<_>>();

            let subsets = combinations(&list)
                .map(|combination| combination.selected_indices().collect::<Vec<_>>())
                .collect::<Vec<_>>();

            assert_eq!(subsets.len(), (1usize << width) - 1);
            assert!(subsets.iter().all(|subset| !subset.is_empty()));
            let unique = subsets.iter().cloned().collect::<BTreeSet<_>>();
            assert_eq!(unique.len(), subsets.len());
        }
    }

    #[test]
    fn first_fragment_turns_fastest() {
        let list = fragments(&["A", "B", "C"]);
        assert_eq!(
            rendered_combinations(&list),
            vec!["A", "B", "A B", "C", "A C", "B C", "A B C"]
        );
    }

    #[test]
    fn enumeration_is_reproducible() {
        let list = fragments(&["-seed 100", "-minlenltr 100", "-similar 80", "-mintsd 5"]);
        assert_eq!(rendered_combinations(&list), rendered_combinations(&list));
    }

    #[test]
    fn odometer_supports_mixed_radices() {
        let states = Odometer::new(vec![3, 2]).collect::<Vec<_>>();
        assert_eq!(
            states,
            vec![
                vec![1, 0],
                vec![2, 0],
                vec![0, 1],
                vec![1, 1],
                vec![2, 1],
            ]
        );
    }
}
