//! Enumerators of permutations, combinations, and their cartesian products.
//!
//! Enumerators hand every arrangement to a callback as a borrowed slice of a reused buffer.
//! A callback error stops the enumeration and is returned, which is how cancellation leaves
//! deep search loops.

use crate::error::Result;
use crate::graph::grouping::factorial;

/// A finite sequence of equally wide arrangements.
pub trait Arrangements<T> {
    /// Length of every arrangement.
    fn width(&self) -> usize;

    /// Number of arrangements, saturating at `u64::MAX`.
    fn count(&self) -> u64;

    /// Calls `f` once per arrangement, stopping at the first error.
    fn visit(&mut self, f: &mut dyn FnMut(&[T]) -> Result<()>) -> Result<()>;
}

/// All orderings of a list, produced by Heap's algorithm; the first is the input order.
#[derive(Debug, Clone)]
pub struct Permutations<T> {
    items: Vec<T>,
    buffer: Vec<T>,
    counters: Vec<usize>,
}

impl<T: Clone> Permutations<T> {
    pub fn new(items: Vec<T>) -> Self {
        let n = items.len();
        Self {
            buffer: items.clone(),
            items,
            counters: vec![0; n],
        }
    }
}

impl<T: Clone> Arrangements<T> for Permutations<T> {
    fn width(&self) -> usize {
        self.items.len()
    }

    fn count(&self) -> u64 {
        factorial(self.items.len())
    }

    fn visit(&mut self, f: &mut dyn FnMut(&[T]) -> Result<()>) -> Result<()> {
        let n = self.items.len();
        self.buffer.clone_from(&self.items);
        self.counters.iter_mut().for_each(|c| *c = 0);

        f(&self.buffer)?;
        let mut i = 1;
        while i < n {
            if self.counters[i] < i {
                if i % 2 == 0 {
                    self.buffer.swap(0, i);
                } else {
                    self.buffer.swap(self.counters[i], i);
                }
                f(&self.buffer)?;
                self.counters[i] += 1;
                i = 1;
            } else {
                self.counters[i] = 0;
                i += 1;
            }
        }
        Ok(())
    }
}

/// All `k`-element subsets of a list in lexicographic index order.
#[derive(Debug, Clone)]
pub struct Combinations<T> {
    items: Vec<T>,
    k: usize,
    buffer: Vec<T>,
    indices: Vec<usize>,
}

impl<T: Clone> Combinations<T> {
    pub fn new(items: Vec<T>, k: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(k),
            indices: Vec::with_capacity(k),
            items,
            k,
        }
    }
}

impl<T: Clone> Arrangements<T> for Combinations<T> {
    fn width(&self) -> usize {
        self.k
    }

    fn count(&self) -> u64 {
        let n = self.items.len() as u64;
        let k = self.k as u64;
        if k > n {
            return 0;
        }
        let k = k.min(n - k);
        let mut count = 1u64;
        for i in 0..k {
            // exact at every step: count * (n - i) is divisible by (i + 1)
            count = match count.checked_mul(n - i) {
                Some(value) => value / (i + 1),
                None => return u64::MAX,
            };
        }
        count
    }

    fn visit(&mut self, f: &mut dyn FnMut(&[T]) -> Result<()>) -> Result<()> {
        let n = self.items.len();
        let k = self.k;
        if k > n {
            return Ok(());
        }
        self.indices.clear();
        self.indices.extend(0..k);

        loop {
            self.buffer.clear();
            self.buffer
                .extend(self.indices.iter().map(|&i| self.items[i].clone()));
            f(&self.buffer)?;

            let Some(pos) = (0..k).rev().find(|&i| self.indices[i] < n - k + i) else {
                return Ok(());
            };
            self.indices[pos] += 1;
            for i in pos + 1..k {
                self.indices[i] = self.indices[i - 1] + 1;
            }
        }
    }
}

/// Cartesian product of several enumerators; arrangements are concatenated in part order
/// and the last part varies fastest.
pub struct Chain<T> {
    parts: Vec<Box<dyn Arrangements<T> + Send>>,
    buffer: Vec<T>,
}

impl<T: Clone + Default> Chain<T> {
    pub fn new(parts: Vec<Box<dyn Arrangements<T> + Send>>) -> Self {
        let width = parts.iter().map(|p| p.width()).sum();
        Self {
            parts,
            buffer: vec![T::default(); width],
        }
    }

    /// Widths of the parts, in order.
    pub fn part_widths(&self) -> Vec<usize> {
        self.parts.iter().map(|p| p.width()).collect()
    }
}

impl<T: Clone + Default> Arrangements<T> for Chain<T> {
    fn width(&self) -> usize {
        self.buffer.len()
    }

    fn count(&self) -> u64 {
        self.parts
            .iter()
            .fold(1u64, |acc, p| acc.saturating_mul(p.count()))
    }

    fn visit(&mut self, f: &mut dyn FnMut(&[T]) -> Result<()>) -> Result<()> {
        visit_from(&mut self.parts, &mut self.buffer, 0, f)
    }
}

fn visit_from<T: Clone>(
    parts: &mut [Box<dyn Arrangements<T> + Send>],
    buffer: &mut [T],
    offset: usize,
    f: &mut dyn FnMut(&[T]) -> Result<()>,
) -> Result<()> {
    let Some((first, rest)) = parts.split_first_mut() else {
        return f(buffer);
    };
    let width = first.width();
    first.visit(&mut |slice: &[T]| {
        buffer[offset..offset + width].clone_from_slice(slice);
        visit_from(&mut *rest, &mut *buffer, offset + width, &mut *f)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::collections::HashSet;

    fn collect<A: Arrangements<usize>>(mut arrangements: A) -> Vec<Vec<usize>> {
        let mut seen = Vec::new();
        arrangements
            .visit(&mut |slice| {
                seen.push(slice.to_vec());
                Ok(())
            })
            .unwrap();
        seen
    }

    #[test]
    fn permutations_start_with_identity_and_are_distinct() {
        let all = collect(Permutations::new(vec![0, 1, 2, 3]));
        assert_eq!(all.len(), 24);
        assert_eq!(all[0], vec![0, 1, 2, 3]);
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn permutations_of_nothing_yield_one_empty_arrangement() {
        let all = collect(Permutations::new(Vec::new()));
        assert_eq!(all, vec![Vec::<usize>::new()]);
    }

    #[test]
    fn permutations_can_be_visited_twice() {
        let mut perms = Permutations::new(vec![5, 6, 7]);
        let mut first = 0;
        perms.visit(&mut |_| {
            first += 1;
            Ok(())
        }).unwrap();
        let again = collect(perms);
        assert_eq!(first, 6);
        assert_eq!(again.len(), 6);
        assert_eq!(again[0], vec![5, 6, 7]);
    }

    #[test]
    fn combinations_are_lexicographic() {
        let combos = Combinations::new(vec![0, 1, 2, 3, 4], 2);
        assert_eq!(combos.count(), 10);
        let all = collect(combos);
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], vec![0, 1]);
        assert_eq!(all[1], vec![0, 2]);
        assert_eq!(all[9], vec![3, 4]);
    }

    #[test]
    fn combinations_wider_than_input_are_empty() {
        let combos = Combinations::new(vec![1, 2], 3);
        assert_eq!(combos.count(), 0);
        assert!(collect(combos).is_empty());
    }

    #[test]
    fn chain_is_cartesian_product() {
        let chain = Chain::new(vec![
            Box::new(Permutations::new(vec![0usize, 1])) as Box<dyn Arrangements<usize> + Send>,
            Box::new(Permutations::new(vec![2, 3, 4])),
        ]);
        assert_eq!(chain.count(), 12);
        assert_eq!(chain.part_widths(), vec![2, 3]);

        let all = collect(chain);
        assert_eq!(all.len(), 12);
        assert_eq!(all[0], vec![0, 1, 2, 3, 4]);
        assert!(all.iter().all(|a| a[..2].iter().all(|&v| v < 2)));
        let unique: HashSet<_> = all.into_iter().collect();
        assert_eq!(unique.len(), 12);
    }

    #[test]
    fn callback_error_stops_enumeration() {
        let mut perms = Permutations::new(vec![0, 1, 2, 3]);
        let mut calls = 0;
        let result = perms.visit(&mut |_| {
            calls += 1;
            if calls == 3 { Err(Error::Cancelled) } else { Ok(()) }
        });
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(calls, 3);
    }
}
