use crate::error::ModelError;
use crate::model::PROB_TOLERANCE;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Norm used to compare two distributions
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceNorm {
    /// Sum of absolute differences
    L1,
    /// Largest absolute difference
    Linf,
}

impl Default for DistanceNorm {
    fn default() -> Self {
        DistanceNorm::L1
    }
}

/// A finite probability distribution over `T`.
///
/// Invariants:
/// - Every stored probability is strictly positive, zero entries are dropped
/// - Probabilities sum to 1 (within tolerance, they are renormalised on construction)
/// - Entries are sorted by key and keys are unique
#[derive(Clone, PartialEq, Serialize)]
pub struct Distribution<T> {
    entries: Vec<(T, f64)>,
}

impl<T: Ord + Clone> Distribution<T> {
    /// Validates and builds a distribution. Repeated keys are merged.
    ///
    /// # Errors
    ///
    /// - `EmptyDistribution` if there are no entries with positive mass
    /// - `InvalidProbability` for negative or non finite probabilities
    /// - `NotNormalized` if the probabilities don't sum to 1 (within tolerance)
    pub fn new<I>(entries: I) -> Result<Distribution<T>, ModelError>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let mut entries: Vec<(T, f64)> = entries.into_iter().collect();
        if let Some((_, p)) = entries.iter().find(|(_, p)| !p.is_finite() || *p < -PROB_TOLERANCE) {
            return Err(ModelError::InvalidProbability { probability: *p });
        }
        let sum: f64 = entries.iter().map(|(_, p)| p.max(0.)).sum();
        if entries.is_empty() || sum == 0. {
            return Err(ModelError::EmptyDistribution);
        }
        if (sum - 1.).abs() > PROB_TOLERANCE {
            return Err(ModelError::NotNormalized { sum });
        }
        for (_, p) in entries.iter_mut() {
            *p = p.max(0.) / sum;
        }
        Ok(Distribution { entries: Distribution::canonical(&mut entries) })
    }

    /// Normalises non-negative weights into a distribution
    pub fn from_weights<I>(weights: I) -> Result<Distribution<T>, ModelError>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let weights: Vec<(T, f64)> = weights.into_iter().collect();
        if let Some((_, w)) = weights.iter().find(|(_, w)| !w.is_finite() || *w < 0.) {
            return Err(ModelError::InvalidProbability { probability: *w });
        }
        let sum: f64 = weights.iter().map(|(_, w)| *w).sum();
        if sum <= 0. {
            return Err(ModelError::EmptyDistribution);
        }
        let mut entries: Vec<(T, f64)> = weights.into_iter().map(|(t, w)| (t, w / sum)).collect();
        Ok(Distribution { entries: Distribution::canonical(&mut entries) })
    }

    /// Point mass
    pub fn single(t: T) -> Distribution<T> {
        Distribution { entries: vec![(t, 1.)] }
    }

    pub fn uniform<I>(support: I) -> Result<Distribution<T>, ModelError>
    where
        I: IntoIterator<Item = T>,
    {
        Distribution::from_weights(support.into_iter().map(|t| (t, 1.)))
    }

    /// Sorts, merges repeated keys and drops zero mass entries
    fn canonical(entries: &mut Vec<(T, f64)>) -> Vec<(T, f64)> {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        let mut merged: Vec<(T, f64)> = Vec::with_capacity(entries.len());
        for (t, p) in entries.drain(..) {
            match merged.last_mut() {
                Some(last) if last.0 == t => last.1 += p,
                _ => merged.push((t, p)),
            }
        }
        merged.retain(|(_, p)| *p > 0.);
        merged
    }

    pub fn probability(&self, t: &T) -> f64 {
        match self.entries.binary_search_by(|(k, _)| k.cmp(t)) {
            Ok(ix) => self.entries[ix].1,
            Err(_) => 0.,
        }
    }

    pub fn contains(&self, t: &T) -> bool {
        self.entries.binary_search_by(|(k, _)| k.cmp(t)).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, f64)> + '_ {
        self.entries.iter().map(|(t, p)| (t, *p))
    }

    pub fn support(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().map(|(t, _)| t)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, p)| *p).sum()
    }

    /// Distance between two distributions over the union of their supports
    pub fn distance(&self, other: &Distribution<T>, norm: DistanceNorm) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut diffs: Vec<f64> = Vec::with_capacity(self.entries.len() + other.entries.len());
        while i < self.entries.len() || j < other.entries.len() {
            let ord = match (self.entries.get(i), other.entries.get(j)) {
                (Some(a), Some(b)) => a.0.cmp(&b.0),
                (Some(_), None) => std::cmp::Ordering::Less,
                _ => std::cmp::Ordering::Greater,
            };
            match ord {
                std::cmp::Ordering::Less => {
                    diffs.push(self.entries[i].1);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    diffs.push(other.entries[j].1);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    diffs.push((self.entries[i].1 - other.entries[j].1).abs());
                    i += 1;
                    j += 1;
                }
            }
        }
        match norm {
            DistanceNorm::L1 => diffs.iter().sum(),
            DistanceNorm::Linf => diffs.iter().cloned().fold(0., f64::max),
        }
    }

    /// True when the two distributions are within `threshold` of each other
    pub fn close_to(&self, other: &Distribution<T>, threshold: f64, norm: DistanceNorm) -> bool {
        self.distance(other, norm) <= threshold
    }

    /// Moves the mass of `key` onto `replacement`, scaled by that mass. Returns an unchanged
    /// copy when `key` is not in the support.
    pub fn replace(&self, key: &T, replacement: &Distribution<T>) -> Distribution<T> {
        let mass = self.probability(key);
        if mass == 0. {
            return self.clone();
        }
        let mut entries: Vec<(T, f64)> = self.entries.iter()
            .filter(|(t, _)| t != key)
            .cloned()
            .collect();
        entries.extend(replacement.entries.iter().map(|(t, p)| (t.clone(), p * mass)));
        Distribution { entries: Distribution::canonical(&mut entries) }
    }

    /// Draws one outcome
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        let mut u: f64 = rng.gen::<f64>() * self.total();
        for (t, p) in self.entries.iter() {
            if u < *p {
                return t;
            }
            u -= p;
        }
        // rounding left a sliver of mass past the last entry
        &self.entries[self.entries.len() - 1].0
    }

    /// Expected value of `f` under the distribution
    pub fn expectation<F: FnMut(&T) -> f64>(&self, mut f: F) -> f64 {
        self.entries.iter().map(|(t, p)| p * f(t)).sum()
    }
}

impl<T: fmt::Debug> fmt::Debug for Distribution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(t, p)| (t, p))).finish()
    }
}
