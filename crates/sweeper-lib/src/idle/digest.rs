//! Streaming percentile estimation
//!
//! A merging t-digest: samples are buffered, then periodically folded into
//! a sorted list of weighted centroids whose sizes are bounded by the k1
//! scale function. Memory stays proportional to the compression factor no
//! matter how many samples are added.

use std::cmp::Ordering;
use std::f64::consts::PI;

/// Compression used by the idle detector
pub const DEFAULT_COMPRESSION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Centroid {
    mean: f64,
    weight: f64,
}

impl Centroid {
    fn absorb(&mut self, other: &Centroid) {
        let weight = self.weight + other.weight;
        self.mean += (other.mean - self.mean) * other.weight / weight;
        self.weight = weight;
    }
}

/// Mergeable rank-estimation summary
#[derive(Debug, Clone)]
pub struct TDigest {
    compression: f64,
    centroids: Vec<Centroid>,
    buffer: Vec<Centroid>,
    buffer_limit: usize,
    total_weight: f64,
    min: f64,
    max: f64,
}

impl Default for TDigest {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION)
    }
}

impl TDigest {
    pub fn new(compression: f64) -> Self {
        let compression = compression.max(10.0);
        Self {
            compression,
            centroids: Vec::new(),
            buffer: Vec::new(),
            buffer_limit: (compression * 5.0) as usize,
            total_weight: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Add one sample; non-finite values are ignored
    pub fn add(&mut self, value: f64) {
        self.add_weighted(value, 1.0);
    }

    pub fn add_weighted(&mut self, value: f64, weight: f64) {
        if !value.is_finite() || !(weight > 0.0) {
            return;
        }
        self.buffer.push(Centroid {
            mean: value,
            weight,
        });
        self.total_weight += weight;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if self.buffer.len() >= self.buffer_limit {
            self.compress();
        }
    }

    /// Fold another digest into this one
    pub fn merge(&mut self, other: &TDigest) {
        if other.is_empty() {
            return;
        }
        self.buffer.extend(other.centroids.iter().copied());
        self.buffer.extend(other.buffer.iter().copied());
        self.total_weight += other.total_weight;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.compress();
    }

    pub fn count(&self) -> f64 {
        self.total_weight
    }

    pub fn is_empty(&self) -> bool {
        self.total_weight == 0.0
    }

    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    /// Number of centroids after compression
    pub fn centroid_count(&mut self) -> usize {
        self.compress();
        self.centroids.len()
    }

    /// Estimate the value at quantile `q` in `[0, 1]`
    ///
    /// Returns `None` when no samples were added.
    pub fn quantile(&mut self, q: f64) -> Option<f64> {
        if self.is_empty() || q.is_nan() {
            return None;
        }
        self.compress();
        Some(self.interpolate(q.clamp(0.0, 1.0)))
    }

    fn interpolate(&self, q: f64) -> f64 {
        let centroids = &self.centroids;
        let n = self.total_weight;

        if centroids.len() == 1 {
            return centroids[0].mean;
        }

        let index = q * n;
        if index < 1.0 {
            return self.min;
        }
        if index > n - 1.0 {
            return self.max;
        }

        let first = centroids[0];
        if first.weight > 2.0 && index < first.weight / 2.0 {
            return self.min + (index - 1.0) / (first.weight / 2.0 - 1.0) * (first.mean - self.min);
        }

        let last = centroids[centroids.len() - 1];
        if last.weight > 2.0 && n - index <= last.weight / 2.0 {
            return self.max - (n - index - 1.0) / (last.weight / 2.0 - 1.0) * (self.max - last.mean);
        }

        let mut cumulative = first.weight / 2.0;
        for pair in centroids.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            let step = (left.weight + right.weight) / 2.0;
            if cumulative + step > index {
                let fraction = (index - cumulative) / step;
                return left.mean + fraction * (right.mean - left.mean);
            }
            cumulative += step;
        }

        last.mean
    }

    fn compress(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let mut incoming = std::mem::take(&mut self.centroids);
        incoming.append(&mut self.buffer);
        incoming.sort_by(|a, b| a.mean.partial_cmp(&b.mean).unwrap_or(Ordering::Equal));

        let total = self.total_weight;
        let mut merged = Vec::with_capacity(incoming.len().min(self.compression as usize * 2));
        let mut iter = incoming.into_iter();
        let Some(mut current) = iter.next() else {
            return;
        };

        let mut weight_before = 0.0;
        let mut limit = total * self.k_inverse(self.k(0.0) + 1.0);

        for next in iter {
            if weight_before + current.weight + next.weight <= limit {
                current.absorb(&next);
            } else {
                weight_before += current.weight;
                merged.push(current);
                limit = total * self.k_inverse(self.k(weight_before / total) + 1.0);
                current = next;
            }
        }
        merged.push(current);

        self.centroids = merged;
    }

    /// k1 scale function
    fn k(&self, q: f64) -> f64 {
        self.compression / (2.0 * PI) * (2.0 * q - 1.0).asin()
    }

    fn k_inverse(&self, k: f64) -> f64 {
        let angle = k * 2.0 * PI / self.compression;
        if angle >= PI / 2.0 {
            return 1.0;
        }
        (angle.sin() + 1.0) / 2.0
    }
}
