//! Weight bounds and the weight-to-point-count interpolation.

/// Minimum and maximum weight across buckets, zero when the ring is empty.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WeightBounds {
    pub min: f64,
    pub max: f64,
}

impl WeightBounds {
    /// Extend the bounds downward/upward to cover a newly seen weight.
    pub(crate) fn extend(&mut self, weight: f64) {
        if self.min == 0.0 || weight < self.min {
            self.min = weight;
        }
        if self.max == 0.0 || weight > self.max {
            self.max = weight;
        }
    }

    /// Account for one bucket's weight changing from `prev` to `next`.
    ///
    /// If `prev` held neither bound, the bounds only need extending. If it
    /// did, the surviving extremum is unknown and the bounds are rebuilt
    /// from the live weights.
    pub(crate) fn change(&mut self, prev: f64, next: f64, live: impl Iterator<Item = f64>) {
        if prev != self.min && prev != self.max {
            self.extend(next);
            return;
        }
        self.min = 0.0;
        self.max = 0.0;
        for weight in live {
            if weight > 0.0 {
                self.extend(weight);
            }
        }
    }
}

/// The per-rebuild line mapping a bucket's weight to its point count.
///
/// Anchored at `(max, factor)` and `(min, ceil(factor * min / max))`: the
/// heaviest bucket carries the full magic factor, the lightest its
/// proportional share rounded up so it never drops to zero.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PointTarget {
    x0: f64,
    y0: f64,
    slope: f64,
    empty: bool,
}

impl PointTarget {
    pub(crate) fn new(bounds: WeightBounds, factor: usize) -> Self {
        let y0 = factor as f64;
        if bounds.max == 0.0 {
            // No live buckets; everything is being torn down.
            return Self {
                x0: 0.0,
                y0,
                slope: 0.0,
                empty: true,
            };
        }
        if bounds.min == bounds.max {
            // Equal weights: every bucket carries the full factor. Slope
            // zero makes `get` constant, and the branch keeps the 0/0 of
            // the general formula out.
            return Self {
                x0: bounds.max,
                y0,
                slope: 0.0,
                empty: false,
            };
        }
        let y1 = (y0 * (bounds.min / bounds.max)).ceil();
        let slope = (y1 - y0) / (bounds.min - bounds.max);
        debug_assert!(slope.is_finite());
        Self {
            x0: bounds.max,
            y0,
            slope,
            empty: false,
        }
    }

    /// Target point count for a bucket of the given weight, rounded half-up.
    pub(crate) fn get(&self, weight: f64) -> usize {
        if self.empty {
            return 0;
        }
        (self.slope * (weight - self.x0) + self.y0 + 0.5) as usize
    }
}
