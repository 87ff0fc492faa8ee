//! Metric algebras for soft-decision decoding
//!
//! Trellis decoders combine log-domain probabilities with a [`LogSum`], and belief propagation
//! combines LLRs at check nodes with a [`BoxSum`]. Each family has three variants selected by
//! [`DecoderAlgorithm`](crate::DecoderAlgorithm): exact, linearly corrected through a
//! [`LinearTable`], and the max/min approximation.
//!
//! A multi-way reduction over values `x_1, ..., x_n` is written once for all variants as
//! `post(sum(... sum(prior(x_1), prior(x_2)) ..., prior(x_n)))`, starting from the identity
//! element of `sum`.

/// Stand-in for infinity in the log domain (finite, so that differences never produce NaN)
pub(crate) const INF: f64 = 1e100;

/// Largest magnitude of a tanh-domain message in exact box-sum
const MAX_TANH: f64 = 1.0 - 1e-12;

/// Piecewise-linear approximation of `ln(1 + exp(-x))` for `x >= 0`
#[derive(Clone, PartialEq, Debug)]
pub struct LinearTable {
    /// Number of table entries per unit of `x`
    granularity: f64,
    /// Function values at `x = i / granularity`
    values: Vec<f64>,
}

impl Default for LinearTable {
    fn default() -> Self {
        Self::new(2.0, 8)
    }
}

impl LinearTable {
    /// Returns table of `length` samples spaced `1 / granularity` apart.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(granularity: f64, length: usize) -> Self {
        Self {
            granularity,
            values: (0 .. length.max(2))
                .map(|i| (-(i as f64) / granularity).exp().ln_1p())
                .collect(),
        }
    }

    /// Returns approximation of `ln(1 + exp(-x))` for `x >= 0` (zero beyond the table).
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn log1pexpm(&self, x: f64) -> f64 {
        let x = x * self.granularity;
        if x >= (self.values.len() - 1) as f64 {
            return 0.0;
        }
        let index = x as usize;
        let frac = x - index as f64;
        self.values[index] + (self.values[index + 1] - self.values[index]) * frac
    }
}

/// Combination of log-domain metrics (log of a sum of exponentials)
pub trait LogSum: Default + std::fmt::Debug {
    /// Maps a metric into the accumulation domain, relative to a reference metric that is at least
    /// as large as every metric in the same reduction.
    fn prior(&self, x: f64, reference: f64) -> f64;

    /// Combines two values in the accumulation domain.
    fn sum(&self, a: f64, b: f64) -> f64;

    /// Maps an accumulated value back to a log-domain metric.
    fn post(&self, x: f64, reference: f64) -> f64;

    /// Returns the identity element of `sum`.
    fn zero(&self) -> f64;

    /// Returns `ln(exp(a) + exp(b))` under this algebra.
    fn log_sum(&self, a: f64, b: f64) -> f64 {
        let reference = a.max(b);
        self.post(
            self.sum(self.prior(a, reference), self.prior(b, reference)),
            reference,
        )
    }
}

/// Exact log-sum-exp, accumulated as exponentials relative to the reference
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct ExactLogSum;

impl LogSum for ExactLogSum {
    fn prior(&self, x: f64, reference: f64) -> f64 {
        (x - reference).exp()
    }

    fn sum(&self, a: f64, b: f64) -> f64 {
        a + b
    }

    fn post(&self, x: f64, reference: f64) -> f64 {
        if x > 0.0 {
            x.ln() + reference
        } else {
            -INF
        }
    }

    fn zero(&self) -> f64 {
        0.0
    }
}

/// Log-sum-exp with the correction term read from a [`LinearTable`]
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LinearLogSum {
    table: LinearTable,
}

impl LogSum for LinearLogSum {
    fn prior(&self, x: f64, _reference: f64) -> f64 {
        x
    }

    fn sum(&self, a: f64, b: f64) -> f64 {
        a.max(b) + self.table.log1pexpm((a - b).abs())
    }

    fn post(&self, x: f64, _reference: f64) -> f64 {
        x
    }

    fn zero(&self) -> f64 {
        -INF
    }
}

/// Max-log approximation
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct ApproximateLogSum;

impl LogSum for ApproximateLogSum {
    fn prior(&self, x: f64, _reference: f64) -> f64 {
        x
    }

    fn sum(&self, a: f64, b: f64) -> f64 {
        a.max(b)
    }

    fn post(&self, x: f64, _reference: f64) -> f64 {
        x
    }

    fn zero(&self) -> f64 {
        -INF
    }
}

/// Combination of LLRs at a parity-check node (LLR of the XOR of independent bits)
pub trait BoxSum: Default + std::fmt::Debug {
    /// Maps an LLR into the accumulation domain.
    fn prior(&self, x: f64) -> f64;

    /// Combines two values in the accumulation domain.
    fn sum(&self, a: f64, b: f64) -> f64;

    /// Maps an accumulated value back to an LLR.
    fn post(&self, x: f64) -> f64;

    /// Returns the identity element of `sum` (a bit known to be `Zero`).
    fn one(&self) -> f64;

    /// Returns LLR of the XOR of two bits with given LLRs.
    fn box_sum(&self, a: f64, b: f64) -> f64 {
        self.post(self.sum(self.prior(a), self.prior(b)))
    }
}

/// Exact box-plus as a product in the tanh domain
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct ExactBoxSum;

impl BoxSum for ExactBoxSum {
    fn prior(&self, x: f64) -> f64 {
        (-x / 2.0).tanh()
    }

    fn sum(&self, a: f64, b: f64) -> f64 {
        a * b
    }

    fn post(&self, x: f64) -> f64 {
        let x = x.clamp(-MAX_TANH, MAX_TANH);
        -((1.0 + x) / (1.0 - x)).ln()
    }

    fn one(&self) -> f64 {
        1.0
    }
}

/// Min-sum with both correction terms read from a [`LinearTable`]
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LinearBoxSum {
    table: LinearTable,
}

impl BoxSum for LinearBoxSum {
    fn prior(&self, x: f64) -> f64 {
        x
    }

    fn sum(&self, a: f64, b: f64) -> f64 {
        min_sum(a, b) - self.table.log1pexpm((a + b).abs())
            + self.table.log1pexpm((a - b).abs())
    }

    fn post(&self, x: f64) -> f64 {
        x
    }

    fn one(&self) -> f64 {
        -INF
    }
}

/// Min-sum approximation
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct ApproximateBoxSum;

impl BoxSum for ApproximateBoxSum {
    fn prior(&self, x: f64) -> f64 {
        x
    }

    fn sum(&self, a: f64, b: f64) -> f64 {
        min_sum(a, b)
    }

    fn post(&self, x: f64) -> f64 {
        x
    }

    fn one(&self) -> f64 {
        -INF
    }
}

/// Returns log-domain metric of a symbol relative to the all-zero symbol, given the LLRs of its
/// bits (sum of the LLRs of the set bits).
pub(crate) fn correlation(symbol: usize, llr: &[f64]) -> f64 {
    llr.iter()
        .enumerate()
        .filter(|&(k, _)| (symbol >> k) & 1 == 1)
        .map(|(_, &x)| x)
        .sum()
}

/// Returns `min(|a|, |b|)` if the signs differ, and `-min(|a|, |b|)` otherwise.
fn min_sum(a: f64, b: f64) -> f64 {
    -a.signum() * b.signum() * a.abs().min(b.abs())
}
