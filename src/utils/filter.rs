use alloc::{vec, vec::Vec};

/// Smooths a stream of noisy samples.
pub trait Filter {
    fn add_entry(&mut self, sample: f64);

    fn value(&self) -> f64;
}

/// Mean of the last `size` samples.
///
/// The buffer starts full of the starting value, so the average lags
/// behind a step change by `size` samples.
///
/// ```
/// use autocore::utils::filter::{Filter, MovingAverage};
/// let mut average = MovingAverage::new(4);
/// for sample in [4.0, 8.0] {
///     average.add_entry(sample);
/// }
/// assert_eq!(average.value(), 3.0);
/// ```
#[derive(Clone, Debug)]
pub struct MovingAverage {
    buffer: Vec<f64>,
    index: usize,
    sum: f64,
}

impl MovingAverage {
    /// A size of zero is treated as one.
    pub fn new(size: usize) -> Self {
        Self::with_start(size, 0.0)
    }

    pub fn with_start(size: usize, start: f64) -> Self {
        let size = size.max(1);
        Self {
            buffer: vec![start; size],
            index: 0,
            sum: start * size as f64,
        }
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Refills the buffer with `value`.
    pub fn reset(&mut self, value: f64) {
        self.buffer.fill(value);
        self.sum = value * self.size() as f64;
        self.index = 0;
    }
}

impl Filter for MovingAverage {
    fn add_entry(&mut self, sample: f64) {
        self.sum += sample - self.buffer[self.index];
        self.buffer[self.index] = sample;
        self.index = (self.index + 1) % self.buffer.len();
        // Resum once per lap so rounding error doesn't build up.
        if self.index == 0 {
            self.sum = self.buffer.iter().sum();
        }
    }

    fn value(&self) -> f64 {
        self.sum / self.size() as f64
    }
}

/// Exponentially weighted average where each sample has weight
/// `2 / (size + 1)`.
#[derive(Clone, Copy, Debug)]
pub struct ExponentialMovingAverage {
    alpha: f64,
    value: f64,
}

impl ExponentialMovingAverage {
    pub fn new(size: usize) -> Self {
        Self::with_start(size, 0.0)
    }

    pub fn with_start(size: usize, start: f64) -> Self {
        Self {
            alpha: 2.0 / (size.max(1) as f64 + 1.0),
            value: start,
        }
    }
}

impl Filter for ExponentialMovingAverage {
    fn add_entry(&mut self, sample: f64) {
        self.value += self.alpha * (sample - self.value);
    }

    fn value(&self) -> f64 {
        self.value
    }
}
