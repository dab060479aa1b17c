/// Fixed-capacity ring of recent samples (frame rate, CPU time).
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    history: Vec<f64>,
    index: usize,
    filled: bool,
    slow_average: f64,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![0.0; capacity.max(1)],
            index: 0,
            filled: false,
            slow_average: 0.0,
        }
    }

    pub fn record(&mut self, sample: f64) {
        self.history[self.index] = sample;
        self.index = (self.index + 1) % self.history.len();
        if self.index == 0 {
            self.filled = true;
            self.slow_average = self.average();
        }
    }

    fn recorded(&self) -> &[f64] {
        &self.history[..self.count()]
    }

    pub fn average(&self) -> f64 {
        let samples = self.recorded();
        if samples.is_empty() {
            return 0.0;
        }
        samples.iter().sum::<f64>() / samples.len() as f64
    }

    pub fn max(&self) -> f64 {
        self.recorded()
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    pub fn min(&self) -> f64 {
        self.recorded()
            .iter()
            .copied()
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Average as of the last time the ring wrapped. Changes once per
    /// `capacity` samples, so it reads steadily on screen.
    pub fn slow_average(&self) -> f64 {
        self.slow_average
    }

    pub fn count(&self) -> usize {
        if self.filled {
            self.history.len()
        } else {
            self.index
        }
    }

    pub fn capacity(&self) -> usize {
        self.history.len()
    }
}
