use std::collections::VecDeque;

/// Moving statistics over the last `length` samples, plus exponentially
/// decayed statistics over the entire history.
///
/// `avg`/`sd` are plain population statistics of the current window. `davg`/
/// `dsd` weight newer samples more: every `add` folds the sample in with
/// weight `1 - alpha` and decays the previous estimate by `alpha`. With
/// `alpha` close to 1 the decayed figures react slowly, with `alpha` close to
/// 0 they track the latest sample.
pub struct TruncatedSeq {
    window: VecDeque<f64>,
    length: usize,
    alpha: f64,
    num: usize,
    davg: f64,
    dvariance: f64,
}

impl TruncatedSeq {
    pub fn new(length: usize, alpha: f64) -> Self {
        debug_assert!(length > 0);
        debug_assert!(alpha > 0.0 && alpha <= 1.0);
        Self {
            window: VecDeque::with_capacity(length),
            length,
            alpha,
            num: 0,
            davg: 0.0,
            dvariance: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        if self.window.len() == self.length {
            self.window.pop_front();
        }
        self.window.push_back(value);

        if self.num == 0 {
            self.davg = value;
            self.dvariance = 0.0;
        } else {
            self.davg = (1.0 - self.alpha) * value + self.alpha * self.davg;
            let diff = value - self.davg;
            self.dvariance = (1.0 - self.alpha) * diff * diff + self.alpha * self.dvariance;
        }
        self.num += 1;
    }

    /// Total number of samples ever added, not capped at the window length.
    pub fn num(&self) -> usize {
        self.num
    }

    pub fn avg(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.window.iter().sum();
        sum / self.window.len() as f64
    }

    pub fn sd(&self) -> f64 {
        if self.window.len() <= 1 {
            return 0.0;
        }
        let avg = self.avg();
        let sum: f64 = self.window.iter().map(|x| (x - avg) * (x - avg)).sum();
        (sum / self.window.len() as f64).sqrt()
    }

    pub fn davg(&self) -> f64 {
        self.davg
    }

    pub fn dsd(&self) -> f64 {
        self.dvariance.max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_average() {
        let mut seq = TruncatedSeq::new(3, 0.5);
        seq.add(1.0);
        seq.add(2.0);
        seq.add(3.0);
        assert_eq!(seq.avg(), 2.0);
        // window slides; 1.0 falls out
        seq.add(4.0);
        assert_eq!(seq.avg(), 3.0);
        assert_eq!(seq.num(), 4);
    }

    #[test]
    fn few_samples_have_zero_deviation() {
        let mut seq = TruncatedSeq::new(8, 0.5);
        assert_eq!(seq.sd(), 0.0);
        assert_eq!(seq.dsd(), 0.0);
        seq.add(42.0);
        assert_eq!(seq.sd(), 0.0);
        assert_eq!(seq.dsd(), 0.0);
        assert_eq!(seq.davg(), 42.0);
    }

    #[test]
    fn constant_samples_have_no_spread() {
        let mut seq = TruncatedSeq::new(8, 0.5);
        for _ in 0..32 {
            seq.add(7.0);
        }
        assert_eq!(seq.avg(), 7.0);
        assert_eq!(seq.sd(), 0.0);
        assert_eq!(seq.davg(), 7.0);
        assert_eq!(seq.dsd(), 0.0);
    }

    #[test]
    fn window_deviation_is_population_deviation() {
        let mut seq = TruncatedSeq::new(4, 0.5);
        for x in [2.0, 4.0, 4.0, 6.0] {
            seq.add(x);
        }
        assert_eq!(seq.avg(), 4.0);
        // population variance of [2, 4, 4, 6] is 2
        assert!((seq.sd() - 2.0f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn decayed_average_weights_recent_samples() {
        let mut seq = TruncatedSeq::new(8, 0.5);
        seq.add(0.0);
        seq.add(10.0);
        assert_eq!(seq.davg(), 5.0);
        seq.add(10.0);
        assert_eq!(seq.davg(), 7.5);
        assert!(seq.dsd() > 0.0);
    }

    #[test]
    fn large_inputs_stay_finite() {
        let mut seq = TruncatedSeq::new(16, 0.5);
        let big = (1u64 << 53) as f64;
        for i in 0..64 {
            seq.add(big - i as f64);
        }
        assert!(seq.avg().is_finite());
        assert!(seq.sd().is_finite());
        assert!(seq.davg().is_finite());
        assert!(seq.dsd().is_finite());
        assert!(seq.sd() >= 0.0);
    }
}
