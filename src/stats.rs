/// Mean, population standard deviation and median of a sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub n: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub median: f64,
}

impl Summary {
    /// `None` for an empty set. Samples are sorted in place.
    pub fn from_samples(samples: &mut [f64]) -> Option<Self> {
        let n = samples.len();
        if n == 0 {
            return None;
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        // Identical samples must report exactly zero spread.
        let std_dev = if samples.iter().all(|&x| x == samples[0]) {
            0.0
        } else {
            let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
            variance.sqrt()
        };

        samples.sort_unstable_by(f64::total_cmp);
        let median = if n % 2 == 1 {
            samples[n / 2]
        } else {
            (samples[n / 2 - 1] + samples[n / 2]) / 2.0
        };

        Some(Self {
            n,
            mean,
            std_dev,
            median,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_summary() {
        assert!(Summary::from_samples(&mut []).is_none());
    }

    #[test]
    fn odd_count() {
        let s = Summary::from_samples(&mut [3.0, 1.0, 2.0]).unwrap();
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.median, 2.0);
        assert!((s.std_dev - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn even_count_averages_middle_pair() {
        let s = Summary::from_samples(&mut [4.0, -2.0, 10.0, 0.0]).unwrap();
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.median, 2.0);
        assert_eq!(s.std_dev, 21.0f64.sqrt());
    }

    #[test]
    fn equal_samples_have_zero_spread() {
        let s = Summary::from_samples(&mut [0.1; 7]).unwrap();
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.median, 0.1);
    }

    #[test]
    fn unequal_samples_have_positive_spread() {
        let s = Summary::from_samples(&mut [5.0, 5.0, 5.0, 5.000001]).unwrap();
        assert!(s.std_dev > 0.0);
    }
}
