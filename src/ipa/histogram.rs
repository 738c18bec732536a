//! Cumulative histogram helper

/// A histogram stored as cumulative frequencies.
///
/// `cumulative[i]` is the number of samples in bins `0..i`, so the array has
/// one more entry than there are bins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Histogram {
    cumulative: Vec<u64>,
}

impl Histogram {
    pub fn new(data: &[u32]) -> Self {
        let mut cumulative = Vec::with_capacity(data.len() + 1);
        cumulative.push(0);
        let mut total = 0u64;
        for &count in data {
            total += u64::from(count);
            cumulative.push(total);
        }
        Self { cumulative }
    }

    pub fn bins(&self) -> usize {
        self.cumulative.len().saturating_sub(1)
    }

    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Point in bin space, with linear interpolation inside the bin, below
    /// which a fraction `q` of samples lie. `first` and `last` restrict the
    /// search to a range of bins.
    pub fn quantile(&self, q: f64, first: Option<usize>, last: Option<usize>) -> f64 {
        let bins = self.bins();
        if bins == 0 {
            return 0.0;
        }

        let mut last = last.unwrap_or(bins - 1).min(bins - 1);
        let mut first = first.unwrap_or(0).min(last);

        let item = q * self.total() as f64;
        while first < last {
            let middle = (first + last) / 2;
            if (self.cumulative[middle + 1] as f64) > item {
                last = middle;
            } else {
                first = middle + 1;
            }
        }

        let below = self.cumulative[first] as f64;
        let in_bin = (self.cumulative[first + 1] - self.cumulative[first]) as f64;
        let frac = if in_bin == 0.0 {
            0.0
        } else {
            (item - below) / in_bin
        };

        first as f64 + frac
    }

    /// Mean of the samples between quantiles `low` and `high`, in bin
    /// units with each sample taken at its bin centre.
    pub fn inter_quantile_mean(&self, low: f64, high: f64) -> f64 {
        let low_point = self.quantile(low, None, None);
        let high_point = self.quantile(high, None, None);
        if high_point <= low_point {
            return low_point;
        }

        let mut sum_bin_freq = 0.0;
        let mut cumul_freq = 0.0;

        let mut p_low = low_point;
        let mut p_next = low_point.floor() + 1.0;
        while p_low < high_point {
            let bin = p_low.floor() as usize;
            let freq = (self.cumulative[bin + 1] - self.cumulative[bin]) as f64
                * (p_next.min(high_point) - p_low);

            sum_bin_freq += bin as f64 * freq;
            cumul_freq += freq;

            p_low = p_next;
            p_next += 1.0;
        }

        if cumul_freq == 0.0 {
            return low_point;
        }

        sum_bin_freq / cumul_freq + 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cumulative_counts() {
        let hist = Histogram::new(&[1, 2, 3, 4]);
        assert_eq!(hist.bins(), 4);
        assert_eq!(hist.total(), 10);
    }

    #[test]
    fn test_quantile_interpolates_in_bin() {
        let hist = Histogram::new(&[10, 10, 10, 10]);
        assert_eq!(hist.quantile(0.5, None, None), 2.0);
        assert_eq!(hist.quantile(0.25, None, None), 1.0);
        assert_eq!(hist.quantile(0.125, None, None), 0.5);
    }

    #[test]
    fn test_inter_quantile_mean_of_single_bin() {
        let mut data = [0u32; 16];
        data[9] = 100;
        let hist = Histogram::new(&data);
        let mean = hist.inter_quantile_mean(0.0, 1.0);
        assert!((mean - 9.5).abs() < 1e-9);
    }

    #[test]
    fn test_upper_tail_mean() {
        let mut data = [0u32; 256];
        data[10] = 98;
        data[200] = 2;
        let hist = Histogram::new(&data);
        let mean = hist.inter_quantile_mean(0.98, 1.0);
        assert!((mean - 200.5).abs() < 1e-9, "mean {}", mean);
    }

    #[test]
    fn test_empty_histogram() {
        let hist = Histogram::new(&[]);
        assert_eq!(hist.bins(), 0);
        assert_eq!(hist.quantile(0.5, None, None), 0.0);
        assert_eq!(hist.inter_quantile_mean(0.0, 1.0), 0.0);
    }
}
