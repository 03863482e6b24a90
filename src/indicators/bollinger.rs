/// One point of the Bollinger envelope, aligned 1:1 with the input series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub lower: f64,
    pub sma: f64,
    pub upper: f64,
}

impl BollingerPoint {
    /// Reconstruct the deviation the envelope was built from.
    pub fn deviation(&self, num_stdev: f64) -> f64 {
        (self.sma - self.lower) / num_stdev
    }
}

/// Rolling Bollinger Bands over a close series.
///
/// The trailing window holds up to `length` samples and narrows at the start
/// of the series, never below one sample. Deviation is the sample standard
/// deviation (N-1 divisor); a single-sample window yields 0.0, never NaN.
pub fn bollinger(closes: &[f64], length: usize, num_stdev: f64) -> Vec<BollingerPoint> {
    let mut points = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        let start = (i + 1).saturating_sub(length);
        let window = &closes[start..=i];
        let sma = window.iter().sum::<f64>() / window.len() as f64;
        let stdev = sample_stdev(window, sma);
        points.push(BollingerPoint {
            lower: sma - num_stdev * stdev,
            sma,
            upper: sma + num_stdev * stdev,
        });
    }
    points
}

fn sample_stdev(window: &[f64], mean: f64) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = window.iter().map(|x| (x - mean) * (x - mean)).sum();
    (sum_sq / (window.len() - 1) as f64).sqrt()
}
