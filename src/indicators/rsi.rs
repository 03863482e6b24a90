/// Exponentially-weighted Relative Strength Index over a close series.
///
/// Smoothing follows the center-of-mass convention: `alpha = 1 / (1 + length)`
/// applied from the second delta onward, seeded with the first delta. The
/// first element has no prior delta and is emitted as `None`; callers must
/// never treat index 0 as a valid reading. A zero average loss maps to 100.0
/// instead of dividing by zero.
pub fn rsi(closes: &[f64], length: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() < 2 {
        return out;
    }

    let alpha = 1.0 / (1.0 + length as f64);
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        if i == 1 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain += alpha * (gain - avg_gain);
            avg_loss += alpha * (loss - avg_loss);
        }

        out[i] = Some(if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_element_is_undefined() {
        let values = rsi(&[100.0, 101.0, 102.0], 14);
        assert_eq!(values.len(), 3);
        assert!(values[0].is_none());
        assert!(values[1].is_some());
    }

    #[test]
    fn test_values_stay_bounded() {
        let closes = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25,
            46.0, 46.5,
        ];
        for value in rsi(&closes, 14).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_strictly_increasing_closes_reach_100() {
        // Fifteen rising candles at length 14: no losses ever, so the last
        // reading must be exactly 100.
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let values = rsi(&closes, 14);
        assert_eq!(values.last().copied().flatten(), Some(100.0));
    }

    #[test]
    fn test_all_losses_reach_zero_asymptotically() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64 * 0.5).collect();
        let last = rsi(&closes, 14).last().copied().flatten().unwrap();
        assert!(last < 1e-9);
    }

    #[test]
    fn test_flat_series_is_fully_overbought_by_convention() {
        // No gains and no losses: avg_loss stays zero, which is defined as 100.
        let values = rsi(&[50.0, 50.0, 50.0, 50.0], 14);
        assert_eq!(values[3], Some(100.0));
    }

    #[test]
    fn test_single_close_has_no_reading() {
        let values = rsi(&[100.0], 14);
        assert_eq!(values, vec![None]);
    }
}
