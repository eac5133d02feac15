use crate::{settings::PeriodSettings, window::RollingWindow};
use statrs::statistics::Statistics;
use std::time::Duration;

/// Mean and population standard deviation of the most recent samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStats {
    pub mean: f64,
    pub stddev: f64,
}

/// Average latency over one named period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAverage {
    pub name: String,
    pub average_ms: Option<f64>,
}

/// Stats over the last `size` values of the window, `None` with fewer than two
pub fn rolling_stats(window: &RollingWindow, size: usize) -> Option<RollingStats> {
    let values = window.last_n(size);
    if values.len() <= 1 {
        return None;
    }

    let mean = values.iter().mean();
    // Population variance (divide by n), clamped against rounding below zero
    let stddev = values.iter().population_std_dev().max(0.0);

    Some(RollingStats { mean, stddev })
}

/// Mean of the last `min(samples, len)` values, `None` for an empty window
pub fn period_average(window: &RollingWindow, samples: usize) -> Option<f64> {
    let values = window.last_n(samples);
    if values.is_empty() {
        return None;
    }
    Some(values.iter().mean())
}

/// Evaluate every configured period independently, in configured order
pub fn period_averages(
    window: &RollingWindow,
    periods: &[PeriodSettings],
    interval: Duration,
) -> Vec<PeriodAverage> {
    periods
        .iter()
        .map(|period| PeriodAverage {
            name: period.name.clone(),
            average_ms: period_average(window, period.sample_count(interval)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::default_periods;

    fn window_of(values: &[f64]) -> RollingWindow {
        let mut window = RollingWindow::new(values.len().max(1));
        window.seed(values.iter().copied());
        window
    }

    #[test]
    fn test_rolling_stats_insufficient_data() {
        assert_eq!(rolling_stats(&window_of(&[]), 60), None);
        assert_eq!(rolling_stats(&window_of(&[42.0]), 60), None);
    }

    #[test]
    fn test_rolling_stats_population_variance() {
        let stats = rolling_stats(&window_of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 60).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-12);
        // Population stddev is exactly 2 here; sample stddev would be ~2.138
        assert!((stats.stddev - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rolling_stats_uses_only_last_values() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let stats = rolling_stats(&window_of(&values), 10).unwrap();
        // mean of 91..=100
        assert!((stats.mean - 95.5).abs() < 1e-12);
        assert!(stats.stddev >= 0.0);
    }

    #[test]
    fn test_rolling_stats_constant_window() {
        let stats = rolling_stats(&window_of(&[10.0; 5]), 60).unwrap();
        assert_eq!(stats.mean, 10.0);
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    fn test_period_average() {
        let window = window_of(&[10.0, 20.0, 30.0, 40.0]);
        assert_eq!(period_average(&window, 2), Some(35.0));
        // Longer than the window: whole-window mean
        assert_eq!(period_average(&window, 4), Some(25.0));
        assert_eq!(period_average(&window, 1000), Some(25.0));
        assert_eq!(period_average(&window_of(&[]), 60), None);
    }

    #[test]
    fn test_period_averages_preserve_order() {
        let values: Vec<f64> = (1..=120).map(f64::from).collect();
        let window = window_of(&values);
        let averages = period_averages(&window, &default_periods(), Duration::from_secs(1));

        let names: Vec<&str> = averages.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["1m", "5m", "10m", "1h", "3h", "5h", "12h"]);

        // 1m: mean of 61..=120
        assert_eq!(averages[0].average_ms, Some(90.5));
        // everything longer covers the whole window
        for average in &averages[1..] {
            assert_eq!(average.average_ms, Some(60.5));
        }
    }

    #[test]
    fn test_period_averages_empty_window() {
        let averages = period_averages(&window_of(&[]), &default_periods(), Duration::from_secs(1));
        assert!(averages.iter().all(|a| a.average_ms.is_none()));
    }
}
