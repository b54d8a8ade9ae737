//! Daily KPI forecasting
//!
//! Two statistical models behind the [`Forecaster`] trait:
//!
//! - [`SeasonalTrendModel`]: additive decomposition, linear trend plus a
//!   weekly seasonal profile, fitted jointly by least squares.
//!   Requires two full seasonal periods (14 days).
//! - [`LinearTrendModel`]: least-squares line with R² confidence.
//!   Requires 7 days.
//!
//! Both predict `horizon` consecutive days starting the day after the last
//! historical date. Calendar gaps inside the history are filled by linear
//! interpolation before fitting. Predictions are clamped at zero since
//! every dashboard metric is non-negative.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::models::{ForecastPoint, ForecastSeries};

/// Weekly seasonality period (7 days)
pub const WEEKLY_PERIOD: usize = 7;

/// Minimum data points for the seasonal model (two full weeks)
pub const MIN_SEASONAL_POINTS: usize = 2 * WEEKLY_PERIOD;

/// Minimum data points for the linear model
pub const MIN_LINEAR_POINTS: usize = 7;

/// z-score for 95% prediction intervals
const Z_95: f64 = 1.96;

/// A model that projects a daily series forward
pub trait Forecaster {
    /// Short model name (shown in reports)
    fn name(&self) -> &'static str;

    /// Minimum number of historical points the model can fit
    fn min_history(&self) -> usize;

    /// Predict `horizon` days after the last historical date
    ///
    /// `history` must be sorted ascending with unique dates.
    fn forecast(&self, history: &[(NaiveDate, f64)], horizon: usize) -> Result<ForecastSeries>;
}

/// Model selection from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastModel {
    #[default]
    Seasonal,
    Linear,
}

impl Forecaster for ForecastModel {
    fn name(&self) -> &'static str {
        match self {
            ForecastModel::Seasonal => SeasonalTrendModel.name(),
            ForecastModel::Linear => LinearTrendModel.name(),
        }
    }

    fn min_history(&self) -> usize {
        match self {
            ForecastModel::Seasonal => SeasonalTrendModel.min_history(),
            ForecastModel::Linear => LinearTrendModel.min_history(),
        }
    }

    fn forecast(&self, history: &[(NaiveDate, f64)], horizon: usize) -> Result<ForecastSeries> {
        match self {
            ForecastModel::Seasonal => SeasonalTrendModel.forecast(history, horizon),
            ForecastModel::Linear => LinearTrendModel.forecast(history, horizon),
        }
    }
}

/// Additive trend + weekly seasonality
#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonalTrendModel;

impl Forecaster for SeasonalTrendModel {
    fn name(&self) -> &'static str {
        "seasonal"
    }

    fn min_history(&self) -> usize {
        MIN_SEASONAL_POINTS
    }

    fn forecast(&self, history: &[(NaiveDate, f64)], horizon: usize) -> Result<ForecastSeries> {
        let (values, last_date) = prepare(self, history, horizon)?;
        let (slope, seasonal, intercept) = fit_trend_with_seasonality(&values);

        let fitted = |i: usize| slope * i as f64 + intercept + seasonal[i % WEEKLY_PERIOD];
        let sigma = residual_std(&values, fitted);
        let r_squared = r_squared(&values, fitted);

        let n = values.len();
        let predictions = (0..horizon).map(|h| fitted(n + h));

        Ok(ForecastSeries {
            model: self.name().to_string(),
            points: build_points(last_date, predictions, sigma),
            confidence: Some(r_squared.clamp(0.0, 1.0)),
        })
    }
}

/// Joint least-squares fit of y = intercept + slope * t + seasonal[t % 7]
///
/// The slope is estimated within weekday slots (each slot demeaned), so a
/// weekly pattern does not leak into the trend. Seasonal terms sum to zero.
/// Every slot needs at least one point; two weeks of data gives two each.
fn fit_trend_with_seasonality(values: &[f64]) -> (f64, [f64; WEEKLY_PERIOD], f64) {
    let mut t_sum = [0.0f64; WEEKLY_PERIOD];
    let mut y_sum = [0.0f64; WEEKLY_PERIOD];
    let mut count = [0usize; WEEKLY_PERIOD];
    for (i, &v) in values.iter().enumerate() {
        let k = i % WEEKLY_PERIOD;
        t_sum[k] += i as f64;
        y_sum[k] += v;
        count[k] += 1;
    }

    let slot_mean = |sums: &[f64; WEEKLY_PERIOD], k: usize| {
        if count[k] == 0 {
            0.0
        } else {
            sums[k] / count[k] as f64
        }
    };

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &v) in values.iter().enumerate() {
        let k = i % WEEKLY_PERIOD;
        let dt = i as f64 - slot_mean(&t_sum, k);
        numerator += dt * (v - slot_mean(&y_sum, k));
        denominator += dt * dt;
    }
    let slope = if denominator > f64::EPSILON {
        numerator / denominator
    } else {
        0.0
    };

    let mut level = [0.0f64; WEEKLY_PERIOD];
    for (k, l) in level.iter_mut().enumerate() {
        *l = slot_mean(&y_sum, k) - slope * slot_mean(&t_sum, k);
    }
    let intercept = level.iter().sum::<f64>() / WEEKLY_PERIOD as f64;

    let mut seasonal = [0.0f64; WEEKLY_PERIOD];
    for k in 0..WEEKLY_PERIOD {
        seasonal[k] = level[k] - intercept;
    }

    (slope, seasonal, intercept)
}

/// Least-squares linear trend
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearTrendModel;

impl Forecaster for LinearTrendModel {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn min_history(&self) -> usize {
        MIN_LINEAR_POINTS
    }

    fn forecast(&self, history: &[(NaiveDate, f64)], horizon: usize) -> Result<ForecastSeries> {
        let (values, last_date) = prepare(self, history, horizon)?;

        let points: Vec<(f64, f64)> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64, v))
            .collect();
        let (slope, intercept, r_squared) = linear_regression(&points);

        let fitted = |i: usize| slope * i as f64 + intercept;
        let sigma = residual_std(&values, fitted);

        let n = values.len();
        let predictions = (0..horizon).map(|h| fitted(n + h));

        Ok(ForecastSeries {
            model: self.name().to_string(),
            points: build_points(last_date, predictions, sigma),
            confidence: Some(r_squared.clamp(0.0, 1.0)),
        })
    }
}

/// Validate inputs and turn the history into a gap-free value vector
fn prepare<F: Forecaster + ?Sized>(
    model: &F,
    history: &[(NaiveDate, f64)],
    horizon: usize,
) -> Result<(Vec<f64>, NaiveDate)> {
    if horizon == 0 {
        return Err(CoreError::InvalidHorizon(
            "horizon must be > 0".to_string(),
        ));
    }

    if history.len() < model.min_history() {
        return Err(CoreError::InsufficientHistory {
            model: model.name().to_string(),
            required: model.min_history(),
            actual: history.len(),
        });
    }

    let (values, last_date) = fill_gaps(history);
    tracing::debug!(
        model = model.name(),
        points = history.len(),
        filled = values.len() - history.len(),
        horizon,
        "fitting forecast"
    );
    Ok((values, last_date))
}

/// Expand the series to one value per calendar day
///
/// Missing days are linearly interpolated between their neighbours.
/// `history` is non-empty and sorted (checked by the caller).
fn fill_gaps(history: &[(NaiveDate, f64)]) -> (Vec<f64>, NaiveDate) {
    let mut values = Vec::with_capacity(history.len());
    let mut iter = history.iter();
    let Some(&(mut prev_date, mut prev_value)) = iter.next() else {
        return (values, NaiveDate::MIN);
    };
    values.push(prev_value);

    for &(date, value) in iter {
        let gap = (date - prev_date).num_days();
        for step in 1..gap {
            let t = step as f64 / gap as f64;
            values.push(prev_value + (value - prev_value) * t);
        }
        values.push(value);
        prev_date = date;
        prev_value = value;
    }

    (values, prev_date)
}

/// Standard deviation of the in-sample residuals
fn residual_std(values: &[f64], fitted: impl Fn(usize) -> f64) -> f64 {
    let n = values.len() as f64;
    let ss: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &v)| (v - fitted(i)).powi(2))
        .sum();
    (ss / n).sqrt()
}

/// Coefficient of determination of a fitted curve
fn r_squared(values: &[f64], fitted: impl Fn(usize) -> f64) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let ss_tot: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if ss_tot <= 0.0 {
        return 0.0;
    }
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &v)| (v - fitted(i)).powi(2))
        .sum();
    1.0 - ss_res / ss_tot
}

fn build_points(
    last_date: NaiveDate,
    predictions: impl Iterator<Item = f64>,
    sigma: f64,
) -> Vec<ForecastPoint> {
    predictions
        .enumerate()
        .map(|(h, raw)| {
            let predicted = raw.max(0.0);
            ForecastPoint {
                date: last_date + Duration::days(h as i64 + 1),
                predicted,
                lower: Some((raw - Z_95 * sigma).max(0.0)),
                upper: Some((raw + Z_95 * sigma).max(0.0)),
            }
        })
        .collect()
}

/// Simple linear regression with R² calculation
///
/// Computes the best-fit line y = slope * x + intercept and R² coefficient.
///
/// # Returns
/// (slope, intercept, r_squared)
pub(crate) fn linear_regression(points: &[(f64, f64)]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|p| p.0).sum();
    let sum_y: f64 = points.iter().map(|p| p.1).sum();
    let sum_xx: f64 = points.iter().map(|p| p.0 * p.0).sum();
    let sum_xy: f64 = points.iter().map(|p| p.0 * p.1).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    let slope = if denominator.abs() > f64::EPSILON {
        (n * sum_xy - sum_x * sum_y) / denominator
    } else {
        0.0
    };
    let intercept = (sum_y - slope * sum_x) / n;

    // R² (coefficient of determination)
    let mean_y = sum_y / n;
    let ss_tot: f64 = points.iter().map(|p| (p.1 - mean_y).powi(2)).sum();
    let ss_res: f64 = points
        .iter()
        .map(|p| {
            let predicted = slope * p.0 + intercept;
            (p.1 - predicted).powi(2)
        })
        .sum();

    let r_squared = if ss_tot > 0.0 {
        1.0 - (ss_res / ss_tot)
    } else {
        0.0
    };

    (slope, intercept, r_squared)
}
