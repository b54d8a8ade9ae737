//! Forecast output models

use chrono::NaiveDate;
use serde::Serialize;

/// One predicted day
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
}

/// Predictions for a contiguous run of future days
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSeries {
    /// Name of the model that produced the series
    pub model: String,
    /// Points on consecutive dates, ascending
    pub points: Vec<ForecastPoint>,
    /// Fit quality (R², 0.0-1.0) when the model reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ForecastSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    /// Sum of predicted values over an inclusive date range
    pub fn total_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        self.points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .map(|p| p.predicted)
            .sum()
    }

    /// Sum of every predicted value
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.predicted).sum()
    }
}
