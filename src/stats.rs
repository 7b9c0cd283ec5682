use crate::models::{MonthlyWalkSummary, StableScorePoint};
use serde::Serialize;

const CHART_POINTS: usize = 7;

#[derive(Debug, Clone, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub stable_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StabilityChart {
    pub points: Vec<ChartPoint>,
}

impl StabilityChart {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Stability scores ordered by end time (stable for ties), keeping the most
/// recent seven, then reversed.
pub fn recent_stable_scores(series: &[StableScorePoint]) -> Vec<StableScorePoint> {
    let mut sorted = series.to_vec();
    sorted.sort_by_key(|point| point.ended_at);
    let skip = sorted.len().saturating_sub(CHART_POINTS);
    sorted.into_iter().skip(skip).rev().collect()
}

pub fn build_chart(summary: &MonthlyWalkSummary) -> StabilityChart {
    let points = recent_stable_scores(&summary.stability_series)
        .into_iter()
        .map(|point| ChartPoint {
            label: point.date,
            stable_score: point.stable_score,
        })
        .collect();
    StabilityChart { points }
}
