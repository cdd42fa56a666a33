#![deny(warnings)]

//! Growth-share (BCG) matrix metrics.
//!
//! Pure functions over a [`BcgMatrix`]:
//! - Sales share of each product in the portfolio
//! - Market growth rate (TCM), simple annualized growth over the year range
//! - Relative market position (PRM) against the largest competitor
//! - Quadrant classification and bubble-chart placement
//!
//! Every figure is rounded to two decimals, the precision shown to planners.

use plan_core::{BcgMatrix, CompetitorEntry, ProductName, StrategicDecision};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// TCM at or above this percentage counts as a high-growth market.
pub const HIGH_GROWTH_THRESHOLD: Decimal = Decimal::TEN;
/// PRM at or above this ratio counts as market leadership.
pub const MARKET_LEADER_THRESHOLD: Decimal = Decimal::ONE;

/// Growth-share matrix quadrant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    /// High growth, leader.
    Star,
    /// Low growth, leader.
    CashCow,
    /// High growth, follower.
    QuestionMark,
    /// Low growth, follower.
    Dog,
}

impl Quadrant {
    /// Planner-facing label used in Spanish reports.
    pub fn label_es(&self) -> &'static str {
        match self {
            Self::Star => "Estrella",
            Self::CashCow => "Vaca",
            Self::QuestionMark => "Incógnita",
            Self::Dog => "Perro",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Star => write!(f, "Star"),
            Self::CashCow => write!(f, "Cash Cow"),
            Self::QuestionMark => write!(f, "Question Mark"),
            Self::Dog => write!(f, "Dog"),
        }
    }
}

fn round2(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn total_sales(matrix: &BcgMatrix) -> Decimal {
    matrix
        .products()
        .iter()
        .map(|p| matrix.current_sales(p.name.as_str()))
        .fold(Decimal::ZERO, |acc, s| acc.saturating_add(s))
}

/// Share of each product in total current sales, in percent.
///
/// Returns an empty map when total sales are zero; callers treat a missing
/// product as 0%.
///
/// Example: sales {A: 600, B: 400} give {A: 60.00, B: 40.00}.
pub fn sales_share(matrix: &BcgMatrix) -> BTreeMap<ProductName, Decimal> {
    let total = total_sales(matrix);
    if total.is_zero() {
        return BTreeMap::new();
    }
    matrix
        .products()
        .iter()
        .map(|p| {
            let sales = matrix.current_sales(p.name.as_str());
            let share = sales
                .checked_div(total)
                .unwrap_or(Decimal::ZERO)
                .saturating_mul(Decimal::ONE_HUNDRED);
            (p.name.clone(), round2(share))
        })
        .collect()
}

/// Simple annualized growth in percent: `((end - start) / start) / periods * 100`.
///
/// Zero when `start` is not positive. This is not a compound (CAGR) rate.
/// Growth too large for a `Decimal` saturates at `Decimal::MAX`; decline is
/// bounded by -100%.
///
/// Example: growth_rate(100, 130, 3) == 10.00
pub fn growth_rate(start: Decimal, end: Decimal, periods: usize) -> Decimal {
    if start <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let periods = Decimal::from(periods.max(1));
    end.checked_sub(start)
        .and_then(|delta| delta.checked_div(start))
        .and_then(|ratio| ratio.checked_div(periods))
        .and_then(|per_period| per_period.checked_mul(Decimal::ONE_HUNDRED))
        .map(round2)
        .unwrap_or(Decimal::MAX)
}

/// Market growth rate (TCM) of every product over the matrix year range.
pub fn market_growth_rate(matrix: &BcgMatrix) -> BTreeMap<ProductName, Decimal> {
    let years = matrix.years();
    matrix
        .products()
        .iter()
        .map(|p| {
            let name = p.name.as_str();
            let start = matrix.demand(name, years.first());
            let end = matrix.demand(name, years.last());
            (p.name.clone(), growth_rate(start, end, years.periods()))
        })
        .collect()
}

/// Largest positive competitor sales, or zero when none is positive.
pub fn largest_competitor(competitors: &[CompetitorEntry]) -> Decimal {
    competitors
        .iter()
        .map(|c| c.sales)
        .filter(|s| *s > Decimal::ZERO)
        .max()
        .unwrap_or(Decimal::ZERO)
}

/// Own sales divided by the largest competitor's sales.
///
/// Zero when no competitor has positive sales. That zero cannot be told apart
/// from a genuinely weak position. A ratio too large for a `Decimal`
/// saturates at `Decimal::MAX`.
///
/// Example: own 50 against competitors [100, 0] gives 0.50.
pub fn relative_position(own: Decimal, competitors: &[CompetitorEntry]) -> Decimal {
    let largest = largest_competitor(competitors);
    if largest.is_zero() {
        return Decimal::ZERO;
    }
    own.checked_div(largest)
        .map(round2)
        .unwrap_or(Decimal::MAX)
}

/// Relative market position (PRM) of every product.
pub fn relative_market_position(matrix: &BcgMatrix) -> BTreeMap<ProductName, Decimal> {
    matrix
        .products()
        .iter()
        .map(|p| {
            let name = p.name.as_str();
            let prm = relative_position(matrix.current_sales(name), matrix.competitors(name));
            (p.name.clone(), prm)
        })
        .collect()
}

/// Quadrant for a growth rate and relative position. Both thresholds are
/// inclusive: TCM 10 is high growth and PRM 1 is leadership.
pub fn classify(tcm: Decimal, prm: Decimal) -> Quadrant {
    let high_growth = tcm >= HIGH_GROWTH_THRESHOLD;
    let leader = prm >= MARKET_LEADER_THRESHOLD;
    match (high_growth, leader) {
        (true, true) => Quadrant::Star,
        (false, true) => Quadrant::CashCow,
        (true, false) => Quadrant::QuestionMark,
        (false, false) => Quadrant::Dog,
    }
}

/// All derived figures for one product.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductMetrics {
    pub product: ProductName,
    pub color: String,
    pub current_sales: Decimal,
    pub largest_competitor: Decimal,
    /// Percent of total sales (0 when total sales are zero).
    pub sales_share: Decimal,
    /// Market growth rate, percent.
    pub market_growth_rate: Decimal,
    /// Relative market position, ratio.
    pub relative_market_position: Decimal,
    pub quadrant: Quadrant,
    pub decision: StrategicDecision,
}

/// Evaluated matrix, one row per product in product order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatrixReport {
    pub rows: Vec<ProductMetrics>,
    pub total_sales: Decimal,
    /// Sum of the displayed (rounded) shares.
    pub share_total: Decimal,
}

/// Compute every metric for every product.
pub fn evaluate(matrix: &BcgMatrix) -> MatrixReport {
    let shares = sales_share(matrix);
    let tcm = market_growth_rate(matrix);
    let prm = relative_market_position(matrix);
    let total = total_sales(matrix);
    if total.is_zero() {
        debug!("total sales are zero, shares default to 0%");
    }

    let rows: Vec<ProductMetrics> = matrix
        .products()
        .iter()
        .map(|p| {
            let name = p.name.as_str();
            let growth = tcm.get(&p.name).copied().unwrap_or(Decimal::ZERO);
            let position = prm.get(&p.name).copied().unwrap_or(Decimal::ZERO);
            ProductMetrics {
                product: p.name.clone(),
                color: p.color.clone(),
                current_sales: matrix.current_sales(name),
                largest_competitor: largest_competitor(matrix.competitors(name)),
                sales_share: shares.get(&p.name).copied().unwrap_or(Decimal::ZERO),
                market_growth_rate: growth,
                relative_market_position: position,
                quadrant: classify(growth, position),
                decision: matrix.decision(name),
            }
        })
        .collect();
    let share_total = rows
        .iter()
        .fold(Decimal::ZERO, |acc, r| acc.saturating_add(r.sales_share));
    MatrixReport {
        rows,
        total_sales: total,
        share_total,
    }
}

/// Bubble placement on the growth-share chart.
///
/// `x` and `y` are normalized to [0, 1] with the origin at the bottom-left;
/// `radius` is in chart pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
}

/// Place a product on the chart: PRM spans [0, 2], TCM spans [-10%, 20%],
/// and the bubble grows with sales share between 8 and 30 pixels.
pub fn chart_point(metrics: &ProductMetrics) -> ChartPoint {
    let two = Decimal::TWO;
    let x = metrics.relative_market_position.min(two) / two;
    let tcm = metrics
        .market_growth_rate
        .clamp(Decimal::new(-10, 0), Decimal::new(20, 0));
    let y = (tcm + Decimal::TEN) / Decimal::new(30, 0);
    let radius = metrics
        .sales_share
        .saturating_mul(two)
        .clamp(Decimal::new(8, 0), Decimal::new(30, 0));
    ChartPoint {
        x: x.to_f64().unwrap_or(0.0),
        y: y.to_f64().unwrap_or(0.0),
        radius: radius.to_f64().unwrap_or(8.0),
    }
}
