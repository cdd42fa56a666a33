use crate::document::MatrixDocument;
use crate::numeric::non_negative;
use crate::{
    CompetitorEntry, EditError, Product, ProductName, QualitativeList, StrategicDecision,
    YearRange, COLOR_PALETTE, DEFAULT_PRODUCT_COUNT, MIN_YEARS,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// The growth-share matrix aggregate of one plan.
///
/// Every product listed in `products` has exactly one entry in each of the
/// four per-product maps, every competitor list holds at least one row and
/// the demand series of each product is dense over `years`. Mutations either
/// apply completely or return an [`EditError`] and leave the matrix as it was.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "MatrixDocument", into = "MatrixDocument")]
pub struct BcgMatrix {
    pub(crate) products: Vec<Product>,
    pub(crate) years: YearRange,
    pub(crate) current_sales: BTreeMap<ProductName, Decimal>,
    pub(crate) demand: BTreeMap<ProductName, BTreeMap<i32, Decimal>>,
    pub(crate) competitors: BTreeMap<ProductName, Vec<CompetitorEntry>>,
    pub(crate) decisions: BTreeMap<ProductName, StrategicDecision>,
    pub(crate) strengths: QualitativeList,
    pub(crate) weaknesses: QualitativeList,
}

/// Returns `base` if free, else the first free `base-k` for k = 1, 2, ...
pub(crate) fn disambiguate(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    let mut k = 1u64;
    loop {
        let candidate = format!("{base}-{k}");
        if !taken(&candidate) {
            return candidate;
        }
        k += 1;
    }
}

pub(crate) fn palette_color(index: usize) -> String {
    COLOR_PALETTE[index % COLOR_PALETTE.len()].to_string()
}

impl Default for BcgMatrix {
    fn default() -> Self {
        let mut m = Self::with_years(YearRange::default());
        for _ in 0..DEFAULT_PRODUCT_COUNT {
            m.add_product();
        }
        m
    }
}

impl BcgMatrix {
    /// A matrix without products over the given years.
    pub fn with_years(years: YearRange) -> Self {
        Self {
            products: Vec::new(),
            years,
            current_sales: BTreeMap::new(),
            demand: BTreeMap::new(),
            competitors: BTreeMap::new(),
            decisions: BTreeMap::new(),
            strengths: QualitativeList::default(),
            weaknesses: QualitativeList::default(),
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn product(&self, name: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.name.as_str() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.product(name).is_some()
    }

    pub fn years(&self) -> &YearRange {
        &self.years
    }

    /// Current sales of a product, zero when unknown.
    pub fn current_sales(&self, name: &str) -> Decimal {
        self.current_sales
            .get(&ProductName::from(name))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn current_sales_map(&self) -> &BTreeMap<ProductName, Decimal> {
        &self.current_sales
    }

    /// Market demand of a product in a year, zero when unknown.
    pub fn demand(&self, name: &str, year: i32) -> Decimal {
        self.demand
            .get(&ProductName::from(name))
            .and_then(|series| series.get(&year))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn demand_series(&self, name: &str) -> Option<&BTreeMap<i32, Decimal>> {
        self.demand.get(&ProductName::from(name))
    }

    /// Competitor rows of a product; empty only for unknown products.
    pub fn competitors(&self, name: &str) -> &[CompetitorEntry] {
        self.competitors
            .get(&ProductName::from(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn decision(&self, name: &str) -> StrategicDecision {
        self.decisions
            .get(&ProductName::from(name))
            .copied()
            .unwrap_or_default()
    }

    pub fn strengths(&self) -> &QualitativeList {
        &self.strengths
    }

    pub fn weaknesses(&self) -> &QualitativeList {
        &self.weaknesses
    }

    fn key(&self, name: &str) -> Result<ProductName, EditError> {
        self.product(name)
            .map(|p| p.name.clone())
            .ok_or_else(|| {
                debug!(product = name, "edit rejected: unknown product");
                EditError::UnknownProduct(name.to_string())
            })
    }

    fn name_taken(&self, candidate: &str, except: Option<usize>) -> bool {
        self.products
            .iter()
            .enumerate()
            .any(|(i, p)| Some(i) != except && p.name.as_str() == candidate)
    }

    fn zero_series(&self) -> BTreeMap<i32, Decimal> {
        self.years.iter().map(|y| (y, Decimal::ZERO)).collect()
    }

    pub(crate) fn insert_defaults(&mut self, name: &ProductName) {
        self.current_sales.insert(name.clone(), Decimal::ZERO);
        self.demand.insert(name.clone(), self.zero_series());
        self.competitors
            .insert(name.clone(), vec![CompetitorEntry::blank()]);
        self.decisions
            .insert(name.clone(), StrategicDecision::default());
    }

    // ---- products ----

    /// Append a product named `Product {n+1}` with the next palette color.
    pub fn add_product(&mut self) -> ProductName {
        let next_index = self.products.len();
        let base = format!("Product {}", next_index + 1);
        let name = ProductName(disambiguate(&base, |c| self.name_taken(c, None)));
        self.insert_defaults(&name);
        self.products.push(Product {
            name: name.clone(),
            color: palette_color(next_index),
        });
        debug!(product = %name, "added product");
        name
    }

    /// Remove a product and all of its data. The last product is kept.
    pub fn remove_product(&mut self, name: &str) -> Result<Product, EditError> {
        let key = self.key(name)?;
        if self.products.len() <= 1 {
            debug!(product = name, "edit rejected: last product");
            return Err(EditError::LastProduct);
        }
        let index = self
            .products
            .iter()
            .position(|p| p.name == key)
            .ok_or_else(|| EditError::UnknownProduct(name.to_string()))?;
        let removed = self.products.remove(index);
        self.current_sales.remove(&key);
        self.demand.remove(&key);
        self.competitors.remove(&key);
        self.decisions.remove(&key);
        debug!(product = %key, "removed product");
        Ok(removed)
    }

    /// Rename a product, re-keying all of its data. Returns the final name,
    /// which carries a `-k` suffix when the requested one is taken.
    pub fn rename_product(&mut self, old: &str, new: &str) -> Result<ProductName, EditError> {
        let key = self.key(old)?;
        let requested = new.trim();
        if requested.is_empty() {
            debug!(product = old, "edit rejected: blank name");
            return Err(EditError::BlankName);
        }
        if requested == key.as_str() {
            return Ok(key);
        }
        let index = self
            .products
            .iter()
            .position(|p| p.name == key)
            .ok_or_else(|| EditError::UnknownProduct(old.to_string()))?;
        let final_name = ProductName(disambiguate(requested, |c| {
            self.name_taken(c, Some(index))
        }));

        let sales = self.current_sales.remove(&key).unwrap_or(Decimal::ZERO);
        let series = self.demand.remove(&key).unwrap_or_else(|| self.zero_series());
        let rows = self
            .competitors
            .remove(&key)
            .unwrap_or_else(|| vec![CompetitorEntry::blank()]);
        let decision = self.decisions.remove(&key).unwrap_or_default();

        self.current_sales.insert(final_name.clone(), sales);
        self.demand.insert(final_name.clone(), series);
        self.competitors.insert(final_name.clone(), rows);
        self.decisions.insert(final_name.clone(), decision);
        self.products[index].name = final_name.clone();
        debug!(from = %key, to = %final_name, "renamed product");
        Ok(final_name)
    }

    pub fn set_current_sales(&mut self, name: &str, value: Decimal) -> Result<(), EditError> {
        let key = self.key(name)?;
        self.current_sales.insert(key, non_negative(value));
        Ok(())
    }

    pub fn set_demand(&mut self, name: &str, year: i32, value: Decimal) -> Result<(), EditError> {
        let key = self.key(name)?;
        if !self.years.contains(year) {
            debug!(product = name, year, "edit rejected: year outside range");
            return Err(EditError::UnknownYear(year));
        }
        self.demand
            .entry(key)
            .or_default()
            .insert(year, non_negative(value));
        Ok(())
    }

    pub fn set_decision(
        &mut self,
        name: &str,
        decision: StrategicDecision,
    ) -> Result<(), EditError> {
        let key = self.key(name)?;
        self.decisions.insert(key, decision);
        Ok(())
    }

    // ---- years ----

    /// Append `max(years) + 1` with zero demand for every product.
    pub fn add_year(&mut self) -> Result<i32, EditError> {
        let max = self.years.max();
        let Some(next) = max.checked_add(1) else {
            debug!(max, "edit rejected: year overflow");
            return Err(EditError::InvalidYear(i64::from(max) + 1));
        };
        self.years.push(next);
        for series in self.demand.values_mut() {
            series.insert(next, Decimal::ZERO);
        }
        Ok(next)
    }

    /// Drop the last year and its demand data, keeping at least two years.
    pub fn remove_last_year(&mut self) -> Result<i32, EditError> {
        let Some(last) = self.years.pop() else {
            debug!(len = MIN_YEARS, "edit rejected: minimum years");
            return Err(EditError::MinimumYears);
        };
        for series in self.demand.values_mut() {
            series.remove(&last);
        }
        Ok(last)
    }

    /// Re-anchor the range at `first`, moving values by column position.
    ///
    /// The value at position `i` moves to year `first + i` regardless of the
    /// calendar year it was entered under.
    pub fn rebase_years(&mut self, first: i64) -> Result<(), EditError> {
        let start = match i32::try_from(first) {
            Ok(y) if y > 0 => y,
            _ => {
                debug!(first, "edit rejected: invalid first year");
                return Err(EditError::InvalidYear(first));
            }
        };
        let count = self.years.len();
        let last_offset = i32::try_from(count - 1).map_err(|_| EditError::InvalidYear(first))?;
        if start.checked_add(last_offset).is_none() {
            return Err(EditError::InvalidYear(first));
        }
        let new_years =
            YearRange::contiguous(start, count).map_err(|_| EditError::InvalidYear(first))?;
        for series in self.demand.values_mut() {
            *series = self
                .years
                .iter()
                .zip(new_years.iter())
                .map(|(old, new)| (new, series.get(&old).copied().unwrap_or(Decimal::ZERO)))
                .collect();
        }
        self.years = new_years;
        Ok(())
    }

    // ---- competitors ----

    pub fn add_competitor(&mut self, name: &str) -> Result<usize, EditError> {
        let key = self.key(name)?;
        let rows = self.competitors.entry(key).or_default();
        rows.push(CompetitorEntry::blank());
        Ok(rows.len() - 1)
    }

    /// Remove a competitor row; removing the only row leaves one blank row.
    pub fn remove_competitor(
        &mut self,
        name: &str,
        index: usize,
    ) -> Result<CompetitorEntry, EditError> {
        let key = self.key(name)?;
        let rows = self.competitors.entry(key).or_default();
        if index >= rows.len() {
            return Err(EditError::IndexOutOfRange(index));
        }
        let removed = rows.remove(index);
        if rows.is_empty() {
            rows.push(CompetitorEntry::blank());
        }
        Ok(removed)
    }

    fn competitor_mut(
        &mut self,
        name: &str,
        index: usize,
    ) -> Result<&mut CompetitorEntry, EditError> {
        let key = self.key(name)?;
        self.competitors
            .get_mut(&key)
            .and_then(|rows| rows.get_mut(index))
            .ok_or(EditError::IndexOutOfRange(index))
    }

    pub fn set_competitor_company(
        &mut self,
        name: &str,
        index: usize,
        company: impl Into<String>,
    ) -> Result<(), EditError> {
        self.competitor_mut(name, index)?.company = company.into();
        Ok(())
    }

    pub fn set_competitor_sales(
        &mut self,
        name: &str,
        index: usize,
        sales: Decimal,
    ) -> Result<(), EditError> {
        self.competitor_mut(name, index)?.sales = non_negative(sales);
        Ok(())
    }

    // ---- strengths / weaknesses ----

    pub fn add_strength(&mut self) {
        self.strengths.add();
    }

    pub fn remove_strength(&mut self, index: usize) -> Result<String, EditError> {
        self.strengths.remove(index)
    }

    pub fn set_strength(&mut self, index: usize, text: impl Into<String>) -> Result<(), EditError> {
        self.strengths.set(index, text)
    }

    pub fn add_weakness(&mut self) {
        self.weaknesses.add();
    }

    pub fn remove_weakness(&mut self, index: usize) -> Result<String, EditError> {
        self.weaknesses.remove(index)
    }

    pub fn set_weakness(&mut self, index: usize, text: impl Into<String>) -> Result<(), EditError> {
        self.weaknesses.set(index, text)
    }
}
