//! Wire form of the matrix as stored on a plan.
//!
//! [`MatrixDocument`] accepts whatever the editor has stored over time:
//! missing sections, numbers written as strings, stale product keys. Turning
//! it into a [`BcgMatrix`] restores every invariant, filling defaults for what
//! is missing and dropping what no longer belongs to a product.

use crate::matrix::{disambiguate, palette_color, BcgMatrix};
use crate::numeric::{decimal_to_json, non_negative_from_json};
use crate::{
    CompetitorEntry, Product, ProductName, QualitativeList, StrategicDecision, YearRange,
    DEFAULT_PRODUCT_COUNT,
};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// `{ "nombre": ..., "color": ... }`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub nombre: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub color: String,
}

/// `{ "empresa": ..., "ventas": ... }`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRow {
    #[serde(default, deserialize_with = "lenient_text")]
    pub empresa: String,
    #[serde(default)]
    pub ventas: Value,
}

/// The JSON document stored in a plan's `bcg_matrix_data` field.
///
/// A section of the wrong shape reads as absent. Inside the per-product maps
/// an entry of the wrong shape reads as absent for that product only.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixDocument {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub productos: Option<Vec<ProductRow>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub years: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "Option::is_none")]
    pub ventas_actuales: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "Option::is_none")]
    pub demanda_global: Option<BTreeMap<String, BTreeMap<String, Value>>>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "Option::is_none")]
    pub ventas_competidores: Option<BTreeMap<String, Vec<CompetitorRow>>>,
    #[serde(default, deserialize_with = "lenient_map", skip_serializing_if = "Option::is_none")]
    pub decisiones_estrategicas: Option<BTreeMap<String, Value>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub fortalezas: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub debilidades: Option<Vec<String>>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(section) => Ok(Some(section)),
        Err(err) => {
            warn!(error = %err, "ignoring malformed section");
            Ok(None)
        }
    }
}

fn lenient_map<'de, D, T>(deserializer: D) -> Result<Option<BTreeMap<String, T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Some(raw) = lenient::<D, BTreeMap<String, Value>>(deserializer)? else {
        return Ok(None);
    };
    let entries = raw
        .into_iter()
        .filter_map(|(product, value)| match serde_json::from_value(value) {
            Ok(entry) => Some((product, entry)),
            Err(err) => {
                warn!(product = %product, error = %err, "ignoring malformed entry");
                None
            }
        })
        .collect();
    Ok(Some(entries))
}

/// Strings as stored, numbers as their text, anything else empty.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn year_from_json(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn rehydrate_years(raw: Option<Vec<Value>>) -> YearRange {
    let Some(raw) = raw else {
        return YearRange::default();
    };
    let total = raw.len();
    let mut years: Vec<i32> = raw.iter().filter_map(year_from_json).collect();
    if years.len() != total {
        warn!(dropped = total - years.len(), "dropping unreadable years");
    }
    if years.len() == 1 {
        let only = years[0];
        match only.checked_add(1) {
            Some(next) => years.push(next),
            None => years.insert(0, only - 1),
        }
        warn!(year = only, "extending single-year range");
    }
    YearRange::new(years).unwrap_or_else(|_| {
        warn!("no usable years, using default range");
        YearRange::default()
    })
}

/// A rehydrated product together with the name its data was stored under.
struct StoredProduct {
    stored: String,
    product: Product,
}

fn rehydrate_products(raw: Option<Vec<ProductRow>>) -> Vec<StoredProduct> {
    let Some(rows) = raw else {
        return (0..DEFAULT_PRODUCT_COUNT)
            .map(|i| {
                let name = format!("Product {}", i + 1);
                StoredProduct {
                    stored: name.clone(),
                    product: Product {
                        name: ProductName(name),
                        color: palette_color(i),
                    },
                }
            })
            .collect();
    };
    let mut products: Vec<StoredProduct> = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let trimmed = row.nombre.trim();
        let base = if trimmed.is_empty() {
            format!("Product {}", i + 1)
        } else {
            trimmed.to_string()
        };
        let name = disambiguate(&base, |c| {
            products.iter().any(|p| p.product.name.as_str() == c)
        });
        if name != row.nombre {
            warn!(stored = %row.nombre, name = %name, "renaming stored product");
        }
        let color = if row.color.trim().is_empty() {
            palette_color(i)
        } else {
            row.color
        };
        products.push(StoredProduct {
            stored: row.nombre,
            product: Product {
                name: ProductName(name),
                color,
            },
        });
    }
    products
}

/// Pick the entry of every product out of `map`, warning about leftovers.
///
/// Entries are found under the name the product was stored with, falling
/// back to its rehydrated name. Duplicate stored names share one entry.
fn take_for_products<V: Clone, T>(
    products: &[StoredProduct],
    map: Option<BTreeMap<String, V>>,
    section: &'static str,
    mut convert: impl FnMut(Option<V>) -> T,
) -> BTreeMap<ProductName, T> {
    let map = map.unwrap_or_default();
    let mut used: Vec<&str> = Vec::with_capacity(products.len());
    let taken = products
        .iter()
        .map(|p| {
            let final_name = p.product.name.as_str();
            let found = [p.stored.as_str(), final_name]
                .into_iter()
                .find_map(|k| map.get_key_value(k));
            let value = found.map(|(k, v)| {
                used.push(k.as_str());
                v.clone()
            });
            (p.product.name.clone(), convert(value))
        })
        .collect();
    for stale in map.keys().filter(|k| !used.contains(&k.as_str())) {
        warn!(section, product = %stale, "dropping data of unknown product");
    }
    taken
}

impl From<MatrixDocument> for BcgMatrix {
    fn from(doc: MatrixDocument) -> Self {
        let years = rehydrate_years(doc.years);
        let products = rehydrate_products(doc.productos);

        let current_sales = take_for_products(
            &products,
            doc.ventas_actuales,
            "ventasActuales",
            |v| v.as_ref().map_or(Decimal::ZERO, non_negative_from_json),
        );

        let demand = take_for_products(&products, doc.demanda_global, "demandaGlobal", |v| {
            let stored: BTreeMap<i32, Decimal> = v
                .unwrap_or_default()
                .iter()
                .filter_map(|(year, value)| {
                    year.trim()
                        .parse::<i32>()
                        .ok()
                        .map(|y| (y, non_negative_from_json(value)))
                })
                .collect();
            years
                .iter()
                .map(|y| (y, stored.get(&y).copied().unwrap_or(Decimal::ZERO)))
                .collect::<BTreeMap<i32, Decimal>>()
        });

        let competitors = take_for_products(
            &products,
            doc.ventas_competidores,
            "ventasCompetidores",
            |rows| {
                let mut entries: Vec<CompetitorEntry> = rows
                    .unwrap_or_default()
                    .into_iter()
                    .map(|row| CompetitorEntry {
                        company: row.empresa,
                        sales: non_negative_from_json(&row.ventas),
                    })
                    .collect();
                if entries.is_empty() {
                    entries.push(CompetitorEntry::blank());
                }
                entries
            },
        );

        let decisions = take_for_products(
            &products,
            doc.decisiones_estrategicas,
            "decisionesEstrategicas",
            |v| match v {
                Some(Value::String(label)) => {
                    StrategicDecision::from_label(&label).unwrap_or_else(|| {
                        warn!(label = %label, "unknown decision, using default");
                        StrategicDecision::default()
                    })
                }
                _ => StrategicDecision::default(),
            },
        );

        Self {
            products: products.into_iter().map(|p| p.product).collect(),
            years,
            current_sales,
            demand,
            competitors,
            decisions,
            strengths: doc
                .fortalezas
                .map(QualitativeList::new)
                .unwrap_or_default(),
            weaknesses: doc
                .debilidades
                .map(QualitativeList::new)
                .unwrap_or_default(),
        }
    }
}

impl From<BcgMatrix> for MatrixDocument {
    fn from(m: BcgMatrix) -> Self {
        let key = |name: &ProductName| name.0.clone();
        Self {
            productos: Some(
                m.products
                    .iter()
                    .map(|p| ProductRow {
                        nombre: p.name.0.clone(),
                        color: p.color.clone(),
                    })
                    .collect(),
            ),
            years: Some(m.years.iter().map(Value::from).collect()),
            ventas_actuales: Some(
                m.current_sales
                    .iter()
                    .map(|(k, v)| (key(k), decimal_to_json(*v)))
                    .collect(),
            ),
            demanda_global: Some(
                m.demand
                    .iter()
                    .map(|(k, series)| {
                        let series = series
                            .iter()
                            .map(|(y, v)| (y.to_string(), decimal_to_json(*v)))
                            .collect();
                        (key(k), series)
                    })
                    .collect(),
            ),
            ventas_competidores: Some(
                m.competitors
                    .iter()
                    .map(|(k, rows)| {
                        let rows = rows
                            .iter()
                            .map(|r| CompetitorRow {
                                empresa: r.company.clone(),
                                ventas: decimal_to_json(r.sales),
                            })
                            .collect();
                        (key(k), rows)
                    })
                    .collect(),
            ),
            decisiones_estrategicas: Some(
                m.decisions
                    .iter()
                    .map(|(k, d)| (key(k), Value::from(d.label())))
                    .collect(),
            ),
            fortalezas: Some(m.strengths.as_slice().to_vec()),
            debilidades: Some(m.weaknesses.as_slice().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn d(units: i64) -> Decimal {
        Decimal::new(units, 0)
    }

    #[test]
    fn empty_document_is_default_matrix() {
        let m: BcgMatrix = serde_json::from_str("{}").unwrap();
        assert_eq!(m, BcgMatrix::default());
    }

    #[test]
    fn loads_editor_document() {
        let doc = json!({
            "productos": [
                { "nombre": "A", "color": "#FF6B6B" },
                { "nombre": "B", "color": "#4ECDC4" }
            ],
            "years": [2020, 2021, 2022, 2023],
            "ventasActuales": { "A": "600", "B": 400 },
            "demandaGlobal": { "A": { "2020": 100, "2023": "130" } },
            "ventasCompetidores": { "A": [ { "empresa": "Acme", "ventas": 100 }, { "empresa": "", "ventas": "" } ] },
            "decisionesEstrategicas": { "A": "Invertir", "B": "Whatever" },
            "fortalezas": ["Talent", "", "Brand"],
            "debilidades": ["Debt", ""]
        });
        let m: BcgMatrix = serde_json::from_value(doc).unwrap();
        assert_eq!(m.years().as_slice(), &[2020, 2021, 2022, 2023]);
        assert_eq!(m.current_sales("A"), d(600));
        assert_eq!(m.current_sales("B"), d(400));
        assert_eq!(m.demand("A", 2020), d(100));
        assert_eq!(m.demand("A", 2021), Decimal::ZERO);
        assert_eq!(m.demand("A", 2023), d(130));
        assert_eq!(m.demand_series("B").map(|s| s.len()), Some(4));
        assert_eq!(m.competitors("A").len(), 2);
        assert_eq!(m.competitors("A")[1].sales, Decimal::ZERO);
        assert_eq!(m.competitors("B"), &[CompetitorEntry::blank()]);
        assert_eq!(m.decision("A"), StrategicDecision::Invest);
        assert_eq!(m.decision("B"), StrategicDecision::Maintain);
        assert_eq!(m.strengths().len(), 3);
    }

    #[test]
    fn repairs_broken_documents() {
        let doc = json!({
            "productos": [
                { "nombre": "A" },
                { "nombre": "A", "color": "#000000" },
                { "nombre": "  " }
            ],
            "years": ["2019"],
            "ventasActuales": { "A": -20, "Ghost": 5 },
            "demandaGlobal": { "A": { "2019": 7, "1800": 3, "x": 1 } }
        });
        let m: BcgMatrix = serde_json::from_value(doc).unwrap();
        let names: Vec<&str> = m.products().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A-1", "Product 3"]);
        assert_eq!(m.products()[0].color, "#FF6B6B");
        assert_eq!(m.products()[1].color, "#000000");
        assert_eq!(m.years().as_slice(), &[2019, 2020]);
        assert_eq!(m.current_sales("A"), Decimal::ZERO);
        assert!(!m.contains("Ghost"));
        assert_eq!(m.demand("A", 2019), d(7));
        assert_eq!(m.demand_series("A").map(|s| s.len()), Some(2));
        assert_eq!(m.strengths(), &QualitativeList::default());
    }

    #[test]
    fn mistyped_sections_fall_back_to_defaults() {
        for doc in [
            json!({ "productos": "oops" }),
            json!({ "years": "2020" }),
            json!({ "fortalezas": 3, "ventasActuales": [1, 2] }),
            json!({ "demandaGlobal": "none", "ventasCompetidores": null }),
        ] {
            let m: BcgMatrix = serde_json::from_value(doc).unwrap();
            assert_eq!(m, BcgMatrix::default());
        }
    }

    #[test]
    fn mistyped_entries_only_affect_their_product() {
        let doc = json!({
            "productos": [ { "nombre": 7 }, { "nombre": "B" }, { "nombre": null } ],
            "years": [2020, 2021],
            "demandaGlobal": { "7": "lots", "B": { "2021": 40 } },
            "ventasCompetidores": {
                "7": { "empresa": "Acme", "ventas": 10 },
                "B": [ { "empresa": 42, "ventas": 90 } ]
            }
        });
        let m: BcgMatrix = serde_json::from_value(doc).unwrap();
        let names: Vec<&str> = m.products().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["7", "B", "Product 3"]);
        assert_eq!(m.demand("7", 2020), Decimal::ZERO);
        assert_eq!(m.demand("B", 2021), d(40));
        assert_eq!(m.competitors("7"), &[CompetitorEntry::blank()]);
        assert_eq!(m.competitors("B")[0].company, "42");
        assert_eq!(m.competitors("B")[0].sales, d(90));
    }

    #[test]
    fn data_follows_the_stored_name() {
        let doc = json!({
            "productos": [ { "nombre": "A " }, { "nombre": "A" }, { "nombre": "" } ],
            "ventasActuales": { "A ": 10, "A": 20, "": 30, "Ghost": 1 }
        });
        let m: BcgMatrix = serde_json::from_value(doc).unwrap();
        let names: Vec<&str> = m.products().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "A-1", "Product 3"]);
        assert_eq!(m.current_sales("A"), d(10));
        assert_eq!(m.current_sales("A-1"), d(20));
        assert_eq!(m.current_sales("Product 3"), d(30));
        assert!(!m.contains("Ghost"));
    }

    #[test]
    fn duplicate_stored_names_share_their_data() {
        let doc = json!({
            "productos": [ { "nombre": "A" }, { "nombre": "A" } ],
            "ventasActuales": { "A": 20 }
        });
        let m: BcgMatrix = serde_json::from_value(doc).unwrap();
        assert_eq!(m.current_sales("A"), d(20));
        assert_eq!(m.current_sales("A-1"), d(20));
    }

    #[test]
    fn empty_years_fall_back_to_default() {
        let m: BcgMatrix = serde_json::from_value(json!({ "years": [] })).unwrap();
        assert_eq!(m.years(), &YearRange::default());
    }

    #[test]
    fn saved_shape_matches_editor() {
        let mut m = BcgMatrix::with_years(YearRange::contiguous(2020, 2).unwrap());
        let name = m.add_product();
        m.set_current_sales(name.as_str(), Decimal::new(1250, 1)).unwrap();
        m.set_demand(name.as_str(), 2021, d(80)).unwrap();
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(
            v,
            json!({
                "productos": [ { "nombre": "Product 1", "color": "#FF6B6B" } ],
                "years": [2020, 2021],
                "ventasActuales": { "Product 1": 125 },
                "demandaGlobal": { "Product 1": { "2020": 0, "2021": 80 } },
                "ventasCompetidores": { "Product 1": [ { "empresa": "", "ventas": 0 } ] },
                "decisionesEstrategicas": { "Product 1": "Mantener" },
                "fortalezas": ["", ""],
                "debilidades": ["", ""]
            })
        );
    }

    proptest! {
        #[test]
        fn document_roundtrip(sales in proptest::collection::vec(0i64..10_000_000, 1..8),
                              scale in 0u32..4,
                              extra_years in 0usize..5) {
            let mut m = BcgMatrix::with_years(YearRange::contiguous(2015, 2 + extra_years).unwrap());
            for (i, units) in sales.iter().enumerate() {
                let name = m.add_product();
                m.set_current_sales(name.as_str(), Decimal::new(*units, scale)).unwrap();
                m.set_demand(name.as_str(), 2015, Decimal::new(*units / 2, scale)).unwrap();
                m.set_competitor_sales(name.as_str(), 0, Decimal::new(i as i64 * 7, 1)).unwrap();
            }
            let text = serde_json::to_string(&m).unwrap();
            let back: BcgMatrix = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(back, m);
        }
    }
}
