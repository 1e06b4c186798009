//! Metadata filters over the inventory table.
//!
//! A [`VehicleFilter`] is a conjunction of [`Predicate`]s. It has two
//! renderings with the same meaning: [`VehicleFilter::to_sql`] for the SQLite
//! store and [`VehicleFilter::matches`] for in-memory evaluation. Price is the
//! exception: prices are stored as free text, so `to_sql` leaves
//! [`Predicate::PriceAtMost`] out and stores apply `matches` afterwards.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

use crate::entity::VehicleQuery;
use crate::models::{Vehicle, VehicleStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Dealership(String),
    Active,
    /// Case-insensitive substring of `make`.
    MakeLike(String),
    /// Case-insensitive substring of `model`.
    ModelLike(String),
    YearBetween(i64, i64),
    YearAtLeast(i64),
    YearAtMost(i64),
    /// Parsed price `<=` the budget; unparseable prices never match.
    PriceAtMost(f64),
    /// Case-insensitive substring of description + features.
    TextLike(String),
}

/// A positional bind value for the SQL rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleFilter {
    predicates: Vec<Predicate>,
}

impl VehicleFilter {
    /// Dealership + active only.
    pub fn scope(dealership_id: &str) -> Self {
        Self {
            predicates: vec![
                Predicate::Dealership(dealership_id.to_string()),
                Predicate::Active,
            ],
        }
    }

    /// Scope predicates plus one predicate per populated query field.
    pub fn from_query(dealership_id: &str, query: &VehicleQuery) -> Self {
        let mut filter = Self::scope(dealership_id);

        if let Some(make) = &query.make {
            filter.push(Predicate::MakeLike(make.to_lowercase()));
        }
        if let Some(model) = &query.model {
            filter.push(Predicate::ModelLike(model.to_lowercase()));
        }

        match (query.year_min, query.year_max) {
            (Some(min), Some(max)) => filter.push(Predicate::YearBetween(min, max)),
            (Some(min), None) => filter.push(Predicate::YearAtLeast(min)),
            (None, Some(max)) => filter.push(Predicate::YearAtMost(max)),
            (None, None) => {}
        }

        if let Some(budget) = query.budget_max {
            filter.push(Predicate::PriceAtMost(budget));
        }

        let text_terms = query
            .color
            .iter()
            .chain(query.trim.iter())
            .chain(query.body_type.iter())
            .chain(query.features.iter());
        for term in text_terms {
            filter.push(Predicate::TextLike(term.to_lowercase()));
        }

        filter
    }

    fn push(&mut self, predicate: Predicate) {
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn dealership_id(&self) -> Option<&str> {
        self.predicates.iter().find_map(|p| match p {
            Predicate::Dealership(id) => Some(id.as_str()),
            _ => None,
        })
    }

    /// True when SQL results still need [`matches`](Self::matches) applied.
    pub fn needs_post_filter(&self) -> bool {
        self.predicates
            .iter()
            .any(|p| matches!(p, Predicate::PriceAtMost(_)))
    }

    /// Render as a `WHERE` body over columns of `alias` (e.g. `"i"`), with
    /// `?` placeholders and their binds in order.
    pub fn to_sql(&self, alias: &str) -> (String, Vec<SqlParam>) {
        let col = |name: &str| format!("{}.{}", alias, name);
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        for predicate in &self.predicates {
            match predicate {
                Predicate::Dealership(id) => {
                    clauses.push(format!("{} = ?", col("dealership_id")));
                    params.push(SqlParam::Text(id.clone()));
                }
                Predicate::Active => {
                    clauses.push(format!("{} = ?", col("status")));
                    params.push(SqlParam::Text(VehicleStatus::Active.as_str().to_string()));
                }
                Predicate::MakeLike(make) => {
                    clauses.push(format!("LOWER({}) LIKE ? ESCAPE '\\'", col("make")));
                    params.push(SqlParam::Text(like_pattern(make)));
                }
                Predicate::ModelLike(model) => {
                    clauses.push(format!("LOWER({}) LIKE ? ESCAPE '\\'", col("model")));
                    params.push(SqlParam::Text(like_pattern(model)));
                }
                Predicate::YearBetween(min, max) => {
                    clauses.push(format!("{} BETWEEN ? AND ?", col("year")));
                    params.push(SqlParam::Int(*min));
                    params.push(SqlParam::Int(*max));
                }
                Predicate::YearAtLeast(min) => {
                    clauses.push(format!("{} >= ?", col("year")));
                    params.push(SqlParam::Int(*min));
                }
                Predicate::YearAtMost(max) => {
                    clauses.push(format!("{} <= ?", col("year")));
                    params.push(SqlParam::Int(*max));
                }
                // Free-text prices; applied by `matches` after the query
                Predicate::PriceAtMost(_) => {}
                Predicate::TextLike(term) => {
                    clauses.push(format!(
                        "LOWER(COALESCE({}, '') || ' ' || COALESCE({}, '')) LIKE ? ESCAPE '\\'",
                        col("description"),
                        col("features")
                    ));
                    params.push(SqlParam::Text(like_pattern(term)));
                }
            }
        }

        if clauses.is_empty() {
            ("1 = 1".to_string(), params)
        } else {
            (clauses.join(" AND "), params)
        }
    }

    /// Evaluate every predicate against one row.
    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        let text = vehicle.searchable_text();
        self.predicates.iter().all(|predicate| match predicate {
            Predicate::Dealership(id) => vehicle.dealership_id == *id,
            Predicate::Active => vehicle.status == VehicleStatus::Active,
            Predicate::MakeLike(make) => vehicle.make.to_lowercase().contains(make.as_str()),
            Predicate::ModelLike(model) => vehicle.model.to_lowercase().contains(model.as_str()),
            Predicate::YearBetween(min, max) => (*min..=*max).contains(&vehicle.year),
            Predicate::YearAtLeast(min) => vehicle.year >= *min,
            Predicate::YearAtMost(max) => vehicle.year <= *max,
            Predicate::PriceAtMost(budget) => vehicle.price_value().is_some_and(|p| p <= *budget),
            Predicate::TextLike(term) => text.contains(term.as_str()),
        })
    }
}

fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Attach `params` to `query` in order.
pub fn bind_params<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlParam],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlParam::Text(s) => query.bind(s.clone()),
            SqlParam::Int(n) => query.bind(*n),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::parse_message;

    fn vehicle(id: &str, make: &str, model: &str, year: i64, price: &str, desc: &str) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            dealership_id: "d1".to_string(),
            make: make.to_string(),
            model: model.to_string(),
            year,
            price: price.to_string(),
            mileage: Some(30000),
            description: Some(desc.to_string()),
            features: None,
            condition: Some("used".to_string()),
            status: VehicleStatus::Active,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_scope_only() {
        let filter = VehicleFilter::scope("d1");
        let (sql, params) = filter.to_sql("i");
        assert_eq!(sql, "i.dealership_id = ? AND i.status = ?");
        assert_eq!(
            params,
            vec![
                SqlParam::Text("d1".to_string()),
                SqlParam::Text("active".to_string())
            ]
        );
        assert_eq!(filter.dealership_id(), Some("d1"));
        assert!(!filter.needs_post_filter());
    }

    #[test]
    fn test_from_query_predicates() {
        let query = parse_message("white tiguan 2020-2022 under 32k");
        let filter = VehicleFilter::from_query("d1", &query);
        assert_eq!(
            filter.predicates(),
            &[
                Predicate::Dealership("d1".to_string()),
                Predicate::Active,
                Predicate::MakeLike("volkswagen".to_string()),
                Predicate::ModelLike("tiguan".to_string()),
                Predicate::YearBetween(2020, 2022),
                Predicate::PriceAtMost(32000.0),
                Predicate::TextLike("white".to_string()),
            ]
        );
        assert!(filter.needs_post_filter());
    }

    #[test]
    fn test_to_sql_skips_price_and_orders_params() {
        let query = parse_message("white tiguan 2020-2022 under 32k");
        let (sql, params) = VehicleFilter::from_query("d1", &query).to_sql("i");
        assert!(sql.contains("LOWER(i.make) LIKE ?"));
        assert!(sql.contains("i.year BETWEEN ? AND ?"));
        assert!(!sql.contains("price"));
        assert_eq!(sql.matches('?').count(), params.len());
        assert_eq!(params[2], SqlParam::Text("%volkswagen%".to_string()));
        assert_eq!(params[4], SqlParam::Int(2020));
        assert_eq!(params[5], SqlParam::Int(2022));
        assert_eq!(params[6], SqlParam::Text("%white%".to_string()));
    }

    #[test]
    fn test_duplicate_text_terms_collapsed() {
        // "hybrid" is both a trim and a feature
        let query = parse_message("rav4 hybrid");
        let filter = VehicleFilter::from_query("d1", &query);
        let text_terms = filter
            .predicates()
            .iter()
            .filter(|p| matches!(p, Predicate::TextLike(_)))
            .count();
        assert_eq!(text_terms, 1);
    }

    #[test]
    fn test_matches() {
        let query = parse_message("white tiguan under 32k");
        let filter = VehicleFilter::from_query("d1", &query);

        let good = vehicle("a", "Volkswagen", "Tiguan", 2021, "$29,500", "Pure White, AWD");
        assert!(filter.matches(&good));

        let pricey = vehicle("b", "Volkswagen", "Tiguan", 2021, "$35,000", "White");
        assert!(!filter.matches(&pricey));

        let tbd = vehicle("c", "Volkswagen", "Tiguan", 2021, "Call for price", "White");
        assert!(!filter.matches(&tbd));

        let black = vehicle("d", "Volkswagen", "Tiguan", 2021, "$25,000", "Deep black pearl");
        assert!(!filter.matches(&black));

        let mut other_dealer = good.clone();
        other_dealer.dealership_id = "d2".to_string();
        assert!(!filter.matches(&other_dealer));

        let mut sold = good.clone();
        sold.status = VehicleStatus::Sold;
        assert!(!filter.matches(&sold));
    }

    #[test]
    fn test_model_spelling_matches_inventory() {
        let crv = vehicle("a", "Honda", "CR-V", 2021, "$27,000", "");
        let filter = VehicleFilter::from_query("d1", &parse_message("looking for a crv"));
        assert!(filter.matches(&crv));

        let truck = vehicle("b", "Ford", "F-150", 2020, "$38,000", "");
        let filter = VehicleFilter::from_query("d1", &parse_message("need an f150"));
        assert!(filter.matches(&truck));
        assert!(!filter.matches(&crv));
    }

    #[test]
    fn test_year_bounds() {
        let v = vehicle("a", "Honda", "Civic", 2021, "$20,000", "");
        let mut filter = VehicleFilter::scope("d1");
        filter.push(Predicate::YearAtLeast(2022));
        assert!(!filter.matches(&v));

        let mut filter = VehicleFilter::scope("d1");
        filter.push(Predicate::YearAtMost(2021));
        assert!(filter.matches(&v));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("100%_x"), "%100\\%\\_x%");
    }
}
