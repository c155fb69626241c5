//! Query-string filters for list pages
//!
//! Each filter is parsed from its raw query parameters once (rejecting bad
//! input with field errors) and then appends its predicates to a
//! `QueryBuilder`. An empty filter appends nothing, so the list shows every
//! record.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::error::{AppError, FieldErrors, Result};
use crate::models::marketplace::Category;
use crate::models::tennis::{GENDERS, LANGUAGES, LEVELS};

/// Value meaning "no preference" in the tennis select boxes
pub const ANY: &str = "A";

/// Tracks whether the next predicate opens the WHERE clause
pub struct Predicates<'qb, 'args> {
    qb: &'qb mut QueryBuilder<'args, Postgres>,
    empty: bool,
}

impl<'qb, 'args> Predicates<'qb, 'args> {
    pub fn new(qb: &'qb mut QueryBuilder<'args, Postgres>) -> Self {
        Self { qb, empty: true }
    }

    /// Start a new `AND`-joined predicate and return the builder to extend it
    pub fn and(&mut self) -> &mut QueryBuilder<'args, Postgres> {
        self.qb.push(if self.empty { " WHERE " } else { " AND " });
        self.empty = false;
        self.qb
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `ILIKE` pattern matching `needle` anywhere, with wildcards escaped
pub fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn parse_date(field: &str, value: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors
                .entry(field.to_string())
                .or_default()
                .push("Enter a valid date (YYYY-MM-DD).".to_string());
            None
        }
    }
}

fn finish<T>(value: T, errors: FieldErrors) -> Result<T> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(AppError::Validation(errors))
    }
}

// ---------------------------------------------------------------------------
// Parenting / laika keyword search
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct PostSearchParams {
    pub search_words: Option<String>,
    pub search_field: Option<String>,
    pub search_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Description,
}

impl SearchField {
    fn column(self) -> &'static str {
        match self {
            SearchField::Title => "p.title",
            SearchField::Description => "p.description",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PostSearch {
    pub words: Option<(SearchField, String)>,
    pub since: Option<NaiveDate>,
}

impl TryFrom<PostSearchParams> for PostSearch {
    type Error = AppError;

    fn try_from(params: PostSearchParams) -> Result<Self> {
        let mut errors = FieldErrors::new();

        let field = match non_empty(params.search_field).as_deref() {
            None | Some("title") => Some(SearchField::Title),
            Some("description") => Some(SearchField::Description),
            Some(other) => {
                errors.insert(
                    "search_field".into(),
                    vec![format!("Select a valid choice. {other} is not one of the available choices.")],
                );
                None
            }
        };

        let words = non_empty(params.search_words).zip(field).map(|(w, f)| (f, w));
        let since = non_empty(params.search_date)
            .and_then(|d| parse_date("search_date", &d, &mut errors));

        finish(Self { words, since }, errors)
    }
}

impl PostSearch {
    pub fn is_empty(&self) -> bool {
        self.words.is_none() && self.since.is_none()
    }

    /// Append predicates against a post table aliased `p` with a `created_at` column
    pub fn push_predicates(&self, preds: &mut Predicates<'_, '_>) {
        if let Some((field, words)) = &self.words {
            preds
                .and()
                .push(field.column())
                .push(" ILIKE ")
                .push_bind(contains_pattern(words));
        }
        if let Some(since) = self.since {
            preds.and().push("p.created_at::date >= ").push_bind(since);
        }
    }
}

// ---------------------------------------------------------------------------
// Marketplace
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct MarketplaceSearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MarketplaceSearch {
    pub query: Option<String>,
    pub category: Option<Category>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub location: Option<String>,
}

fn parse_price(field: &str, value: Option<String>, errors: &mut FieldErrors) -> Option<Decimal> {
    let raw = non_empty(value)?;
    match raw.parse::<Decimal>() {
        Ok(price) if price >= Decimal::ZERO => Some(price),
        _ => {
            errors
                .entry(field.to_string())
                .or_default()
                .push("Enter a non-negative number.".to_string());
            None
        }
    }
}

impl TryFrom<MarketplaceSearchParams> for MarketplaceSearch {
    type Error = AppError;

    fn try_from(params: MarketplaceSearchParams) -> Result<Self> {
        let mut errors = FieldErrors::new();

        let category = match non_empty(params.category) {
            None => None,
            Some(raw) => match raw.parse::<Category>() {
                Ok(c) => Some(c),
                Err(msg) => {
                    errors.insert("category".into(), vec![msg]);
                    None
                }
            },
        };

        let min_price = parse_price("min_price", params.min_price, &mut errors);
        let max_price = parse_price("max_price", params.max_price, &mut errors);
        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                errors
                    .entry("max_price".into())
                    .or_default()
                    .push("Maximum price must not be below the minimum price.".into());
            }
        }

        finish(
            Self {
                query: non_empty(params.q),
                category,
                min_price,
                max_price,
                location: non_empty(params.location),
            },
            errors,
        )
    }
}

impl MarketplaceSearch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Append predicates against `marketplace_items p`
    pub fn push_predicates(&self, preds: &mut Predicates<'_, '_>) {
        if let Some(q) = &self.query {
            let pattern = contains_pattern(q);
            preds
                .and()
                .push("(p.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(category) = self.category {
            preds.and().push("p.category = ").push_bind(category.as_str());
        }
        if let Some(min) = self.min_price {
            preds.and().push("p.price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            preds.and().push("p.price <= ").push_bind(max);
        }
        if let Some(location) = &self.location {
            preds
                .and()
                .push("p.location ILIKE ")
                .push_bind(contains_pattern(location));
        }
    }
}

// ---------------------------------------------------------------------------
// Tennis partner search
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct TennisSearchParams {
    pub start_age: Option<String>,
    pub end_age: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub level: Option<String>,
    pub language: Option<String>,
    pub gender: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct TennisSearch {
    pub start_age: Option<u32>,
    pub end_age: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub location: Option<String>,
    pub level: Option<String>,
    pub language: Option<String>,
    pub gender: Option<String>,
}

const MAX_AGE: u32 = 120;

fn parse_age(field: &str, value: Option<String>, errors: &mut FieldErrors) -> Option<u32> {
    let raw = non_empty(value)?;
    match raw.parse::<u32>() {
        Ok(age) if age <= MAX_AGE => Some(age),
        _ => {
            errors
                .entry(field.to_string())
                .or_default()
                .push(format!("Enter a whole number between 0 and {MAX_AGE}."));
            None
        }
    }
}

fn parse_choice(
    field: &str,
    value: Option<String>,
    valid: impl Fn(&str) -> bool,
    errors: &mut FieldErrors,
) -> Option<String> {
    let raw = non_empty(value).filter(|v| v != ANY)?;
    if valid(&raw) {
        Some(raw)
    } else {
        errors.insert(
            field.to_string(),
            vec![format!("Select a valid choice. {raw} is not one of the available choices.")],
        );
        None
    }
}

impl TryFrom<TennisSearchParams> for TennisSearch {
    type Error = AppError;

    fn try_from(params: TennisSearchParams) -> Result<Self> {
        let mut errors = FieldErrors::new();

        let start_age = parse_age("start_age", params.start_age, &mut errors);
        let end_age = parse_age("end_age", params.end_age, &mut errors);
        if let (Some(start), Some(end)) = (start_age, end_age) {
            if start > end {
                errors
                    .entry("end_age".into())
                    .or_default()
                    .push("End age must not be below start age.".into());
            }
        }

        let start_date = non_empty(params.start_date)
            .and_then(|d| parse_date("start_date", &d, &mut errors));
        let end_date =
            non_empty(params.end_date).and_then(|d| parse_date("end_date", &d, &mut errors));

        let search = Self {
            start_age,
            end_age,
            start_date,
            end_date,
            location: non_empty(params.location),
            level: parse_choice("level", params.level, |v| LEVELS.contains(v), &mut errors),
            language: parse_choice(
                "language",
                params.language,
                |v| LANGUAGES.contains(v),
                &mut errors,
            ),
            gender: parse_choice("gender", params.gender, |v| GENDERS.contains(v), &mut errors),
        };

        finish(search, errors)
    }
}

/// Inclusive birth-date bounds for players aged `start_age..=end_age` in `today`'s year.
///
/// `start_age` bounds the latest birth date (Dec 31 of `year - start_age`),
/// `end_age` the earliest (Jan 1 of `year - end_age - 1`).
pub fn birth_window(
    today: NaiveDate,
    start_age: Option<u32>,
    end_age: Option<u32>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let year = today.year();
    let earliest = end_age.and_then(|age| NaiveDate::from_ymd_opt(year - age as i32 - 1, 1, 1));
    let latest = start_age.and_then(|age| NaiveDate::from_ymd_opt(year - age as i32, 12, 31));
    (earliest, latest)
}

impl TennisSearch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Append predicates against `tennis_posts p`; ages are relative to `today`
    pub fn push_predicates(&self, preds: &mut Predicates<'_, '_>, today: NaiveDate) {
        let (earliest, latest) = birth_window(today, self.start_age, self.end_age);
        if let Some(earliest) = earliest {
            preds.and().push("p.birth_date >= ").push_bind(earliest);
        }
        if let Some(latest) = latest {
            preds.and().push("p.birth_date <= ").push_bind(latest);
        }
        if let Some(start) = self.start_date {
            preds.and().push("p.play_date::date >= ").push_bind(start);
        }
        if let Some(end) = self.end_date {
            preds.and().push("p.play_date::date <= ").push_bind(end);
        }
        if let Some(location) = &self.location {
            preds
                .and()
                .push("p.club_name ILIKE ")
                .push_bind(contains_pattern(location));
        }
        if let Some(level) = &self.level {
            preds.and().push("p.level = ").push_bind(level.clone());
        }
        if let Some(language) = &self.language {
            preds.and().push("p.language = ").push_bind(language.clone());
        }
        if let Some(gender) = &self.gender {
            preds.and().push("p.user_gender = ").push_bind(gender.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(push: impl FnOnce(&mut Predicates<'_, '_>)) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT p.* FROM t p");
        {
            let mut preds = Predicates::new(&mut qb);
            push(&mut preds);
        }
        qb.sql().to_string()
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn empty_post_search_adds_no_where_clause() {
        let search = PostSearch::try_from(PostSearchParams::default()).unwrap();
        assert!(search.is_empty());
        assert_eq!(render(|p| search.push_predicates(p)), "SELECT p.* FROM t p");
    }

    #[test]
    fn post_search_by_description_and_date() {
        let search = PostSearch::try_from(PostSearchParams {
            search_words: Some("sleep".into()),
            search_field: Some("description".into()),
            search_date: Some("2024-03-01".into()),
        })
        .unwrap();

        assert_eq!(
            search.since,
            Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert_eq!(
            render(|p| search.push_predicates(p)),
            "SELECT p.* FROM t p WHERE p.description ILIKE $1 AND p.created_at::date >= $2"
        );
    }

    #[test]
    fn post_search_rejects_unknown_field_and_bad_date() {
        let err = PostSearch::try_from(PostSearchParams {
            search_words: Some("x".into()),
            search_field: Some("author".into()),
            search_date: Some("yesterday".into()),
        })
        .unwrap_err();

        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("search_field"));
                assert!(fields.contains_key("search_date"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blank_words_are_ignored() {
        let search = PostSearch::try_from(PostSearchParams {
            search_words: Some("   ".into()),
            search_field: Some("title".into()),
            search_date: None,
        })
        .unwrap();
        assert!(search.is_empty());
    }

    #[test]
    fn marketplace_price_range_and_category() {
        let search = MarketplaceSearch::try_from(MarketplaceSearchParams {
            q: Some("bike".into()),
            category: Some("vehicles".into()),
            min_price: Some("10".into()),
            max_price: Some("99.50".into()),
            location: None,
        })
        .unwrap();

        assert_eq!(
            render(|p| search.push_predicates(p)),
            "SELECT p.* FROM t p WHERE (p.title ILIKE $1 OR p.description ILIKE $2) \
             AND p.category = $3 AND p.price >= $4 AND p.price <= $5"
        );
    }

    #[test]
    fn marketplace_rejects_inverted_range_and_unknown_category() {
        let err = MarketplaceSearch::try_from(MarketplaceSearchParams {
            category: Some("boats".into()),
            min_price: Some("100".into()),
            max_price: Some("5".into()),
            ..Default::default()
        })
        .unwrap_err();

        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("category"));
                assert!(fields.contains_key("max_price"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn birth_window_matches_age_range() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let (earliest, latest) = birth_window(today, Some(20), Some(30));
        assert_eq!(earliest, NaiveDate::from_ymd_opt(1993, 1, 1));
        assert_eq!(latest, NaiveDate::from_ymd_opt(2004, 12, 31));

        let (earliest, latest) = birth_window(today, None, Some(30));
        assert!(latest.is_none());
        assert!(earliest.is_some());
    }

    #[test]
    fn tennis_any_means_no_filter() {
        let search = TennisSearch::try_from(TennisSearchParams {
            level: Some(ANY.into()),
            language: Some(ANY.into()),
            gender: Some(ANY.into()),
            location: Some(String::new()),
            ..Default::default()
        })
        .unwrap();
        assert!(search.is_empty());
    }

    #[test]
    fn tennis_full_search_sql() {
        let search = TennisSearch::try_from(TennisSearchParams {
            start_age: Some("20".into()),
            end_age: Some("30".into()),
            start_date: Some("2024-07-01".into()),
            end_date: Some("2024-07-31".into()),
            location: Some("Rot-Weiss".into()),
            level: Some("3".into()),
            language: Some("2".into()),
            gender: Some("F".into()),
        })
        .unwrap();

        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(
            render(|p| search.push_predicates(p, today)),
            "SELECT p.* FROM t p WHERE p.birth_date >= $1 AND p.birth_date <= $2 \
             AND p.play_date::date >= $3 AND p.play_date::date <= $4 \
             AND p.club_name ILIKE $5 AND p.level = $6 AND p.language = $7 AND p.user_gender = $8"
        );
    }

    #[test]
    fn tennis_rejects_bad_choices_and_ages() {
        let err = TennisSearch::try_from(TennisSearchParams {
            start_age: Some("40".into()),
            end_age: Some("20".into()),
            level: Some("9".into()),
            ..Default::default()
        })
        .unwrap_err();

        match err {
            AppError::Validation(fields) => {
                assert!(fields.contains_key("end_age"));
                assert!(fields.contains_key("level"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
