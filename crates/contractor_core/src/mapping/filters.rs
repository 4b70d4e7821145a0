//! Dynamic filter fragments paired with their argument bag.
//!
//! # Invariants
//! - Generated keys are `filter<N>` where `N` is the bag size at append time.
//! - Absent values append nothing: no predicate text and no argument.
//! - Pagination is always appended and binds `:limit` / `:offset`.

use super::values::timestamp_value;
use super::{MapError, MapResult, NamedArgs, Pagination};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use rusqlite::types::Value;
use serde::Serialize;

/// Pattern placeholder replaced by the escaped filter value.
const PATTERN_SLOT: &str = "{}";

/// Prefix search: `value%`.
pub const LIKE_PREFIX: &str = "{}%";
/// Substring search: `%value%`.
pub const LIKE_CONTAINS: &str = "%{}%";

/// Inclusive timestamp range; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateFilter {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    /// Widens bounds to whole days: `from` to 00:00:00, `to` to the last
    /// microsecond of its day.
    pub fn with_time(&self) -> Self {
        Self {
            from: self.from.and_then(|from| at_time(&from, 0, 0, 0, 0)),
            to: self.to.and_then(|to| at_time(&to, 23, 59, 59, 999_999)),
        }
    }
}

fn at_time(value: &DateTime<Utc>, hour: u32, min: u32, sec: u32, micro: u32) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_micro_opt(hour, min, sec, micro)?;
    Some(Utc.from_utc_datetime(&value.date_naive().and_time(time)))
}

/// Escapes LIKE metacharacters so they match literally under `escape '\'`.
///
/// Backslash goes first so the escapes added for `%` and `_` survive.
pub fn escape_like_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Owns one filter fragment and the argument bag feeding it.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    fragment: String,
    args: NamedArgs,
}

impl FilterBuilder {
    /// Starts a fragment, typically ` where 1=1 ...`.
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_args(base, NamedArgs::new())
    }

    /// Starts a fragment whose bag already holds fixed named arguments.
    pub fn with_args(base: impl Into<String>, args: NamedArgs) -> Self {
        Self {
            fragment: base.into(),
            args,
        }
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn args(&self) -> &NamedArgs {
        &self.args
    }

    pub fn into_parts(self) -> (String, NamedArgs) {
        (self.fragment, self.args)
    }

    /// Appends literal SQL (ordering, grouping) without arguments.
    pub fn push_sql(&mut self, sql: &str) -> &mut Self {
        self.fragment.push_str(sql);
        self
    }

    pub fn equals<V: Into<Value>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        let Some(value) = value else {
            return self;
        };
        let key = self.bind(value.into());
        self.fragment.push_str(&format!(" and {column}=:{key}"));
        self
    }

    /// Null-safe inequality: rows with a `NULL` column still match.
    pub fn not_equals<V: Into<Value>>(&mut self, column: &str, value: Option<V>) -> &mut Self {
        let Some(value) = value else {
            return self;
        };
        let key = self.bind(value.into());
        self.fragment
            .push_str(&format!(" and ({column} is null or {column}<>:{key})"));
        self
    }

    /// Case-insensitive LIKE; `pattern` holds `{}` where the escaped,
    /// upper-cased value goes (see [`LIKE_PREFIX`], [`LIKE_CONTAINS`]).
    pub fn like(&mut self, column: &str, value: Option<&str>, pattern: &str) -> &mut Self {
        let Some(value) = value else {
            return self;
        };
        let escaped = escape_like_value(&value.to_uppercase());
        let key = self.bind(Value::Text(pattern.replacen(PATTERN_SLOT, &escaped, 1)));
        self.fragment
            .push_str(&format!(" and unicode_upper({column}) like :{key} escape '\\'"));
        self
    }

    /// Membership in a list bound as one JSON array argument.
    ///
    /// # Errors
    /// - [`MapError::Encode`] when the list cannot be serialized.
    pub fn in_list<V: Serialize>(
        &mut self,
        column: &str,
        values: Option<&[V]>,
    ) -> MapResult<&mut Self> {
        let Some(values) = values else {
            return Ok(self);
        };
        let key = self.bind(json_array(values)?);
        self.fragment.push_str(&format!(
            " and {column} in (select value from json_each(:{key}))"
        ));
        Ok(self)
    }

    /// Non-membership in a list bound as one JSON array argument.
    ///
    /// # Errors
    /// - [`MapError::Encode`] when the list cannot be serialized.
    pub fn not_in_list<V: Serialize>(
        &mut self,
        column: &str,
        values: Option<&[V]>,
    ) -> MapResult<&mut Self> {
        let Some(values) = values else {
            return Ok(self);
        };
        let key = self.bind(json_array(values)?);
        self.fragment.push_str(&format!(
            " and {column} not in (select value from json_each(:{key}))"
        ));
        Ok(self)
    }

    pub fn date(&mut self, column: &str, value: Option<&DateFilter>) -> &mut Self {
        let Some(value) = value else {
            return self;
        };

        if let (Some(from), Some(to)) = (value.from, value.to) {
            if from == to {
                let key = self.bind(timestamp_value(&from));
                self.fragment.push_str(&format!(" and {column} = :{key}"));
                return self;
            }
        }

        if let Some(from) = value.from {
            let key = self.bind(timestamp_value(&from));
            self.fragment.push_str(&format!(" and {column} >= :{key}"));
        }
        if let Some(to) = value.to {
            let key = self.bind(timestamp_value(&to));
            self.fragment.push_str(&format!(" and {column} <= :{key}"));
        }
        self
    }

    pub fn paginate(&mut self, pagination: &Pagination) -> &mut Self {
        self.args
            .insert("limit".to_string(), Value::Integer(pagination.limit()));
        self.args
            .insert("offset".to_string(), Value::Integer(pagination.offset()));
        self.fragment.push_str(" limit :limit offset :offset");
        self
    }

    fn bind(&mut self, value: Value) -> String {
        let key = format!("filter{}", self.args.len());
        self.args.insert(key.clone(), value);
        key
    }
}

fn json_array<V: Serialize>(values: &[V]) -> MapResult<Value> {
    serde_json::to_string(values)
        .map(Value::Text)
        .map_err(|err| MapError::Encode(format!("list filter value: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{escape_like_value, DateFilter, FilterBuilder, LIKE_CONTAINS, LIKE_PREFIX};
    use crate::mapping::Pagination;
    use chrono::{TimeZone, Utc};
    use rusqlite::types::Value;

    const BASE: &str = " where 1=1";

    #[test]
    fn absent_equals_leaves_builder_unchanged() {
        let mut builder = FilterBuilder::new(BASE);
        builder.equals::<i64>("c.id", None);
        builder.not_equals::<String>("c.bin", None);
        builder.like("c.name", None, LIKE_PREFIX);
        builder.date("c.block_date", None);
        builder.in_list::<i64>("c.id", None).unwrap();

        assert_eq!(builder.fragment(), BASE);
        assert!(builder.args().is_empty());
    }

    #[test]
    fn keys_follow_bag_size() {
        let mut builder = FilterBuilder::new(BASE);
        builder
            .equals("c.bin", Some("123".to_string()))
            .not_equals("c.status", Some("BLOCK".to_string()));

        assert_eq!(
            builder.fragment(),
            " where 1=1 and c.bin=:filter0 and (c.status is null or c.status<>:filter1)"
        );
        assert_eq!(builder.args()["filter0"], Value::Text("123".into()));
        assert_eq!(builder.args()["filter1"], Value::Text("BLOCK".into()));
    }

    #[test]
    fn like_escapes_metacharacters_after_upper_casing() {
        let mut builder = FilterBuilder::new(BASE);
        builder.like("c.name", Some(r"a%b_c\d"), LIKE_PREFIX);

        assert_eq!(
            builder.fragment(),
            " where 1=1 and unicode_upper(c.name) like :filter0 escape '\\'"
        );
        assert_eq!(
            builder.args()["filter0"],
            Value::Text(r"A\%B\_C\\D%".to_string())
        );
    }

    #[test]
    fn like_contains_wraps_both_sides() {
        let mut builder = FilterBuilder::new(BASE);
        builder.like("c.email", Some("acme"), LIKE_CONTAINS);
        assert_eq!(builder.args()["filter0"], Value::Text("%ACME%".into()));
    }

    #[test]
    fn escape_handles_backslash_first() {
        assert_eq!(escape_like_value(r"\%"), r"\\\%");
        assert_eq!(escape_like_value("plain"), "plain");
    }

    #[test]
    fn list_filters_bind_json_arrays() {
        let mut builder = FilterBuilder::new(BASE);
        builder
            .in_list("c.id", Some(&[1_i64, 2, 3][..]))
            .unwrap()
            .not_in_list("c.status", Some(&["BLOCK"][..]))
            .unwrap();

        assert_eq!(
            builder.fragment(),
            " where 1=1 and c.id in (select value from json_each(:filter0)) \
             and c.status not in (select value from json_each(:filter1))"
        );
        assert_eq!(builder.args()["filter0"], Value::Text("[1,2,3]".into()));
        assert_eq!(builder.args()["filter1"], Value::Text(r#"["BLOCK"]"#.into()));
    }

    #[test]
    fn date_filter_with_equal_bounds_emits_single_equality() {
        let day = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut builder = FilterBuilder::new(BASE);
        builder.date("c.block_date", Some(&DateFilter::new(Some(day), Some(day))));

        assert_eq!(builder.fragment(), " where 1=1 and c.block_date = :filter0");
        assert_eq!(builder.args().len(), 1);
    }

    #[test]
    fn date_filter_bounds_are_independent() {
        let from = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();

        let mut both = FilterBuilder::new(BASE);
        both.date("d", Some(&DateFilter::new(Some(from), Some(to))));
        assert_eq!(both.fragment(), " where 1=1 and d >= :filter0 and d <= :filter1");

        let mut upper_only = FilterBuilder::new(BASE);
        upper_only.date("d", Some(&DateFilter::new(None, Some(to))));
        assert_eq!(upper_only.fragment(), " where 1=1 and d <= :filter0");

        let mut open = FilterBuilder::new(BASE);
        open.date("d", Some(&DateFilter::default()));
        assert_eq!(open.fragment(), BASE);
    }

    #[test]
    fn with_time_widens_to_whole_days() {
        let from = Utc.with_ymd_and_hms(2024, 1, 2, 13, 30, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap();
        let widened = DateFilter::new(Some(from), Some(to)).with_time();

        assert_eq!(
            widened.from,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
        let end = widened.to.unwrap();
        assert_eq!(end.date_naive(), to.date_naive());
        assert!(end > Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 59).unwrap());
    }

    #[test]
    fn pagination_is_always_appended() {
        let mut builder = FilterBuilder::new(BASE);
        builder
            .push_sql(" order by c.id desc")
            .paginate(&Pagination::new(2, 10).with_external_total(5));

        assert_eq!(
            builder.fragment(),
            " where 1=1 order by c.id desc limit :limit offset :offset"
        );
        assert_eq!(builder.args()["limit"], Value::Integer(10));
        assert_eq!(builder.args()["offset"], Value::Integer(15));
    }
}
