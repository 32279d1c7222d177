//! Traits connecting user types to the engine.
//!
//! [`Seekable`] is implemented by the `#[derive(Seekable)]` macro (feature
//! `derive`) or by hand. [`SeekerEnum`] and [`SeekerTimestamp`] convert field
//! types the derive cannot read directly.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::schema::Schema;
use crate::value::{Timestamp, Value};

/// A record type that can be filtered, sorted, searched and paginated.
///
/// The schema describes which fields exist and what they hold; the accessor
/// returns the runtime value for one field name as declared in the schema.
///
/// # Manual Implementation
///
/// ```
/// use seekspec::{FieldDef, Number, Schema, Seekable, Value};
///
/// struct Task {
///     name: String,
///     priority: u8,
/// }
///
/// static TASK: Schema = Schema::new(
///     "Task",
///     &[FieldDef::string("name"), FieldDef::number("priority")],
/// );
///
/// impl Seekable for Task {
///     fn schema() -> &'static Schema {
///         &TASK
///     }
///
///     fn seeker_field_value(&self, field: &str) -> Value<'_> {
///         match field {
///             "name" => Value::String(&self.name),
///             "priority" => Value::Number(Number::from(self.priority)),
///             _ => Value::None,
///         }
///     }
/// }
///
/// assert!(Task::schema().is_valid("PRIORITY"));
/// ```
pub trait Seekable {
    /// Field descriptor table for this type.
    fn schema() -> &'static Schema
    where
        Self: Sized;

    /// Returns the value of a field, or [`Value::None`] for unknown or null
    /// fields. `field` is always the canonical name from the schema.
    fn seeker_field_value(&self, field: &str) -> Value<'_>;
}

/// Converts enum fields to stable discriminants.
///
/// `VARIANTS` lists variant names in discriminant order; filters may name a
/// variant (case-insensitive) or give its ordinal.
///
/// ```
/// use seekspec::SeekerEnum;
///
/// #[derive(Clone, Copy)]
/// enum Status {
///     Pending,
///     Active,
/// }
///
/// impl SeekerEnum for Status {
///     const VARIANTS: &'static [&'static str] = &["Pending", "Active"];
///
///     fn seeker_discriminant(&self) -> u32 {
///         match self {
///             Status::Pending => 0,
///             Status::Active => 1,
///         }
///     }
/// }
/// ```
pub trait SeekerEnum {
    const VARIANTS: &'static [&'static str] = &[];

    fn seeker_discriminant(&self) -> u32;
}

/// Converts date-time fields to [`Timestamp`]s.
pub trait SeekerTimestamp {
    fn seeker_timestamp(&self) -> Timestamp;
}

impl SeekerTimestamp for i64 {
    fn seeker_timestamp(&self) -> Timestamp {
        Timestamp::from_millis(*self)
    }
}

impl SeekerTimestamp for Timestamp {
    fn seeker_timestamp(&self) -> Timestamp {
        *self
    }
}

impl SeekerTimestamp for DateTime<Utc> {
    fn seeker_timestamp(&self) -> Timestamp {
        Timestamp::from(*self)
    }
}

impl SeekerTimestamp for NaiveDateTime {
    fn seeker_timestamp(&self) -> Timestamp {
        Timestamp::from_millis(self.and_utc().timestamp_millis())
    }
}

impl SeekerTimestamp for NaiveDate {
    fn seeker_timestamp(&self) -> Timestamp {
        Timestamp::from_millis(self.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;
    use crate::value::Number;

    struct Item {
        name: String,
        count: i32,
    }

    static ITEM: Schema = Schema::new(
        "Item",
        &[FieldDef::string("name"), FieldDef::number("count")],
    );

    impl Seekable for Item {
        fn schema() -> &'static Schema {
            &ITEM
        }

        fn seeker_field_value(&self, field: &str) -> Value<'_> {
            match field {
                "name" => Value::String(&self.name),
                "count" => Value::Number(Number::from(self.count)),
                _ => Value::None,
            }
        }
    }

    #[test]
    fn seekable_manual_impl() {
        let item = Item {
            name: "test".to_string(),
            count: 42,
        };

        assert_eq!(item.seeker_field_value("name"), Value::String("test"));
        assert_eq!(
            item.seeker_field_value("count"),
            Value::Number(Number::I64(42))
        );
        assert_eq!(item.seeker_field_value("unknown"), Value::None);
        assert_eq!(Item::schema().name, "Item");
    }

    #[test]
    fn chrono_timestamps() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        assert_eq!(date.seeker_timestamp(), Timestamp(86_400_000));

        let dt = date.and_hms_opt(0, 0, 1).unwrap();
        assert_eq!(dt.seeker_timestamp(), Timestamp(86_401_000));
        assert_eq!(dt.and_utc().seeker_timestamp(), Timestamp(86_401_000));
    }
}
