//! Pairwise key comparison.
//!
//! [`keymatch`] decides whether a query key matches an index key when either
//! side may be a single value, a half-open range or a collection. The first
//! applicable rule decides:
//!
//! | # | Operands | Result |
//! |---|----------|--------|
//! | 1 | either is `Unset` | `true` (wildcard) |
//! | 2 | both scalars | equality |
//! | 3 | either is a range | the other operand lies in the range |
//! | 4 | one scalar, one list/map | the scalar is among the elements (map values) |
//! | 5 | both lists | the lists share an element |
//! | 6 | anything else | `false`, with a warning |
//!
//! Rule 6 degrades a filter rather than aborting it: a malformed index shape
//! drops the entry from a selection and is reported under the
//! `classwork::matcher` tracing target.

use tracing::warn;

use crate::value::Value;

/// Total, order-independent key comparison.
pub fn keymatch(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Unset, _) | (_, Value::Unset) => true,
        (x, y) if x.is_scalar() && y.is_scalar() => x.loose_eq(y),
        (Value::Range(range), other) | (other, Value::Range(range)) => {
            if !other.is_scalar() {
                unsupported(x, y);
                return false;
            }
            range.contains(other)
        }
        (scalar, collection) | (collection, scalar)
            if scalar.is_scalar() && collection.is_collection() =>
        {
            contains(collection, scalar)
        }
        (Value::List(xs), Value::List(ys)) => xs.iter().any(|a| ys.iter().any(|b| a.loose_eq(b))),
        _ => {
            unsupported(x, y);
            false
        }
    }
}

fn contains(collection: &Value, scalar: &Value) -> bool {
    match collection {
        Value::List(items) => items.iter().any(|item| item.loose_eq(scalar)),
        Value::Map(map) => map.values().any(|item| item.loose_eq(scalar)),
        _ => false,
    }
}

fn unsupported(x: &Value, y: &Value) {
    warn!(
        target: "classwork::matcher",
        lhs = x.kind(),
        rhs = y.kind(),
        "unsure what to do with this pair of key shapes; treating as no match"
    );
}
