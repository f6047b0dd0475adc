//! Elementwise combination of same-typed records.
//!
//! `a.combine(&b, op)` starts from `a`'s assigned values (hidden included)
//! and, for every key `b` assigns, stores `op(a[key], b[key])`. Both records
//! must have the same concrete type; a shared parent is not enough.

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use crate::error::{ClassworkError, Result};
use crate::record::Record;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Take the right-hand value.
    Assign,
    Add,
    Sub,
    Mul,
    /// Division that always yields a float.
    TrueDiv,
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Assign => "assign",
            Operator::Add => "add",
            Operator::Sub => "sub",
            Operator::Mul => "mul",
            Operator::TrueDiv => "truediv",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Assign => "=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::TrueDiv => "/",
        }
    }

    /// Apply the operator to one attribute.
    pub fn apply(&self, key: &str, lhs: &Value, rhs: &Value) -> Result<Value> {
        let invalid = || ClassworkError::InvalidOperand {
            key: key.to_string(),
            op: self.name().to_string(),
            lhs: lhs.kind(),
            rhs: rhs.kind(),
        };

        match (self, lhs, rhs) {
            (Operator::Assign, _, rhs) => Ok(rhs.clone()),
            (Operator::Add, Value::Text(a), Value::Text(b)) => Ok(Value::Text(format!("{a}{b}"))),
            (Operator::Add, Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b).cloned().collect()))
            }
            (Operator::Add, Value::Int(a), Value::Int(b)) => {
                a.checked_add(*b).map(Value::Int).ok_or_else(invalid)
            }
            (Operator::Sub, Value::Int(a), Value::Int(b)) => {
                a.checked_sub(*b).map(Value::Int).ok_or_else(invalid)
            }
            (Operator::Mul, Value::Int(a), Value::Int(b)) => {
                a.checked_mul(*b).map(Value::Int).ok_or_else(invalid)
            }
            (op, lhs, rhs) => {
                let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                    return Err(invalid());
                };
                match op {
                    Operator::Add => Ok(Value::Float(a + b)),
                    Operator::Sub => Ok(Value::Float(a - b)),
                    Operator::Mul => Ok(Value::Float(a * b)),
                    Operator::TrueDiv if b == 0.0 => Err(invalid()),
                    Operator::TrueDiv => Ok(Value::Float(a / b)),
                    Operator::Assign => Ok(rhs.clone()),
                }
            }
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operator {
    type Err = ClassworkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" | "assign" => Ok(Operator::Assign),
            "+" | "add" => Ok(Operator::Add),
            "-" | "sub" => Ok(Operator::Sub),
            "*" | "mul" => Ok(Operator::Mul),
            "/" | "truediv" => Ok(Operator::TrueDiv),
            other => Err(ClassworkError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl Record {
    /// Combine two records of the same concrete type into a new one.
    ///
    /// Without an explicit operator, `other`'s type default is used.
    pub fn combine(&self, other: &Record, operator: Option<Operator>) -> Result<Record> {
        if self.type_tag() != other.type_tag() {
            return Err(ClassworkError::TypeMismatch {
                expected: self.type_tag().to_string(),
                found: vec![other.type_tag().to_string()],
            });
        }

        let op = operator.unwrap_or_else(|| other.record_type().default_operator());

        let mut merged = self.project(false, true);
        for (key, rhs) in other.project(false, false) {
            let value = op.apply(&key, self.get(&key)?, &rhs)?;
            merged.insert(key, value);
        }

        Ok(Record::from_params(self.record_type(), merged))
    }

    /// [`Record::combine`] with the operator given by name or symbol.
    pub fn combine_with(&self, other: &Record, operator: &str) -> Result<Record> {
        self.combine(other, Some(operator.parse()?))
    }
}

impl Add for &Record {
    type Output = Result<Record>;

    fn add(self, other: &Record) -> Result<Record> {
        self.combine(other, Some(Operator::Add))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RecordType;
    use std::sync::Arc;

    fn rates() -> Arc<RecordType> {
        RecordType::builder("tests.combinator.Rates")
            .field("growth", 1.0)
            .field("count", 10)
            .field("label", "base")
            .operator(Operator::Assign)
            .build()
            .unwrap()
    }

    fn record(ty: &Arc<RecordType>, entries: &[(&str, Value)]) -> Record {
        let mut r = Record::new(ty);
        for (k, v) in entries {
            r.set(*k, v.clone());
        }
        r
    }

    #[test]
    fn parses_names_and_symbols() {
        for (input, expected) in [
            ("=", Operator::Assign),
            ("assign", Operator::Assign),
            ("+", Operator::Add),
            ("add", Operator::Add),
            ("-", Operator::Sub),
            ("sub", Operator::Sub),
            ("*", Operator::Mul),
            ("mul", Operator::Mul),
            ("/", Operator::TrueDiv),
            ("truediv", Operator::TrueDiv),
        ] {
            assert_eq!(input.parse::<Operator>().unwrap(), expected);
        }
    }

    #[test]
    fn unknown_operator_is_unsupported() {
        let err = "pow".parse::<Operator>().unwrap_err();
        assert!(matches!(err, ClassworkError::UnsupportedOperator(op) if op == "pow"));
    }

    #[test]
    fn add_combines_keys_present_in_other() {
        let ty = rates();
        let a = record(&ty, &[("growth", Value::Float(0.5)), ("count", Value::Int(3))]);
        let b = record(&ty, &[("count", Value::Int(4))]);

        let c = a.combine_with(&b, "add").unwrap();
        assert_eq!(c.get("count").unwrap(), &Value::Int(7));
        assert_eq!(c.get("growth").unwrap(), &Value::Float(0.5));
    }

    #[test]
    fn missing_left_value_uses_declared_default() {
        let ty = rates();
        let a = Record::new(&ty);
        let b = record(&ty, &[("count", Value::Int(5))]);

        let c = a.combine(&b, Some(Operator::Add)).unwrap();
        assert_eq!(c.get("count").unwrap(), &Value::Int(15));
    }

    #[test]
    fn arithmetic_operators() {
        let ty = rates();
        let a = record(&ty, &[("growth", Value::Float(3.0)), ("count", Value::Int(9))]);
        let b = record(&ty, &[("growth", Value::Float(2.0)), ("count", Value::Int(2))]);

        let sub = a.combine(&b, Some(Operator::Sub)).unwrap();
        assert_eq!(sub.get("growth").unwrap(), &Value::Float(1.0));
        assert_eq!(sub.get("count").unwrap(), &Value::Int(7));

        let mul = a.combine(&b, Some(Operator::Mul)).unwrap();
        assert_eq!(mul.get("count").unwrap(), &Value::Int(18));

        let div = a.combine(&b, Some(Operator::TrueDiv)).unwrap();
        assert_eq!(div.get("count").unwrap(), &Value::Float(4.5));
        assert_eq!(div.get("growth").unwrap(), &Value::Float(1.5));
    }

    #[test]
    fn mixed_numbers_promote_to_float() {
        assert_eq!(
            Operator::Add.apply("k", &Value::Int(1), &Value::Float(0.5)).unwrap(),
            Value::Float(1.5)
        );
    }

    #[test]
    fn add_concatenates_text_and_lists() {
        assert_eq!(
            Operator::Add
                .apply("k", &Value::from("ab"), &Value::from("cd"))
                .unwrap(),
            Value::from("abcd")
        );
        assert_eq!(
            Operator::Add
                .apply("k", &Value::from(vec![1]), &Value::from(vec![2]))
                .unwrap(),
            Value::from(vec![1, 2])
        );
    }

    #[test]
    fn assign_takes_right_value() {
        let ty = rates();
        let a = record(&ty, &[("label", Value::from("left"))]);
        let b = record(&ty, &[("label", Value::from("right"))]);

        let c = a.combine(&b, None).unwrap();
        assert_eq!(c.get("label").unwrap(), &Value::from("right"));
    }

    #[test]
    fn division_by_zero_is_invalid() {
        let err = Operator::TrueDiv
            .apply("count", &Value::Int(1), &Value::Int(0))
            .unwrap_err();
        assert!(matches!(err, ClassworkError::InvalidOperand { key, .. } if key == "count"));
    }

    #[test]
    fn non_numeric_operands_are_invalid() {
        let ty = rates();
        let a = record(&ty, &[("label", Value::from("x"))]);
        let b = record(&ty, &[("label", Value::from("y"))]);
        assert!(a.combine(&b, Some(Operator::Mul)).is_err());
        assert!(Operator::Add
            .apply("k", &Value::Unset, &Value::Int(1))
            .is_err());
    }

    #[test]
    fn structural_twins_do_not_combine() {
        let ty = rates();
        let twin = RecordType::builder("tests.combinator.RatesTwin")
            .field("growth", 1.0)
            .field("count", 10)
            .field("label", "base")
            .build()
            .unwrap();

        let err = Record::new(&ty)
            .combine(&Record::new(&twin), Some(Operator::Add))
            .unwrap_err();
        assert!(matches!(err, ClassworkError::TypeMismatch { .. }));
    }

    #[test]
    fn subtype_does_not_combine_with_parent() {
        let ty = rates();
        let child = RecordType::builder("tests.combinator.ChildRates")
            .extends(&ty)
            .build()
            .unwrap();
        assert!(Record::new(&ty)
            .combine(&Record::new(&child), None)
            .is_err());
    }

    #[test]
    fn plus_operator_adds() {
        let ty = rates();
        let a = record(&ty, &[("count", Value::Int(1))]);
        let b = record(&ty, &[("count", Value::Int(2))]);

        let c = (&a + &b).unwrap();
        assert_eq!(c.get("count").unwrap(), &Value::Int(3));
        assert_eq!(c.type_tag(), a.type_tag());
    }

    #[test]
    fn default_operator_comes_from_type() {
        let ty = RecordType::builder("tests.combinator.Additive")
            .field("n", 0)
            .operator(Operator::Add)
            .build()
            .unwrap();
        let a = record(&ty, &[("n", Value::Int(2))]);
        let b = record(&ty, &[("n", Value::Int(3))]);

        assert_eq!(a.combine(&b, None).unwrap().get("n").unwrap(), &Value::Int(5));
    }

    #[test]
    fn hidden_values_of_left_survive() {
        let ty = rates();
        let mut a = Record::new(&ty);
        a.set("note", "kept");
        let b = record(&ty, &[("count", Value::Int(1))]);

        let c = a.combine(&b, Some(Operator::Add)).unwrap();
        assert_eq!(c.project(false, true).get("note"), Some(&Value::from("kept")));
    }

    #[test]
    fn inputs_are_untouched() {
        let ty = rates();
        let a = record(&ty, &[("count", Value::Int(1))]);
        let b = record(&ty, &[("count", Value::Int(2))]);
        let _ = a.combine(&b, Some(Operator::Add)).unwrap();

        assert_eq!(a.get("count").unwrap(), &Value::Int(1));
        assert_eq!(b.get("count").unwrap(), &Value::Int(2));
    }
}
