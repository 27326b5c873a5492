//! Metadata restriction engine: a conjunction of disjunctions of column
//! comparisons, evaluated per document record (spec.md §4.10).
//!
//! Grounded on the column-offset lookups of `blocks::meta::MetaDescription`;
//! the evaluator is written the way `blocks::meta`'s own typed-column
//! accessors are: resolve once at compile time, evaluate cheaply per
//! record thereafter.

use crate::blocks::meta::{read_value, MetaDescription, MetaType, MetaValue, EPSILON_F16, EPSILON_F32};
use crate::error::{Result, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

/// One `column OP constant` comparison, before it is bound to a schema.
#[derive(Debug, Clone)]
pub struct RestrictionTerm {
    pub column: String,
    pub op: CmpOp,
    pub value: MetaValue,
}

/// AND-of-OR restriction: the outer `Vec` is a conjunction, each inner
/// `Vec` a disjunction of terms (spec.md §4.10).
#[derive(Debug, Clone, Default)]
pub struct Restriction {
    groups: Vec<Vec<RestrictionTerm>>,
}

impl Restriction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new OR-group built from `terms`. An empty restriction (no
    /// groups at all) evaluates to true for every record.
    pub fn and_group(mut self, terms: Vec<RestrictionTerm>) -> Self {
        self.groups.push(terms);
        self
    }

    /// Binds column names to offsets/types and range-checks integer
    /// constants against their column's type, so malformed restrictions are
    /// rejected once at query-compile time rather than per record (spec.md
    /// §4.10: "the codec rejects ranges that would under/overflow the
    /// target column type with a configuration error at query compile
    /// time").
    pub fn compile(&self, desc: &MetaDescription) -> Result<CompiledRestriction> {
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut compiled = Vec::with_capacity(group.len());
            for term in group {
                let (offset, ty) = desc.offset_of(&term.column).ok_or_else(|| {
                    StorageError::UnknownIdentifier(format!(
                        "unknown metadata column {:?}",
                        term.column
                    ))
                })?;
                let value = coerce(term.value, ty)?;
                compiled.push(CompiledTerm {
                    offset,
                    ty,
                    op: term.op,
                    value,
                });
            }
            groups.push(compiled);
        }
        Ok(CompiledRestriction { groups })
    }
}

/// Converts `value` to a representation valid for column type `ty`,
/// rejecting values that would overflow it.
fn coerce(value: MetaValue, ty: MetaType) -> Result<MetaValue> {
    match (value, ty) {
        (MetaValue::Float(_), MetaType::Float16 | MetaType::Float32) => Ok(value),
        (MetaValue::Int(v), MetaType::Float16 | MetaType::Float32) => Ok(MetaValue::Float(v as f64)),
        (MetaValue::Int(v), int_ty) => {
            let (lo, hi) = int_range(int_ty);
            if v < lo || v > hi {
                return Err(StorageError::OutOfRange(format!(
                    "constant {v} does not fit column type {int_ty:?} (range {lo}..={hi})"
                )));
            }
            Ok(MetaValue::Int(v))
        }
        (MetaValue::Float(v), int_ty) => Err(StorageError::InvalidArgument(format!(
            "float constant {v} cannot be compared against integer column type {int_ty:?}"
        ))),
    }
}

fn int_range(ty: MetaType) -> (i64, i64) {
    match ty {
        MetaType::Int8 => (i8::MIN as i64, i8::MAX as i64),
        MetaType::UInt8 => (0, u8::MAX as i64),
        MetaType::Int16 => (i16::MIN as i64, i16::MAX as i64),
        MetaType::UInt16 => (0, u16::MAX as i64),
        MetaType::Int32 => (i32::MIN as i64, i32::MAX as i64),
        MetaType::UInt32 => (0, u32::MAX as i64),
        MetaType::Float16 | MetaType::Float32 => unreachable!("handled above"),
    }
}

#[derive(Debug, Clone)]
struct CompiledTerm {
    offset: usize,
    ty: MetaType,
    op: CmpOp,
    value: MetaValue,
}

impl CompiledTerm {
    fn evaluate(&self, record: &[u8]) -> bool {
        let actual = read_value(record, self.offset, self.ty);
        match (actual, self.value) {
            (MetaValue::Int(a), MetaValue::Int(b)) => compare_ord(self.op, a, b),
            (MetaValue::Float(a), MetaValue::Float(b)) => {
                let eps = if self.ty == MetaType::Float16 {
                    EPSILON_F16 as f64
                } else {
                    EPSILON_F32 as f64
                };
                compare_float(self.op, a, b, eps)
            }
            // coerce() guarantees these never mix, but stay defensive.
            (a, b) => compare_ord(self.op, a.as_f64() as i64, b.as_f64() as i64),
        }
    }
}

fn compare_ord<T: PartialOrd>(op: CmpOp, a: T, b: T) -> bool {
    match op {
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    }
}

fn compare_float(op: CmpOp, a: f64, b: f64, eps: f64) -> bool {
    match op {
        CmpOp::Eq => (a - b).abs() <= eps,
        CmpOp::Ne => (a - b).abs() > eps,
        _ => compare_ord(op, a, b),
    }
}

/// A `Restriction` bound to a specific `MetaDescription`, ready to evaluate
/// records of that layout.
#[derive(Debug, Clone)]
pub struct CompiledRestriction {
    groups: Vec<Vec<CompiledTerm>>,
}

impl CompiledRestriction {
    /// Conjunction of per-group disjunctions; short-circuits on the first
    /// failing group (spec.md §4.10: "short-circuit on each group").
    pub fn evaluate(&self, record: &[u8]) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|term| term.evaluate(record)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::meta::write_value;

    fn record_with_year(desc: &MetaDescription, year: u16) -> Vec<u8> {
        let mut record = vec![0u8; desc.record_width()];
        let (off, ty) = desc.offset_of("year").unwrap();
        write_value(&mut record, off, ty, MetaValue::Int(year as i64)).unwrap();
        record
    }

    // Scenario S4: year >= 2005 AND year <= 2010 over docs {2000,2005,2010,2015}.
    #[test]
    fn scenario_s4_range_restriction() {
        let desc = MetaDescription::new().with_column("year", MetaType::UInt16);
        let restriction = Restriction::new()
            .and_group(vec![RestrictionTerm {
                column: "year".into(),
                op: CmpOp::Ge,
                value: MetaValue::Int(2005),
            }])
            .and_group(vec![RestrictionTerm {
                column: "year".into(),
                op: CmpOp::Le,
                value: MetaValue::Int(2010),
            }]);
        let compiled = restriction.compile(&desc).unwrap();

        let years = [2000u16, 2005, 2010, 2015];
        let matches: Vec<usize> = years
            .iter()
            .enumerate()
            .filter(|(_, &y)| compiled.evaluate(&record_with_year(&desc, y)))
            .map(|(i, _)| i + 1) // 1-based docno within this scan
            .collect();
        assert_eq!(matches, vec![2, 3]);
    }

    #[test]
    fn unknown_column_is_rejected_at_compile_time() {
        let desc = MetaDescription::new().with_column("year", MetaType::UInt16);
        let restriction = Restriction::new().and_group(vec![RestrictionTerm {
            column: "bogus".into(),
            op: CmpOp::Eq,
            value: MetaValue::Int(1),
        }]);
        assert!(matches!(
            restriction.compile(&desc),
            Err(StorageError::UnknownIdentifier(_))
        ));
    }

    #[test]
    fn out_of_range_constant_is_rejected_at_compile_time() {
        let desc = MetaDescription::new().with_column("year", MetaType::UInt8);
        let restriction = Restriction::new().and_group(vec![RestrictionTerm {
            column: "year".into(),
            op: CmpOp::Eq,
            value: MetaValue::Int(1000),
        }]);
        assert!(matches!(
            restriction.compile(&desc),
            Err(StorageError::OutOfRange(_))
        ));
    }

    #[test]
    fn empty_restriction_matches_everything() {
        let desc = MetaDescription::new().with_column("year", MetaType::UInt16);
        let compiled = Restriction::new().compile(&desc).unwrap();
        assert!(compiled.evaluate(&record_with_year(&desc, 1999)));
    }

    #[test]
    fn float_equality_uses_column_epsilon() {
        let desc = MetaDescription::new().with_column("score", MetaType::Float32);
        let mut record = vec![0u8; desc.record_width()];
        let (off, ty) = desc.offset_of("score").unwrap();
        write_value(&mut record, off, ty, MetaValue::Float(1.0)).unwrap();

        let restriction = Restriction::new().and_group(vec![RestrictionTerm {
            column: "score".into(),
            op: CmpOp::Eq,
            value: MetaValue::Float(1.0 + 1e-8),
        }]);
        let compiled = restriction.compile(&desc).unwrap();
        assert!(compiled.evaluate(&record));
    }
}
