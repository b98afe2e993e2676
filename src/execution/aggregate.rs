use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::common::{QuarryError, Result};
use crate::tuple::{Field, FieldType, TdItem, Tuple, TupleDesc};

/// Aggregate functions supported by [`Aggregate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggOp {
    Count,
    Min,
    Max,
    Sum,
    /// Integer average, truncated toward zero
    Avg,
}

impl fmt::Display for AggOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AggOp::Count => "count",
            AggOp::Min => "min",
            AggOp::Max => "max",
            AggOp::Sum => "sum",
            AggOp::Avg => "avg",
        };
        f.write_str(s)
    }
}

/// Running totals of one group
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl Accumulator {
    fn new() -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i32::MAX,
            max: i32::MIN,
        }
    }

    fn add(&mut self, value: Option<i32>) {
        self.count += 1;
        if let Some(v) = value {
            self.sum += i64::from(v);
            self.min = self.min.min(v);
            self.max = self.max.max(v);
        }
    }

    /// Results outside the `i32` range saturate.
    fn finish(&self, op: AggOp) -> i32 {
        let value = match op {
            AggOp::Count => self.count,
            AggOp::Sum => self.sum,
            AggOp::Avg => self.sum / self.count.max(1),
            AggOp::Min => i64::from(self.min),
            AggOp::Max => i64::from(self.max),
        };
        value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }
}

/// Computes one aggregate over the tuples of `child`, optionally grouped by
/// a field.
///
/// The output has one tuple per group, `(group value, aggregate)`, in the
/// order the groups were first seen; without grouping it is a single
/// `(aggregate)` tuple. An empty input produces no tuples. The child is
/// drained on the first call to `next`; an error from it ends the
/// aggregate with that error.
pub struct Aggregate<I> {
    child: Option<I>,
    agg_field: usize,
    group_by: Option<usize>,
    op: AggOp,
    desc: Arc<TupleDesc>,
    results: Vec<Tuple>,
    cursor: usize,
}

impl<I> Aggregate<I>
where
    I: Iterator<Item = Result<Tuple>>,
{
    /// Aggregates field `agg_field` of tuples shaped like `child_desc`.
    /// Only `Count` accepts a string field.
    pub fn new(
        child: I,
        child_desc: &TupleDesc,
        agg_field: usize,
        group_by: Option<usize>,
        op: AggOp,
    ) -> Result<Self> {
        let agg_type = child_desc.field_type(agg_field).ok_or_else(|| {
            QuarryError::SchemaMismatch(format!("no aggregate field {}", agg_field))
        })?;
        if agg_type != FieldType::Int && op != AggOp::Count {
            return Err(QuarryError::SchemaMismatch(format!(
                "{} needs an INT field, field {} is {}",
                op, agg_field, agg_type
            )));
        }

        let agg_name = match child_desc.field_name(agg_field) {
            Some(name) => format!("{}({})", op, name),
            None => op.to_string(),
        };
        let mut items = Vec::with_capacity(2);
        if let Some(group) = group_by {
            let group_type = child_desc.field_type(group).ok_or_else(|| {
                QuarryError::SchemaMismatch(format!("no group-by field {}", group))
            })?;
            let group_name = child_desc.field_name(group).map(str::to_string);
            items.push(TdItem::new(group_type, group_name));
        }
        items.push(TdItem::new(FieldType::Int, Some(agg_name)));

        Ok(Self {
            child: Some(child),
            agg_field,
            group_by,
            op,
            desc: Arc::new(TupleDesc::from_items(items)),
            results: Vec::new(),
            cursor: 0,
        })
    }

    /// Schema of the output: `(group, aggregate)` or `(aggregate)`.
    pub fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn op(&self) -> AggOp {
        self.op
    }

    /// Replays the computed groups from the start.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn compute(&mut self, child: I) -> Result<()> {
        let mut order: Vec<Option<Field>> = Vec::new();
        let mut groups: HashMap<Option<Field>, Accumulator> = HashMap::new();

        for tuple in child {
            let tuple = tuple?;
            let key = match self.group_by {
                Some(group) => Some(Self::field_of(&tuple, group)?.clone()),
                None => None,
            };
            let value = Self::field_of(&tuple, self.agg_field)?.as_int();
            if value.is_none() && self.op != AggOp::Count {
                return Err(QuarryError::SchemaMismatch(format!(
                    "field {} is not an INT",
                    self.agg_field
                )));
            }

            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    order.push(key);
                    Accumulator::new()
                })
                .add(value);
        }

        for key in order {
            let total = groups[&key].finish(self.op);
            let fields = match key {
                Some(group) => vec![group, Field::Int(total)],
                None => vec![Field::Int(total)],
            };
            self.results.push(Tuple::new(Arc::clone(&self.desc), fields)?);
        }
        Ok(())
    }

    fn field_of(tuple: &Tuple, i: usize) -> Result<&Field> {
        tuple
            .field(i)
            .ok_or_else(|| QuarryError::SchemaMismatch(format!("tuple has no field {}", i)))
    }
}

impl<I> Iterator for Aggregate<I>
where
    I: Iterator<Item = Result<Tuple>>,
{
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(child) = self.child.take() {
            if let Err(e) = self.compute(child) {
                self.results.clear();
                return Some(Err(e));
            }
        }
        let tuple = self.results.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(Ok(tuple))
    }
}
