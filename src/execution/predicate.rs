use std::cmp::Ordering;
use std::fmt;

use crate::tuple::{Field, Tuple};

/// Comparison operators usable in a [`Predicate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Equals,
    GreaterThan,
    LessThan,
    LessThanOrEq,
    GreaterThanOrEq,
    /// Substring match on strings, equality on integers
    Like,
    NotEquals,
}

impl Op {
    /// Evaluates `left op right`. Fields of different types never match.
    pub fn apply(&self, left: &Field, right: &Field) -> bool {
        if let (Op::Like, Field::Str(l), Field::Str(r)) = (self, left, right) {
            return l.contains(r.as_str());
        }

        let Some(ordering) = left.partial_cmp(right) else {
            return false;
        };
        match self {
            Op::Equals | Op::Like => ordering == Ordering::Equal,
            Op::NotEquals => ordering != Ordering::Equal,
            Op::GreaterThan => ordering == Ordering::Greater,
            Op::LessThan => ordering == Ordering::Less,
            Op::LessThanOrEq => ordering != Ordering::Greater,
            Op::GreaterThanOrEq => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::GreaterThan => ">",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
            Op::GreaterThanOrEq => ">=",
            Op::Like => "LIKE",
            Op::NotEquals => "<>",
        };
        f.write_str(s)
    }
}

/// Compares one field of a tuple against a constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    field: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: Op, operand: Field) -> Self {
        Self { field, op, operand }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Returns true if `tuple` satisfies the predicate. A tuple without the
    /// referenced field never does.
    pub fn matches(&self, tuple: &Tuple) -> bool {
        tuple
            .field(self.field)
            .map_or(false, |value| self.op.apply(value, &self.operand))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${} {} {}", self.field, self.op, self.operand)
    }
}
