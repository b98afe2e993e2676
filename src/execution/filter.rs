use crate::common::Result;
use crate::tuple::Tuple;

use super::Predicate;

/// Passes through the tuples of `child` that satisfy a predicate.
/// Errors from the child are passed through unchanged.
pub struct Filter<I> {
    predicate: Predicate,
    child: I,
}

impl<I> Filter<I>
where
    I: Iterator<Item = Result<Tuple>>,
{
    pub fn new(predicate: Predicate, child: I) -> Self {
        Self { predicate, child }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn child_mut(&mut self) -> &mut I {
        &mut self.child
    }

    pub fn into_inner(self) -> I {
        self.child
    }
}

impl<I> Iterator for Filter<I>
where
    I: Iterator<Item = Result<Tuple>>,
{
    type Item = Result<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.child.next()? {
                Ok(tuple) if !self.predicate.matches(&tuple) => continue,
                other => return Some(other),
            }
        }
    }
}
