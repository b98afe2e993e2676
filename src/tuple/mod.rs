mod field;
mod field_type;
mod tuple;
mod tuple_desc;

pub use field::Field;
pub use field_type::FieldType;
pub use tuple::Tuple;
pub use tuple_desc::{TdItem, TupleDesc};
