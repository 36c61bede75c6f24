//! Query Layer
//!
//! Everything needed to describe and check a `where` argument:
//!
//! - `operators` - Operator tokens grouped into categories
//! - `predicate` - Typed and/or tree over leaf constraints
//! - `where_schema` - Compiler from field trees to flat filterable paths

pub mod operators;
pub mod predicate;
pub mod where_schema;

pub use operators::{union, Operator, OperatorCategory, UnknownOperator};
pub use predicate::{Constraint, Predicate, PredicateError};
pub use where_schema::{
    combine_parent_name, compile_where_schema, format_name, to_query_path, EnumType, EnumValue,
    OperatorInput, QueryField, QueryValueType, ScalarType, SchemaError, WhereSchema,
    WhereValidationError, PATH_SEPARATOR,
};
