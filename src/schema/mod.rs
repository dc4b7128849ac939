// Raw input schema: logical fields, column synonyms and raw records
//
// Sources name their columns differently ("Phone 1", "md_us_phone_1",
// "phone1", ...). The schema maps each logical field to an ordered synonym
// list once, and the resolver uses it to pull canonical, case-folded values
// out of every raw record.
//
// # Example
//
// ```rust
// use hashmatch::schema::*;
//
// let schema = FieldSchemaBuilder::standard()
//     .prefer_column(LogicalField::Pseudonym, "member_id")
//     .build()?;
//
// let mut record = RawRecord::new();
// record.set_field("member_id", "M-17");
// assert_eq!(schema.resolve(&record, LogicalField::Pseudonym), "m-17");
// ```

pub mod field;
pub mod record;
#[allow(clippy::module_inception)]
pub mod schema;

pub use field::{FieldSpec, LogicalField, PhoneSlot};
pub use record::RawRecord;
pub use schema::{parse_override, FieldSchema, FieldSchemaBuilder, SchemaError};
