//! FROM clause planning
//!
//! Turns a normalized field set into the smallest natural-join chain that
//! covers it. The fact table is the join base; each dimension shares exactly
//! one column (its surrogate key) with the fact table, so `NATURAL JOIN`
//! always joins along that key.

use crate::error::{Error, Result};
use crate::query::catalog::{self, DIMENSION_TABLES, FACT_TABLE, MESSAGE_TIME};

const NATURAL_JOIN: &str = " NATURAL JOIN ";

/// Plan the table list for an already normalized field set.
///
/// - no fields: the fact table joined with every dimension
/// - one field: its owning table alone
/// - otherwise: the fact table plus the owning table of every field that is
///   not itself a foreign key column (name containing `ID`)
pub fn build_table_list<S: AsRef<str>>(normalized: &[S]) -> Result<String> {
    catalog::validate_fields(normalized)?;

    match normalized {
        [] => Ok(full_join()),
        [only] => owning_table(only.as_ref()).map(|table| table.to_string()),
        fields => {
            let mut tables = String::from(FACT_TABLE);
            for field in fields {
                let field: &str = field.as_ref();
                if field == MESSAGE_TIME || field.contains("ID") {
                    continue;
                }
                tables.push_str(NATURAL_JOIN);
                tables.push_str(owning_table(field)?);
            }
            Ok(tables)
        }
    }
}

fn full_join() -> String {
    std::iter::once(FACT_TABLE)
        .chain(DIMENSION_TABLES.iter().copied())
        .collect::<Vec<_>>()
        .join(NATURAL_JOIN)
}

fn owning_table(field: &str) -> Result<&'static str> {
    catalog::table_for(field)
        .ok_or_else(|| Error::Configuration(format!("unknown field: {}", field)))
}
