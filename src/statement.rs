//! Prepared statement and column metadata.

use crate::error::{ErrorFields, sqlstate};
use crate::protocol::backend::{FieldDescription, FieldDescriptionTail};
use crate::protocol::types::{FormatCode, Oid};

/// Most columns or parameters one message can carry (the count is an Int16).
pub const MAX_COLUMNS: usize = i16::MAX as usize;

/// Reject a column or parameter count the wire format cannot encode.
pub(crate) fn check_width(what: &str, count: usize) -> Result<(), ErrorFields> {
    if count > MAX_COLUMNS {
        return Err(ErrorFields::error(
            sqlstate::TOO_MANY_COLUMNS,
            format!("{what} count {count} exceeds the limit of {MAX_COLUMNS}"),
        ));
    }
    Ok(())
}

/// Column information reported in RowDescription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub tail: FieldDescriptionTail,
}

impl ColumnInfo {
    /// Describe a computed column (no source table).
    pub fn new(name: impl Into<String>, type_oid: Oid, type_size: i16) -> Self {
        Self {
            name: name.into(),
            tail: FieldDescriptionTail::new(type_oid, type_size, -1),
        }
    }

    /// Attach the source table column.
    pub fn with_table(mut self, table_oid: Oid, column_id: i16) -> Self {
        self.tail = self.tail.with_table(table_oid, column_id);
        self
    }

    /// Table OID (0 if not a table column)
    pub fn table_oid(&self) -> Oid {
        self.tail.table_oid.get()
    }

    /// Column attribute number (0 if not a table column)
    pub fn column_id(&self) -> i16 {
        self.tail.column_id.get()
    }

    /// Data type OID
    pub fn type_oid(&self) -> Oid {
        self.tail.type_oid.get()
    }

    /// Type size (-1 for variable, -2 for null-terminated)
    pub fn type_size(&self) -> i16 {
        self.tail.type_size.get()
    }

    /// Type modifier (type-specific)
    pub fn type_modifier(&self) -> i32 {
        self.tail.type_modifier.get()
    }

    /// Wire description of this column in the given format.
    pub fn field(&self, format: FormatCode) -> FieldDescription<'_> {
        FieldDescription {
            name: &self.name,
            tail: self.tail.with_format(format),
        }
    }
}

/// What the backend reports after analysing a query for Parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementDescription {
    /// Resolved parameter type OIDs
    pub param_types: Vec<Oid>,
    /// Result columns, or `None` if the statement returns no rows
    pub columns: Option<Vec<ColumnInfo>>,
}

impl StatementDescription {
    /// A statement that returns rows.
    pub fn rows(param_types: Vec<Oid>, columns: Vec<ColumnInfo>) -> Self {
        Self {
            param_types,
            columns: Some(columns),
        }
    }

    /// A statement that returns no rows.
    pub fn no_data(param_types: Vec<Oid>) -> Self {
        Self {
            param_types,
            columns: None,
        }
    }

    /// Check that ParameterDescription and RowDescription can encode this.
    pub fn check_width(&self) -> Result<(), ErrorFields> {
        check_width("parameter", self.param_types.len())?;
        check_width("column", self.columns.as_ref().map_or(0, Vec::len))
    }
}

/// A prepared statement registered in a session.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    /// Statement name (empty for the unnamed statement)
    pub name: String,
    /// Original query text
    pub query: String,
    /// Parameter type OIDs
    pub param_types: Vec<Oid>,
    /// Column descriptions (if the statement returns rows)
    pub columns: Option<Vec<ColumnInfo>>,
}

impl PreparedStatement {
    /// Build from a Parse request and the backend's description of it.
    pub fn new(name: &str, query: &str, description: StatementDescription) -> Self {
        Self {
            name: name.to_string(),
            query: query.to_string(),
            param_types: description.param_types,
            columns: description.columns,
        }
    }

    /// True if the query text holds nothing but whitespace and semicolons.
    pub fn is_empty_query(&self) -> bool {
        is_blank_query(&self.query)
    }
}

/// True if `query` holds nothing but whitespace and semicolons.
pub fn is_blank_query(query: &str) -> bool {
    query.chars().all(|c| c.is_whitespace() || c == ';')
}
