//! ErrorResponse message.

use crate::error::{ErrorFields, Result};
use crate::protocol::codec::MessageBuilder;
use crate::protocol::view::ReadView;

use super::msg_type;

/// Error field type codes from PostgreSQL protocol.
pub mod field_type {
    /// Severity (localized)
    pub const SEVERITY: u8 = b'S';
    /// Severity (non-localized, PostgreSQL 9.6+)
    pub const SEVERITY_NON_LOCALIZED: u8 = b'V';
    /// SQLSTATE code
    pub const CODE: u8 = b'C';
    /// Message
    pub const MESSAGE: u8 = b'M';
    /// Detail
    pub const DETAIL: u8 = b'D';
    /// Hint
    pub const HINT: u8 = b'H';
    /// Position in query
    pub const POSITION: u8 = b'P';
    /// Where (context)
    pub const WHERE: u8 = b'W';
    /// Schema name
    pub const SCHEMA: u8 = b's';
    /// Table name
    pub const TABLE: u8 = b't';
    /// Column name
    pub const COLUMN: u8 = b'c';
    /// Data type name
    pub const DATA_TYPE: u8 = b'd';
    /// Constraint name
    pub const CONSTRAINT: u8 = b'n';
}

/// Write an ErrorResponse message.
///
/// Fields that are `None` are omitted. Severity and SQLSTATE fall back to
/// `ERROR` / `XX000` so that every response carries the mandatory fields.
pub fn write_error_response(buf: &mut Vec<u8>, fields: &ErrorFields) {
    let mut msg = MessageBuilder::new(buf, msg_type::ERROR_RESPONSE);

    let severity = fields.severity.as_deref().unwrap_or("ERROR");
    let mut field = |code: u8, value: &str| {
        msg.write_u8(code);
        msg.write_cstr(value);
    };

    field(field_type::SEVERITY, severity);
    field(
        field_type::SEVERITY_NON_LOCALIZED,
        fields.severity_non_localized.as_deref().unwrap_or(severity),
    );
    field(
        field_type::CODE,
        fields
            .code
            .as_deref()
            .unwrap_or(crate::error::sqlstate::INTERNAL_ERROR),
    );
    field(field_type::MESSAGE, fields.message.as_deref().unwrap_or(""));

    let optional = [
        (field_type::DETAIL, &fields.detail),
        (field_type::HINT, &fields.hint),
        (field_type::WHERE, &fields.where_),
        (field_type::SCHEMA, &fields.schema),
        (field_type::TABLE, &fields.table),
        (field_type::COLUMN, &fields.column),
        (field_type::DATA_TYPE, &fields.data_type),
        (field_type::CONSTRAINT, &fields.constraint),
    ];
    for (code, value) in optional {
        if let Some(value) = value {
            field(code, value);
        }
    }
    if let Some(position) = fields.position {
        field(field_type::POSITION, &position.to_string());
    }

    msg.write_u8(0);
    msg.finish();
}

/// Parse error fields from payload.
fn parse_fields(payload: &[u8]) -> Result<ErrorFields> {
    let mut fields = ErrorFields::default();
    let mut view = ReadView::new(payload);

    loop {
        let field_type = view.read_u8()?;
        if field_type == 0 {
            break;
        }
        let value = view.read_cstr()?;

        match field_type {
            field_type::SEVERITY => fields.severity = Some(value.to_string()),
            field_type::SEVERITY_NON_LOCALIZED => {
                fields.severity_non_localized = Some(value.to_string())
            }
            field_type::CODE => fields.code = Some(value.to_string()),
            field_type::MESSAGE => fields.message = Some(value.to_string()),
            field_type::DETAIL => fields.detail = Some(value.to_string()),
            field_type::HINT => fields.hint = Some(value.to_string()),
            field_type::POSITION => fields.position = value.parse().ok(),
            field_type::WHERE => fields.where_ = Some(value.to_string()),
            field_type::SCHEMA => fields.schema = Some(value.to_string()),
            field_type::TABLE => fields.table = Some(value.to_string()),
            field_type::COLUMN => fields.column = Some(value.to_string()),
            field_type::DATA_TYPE => fields.data_type = Some(value.to_string()),
            field_type::CONSTRAINT => fields.constraint = Some(value.to_string()),
            _ => {
                tracing::debug!("Unknown error field type: {}", field_type as char);
            }
        }
    }

    Ok(fields)
}

/// ErrorResponse message.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    /// Parsed error fields
    pub fields: ErrorFields,
}

impl ErrorResponse {
    /// Parse an ErrorResponse message from payload bytes.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            fields: parse_fields(payload)?,
        })
    }

    /// Get the SQLSTATE code.
    pub fn code(&self) -> Option<&str> {
        self.fields.code.as_deref()
    }

    /// Get the primary message.
    pub fn message(&self) -> Option<&str> {
        self.fields.message.as_deref()
    }

    /// Get the severity.
    pub fn severity(&self) -> Option<&str> {
        self.fields
            .severity_non_localized
            .as_deref()
            .or(self.fields.severity.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorFields, Severity};

    #[test]
    fn error_response_round_trip() {
        let mut fields = ErrorFields::new(Severity::Fatal, "08P01", "invalid frontend message type 120")
            .with_detail("detail")
            .with_hint("hint");
        fields.position = Some(7);

        let mut buf = Vec::new();
        write_error_response(&mut buf, &fields);
        assert_eq!(buf[0], b'E');

        let parsed = ErrorResponse::parse(&buf[5..]).unwrap();
        assert_eq!(parsed.fields, fields);
        assert_eq!(parsed.severity(), Some("FATAL"));
        assert_eq!(parsed.code(), Some("08P01"));
    }

    #[test]
    fn missing_mandatory_fields_get_defaults() {
        let fields = ErrorFields {
            message: Some("boom".into()),
            ..ErrorFields::default()
        };
        let mut buf = Vec::new();
        write_error_response(&mut buf, &fields);

        let parsed = ErrorResponse::parse(&buf[5..]).unwrap();
        assert_eq!(parsed.severity(), Some("ERROR"));
        assert_eq!(parsed.code(), Some("XX000"));
        assert_eq!(parsed.message(), Some("boom"));
    }
}
