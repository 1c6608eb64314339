//! Connection startup: SSL/GSS refusal, trust authentication and the
//! initial ParameterStatus burst.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::protocol::frontend::StartupRequest;
use crate::protocol::types::TransactionStatus;
use crate::writer::PacketWriter;

static NEXT_PROCESS_ID: AtomicU32 = AtomicU32::new(1);

/// Process ID and secret key reported in BackendKeyData.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendKey {
    pub process_id: u32,
    pub secret_key: u32,
}

impl BackendKey {
    /// Allocate the next process ID with a random secret.
    pub fn generate() -> Self {
        Self {
            process_id: NEXT_PROCESS_ID.fetch_add(1, Ordering::Relaxed),
            secret_key: rand::random(),
        }
    }
}

/// What a startup packet asked for.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StartupOutcome {
    /// Encryption was requested and refused; the client sends another packet.
    Declined,
    /// Authentication finished; the session starts with these parameters.
    Started(Vec<(String, String)>),
    /// A CancelRequest; the connection is closed without a reply.
    Cancel { process_id: u32, secret_key: u32 },
}

/// Answer one startup packet.
pub(crate) fn handle_startup_packet(
    payload: &[u8],
    out: &mut PacketWriter<'_>,
    server_params: &[(String, String)],
    key: BackendKey,
) -> Result<StartupOutcome> {
    let request = StartupRequest::decode(payload)?;
    match request {
        StartupRequest::Ssl | StartupRequest::GssEnc => {
            out.write_raw_byte(b'N');
            Ok(StartupOutcome::Declined)
        }
        StartupRequest::Cancel { pid, secret_key } => Ok(StartupOutcome::Cancel {
            process_id: pid,
            secret_key,
        }),
        StartupRequest::Startup { ref params, .. } => {
            if request.param("user").is_none_or(str::is_empty) {
                return Err(Error::Protocol(
                    "no PostgreSQL user name specified in startup packet".into(),
                ));
            }
            write_startup_reply(out, server_params, request.param("application_name"), key);
            Ok(StartupOutcome::Started(
                params
                    .iter()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            ))
        }
    }
}

/// Write AuthenticationOk, ParameterStatus for every server parameter,
/// BackendKeyData and ReadyForQuery.
pub fn write_startup_reply(
    out: &mut PacketWriter<'_>,
    server_params: &[(String, String)],
    application_name: Option<&str>,
    key: BackendKey,
) {
    out.write_authentication_ok();
    for (name, value) in server_params {
        out.write_parameter_status(name, value);
    }
    if let Some(application_name) = application_name {
        out.write_parameter_status("application_name", application_name);
    }
    out.write_backend_key_data(key.process_id, key.secret_key);
    out.write_ready_for_query(TransactionStatus::Idle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::backend::{BackendKeyData, ParameterStatus, RawMessage};
    use crate::protocol::frontend::startup::split_startup_frame;
    use crate::protocol::frontend::{write_ssl_request, write_startup};

    fn params() -> Vec<(String, String)> {
        vec![("server_version".into(), "16.0".into())]
    }

    #[test]
    fn ssl_is_declined() {
        let mut packet = Vec::new();
        write_ssl_request(&mut packet);
        let (payload, _) = split_startup_frame(&packet).unwrap().unwrap();

        let mut buf = Vec::new();
        let outcome = handle_startup_packet(
            payload,
            &mut PacketWriter::new(&mut buf),
            &params(),
            BackendKey::generate(),
        )
        .unwrap();
        assert_eq!(outcome, StartupOutcome::Declined);
        assert_eq!(buf, b"N");
    }

    #[test]
    fn startup_is_trusted() {
        let mut packet = Vec::new();
        write_startup(
            &mut packet,
            &[("user", "alice"), ("application_name", "psql")],
        );
        let (payload, _) = split_startup_frame(&packet).unwrap().unwrap();

        let key = BackendKey {
            process_id: 99,
            secret_key: 1234,
        };
        let mut buf = Vec::new();
        let outcome =
            handle_startup_packet(payload, &mut PacketWriter::new(&mut buf), &params(), key)
                .unwrap();
        let StartupOutcome::Started(client_params) = outcome else {
            panic!("expected startup");
        };
        assert_eq!(client_params[0], ("user".to_string(), "alice".to_string()));

        let messages = RawMessage::split_all(&buf).unwrap();
        let types: Vec<u8> = messages.iter().map(|m| m.type_byte).collect();
        assert_eq!(types, b"RSSKZ");
        let app = ParameterStatus::parse(messages[2].payload).unwrap();
        assert_eq!((app.name, app.value), ("application_name", "psql"));
        let key_data = BackendKeyData::parse(messages[3].payload).unwrap();
        assert_eq!(key_data.process_id(), 99);
        assert_eq!(key_data.secret(), 1234);
    }

    #[test]
    fn startup_requires_user() {
        let mut packet = Vec::new();
        write_startup(&mut packet, &[("database", "db")]);
        let (payload, _) = split_startup_frame(&packet).unwrap().unwrap();

        let mut buf = Vec::new();
        let err = handle_startup_packet(
            payload,
            &mut PacketWriter::new(&mut buf),
            &params(),
            BackendKey::generate(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn process_ids_are_unique() {
        let a = BackendKey::generate();
        let b = BackendKey::generate();
        assert_ne!(a.process_id, b.process_id);
    }
}
