//! Per-connection session state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::portal::Portal;
use crate::protocol::types::TransactionStatus;
use crate::statement::PreparedStatement;

/// Prepared statements, portals and transaction status of one connection.
#[derive(Debug, Default)]
pub struct SessionContext {
    statements: HashMap<String, Arc<PreparedStatement>>,
    portals: HashMap<String, Portal>,
    status: TransactionStatus,
    /// An extended-protocol message opened a transaction that ends at Sync.
    implicit: bool,
    startup_params: Vec<(String, String)>,
}

impl SessionContext {
    /// Create an idle session with no statements or portals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session carrying the client's StartupMessage parameters.
    pub fn with_startup_params(startup_params: Vec<(String, String)>) -> Self {
        Self {
            startup_params,
            ..Self::default()
        }
    }

    /// A StartupMessage parameter such as `user` or `database`.
    pub fn startup_param(&self, name: &str) -> Option<&str> {
        self.startup_params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    // === Transaction status ===

    /// Current transaction status.
    pub fn transaction_status(&self) -> TransactionStatus {
        self.status
    }

    /// Overwrite the transaction status.
    pub fn set_transaction_status(&mut self, status: TransactionStatus) {
        self.status = status;
    }

    /// Returns true inside an explicit transaction block that has failed.
    pub fn is_aborted_block(&self) -> bool {
        self.status == TransactionStatus::Failed
    }

    /// Returns true while an implicit transaction is open.
    pub fn in_implicit_transaction(&self) -> bool {
        self.implicit
    }

    /// Note that an extended-protocol message started work outside any block.
    pub fn start_implicit(&mut self) {
        if self.status == TransactionStatus::Idle {
            self.implicit = true;
        }
    }

    /// Track transaction control from a command tag.
    pub fn apply_command_tag(&mut self, tag: &str) {
        match tag.split_whitespace().next() {
            Some("BEGIN" | "START") => {
                self.status = TransactionStatus::InTransaction;
                self.implicit = false;
            }
            Some("COMMIT" | "END" | "ROLLBACK" | "ABORT") => {
                self.status = TransactionStatus::Idle;
                self.portals.clear();
            }
            _ => {}
        }
    }

    /// Record a failed command. Only an explicit block enters the failed state.
    pub fn fail_transaction(&mut self) {
        if self.status == TransactionStatus::InTransaction {
            self.status = TransactionStatus::Failed;
        }
    }

    /// End the implicit transaction (at Sync or the end of a simple query).
    ///
    /// Outside a transaction block every portal is destroyed.
    pub fn finish_implicit_transaction(&mut self) {
        self.implicit = false;
        if self.status == TransactionStatus::Idle {
            self.portals.clear();
        }
    }

    // === Prepared statements ===

    /// Look up a prepared statement.
    pub fn statement(&self, name: &str) -> Result<Arc<PreparedStatement>> {
        self.statements
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UndefinedStatement(name.to_string()))
    }

    /// Register a prepared statement.
    ///
    /// The unnamed statement is replaced; a named one must not exist yet.
    pub fn insert_statement(&mut self, statement: PreparedStatement) -> Result<()> {
        if !statement.name.is_empty() && self.statements.contains_key(&statement.name) {
            return Err(Error::DuplicateStatement(statement.name));
        }
        self.statements
            .insert(statement.name.clone(), Arc::new(statement));
        Ok(())
    }

    /// Remove a prepared statement. Returns true if it existed.
    ///
    /// Portals already bound to it keep their own reference.
    pub fn remove_statement(&mut self, name: &str) -> bool {
        self.statements.remove(name).is_some()
    }

    /// Number of registered prepared statements.
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }

    // === Portals ===

    /// Look up a portal.
    pub fn portal(&self, name: &str) -> Result<&Portal> {
        self.portals
            .get(name)
            .ok_or_else(|| Error::UndefinedPortal(name.to_string()))
    }

    /// Look up a portal for execution.
    pub fn portal_mut(&mut self, name: &str) -> Result<&mut Portal> {
        self.portals
            .get_mut(name)
            .ok_or_else(|| Error::UndefinedPortal(name.to_string()))
    }

    /// Register a portal, replacing any portal of the same name.
    pub fn insert_portal(&mut self, portal: Portal) {
        self.portals.insert(portal.name.clone(), portal);
    }

    /// Remove a portal. Returns true if it existed.
    pub fn remove_portal(&mut self, name: &str) -> bool {
        self.portals.remove(name).is_some()
    }

    /// Number of open portals.
    pub fn portal_count(&self) -> usize {
        self.portals.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementDescription;

    fn statement(name: &str) -> PreparedStatement {
        PreparedStatement::new(name, "SELECT 1", StatementDescription::no_data(vec![]))
    }

    fn portal(name: &str, session: &SessionContext) -> Portal {
        Portal::new(name, session.statement("").unwrap(), vec![], vec![], vec![])
    }

    #[test]
    fn named_statement_cannot_be_redefined() {
        let mut session = SessionContext::new();
        session.insert_statement(statement("s1")).unwrap();
        let err = session.insert_statement(statement("s1")).unwrap_err();
        assert!(matches!(err, Error::DuplicateStatement(name) if name == "s1"));

        assert!(session.remove_statement("s1"));
        session.insert_statement(statement("s1")).unwrap();
    }

    #[test]
    fn unnamed_statement_is_replaced() {
        let mut session = SessionContext::new();
        session.insert_statement(statement("")).unwrap();
        session.insert_statement(statement("")).unwrap();
        assert_eq!(session.statement_count(), 1);
    }

    #[test]
    fn missing_names_are_lookup_errors() {
        let mut session = SessionContext::new();
        assert!(matches!(session.statement("nope"), Err(Error::UndefinedStatement(_))));
        assert!(matches!(session.portal_mut("nope"), Err(Error::UndefinedPortal(_))));
        assert!(!session.remove_portal("nope"));
    }

    #[test]
    fn transaction_block_lifecycle() {
        let mut session = SessionContext::new();
        session.insert_statement(statement("")).unwrap();

        session.apply_command_tag("BEGIN");
        assert_eq!(session.transaction_status(), TransactionStatus::InTransaction);

        session.insert_portal(portal("c1", &session));
        session.finish_implicit_transaction();
        assert_eq!(session.portal_count(), 1);

        session.fail_transaction();
        assert!(session.is_aborted_block());

        session.apply_command_tag("ROLLBACK");
        assert_eq!(session.transaction_status(), TransactionStatus::Idle);
        assert_eq!(session.portal_count(), 0);
    }

    #[test]
    fn implicit_transaction_drops_portals_at_end() {
        let mut session = SessionContext::new();
        session.insert_statement(statement("")).unwrap();

        session.start_implicit();
        assert!(session.in_implicit_transaction());
        session.insert_portal(portal("", &session));

        // Failures outside a block do not leave a failed status behind.
        session.fail_transaction();
        assert_eq!(session.transaction_status(), TransactionStatus::Idle);

        session.finish_implicit_transaction();
        assert!(!session.in_implicit_transaction());
        assert_eq!(session.portal_count(), 0);
    }

    #[test]
    fn startup_params_lookup() {
        let session = SessionContext::with_startup_params(vec![
            ("user".into(), "alice".into()),
            ("database".into(), "app".into()),
        ]);
        assert_eq!(session.startup_param("database"), Some("app"));
        assert_eq!(session.startup_param("options"), None);
    }
}
