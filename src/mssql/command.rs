use crate::error::{Result, SqlServerError};
use crate::types::{CommandType, RowValues};

use super::params::{ParameterCollection, SqlParameter, validate_object_name};

/// Command text, its parameters and the state of the fluent chain.
///
/// Builder calls never fail immediately. The first error is kept and
/// reported by [`SqlCommand::check`], which every execution calls first.
#[derive(Debug, Default)]
pub struct SqlCommand {
    text: String,
    command_type: CommandType,
    parameters: ParameterCollection,
    error: Option<SqlServerError>,
    prepared: bool,
}

impl SqlCommand {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the command with ad-hoc T-SQL.
    pub fn set_sql(&mut self, sql: &str) {
        self.reset(sql, CommandType::Text);
    }

    /// Replace the command with a stored procedure call.
    pub fn set_stored_procedure(&mut self, name: &str) {
        self.reset(name.trim(), CommandType::StoredProcedure);
        if let Err(e) = validate_object_name(&self.text) {
            self.defer(e);
        }
    }

    fn reset(&mut self, text: &str, command_type: CommandType) {
        self.text = text.to_string();
        self.command_type = command_type;
        self.parameters.clear();
        self.error = None;
        self.prepared = false;
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterCollection {
        &self.parameters
    }

    pub(crate) fn parameters_mut(&mut self) -> &mut ParameterCollection {
        &mut self.parameters
    }

    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub(crate) fn set_prepared(&mut self) {
        self.prepared = true;
    }

    /// Keep the first builder error.
    pub(crate) fn defer(&mut self, error: SqlServerError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    /// Add a parameter built by the caller; errors are deferred.
    pub fn add_parameter(&mut self, parameter: Result<SqlParameter>) {
        if self.prepared {
            self.defer(SqlServerError::CommandError(
                "Cannot add parameters to a prepared command".into(),
            ));
            return;
        }
        match parameter.and_then(|p| self.parameters.add(p)) {
            Ok(()) => {}
            Err(e) => self.defer(e),
        }
    }

    /// Replace the value of an existing parameter; errors are deferred.
    pub fn set_parameter(&mut self, name: &str, value: RowValues) {
        let result = match self.parameters.get_mut(name) {
            Some(param) => param.set_value(value),
            None => Err(SqlServerError::ParameterError(format!(
                "Parameter '{name}' not found"
            ))),
        };
        if let Err(e) = result {
            self.defer(e);
        }
    }

    /// Report the deferred error, or a missing command text.
    ///
    /// # Errors
    /// Returns the first deferred builder error, or `SqlServerError::CommandError`
    /// when no command text has been set.
    pub fn check(&self) -> Result<()> {
        if let Some(e) = &self.error {
            return Err(e.replay());
        }
        if self.text.trim().is_empty() {
            return Err(SqlServerError::CommandError(
                "No command text: call set_sql or set_stored_procedure first".into(),
            ));
        }
        Ok(())
    }
}
