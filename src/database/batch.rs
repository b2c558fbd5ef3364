use serde::Serialize;

use super::Database;

/// Result of one statement in [`Database::batch_sql`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BatchOutcome {
    Success { statement: String, count: u64 },
    Failure { statement: String, error: String },
}

impl BatchOutcome {
    #[must_use]
    pub fn statement(&self) -> &str {
        match self {
            BatchOutcome::Success { statement, .. } | BatchOutcome::Failure { statement, .. } => {
                statement
            }
        }
    }

    #[must_use]
    pub fn count(&self) -> Option<u64> {
        match self {
            BatchOutcome::Success { count, .. } => Some(*count),
            BatchOutcome::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            BatchOutcome::Success { .. } => None,
            BatchOutcome::Failure { error, .. } => Some(error),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, BatchOutcome::Success { .. })
    }
}

impl Database {
    /// Run each statement through the execute path, strictly one after another,
    /// and report one outcome per statement in input order.
    ///
    /// A failing statement is recorded and the batch moves on; it never aborts.
    /// The connection is held for the whole batch, so other callers' requests
    /// cannot run between its statements.
    pub async fn batch_sql<S>(&self, statements: &[S]) -> Vec<BatchOutcome>
    where
        S: AsRef<str> + Sync,
    {
        let mut slot = self.lock_slot().await;
        let mut outcomes = Vec::with_capacity(statements.len());
        for statement in statements {
            let sql = statement.as_ref();
            let outcome = match self.execute_in(&mut slot, sql, &[]).await {
                Ok(count) => BatchOutcome::Success {
                    statement: sql.to_string(),
                    count,
                },
                Err(err) => BatchOutcome::Failure {
                    statement: sql.to_string(),
                    error: err.to_string(),
                },
            };
            outcomes.push(outcome);
        }
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        self.logger().debug(&format!(
            "batch done: {} statements, {failed} failed",
            outcomes.len()
        ));
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_serialize_per_shape() {
        let ok = BatchOutcome::Success {
            statement: "update t set x = 1".into(),
            count: 3,
        };
        let bad = BatchOutcome::Failure {
            statement: "update nope set x = 1".into(),
            error: "Invalid object name 'nope'.".into(),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({"statement": "update t set x = 1", "count": 3})
        );
        assert_eq!(
            serde_json::to_value(&bad).unwrap()["error"],
            "Invalid object name 'nope'."
        );
        assert_eq!(ok.count(), Some(3));
        assert_eq!(bad.count(), None);
        assert_eq!(bad.statement(), "update nope set x = 1");
    }
}
