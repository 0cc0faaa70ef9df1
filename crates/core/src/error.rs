/// Domain-level errors returned by the orchestrator and gateway APIs.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_entity_and_id() {
        let err = CoreError::NotFound {
            entity: "job",
            id: "compile_alice_1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Entity not found: job with id compile_alice_1"
        );
    }

    #[test]
    fn conflict_display() {
        let err = CoreError::Conflict("job already finished".to_string());
        assert_eq!(err.to_string(), "Conflict: job already finished");
    }
}
