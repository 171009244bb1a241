//! Operator CLI for the blog authorization engine
//!
//! ```bash
//! # Schema
//! blog-authz schema validate ./schema.yaml
//! blog-authz schema show --format json
//!
//! # Store
//! blog-authz --config authz.yaml migrate
//! blog-authz tuples read --object post:7
//! blog-authz check user:42 can_edit post:7 --trace
//!
//! # Policy
//! blog-authz register alice
//! blog-authz role grant bob editor --as alice
//! blog-authz post create p1 --as bob
//! blog-authz post transfer p1 carol --as bob
//! ```

pub mod cli;
pub mod commands;
pub mod context;

use error_common::{Classified, ErrorClass};

/// Process exit status for a failed command, by error class
pub fn exit_code(err: &anyhow::Error) -> u8 {
    classify(err).map_or(1, class_exit_code)
}

fn classify(err: &anyhow::Error) -> Option<ErrorClass> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<blog_policy::PolicyError>() {
            Some(e.class())
        } else if let Some(e) = cause.downcast_ref::<auth_rebac::AuthzError>() {
            Some(e.class())
        } else if let Some(e) = cause.downcast_ref::<config_engine::ConfigError>() {
            Some(e.class())
        } else {
            cause.downcast_ref::<telemetry::TelemetryError>().map(Classified::class)
        }
    })
}

fn class_exit_code(class: ErrorClass) -> u8 {
    match class {
        ErrorClass::Internal => 1,
        ErrorClass::Validation => 2,
        ErrorClass::Unauthenticated => 3,
        ErrorClass::AuthorizationDenied => 4,
        ErrorClass::NotFound => 5,
        ErrorClass::StoreUnavailable => 6,
        ErrorClass::Timeout => 7,
        ErrorClass::TransactionFailed => 8,
        ErrorClass::Schema => 9,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_code_follows_class_through_context() {
        let err: anyhow::Result<()> = Err(blog_policy::PolicyError::Denied { operation: "edit_content" })
            .context("post edit");
        assert_eq!(exit_code(&err.unwrap_err()), 4);

        let err = anyhow::Error::from(auth_rebac::AuthzError::StoreUnavailable("down".to_string()));
        assert_eq!(exit_code(&err), 6);

        assert_eq!(exit_code(&anyhow::anyhow!("unclassified")), 1);
    }
}
