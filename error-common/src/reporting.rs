// Error reporting through tracing

use crate::types::{Classified, ErrorClass};

/// Log a classified error at a level matching its class
pub fn report_error<E: Classified + ?Sized>(context: &str, error: &E) {
    let class = error.class();
    match class {
        ErrorClass::Validation
        | ErrorClass::Unauthenticated
        | ErrorClass::AuthorizationDenied
        | ErrorClass::NotFound => {
            tracing::warn!(
                context = context,
                error_code = error.code(),
                error_class = %class,
                error = %error,
                "request rejected"
            );
        }
        _ => {
            tracing::error!(
                context = context,
                error_code = error.code(),
                error_class = %class,
                retryable = error.is_retryable(),
                error = %error,
                "operation failed"
            );
        }
    }
}
