// Stable error codes surfaced to callers and logs

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
}

pub mod authentication {
    pub const UNAUTHENTICATED: &str = "AUTH_2001";
}

pub mod authorization {
    pub const ACCESS_DENIED: &str = "AUTHZ_3001";
    pub const NOT_FOUND: &str = "AUTHZ_3002";
}

pub mod store {
    pub const UNAVAILABLE: &str = "STORE_4001";
    pub const TIMEOUT: &str = "STORE_4002";
    pub const TRANSACTION_FAILED: &str = "STORE_4003";
}

pub mod system {
    pub const INVALID_SCHEMA: &str = "SYSTEM_5001";
    pub const INTERNAL: &str = "SYSTEM_5002";
}
