//! System-wide constants.

/// Version of the persisted resolution plan format.
pub const PLAN_FORMAT_VERSION: u32 = 1;

/// File extension for persisted resolution plans.
pub const PLAN_FILE_EXTENSION: &str = ".plan.json";

/// Label used for the root scope in logs and diagnostics.
pub const ROOT_SCOPE_LABEL: &str = "<root>";

/// Application name used in diagnostics output.
pub const APP_NAME: &str = "partsmith";
