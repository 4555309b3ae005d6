//! Name validation for universes, stores and branches.
//!
//! All names:
//! - Must be non-empty and at most [`MAX_NAME_LEN`] bytes
//! - Must not contain whitespace or control characters
//!
//! Store keys must additionally not start with `__`, which is reserved for
//! pseudo-keys such as the auditor's global marker. Branch names follow
//! git-style rules (no `..`, no `~^:?*[\`, no leading/trailing `.` or `/`).

use crate::error::TypeError;

/// Longest accepted name, in bytes.
pub const MAX_NAME_LEN: usize = 128;

/// Prefix reserved for internal pseudo-keys.
pub const RESERVED_PREFIX: &str = "__";

const BRANCH_FORBIDDEN: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

fn invalid(kind: &'static str, name: &str, reason: impl Into<String>) -> TypeError {
    TypeError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn validate_common(kind: &'static str, name: &str) -> Result<(), TypeError> {
    if name.is_empty() {
        return Err(invalid(kind, name, "must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid(
            kind,
            name,
            format!("longer than {MAX_NAME_LEN} bytes"),
        ));
    }
    if let Some(ch) = name.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid(kind, name, format!("contains forbidden character {ch:?}")));
    }
    Ok(())
}

/// Validate a store key.
///
/// ```
/// use kosmos_types::validate_store_key;
///
/// assert!(validate_store_key("counter").is_ok());
/// assert!(validate_store_key("physics.energy").is_ok());
/// assert!(validate_store_key("").is_err());
/// assert!(validate_store_key("__global__").is_err());
/// ```
pub fn validate_store_key(key: &str) -> Result<(), TypeError> {
    validate_common("store key", key)?;
    if key.starts_with(RESERVED_PREFIX) {
        return Err(invalid(
            "store key",
            key,
            format!("prefix {RESERVED_PREFIX:?} is reserved"),
        ));
    }
    Ok(())
}

/// Validate a universe id. Universe ids are also used as fork/clone prefixes,
/// so `/` is rejected alongside whitespace.
pub fn validate_universe_id(id: &str) -> Result<(), TypeError> {
    validate_common("universe id", id)?;
    if id.contains('/') {
        return Err(invalid("universe id", id, "must not contain '/'"));
    }
    Ok(())
}

/// Validate a branch name.
///
/// ```
/// use kosmos_types::validate_branch_name;
///
/// assert!(validate_branch_name("experiment").is_ok());
/// assert!(validate_branch_name("what-if/high-gravity").is_ok());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<(), TypeError> {
    const KIND: &str = "branch";
    validate_common(KIND, name)?;

    if let Some(ch) = name.chars().find(|c| BRANCH_FORBIDDEN.contains(c)) {
        return Err(invalid(KIND, name, format!("contains forbidden character {ch:?}")));
    }
    if name.contains("..") {
        return Err(invalid(KIND, name, "must not contain '..'"));
    }
    if name.starts_with('.') || name.ends_with('.') {
        return Err(invalid(KIND, name, "must not start or end with '.'"));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(KIND, name, "must not start or end with '/'"));
    }
    if name.split('/').any(str::is_empty) {
        return Err(invalid(KIND, name, "path components must not be empty"));
    }
    Ok(())
}
