//! The `capability-invocation` HTTP header.
//!
//! ```text
//! capability-invocation: zcap capability="<compressed>",action="<action>"
//! ```

use crate::error::{CapabilityError, CapabilityResult};

/// Header carrying the invoked capability.
pub const INVOCATION_HEADER: &str = "capability-invocation";

const SCHEME: &str = "zcap";

/// Action names used against the KMS and EDV.
pub mod actions {
    /// Read a vault document.
    pub const READ: &str = "read";
    /// Create or update a vault document.
    pub const WRITE: &str = "write";
    /// Create a key in a key store.
    pub const CREATE_KEY: &str = "createKey";
    /// Export a key's public half.
    pub const EXPORT_KEY: &str = "exportKey";
    /// Unwrap a content key.
    pub const UNWRAP: &str = "unwrap";
}

/// EDV action implied by an HTTP method: `read` for `GET`, `write` otherwise.
#[must_use]
pub fn vault_action(method: &str) -> &'static str {
    if method.eq_ignore_ascii_case("GET") {
        actions::READ
    } else {
        actions::WRITE
    }
}

/// A capability being invoked for one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Compressed capability.
    pub capability: String,
    /// Invoked action.
    pub action: String,
}

impl Invocation {
    /// Create an invocation.
    #[must_use]
    pub fn new(capability: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            action: action.into(),
        }
    }

    /// Render the header value.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!(
            "{SCHEME} capability=\"{}\",action=\"{}\"",
            self.capability, self.action
        )
    }

    /// Parse a header value.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidInvocation`] if the scheme is not
    /// `zcap` or either parameter is missing.
    pub fn parse(value: &str) -> CapabilityResult<Self> {
        let params = value
            .trim()
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(' '))
            .ok_or_else(|| CapabilityError::InvalidInvocation("expected zcap scheme".into()))?;

        let mut capability = None;
        let mut action = None;
        for param in params.split(',') {
            let Some((name, raw)) = param.trim().split_once('=') else {
                continue;
            };
            let val = raw.trim_matches('"').to_string();
            match name {
                "capability" => capability = Some(val),
                "action" => action = Some(val),
                _ => {},
            }
        }

        match (capability, action) {
            (Some(capability), Some(action)) if !capability.is_empty() && !action.is_empty() => {
                Ok(Self { capability, action })
            },
            _ => Err(CapabilityError::InvalidInvocation(
                "capability and action are required".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_format() {
        let inv = Invocation::new("H4sIAAAA", actions::WRITE);
        assert_eq!(
            inv.header_value(),
            r#"zcap capability="H4sIAAAA",action="write""#
        );
    }

    #[test]
    fn test_parse_own_output() {
        let inv = Invocation::new("H4sIAAAA_-==", actions::UNWRAP);
        assert_eq!(Invocation::parse(&inv.header_value()).unwrap(), inv);
    }

    #[test]
    fn test_parse_rejects_other_scheme() {
        assert!(Invocation::parse(r#"Bearer capability="x",action="read""#).is_err());
    }

    #[test]
    fn test_parse_requires_both_params() {
        assert!(Invocation::parse(r#"zcap capability="x""#).is_err());
        assert!(Invocation::parse(r#"zcap action="read""#).is_err());
    }

    #[test]
    fn test_vault_action() {
        assert_eq!(vault_action("GET"), "read");
        assert_eq!(vault_action("get"), "read");
        assert_eq!(vault_action("POST"), "write");
        assert_eq!(vault_action("PUT"), "write");
    }
}
