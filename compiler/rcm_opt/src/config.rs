//! Pass configuration.
//!
//! The only switch exposed outside the pipeline is whether the local
//! retain/release motion steps run. It can be set from the environment
//! with `RCM_RR_CODE_MOTION`.

use thiserror::Error;

/// Pipeline position of a code-motion run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variant {
    /// Does not hoist releases into predecessors.
    #[default]
    Early,
    /// Hoists releases into switch regions and into predecessors.
    Late,
}

/// Options for [`run_code_motion`](crate::run_code_motion).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeMotionConfig {
    pub variant: Variant,
    /// Run local retain sinking and (for [`Variant::Late`]) decrement
    /// hoisting into predecessors. Off by default.
    pub rr_code_motion: bool,
}

/// Malformed configuration.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {var}: expected one of 0, 1, true, false, on, off")]
    InvalidFlag { var: &'static str, value: String },

    #[error("{var} is not valid unicode")]
    NotUnicode { var: &'static str },
}

impl CodeMotionConfig {
    /// Environment variable toggling [`rr_code_motion`](Self::rr_code_motion).
    pub const RR_CODE_MOTION_VAR: &'static str = "RCM_RR_CODE_MOTION";

    pub fn early() -> Self {
        Self {
            variant: Variant::Early,
            rr_code_motion: false,
        }
    }

    pub fn late() -> Self {
        Self {
            variant: Variant::Late,
            rr_code_motion: false,
        }
    }

    #[must_use]
    pub fn with_rr_code_motion(mut self, enabled: bool) -> Self {
        self.rr_code_motion = enabled;
        self
    }

    /// Returns `true` if releases may be hoisted into predecessors.
    #[inline]
    pub fn hoists_releases(&self) -> bool {
        self.variant == Variant::Late
    }

    /// Build a configuration for `variant`, reading the retain/release
    /// toggle from the environment. An unset variable keeps the default.
    pub fn from_env(variant: Variant) -> Result<Self, ConfigError> {
        let var = Self::RR_CODE_MOTION_VAR;
        let raw = match std::env::var(var) {
            Ok(raw) => Some(raw),
            Err(std::env::VarError::NotPresent) => None,
            Err(std::env::VarError::NotUnicode(_)) => return Err(ConfigError::NotUnicode { var }),
        };
        Self::from_flag(variant, raw.as_deref())
    }

    /// Like [`from_env`](Self::from_env) with the variable's value supplied
    /// directly.
    pub fn from_flag(variant: Variant, raw: Option<&str>) -> Result<Self, ConfigError> {
        let rr_code_motion = match raw {
            None => false,
            Some(raw) => parse_flag(Self::RR_CODE_MOTION_VAR, raw)?,
        };
        Ok(Self {
            variant,
            rr_code_motion,
        })
    }
}

fn parse_flag(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            var,
            value: raw.to_owned(),
        }),
    }
}
