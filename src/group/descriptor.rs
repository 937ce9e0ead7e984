//! Key descriptors.

use std::fmt;
use std::str::FromStr;

use crate::core::FeatureError;

/// Key flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    /// Key must exist and have a valid format.
    Required,
    /// Key value is a list of formats.
    Multi,
}

/// A key to load, with its flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    name: String,
    required: bool,
    multi: bool,
}

impl Descriptor {
    /// An optional, single-valued key.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            multi: false,
        }
    }

    /// A key with the given flags.
    pub fn with_flags(name: impl Into<String>, flags: &[Flag]) -> Self {
        flags.iter().fold(Self::new(name), |d, flag| d.flag(*flag))
    }

    /// Mark the key REQUIRED.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark the key MULTI.
    #[must_use]
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Set `flag`.
    #[must_use]
    pub fn flag(self, flag: Flag) -> Self {
        match flag {
            Flag::Required => self.required(),
            Flag::Multi => self.multi(),
        }
    }

    /// Key name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the key is REQUIRED.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Whether the key is MULTI.
    #[must_use]
    pub const fn is_multi(&self) -> bool {
        self.multi
    }
}

/// Parses `name[:required][:multi]`; `req`, `r`, `m` are accepted as short forms.
impl FromStr for Descriptor {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| FeatureError::InvalidDescriptor {
            descriptor: s.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = s.split(':');
        let name = parts.next().unwrap_or_default();
        if name.is_empty() {
            return Err(invalid("empty key name"));
        }

        let mut descriptor = Self::new(name);
        for part in parts {
            descriptor = match part {
                "required" | "req" | "r" => descriptor.required(),
                "multi" | "m" => descriptor.multi(),
                other => return Err(invalid(&format!("unknown flag '{other}'"))),
            };
        }
        Ok(descriptor)
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.required {
            f.write_str(":required")?;
        }
        if self.multi {
            f.write_str(":multi")?;
        }
        Ok(())
    }
}
