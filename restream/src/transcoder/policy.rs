//! Allow/block lists for input and output addresses.

use regex::Regex;

use crate::{Error, Result};

/// Regex based allow/block list for a single direction.
#[derive(Debug, Clone, Default)]
pub struct AddressRules {
    allow: Vec<Regex>,
    block: Vec<Regex>,
}

impl AddressRules {
    /// Compile the given patterns. An invalid pattern is a configuration
    /// error.
    pub fn new<A, B>(allow: A, block: B) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        B: IntoIterator,
        B::Item: AsRef<str>,
    {
        Ok(Self {
            allow: compile(allow)?,
            block: compile(block)?,
        })
    }

    /// An address is allowed if it matches no block pattern and, if allow
    /// patterns exist, at least one of them.
    pub fn is_allowed(&self, address: &str) -> bool {
        if self.block.iter().any(|re| re.is_match(address)) {
            return false;
        }

        self.allow.is_empty() || self.allow.iter().any(|re| re.is_match(address))
    }
}

fn compile<I>(patterns: I) -> Result<Vec<Regex>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    patterns
        .into_iter()
        .map(|p| {
            let p = p.as_ref();
            Regex::new(p).map_err(|e| Error::config(format!("invalid address pattern '{p}': {e}")))
        })
        .collect()
}

/// Address policy applied by a [`Transcoder`](super::Transcoder) to resolved
/// input and output addresses.
#[derive(Debug, Clone, Default)]
pub struct AddressPolicy {
    input: AddressRules,
    output: AddressRules,
}

impl AddressPolicy {
    pub fn new(input: AddressRules, output: AddressRules) -> Self {
        Self { input, output }
    }

    /// A policy that allows everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn is_input_allowed(&self, address: &str) -> bool {
        self.input.is_allowed(address)
    }

    pub fn is_output_allowed(&self, address: &str) -> bool {
        self.output.is_allowed(address)
    }
}
