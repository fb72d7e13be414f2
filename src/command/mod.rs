//! Client commands and tenant key rewriting.

pub mod keys;
pub mod rewrite;

pub use keys::{is_keyspace_wide, policy_for, positions_for, KeyPolicy};
pub use rewrite::{rewrite, strip_prefix, strip_reply_keys};

use bytes::Bytes;

/// An inbound command: argument 0 is the command name, the rest are its
/// arguments in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }

    /// Build a command from anything byte-like, mostly handy in tests.
    pub fn from_parts<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self {
            args: parts
                .into_iter()
                .map(|p| Bytes::copy_from_slice(p.as_ref()))
                .collect(),
        }
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    pub fn into_args(self) -> Vec<Bytes> {
        self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    pub fn name(&self) -> Option<&[u8]> {
        self.args.first().map(|b| b.as_ref())
    }

    /// Uppercased command name, empty for an empty command.
    pub fn name_upper(&self) -> String {
        self.name()
            .map(|n| String::from_utf8_lossy(n).to_ascii_uppercase())
            .unwrap_or_default()
    }

    pub fn is(&self, name: &str) -> bool {
        self.name()
            .map(|n| n.eq_ignore_ascii_case(name.as_bytes()))
            .unwrap_or(false)
    }
}
