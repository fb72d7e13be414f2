use crate::command::keys::policy_for;
use crate::command::Command;
use crate::protocol::RespValue;
use bytes::{Bytes, BytesMut};

/// Prefix every key argument of `command` with `prefix`.
///
/// Argument count and order are preserved and non-key arguments are left
/// byte-for-byte intact. An empty prefix returns the command unchanged.
/// There is no guard against prefixing an already prefixed key.
pub fn rewrite(command: &Command, prefix: &[u8]) -> Command {
    if prefix.is_empty() || command.is_empty() {
        return command.clone();
    }

    let policy = policy_for(&command.name_upper());
    let mut args = command.args().to_vec();
    for pos in policy.positions(&args) {
        if let Some(arg) = args.get_mut(pos) {
            *arg = prefixed(prefix, arg);
        }
    }
    Command::new(args)
}

fn prefixed(prefix: &[u8], key: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(prefix.len() + key.len());
    buf.extend_from_slice(prefix);
    buf.extend_from_slice(key);
    buf.freeze()
}

/// Remove `prefix` from a key, returning `None` when the key doesn't carry it.
pub fn strip_prefix<'a>(key: &'a [u8], prefix: &[u8]) -> Option<&'a [u8]> {
    key.strip_prefix(prefix)
}

/// Strip the tenant prefix from key names in replies that list keys.
///
/// Only `KEYS` returns key names today; every other reply passes through.
pub fn strip_reply_keys(command_name: &str, reply: RespValue, prefix: &[u8]) -> RespValue {
    if prefix.is_empty() || command_name != "KEYS" {
        return reply;
    }
    match reply {
        RespValue::Array(items) => RespValue::Array(
            items
                .into_iter()
                .map(|item| match item {
                    RespValue::BulkString(key) => match strip_prefix(&key, prefix) {
                        Some(stripped) => RespValue::BulkString(key.slice_ref(stripped)),
                        None => RespValue::BulkString(key),
                    },
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}
