//! Key positions per command.
//!
//! Positions are indexes into the full argument list, so position 1 is the
//! first argument after the command name. Variable-arity commands resolve
//! against the actual arguments of the invocation.

use bytes::Bytes;

/// How a command lays out its key arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// The command carries no keys.
    Keyless,
    /// Only argument 1 is a key. Fields, members, values, TTLs follow it.
    First,
    /// Arguments 1 and 2 are keys (source and destination).
    FirstTwo,
    /// Every argument after the name is a key.
    All,
    /// Every argument from `from` onwards is a key, e.g. `BITOP op dest src...`.
    AllFrom(usize),
    /// Every argument except a trailing timeout, e.g. `BLPOP key... timeout`.
    AllButLast,
    /// `key value [key value ...]`: every odd position is a key.
    Pairs,
    /// Argument `at` holds a key count and that many keys follow it.
    /// With `dest`, argument 1 is a destination key as well.
    NumKeys { at: usize, dest: bool },
    /// `... STREAMS key [key ...] id [id ...]`: the first half after `STREAMS`.
    Streams,
}

impl KeyPolicy {
    /// Key positions for the invocation `args` (name included).
    pub fn positions(self, args: &[Bytes]) -> Vec<usize> {
        let argc = args.len();
        match self {
            KeyPolicy::Keyless => Vec::new(),
            KeyPolicy::First => (1..argc.max(1)).take(1).collect(),
            KeyPolicy::FirstTwo => (1..argc.max(1)).take(2).collect(),
            KeyPolicy::All => (1..argc.max(1)).collect(),
            KeyPolicy::AllFrom(from) => (from..argc.max(from)).collect(),
            KeyPolicy::AllButLast => (1..argc.saturating_sub(1).max(1)).collect(),
            KeyPolicy::Pairs => (1..argc.max(1)).step_by(2).collect(),
            KeyPolicy::NumKeys { at, dest } => {
                let mut positions = Vec::new();
                if dest && argc > 1 {
                    positions.push(1);
                }
                let count = args
                    .get(at)
                    .and_then(|n| std::str::from_utf8(n).ok())
                    .and_then(|n| n.parse::<usize>().ok())
                    .unwrap_or(0);
                let first = at + 1;
                let end = first.saturating_add(count).min(argc);
                positions.extend(first..end.max(first));
                positions
            }
            KeyPolicy::Streams => {
                let Some(marker) = args
                    .iter()
                    .position(|a| a.eq_ignore_ascii_case(b"STREAMS"))
                else {
                    return Vec::new();
                };
                let first = marker + 1;
                let streams = (argc - first) / 2;
                (first..first + streams).collect()
            }
        }
    }
}

/// Policy for an uppercase command name.
///
/// Unknown commands get [`KeyPolicy::First`]: prefixing a non-key first
/// argument is preferable to forwarding an unprefixed key.
pub fn policy_for(name: &str) -> KeyPolicy {
    match name {
        "PING" | "ECHO" | "INFO" | "TIME" | "DBSIZE" | "ASKING" | "READONLY" | "READWRITE"
        | "QUIT" | "AUTH" | "FLUSHALL" | "FLUSHDB" | "RANDOMKEY" | "SCAN" => KeyPolicy::Keyless,

        "MGET" | "DEL" | "EXISTS" | "UNLINK" | "TOUCH" | "WATCH" | "SINTER" | "SUNION"
        | "SDIFF" | "SINTERSTORE" | "SUNIONSTORE" | "SDIFFSTORE" | "PFCOUNT" | "PFMERGE" => {
            KeyPolicy::All
        }

        "BLPOP" | "BRPOP" | "BZPOPMIN" | "BZPOPMAX" | "BRPOPLPUSH" => KeyPolicy::AllButLast,

        "BITOP" | "OBJECT" => KeyPolicy::AllFrom(2),

        "MSET" | "MSETNX" => KeyPolicy::Pairs,

        "RENAME" | "RENAMENX" | "RPOPLPUSH" | "SMOVE" | "LMOVE" | "BLMOVE" | "COPY"
        | "GEOSEARCHSTORE" | "ZRANGESTORE" => KeyPolicy::FirstTwo,

        "ZUNIONSTORE" | "ZINTERSTORE" | "ZDIFFSTORE" => KeyPolicy::NumKeys { at: 2, dest: true },
        "ZUNION" | "ZINTER" | "ZDIFF" | "ZINTERCARD" | "SINTERCARD" | "LMPOP" | "ZMPOP" => {
            KeyPolicy::NumKeys { at: 1, dest: false }
        }
        // the script or function name and the timeout precede numkeys
        "BLMPOP" | "BZMPOP" | "EVAL" | "EVALSHA" | "EVAL_RO" | "EVALSHA_RO" | "FCALL"
        | "FCALL_RO" => KeyPolicy::NumKeys { at: 2, dest: false },

        "XREAD" | "XREADGROUP" => KeyPolicy::Streams,

        // strings and generic key commands
        "GET" | "SET" | "SETEX" | "PSETEX" | "SETNX" | "GETSET" | "GETDEL" | "GETEX" | "APPEND"
        | "STRLEN" | "INCR" | "DECR" | "INCRBY" | "DECRBY" | "INCRBYFLOAT" | "GETRANGE"
        | "SETRANGE" | "EXPIRE" | "PEXPIRE" | "EXPIREAT" | "PEXPIREAT" | "TTL" | "PTTL"
        | "PERSIST" | "TYPE" | "DUMP" | "RESTORE" | "KEYS" => KeyPolicy::First,

        // hashes
        "HGET" | "HSET" | "HSETNX" | "HMGET" | "HMSET" | "HDEL" | "HEXISTS" | "HLEN"
        | "HKEYS" | "HVALS" | "HGETALL" | "HINCRBY" | "HINCRBYFLOAT" | "HSTRLEN" | "HSCAN" => {
            KeyPolicy::First
        }

        // lists
        "LPUSH" | "RPUSH" | "LPUSHX" | "RPUSHX" | "LPOP" | "RPOP" | "LLEN" | "LRANGE"
        | "LINDEX" | "LSET" | "LREM" | "LTRIM" | "LINSERT" | "LPOS" => KeyPolicy::First,

        // sets
        "SADD" | "SREM" | "SMEMBERS" | "SISMEMBER" | "SMISMEMBER" | "SCARD" | "SPOP"
        | "SRANDMEMBER" | "SSCAN" => KeyPolicy::First,

        // sorted sets
        "ZADD" | "ZREM" | "ZRANGE" | "ZREVRANGE" | "ZRANGEBYSCORE" | "ZREVRANGEBYSCORE"
        | "ZRANK" | "ZREVRANK" | "ZSCORE" | "ZMSCORE" | "ZCARD" | "ZCOUNT" | "ZINCRBY"
        | "ZREMRANGEBYRANK" | "ZREMRANGEBYSCORE" | "ZPOPMIN" | "ZPOPMAX" | "ZSCAN" => {
            KeyPolicy::First
        }

        _ => KeyPolicy::First,
    }
}

/// Commands that act on the whole shared keyspace rather than on keys.
///
/// They cannot be confined to a tenant's prefix: `FLUSHALL` wipes every
/// tenant, `DBSIZE` and `SCAN` count or list every tenant's keys. They are
/// still forwarded; the router logs each use.
pub fn is_keyspace_wide(name: &str) -> bool {
    matches!(
        name,
        "FLUSHALL" | "FLUSHDB" | "DBSIZE" | "RANDOMKEY" | "SCAN" | "SWAPDB"
    )
}

/// Key positions for `args` (name included), whatever the name's case.
pub fn positions_for(args: &[Bytes]) -> Vec<usize> {
    let Some(name) = args.first() else {
        return Vec::new();
    };
    policy_for(&String::from_utf8_lossy(name).to_ascii_uppercase()).positions(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(parts: &[&str]) -> Vec<usize> {
        let args: Vec<Bytes> = parts
            .iter()
            .map(|p| Bytes::copy_from_slice(p.as_bytes()))
            .collect();
        positions_for(&args)
    }

    #[test]
    fn test_single_key_commands() {
        assert_eq!(positions(&["GET", "k"]), vec![1]);
        assert_eq!(positions(&["set", "k", "v", "EX", "10"]), vec![1]);
        assert_eq!(positions(&["EXPIRE", "k", "10"]), vec![1]);
        assert_eq!(positions(&["HSET", "h", "f1", "v1", "f2", "v2"]), vec![1]);
        assert_eq!(positions(&["ZADD", "z", "1", "m"]), vec![1]);
    }

    #[test]
    fn test_mget_covers_every_argument() {
        assert_eq!(positions(&["MGET", "a", "b", "c"]), vec![1, 2, 3]);
        let keys: Vec<String> = (0..249).map(|i| format!("k{}", i)).collect();
        let mut parts = vec!["MGET"];
        parts.extend(keys.iter().map(String::as_str));
        assert_eq!(positions(&parts), (1..250).collect::<Vec<_>>());
    }

    #[test]
    fn test_mset_takes_odd_positions() {
        assert_eq!(positions(&["MSET", "a", "1", "b", "2"]), vec![1, 3]);
        assert_eq!(positions(&["MSET", "a", "1", "b"]), vec![1, 3]);
    }

    #[test]
    fn test_two_key_commands() {
        assert_eq!(positions(&["RENAME", "a", "b"]), vec![1, 2]);
        assert_eq!(positions(&["SMOVE", "a", "b", "m"]), vec![1, 2]);
        assert_eq!(positions(&["BLMOVE", "a", "b", "LEFT", "RIGHT", "0"]), vec![1, 2]);
    }

    #[test]
    fn test_blocking_pops_skip_timeout() {
        assert_eq!(positions(&["BLPOP", "q1", "q2", "0"]), vec![1, 2]);
        assert_eq!(positions(&["BZPOPMIN", "z", "1.5"]), vec![1]);
        assert_eq!(positions(&["BRPOPLPUSH", "src", "dst", "5"]), vec![1, 2]);
        assert!(positions(&["BLPOP"]).is_empty());
    }

    #[test]
    fn test_store_commands_cover_destination_and_sources() {
        assert_eq!(positions(&["SUNIONSTORE", "d", "s1", "s2"]), vec![1, 2, 3]);
        assert_eq!(positions(&["SDIFFSTORE", "d", "s1"]), vec![1, 2]);
        assert_eq!(positions(&["PFMERGE", "d", "h1", "h2"]), vec![1, 2, 3]);
        assert_eq!(positions(&["BITOP", "AND", "d", "a", "b"]), vec![2, 3, 4]);
    }

    #[test]
    fn test_numkeys_commands() {
        assert_eq!(
            positions(&["ZUNIONSTORE", "d", "2", "z1", "z2", "WEIGHTS", "1", "2"]),
            vec![1, 3, 4]
        );
        assert_eq!(positions(&["ZINTER", "2", "a", "b", "WITHSCORES"]), vec![2, 3]);
        assert_eq!(positions(&["LMPOP", "1", "l", "LEFT"]), vec![2]);
        assert_eq!(positions(&["BLMPOP", "0", "2", "a", "b", "LEFT"]), vec![3, 4]);
        assert_eq!(positions(&["EVAL", "return 1", "1", "k", "arg"]), vec![3]);
        assert!(positions(&["EVALSHA", "abc", "0", "arg"]).is_empty());
    }

    #[test]
    fn test_numkeys_is_clamped_to_arguments() {
        assert_eq!(positions(&["ZUNIONSTORE", "d", "5", "z1"]), vec![1, 3]);
        assert_eq!(positions(&["ZUNIONSTORE", "d", "x", "z1"]), vec![1]);
        assert_eq!(positions(&["EVAL", "s", "-1", "k"]), Vec::<usize>::new());
    }

    #[test]
    fn test_stream_reads() {
        assert_eq!(
            positions(&["XREAD", "COUNT", "2", "STREAMS", "a", "b", "0", "0"]),
            vec![4, 5]
        );
        assert_eq!(
            positions(&["XREADGROUP", "GROUP", "g", "c", "streams", "s", ">"]),
            vec![5]
        );
        assert!(positions(&["XREAD", "COUNT", "2"]).is_empty());
    }

    #[test]
    fn test_keyless_commands() {
        assert!(positions(&["PING", "hi"]).is_empty());
        assert!(positions(&["ECHO", "hi"]).is_empty());
        assert!(positions(&["FLUSHALL"]).is_empty());
    }

    #[test]
    fn test_keyspace_wide_commands() {
        assert!(is_keyspace_wide("FLUSHALL"));
        assert!(is_keyspace_wide("DBSIZE"));
        assert!(!is_keyspace_wide("GET"));
    }

    #[test]
    fn test_unknown_command_defaults_to_first() {
        assert_eq!(policy_for("XSOMETHINGNEW"), KeyPolicy::First);
        assert_eq!(positions(&["XSOMETHINGNEW", "a", "b"]), vec![1]);
    }

    #[test]
    fn test_positions_never_exceed_arguments() {
        assert!(positions(&["GET"]).is_empty());
        assert!(positions(&["MGET"]).is_empty());
        assert!(positions(&[]).is_empty());
        assert!(positions(&["BITOP", "AND"]).is_empty());
        assert_eq!(positions(&["RENAME", "a"]), vec![1]);
    }
}
