use hashbrown::HashMap;
use once_cell::sync::Lazy;

/// Routing class of a supported command. The splitter dispatches on this
/// closed set; growing the catalogue below changes behavior without touching
/// the splitter itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Single-key command, routed by the key at position 1.
    Simple,
    /// EVAL/EVALSHA, routed by the first Redis key at position 3.
    Eval,
    /// Multi-key read, fragmented per host and reassembled positionally.
    MultiGet,
    /// Interleaved key/value write, fragmented per host, collapsed to OK.
    MultiSet,
    /// Multi-key command whose integer replies are summed across hosts.
    SumResult,
}

pub const MGET: &str = "mget";
pub const MSET: &str = "mset";

const SIMPLE_COMMANDS: &[&str] = &[
    "append",
    "bitcount",
    "bitpos",
    "decr",
    "decrby",
    "dump",
    "expire",
    "expireat",
    "get",
    "getbit",
    "getdel",
    "getrange",
    "getset",
    "hdel",
    "hexists",
    "hget",
    "hgetall",
    "hincrby",
    "hincrbyfloat",
    "hkeys",
    "hlen",
    "hmget",
    "hmset",
    "hscan",
    "hset",
    "hsetnx",
    "hstrlen",
    "hvals",
    "incr",
    "incrby",
    "incrbyfloat",
    "lindex",
    "linsert",
    "llen",
    "lpop",
    "lpush",
    "lpushx",
    "lrange",
    "lrem",
    "lset",
    "ltrim",
    "persist",
    "pexpire",
    "pexpireat",
    "pfadd",
    "psetex",
    "pttl",
    "restore",
    "rpop",
    "rpush",
    "rpushx",
    "sadd",
    "scard",
    "set",
    "setbit",
    "setex",
    "setnx",
    "setrange",
    "sismember",
    "smembers",
    "spop",
    "srandmember",
    "srem",
    "sscan",
    "strlen",
    "ttl",
    "type",
    "zadd",
    "zcard",
    "zcount",
    "zincrby",
    "zlexcount",
    "zrange",
    "zrangebylex",
    "zrangebyscore",
    "zrank",
    "zrem",
    "zremrangebylex",
    "zremrangebyrank",
    "zremrangebyscore",
    "zrevrange",
    "zrevrangebylex",
    "zrevrangebyscore",
    "zrevrank",
    "zscan",
    "zscore",
];

const EVAL_COMMANDS: &[&str] = &["eval", "evalsha"];

const SUM_RESULT_COMMANDS: &[&str] = &["del", "exists", "touch", "unlink"];

static KIND_MAP: Lazy<HashMap<&'static [u8], CommandKind>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for name in SIMPLE_COMMANDS {
        map.insert(name.as_bytes(), CommandKind::Simple);
    }
    for name in EVAL_COMMANDS {
        map.insert(name.as_bytes(), CommandKind::Eval);
    }
    for name in SUM_RESULT_COMMANDS {
        map.insert(name.as_bytes(), CommandKind::SumResult);
    }
    map.insert(MGET.as_bytes(), CommandKind::MultiGet);
    map.insert(MSET.as_bytes(), CommandKind::MultiSet);
    map
});

/// Single-key commands routed by their first key.
pub fn simple_commands() -> &'static [&'static str] {
    SIMPLE_COMMANDS
}

/// Script invocations routed by the key at position 3.
pub fn eval_commands() -> &'static [&'static str] {
    EVAL_COMMANDS
}

/// Multi-key commands whose per-host integer replies are summed.
pub fn sum_result_commands() -> &'static [&'static str] {
    SUM_RESULT_COMMANDS
}

/// Routing class for a lowercase command name.
pub fn command_kind(name: &[u8]) -> Option<CommandKind> {
    KIND_MAP.get(name).copied()
}

/// Every supported command with its routing class, for handler registration.
pub fn all_commands() -> impl Iterator<Item = (&'static str, CommandKind)> {
    SIMPLE_COMMANDS
        .iter()
        .map(|name| (*name, CommandKind::Simple))
        .chain(EVAL_COMMANDS.iter().map(|name| (*name, CommandKind::Eval)))
        .chain(
            SUM_RESULT_COMMANDS
                .iter()
                .map(|name| (*name, CommandKind::SumResult)),
        )
        .chain([(MGET, CommandKind::MultiGet), (MSET, CommandKind::MultiSet)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_routes_the_core_classes() {
        assert_eq!(command_kind(b"get"), Some(CommandKind::Simple));
        assert_eq!(command_kind(b"eval"), Some(CommandKind::Eval));
        assert_eq!(command_kind(b"evalsha"), Some(CommandKind::Eval));
        assert_eq!(command_kind(b"mget"), Some(CommandKind::MultiGet));
        assert_eq!(command_kind(b"mset"), Some(CommandKind::MultiSet));
        assert_eq!(command_kind(b"del"), Some(CommandKind::SumResult));
    }

    #[test]
    fn lookup_expects_lowercase_names() {
        assert_eq!(command_kind(b"GET"), None);
        assert_eq!(command_kind(b"ping"), None);
        assert_eq!(command_kind(b"keys"), None);
    }

    #[test]
    fn registration_listing_covers_the_whole_catalogue() {
        let listed = all_commands().count();
        let expected = SIMPLE_COMMANDS.len() + EVAL_COMMANDS.len() + SUM_RESULT_COMMANDS.len() + 2;
        assert_eq!(listed, expected);
        assert!(all_commands().all(|(name, _)| command_kind(name.as_bytes()).is_some()));
    }
}
