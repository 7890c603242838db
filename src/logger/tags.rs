/// Log tags, one per subsystem
///
/// `to_debug_key` is the suffix used by --debug-<key> and --verbose-<key>.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Monitor,
    Resolver,
    Operations,
    Signals,
    Valuation,
    Sync,
    Store,
    Batch,
    Notify,
}

impl LogTag {
    pub const ALL: [LogTag; 11] = [
        LogTag::System,
        LogTag::Config,
        LogTag::Monitor,
        LogTag::Resolver,
        LogTag::Operations,
        LogTag::Signals,
        LogTag::Valuation,
        LogTag::Sync,
        LogTag::Store,
        LogTag::Batch,
        LogTag::Notify,
    ];

    /// Inverse of `to_debug_key`
    pub fn from_key(key: &str) -> Option<LogTag> {
        let key = key.trim();
        LogTag::ALL.into_iter().find(|tag| tag.to_debug_key() == key)
    }

    pub fn to_debug_key(&self) -> String {
        self.to_plain_string().to_lowercase()
    }

    pub fn to_plain_string(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Monitor => "MONITOR",
            LogTag::Resolver => "RESOLVER",
            LogTag::Operations => "OPS",
            LogTag::Signals => "SIGNALS",
            LogTag::Valuation => "VALUATION",
            LogTag::Sync => "SYNC",
            LogTag::Store => "STORE",
            LogTag::Batch => "BATCH",
            LogTag::Notify => "NOTIFY",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_plain_string())
    }
}
