use super::CommandError;
use crate::bson::{Document, Tag, Value};

/// Fields sent by drivers for session and routing plumbing, accepted by every command.
const PLUMBING: &[&str] = &[
    "$db",
    "lsid",
    "$clusterTime",
    "$readPreference",
    "apiVersion",
    "apiStrict",
    "apiDeprecationErrors",
    "txnNumber",
    "autocommit",
    "startTransaction",
];

/// Implemented commands, keyed by the first field of the command document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Find,
    Count,
    Create,
    DropDatabase,
    HostInfo,
    Hello,
    IsMaster,
    Ping,
    BuildInfo,
    /// Detected to be rejected, sharding is never reported.
    PrintShardingStatus,
}

impl Command {
    pub fn parse(name: &str) -> Option<Command> {
        let command = match name {
            "find" => Command::Find,
            "count" => Command::Count,
            "create" => Command::Create,
            "dropDatabase" => Command::DropDatabase,
            "hostInfo" => Command::HostInfo,
            "hello" => Command::Hello,
            "isMaster" | "ismaster" => Command::IsMaster,
            "ping" => Command::Ping,
            "buildInfo" | "buildinfo" => Command::BuildInfo,
            "printShardingStatus" => Command::PrintShardingStatus,
            _ => return None,
        };
        Some(command)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Command::Find => "find",
            Command::Count => "count",
            Command::Create => "create",
            Command::DropDatabase => "dropDatabase",
            Command::HostInfo => "hostInfo",
            Command::Hello => "hello",
            Command::IsMaster => "isMaster",
            Command::Ping => "ping",
            Command::BuildInfo => "buildInfo",
            Command::PrintShardingStatus => "printShardingStatus",
        }
    }

    /// Fields read by the command handler.
    const fn consumed(self) -> &'static [&'static str] {
        match self {
            Command::Find => &["filter", "projection", "sort", "limit"],
            Command::Count => &["query", "limit"],
            _ => &[],
        }
    }

    /// Fields that are recognized but not supported.
    const fn unimplemented(self) -> &'static [&'static str] {
        match self {
            Command::Find => &[
                "hint", "skip", "max", "min", "returnKey", "showRecordId", "tailable",
                "oplogReplay", "noCursorTimeout", "awaitData", "allowPartialResults",
                "collation", "allowDiskUse", "let",
            ],
            Command::Count => &["skip", "hint", "collation"],
            Command::Create => &[
                "capped", "timeseries", "expireAfterSeconds", "clusteredIndex",
                "changeStreamPreAndPostImages", "size", "max", "storageEngine", "validator",
                "validationLevel", "validationAction", "indexOptionDefaults", "viewOn",
                "pipeline", "collation",
            ],
            _ => &[],
        }
    }

    /// Fields accepted without effect, besides the session plumbing.
    const fn ignored(self) -> &'static [&'static str] {
        match self {
            Command::Find => &["batchSize", "singleBatch", "comment", "maxTimeMS", "readConcern"],
            // legacy projection, counting ignores it
            Command::Count => &["comment", "maxTimeMS", "readConcern", "fields"],
            Command::Create | Command::DropDatabase => &["writeConcern", "comment"],
            Command::Hello | Command::IsMaster => &[
                "client", "helloOk", "compression", "saslSupportedMechs", "loadBalanced",
                "speculativeAuthenticate", "topologyVersion", "maxAwaitTimeMS", "comment",
            ],
            Command::HostInfo | Command::Ping | Command::BuildInfo => &["comment"],
            Command::PrintShardingStatus => &[],
        }
    }
}

/// Typed access to the fields of one command document.
pub struct Fields<'a> {
    command: Command,
    doc: &'a Document,
}

impl<'a> Fields<'a> {
    /// Reject every field that is neither read, ignored, nor session plumbing.
    pub fn new(command: Command, doc: &'a Document) -> Result<Fields<'a>, CommandError> {
        for key in doc.keys().skip(1) {
            if command.consumed().contains(&key) || PLUMBING.contains(&key) {
                continue;
            }
            if command.ignored().contains(&key) {
                tracing::debug!("{}: ignoring field {key:?}", command.name());
                continue;
            }
            if !command.unimplemented().contains(&key) {
                tracing::debug!("{}: unknown field {key:?}", command.name());
            }
            return Err(CommandError::not_implemented(command.name(), key));
        }
        Ok(Self { command, doc })
    }

    /// The command field value, the collection name for collection commands.
    pub fn collection(&self) -> Result<&'a str, CommandError> {
        self.string(self.command.name())
    }

    /// `$db`, required non empty.
    pub fn database(&self) -> Result<&'a str, CommandError> {
        match self.string("$db")? {
            "" => Err(CommandError::missing(self.command.name(), "$db")),
            db => Ok(db),
        }
    }

    pub fn string(&self, field: &str) -> Result<&'a str, CommandError> {
        match self.doc.get(field) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(self.mistyped(field, Tag::String, other)),
            None => Err(CommandError::missing(self.command.name(), field)),
        }
    }

    /// Optional document field, absent or null is empty.
    pub fn document(&self, field: &str) -> Result<Document, CommandError> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(Document::new()),
            Some(Value::Document(doc)) => Ok(doc.clone()),
            Some(other) => Err(self.mistyped(field, Tag::Document, other)),
        }
    }

    /// Optional whole number field, absent or null is `0`.
    pub fn integer(&self, field: &str) -> Result<i64, CommandError> {
        match self.doc.get(field) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => match value.as_whole_number() {
                Some(n) => Ok(n),
                None => Err(self.mistyped(field, Tag::Int64, value)),
            },
        }
    }

    fn mistyped(&self, field: &str, expected: Tag, found: &Value) -> CommandError {
        CommandError::mistyped(self.command.name(), field, expected, found.tag())
    }
}
