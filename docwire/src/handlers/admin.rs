//! Schema lifecycle and introspection commands.
use super::{CommandError, ErrorCode, Fields};
use crate::{
    ErrorKind, Result, ResultExt,
    backend::Backend,
    bson::{DateTime, Document},
    doc,
    translate::literal,
    wire::MAX_MESSAGE_LEN,
};

/// Largest document accepted by clients.
const MAX_DOCUMENT_LEN: i32 = 16 * 1024 * 1024;
const MAX_WRITE_BATCH: i32 = 100_000;
const WIRE_VERSION: i32 = 13;
/// Reported server version, drivers gate features on it.
const SERVER_VERSION: [i32; 3] = [5, 0, 42];

pub async fn create<B: Backend>(backend: &B, fields: &Fields<'_>) -> Result<Document> {
    let collection = fields.collection()?;
    let db = fields.database()?;

    let mut sql = String::from("CREATE COLLECTION ");
    literal::identifier(collection, &mut sql);

    let err = match backend.execute(&sql).await {
        Ok(_) => return Ok(doc! { "ok" => 1.0 }),
        Err(err) => err,
    };

    if matches!(err.kind(), ErrorKind::Database(e) if e.is_already_exists()) {
        let message = format!("Collection already exists. NS: {db}.{collection}");
        return Err(CommandError::new(ErrorCode::NamespaceExists, message).into());
    }
    Err(err.context(format!("create {collection:?}")))
}

pub async fn drop_database<B: Backend>(backend: &B, fields: &Fields<'_>) -> Result<Document> {
    let db = fields.database()?;

    let mut sql = String::from("DROP SCHEMA ");
    literal::identifier(db, &mut sql);
    sql.push_str(" CASCADE");

    backend.execute(&sql).await.context(|| format!("drop schema {db:?}"))?;

    Ok(doc! { "dropped" => db, "ok" => 1.0 })
}

pub fn host_info() -> Result<Document> {
    let cores = std::thread::available_parallelism().context(|| "available parallelism")?;

    Ok(doc! {
        "system" => doc! {
            "currentTime" => DateTime::now(),
            "hostname" => hostname(),
            "cpuAddrSize" => usize::BITS as i32,
            "numCores" => i32::try_from(cores.get()).unwrap_or(i32::MAX),
            "cpuArch" => std::env::consts::ARCH,
            "numaEnabled" => false,
        },
        "os" => doc! {
            "type" => title_case(std::env::consts::OS),
        },
        "ok" => 1.0,
    })
}

/// `hello` reports `isWritablePrimary`, the legacy handshake `ismaster`.
pub fn hello(hello: bool) -> Document {
    let mut doc = Document::new();
    doc.insert(if hello { "isWritablePrimary" } else { "ismaster" }, true);
    doc.insert("maxBsonObjectSize", MAX_DOCUMENT_LEN);
    doc.insert("maxMessageSizeBytes", MAX_MESSAGE_LEN as i32);
    doc.insert("maxWriteBatchSize", MAX_WRITE_BATCH);
    doc.insert("localTime", DateTime::now());
    doc.insert("minWireVersion", WIRE_VERSION);
    doc.insert("maxWireVersion", WIRE_VERSION);
    doc.insert("readOnly", false);
    doc.insert("ok", 1.0);
    doc
}

pub fn build_info() -> Document {
    let [major, minor, patch] = SERVER_VERSION;
    doc! {
        "version" => format!("{major}.{minor}.{patch}"),
        "gitVersion" => "",
        "versionArray" => crate::array![major, minor, patch, 0],
        "bits" => usize::BITS as i32,
        "debug" => cfg!(debug_assertions),
        "maxBsonObjectSize" => MAX_DOCUMENT_LEN,
        "docwireVersion" => env!("CARGO_PKG_VERSION"),
        "ok" => 1.0,
    }
}

fn hostname() -> String {
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .into_iter()
        .find_map(|path| {
            let name = std::fs::read_to_string(path).ok()?;
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_owned())
        })
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "localhost".to_owned())
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bson::Value;

    #[test]
    fn host_info_shape() {
        let doc = host_info().unwrap();
        assert_eq!(doc.keys().collect::<Vec<_>>(), ["system", "os", "ok"]);
        let system = doc.get("system").and_then(Value::as_document).unwrap();
        assert_eq!(system.get("cpuAddrSize"), Some(&Value::Int32(usize::BITS as i32)));
        assert!(matches!(system.get("currentTime"), Some(Value::DateTime(_))));
        assert!(matches!(system.get("hostname"), Some(Value::String(h)) if !h.is_empty()));
    }

    #[test]
    fn os_type() {
        assert_eq!(title_case("linux"), "Linux");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn handshake() {
        let doc = hello(false);
        assert_eq!(doc.command(), Some("ismaster"));
        assert_eq!(doc.get("maxWireVersion"), Some(&Value::Int32(WIRE_VERSION)));
        assert_eq!(doc.keys().last(), Some("ok"));
        assert_eq!(hello(true).command(), Some("isWritablePrimary"));
    }
}
