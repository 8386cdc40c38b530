use serde::Deserialize;

/// Oldest wire version speaking `OP_MSG` (MongoDB 3.6)
pub const MIN_WIRE_VERSION: i32 = 6;

/// Fields of the `hello` / `isMaster` reply used by the client
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HelloReply {
    #[serde(default)]
    pub is_writable_primary: Option<bool>,
    #[serde(default, rename = "ismaster")]
    pub is_master: Option<bool>,
    #[serde(default)]
    pub max_wire_version: i32,
    #[serde(default)]
    pub min_wire_version: i32,
    #[serde(default)]
    pub set_name: Option<String>,
    #[serde(default)]
    pub max_bson_object_size: Option<i32>,
}

impl HelloReply {
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.is_writable_primary.or(self.is_master).unwrap_or(false)
    }

    #[must_use]
    pub const fn supports_op_msg(&self) -> bool {
        self.max_wire_version >= MIN_WIRE_VERSION
    }
}

/// One entry of the `listDatabases` reply
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ListDatabasesReply {
    pub databases: Vec<DatabaseEntry>,
}
