use serde::{Deserialize, Serialize};

use moon_dialect::SemanticType;

/// Reserved top-level resources a collection name can never shadow.
pub const RESERVED_NAMES: &[&str] = &["collections", "auth", "users", "apikeys", "doc", "health"];

pub const MAX_COLUMNS_PER_COLLECTION_HARD_CAP: usize = 100;
pub const SYSTEM_TABLE_PREFIX: &str = "moon_";

/// One user-declared (or system) column. `id` is the only system column
/// clients ever see; `pkid` is tracked out-of-band by [`Collection`] and
/// never modelled as a `Column` at all, since no request ever references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    /// Decimal scale; ignored for every other semantic type. Defaults to
    /// [`moon_decimal::DEFAULT_SCALE`] when the column is declared decimal
    /// and the caller didn't specify one.
    #[serde(default)]
    pub scale: Option<u32>,
    /// System columns (`id`) are created, owned and protected by the
    /// engine: clients can't add, remove, rename or modify them.
    #[serde(default, skip_serializing)]
    pub system: bool,
}

impl Column {
    pub fn id_column() -> Self {
        Column {
            name: "id".to_owned(),
            semantic_type: SemanticType::String,
            nullable: false,
            unique: true,
            scale: None,
            system: true,
        }
    }

    pub fn effective_scale(&self) -> u32 {
        self.scale.unwrap_or(moon_decimal::DEFAULT_SCALE)
    }
}

/// A collection's shape: its name and its full ordered column list,
/// including the `id` system column. `pkid` is implicit — every physical
/// table has one, but it's never represented here and never leaves the DDL
/// engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Collection {
    /// Builds a new collection from client-supplied user columns, prepending
    /// the `id` system column. Does not validate — see [`crate::validate`].
    pub fn new(name: String, user_columns: Vec<Column>) -> Self {
        let mut columns = vec![Column::id_column()];
        columns.extend(user_columns);
        Collection { name, columns }
    }

    pub fn user_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.system)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        let lower = name.to_ascii_lowercase();
        self.columns.iter().find(|c| c.name == lower)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// String-typed columns, in declaration order — used by the search
    /// expansion to build the `OR … LIKE` clause.
    pub fn string_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.semantic_type == SemanticType::String)
    }
}

pub fn is_system_table(name: &str) -> bool {
    name.to_ascii_lowercase().starts_with(SYSTEM_TABLE_PREFIX) || name.eq_ignore_ascii_case("moon")
}
