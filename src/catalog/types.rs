//! Request-scoped metadata values built from the catalog.

use crate::error::AppError;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::sync::OnceLock;
use utoipa::ToSchema;

/// Placeholder reported when a referenced table has no display-worthy column.
pub const NO_DISPLAY_COLUMN: &str = "NONE";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct TableIdentifier {
    pub schema: String,
    pub table: String,
}

impl TableIdentifier {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        TableIdentifier {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.schema.trim().is_empty() || self.table.trim().is_empty()
    }
}

impl std::fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ColumnMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub normalized_type: String,
    pub size: i32,
    pub nullable: bool,
    #[serde(rename = "autoIncrement")]
    pub auto_increment: bool,
    #[serde(rename = "primaryKey")]
    pub is_primary_key: bool,
    #[serde(rename = "isForeignKey")]
    pub is_foreign_key: bool,
    /// Quoted `"udt_schema"."udt_name"`, used to cast bound parameters.
    #[serde(skip)]
    pub native_type: String,
}

impl ColumnMetadata {
    pub fn is_code(&self) -> bool {
        is_code_column(&self.name)
    }

    pub fn is_textual(&self) -> bool {
        is_textual_type(&self.normalized_type)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ForeignKeyMetadata {
    #[serde(rename = "fkColumn")]
    pub fk_column: String,
    #[serde(rename = "pkTableSchema")]
    pub referenced_schema: String,
    #[serde(rename = "pkTable")]
    pub referenced_table: String,
    #[serde(rename = "pkColumn")]
    pub referenced_column: String,
    #[serde(rename = "displayColumn", serialize_with = "serialize_display_column")]
    #[schema(value_type = String)]
    pub display_column: Option<String>,
}

fn serialize_display_column<S: Serializer>(v: &Option<String>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(v.as_deref().unwrap_or(NO_DISPLAY_COLUMN))
}

impl ForeignKeyMetadata {
    pub fn referenced(&self) -> TableIdentifier {
        TableIdentifier::new(&self.referenced_schema, &self.referenced_table)
    }

    /// Column shown to users for a referenced row; the referenced key when nothing better exists.
    pub fn display_or_key(&self) -> &str {
        self.display_column.as_deref().unwrap_or(&self.referenced_column)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CheckConstraint {
    pub name: String,
    pub definition: String,
}

/// Everything the engine needs about one table, fetched fresh for a request.
#[derive(Clone, Debug)]
pub struct TableMeta {
    pub ident: TableIdentifier,
    pub columns: Vec<ColumnMetadata>,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyMetadata>,
}

impl TableMeta {
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The single primary key column. Missing or composite keys are configuration errors.
    pub fn primary_key(&self) -> Result<&ColumnMetadata, AppError> {
        match self.primary_keys.as_slice() {
            [pk] => self
                .column(pk)
                .ok_or_else(|| AppError::Configuration(format!("primary key {} missing from columns of {}", pk, self.ident))),
            [] => Err(AppError::Configuration(format!("no primary key defined for {}", self.ident))),
            many => Err(AppError::Configuration(format!(
                "composite primary key ({}) on {} is not supported",
                many.join(", "),
                self.ident
            ))),
        }
    }
}

/// Map raw catalog type names to the canonical tags used for coercion. Unknown names pass through.
pub fn normalize_type(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let tag = match lower.as_str() {
        "int2" => "smallint",
        "int4" => "integer",
        "int8" => "bigint",
        "serial" => "serial",
        "bigserial" => "bigserial",
        "json" | "jsonb" => "json",
        "varchar" => "varchar",
        "bpchar" => "char",
        "timestamptz" => "timestamp with time zone",
        "timestamp" => "timestamp",
        _ => return lower,
    };
    tag.to_string()
}

/// `*_code` (case-insensitive): uppercased on write, checked for uniqueness.
pub fn is_code_column(name: &str) -> bool {
    name.to_lowercase().ends_with("_code")
}

/// Any name containing "code": uppercased on write and read, compared case-insensitively in search.
pub fn mentions_code(name: &str) -> bool {
    name.to_lowercase().contains("code")
}

pub fn is_textual_type(normalized: &str) -> bool {
    normalized.contains("char") || normalized.contains("text")
}

/// Pick the column shown for a referenced row: first containing `name_en`, else first containing `code`.
pub fn infer_display_column<'a, I>(referenced_columns: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let columns: Vec<&str> = referenced_columns.into_iter().collect();
    let first_containing = |needle: &str| columns.iter().find(|c| c.to_lowercase().contains(needle)).copied();
    first_containing("name_en")
        .or_else(|| first_containing("code"))
        .map(str::to_string)
}

fn check_list_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)ARRAY\[(.*?)\]|IN\s*\((.*?)\)").expect("static regex"))
}

fn cast_suffix_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"::[a-zA-Z_ ]+").expect("static regex"))
}

/// Enumerated values of check constraints that mention `column`, from `ARRAY[...]` or `IN (...)` lists.
pub fn extract_check_values<'a, I>(definitions: I, column: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let column = column.to_lowercase();
    let mut values = Vec::new();
    for def in definitions {
        if !def.to_lowercase().contains(&column) {
            continue;
        }
        for caps in check_list_pattern().captures_iter(def) {
            let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else { continue };
            for item in raw.as_str().split(',') {
                let clean = cast_suffix_pattern()
                    .replace_all(item, "")
                    .replace(['(', ')', '\''], "")
                    .trim()
                    .to_string();
                if !clean.is_empty() {
                    values.push(clean);
                }
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_aliases_normalize() {
        assert_eq!(normalize_type("int2"), "smallint");
        assert_eq!(normalize_type("INT4"), "integer");
        assert_eq!(normalize_type("int8"), "bigint");
        assert_eq!(normalize_type("bpchar"), "char");
        assert_eq!(normalize_type("timestamptz"), "timestamp with time zone");
        assert_eq!(normalize_type("jsonb"), "json");
        assert_eq!(normalize_type("json"), "json");
        assert_eq!(normalize_type("uuid"), "uuid");
        assert_eq!(normalize_type("ward_status"), "ward_status");
    }

    #[test]
    fn name_en_beats_code_regardless_of_position() {
        let cols = ["region_guid", "region_code", "region_name_en", "region_name_hi"];
        assert_eq!(infer_display_column(cols), Some("region_name_en".to_string()));
    }

    #[test]
    fn code_is_second_choice_and_none_is_fallback() {
        assert_eq!(
            infer_display_column(["zone_guid", "Zone_Code", "remarks"]),
            Some("Zone_Code".to_string())
        );
        assert_eq!(infer_display_column(["id", "label"]), None);
    }

    #[test]
    fn display_falls_back_to_referenced_key() {
        let fk = ForeignKeyMetadata {
            fk_column: "region_guid".into(),
            referenced_schema: "mst".into(),
            referenced_table: "region".into(),
            referenced_column: "region_guid".into(),
            display_column: None,
        };
        assert_eq!(fk.display_or_key(), "region_guid");
        let json = serde_json::to_value(&fk).unwrap();
        assert_eq!(json["displayColumn"], "NONE");
        assert_eq!(json["pkTable"], "region");
    }

    #[test]
    fn code_column_predicates() {
        assert!(is_code_column("ward_code"));
        assert!(is_code_column("WARD_CODE"));
        assert!(!is_code_column("codename"));
        assert!(mentions_code("codename"));
        assert!(!mentions_code("ward_name_en"));
    }

    #[test]
    fn check_values_from_any_array() {
        let defs = [
            "CHECK (((status)::text = ANY ((ARRAY['ACTIVE'::character varying, 'INACTIVE'::character varying])::text[])))",
            "CHECK ((priority > 0))",
        ];
        assert_eq!(extract_check_values(defs, "status"), vec!["ACTIVE", "INACTIVE"]);
        assert!(extract_check_values(defs, "priority").is_empty());
    }

    #[test]
    fn check_values_from_in_list() {
        let defs = ["CHECK (gender IN ('M', 'F', 'O'))"];
        assert_eq!(extract_check_values(defs, "GENDER"), vec!["M", "F", "O"]);
        assert!(extract_check_values(defs, "status").is_empty());
    }

    #[test]
    fn primary_key_must_be_single_column() {
        let mut meta = TableMeta {
            ident: TableIdentifier::new("mst", "ward"),
            columns: Vec::new(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
        };
        assert!(matches!(meta.primary_key(), Err(AppError::Configuration(_))));
        meta.primary_keys = vec!["a".into(), "b".into()];
        let err = meta.primary_key().unwrap_err();
        assert!(err.to_string().contains("composite"));
    }
}
