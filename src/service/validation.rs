//! Pre-mutation checks: foreign-key presence/format/existence and uniqueness of `*_code` columns.

use crate::catalog::{ColumnMetadata, ForeignKeyMetadata, TableIdentifier, TableMeta};
use crate::error::{AppError, ForeignKeyRule, ForeignKeyViolation, ViolationList};
use crate::service::fetch_scalar;
use crate::sql::{build_code_exists, build_reference_count, raw_text, TypedValue};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::PgPool;

/// Lookups the validator needs from the database.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Whether the table referenced by `fk` has a row whose key equals `value`.
    async fn reference_exists(&self, fk: &ForeignKeyMetadata, value: &str) -> Result<bool, AppError>;

    /// Whether a row other than `exclude` already holds `value` in `column` (case-insensitive).
    async fn code_exists(
        &self,
        ident: &TableIdentifier,
        column: &str,
        value: &str,
        exclude: Option<(&ColumnMetadata, TypedValue)>,
    ) -> Result<bool, AppError>;
}

#[async_trait]
impl ReferenceStore for PgPool {
    async fn reference_exists(&self, fk: &ForeignKeyMetadata, value: &str) -> Result<bool, AppError> {
        let q = build_reference_count(fk, value);
        let count: i64 = fetch_scalar(self, &q).await?;
        Ok(count > 0)
    }

    async fn code_exists(
        &self,
        ident: &TableIdentifier,
        column: &str,
        value: &str,
        exclude: Option<(&ColumnMetadata, TypedValue)>,
    ) -> Result<bool, AppError> {
        let q = build_code_exists(ident, column, value, exclude);
        fetch_scalar(self, &q).await
    }
}

pub struct ConstraintValidator;

impl ConstraintValidator {
    /// Check every foreign key whose column is in the payload. Per column the rules run in order
    /// (missing, format, existence) and stop at the first failure; all columns are reported.
    pub async fn validate_foreign_keys<S>(
        store: &S,
        fks: &[ForeignKeyMetadata],
        payload: &Map<String, Value>,
    ) -> Result<(), AppError>
    where
        S: ReferenceStore + ?Sized,
    {
        let mut violations = Vec::new();
        for fk in fks {
            let Some(raw) = payload.get(&fk.fk_column) else { continue };
            if let Some(rule) = Self::check_foreign_key(store, fk, raw).await? {
                violations.push(ForeignKeyViolation {
                    column: fk.fk_column.clone(),
                    rule,
                    value: raw_text(raw),
                });
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            tracing::warn!(violations = ?violations, "foreign key validation failed");
            Err(AppError::ForeignKey(ViolationList(violations)))
        }
    }

    async fn check_foreign_key<S>(
        store: &S,
        fk: &ForeignKeyMetadata,
        raw: &Value,
    ) -> Result<Option<ForeignKeyRule>, AppError>
    where
        S: ReferenceStore + ?Sized,
    {
        let Some(text) = raw_text(raw) else {
            return Ok(Some(ForeignKeyRule::Missing));
        };
        let Ok(id) = uuid::Uuid::parse_str(text.trim()) else {
            return Ok(Some(ForeignKeyRule::InvalidFormat));
        };
        if store.reference_exists(fk, &id.to_string()).await? {
            Ok(None)
        } else {
            Ok(Some(ForeignKeyRule::DoesNotExist))
        }
    }

    /// Reject `value` for `column` when another row already holds it. On update pass the current
    /// row's key as `exclude` so a row never conflicts with itself.
    pub async fn validate_unique_code<S>(
        store: &S,
        ident: &TableIdentifier,
        column: &str,
        value: &str,
        exclude: Option<(&ColumnMetadata, TypedValue)>,
    ) -> Result<(), AppError>
    where
        S: ReferenceStore + ?Sized,
    {
        let value = value.trim().to_uppercase();
        if store.code_exists(ident, column, &value, exclude).await? {
            tracing::warn!(table = %ident, column, value = %value, "duplicate code rejected");
            return Err(AppError::Uniqueness {
                column: column.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Uniqueness of every textual `*_code` column present in the payload.
    pub async fn validate_unique_codes<S>(
        store: &S,
        meta: &TableMeta,
        payload: &Map<String, Value>,
        exclude: Option<(&ColumnMetadata, TypedValue)>,
    ) -> Result<(), AppError>
    where
        S: ReferenceStore + ?Sized,
    {
        for column in meta.columns.iter().filter(|c| c.is_code() && c.is_textual()) {
            let Some(value) = payload.get(&column.name).and_then(raw_text) else { continue };
            let exclude = exclude.as_ref().map(|(pk, id)| (*pk, id.clone()));
            Self::validate_unique_code(store, &meta.ident, &column.name, &value, exclude).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::normalize_type;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REGION: &str = "7d6f0c1e-5b7a-4c1e-9a52-0f0a3b8e1c11";

    #[derive(Default)]
    struct MemoryStore {
        regions: Vec<String>,
        /// (primary key, ward_code)
        wards: Vec<(String, String)>,
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl ReferenceStore for MemoryStore {
        async fn reference_exists(&self, _fk: &ForeignKeyMetadata, value: &str) -> Result<bool, AppError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.regions.iter().any(|r| r.eq_ignore_ascii_case(value)))
        }

        async fn code_exists(
            &self,
            _ident: &TableIdentifier,
            _column: &str,
            value: &str,
            exclude: Option<(&ColumnMetadata, TypedValue)>,
        ) -> Result<bool, AppError> {
            let skip = exclude.and_then(|(_, id)| id.as_text().map(str::to_string));
            Ok(self
                .wards
                .iter()
                .any(|(id, code)| Some(id) != skip.as_ref() && code.eq_ignore_ascii_case(value)))
        }
    }

    fn region_fk() -> ForeignKeyMetadata {
        ForeignKeyMetadata {
            fk_column: "region_guid".into(),
            referenced_schema: "mst".into(),
            referenced_table: "region".into(),
            referenced_column: "region_guid".into(),
            display_column: Some("region_name_en".into()),
        }
    }

    fn col(name: &str, udt: &str) -> ColumnMetadata {
        ColumnMetadata {
            name: name.into(),
            normalized_type: normalize_type(udt),
            size: 0,
            nullable: true,
            auto_increment: false,
            is_primary_key: name == "ward_guid",
            is_foreign_key: false,
            native_type: String::new(),
        }
    }

    fn ward_meta() -> TableMeta {
        TableMeta {
            ident: TableIdentifier::new("mst", "ward"),
            columns: vec![col("ward_guid", "uuid"), col("ward_code", "varchar"), col("zone_code", "int4")],
            primary_keys: vec!["ward_guid".into()],
            foreign_keys: vec![region_fk()],
        }
    }

    fn payload(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    fn single_rule(err: AppError) -> ForeignKeyRule {
        match err {
            AppError::ForeignKey(list) => {
                assert_eq!(list.0.len(), 1);
                list.0[0].rule
            }
            other => panic!("expected foreign key violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_key_reports_format_before_existence() {
        let store = MemoryStore::default();
        let err = ConstraintValidator::validate_foreign_keys(
            &store,
            &[region_fk()],
            &payload(json!({ "region_guid": "not-a-uuid" })),
        )
        .await
        .unwrap_err();
        assert_eq!(single_rule(err), ForeignKeyRule::InvalidFormat);
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_key_is_missing() {
        let store = MemoryStore::default();
        let err = ConstraintValidator::validate_foreign_keys(&store, &[region_fk()], &payload(json!({ "region_guid": "  " })))
            .await
            .unwrap_err();
        assert_eq!(single_rule(err), ForeignKeyRule::Missing);
    }

    #[tokio::test]
    async fn well_formed_key_must_exist() {
        let store = MemoryStore {
            regions: vec![REGION.to_string()],
            ..Default::default()
        };
        let other = "11111111-2222-4333-8444-555555555555";
        let err = ConstraintValidator::validate_foreign_keys(&store, &[region_fk()], &payload(json!({ "region_guid": other })))
            .await
            .unwrap_err();
        assert_eq!(single_rule(err), ForeignKeyRule::DoesNotExist);

        ConstraintValidator::validate_foreign_keys(
            &store,
            &[region_fk()],
            &payload(json!({ "region_guid": REGION.to_uppercase() })),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn absent_foreign_key_columns_are_not_checked() {
        let store = MemoryStore::default();
        ConstraintValidator::validate_foreign_keys(&store, &[region_fk()], &payload(json!({ "ward_code": "A" })))
            .await
            .unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_code_conflicts_on_insert() {
        let store = MemoryStore {
            wards: vec![("42".into(), "ACT".into())],
            ..Default::default()
        };
        let err = ConstraintValidator::validate_unique_codes(&store, &ward_meta(), &payload(json!({ "ward_code": " act " })), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "ward_code already exists: ACT");
    }

    #[tokio::test]
    async fn update_does_not_conflict_with_itself() {
        let store = MemoryStore {
            wards: vec![("42".into(), "ACT".into())],
            ..Default::default()
        };
        let meta = ward_meta();
        let pk = meta.primary_key().unwrap();
        let body = payload(json!({ "ward_code": "ACT" }));

        ConstraintValidator::validate_unique_codes(&store, &meta, &body, Some((pk, TypedValue::Text("42".into()))))
            .await
            .unwrap();
        let err = ConstraintValidator::validate_unique_codes(&store, &meta, &body, Some((pk, TypedValue::Text("43".into()))))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Uniqueness { .. }));
    }

    #[tokio::test]
    async fn non_textual_code_columns_are_skipped() {
        let store = MemoryStore {
            wards: vec![("1".into(), "5".into())],
            ..Default::default()
        };
        ConstraintValidator::validate_unique_codes(&store, &ward_meta(), &payload(json!({ "zone_code": 5 })), None)
            .await
            .unwrap();
    }
}
