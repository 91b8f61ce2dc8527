//! CrudService: metadata-driven CRUD with pre-write constraint validation.

mod crud;
mod validation;
pub(crate) use crud::fetch_scalar;
pub use crud::{apply_audit_fields, normalize_row, CrudService, FkValue, WriteKind, DEFAULT_STATUS, SYSTEM_USER};
pub use validation::{ConstraintValidator, ReferenceStore};
