//! OpenAPI document for every table and discovery endpoint.

use crate::catalog::{CheckConstraint, ColumnMetadata, ForeignKeyMetadata};
use crate::error::{ErrorBody, ErrorDetail};
use crate::handlers;
use crate::response::{Deleted, ListBody, MetaCount, RowBody};
use crate::service::FkValue;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "dynamic-api", description = "Catalog-driven CRUD over PostgreSQL tables"),
    paths(
        handlers::table::list,
        handlers::table::read,
        handlers::table::columns,
        handlers::table::search,
        handlers::table::fk_values,
        handlers::table::constraints,
        handlers::table::check_values,
        handlers::table::create,
        handlers::table::update,
        handlers::table::delete,
        handlers::discovery::schemas,
        handlers::discovery::tables_by_schema,
        handlers::discovery::all_tables,
    ),
    components(schemas(
        ColumnMetadata,
        ForeignKeyMetadata,
        CheckConstraint,
        FkValue,
        ListBody,
        RowBody,
        MetaCount,
        Deleted,
        ErrorBody,
        ErrorDetail,
    )),
    tags(
        (name = "table", description = "Rows and metadata of one table"),
        (name = "discovery", description = "Exposed schemas and tables")
    )
)]
pub struct ApiDoc;
