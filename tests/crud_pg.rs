use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dynamic_api::{api_routes, AccessConfig, AppState, Catalog};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt; // for `oneshot`

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", "10.1.2.3");
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn access_for(schema: &str) -> AccessConfig {
    AccessConfig {
        valid_schemas: vec![schema.to_string()],
        ..Default::default()
    }
}

/// Router over a pool that never connects; only requests rejected before touching the database work.
fn offline_app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        .unwrap();
    api_routes(AppState::new(pool, access_for("mst")))
}

#[tokio::test]
async fn health_version_and_openapi_are_served() {
    let app = offline_app();
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "dynamic-api");

    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/{schema}/{table}"].is_object());
}

#[tokio::test]
async fn unknown_schema_is_a_configuration_error() {
    let app = offline_app();
    let (status, body) = send(&app, "GET", "/secret/users", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "configuration_error");

    let (status, body) = send(&app, "GET", "/schemas", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["mst"]));
}

#[tokio::test]
async fn non_object_body_is_rejected() {
    let app = offline_app();
    let (status, body) = send(&app, "POST", "/mst/ward", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn blank_identifiers_skip_the_catalog() {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://nobody@127.0.0.1:1/none")
        .unwrap();
    let catalog = Catalog::new(&pool);
    assert!(catalog.get_columns("", "ward").await.unwrap().is_empty());
    assert!(catalog.get_primary_keys(" ", "t").await.unwrap().is_empty());
    assert!(catalog.get_foreign_keys("mst", "").await.unwrap().is_empty());
    assert!(catalog.get_check_constraints("", "").await.unwrap().is_empty());
    assert!(catalog.get_tables_by_schema("  ", &access_for("mst")).await.unwrap().is_empty());
}

async fn setup(pool: &PgPool, schema: &str) -> String {
    let ddl = [
        format!("CREATE SCHEMA \"{schema}\""),
        format!(
            "CREATE TABLE \"{schema}\".region (
                region_guid uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                region_code varchar(20),
                region_name_en varchar(100)
            )"
        ),
        format!(
            "CREATE TABLE \"{schema}\".ward (
                ward_guid uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                ward_code varchar(20),
                ward_name_en varchar(100),
                amount numeric(30,2),
                ward_no int4,
                region_guid uuid REFERENCES \"{schema}\".region(region_guid),
                status varchar(20) CHECK (status IN ('ACTIVE', 'INACTIVE')),
                created_by varchar(50),
                created_date timestamptz,
                created_ip_addr varchar(50),
                created_uri varchar(255),
                modified_by varchar(50),
                modified_date timestamptz,
                modified_ip_addr varchar(50),
                modified_uri varchar(255)
            )"
        ),
    ];
    for stmt in &ddl {
        sqlx::query(stmt).execute(pool).await.unwrap();
    }
    let region: uuid::Uuid = sqlx::query_scalar(&format!(
        "INSERT INTO \"{schema}\".region (region_code, region_name_en) VALUES ('N', 'North') RETURNING region_guid"
    ))
    .fetch_one(pool)
    .await
    .unwrap();
    region.to_string()
}

#[tokio::test]
async fn ward_lifecycle_against_postgres() {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping");
        return;
    };
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.unwrap();
    let schema = format!("dyn_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let region = setup(&pool, &schema).await;
    let app = api_routes(AppState::new(pool.clone(), access_for(&schema)));
    let wards = format!("/{}/ward", schema);

    // insert: code uppercased, audit fields and default status filled in
    let (status, body) = send(
        &app,
        "POST",
        &wards,
        Some(json!({ "ward_code": "abc", "region_guid": region, "amount": "100.50", "ward_no": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let row = &body["data"];
    assert_eq!(row["ward_code"], "ABC");
    assert_eq!(row["status"], "ACTIVE");
    assert_eq!(row["created_by"], "System");
    assert_eq!(row["created_ip_addr"], "10.1.2.3");
    assert_eq!(row["created_uri"], wards.as_str());
    assert_eq!(row["amount"], "100.50");
    assert_eq!(row["created_date"].as_str().map(str::len), Some(19));
    let first_id = row["ward_guid"].as_str().unwrap().to_string();

    // numeric values come back digit for digit
    let (status, body) = send(
        &app,
        "POST",
        &wards,
        Some(json!({ "ward_code": "big", "amount": "12345678901234567890.12" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["amount"], "12345678901234567890.12");
    let big_id = body["data"]["ward_guid"].as_str().unwrap().to_string();
    let (status, _) = send(&app, "DELETE", &format!("{}/{}", wards, big_id), None).await;
    assert_eq!(status, StatusCode::OK);

    // same code again
    let (status, body) = send(&app, "POST", &wards, Some(json!({ "ward_code": "abc", "region_guid": region }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["message"], "ward_code already exists: ABC");

    // malformed foreign key is reported as a format problem
    let (status, body) = send(&app, "POST", &wards, Some(json!({ "ward_code": "new", "region_guid": "not-a-uuid" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["details"][0]["rule"], "invalid_format");

    // well-formed but unknown foreign key
    let missing = uuid::Uuid::new_v4().to_string();
    let (status, body) = send(&app, "POST", &wards, Some(json!({ "ward_code": "new", "region_guid": missing }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["details"][0]["rule"], "does_not_exist");

    let (status, body) = send(&app, "GET", &wards, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], 1);

    let (_, body) = send(&app, "GET", &format!("{}/{}", wards, first_id), None).await;
    assert_eq!(body["data"][0]["ward_code"], "ABC");

    // search: typed comparison and case-insensitive code match
    let (_, body) = send(&app, "GET", &format!("{}/search?amount=%3E%3D100", wards), None).await;
    assert_eq!(body["meta"]["count"], 1);
    let (_, body) = send(&app, "GET", &format!("{}/search?amount=%3E%3D200", wards), None).await;
    assert_eq!(body["meta"]["count"], 0);
    let (_, body) = send(&app, "GET", &format!("{}/search?ward_code=abc&ward_no=7", wards), None).await;
    assert_eq!(body["meta"]["count"], 1);
    let (status, _) = send(&app, "GET", &format!("{}/search?nope=1", wards), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = send(&app, "GET", &format!("{}/search?region_guid=nope", wards), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "conversion_error");

    // updating a row with its own code is not a conflict
    let (status, body) = send(
        &app,
        "PUT",
        &format!("{}/{}", wards, first_id),
        Some(json!({ "ward_code": "abc", "ward_name_en": "Central" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["ward_name_en"], "Central");
    assert_eq!(body["data"]["modified_by"], "System");

    // another row taking the same code is
    let (_, body) = send(&app, "POST", &wards, Some(json!({ "ward_code": "xyz" }))).await;
    let second_id = body["data"]["ward_guid"].as_str().unwrap().to_string();
    let (status, _) = send(&app, "PUT", &format!("{}/{}", wards, second_id), Some(json!({ "ward_code": "ABC" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "PUT", &format!("{}/not-a-guid", wards), Some(json!({ "ward_no": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"].as_str().unwrap().contains("ward_guid is invalid GUID: not-a-guid"));

    let (status, body) = send(&app, "PUT", &format!("{}/{}", wards, missing), Some(json!({ "ward_no": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"]["message"].as_str().unwrap().contains("record not found for ID"));

    // metadata endpoints
    let (_, body) = send(&app, "GET", &format!("{}/columns", wards), None).await;
    assert_eq!(body["data"][0]["name"], "ward_guid");
    assert_eq!(body["data"][0]["primaryKey"], true);

    let (_, body) = send(&app, "GET", &format!("{}/fk-values/region_guid", wards), None).await;
    assert_eq!(body["data"][0]["id"], region.as_str());
    assert_eq!(body["data"][0]["value"], "North");

    let (_, body) = send(&app, "GET", &format!("{}/check/status", wards), None).await;
    assert_eq!(body["data"], json!(["ACTIVE", "INACTIVE"]));

    let (_, body) = send(&app, "GET", &format!("/tables/{}", schema), None).await;
    assert_eq!(body["data"], json!(["region", "ward"]));

    // delete reports the affected count
    let (status, body) = send(&app, "DELETE", &format!("{}/{}", wards, second_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], 1);

    // a referenced region cannot be deleted
    let (status, _) = send(&app, "DELETE", &format!("/{}/region/{}", schema, region), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    sqlx::query(&format!("DROP SCHEMA \"{}\" CASCADE", schema))
        .execute(&pool)
        .await
        .unwrap();
}
