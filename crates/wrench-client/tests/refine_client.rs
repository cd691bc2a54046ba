//! RefineClient against the in-process fake service.

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;

use wrench_client::{ClientConfig, ClientError, RefineClient};
use wrench_core::{
    ApplyOutcome, ExportFormat, ImportOptions, OperationBatch, ProjectId, ProjectName,
    SourceFormat,
};
use wrench_testkit::{FakeConfig, FakeRefine};

const SAMPLE_CSV: &str = "first_name,last_name\nBaked,Beans\nLovely,Spam\nWonderful,Spam\n";

const UPPERCASE_LAST_NAME: &str = r#"[{
    "op": "core/text-transform",
    "engineConfig": {"facets": [], "mode": "row-based"},
    "columnName": "last_name",
    "expression": "value.toUppercase()",
    "onError": "keep-original",
    "repeat": false,
    "repeatCount": 10
}]"#;

fn client_for(fake: &FakeRefine) -> RefineClient {
    RefineClient::new(&ClientConfig {
        base_url: fake.base_url().to_string(),
        request_timeout: Some(Duration::from_secs(5)),
    })
    .unwrap()
}

/// Write the sample rows; the file lives as long as the returned dir.
fn write_sample(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, SAMPLE_CSV).unwrap();
    (dir, path)
}

fn csv_options() -> ImportOptions {
    ImportOptions::for_format(SourceFormat::Csv, Some("UTF-8"), &[], Some(","))
}

async fn create_sample(client: &RefineClient) -> ProjectId {
    let (_dir, file) = write_sample("test.csv");
    client
        .create_project(
            &file,
            &ProjectName::for_source(&file),
            SourceFormat::Csv,
            &csv_options(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_lifecycle() {
    let fake = FakeRefine::start().await;
    let client = client_for(&fake);
    let batch = OperationBatch::from_json(UPPERCASE_LAST_NAME).unwrap();

    let project = create_sample(&client).await;
    assert_eq!(fake.live_projects().await, 1);

    let outcome = client.apply_operations(&project, &batch).await.unwrap();
    assert_eq!(outcome, ApplyOutcome::Accepted);

    let rows = client.export_rows(&project, ExportFormat::Csv).await.unwrap();
    assert_eq!(
        rows,
        "first_name,last_name\nBaked,BEANS\nLovely,SPAM\nWonderful,SPAM\n"
    );

    let code = client.delete_project(&project).await.unwrap();
    assert_eq!(code, "ok");
    assert_eq!(fake.live_projects().await, 0);

    // One fresh token per mutating call.
    assert_eq!(fake.token_requests(), 4);
}

#[tokio::test]
async fn test_created_project_keeps_generated_name() {
    let fake = FakeRefine::start().await;
    let client = client_for(&fake);
    let (_dir, file) = write_sample("records.csv");
    let name = ProjectName::for_source(&file);

    client
        .create_project(&file, &name, SourceFormat::Csv, &csv_options())
        .await
        .unwrap();

    assert_eq!(fake.created_names().await, vec![name.to_string()]);
}

#[tokio::test]
async fn test_second_delete_reports_error_code() {
    let fake = FakeRefine::start().await;
    let client = client_for(&fake);
    let project = create_sample(&client).await;

    assert_eq!(client.delete_project(&project).await.unwrap(), "ok");
    assert_eq!(client.delete_project(&project).await.unwrap(), "error");
    assert_eq!(client.delete_project(&project).await.unwrap(), "error");
}

#[tokio::test]
async fn test_pending_apply_reports_processes() {
    let fake = FakeRefine::start_with(FakeConfig {
        pending_polls: 2,
        ..FakeConfig::default()
    })
    .await;
    let client = client_for(&fake);
    let batch = OperationBatch::from_json(UPPERCASE_LAST_NAME).unwrap();
    let project = create_sample(&client).await;

    let outcome = client.apply_operations(&project, &batch).await.unwrap();
    assert_eq!(outcome, ApplyOutcome::Pending);

    assert_eq!(client.get_process_count(&project).await.unwrap(), 2);
    assert_eq!(client.get_process_count(&project).await.unwrap(), 1);
    assert_eq!(client.get_process_count(&project).await.unwrap(), 0);

    let rows = fake.rows(project.as_str()).await.unwrap();
    assert_eq!(rows[0], vec!["Baked".to_string(), "BEANS".to_string()]);
}

#[tokio::test]
async fn test_unknown_operation_is_rejected() {
    let fake = FakeRefine::start().await;
    let client = client_for(&fake);
    let project = create_sample(&client).await;
    let batch = OperationBatch::from_json(r#"[{"op": "core/column-removal", "columnName": "x"}]"#)
        .unwrap();

    let outcome = client.apply_operations(&project, &batch).await.unwrap();
    assert_eq!(outcome, ApplyOutcome::Rejected("error".to_string()));
}

#[tokio::test]
async fn test_export_of_missing_project_is_export_error() {
    let fake = FakeRefine::start().await;
    let client = client_for(&fake);

    let err = client
        .export_rows(&ProjectId::new("404"), ExportFormat::Csv)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Export(_)));
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let client = RefineClient::new(&ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        request_timeout: Some(Duration::from_secs(2)),
    })
    .unwrap();

    let err = client.tokens().fetch_token().await.unwrap_err();
    assert!(err.is_transport());

    let err = client.delete_project(&ProjectId::new("1")).await.unwrap_err();
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_missing_source_file_is_io_error() {
    let fake = FakeRefine::start().await;
    let client = client_for(&fake);
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist.csv");

    let err = client
        .create_project(
            &missing,
            &ProjectName::new("missing"),
            SourceFormat::Csv,
            &csv_options(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Io(_)));
    assert_eq!(fake.token_requests(), 0);
}

#[tokio::test]
async fn test_slow_service_hits_request_timeout() {
    let fake = FakeRefine::start_with(FakeConfig {
        response_delay: Duration::from_secs(5),
        ..FakeConfig::default()
    })
    .await;
    let client = RefineClient::new(&ClientConfig {
        base_url: fake.base_url().to_string(),
        request_timeout: Some(Duration::from_millis(200)),
    })
    .unwrap();

    let err = client
        .get_process_count(&ProjectId::new("1"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(err.is_timeout());

    let err = client.delete_project(&ProjectId::new("1")).await.unwrap_err();
    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_refused_connection_is_not_timeout() {
    let client = RefineClient::new(&ClientConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        request_timeout: Some(Duration::from_secs(2)),
    })
    .unwrap();

    let err = client
        .get_process_count(&ProjectId::new("1"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
    assert!(!err.is_timeout());
}
