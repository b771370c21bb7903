use docsearch_core::spec::IndexSpec;
use docsearch_core::traits::SearchBackend;
use docsearch_core::types::BulkOperation;
use docsearch_engine::MemoryBackend;
use docsearch_ingest::IndexManager;
use serde_json::json;

#[tokio::test]
async fn creating_twice_replaces_the_index() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    let spec = IndexSpec::builder().text_fields(["title"]).keyword_fields(["brand"]).build()?;
    let manager = IndexManager::new(&backend);

    manager.create_from_spec("products", &spec).await?;
    let doc = json!({"title": "shoe"}).as_object().cloned().unwrap();
    backend.bulk(&[BulkOperation::index("products", Some("1".into()), doc)]).await?;
    assert_eq!(backend.doc_count("products"), 1);

    manager.create_from_spec("products", &spec).await?;
    assert_eq!(backend.doc_count("products"), 0);
    assert_eq!(backend.index_body("products"), Some(spec.to_body()));
    assert_eq!(backend.calls().delete, 2);
    assert_eq!(backend.calls().create, 2);
    Ok(())
}

#[tokio::test]
async fn default_spec_has_no_field_mapping() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    IndexManager::new(&backend).create_from_spec("plain", &IndexSpec::default()).await?;
    let body = backend.index_body("plain").unwrap();
    assert_eq!(body["settings"]["number_of_shards"], 3);
    assert_eq!(body["settings"]["number_of_replicas"], 1);
    assert_eq!(body["mappings"]["properties"], json!({}));
    Ok(())
}

#[tokio::test]
async fn delete_reports_whether_index_existed() -> anyhow::Result<()> {
    let backend = MemoryBackend::new();
    let manager = IndexManager::new(&backend);
    assert!(!manager.delete_index("ghost").await?);
    manager.create_index("ghost", &json!({})).await?;
    assert!(manager.delete_index("ghost").await?);
    Ok(())
}
