use std::sync::Arc;

use docsearch_client::{Client, Session, SessionState, SpecSource};
use docsearch_core::error::Error;
use docsearch_core::spec::IndexSpec;
use docsearch_core::types::Record;
use docsearch_engine::MemoryBackend;
use docsearch_query::SearchQuery;
use serde_json::json;

fn session() -> (Arc<MemoryBackend>, Session<Arc<MemoryBackend>>) {
    let backend = Arc::new(MemoryBackend::new());
    (backend.clone(), Session::new(Client::new(backend)))
}

fn record(v: serde_json::Value) -> Record {
    v.as_object().cloned().unwrap()
}

#[tokio::test]
async fn no_index_anywhere_is_a_configuration_error() {
    let (backend, mut session) = session();
    assert_eq!(session.state(), &SessionState::NoIndexConfigured);

    let dir = tempfile::tempdir().unwrap();
    let err = session.build_spec(None, IndexSpec::builder(), dir.path()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert!(matches!(session.create_index(None, None).await, Err(Error::InvalidConfig(_))));
    assert!(matches!(session.write(vec![record(json!({"a": 1}))], None, None).await, Err(Error::InvalidConfig(_))));
    assert!(matches!(session.search(SearchQuery::new("a", "1")).await, Err(Error::InvalidConfig(_))));
    assert_eq!(backend.calls().total(), 0);
    assert_eq!(session.state(), &SessionState::NoIndexConfigured);
}

#[tokio::test]
async fn create_without_spec_uses_the_default_settings() -> anyhow::Result<()> {
    let (backend, mut session) = session();
    session.create_index(Some("plain"), None).await?;
    assert_eq!(backend.index_body("plain"), Some(IndexSpec::default().to_body()));
    assert_eq!(session.state(), &SessionState::IndexCreated { index: "plain".into(), spec_path: None });
    Ok(())
}

#[tokio::test]
async fn built_spec_is_reused_by_every_later_create() -> anyhow::Result<()> {
    let (backend, session) = session();
    let mut session = session.with_default_index("products");
    let dir = tempfile::tempdir()?;
    let folder = dir.path().join("specs");

    let builder = IndexSpec::builder().text_fields(["title"]).keyword_fields(["brand"]).dense_fields(["title_embedding"], 8);
    let (spec, path) = session.build_spec(None, builder, &folder)?;
    assert_eq!(path, folder.join("spec_products.json"));
    assert!(path.exists());
    assert_eq!(session.state(), &SessionState::SpecBuilt { spec_path: path.clone() });

    session.create_index(None, None).await?;
    assert_eq!(backend.index_body("products"), Some(spec.to_body()));
    let created = SessionState::IndexCreated { index: "products".into(), spec_path: Some(path.clone()) };
    assert_eq!(session.state(), &created);

    session.write(vec![record(json!({"title": "shoe"}))], None, None).await?;
    assert_eq!(backend.doc_count("products"), 1);

    // Iterative re-indexing: the same spec again, the documents gone.
    session.create_index(None, None).await?;
    assert_eq!(backend.index_body("products"), Some(spec.to_body()));
    assert_eq!(backend.doc_count("products"), 0);
    assert_eq!(session.spec_path(), Some(path.as_path()));
    Ok(())
}

#[tokio::test]
async fn explicit_spec_wins_over_the_recorded_one() -> anyhow::Result<()> {
    let (backend, mut session) = session();
    let dir = tempfile::tempdir()?;
    session.build_spec(Some("a"), IndexSpec::builder().text_fields(["title"]), dir.path())?;

    let explicit = IndexSpec::builder().keyword_fields(["sku"]).shards(1).build()?;
    session.create_index(Some("a"), Some(SpecSource::Spec(explicit.clone()))).await?;
    assert_eq!(backend.index_body("a"), Some(explicit.to_body()));

    let file = dir.path().join("custom.json");
    std::fs::write(&file, r#"{"settings": {"number_of_shards": 2}, "mappings": {"properties": {"x": {"type": "keyword"}}}}"#)?;
    session.create_index(Some("a"), Some(SpecSource::File(file))).await?;
    assert_eq!(backend.index_body("a").unwrap()["settings"]["number_of_shards"], 2);
    Ok(())
}

#[tokio::test]
async fn missing_spec_file_fails_before_any_call() {
    let (backend, mut session) = session();
    let err = session
        .create_index(Some("a"), Some(SpecSource::File("/nonexistent/spec_a.json".into())))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
    assert_eq!(backend.calls().total(), 0);
}

#[tokio::test]
async fn search_uses_the_default_index_and_keeps_the_last_result() -> anyhow::Result<()> {
    let (_backend, session) = session();
    let mut session = session.with_default_index("products");
    session.create_index(None, None).await?;
    let docs = vec![
        record(json!({"item_id": 1, "title": "red shoe"})),
        record(json!({"item_id": 2, "title": "blue hat"})),
    ];
    session.write(docs, None, Some("item_id")).await?;

    let result = session.search(SearchQuery::new("title", "shoe")).await?;
    assert_eq!(result.len(), 1);
    assert_eq!(session.last_result(), Some(&result));
    assert_eq!(session.last_raw().unwrap()["hits"]["hits"][0]["_id"], "1");

    let explicit = session.search(SearchQuery::new("title", "hat").index("products")).await?;
    assert_eq!(explicit.get(0, "item_id"), Some(json!(2)));

    let sampled = session.sample(None, 3).await?;
    assert_eq!(sampled.len(), 2);
    Ok(())
}
