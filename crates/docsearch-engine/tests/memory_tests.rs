use docsearch_core::error::Error;
use docsearch_core::traits::SearchBackend;
use docsearch_core::types::{BulkOperation, Record};
use docsearch_engine::{HttpBackend, MemoryBackend};
use serde_json::{json, Value};

fn record(v: Value) -> Record {
    v.as_object().cloned().expect("object")
}

fn op(id: Option<&str>, v: Value) -> BulkOperation {
    BulkOperation::index("items", id.map(str::to_string), record(v))
}

async fn seeded() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend
        .bulk(&[
            op(Some("1"), json!({"title": "red running shoes", "brand": "Acme"})),
            op(Some("2"), json!({"title": "blue shoes", "brand": "Zeta"})),
            op(Some("3"), json!({"title": "red red hat", "brand": "Acme"})),
        ])
        .await
        .expect("bulk");
    backend
}

fn hit_ids(response: &Value) -> Vec<String> {
    response["hits"]["hits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn create_conflicts_and_delete_of_missing_is_404() {
    let backend = MemoryBackend::new();
    backend.create_index("a", &json!({"settings": {}})).await.expect("create");
    let err = backend.create_index("a", &json!({})).await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 400, .. }), "got {err:?}");

    backend.delete_index("a").await.expect("delete");
    let err = backend.delete_index("a").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(backend.calls().create, 2);
    assert_eq!(backend.calls().delete, 2);
}

#[tokio::test]
async fn bulk_overwrites_by_id_and_generates_missing_ids() {
    let backend = MemoryBackend::new();
    let outcome = backend
        .bulk(&[op(Some("x"), json!({"v": 1})), op(Some("x"), json!({"v": 2})), op(None, json!({"v": 3}))])
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 3);
    assert_eq!(backend.doc_count("items"), 2);
    assert_eq!(backend.document("items", "x").unwrap()["v"], json!(2));
}

#[tokio::test]
async fn dense_vector_of_wrong_length_is_a_per_document_failure() {
    let backend = MemoryBackend::new();
    let mapping = json!({"mappings": {"properties": {"t_embedding": {"type": "dense_vector", "dims": 2}}}});
    backend.create_index("items", &mapping).await.unwrap();
    let outcome = backend
        .bulk(&[op(Some("ok"), json!({"t_embedding": [0.1, 0.2]})), op(Some("bad"), json!({"t_embedding": [0.1]}))])
        .await
        .unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].position, 1);
    assert_eq!(outcome.failures[0].status, 400);
    assert_eq!(backend.doc_count("items"), 1);
}

#[tokio::test]
async fn match_ranks_by_term_frequency() {
    let backend = seeded().await;
    let res = backend.search("items", &json!({"query": {"match": {"title": "red"}}, "size": 10})).await.unwrap();
    assert_eq!(hit_ids(&res), vec!["3", "1"]);
    assert_eq!(res["hits"]["total"]["value"], 2);
    let s0 = res["hits"]["hits"][0]["_score"].as_f64().unwrap();
    let s1 = res["hits"]["hits"][1]["_score"].as_f64().unwrap();
    assert!(s0 > s1);
}

#[tokio::test]
async fn term_fuzzy_and_wildcard() {
    let backend = seeded().await;
    let term = backend.search("items", &json!({"query": {"term": {"brand": "Acme"}}})).await.unwrap();
    assert_eq!(hit_ids(&term), vec!["1", "3"]);

    let fuzzy = backend.search("items", &json!({"query": {"fuzzy": {"title": "shoez"}}})).await.unwrap();
    assert_eq!(hit_ids(&fuzzy), vec!["1", "2"]);

    let wildcard = backend.search("items", &json!({"query": {"wildcard": {"brand": "Ze*"}}})).await.unwrap();
    assert_eq!(hit_ids(&wildcard), vec!["2"]);
}

#[tokio::test]
async fn size_and_source_excludes_apply() {
    let backend = seeded().await;
    let body = json!({"query": {"match_all": {}}, "size": 2, "_source": {"excludes": ["brand"]}});
    let res = backend.search("items", &body).await.unwrap();
    assert_eq!(hit_ids(&res).len(), 2);
    assert_eq!(res["hits"]["total"]["value"], 3);
    assert!(res["hits"]["hits"][0]["_source"].get("brand").is_none());
}

#[tokio::test]
async fn script_score_uses_cosine_plus_offset() {
    let backend = MemoryBackend::new();
    backend
        .bulk(&[
            op(Some("same"), json!({"t_embedding": [1.0, 0.0]})),
            op(Some("opposite"), json!({"t_embedding": [-1.0, 0.0]})),
            op(Some("none"), json!({"t": "no vector"})),
        ])
        .await
        .unwrap();
    let body = json!({"query": {"script_score": {
        "query": {"match_all": {}},
        "script": {"source": "cosineSimilarity(params.query_vector, 't_embedding') + 1.0", "params": {"query_vector": [1.0, 0.0]}}
    }}});
    let res = backend.search("items", &body).await.unwrap();
    assert_eq!(hit_ids(&res), vec!["same", "opposite"]);
    assert!((res["hits"]["hits"][0]["_score"].as_f64().unwrap() - 2.0).abs() < 1e-9);
    assert!(res["hits"]["hits"][1]["_score"].as_f64().unwrap().abs() < 1e-9);
}

#[tokio::test]
async fn unknown_query_and_missing_index_are_remote_errors() {
    let backend = seeded().await;
    let err = backend.search("items", &json!({"query": {"regexp": {"title": "r.*"}}})).await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 400, .. }));
    let err = backend.search("nope", &json!({})).await.unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn http_backend_validates_url() {
    assert!(HttpBackend::new("localhost:9200").is_err());
    let backend = HttpBackend::new("http://localhost:9200/").expect("backend");
    assert_eq!(backend.base_url(), "http://localhost:9200");
}
