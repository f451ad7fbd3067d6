//! Elasticsearch backend against a minimal fake cluster.
//!
//! The fake implements just the endpoints the backend calls and runs the
//! registered pipeline's rules on `?pipeline=` writes, so a whole load can
//! be checked end to end without a real cluster.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{head, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use threatload::backend_es::ElasticsearchBackend;
use threatload::config::{parse_config, ElasticsearchConfig};
use threatload::load::{execute, LoadPlan};
use threatload::progress::NoProgress;
use threatload_core::backend::{Backend, CollectionKind};
use threatload_core::enrich::EnrichmentRules;
use threatload_core::error::IngestError;
use threatload_core::models::{Document, IndexedDocument, StatusRecord};
use threatload_core::pipeline::PipelineDefinition;
use threatload_core::weapons::WeaponList;

#[derive(Default)]
struct FakeEs {
    indices: HashSet<String>,
    created: Vec<(String, Value)>,
    pipelines: HashMap<String, Value>,
    bulk_requests: Vec<(Option<String>, usize)>,
    docs: HashMap<String, Vec<Value>>,
    status_docs: HashMap<(String, String), Value>,
}

type Shared = Arc<Mutex<FakeEs>>;

async fn index_exists(State(es): State<Shared>, Path(index): Path<String>) -> StatusCode {
    if es.lock().unwrap().indices.contains(&index) {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn create_index(
    State(es): State<Shared>,
    Path(index): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut es = es.lock().unwrap();
    if !es.indices.insert(index.clone()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "type": "resource_already_exists_exception", "reason": "exists" } })),
        )
            .into_response();
    }
    es.created.push((index.clone(), body));
    Json(json!({ "acknowledged": true, "index": index })).into_response()
}

async fn put_pipeline(
    State(es): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Json<Value> {
    es.lock().unwrap().pipelines.insert(id, body);
    Json(json!({ "acknowledged": true }))
}

async fn bulk(
    State(es): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let mut es = es.lock().unwrap();
    let pipeline = params.get("pipeline").cloned();

    let rules: Option<EnrichmentRules> = match &pipeline {
        Some(id) => match es.pipelines.get(id) {
            Some(def) => {
                let p = &def["processors"][0]["script"]["params"];
                Some(EnrichmentRules {
                    negative: serde_json::from_value(p["negative"].clone()).unwrap(),
                    positive: serde_json::from_value(p["positive"].clone()).unwrap(),
                    weapons: serde_json::from_value(p["weapons"].clone()).unwrap(),
                })
            }
            None => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": { "type": "illegal_argument_exception",
                        "reason": format!("pipeline with id [{}] does not exist", id) } })),
                )
                    .into_response()
            }
        },
        None => None,
    };

    let lines: Vec<&str> = body.lines().filter(|l| !l.is_empty()).collect();
    let mut items = Vec::new();
    let mut errors = false;
    for pair in lines.chunks(2) {
        let action: Value = serde_json::from_str(pair[0]).unwrap();
        let mut source: Value = serde_json::from_str(pair[1]).unwrap();
        let index = action["index"]["_index"].as_str().unwrap().to_string();

        let text = source["text"].as_str().unwrap_or("").to_string();
        if text.contains("REJECT") {
            errors = true;
            items.push(json!({ "index": { "_index": index, "status": 400,
                "error": { "type": "mapper_parsing_exception", "reason": "refused by test" } } }));
            continue;
        }
        if let Some(rules) = &rules {
            let e = rules.enrich(source["text"].as_str());
            source["sentiment"] = json!(e.sentiment);
            source["weapons"] = json!(e.weapons_found);
        }
        es.docs.entry(index.clone()).or_default().push(source);
        items.push(json!({ "index": { "_index": index, "status": 201 } }));
    }
    es.bulk_requests.push((pipeline, items.len()));

    Json(json!({ "took": 1, "errors": errors, "items": items })).into_response()
}

async fn put_doc(
    State(es): State<Shared>,
    Path((index, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    es.lock().unwrap().status_docs.insert((index, id), body);
    Json(json!({ "result": "created" }))
}

async fn get_doc(State(es): State<Shared>, Path((index, id)): Path<(String, String)>) -> Response {
    match es.lock().unwrap().status_docs.get(&(index.clone(), id.clone())) {
        Some(src) => Json(json!({ "_index": index, "_id": id, "found": true, "_source": src }))
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "_index": index, "_id": id, "found": false })),
        )
            .into_response(),
    }
}

async fn start_fake() -> (Shared, SocketAddr) {
    let state: Shared = Arc::new(Mutex::new(FakeEs::default()));
    let app = Router::new()
        .route("/_bulk", post(bulk))
        .route("/_ingest/pipeline/{id}", put(put_pipeline))
        .route("/{index}", head(index_exists).put(create_index))
        .route("/{index}/_doc/{id}", put(put_doc).get(get_doc))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, addr)
}

fn backend_for(addr: SocketAddr) -> ElasticsearchBackend {
    ElasticsearchBackend::new(&ElasticsearchConfig {
        url: format!("http://{}/", addr),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn ensure_collection_creates_once_with_mappings() {
    let (es, addr) = start_fake().await;
    let backend = backend_for(addr);

    backend.ensure_collection("texts", CollectionKind::Documents).await.unwrap();
    backend.ensure_collection("texts", CollectionKind::Documents).await.unwrap();
    backend.ensure_collection("status", CollectionKind::Status).await.unwrap();

    let es = es.lock().unwrap();
    assert_eq!(es.created.len(), 2);
    assert_eq!(es.created[0].0, "texts");
    assert_eq!(
        es.created[0].1["mappings"]["properties"]["weapons"]["type"],
        "keyword"
    );
    assert_eq!(
        es.created[1].1["mappings"]["properties"]["done"]["type"],
        "boolean"
    );
}

#[tokio::test]
async fn bulk_reports_rejected_positions() {
    let (es, addr) = start_fake().await;
    let backend = backend_for(addr);

    let batch = vec![
        IndexedDocument::raw(Document::new("fine", "a", "t1")),
        IndexedDocument::raw(Document::new("REJECT me", "b", "t2")),
        IndexedDocument::raw(Document::new("also fine", "c", "t3")),
    ];
    let response = backend.bulk_index("texts", &batch, None).await.unwrap();

    assert_eq!(response.rejected.len(), 1);
    assert_eq!(response.rejected[0].position, 1);
    assert_eq!(
        response.rejected[0].reason,
        "mapper_parsing_exception: refused by test"
    );
    assert_eq!(es.lock().unwrap().docs["texts"].len(), 2);
}

#[tokio::test]
async fn unknown_pipeline_is_api_error() {
    let (_es, addr) = start_fake().await;
    let backend = backend_for(addr);

    let batch = vec![IndexedDocument::raw(Document::new("x", "y", "z"))];
    let err = backend
        .bulk_index("texts", &batch, Some("missing"))
        .await
        .unwrap_err();

    match err {
        IngestError::Api { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("pipeline with id [missing] does not exist"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn status_round_trip() {
    let (_es, addr) = start_fake().await;
    let backend = backend_for(addr);

    assert!(backend.get_status("status", "status").await.unwrap().is_none());

    let record = StatusRecord {
        done: true,
        updated_at: chrono::DateTime::from_timestamp(1_700_000_000, 0),
    };
    backend.put_status("status", "status", &record).await.unwrap();

    assert_eq!(
        backend.get_status("status", "status").await.unwrap(),
        Some(record)
    );
}

#[tokio::test]
async fn registered_pipeline_carries_weapon_list() {
    let (es, addr) = start_fake().await;
    let backend = backend_for(addr);

    let def = PipelineDefinition::new("text_enrichment", WeaponList::parse("Bomb\nknife\nbomb"));
    backend.put_pipeline(&def).await.unwrap();

    let es = es.lock().unwrap();
    let stored = &es.pipelines["text_enrichment"];
    assert_eq!(stored["description"], "Detect sentiment and weapons");
    assert_eq!(
        stored["processors"][0]["script"]["params"]["weapons"],
        json!(["bomb", "knife"])
    );
}

#[tokio::test]
async fn unreachable_cluster_is_backend_unavailable() {
    let backend = ElasticsearchBackend::new(&ElasticsearchConfig {
        url: "http://127.0.0.1:1".to_string(),
        timeout_secs: 2,
    })
    .unwrap();

    let err = backend
        .ensure_collection("texts", CollectionKind::Documents)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::BackendUnavailable(_)));
}

fn scenario_plan(mode: threatload::config::EnrichmentMode) -> LoadPlan {
    LoadPlan {
        csv_path: "input.csv".into(),
        weapons: WeaponList::parse("bomb\nknife"),
        rows: vec![
            Document::new("I love dogs", "pos", "t1"),
            Document::new("bomb attack kill", "neg", "t2"),
            Document::new("", "neu", "t3"),
        ],
        batch_size: 2,
        mode,
    }
}

fn es_config(addr: SocketAddr) -> threatload::config::Config {
    parse_config(&format!(
        r#"
[backend]
kind = "elasticsearch"

[elasticsearch]
url = "http://{}"

[ingest]
weapons_path = "unused.txt"
"#,
        addr
    ))
    .unwrap()
}

#[tokio::test]
async fn full_load_through_server_side_pipeline() {
    use threatload::config::EnrichmentMode;

    let (es, addr) = start_fake().await;
    let backend = backend_for(addr);
    let config = es_config(addr);

    let report = execute(
        &backend,
        &config,
        &scenario_plan(EnrichmentMode::Pipeline),
        &NoProgress,
        std::future::pending(),
    )
    .await
    .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.total_batches, 2);

    let es = es.lock().unwrap();
    assert_eq!(
        es.bulk_requests,
        vec![
            (Some("text_enrichment".to_string()), 2),
            (Some("text_enrichment".to_string()), 1)
        ]
    );
    let docs = &es.docs["texts"];
    assert_eq!(docs[0]["sentiment"], "positive");
    assert_eq!(docs[1]["sentiment"], "negative");
    assert_eq!(docs[1]["weapons"], json!(["bomb"]));
    assert_eq!(docs[2]["sentiment"], "neutral");
    assert_eq!(docs[2]["weapons"], json!([]));
    assert_eq!(
        es.status_docs[&("status".to_string(), "status".to_string())]["done"],
        true
    );
}

#[tokio::test]
async fn full_load_with_local_enrichment_skips_pipeline() {
    use threatload::config::EnrichmentMode;

    let (es, addr) = start_fake().await;
    let backend = backend_for(addr);
    let config = es_config(addr);

    execute(
        &backend,
        &config,
        &scenario_plan(EnrichmentMode::Local),
        &NoProgress,
        std::future::pending(),
    )
    .await
    .unwrap();

    let es = es.lock().unwrap();
    assert!(es.pipelines.is_empty());
    assert!(es.bulk_requests.iter().all(|(p, _)| p.is_none()));
    assert_eq!(es.docs["texts"][1]["weapons"], json!(["bomb"]));
    assert_eq!(es.docs["texts"][0]["sentiment"], "positive");
}
