//! Integration tests for the `/api/v1/workflow` endpoints.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, delete, get, post_json};
use serde_json::{json, Value};
use tower::ServiceExt;

fn workflow() -> Value {
    json!({
        "1": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": "sdxl.safetensors" }
        },
        "2": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": "a cat, masterpiece", "clip": ["1", 1] }
        },
        "3": {
            "class_type": "KSampler",
            "inputs": {
                "model": ["1", 0],
                "positive": ["2", 0],
                "seed": 42,
                "steps": 20,
                "cfg": 7.5
            }
        }
    })
}

// ---------------------------------------------------------------------------
// Test: POST /workflow/graph
// ---------------------------------------------------------------------------

#[tokio::test]
async fn graph_returns_nodes_and_edges() {
    let app = common::build_test_app();
    let response = post_json(app, "/api/v1/workflow/graph", json!({ "document": workflow() })).await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let nodes = json["data"]["nodes"].as_array().unwrap();
    let edges = json["data"]["edges"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(edges.len(), 3);
    assert!(edges.iter().any(|e| e["id"] == "1-2"));
    assert!(edges.iter().any(|e| e["id"] == "1-3"));
    assert!(edges.iter().any(|e| e["id"] == "2-3"));
    assert_eq!(nodes[2]["kind"], "sampler");
}

#[tokio::test]
async fn graph_accepts_string_documents() {
    let app = common::build_test_app();
    let body = json!({ "document": workflow().to_string() });
    let json = body_json(post_json(app, "/api/v1/workflow/graph", body).await).await;

    assert_eq!(json["data"]["nodes"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn malformed_document_yields_empty_graph() {
    let app = common::build_test_app();
    let body = json!({ "document": [1, 2, 3] });
    let response = post_json(app, "/api/v1/workflow/graph", body).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"], json!({ "nodes": [], "edges": [] }));
}

#[tokio::test]
async fn unparseable_body_is_rejected() {
    let app = common::build_test_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/workflow/graph")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

// ---------------------------------------------------------------------------
// Test: POST /workflow/parameters
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parameters_from_workflow() {
    let app = common::build_test_app();
    let body = json!({ "document": workflow() });
    let json = body_json(post_json(app, "/api/v1/workflow/parameters", body).await).await;

    let data = &json["data"];
    assert_eq!(data["model"], "sdxl.safetensors");
    assert_eq!(data["seed"], "42");
    assert_eq!(data["cfg"], "7.5");
    assert_eq!(data["positivePrompt"], "a cat, masterpiece");
    assert!(data["negativePrompt"].is_null());
    assert_eq!(data["hiresFix"], "disabled");
}

#[tokio::test]
async fn parameters_from_flat_metadata() {
    let app = common::build_test_app();
    let body = json!({ "document": { "seed": 7, "positive_prompt": "hello" } });
    let json = body_json(post_json(app, "/api/v1/workflow/parameters", body).await).await;

    assert_eq!(json["data"]["seed"], "7");
    assert_eq!(json["data"]["positivePrompt"], "hello");
}

#[tokio::test]
async fn missing_document_yields_sentinels() {
    let app = common::build_test_app();
    let response = post_json(app, "/api/v1/workflow/parameters", json!({})).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["data"]["model"].is_null());
    assert_eq!(json["data"]["loras"], json!([]));
}

// ---------------------------------------------------------------------------
// Test: POST /workflow/inspect and cache management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inspect_returns_combined_view() {
    let app = common::build_test_app();
    let body = json!({ "document": workflow() });
    let json = body_json(post_json(app, "/api/v1/workflow/inspect", body).await).await;

    let data = &json["data"];
    assert_eq!(data["hash"].as_str().unwrap().len(), 64);
    assert_eq!(data["is_node_graph"], true);
    assert_eq!(data["graph"]["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(data["parameters"]["seed"], "42");
    assert_eq!(data["tags"], json!(["a cat", "masterpiece"]));
}

#[tokio::test]
async fn inspect_is_memoized_until_invalidated() {
    let (app, state) = common::build_test_app_with_state();
    let body = json!({ "document": workflow() });

    let first = body_json(post_json(app.clone(), "/api/v1/workflow/inspect", body.clone()).await).await;
    post_json(app.clone(), "/api/v1/workflow/inspect", body).await;

    let stats = state.cache.lock().await.stats();
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    let hash = first["data"]["hash"].as_str().unwrap();
    let response = delete(app.clone(), &format!("/api/v1/workflow/cache/{hash}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["removed"], true);

    let again = delete(app, &format!("/api/v1/workflow/cache/{hash}")).await;
    assert_eq!(body_json(again).await["data"]["removed"], false);
    assert!(state.cache.lock().await.is_empty());
}

#[tokio::test]
async fn clear_cache_reports_count() {
    let (app, _state) = common::build_test_app_with_state();
    for seed in [1, 2, 3] {
        let body = json!({ "document": { "seed": seed } });
        post_json(app.clone(), "/api/v1/workflow/inspect", body).await;
    }

    let health = body_json(get(app.clone(), "/health").await).await;
    assert_eq!(health["cache_entries"], 3);

    let response = delete(app.clone(), "/api/v1/workflow/cache").await;
    assert_eq!(body_json(response).await["data"]["cleared"], 3);

    let stats = body_json(get(app, "/api/v1/workflow/cache").await).await;
    assert_eq!(stats["data"]["entries"], 0);
    assert_eq!(stats["data"]["misses"], 3);
}

#[tokio::test]
async fn invalidate_rejects_malformed_hash() {
    let app = common::build_test_app();
    let response = delete(app, "/api/v1/workflow/cache/not-a-hash").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: large documents
// ---------------------------------------------------------------------------

fn fan_out_chain(node_count: usize) -> Value {
    let mut document = serde_json::Map::new();
    for index in 0..node_count {
        let inputs = if index == 0 {
            json!({})
        } else {
            json!({ "prev": [(index - 1).to_string(), 0], "root": ["0", 0] })
        };
        document.insert(
            index.to_string(),
            json!({ "class_type": "Step", "inputs": inputs }),
        );
    }
    Value::Object(document)
}

#[tokio::test]
async fn cache_stays_available_while_a_large_document_is_inspected() {
    let (app, state) = common::build_test_app_with_state();
    let body = json!({ "document": fan_out_chain(300) });

    let (inspect, stats) = tokio::join!(
        post_json(app.clone(), "/api/v1/workflow/inspect", body),
        get(app, "/api/v1/workflow/cache"),
    );

    assert_eq!(stats.status(), StatusCode::OK);
    assert_eq!(inspect.status(), StatusCode::OK);
    let json = body_json(inspect).await;
    assert_eq!(json["data"]["graph"]["nodes"].as_array().unwrap().len(), 300);

    let cache = state.cache.lock().await;
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(json["data"]["hash"].as_str().unwrap()));
}
