use axum::{extract::Query, http::header, routing::get, Json, Router};
use rmcp::{
    model::CallToolRequestParam,
    service::{RoleClient, RunningService, ServiceExt},
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Fixture covering both sides: a SearXNG-shaped `/search` and a few HTML pages.
fn fixture() -> Router {
    let long_page = format!(
        "<html><head><script>tracker()</script></head><body><nav>Home | About</nav><article>{}</article><footer>(c)</footer></body></html>",
        "a".repeat(45_000)
    );
    Router::new()
        .route(
            "/search",
            get(|Query(p): Query<HashMap<String, String>>| async move {
                let videos = p.get("categories").map(String::as_str) == Some("videos");
                let results: Vec<serde_json::Value> = (0..40)
                    .map(|i| {
                        if videos {
                            serde_json::json!({
                                "url": format!("https://www.youtube.com/watch?v=vid{i:08}"),
                                "title": format!("video {i}"),
                                "author": "channel",
                                "length": "3:32",
                                "duration": 212,
                                "img_src": format!("https://i.ytimg.com/{i}.jpg"),
                                "publishedDate": "2024-05-01T00:00:00",
                            })
                        } else if i == 0 {
                            // No score; wrongly-typed author.
                            serde_json::json!({
                                "url": "https://example.com/0",
                                "title": "first",
                                "content": "no score here",
                                "author": 7,
                            })
                        } else {
                            serde_json::json!({
                                "url": format!("https://example.com/{i}"),
                                "title": format!("hit {i}"),
                                "content": "x".repeat(300),
                                "score": 1.5,
                            })
                        }
                    })
                    .collect();
                Json(serde_json::json!({ "query": p.get("q"), "results": results }))
            }),
        )
        .route(
            "/long",
            get(move || {
                let body = long_page.clone();
                async move { ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body) }
            }),
        )
        .route(
            "/missing",
            get(|| async { (axum::http::StatusCode::NOT_FOUND, "gone") }),
        )
        .route(
            "/doc.pdf",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/pdf")],
                    b"%PDF-1.7 binary".to_vec(),
                )
            }),
        )
}

async fn spawn_server(searxng: &str) -> RunningService<RoleClient, ()> {
    let bin = assert_cmd::cargo::cargo_bin!("websift");
    let searxng = searxng.to_string();
    ()
        .serve(
            TokioChildProcess::new(tokio::process::Command::new(bin).configure(|cmd| {
                cmd.env("WEBSIFT_SEARXNG_HOST", &searxng);
                cmd.env_remove("WEBSIFT_ENV_FILE");
                cmd.env_remove("WEBSIFT_CHUNK_SIZE");
                cmd.env("WEBSIFT_FETCH_TIMEOUT_MS", "5000");
                cmd.env("RUST_LOG", "warn");
            }))
            .expect("spawn mcp child"),
        )
        .await
        .expect("serve mcp child")
}

async fn call(
    service: &RunningService<RoleClient, ()>,
    name: &'static str,
    args: serde_json::Value,
) -> serde_json::Value {
    let r = service
        .call_tool(CallToolRequestParam {
            name: name.into(),
            arguments: Some(args.as_object().cloned().unwrap()),
        })
        .await
        .expect("call_tool");
    if let Some(v) = r.structured_content.clone() {
        return v;
    }
    for c in &r.content {
        if let Some(t) = c.as_text() {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&t.text) {
                return v;
            }
        }
    }
    panic!("expected structured_content or JSON text content");
}

#[tokio::test]
async fn websift_lists_all_tools() {
    let addr = serve(fixture()).await;
    let service = spawn_server(&format!("http://{addr}")).await;
    let tools = service.list_tools(Default::default()).await.unwrap();
    let names: BTreeSet<String> = tools
        .tools
        .iter()
        .map(|t| t.name.clone().into_owned())
        .collect();
    for must_have in [
        "search",
        "search_videos",
        "fetch_content",
        "search_summary",
        "fetch_youtube_content",
    ] {
        assert!(names.contains(must_have), "missing tool {must_have}");
    }
    service.cancel().await.expect("cancel");
}

#[tokio::test]
async fn fetch_content_paginates_a_long_page() {
    let addr = serve(fixture()).await;
    let service = spawn_server(&format!("http://{addr}")).await;
    let url = format!("http://{addr}/long");

    let first = call(&service, "fetch_content", serde_json::json!({ "url": url })).await;
    assert_eq!(first["ok"], true);
    assert_eq!(first["kind"], "fetch_content");
    assert_eq!(first["success"], true);
    assert_eq!(first["content_length"], 30_000);
    assert_eq!(first["is_truncated"], true);
    assert_eq!(first["next_offset"], 30_000);
    assert_eq!(first["total_length"], 45_000);
    let content = first["content"].as_str().unwrap();
    assert!(!content.contains("tracker") && !content.contains("Home"));

    let second = call(
        &service,
        "fetch_content",
        serde_json::json!({ "url": url, "offset": 30_000 }),
    )
    .await;
    assert_eq!(second["content_length"], 15_000);
    assert_eq!(second["is_truncated"], false);
    assert_eq!(second["next_offset"], 45_000);
    assert_eq!(second["total_length"], 45_000);

    let past_end = call(
        &service,
        "fetch_content",
        serde_json::json!({ "url": url, "offset": 99_999 }),
    )
    .await;
    assert_eq!(past_end["content"], "");
    assert_eq!(past_end["is_truncated"], false);

    let negative = call(
        &service,
        "fetch_content",
        serde_json::json!({ "url": url, "offset": -10 }),
    )
    .await;
    assert_eq!(negative["offset"], 0);
    assert_eq!(negative["content"], first["content"]);

    service.cancel().await.expect("cancel");
}

#[tokio::test]
async fn fetch_content_failures_are_envelopes() {
    let addr = serve(fixture()).await;
    let service = spawn_server(&format!("http://{addr}")).await;

    let v = call(
        &service,
        "fetch_content",
        serde_json::json!({ "url": format!("http://{addr}/missing") }),
    )
    .await;
    assert_eq!(v["ok"], false);
    assert_eq!(v["success"], false);
    assert_eq!(v["error"]["code"], "fetch_failed");
    assert_eq!(v["error"]["retryable"], true);

    let v = call(
        &service,
        "fetch_content",
        serde_json::json!({ "url": format!("http://{addr}/doc.pdf") }),
    )
    .await;
    assert_eq!(v["error"]["code"], "parse_failed");

    let v = call(&service, "fetch_content", serde_json::json!({ "url": "" })).await;
    assert_eq!(v["error"]["code"], "invalid_params");

    service.cancel().await.expect("cancel");
}

#[tokio::test]
async fn search_clamps_and_defaults_missing_score() {
    let addr = serve(fixture()).await;
    let service = spawn_server(&format!("http://{addr}/")).await;

    let v = call(
        &service,
        "search",
        serde_json::json!({ "query": "rust", "max_results": 100 }),
    )
    .await;
    assert_eq!(v["ok"], true);
    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 25);
    assert_eq!(results[0]["title"], "first");
    assert_eq!(results[0]["score"].as_f64(), Some(0.0));
    assert_eq!(results[1]["score"].as_f64(), Some(1.5));

    let v = call(&service, "search", serde_json::json!({ "query": "rust" })).await;
    assert_eq!(v["results"].as_array().unwrap().len(), 10);

    let v = call(&service, "search", serde_json::json!({ "query": "   " })).await;
    assert_eq!(v["ok"], false);
    assert_eq!(v["error"]["code"], "invalid_params");

    let v = call(
        &service,
        "search",
        serde_json::json!({ "query": "q".repeat(501) }),
    )
    .await;
    assert_eq!(v["error"]["code"], "invalid_params");

    service.cancel().await.expect("cancel");
}

#[tokio::test]
async fn search_videos_and_summary_shapes() {
    let addr = serve(fixture()).await;
    let service = spawn_server(&format!("http://{addr}/search")).await;

    let v = call(
        &service,
        "search_videos",
        serde_json::json!({ "query": "cats", "max_results": 50 }),
    )
    .await;
    let results = v["results"].as_array().unwrap();
    assert_eq!(results.len(), 20);
    assert_eq!(results[0]["length"], "3:32");
    assert_eq!(results[0]["author"], "channel");
    assert_eq!(results[0]["thumbnail"], "https://i.ytimg.com/0.jpg");
    assert_eq!(results[0]["published_date"], "2024-05-01T00:00:00");

    let v = call(
        &service,
        "search_summary",
        serde_json::json!({ "query": "rust", "max_results": 0 }),
    )
    .await;
    assert_eq!(v["ok"], true);
    assert_eq!(v["total_results"], 1);
    assert_eq!(v["top_results"][0]["rank"], 1);
    assert_eq!(v["top_results"][0]["snippet"], "no score here");

    let v = call(&service, "search_summary", serde_json::json!({ "query": "rust" })).await;
    let top = v["top_results"].as_array().unwrap();
    assert_eq!(top.len(), 5);
    assert_eq!(top[1]["snippet"].as_str().unwrap().chars().count(), 203);

    service.cancel().await.expect("cancel");
}

#[tokio::test]
async fn search_backend_down_is_search_failed() {
    // Bind then drop: nothing listens on this port.
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();
    drop(dead);
    let service = spawn_server(&format!("http://{dead_addr}")).await;

    let v = call(&service, "search", serde_json::json!({ "query": "rust" })).await;
    assert_eq!(v["ok"], false);
    assert_eq!(v["error"]["code"], "search_failed");
    assert_eq!(v["error"]["retryable"], true);

    let v = call(&service, "fetch_youtube_content", serde_json::json!({})).await;
    assert_eq!(v["error"]["code"], "invalid_params");

    let v = call(
        &service,
        "fetch_youtube_content",
        serde_json::json!({ "video": "--config-locations=/tmp/x.conf" }),
    )
    .await;
    assert_eq!(v["error"]["code"], "invalid_params");
    assert_eq!(v["success"], false);

    service.cancel().await.expect("cancel");
}
