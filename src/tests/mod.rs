use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::context::{self, ContextStore, FileContextStore, QueryContext};
use crate::gallery::RawRecord;
use crate::navigation::{Direction, NavigationError, RunsClient};
use crate::output::{self, ContextSource, OutputFormat};
use crate::runner::{Options, RecordSource, Runner};

const RUNS_BODY: &str = r#"{"response":{"runs":[{"name":"301531"},{"name":"300811"},{"name":"Run301165"},{"name":"junk"}]}}"#;

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!(
        "plotgallery-{tag}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Serves `status`/`body` to every connection and reports each request line.
async fn mock_backend(status: &'static str, body: &'static str) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    let n = match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    buf.extend_from_slice(&chunk[..n]);
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let request = String::from_utf8_lossy(&buf).to_string();
                let _ = tx.send(request.lines().next().unwrap_or_default().to_string());
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    (format!("http://{addr}/cgi-bin/handler.py"), rx)
}

fn records() -> Vec<RawRecord> {
    vec![
        RawRecord::new("out/hRHTimingAnode.png", "out/hRHTimingAnode.pdf", None, 600.0, 400.0),
        RawRecord::new("out/hOStrips.png", "out/hOStrips.pdf", None, 200.0, 100.0),
        RawRecord::new("out/hRHTiming.png", "out/hRHTiming.pdf", None, 250.0, 260.0),
        RawRecord::new("out/hOWires.png", "out/hOWires.pdf", None, 250.0, 250.0),
    ]
}

fn comparison() -> QueryContext {
    QueryContext::from_query_list("301165,300811,9,Run2017,SingleMuon,CSC")
}

#[tokio::test]
async fn runs_client_sends_listing_query_and_sorts_runs() {
    let (endpoint, mut requests) = mock_backend("200 OK", RUNS_BODY).await;
    let client = RunsClient::new(&endpoint, 5, None).unwrap();

    let (runs, skipped) = client.fetch_runs("Run2017", "SingleMuon").await.unwrap();
    assert_eq!(runs.runs(), &[300811, 301165, 301531]);
    assert_eq!(skipped, vec!["junk".to_string()]);

    let request_line = requests.recv().await.unwrap();
    assert!(request_line.starts_with("GET /cgi-bin/handler.py?"));
    assert!(request_line.contains("type=getRuns"));
    assert!(request_line.contains("series=Run2017"));
    assert!(request_line.contains("sample=SingleMuon"));
}

#[tokio::test]
async fn runs_client_reports_backend_status() {
    let (endpoint, _requests) = mock_backend("500 Internal Server Error", "{}").await;
    let client = RunsClient::new(&endpoint, 5, None).unwrap();
    let err = client.fetch_runs("Run2017", "SingleMuon").await.unwrap_err();
    assert!(matches!(err, NavigationError::Status { status: 500 }));
}

#[tokio::test]
async fn runs_client_rejects_garbage_body() {
    let (endpoint, _requests) = mock_backend("200 OK", "<html>oops</html>").await;
    let client = RunsClient::new(&endpoint, 5, None).unwrap();
    let err = client.fetch_runs("Run2017", "SingleMuon").await.unwrap_err();
    assert!(matches!(err, NavigationError::Decode { .. }));
}

#[tokio::test]
async fn run_with_backend_plans_both_neighbors_and_persists_context() {
    let (endpoint, _requests) = mock_backend("200 OK", RUNS_BODY).await;
    let dir = temp_dir("run-nav");
    let state = dir.join("state.json");

    let runner = Runner::new(Options {
        records: RecordSource::Inline(records()),
        search: "Timing".to_string(),
        context: Some(comparison()),
        state_file: Some(state.to_string_lossy().to_string()),
        backend: Some(endpoint),
        timeout_seconds: 5,
        ..Options::default()
    })
    .unwrap();
    let result = runner.run().await.unwrap();

    assert!(result.navigation_error.is_none());
    assert_eq!(result.skipped_runs, vec!["junk".to_string()]);
    let nav = result.view.navigation.as_ref().unwrap();
    assert_eq!(nav.neighbors.previous, Some(300811));
    assert_eq!(nav.neighbors.next, Some(301531));
    let next = nav.next.as_ref().unwrap();
    assert_eq!(next.kind, "retrieve_data");
    assert_eq!(next.data_info, "301531");
    assert_eq!(next.ref_info, "300811");
    assert_eq!(next.subsystem, "CSC");

    assert_eq!(result.view.context_source, ContextSource::Query);
    assert!(result.view.shows_info_table());
    assert_eq!(result.view.visible, 2);
    assert_eq!(result.view.layout.rows.len(), 1);

    let store = FileContextStore::open(&state).unwrap();
    assert_eq!(store.get(context::KEY_DATA).as_deref(), Some("301165"));
    assert_eq!(store.get(context::KEY_SUBSYSTEM).as_deref(), Some("CSC"));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn backend_failure_degrades_to_warning() {
    let (endpoint, _requests) = mock_backend("503 Service Unavailable", "").await;
    let runner = Runner::new(Options {
        records: RecordSource::Inline(records()),
        context: Some(comparison()),
        backend: Some(endpoint),
        timeout_seconds: 5,
        ..Options::default()
    })
    .unwrap();
    let result = runner.run().await.unwrap();
    assert!(result.view.navigation.is_none());
    assert!(result
        .navigation_error
        .as_deref()
        .is_some_and(|e| e.contains("503")));
    assert_eq!(result.view.total, 4);
}

#[tokio::test]
async fn stored_context_is_restored_without_a_query() {
    let dir = temp_dir("restore");
    let state = dir.join("state.json");
    let state_file = Some(state.to_string_lossy().to_string());

    let first = Runner::new(Options {
        records: RecordSource::Inline(records()),
        context: Some(comparison()),
        state_file: state_file.clone(),
        ..Options::default()
    })
    .unwrap();
    first.run().await.unwrap();

    let second = Runner::new(Options {
        records: RecordSource::Inline(records()),
        state_file,
        ..Options::default()
    })
    .unwrap();
    let result = second.run().await.unwrap();
    assert_eq!(result.view.context_source, ContextSource::Restored);
    assert_eq!(result.view.context, Some(comparison()));
    assert!(!result.view.shows_info_table());
    assert!(result.view.shows_title_wells());

    let html = String::from_utf8(output::render(&result.view, OutputFormat::Html)).unwrap();
    assert!(html.contains("id=\"title_wells\""));
    assert!(html.contains("id=\"data_title\" class=\"font-bold\">301165</span>"));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn navigate_submits_query_that_the_next_run_consumes() {
    let (endpoint, _requests) = mock_backend("200 OK", RUNS_BODY).await;
    let dir = temp_dir("navigate");
    let state = dir.join("state.json");
    let state_file = Some(state.to_string_lossy().to_string());

    let runner = Runner::new(Options {
        context: Some(comparison()),
        state_file: state_file.clone(),
        backend: Some(endpoint.clone()),
        timeout_seconds: 5,
        ..Options::default()
    })
    .unwrap();
    let query = runner.navigate(Direction::Previous).await.unwrap();
    assert_eq!(query.data_info, "300811");
    assert!(query.user_id > 0);

    let store = FileContextStore::open(&state).unwrap();
    assert!(store.get(context::KEY_EXTERNAL_QUERY).is_some());

    let follow_up = Runner::new(Options {
        records: RecordSource::Inline(records()),
        state_file,
        backend: Some(endpoint),
        timeout_seconds: 5,
        ..Options::default()
    })
    .unwrap();
    let result = follow_up.run().await.unwrap();
    assert_eq!(result.view.context_source, ContextSource::Query);
    let ctx = result.view.context.as_ref().unwrap();
    assert_eq!(ctx.data_run, "300811");
    assert_eq!(ctx.ref_run, "300811");
    let nav = result.view.navigation.as_ref().unwrap();
    assert_eq!(nav.neighbors.previous, None);
    assert_eq!(nav.neighbors.next, Some(301165));

    let store = FileContextStore::open(&state).unwrap();
    assert!(store.get(context::KEY_EXTERNAL_QUERY).is_none());
    assert_eq!(store.get(context::KEY_DATA).as_deref(), Some("300811"));

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn navigate_without_neighbor_fails() {
    let (endpoint, _requests) = mock_backend("200 OK", RUNS_BODY).await;
    let runner = Runner::new(Options {
        context: Some(QueryContext::from_query_list("301531,300811,9,Run2017,SingleMuon,CSC")),
        backend: Some(endpoint),
        timeout_seconds: 5,
        ..Options::default()
    })
    .unwrap();
    let err = runner.navigate(Direction::Next).await.unwrap_err();
    assert!(err.to_string().contains("no next run after 301531"));
}

#[tokio::test]
async fn annotations_are_read_relative_to_records_file() {
    let dir = temp_dir("annotations");
    std::fs::write(dir.join("hOWires.txt"), "wire occupancy looks fine").unwrap();
    std::fs::write(
        dir.join("records.json"),
        r#"[
  {"png_path": "hOWires.png", "pdf_path": "hOWires.pdf", "txt_path": "hOWires.txt", "width": 500, "height": 300},
  {"png_path": "hOStrips.png", "pdf_path": "hOStrips.pdf", "txt_path": "None", "width": 500, "height": 300},
  {"png_path": "hRHTiming.png", "pdf_path": "hRHTiming.pdf", "txt_path": "missing.txt", "width": 500, "height": 300}
]"#,
    )
    .unwrap();

    let runner = Runner::new(Options {
        records: RecordSource::FilePath(dir.join("records.json").to_string_lossy().to_string()),
        inline_annotations: true,
        ..Options::default()
    })
    .unwrap();
    let result = runner.run().await.unwrap();

    assert_eq!(result.view.annotations.len(), 1);
    assert_eq!(
        result.view.annotations.get(&0).map(String::as_str),
        Some("wire occupancy looks fine")
    );
    assert_eq!(result.annotation_errors.len(), 1);
    assert_eq!(result.annotation_errors[0].0, 2);

    let entry = result.view.layout.entry_at(0).unwrap();
    assert_eq!(entry.width, 250.0);
    assert_eq!(entry.height, 150.0);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn missing_records_file_is_an_error() {
    let runner = Runner::new(Options {
        records: RecordSource::FilePath("/nonexistent/plotgallery/records.json".to_string()),
        ..Options::default()
    })
    .unwrap();
    let err = runner.run().await.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/plotgallery/records.json"));
}

#[test]
fn submitted_query_maps_back_to_context() {
    let mut store = context::MemoryContextStore::new();
    let query = crate::navigation::NavigationQuery::for_run(&comparison(), 301531, 42);
    context::submit(&mut store, &query).unwrap();
    let taken = context::take_submitted(&mut store).unwrap().unwrap();
    let ctx = QueryContext::from(&taken);
    assert_eq!(ctx.data_run, "301531");
    assert_eq!(ctx.ref_run, "300811");
    assert_eq!(ctx.user_id, "42");
    assert_eq!(ctx.series, "Run2017");
    assert!(context::take_submitted(&mut store).unwrap().is_none());
}
