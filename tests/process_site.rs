use protocolo::config::PortalConfig;
use protocolo::filter::RecordFilter;
use protocolo::process::{process_site, SiteRequest};
use protocolo::record::fields;
use protocolo::{BatchRequest, DoneOutcome, EventSink, PortalClient, ProgressEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page(destination: &str) -> String {
    format!(
        r#"<html><body>
        <span id="assunto">Alvará</span>
        <table id="tramitacao">
          <tr><td>Protocolo Geral</td><td>01/03/2025</td><td>{destination}</td><td>02/03/2025</td></tr>
        </table>
        </body></html>"#
    )
}

async fn portal_with_pages(pages: &[(u32, String)]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/consulta"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "SID=1"))
        .mount(&server)
        .await;
    for (seq, body) in pages {
        Mock::given(method("POST"))
            .and(path("/consulta/processo"))
            .and(body_string_contains(format!("018%2F{seq:06}%2F2025")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
            .mount(&server)
            .await;
    }
    server
}

fn client(base_url: String) -> PortalClient {
    PortalClient::new(PortalConfig {
        base_url,
        session_timeout_secs: 2,
        query_timeout_secs: 2,
        ..PortalConfig::default()
    })
    .unwrap()
}

fn drain(rx: &mut broadcast::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_five_processes_exported() {
    let pages: Vec<_> = (1..=5).map(|seq| (seq, page("Secretaria de Obras"))).collect();
    let server = portal_with_pages(&pages).await;
    let dir = tempfile::tempdir().unwrap();

    let request = SiteRequest {
        batch: BatchRequest::new("018", "2025").range(1, 5),
        filter: None,
        output_dir: Some(dir.path().to_path_buf()),
    };
    let events = EventSink::new(64);
    let mut rx = events.subscribe();

    let report = process_site(&client(server.uri()), &request, &events, &CancellationToken::new()).await;

    assert_eq!(report.outcome, DoneOutcome::Success { record_count: 5 });
    assert_eq!(report.records.len(), 5);

    let path = report.export_path.unwrap();
    assert!(path.ends_with("processos_018_2025_1-5.tsv"));
    let contents = std::fs::read_to_string(path).unwrap();
    assert_eq!(contents.lines().count(), 6);

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&ProgressEvent::Progress { percent: 20 }));
    assert!(events.contains(&ProgressEvent::Progress { percent: 100 }));
    assert!(!events.contains(&ProgressEvent::ConnectivityWarning));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Done {
            outcome: DoneOutcome::Success { record_count: 5 }
        })
    );
}

#[tokio::test]
async fn test_filter_applied_after_fetch() {
    let pages = vec![
        (1, page("Secretaria de Obras")),
        (2, page("Fiscalização")),
        (3, page("Gabinete")),
    ];
    let server = portal_with_pages(&pages).await;

    let request = SiteRequest {
        batch: BatchRequest::new("18", "2025").range(1, 3),
        filter: Some(RecordFilter::department("fiscalizacao")),
        output_dir: None,
    };
    let events = EventSink::new(64);
    let report = process_site(&client(server.uri()), &request, &events, &CancellationToken::new()).await;

    assert_eq!(report.outcome, DoneOutcome::Success { record_count: 1 });
    assert_eq!(report.records[0].get(fields::PROCESS), Some("018/000002/2025"));
    assert!(report.export_path.is_none());
}

#[tokio::test]
async fn test_nothing_left_after_filter_is_empty() {
    let server = portal_with_pages(&[(1, page("Gabinete"))]).await;

    let request = SiteRequest {
        batch: BatchRequest::new("018", "2025").range(1, 2),
        filter: Some(RecordFilter::department("saude")),
        output_dir: None,
    };
    let events = EventSink::new(64);
    let report = process_site(&client(server.uri()), &request, &events, &CancellationToken::new()).await;
    assert_eq!(report.outcome, DoneOutcome::Empty);
}

#[tokio::test]
async fn test_unreachable_portal_is_outage() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let request = SiteRequest {
        batch: BatchRequest::new("018", "2025").range(1, 10).concurrency_limit(1),
        filter: None,
        output_dir: None,
    };
    let events = EventSink::new(64);
    let mut rx = events.subscribe();

    let report = process_site(&client(format!("http://{addr}")), &request, &events, &CancellationToken::new()).await;
    assert_eq!(report.outcome, DoneOutcome::OutageDetected);
    assert!(report.records.is_empty());

    let events = drain(&mut rx);
    let warnings = events
        .iter()
        .filter(|e| **e == ProgressEvent::ConnectivityWarning)
        .count();
    assert_eq!(warnings, 3);
    assert!(events.contains(&ProgressEvent::Progress { percent: 30 }));
    assert_eq!(
        events.last(),
        Some(&ProgressEvent::Done {
            outcome: DoneOutcome::OutageDetected
        })
    );
}

#[tokio::test]
async fn test_cancelled_run() {
    let server = portal_with_pages(&[]).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = SiteRequest {
        batch: BatchRequest::new("018", "2025").range(1, 10),
        filter: None,
        output_dir: None,
    };
    let events = EventSink::new(64);
    let report = process_site(&client(server.uri()), &request, &events, &cancel).await;
    assert_eq!(report.outcome, DoneOutcome::Cancelled);
}

#[tokio::test]
async fn test_invalid_range_reports_error() {
    let server = portal_with_pages(&[]).await;
    let request = SiteRequest {
        batch: BatchRequest::new("018", "2025").range(9, 1),
        filter: None,
        output_dir: None,
    };
    let events = EventSink::new(64);
    let mut rx = events.subscribe();
    let report = process_site(&client(server.uri()), &request, &events, &CancellationToken::new()).await;

    assert!(matches!(report.outcome, DoneOutcome::Error { .. }));
    // Rejected before any request reached the portal.
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(matches!(drain(&mut rx).as_slice(), [ProgressEvent::Done { .. }]));
}
