#![cfg(feature = "log-memory")]
use chrono::{TimeZone, Utc};
use play_sim::config::{DeliveryOptions, Mode};
use play_sim::delivery::DeliveryClient;
use play_sim::factory::EventFactory;
use play_sim::master::generate::{MasterCounts, generate_master_data};
use play_sim::master::{DataFormat, ReferenceData};
use play_sim::roles::ingest::{IngestState, serve};
use play_sim::roles::simulator::{SimulationRequest, Simulator, SimulatorConfig, run_simulation};
use play_sim::transport::memory::MemoryLog;
use play_sim::wire;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

async fn start(log: MemoryLog) -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let endpoint = format!("http://{}/play", listener.local_addr().expect("addr"));
    let stop = CancellationToken::new();
    let shutdown = stop.clone();
    tokio::spawn(async move {
        let _ = serve(listener, IngestState::new(Arc::new(log)), async move {
            shutdown.cancelled().await
        })
        .await;
    });
    (endpoint, stop)
}

fn master_dir(format: DataFormat) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let counts = MasterCounts {
        songs: 3,
        users: 3,
        locations: 3,
    };
    generate_master_data(dir.path(), &counts, format).expect("generate");
    dir
}

fn request(mode: Mode) -> SimulationRequest {
    SimulationRequest {
        mode,
        threads: 2,
        volume: 5,
        start: Some(Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()),
        end: Some(Utc.with_ymd_and_hms(2023, 1, 1, 1, 0, 0).unwrap()),
        posting_rate: None,
        duration_seconds: 0,
        delivery: DeliveryOptions {
            timeout: Duration::from_secs(2),
            max_retries: 3,
        },
        snapshot_interval_secs: 0,
        output_file: None,
    }
}

#[tokio::test]
async fn historical_run_delivers_every_event_within_the_window() {
    let dir = master_dir(DataFormat::Csv);
    let data = ReferenceData::load(dir.path(), DataFormat::Csv).expect("load");
    let log = MemoryLog::new();
    let (endpoint, stop) = start(log.clone()).await;

    let factory = EventFactory::new(Arc::new(data.clone())).expect("factory");
    let client = DeliveryClient::http(endpoint, 2).expect("client");
    let req = request(Mode::Historical);
    let report = Simulator::new(factory, client)
        .run(&req, CancellationToken::new())
        .await
        .expect("run");

    assert_eq!(report.delivered_count, 5);
    assert_eq!(report.failed_count, 0);
    let records = log.records();
    assert_eq!(records.len(), 5);
    for record in records {
        let event = wire::decode(&record.payload).expect("decode");
        assert_eq!(record.key.as_deref(), Some(event.song_id.as_str()));
        let song = data.song(&event.song_id).expect("known song");
        assert!(event.play_duration_ms <= song.duration_ms);
        assert!(data.users.iter().any(|u| u.user_id == event.user_id));
        assert!(data.locations.iter().any(|l| l.location_id == event.location_id));
        assert!(event.played_at >= req.start.unwrap() && event.played_at <= req.end.unwrap());
    }
    stop.cancel();
}

#[tokio::test]
async fn each_historical_chunk_is_delivered_in_generation_order() {
    let dir = master_dir(DataFormat::Csv);
    let data = ReferenceData::load(dir.path(), DataFormat::Csv).expect("load");
    let log = MemoryLog::new();
    let (endpoint, stop) = start(log.clone()).await;

    let factory = EventFactory::new(Arc::new(data)).expect("factory");
    let client = DeliveryClient::http(endpoint, 2).expect("client");
    let mut req = request(Mode::Historical);
    req.volume = 20;
    let report = Simulator::new(factory, client)
        .run(&req, CancellationToken::new())
        .await
        .expect("run");
    assert_eq!(report.delivered_count, 20);

    // Two workers: the first owns the first half hour, the second the rest
    let split = req.start.unwrap() + chrono::TimeDelta::minutes(30);
    let stamps: Vec<_> = log
        .records()
        .iter()
        .map(|r| wire::decode(&r.payload).expect("decode").played_at)
        .collect();
    let (first, second): (Vec<_>, Vec<_>) = stamps.into_iter().partition(|t| *t < split);
    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 10);
    for chunk in [first, second] {
        assert!(chunk.windows(2).all(|w| w[0] <= w[1]), "out of order: {:?}", chunk);
    }
    stop.cancel();
}

#[tokio::test]
async fn single_worker_preserves_full_order() {
    let dir = master_dir(DataFormat::Csv);
    let data = ReferenceData::load(dir.path(), DataFormat::Csv).expect("load");
    let log = MemoryLog::new();
    let (endpoint, stop) = start(log.clone()).await;

    let factory = EventFactory::new(Arc::new(data)).expect("factory");
    let client = DeliveryClient::http(endpoint, 1).expect("client");
    let mut req = request(Mode::Historical);
    req.threads = 1;
    req.volume = 12;
    Simulator::new(factory, client)
        .run(&req, CancellationToken::new())
        .await
        .expect("run");

    let stamps: Vec<_> = log
        .records()
        .iter()
        .map(|r| wire::decode(&r.payload).expect("decode").played_at)
        .collect();
    assert_eq!(stamps.len(), 12);
    assert_eq!(stamps[0], req.start.unwrap());
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    stop.cancel();
}

#[tokio::test]
async fn rejected_events_are_counted_as_failed() {
    let dir = master_dir(DataFormat::Json);
    let data = ReferenceData::load(dir.path(), DataFormat::Json).expect("load");
    let (endpoint, stop) = start(MemoryLog::failing()).await;

    let factory = EventFactory::new(Arc::new(data)).expect("factory");
    let client = DeliveryClient::http(endpoint, 2).expect("client");
    let mut req = request(Mode::Historical);
    req.delivery.max_retries = 1;
    let report = Simulator::new(factory, client)
        .run(&req, CancellationToken::new())
        .await
        .expect("run");

    assert_eq!(report.delivered_count, 0);
    assert_eq!(report.failed_count, 5);
    stop.cancel();
}

#[tokio::test]
async fn live_run_stops_after_its_duration() {
    let dir = master_dir(DataFormat::Csv);
    let log = MemoryLog::new();
    let (endpoint, stop) = start(log.clone()).await;
    let csv = dir.path().join("snapshots.csv");

    let mut req = request(Mode::Live);
    req.volume = 600;
    req.duration_seconds = 1;
    req.output_file = Some(csv.clone());
    let report = run_simulation(SimulatorConfig {
        master_data_dir: dir.path().to_path_buf(),
        format: DataFormat::Csv,
        api_endpoint: endpoint,
        request: req,
    })
    .await
    .expect("run");

    assert!(report.delivered_count > 0);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.delivered_count as usize, log.len());
    let written = std::fs::read_to_string(&csv).expect("snapshot file");
    assert!(written.lines().count() >= 2);
    stop.cancel();
}

#[tokio::test]
async fn live_run_ends_on_cancel() {
    let dir = master_dir(DataFormat::Csv);
    let data = ReferenceData::load(dir.path(), DataFormat::Csv).expect("load");
    let log = MemoryLog::new();
    let (endpoint, stop) = start(log.clone()).await;

    let factory = EventFactory::new(Arc::new(data)).expect("factory");
    let client = DeliveryClient::http(endpoint, 2).expect("client");
    let mut req = request(Mode::Live);
    req.volume = 60;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        Simulator::new(factory, client).run(&req, cancel),
    )
    .await
    .expect("cancelled run finishes")
    .expect("run");

    // First tick of each worker is immediate, the next is a second away
    assert_eq!(report.delivered_count, 2);
    assert_eq!(log.len(), 2);
    stop.cancel();
}

#[tokio::test]
async fn missing_window_fails_before_any_work() {
    let mut req = request(Mode::Historical);
    req.end = None;
    let err = run_simulation(SimulatorConfig {
        master_data_dir: "/nonexistent".into(),
        format: DataFormat::Csv,
        api_endpoint: "http://127.0.0.1:9/play".into(),
        request: req,
    })
    .await
    .unwrap_err();
    assert!(err.to_string().contains("--end-datetime"));
}
