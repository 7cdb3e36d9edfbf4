// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use simwatch_app::{ChartView, GraphDataStore, JobId, JobStatus};
use simwatch_client::Client;
use simwatch_testkit::{SimulationFaker, payload_json, status_json, status_record};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

fn json_response(body: String, status: u16) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(body)
        .with_status_code(status)
        .with_header(
            Header::from_bytes("Content-Type", "application/json")
                .expect("valid content type header"),
        )
}

#[test]
fn unreachable_server_error_contains_remediation() {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))
        .expect("client should initialize");

    let error = client
        .fetch_statuses(true, &[JobId::new(5)])
        .expect_err("poll should fail for unreachable endpoint");
    let message = error.to_string();
    assert!(message.contains("cannot reach") || message.contains("timed out"));
}

#[test]
fn fetch_statuses_hits_status_route() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}/app", server.server_addr());
    let body = status_json(&[
        status_record(5, "RUNNING", "42% completed"),
        status_record(6, "SUCCESS", "Done"),
        status_record(7, "QUEUED", ""),
    ])?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/app/simulations/status/true/5/6/7");
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&format!("{addr}/simulations/5/result"), Duration::from_secs(1))?;
    assert_eq!(client.base_url(), addr);
    let statuses = client.fetch_statuses(true, &[JobId::new(5), JobId::new(6), JobId::new(7)])?;

    let kinds = statuses
        .iter()
        .map(|status| status.status)
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![JobStatus::Running, JobStatus::Success, JobStatus::Pending]
    );
    assert_eq!(statuses[0].progress_text, "42% completed");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn scheduled_polls_send_false_skip_update() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());
    let body = status_json(&[status_record(5, "RUNNING", "50% completed")])?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/simulations/status/false/5");
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let statuses = client.fetch_statuses(false, &[JobId::new(5)])?;
    assert_eq!(statuses.len(), 1);

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn empty_id_list_sends_no_request() -> Result<()> {
    let client = Client::new("http://127.0.0.1:1", Duration::from_millis(50))?;
    assert!(client.fetch_statuses(true, &[])?.is_empty());
    Ok(())
}

#[test]
fn fetch_results_loads_once_through_store() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());
    let body = payload_json(&SimulationFaker::new(9).result_payload())?;

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        assert_eq!(request.url(), "/simulations/12/data");
        request
            .respond(json_response(body, 200))
            .expect("response should succeed");
    });

    let mut client = Client::new(&addr, Duration::from_secs(1))?;
    let mut store = GraphDataStore::default();
    let job = JobId::new(12);
    let views = store.load(job, &mut client)?.non_empty_views();
    assert_eq!(views, ChartView::ALL.to_vec());

    handle.join().expect("server thread should join");
    // A second load is served from the cache; the server thread is gone.
    assert!(store.load(job, &mut client).is_ok());
    Ok(())
}

#[test]
fn server_errors_are_summarized() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response(r#"{"detail":"Not found."}"#.to_owned(), 404))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .fetch_results(JobId::new(3))
        .expect_err("missing job should fail");
    assert_eq!(error.to_string(), "server error (404): Not found.");

    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn malformed_status_json_is_an_error() -> Result<()> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let request = server.recv().expect("request expected");
        request
            .respond(json_response("[{\"pk\":".to_owned(), 200))
            .expect("response should succeed");
    });

    let client = Client::new(&addr, Duration::from_secs(1))?;
    let error = client
        .fetch_statuses(true, &[JobId::new(5)])
        .expect_err("truncated json should fail");
    assert!(format!("{error:#}").contains("decode status response"));

    handle.join().expect("server thread should join");
    Ok(())
}
