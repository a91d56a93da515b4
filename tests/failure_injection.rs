//! Failure injection tests for the HTTP transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use faultline::http::HttpTransport;
use faultline::observability::{BreakerMetrics, TransitionCounts};
use faultline::resilience::{CircuitBreaker, Error, State};

mod common;

#[tokio::test]
async fn test_recovers_after_backend_returns() {
    let addr = common::unused_addr();
    let breaker = CircuitBreaker::builder("backend")
        .failure_threshold(3)
        .open_duration(Duration::from_millis(200))
        .timer_strategy(Duration::from_millis(50), 2)
        .build();
    let metrics = BreakerMetrics::attach(&breaker);
    let transport = HttpTransport::http(breaker.clone());

    for _ in 0..3 {
        let result = transport.send(common::get(addr)).await;
        assert!(matches!(result, Err(Error::Inner(_))), "backend is down");
    }
    assert_eq!(breaker.current_state(), State::Open);
    assert!(matches!(transport.send(common::get(addr)).await, Err(Error::Open)));

    let backend = common::start_programmable_backend(addr, || async { (200, "up".into()) }).await;

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(breaker.current_state(), State::HalfOpen);

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut admitted = 0;
    while breaker.current_state() == State::HalfOpen && Instant::now() < deadline {
        match transport.send(common::get(addr)).await {
            Ok(response) => {
                assert_eq!(response.status(), 200);
                admitted += 1;
            }
            Err(e) => assert!(matches!(e, Error::HalfOpen), "unexpected error: {}", e),
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(admitted, 2);
    assert_eq!(
        metrics.snapshot(),
        TransitionCounts {
            opened: 1,
            half_opened: 1,
            closed: 1,
        }
    );

    backend.abort();
}

#[tokio::test]
async fn test_server_errors_do_not_trip() {
    let addr = common::unused_addr();
    let backend =
        common::start_programmable_backend(addr, || async { (503, "busy".into()) }).await;

    let breaker = CircuitBreaker::builder("busy").failure_threshold(2).build();
    let transport = HttpTransport::http(breaker.clone());

    for _ in 0..5 {
        let response = transport.send(common::get(addr)).await.expect("transport ok");
        assert_eq!(response.status(), 503);
    }
    assert_eq!(breaker.current_state(), State::Closed);
    assert_eq!(breaker.consecutive_failures(), 0);

    backend.abort();
}

#[tokio::test]
async fn test_failed_probe_reopens() {
    let addr = common::unused_addr();
    let breaker = CircuitBreaker::builder("flapping")
        .failure_threshold(1)
        .open_duration(Duration::from_millis(100))
        .timer_strategy(Duration::from_millis(10), 3)
        .build();
    let metrics = BreakerMetrics::attach(&breaker);
    let transport = HttpTransport::http(breaker.clone());

    assert!(transport.send(common::get(addr)).await.is_err());
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(breaker.current_state(), State::HalfOpen);

    let result = transport.send(common::get(addr)).await;
    assert!(matches!(result, Err(Error::Inner(_))));
    assert_eq!(breaker.current_state(), State::Open);
    assert_eq!(
        metrics.snapshot(),
        TransitionCounts {
            opened: 2,
            half_opened: 1,
            closed: 0,
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_probe_in_flight() {
    let addr = common::unused_addr();
    let breaker = CircuitBreaker::builder("slow")
        .failure_threshold(1)
        .open_duration(Duration::from_millis(50))
        .timer_strategy(Duration::from_secs(5), 5)
        .build();
    let transport = HttpTransport::http(breaker.clone());

    assert!(transport.send(common::get(addr)).await.is_err());

    let hits = Arc::new(AtomicUsize::new(0));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (h, a, p) = (hits.clone(), active.clone(), peak.clone());
    let backend = common::start_programmable_backend(addr, move || {
        let (h, a, p) = (h.clone(), a.clone(), p.clone());
        async move {
            h.fetch_add(1, Ordering::SeqCst);
            let now = a.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            a.fetch_sub(1, Ordering::SeqCst);
            (200, "slow".into())
        }
    })
    .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(breaker.current_state(), State::HalfOpen);

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let transport = transport.clone();
        tasks.push(tokio::spawn(async move { transport.send(common::get(addr)).await }));
    }

    let mut ok = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(Error::HalfOpen) => rejected += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(rejected, 15);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(breaker.current_state(), State::HalfOpen);

    backend.abort();
}
