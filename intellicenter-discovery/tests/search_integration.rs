//! Integration tests for the search loop
//!
//! These tests drive `search_until_found` with a scripted finder on paused time:
//! - Searching again while nothing answers
//! - First responder wins
//! - Finder errors end the search

use async_trait::async_trait;
use intellicenter_discovery::{
    search_until_found, DiscoveryError, Result, Unit, UnitEvent, UnitFinder,
};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Finder whose answers are pushed by the test
struct ScriptedFinder {
    searches: Arc<AtomicUsize>,
    answers: mpsc::UnboundedReceiver<UnitEvent>,
}

#[async_trait]
impl UnitFinder for ScriptedFinder {
    async fn search(&mut self) -> Result<()> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_event(&mut self) -> UnitEvent {
        match self.answers.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

fn scripted() -> (ScriptedFinder, Arc<AtomicUsize>, mpsc::UnboundedSender<UnitEvent>) {
    let searches = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::unbounded_channel();
    let finder = ScriptedFinder {
        searches: searches.clone(),
        answers: rx,
    };
    (finder, searches, tx)
}

fn unit(last_octet: u8) -> Unit {
    Unit {
        name: format!("Pentair -i: {}", last_octet),
        address: IpAddr::V4(Ipv4Addr::new(192, 168, 1, last_octet)),
        port: 6680,
    }
}

#[tokio::test(start_paused = true)]
async fn test_searches_again_every_retry_interval() {
    let (mut finder, searches, _tx) = scripted();

    let outcome = tokio::time::timeout(
        Duration::from_secs(12),
        search_until_found(&mut finder, Duration::from_secs(5)),
    )
    .await;

    assert!(outcome.is_err(), "search should still be running");
    // t=0, t=5, t=10
    assert_eq!(searches.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_first_responder_wins() {
    let (mut finder, searches, tx) = scripted();
    tx.send(UnitEvent::Found(unit(50))).unwrap();
    tx.send(UnitEvent::Found(unit(51))).unwrap();

    let found = search_until_found(&mut finder, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(found, unit(50));
    assert_eq!(searches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_late_answer_after_retries() {
    let (mut finder, searches, tx) = scripted();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(7)).await;
        let _ = tx.send(UnitEvent::Found(unit(60)));
        // keep the channel open
        std::future::pending::<()>().await;
    });

    let found = search_until_found(&mut finder, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(found.address, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 60)));
    assert_eq!(searches.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_finder_error_ends_search() {
    let (mut finder, _searches, tx) = scripted();
    tx.send(UnitEvent::Error(DiscoveryError::NetworkError(
        "interface went away".to_string(),
    )))
    .unwrap();

    let result = search_until_found(&mut finder, Duration::from_secs(5)).await;
    assert!(matches!(result, Err(DiscoveryError::NetworkError(_))));
}

#[tokio::test(start_paused = true)]
async fn test_huge_retry_interval_still_waits_for_answers() {
    let (mut finder, searches, tx) = scripted();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        let _ = tx.send(UnitEvent::Found(unit(70)));
        std::future::pending::<()>().await;
    });

    let found = search_until_found(&mut finder, Duration::from_secs(u64::MAX))
        .await
        .unwrap();

    assert_eq!(found, unit(70));
    assert_eq!(searches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_retry_interval_is_rejected() {
    let (mut finder, searches, _tx) = scripted();

    let result = search_until_found(&mut finder, Duration::ZERO).await;

    assert!(matches!(result, Err(DiscoveryError::InvalidRetryInterval)));
    assert_eq!(searches.load(Ordering::SeqCst), 0);
}
