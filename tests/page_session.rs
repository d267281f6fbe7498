use std::sync::Arc;
use std::time::{Duration, Instant};

use altoview::settings::{CacheConfig, Settings};
use altoview::test_utils::{CountingLoader, RecordingReporter, viewer_data};
use altoview::viewer::{
    Fetch, OverlayEvent, PageService, SessionEvent, ViewerData, ViewerSession,
};

type Session = ViewerSession<Arc<RecordingReporter>>;

fn session(data: ViewerData) -> (Session, Arc<CountingLoader>, Arc<RecordingReporter>) {
    let loader = Arc::new(CountingLoader::new());
    let reporter = Arc::new(RecordingReporter::new());
    let session = ViewerSession::new(data, loader.clone(), Arc::clone(&reporter));
    (session, loader, reporter)
}

fn pump_until(session: &mut Session, mut done: impl FnMut(&Session) -> bool) -> Vec<SessionEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = vec![];
    while !done(session) {
        assert!(Instant::now() < deadline, "session did not settle");
        events.extend(session.wait(Duration::from_millis(50)));
    }
    events
}

fn shown(session: &Session) -> Option<usize> {
    session.shown_page().map(|page| page.index)
}

fn shown_indices(events: &[SessionEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::PageShown(page) => Some(page.index),
            _ => None,
        })
        .collect()
}

#[test]
fn concurrent_fetches_share_one_load() {
    let loader = Arc::new(CountingLoader::new());
    let mut service = PageService::new(viewer_data(5).pages, loader.clone());

    let Fetch::Pending(first) = service.fetch(2) else {
        panic!("expected a pending fetch");
    };
    let Fetch::Pending(second) = service.fetch(2) else {
        panic!("expected a pending fetch");
    };
    assert_eq!(first, second);

    let responses = service.wait_responses(Duration::from_secs(5));
    assert_eq!(responses.len(), 1);
    assert_eq!(loader.calls(2), 1);
    assert!(matches!(service.fetch(2), Fetch::Ready(page) if page.index == 2));
    assert_eq!(loader.total_calls(), 1);
}

#[test]
fn out_of_range_fetch_is_a_noop() {
    let loader = Arc::new(CountingLoader::new());
    let mut service = PageService::new(viewer_data(3).pages, loader.clone());

    assert!(matches!(service.fetch(3), Fetch::OutOfRange));
    assert!(!service.prefetch(7));
    assert!(service.wait_responses(Duration::from_millis(50)).is_empty());
    assert_eq!(loader.total_calls(), 0);
}

#[test]
fn bounded_cache_evicts_least_recently_used() {
    let loader = Arc::new(CountingLoader::new());
    let config = CacheConfig {
        capacity: Some(2),
        workers: 1,
    };
    let mut service = PageService::with_config(viewer_data(4).pages, loader.clone(), &config);

    for index in [0, 1] {
        let _ = service.fetch(index);
        service.wait_responses(Duration::from_secs(5));
    }
    // Touch page 0 so page 1 is the oldest
    assert!(service.get_cached(0).is_some());
    let _ = service.fetch(2);
    service.wait_responses(Duration::from_secs(5));

    assert!(service.is_cached(0));
    assert!(!service.is_cached(1));
    assert!(service.is_cached(2));
}

#[test]
fn prefetch_does_not_duplicate_a_pending_load() {
    let loader = Arc::new(CountingLoader::new());
    let mut service = PageService::new(viewer_data(3).pages, loader.clone());

    assert!(service.prefetch(1));
    assert!(service.is_prefetching(1));
    assert!(matches!(service.fetch(1), Fetch::Pending(_)));
    assert!(!service.is_prefetching(1));
    assert!(!service.prefetch(1));

    service.wait_responses(Duration::from_secs(5));
    assert_eq!(loader.calls(1), 1);
}

#[test]
fn reset_drops_responses_for_the_old_document() {
    let loader = Arc::new(CountingLoader::new());
    let mut service = PageService::new(viewer_data(3).pages, loader.clone());

    let _ = service.fetch(1);
    service.reset(viewer_data(2).pages);
    assert!(!service.is_in_flight(1));

    // The old response arrives but is not accepted
    let deadline = Instant::now() + Duration::from_secs(5);
    while loader.calls(1) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    std::thread::sleep(Duration::from_millis(20));
    assert!(service.poll_responses().is_empty());
    assert!(!service.is_cached(1));
}

#[test]
fn stale_completion_is_cached_but_not_shown() {
    let (mut session, _loader, _reporter) = session(viewer_data(8));

    assert!(session.go_to_page(2).is_empty());
    assert!(session.go_to_page(5).is_empty());

    let events = pump_until(&mut session, |s| {
        shown(s) == Some(5) && s.service().is_cached(2)
    });

    assert_eq!(shown_indices(&events), vec![5]);
    assert_eq!(session.current_page(), 5);
}

#[test]
fn shown_page_prefetches_only_its_neighbours() {
    let (mut session, loader, _reporter) = session(viewer_data(8));

    let _ = session.go_to_page(3);
    assert!(!session.service().is_in_flight(2));
    assert!(!session.service().is_in_flight(4));

    pump_until(&mut session, |s| shown(s) == Some(3));
    pump_until(&mut session, |s| {
        s.service().is_cached(2) && s.service().is_cached(4)
    });

    // Prefetched pages do not trigger prefetches of their own
    std::thread::sleep(Duration::from_millis(30));
    let _ = session.poll();
    assert_eq!(loader.requested_pages(), vec![2, 3, 4]);
    assert_eq!(loader.total_calls(), 3);
}

#[test]
fn first_page_prefetches_only_the_next() {
    let (mut session, loader, _reporter) = session(viewer_data(3));

    let _ = session.go_to_page(0);
    pump_until(&mut session, |s| shown(s) == Some(0) && s.service().is_cached(1));
    assert_eq!(loader.requested_pages(), vec![0, 1]);
}

#[test]
fn navigating_to_a_prefetched_page_is_immediate() {
    let (mut session, loader, _reporter) = session(viewer_data(8));

    let _ = session.go_to_page(3);
    pump_until(&mut session, |s| {
        shown(s) == Some(3) && s.service().is_cached(4)
    });

    let events = session.next_page();
    assert_eq!(shown_indices(&events), vec![4]);
    assert_eq!(loader.calls(4), 1);
}

#[test]
fn failed_page_is_not_cached_and_retries() {
    let (mut session, loader, _reporter) = session(viewer_data(3));
    loader.fail_page(1);

    let _ = session.go_to_page(1);
    let events = pump_until(&mut session, |s| !s.service().is_in_flight(1));
    assert!(events
        .iter()
        .any(|e| matches!(e, SessionEvent::PageFailed { index: 1, .. })));
    assert!(!session.service().is_cached(1));
    assert_eq!(shown(&session), None);

    loader.recover_page(1);
    let _ = session.go_to_page(1);
    pump_until(&mut session, |s| shown(s) == Some(1));
    assert_eq!(loader.calls(1), 2);
}

#[test]
fn context_reported_on_show_and_selection() {
    let mut data = viewer_data(3);
    data.labels[0] = Some("Folio 1r".to_string());
    let (mut session, _loader, reporter) = session(data);

    let _ = session.go_to_page(0);
    pump_until(&mut session, |s| shown(s) == Some(0));

    let texts = reporter.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Viewing page 1 of 3 (Folio 1r)\n"));
    assert!(texts[0].contains("Page 1 first line\nPage 1 second line"));

    let _ = session.handle_overlay_event(OverlayEvent::LineSelected {
        page: 0,
        line_id: "l1".into(),
    });
    let _ = session.select_line("l1");
    let texts = reporter.texts();
    assert_eq!(texts.len(), 2);
    assert!(texts[1].contains("Selected line: \"Page 1 second line\""));

    let _ = session.handle_overlay_event(OverlayEvent::SelectionCleared { page: 0 });
    assert_eq!(reporter.texts().len(), 3);
    assert_eq!(reporter.texts()[2], reporter.texts()[0]);
}

#[test]
fn selection_on_a_page_no_longer_current_is_ignored() {
    let (mut session, _loader, reporter) = session(viewer_data(3));
    let _ = session.go_to_page(0);
    pump_until(&mut session, |s| shown(s) == Some(0));

    let _ = session.handle_overlay_event(OverlayEvent::LineSelected {
        page: 2,
        line_id: "l0".into(),
    });
    assert_eq!(session.selected_line(), None);
    assert_eq!(reporter.texts().len(), 1);
}

#[test]
fn failed_report_is_retried_on_next_change() {
    let (mut session, _loader, reporter) = session(viewer_data(3));
    reporter.set_failing(true);
    let _ = session.go_to_page(0);
    pump_until(&mut session, |s| shown(s) == Some(0));
    assert!(session.context().last_sent().is_none());

    reporter.set_failing(false);
    let _ = session.select_line("l0");
    assert_eq!(reporter.texts().len(), 1);
}

#[test]
fn loading_a_new_document_starts_over() {
    let (mut session, loader, reporter) = session(viewer_data(5));
    let _ = session.go_to_page(2);
    pump_until(&mut session, |s| shown(s) == Some(2));
    let first_session = session.context().session_id().to_string();

    let events = session.load(viewer_data(2));
    assert!(events.is_empty());
    assert_eq!(session.page_count(), 2);
    assert_eq!(session.current_page(), 0);
    assert_eq!(shown(&session), None);
    assert!(!session.service().is_cached(2));

    pump_until(&mut session, |s| shown(s) == Some(0));
    assert_ne!(session.context().session_id(), first_session);
    assert_eq!(
        reporter.session_ids().last().map(String::as_str),
        Some(session.context().session_id())
    );
    assert!(reporter.texts().last().is_some_and(|t| t.starts_with("Viewing page 1 of 2")));
    assert!(loader.calls(0) >= 1);
}

#[test]
fn search_term_seeds_matches_and_navigation_reveals_line() {
    let mut data = viewer_data(4);
    data.search_term = Some("page 2".to_string());
    let (mut session, _loader, _reporter) = session(data);

    let _ = session.go_to_page(0);
    pump_until(&mut session, |s| {
        shown(s) == Some(0) && s.service().is_cached(1)
    });
    let _ = session.poll();
    assert_eq!(session.search().matches().len(), 2);

    let events = session.next_match();
    assert_eq!(shown_indices(&events), vec![1]);
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::RevealLine { page: 1, line_id } if line_id == "l0"
    )));

    // Next match is on the page already shown
    let events = session.next_match();
    assert!(shown_indices(&events).is_empty());
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::RevealLine { page: 1, line_id } if line_id == "l1"
    )));
}

#[test]
fn search_highlights_for_shown_page() {
    let (mut session, _loader, _reporter) = session(viewer_data(2));
    let _ = session.go_to_page(0);
    pump_until(&mut session, |s| shown(s) == Some(0) && s.service().is_cached(1));

    // Both loaded pages have a second line
    assert_eq!(session.set_search("SECOND"), 2);
    let page = session.shown_page().cloned().unwrap();
    assert_eq!(session.search_highlights(&page), vec!["l1".to_string()]);

    assert_eq!(session.set_search(""), 0);
    assert!(session.search_highlights(&page).is_empty());
}

#[test]
fn settings_cache_bound_applies_to_session() {
    let mut settings = Settings::default();
    settings.cache.capacity = Some(1);
    let loader = Arc::new(CountingLoader::new());
    let mut session = ViewerSession::with_settings(
        viewer_data(3),
        loader.clone(),
        Arc::new(RecordingReporter::new()),
        &settings,
    );

    let _ = session.go_to_page(1);
    pump_until(&mut session, |s| {
        shown(s) == Some(1) && !s.service().is_in_flight(0) && !s.service().is_in_flight(2)
    });
    assert_eq!(session.service().cached_pages().count(), 1);
    // The shown page stays displayable even after eviction
    assert_eq!(shown(&session), Some(1));
}
