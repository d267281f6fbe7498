//! Viewer session - one open document
//!
//! Drives [`ViewerState`] and carries out its effects against the
//! [`PageService`], the search index and the context reporter. Everything runs
//! on the caller's thread; page loads complete through [`ViewerSession::poll`].

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use super::overlay::OverlayEvent;
use super::request::PageResponse;
use super::service::{Fetch, PageService};
use super::state::{Command, Effect, ViewerState};
use super::types::{PageData, ViewerData};
use crate::context::{ContextReporter, ContextSession, ContextSummary};
use crate::loader::PageLoader;
use crate::search::{SearchMatch, SearchState};
use crate::settings::Settings;

/// What the host should do after a session call
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// Put this page on the canvas
    PageShown(Arc<PageData>),
    /// The selected page could not be loaded; selecting it again retries
    PageFailed { index: usize, error: String },
    /// Scroll a search match into view
    RevealLine { page: usize, line_id: String },
}

pub struct ViewerSession<R: ContextReporter> {
    data: ViewerData,
    state: ViewerState,
    service: PageService,
    context: ContextSession<R>,
    search: SearchState,
    shown: Option<Arc<PageData>>,
    /// Page handed over by the current completion, shown without a cache lookup
    arrived: Option<Arc<PageData>>,
    pending_reveal: Option<SearchMatch>,
}

impl<R: ContextReporter> ViewerSession<R> {
    pub fn new(data: ViewerData, loader: Arc<dyn PageLoader>, reporter: R) -> Self {
        Self::with_settings(data, loader, reporter, &Settings::default())
    }

    pub fn with_settings(
        data: ViewerData,
        loader: Arc<dyn PageLoader>,
        reporter: R,
        settings: &Settings,
    ) -> Self {
        let service = PageService::with_config(data.pages.clone(), loader, &settings.cache);
        let mut search = SearchState::new();
        if let Some(term) = &data.search_term {
            search.set_query(term);
        }

        Self {
            state: ViewerState::new(data.page_count()),
            data,
            service,
            context: ContextSession::new(reporter, &settings.context),
            search,
            shown: None,
            arrived: None,
            pending_reveal: None,
        }
    }

    #[must_use]
    pub fn data(&self) -> &ViewerData {
        &self.data
    }

    #[must_use]
    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.state.current_page
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.page_count
    }

    /// Page on screen; lags behind [`Self::current_page`] while loading
    #[must_use]
    pub fn shown_page(&self) -> Option<&Arc<PageData>> {
        self.shown.as_ref()
    }

    #[must_use]
    pub fn selected_line(&self) -> Option<&str> {
        self.state.selected_line.as_deref()
    }

    #[must_use]
    pub fn highlight_color(&self) -> Option<&str> {
        self.data.highlight_color.as_deref()
    }

    #[must_use]
    pub fn service(&self) -> &PageService {
        &self.service
    }

    #[must_use]
    pub fn context(&self) -> &ContextSession<R> {
        &self.context
    }

    #[must_use]
    pub fn search(&self) -> &SearchState {
        &self.search
    }

    /// Lines on `page` matching the active search
    #[must_use]
    pub fn search_highlights(&self, page: &PageData) -> Vec<String> {
        self.search.matching_line_ids(page)
    }

    // --- navigation ---

    pub fn go_to_page(&mut self, page: usize) -> Vec<SessionEvent> {
        if self
            .pending_reveal
            .as_ref()
            .is_some_and(|m| m.page != page)
        {
            self.pending_reveal = None;
        }
        self.apply(Command::GoToPage(page))
    }

    pub fn next_page(&mut self) -> Vec<SessionEvent> {
        self.pending_reveal = None;
        self.apply(Command::NextPage)
    }

    pub fn prev_page(&mut self) -> Vec<SessionEvent> {
        self.pending_reveal = None;
        self.apply(Command::PrevPage)
    }

    pub fn select_line(&mut self, line_id: &str) -> Vec<SessionEvent> {
        self.apply(Command::SelectLine(line_id.to_string()))
    }

    pub fn clear_selection(&mut self) -> Vec<SessionEvent> {
        self.apply(Command::ClearSelection)
    }

    /// Apply a selection change raised by the page overlay
    pub fn handle_overlay_event(&mut self, event: OverlayEvent) -> Vec<SessionEvent> {
        match event {
            OverlayEvent::LineSelected { page, line_id } if page == self.state.current_page => {
                self.select_line(&line_id)
            }
            OverlayEvent::SelectionCleared { page } if page == self.state.current_page => {
                self.clear_selection()
            }
            OverlayEvent::LineSelected { page, .. } | OverlayEvent::SelectionCleared { page } => {
                debug!("Ignoring selection change on page {page}, no longer current");
                vec![]
            }
        }
    }

    // --- completions ---

    /// Apply finished page loads without blocking
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let responses = self.service.poll_responses();
        self.handle_responses(responses)
    }

    /// Block until a page load finishes or `timeout` passes
    pub fn wait(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        let responses = self.service.wait_responses(timeout);
        self.handle_responses(responses)
    }

    // --- search ---

    /// Start a search over the loaded pages and return the match count.
    ///
    /// An empty query clears the search.
    pub fn set_search(&mut self, query: &str) -> usize {
        self.search.set_query(query);
        self.refresh_search();
        self.search.matches().len()
    }

    pub fn next_match(&mut self) -> Vec<SessionEvent> {
        let target = self.search.next_match().cloned();
        self.go_to_match(target)
    }

    pub fn previous_match(&mut self) -> Vec<SessionEvent> {
        let target = self.search.previous_match().cloned();
        self.go_to_match(target)
    }

    // --- lifecycle ---

    /// Replace the document. Cached pages, outstanding loads, the search
    /// and the context session all start over.
    pub fn load(&mut self, data: ViewerData) -> Vec<SessionEvent> {
        info!("Loading document with {} pages", data.page_count());
        self.service.reset(data.pages.clone());
        self.search.clear();
        if let Some(term) = &data.search_term {
            self.search.set_query(term);
        }
        self.context.reset();
        self.shown = None;
        self.arrived = None;
        self.pending_reveal = None;

        let page_count = data.page_count();
        self.data = data;
        self.apply(Command::OpenDocument { page_count })
    }

    /// Tear down: workers stop and the context session is forgotten
    pub fn close(mut self) {
        self.context.reset();
        self.service.shutdown();
    }

    fn go_to_match(&mut self, target: Option<SearchMatch>) -> Vec<SessionEvent> {
        let Some(target) = target else {
            return vec![];
        };
        let page = target.page;
        self.pending_reveal = Some(target);
        let mut events = self.apply(Command::GoToPage(page));

        if self.state.shown_page == Some(page) {
            if let Some(target) = self.pending_reveal.take() {
                events.push(SessionEvent::RevealLine {
                    page: target.page,
                    line_id: target.line_id,
                });
            }
        }
        events
    }

    fn handle_responses(&mut self, responses: Vec<PageResponse>) -> Vec<SessionEvent> {
        let mut events = vec![];
        let mut loaded_any = false;

        for response in responses {
            match response {
                PageResponse::Loaded { index, data, .. } => {
                    loaded_any = true;
                    if index != self.state.current_page {
                        debug!("Page {index} arrived after navigating away, cached only");
                    }
                    self.arrived = Some(data);
                    events.extend(self.apply(Command::PageArrived(index)));
                    self.arrived = None;
                }
                PageResponse::Failed { index, error, .. } => {
                    if index == self.state.current_page {
                        events.push(SessionEvent::PageFailed {
                            index,
                            error: error.to_string(),
                        });
                    }
                }
            }
        }

        if loaded_any {
            self.refresh_search();
        }
        events
    }

    fn refresh_search(&mut self) {
        if self.search.is_active() {
            self.search.rebuild(
                self.service.cached_pages().map(|page| &**page),
                self.state.current_page,
            );
        }
    }

    fn apply(&mut self, cmd: Command) -> Vec<SessionEvent> {
        let effects = self.state.apply(cmd);
        self.run(effects)
    }

    fn run(&mut self, effects: Vec<Effect>) -> Vec<SessionEvent> {
        let mut events = vec![];
        for effect in effects {
            match effect {
                Effect::RequestPage(page) => match self.service.fetch(page) {
                    Fetch::Ready(data) => {
                        self.arrived = Some(data);
                        events.extend(self.apply(Command::PageArrived(page)));
                        self.arrived = None;
                    }
                    Fetch::Pending(id) => debug!("Page {page} pending as {id:?}"),
                    Fetch::OutOfRange => {}
                },

                Effect::ShowPage(page) => {
                    let data = match self.arrived.take() {
                        Some(data) if data.index == page => Some(data),
                        _ => self.service.get_cached(page),
                    };
                    let Some(data) = data else {
                        debug!("Page {page} vanished before it could be shown");
                        continue;
                    };
                    self.shown = Some(Arc::clone(&data));
                    events.push(SessionEvent::PageShown(data));

                    if let Some(target) = self.pending_reveal.take_if(|m| m.page == page) {
                        events.push(SessionEvent::RevealLine {
                            page,
                            line_id: target.line_id,
                        });
                    }
                }

                Effect::PrefetchNeighbors(page) => {
                    if let Some(prev) = page.checked_sub(1) {
                        self.service.prefetch(prev);
                    }
                    self.service.prefetch(page + 1);
                }

                Effect::ReportContext => self.report_context(),
            }
        }
        events
    }

    fn report_context(&mut self) {
        let Some(page) = &self.shown else {
            return;
        };
        let summary = ContextSummary::for_page(
            page,
            self.state.page_count,
            self.data.label(page.index),
            self.state.selected_line.as_deref(),
        );
        self.context.report(&summary);
    }
}
