//! Navigation state management

/// Which page is selected, which is on screen, and the selected line
#[derive(Clone, Debug, Default)]
pub struct ViewerState {
    /// Selected page (0-indexed); may still be loading
    pub current_page: usize,

    /// Total page count
    pub page_count: usize,

    /// Page currently on screen
    pub shown_page: Option<usize>,

    /// Selected text line on the shown page
    pub selected_line: Option<String>,
}

impl ViewerState {
    #[must_use]
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            ..Self::default()
        }
    }

    /// Whether the selected page is the one on screen
    #[must_use]
    pub fn is_current_shown(&self) -> bool {
        self.shown_page == Some(self.current_page)
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::OpenDocument { page_count } => {
                self.page_count = page_count;
                self.current_page = 0;
                self.shown_page = None;
                self.selected_line = None;
                if page_count > 0 {
                    vec![Effect::RequestPage(0)]
                } else {
                    vec![]
                }
            }

            Command::GoToPage(page) => {
                if page >= self.page_count {
                    vec![]
                } else if page == self.current_page {
                    // Re-selecting a page that never arrived retries it
                    if self.is_current_shown() {
                        vec![]
                    } else {
                        vec![Effect::RequestPage(page)]
                    }
                } else {
                    self.current_page = page;
                    self.selected_line = None;
                    vec![Effect::RequestPage(page)]
                }
            }

            Command::NextPage => match self.current_page.checked_add(1) {
                Some(next) if next < self.page_count => self.apply(Command::GoToPage(next)),
                _ => vec![],
            },

            Command::PrevPage => match self.current_page.checked_sub(1) {
                Some(prev) => self.apply(Command::GoToPage(prev)),
                None => vec![],
            },

            Command::PageArrived(page) => {
                if page != self.current_page || self.shown_page == Some(page) {
                    vec![]
                } else {
                    self.shown_page = Some(page);
                    vec![
                        Effect::ShowPage(page),
                        Effect::PrefetchNeighbors(page),
                        Effect::ReportContext,
                    ]
                }
            }

            Command::SelectLine(line_id) => {
                if !self.is_current_shown()
                    || self.selected_line.as_deref() == Some(line_id.as_str())
                {
                    vec![]
                } else {
                    self.selected_line = Some(line_id);
                    vec![Effect::ReportContext]
                }
            }

            Command::ClearSelection => {
                if self.selected_line.take().is_some() {
                    vec![Effect::ReportContext]
                } else {
                    vec![]
                }
            }
        }
    }
}

/// Commands that modify viewer state
#[derive(Clone, Debug)]
pub enum Command {
    /// A new document replaced the old one
    OpenDocument { page_count: usize },
    /// Select a specific page
    GoToPage(usize),
    NextPage,
    PrevPage,
    /// A page finished loading
    PageArrived(usize),
    /// Select a text line on the shown page
    SelectLine(String),
    ClearSelection,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Load a page (or take it from the cache)
    RequestPage(usize),
    /// Put a loaded page on screen
    ShowPage(usize),
    /// Warm the cache with the pages either side
    PrefetchNeighbors(usize),
    /// Tell the host what the user is looking at
    ReportContext,
}
