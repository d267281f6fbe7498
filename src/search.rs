/// Full-text search over loaded text layers
/// Provides case-insensitive line matching with wrap-around navigation across pages
use crate::viewer::PageData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub page: usize,
    /// Line position in the page's reading order
    pub line_index: usize,
    pub line_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchState {
    query: Option<String>,
    needle: String,
    matches: Vec<SearchMatch>,
    current_match_index: Option<usize>,
    /// Where navigation starts when no match is current yet
    anchor_page: usize,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query; an empty or whitespace-only query clears the search
    pub fn set_query(&mut self, query: &str) {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            self.clear();
            return;
        }
        self.query = Some(trimmed.to_string());
        self.needle = trimmed.to_lowercase();
        self.matches.clear();
        self.current_match_index = None;
    }

    pub fn clear(&mut self) {
        self.query = None;
        self.needle.clear();
        self.matches.clear();
        self.current_match_index = None;
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.query.is_some()
    }

    /// Ids of the lines on `page` that contain the query
    pub fn matching_line_ids(&self, page: &PageData) -> Vec<String> {
        if self.needle.is_empty() {
            return Vec::new();
        }
        page.text_layer
            .text_lines
            .iter()
            .filter(|line| line.transcription.to_lowercase().contains(&self.needle))
            .map(|line| line.id.clone())
            .collect()
    }

    /// Recompute matches over `pages`.
    ///
    /// The current match survives when it still matches; otherwise nothing is
    /// current and the next navigation starts from `current_page`.
    pub fn rebuild<'a>(
        &mut self,
        pages: impl IntoIterator<Item = &'a PageData>,
        current_page: usize,
    ) {
        let previous = self.current().cloned();
        self.matches.clear();
        if self.needle.is_empty() {
            self.current_match_index = None;
            return;
        }

        for page in pages {
            for (line_index, line) in page.text_layer.text_lines.iter().enumerate() {
                if line.transcription.to_lowercase().contains(&self.needle) {
                    self.matches.push(SearchMatch {
                        page: page.index,
                        line_index,
                        line_id: line.id.clone(),
                    });
                }
            }
        }
        self.matches.sort_by_key(|m| (m.page, m.line_index));

        self.anchor_page = current_page;
        self.current_match_index =
            previous.and_then(|prev| self.matches.iter().position(|m| *m == prev));
    }

    pub fn next_match(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }

        self.current_match_index = Some(match self.current_match_index {
            Some(idx) => (idx + 1) % self.matches.len(),
            // Wrap to the beginning if no match after the anchor page
            None => self
                .matches
                .iter()
                .position(|m| m.page >= self.anchor_page)
                .unwrap_or(0),
        });
        self.current()
    }

    pub fn previous_match(&mut self) -> Option<&SearchMatch> {
        if self.matches.is_empty() {
            return None;
        }

        let last = self.matches.len() - 1;
        self.current_match_index = Some(match self.current_match_index {
            Some(0) => last,
            Some(idx) => idx - 1,
            None => self
                .matches
                .iter()
                .rposition(|m| m.page <= self.anchor_page)
                .unwrap_or(last),
        });
        self.current()
    }

    pub fn current(&self) -> Option<&SearchMatch> {
        self.current_match_index.and_then(|idx| self.matches.get(idx))
    }

    pub fn matches(&self) -> &[SearchMatch] {
        &self.matches
    }

    pub fn get_match_info(&self) -> String {
        if self.matches.is_empty() {
            "No matches".to_string()
        } else if let Some(current) = self.current_match_index {
            format!("[{}/{}]", current + 1, self.matches.len())
        } else {
            format!("[{} matches]", self.matches.len())
        }
    }
}
