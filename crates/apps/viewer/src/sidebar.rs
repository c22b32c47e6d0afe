use chrono::NaiveDate;

/// Content the session places in the host's sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidebarContent {
    /// Start and end date pickers, pre-filled with the current window.
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Host-owned region of the page outside the map.
pub trait SidebarSlot {
    fn set_content(&mut self, content: SidebarContent);
}

/// Sidebar that just remembers what it was given.
#[derive(Debug, Default)]
pub struct RecordingSidebar {
    pub contents: Vec<SidebarContent>,
}

impl SidebarSlot for RecordingSidebar {
    fn set_content(&mut self, content: SidebarContent) {
        self.contents.push(content);
    }
}
