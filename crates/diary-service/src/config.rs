//! Configuration for the event service

use tracing::warn;

/// Events per listing page
pub const DEFAULT_PAGE_SIZE: usize = 8;

/// Environment variable overriding the page size
pub const PAGE_SIZE_ENV: &str = "DIARY_PAGE_SIZE";

/// Configuration for an EventService
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Events per listing page, at least 1
    pub page_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Defaults, overridden by `DIARY_PAGE_SIZE` when it holds a positive integer
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(PAGE_SIZE_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => config.page_size = size,
                _ => warn!(value = %raw, "Ignoring invalid DIARY_PAGE_SIZE"),
            }
        }
        config
    }

    /// Set the page size; zero is raised to 1
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
