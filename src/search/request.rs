use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use crate::core::config::MAX_LIMIT;
use crate::core::error::{Error, Result};
use crate::query::ast::Query;
use crate::query::types::Sorting;

/// Which stored properties each result record carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertySelect {
    All,
    None,
    Named(BTreeSet<String>),
}

impl PropertySelect {
    pub fn named<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PropertySelect::Named(names.into_iter().map(Into::into).collect())
    }
}

/// One page request: query, window, sort and property selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    query: Query,
    limit: usize,
    cursor: usize,
    sorting: Sorting,
    select: PropertySelect,
}

impl SearchRequest {
    pub fn new(query: Query) -> Self {
        SearchRequest {
            query,
            limit: MAX_LIMIT,
            cursor: 0,
            sorting: Sorting::default(),
            select: PropertySelect::All,
        }
    }

    /// Negative limits are rejected; limits above `MAX_LIMIT` are clamped
    pub fn with_limit(mut self, limit: i64) -> Result<Self> {
        let limit = usize::try_from(limit)
            .map_err(|_| Error::InvalidArgument(format!("limit must not be negative, got {}", limit)))?;
        self.limit = limit.min(MAX_LIMIT);
        Ok(self)
    }

    pub fn with_cursor(mut self, cursor: i64) -> Result<Self> {
        self.cursor = usize::try_from(cursor)
            .map_err(|_| Error::InvalidArgument(format!("cursor must not be negative, got {}", cursor)))?;
        Ok(self)
    }

    pub fn with_sorting(mut self, sorting: Sorting) -> Self {
        self.sorting = sorting;
        self
    }

    pub fn with_select(mut self, select: PropertySelect) -> Self {
        self.select = select;
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sorting(&self) -> &Sorting {
        &self.sorting
    }

    pub fn select(&self) -> &PropertySelect {
        &self.select
    }

    /// Authorized documents required to fill the page, with the page size
    /// capped at `max_limit`
    pub fn need(&self, max_limit: usize) -> usize {
        self.cursor.saturating_add(self.limit.min(max_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let request = SearchRequest::new(Query::exists("title"));
        assert_eq!(request.limit(), MAX_LIMIT);
        assert_eq!(request.cursor(), 0);
        assert!(request.sorting().is_document_order());
        assert_eq!(request.select(), &PropertySelect::All);
    }

    #[test]
    fn test_limit_validation() {
        let request = SearchRequest::new(Query::exists("title"));
        assert!(matches!(request.clone().with_limit(-1), Err(Error::InvalidArgument(_))));
        assert!(matches!(request.clone().with_cursor(-5), Err(Error::InvalidArgument(_))));

        let clamped = request.with_limit(i64::MAX).unwrap();
        assert_eq!(clamped.limit(), MAX_LIMIT);
    }

    #[test]
    fn test_need() {
        let request = SearchRequest::new(Query::exists("title"))
            .with_cursor(20).unwrap()
            .with_limit(10).unwrap();
        assert_eq!(request.need(MAX_LIMIT), 30);
        assert_eq!(request.need(4), 24);

        let empty = SearchRequest::new(Query::exists("title")).with_limit(0).unwrap();
        assert_eq!(empty.need(MAX_LIMIT), 0);
    }
}
