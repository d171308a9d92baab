use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, AppResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Order value understood by MongoDB sort documents.
    pub fn as_mongo(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptSortField {
    #[default]
    StartedAt,
    EndedAt,
    Score,
    AttemptNumber,
    Duration,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestSortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    QuestionCount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sort<F> {
    pub field: F,
    pub direction: SortDirection,
}

/// 1-based page selection. A missing size means "everything" unless the
/// caller supplies a default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageParams {
    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// Returns `(skip, limit)`; `limit` is `None` when the whole result set is wanted.
    pub fn window(&self, default_size: Option<u64>) -> (u64, Option<u64>) {
        let page = self.page.unwrap_or(1).max(1);
        match self.page_size.or(default_size) {
            Some(size) => ((page - 1).saturating_mul(size), Some(size)),
            None => (0, None),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}

impl<T> PageResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttemptFilter {
    pub test_ids: Vec<i64>,
    pub user_ids: Vec<i64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttemptQuery {
    pub filter: AttemptFilter,
    pub sort: Sort<AttemptSortField>,
    pub page: PageParams,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestFilter {
    /// Whitespace-separated keywords; each must appear in the title or description.
    pub search: Option<String>,
    pub test_ids: Vec<i64>,
    pub author_ids: Vec<i64>,
}

impl TestFilter {
    pub fn keywords(&self) -> Vec<String> {
        self.search
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_lowercase).collect())
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestQuery {
    pub filter: TestFilter,
    pub sort: Sort<TestSortField>,
    pub page: PageParams,
}

/// Query string accepted by `GET /api/attempts`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AttemptListParams {
    pub test_ids: Option<String>,
    pub user_ids: Option<String>,
    pub sort_by: Option<AttemptSortField>,
    pub direction: Option<SortDirection>,
    #[validate(range(min = 1, max = 1_000_000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 1000))]
    pub page_size: Option<u64>,
}

impl AttemptListParams {
    pub fn into_query(self) -> AppResult<AttemptQuery> {
        self.validate()?;
        Ok(AttemptQuery {
            filter: AttemptFilter {
                test_ids: parse_id_list("test_ids", self.test_ids.as_deref())?,
                user_ids: parse_id_list("user_ids", self.user_ids.as_deref())?,
            },
            sort: Sort {
                field: self.sort_by.unwrap_or_default(),
                direction: self.direction.unwrap_or_default(),
            },
            page: PageParams {
                page: self.page,
                page_size: self.page_size,
            },
        })
    }
}

/// Query string accepted by `GET /api/tests`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TestListParams {
    #[validate(length(max = 200))]
    pub search: Option<String>,
    pub test_ids: Option<String>,
    pub author_ids: Option<String>,
    pub sort_by: Option<TestSortField>,
    pub direction: Option<SortDirection>,
    #[validate(range(min = 1, max = 1_000_000))]
    pub page: Option<u64>,
    #[validate(range(min = 1, max = 1000))]
    pub page_size: Option<u64>,
}

impl TestListParams {
    pub fn into_query(self) -> AppResult<TestQuery> {
        self.validate()?;
        Ok(TestQuery {
            filter: TestFilter {
                search: self.search.filter(|s| !s.trim().is_empty()),
                test_ids: parse_id_list("test_ids", self.test_ids.as_deref())?,
                author_ids: parse_id_list("author_ids", self.author_ids.as_deref())?,
            },
            sort: Sort {
                field: self.sort_by.unwrap_or_default(),
                direction: self.direction.unwrap_or_default(),
            },
            page: PageParams {
                page: self.page,
                page_size: self.page_size,
            },
        })
    }
}

/// Parses `"1, 2,3"` into ids. Empty or missing input means no constraint.
fn parse_id_list(name: &str, raw: Option<&str>) -> AppResult<Vec<i64>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>().map_err(|_| {
                AppError::ValidationError(format!("{} contains a non-numeric id '{}'", name, part))
            })
        })
        .collect()
}
