use serde::{Deserialize, Deserializer, Serialize};

use crate::users::repo_types::SortDirection;

pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;
/// Largest page whose offset still fits in an i64 at any allowed page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// Query string of `GET /users`. Values are kept raw and parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    pub search: Option<String>,
    pub sort: Option<String>,
    #[serde(rename = "perPage")]
    pub per_page: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListUsersQuery {
    pub search: Option<String>,
    pub sort: SortDirection,
    pub per_page: i64,
    pub page: i64,
}

impl Default for ListUsersQuery {
    fn default() -> Self {
        Self {
            search: None,
            sort: SortDirection::Asc,
            per_page: DEFAULT_PER_PAGE,
            page: 1,
        }
    }
}

impl ListUsersQuery {
    /// Rows to skip before this page.
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.per_page)
    }
}

impl From<ListUsersParams> for ListUsersQuery {
    fn from(p: ListUsersParams) -> Self {
        let search = p
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let per_page = p
            .per_page
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_PER_PAGE))
            .unwrap_or(DEFAULT_PER_PAGE);
        let page = p
            .page
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_PAGE))
            .unwrap_or(1);
        Self {
            search,
            sort: SortDirection::parse_lenient(p.sort.as_deref()),
            per_page,
            page,
        }
    }
}

/// Body of `POST /users`, deserialized after validation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Body of `PUT /users/{id}`. For `ip`/`comment` the outer `Option` tells
/// absent from present, the inner one carries an explicit null.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub ip: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub comment: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// One page of rows plus the metadata needed to walk the rest.
#[derive(Debug, Serialize)]
pub struct PagedResult<T> {
    pub current_page: i64,
    pub data: Vec<T>,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl<T> PagedResult<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let per_page = per_page.max(1);
        let last_page = (total.saturating_add(per_page - 1) / per_page).max(1);
        let (from, to) = if data.is_empty() {
            (None, None)
        } else {
            let first = (page - 1).saturating_mul(per_page).saturating_add(1);
            (Some(first), Some(first.saturating_add(data.len() as i64 - 1)))
        };
        Self {
            current_page: page,
            data,
            per_page,
            total,
            last_page,
            from,
            to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_params_fall_back_to_defaults() {
        let q = ListUsersQuery::from(ListUsersParams {
            search: Some("   ".into()),
            sort: Some("sideways".into()),
            per_page: Some("abc".into()),
            page: Some("0".into()),
        });
        assert_eq!(q, ListUsersQuery::default());
    }

    #[test]
    fn list_params_are_parsed() {
        let q = ListUsersQuery::from(ListUsersParams {
            search: Some(" John ".into()),
            sort: Some("DESC".into()),
            per_page: Some("500".into()),
            page: Some("3".into()),
        });
        assert_eq!(q.search.as_deref(), Some("John"));
        assert_eq!(q.sort, SortDirection::Desc);
        assert_eq!(q.per_page, MAX_PER_PAGE);
        assert_eq!(q.page, 3);
    }

    #[test]
    fn huge_page_is_clamped_and_offset_does_not_overflow() {
        let q = ListUsersQuery::from(ListUsersParams {
            page: Some(i64::MAX.to_string()),
            per_page: Some("100".into()),
            ..Default::default()
        });
        assert_eq!(q.page, MAX_PAGE);
        assert!(q.offset() > 0);

        let raw = ListUsersQuery {
            page: i64::MAX,
            ..Default::default()
        };
        assert_eq!(raw.offset(), i64::MAX);
    }

    #[test]
    fn changes_distinguish_absent_from_null() {
        let c: UserChanges = serde_json::from_value(json!({"comment": null})).unwrap();
        assert_eq!(c.ip, None);
        assert_eq!(c.comment, Some(None));

        let c: UserChanges = serde_json::from_value(json!({"ip": "127.0.0.1", "name": null})).unwrap();
        assert_eq!(c.ip, Some(Some("127.0.0.1".into())));
        assert_eq!(c.name, None);
    }

    #[test]
    fn paged_result_metadata() {
        let page: PagedResult<i32> = PagedResult::new((0..10).collect(), 1, 10, 15);
        assert_eq!(page.last_page, 2);
        assert_eq!((page.from, page.to), (Some(1), Some(10)));

        let page: PagedResult<i32> = PagedResult::new((0..5).collect(), 2, 10, 15);
        assert_eq!((page.from, page.to), (Some(11), Some(15)));

        let far: PagedResult<i32> = PagedResult::new(vec![1], i64::MAX, 10, 15);
        assert_eq!(far.from, Some(i64::MAX));

        let empty: PagedResult<i32> = PagedResult::new(vec![], 1, 10, 0);
        assert_eq!(empty.last_page, 1);
        assert_eq!((empty.from, empty.to), (None, None));
    }
}
