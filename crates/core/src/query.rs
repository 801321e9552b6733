//! Collection query model: search, sorting and pagination over a resource.
//!
//! A resource describes itself once with a [`ListingSpec`] (which columns a
//! free-text term is matched against, and which logical sort keys exist).
//! Raw request parameters are turned into a [`ListingPlan`]; storage backends
//! either evaluate the plan in memory ([`ListingPlan::apply`]) or translate it
//! into SQL. Both paths go through [`ListingSpec::plan`], so key resolution
//! behaves identically everywhere.

use core::cmp::Ordering;

use crate::entity::Entity;

/// Validated listing parameters as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionParams {
    /// Free-text terms. Every term must match; each term may match any search column.
    pub search: Vec<String>,
    /// Logical sort key (resolved through the resource's [`ListingSpec`]).
    pub sorting: Option<String>,
    /// Zero-based page index. Only meaningful together with `size`.
    pub page: Option<u64>,
    /// Page size. Absent means "no pagination".
    pub size: Option<u64>,
}

impl CollectionParams {
    /// Offset/limit window, or `None` when the client asked for every row.
    pub fn pagination(&self) -> Option<Pagination> {
        let size = self.size?;
        let page = self.page.unwrap_or(0);
        Some(Pagination {
            offset: page.saturating_mul(size),
            limit: size,
        })
    }
}

/// Offset/limit pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

/// One page of results plus the number of rows matching the filter (across all pages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Storage type of a listed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Integer column; free-text search matches against its decimal rendering.
    Integer,
}

/// A column taking part in search or sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Text,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnKind::Integer,
        }
    }
}

/// Mapping of one logical sort key to the column it compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub key: &'static str,
    pub column: Column,
    /// Compare text case-insensitively (`lower(column)` in SQL).
    pub fold_case: bool,
}

/// Static description of how a resource is searched and sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSpec {
    pub search_columns: &'static [Column],
    pub sort_fields: &'static [SortField],
}

impl ListingSpec {
    pub fn sort_field(&self, key: &str) -> Option<&SortField> {
        self.sort_fields.iter().find(|f| f.key == key)
    }

    /// Resolve raw parameters into an executable plan.
    ///
    /// Returns `None` when `sorting` names a key the resource does not map.
    /// Callers answer that with an empty page (`total = 0`) rather than an
    /// error or an unsorted listing. This mirrors long-standing client-visible
    /// behaviour and is most likely accidental; it is kept for this one case
    /// only.
    pub fn plan<'s>(&'s self, params: &CollectionParams) -> Option<ListingPlan<'s>> {
        let sort = match params.sorting.as_deref() {
            Some(key) => match self.sort_field(key) {
                Some(field) => Some(field),
                None => {
                    tracing::debug!(sorting = key, "unknown sort key; listing resolves to nothing");
                    return None;
                }
            },
            None => None,
        };

        Some(ListingPlan {
            terms: params.search.iter().map(|t| t.trim().to_string()).collect(),
            search_columns: self.search_columns,
            sort,
            pagination: params.pagination(),
        })
    }
}

/// Borrowed column value of a listed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnValue<'a> {
    Text(&'a str),
    Integer(i64),
}

/// Entities that can be listed through the collection query engine.
pub trait Listable: Entity + Clone {
    const LISTING: ListingSpec;

    /// Value of a named column, `None` for names the entity does not have.
    fn column(&self, name: &str) -> Option<ColumnValue<'_>>;
}

/// Resolved search/sort/pagination for one listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPlan<'s> {
    /// Trimmed search terms, ANDed together.
    pub terms: Vec<String>,
    /// Columns each term is ORed across.
    pub search_columns: &'s [Column],
    /// Requested ordering; `None` means ascending id (insertion order).
    pub sort: Option<&'s SortField>,
    pub pagination: Option<Pagination>,
}

impl ListingPlan<'_> {
    /// Whether a row satisfies every search term.
    pub fn matches<T: Listable>(&self, row: &T) -> bool {
        self.terms.iter().all(|term| {
            let needle = term.to_lowercase();
            self.search_columns.iter().any(|column| match row.column(column.name) {
                Some(ColumnValue::Text(text)) => text.to_lowercase().contains(&needle),
                Some(ColumnValue::Integer(n)) => n.to_string().contains(&needle),
                None => false,
            })
        })
    }

    /// Ordering of two rows: the requested sort column, then id ascending.
    pub fn compare<T: Listable>(&self, a: &T, b: &T) -> Ordering {
        let primary = match self.sort {
            Some(field) => compare_column(field, a, b),
            None => Ordering::Equal,
        };
        primary.then_with(|| a.id().cmp(&b.id()))
    }

    /// Filter, sort, count and paginate rows in memory.
    pub fn apply<T: Listable>(&self, rows: impl IntoIterator<Item = T>) -> Page<T> {
        let mut matched: Vec<T> = rows.into_iter().filter(|row| self.matches(row)).collect();
        matched.sort_by(|a, b| self.compare(a, b));

        let total = matched.len() as u64;
        let items = match self.pagination {
            Some(p) => matched
                .into_iter()
                .skip(usize::try_from(p.offset).unwrap_or(usize::MAX))
                .take(usize::try_from(p.limit).unwrap_or(usize::MAX))
                .collect(),
            None => matched,
        };

        Page { items, total }
    }
}

fn compare_column<T: Listable>(field: &SortField, a: &T, b: &T) -> Ordering {
    match (a.column(field.column.name), b.column(field.column.name)) {
        (Some(ColumnValue::Text(x)), Some(ColumnValue::Text(y))) if field.fold_case => {
            x.to_lowercase().cmp(&y.to_lowercase())
        }
        (Some(ColumnValue::Text(x)), Some(ColumnValue::Text(y))) => x.cmp(y),
        (Some(ColumnValue::Integer(x)), Some(ColumnValue::Integer(y))) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrganisationId, User, UserId, UserState};
    use proptest::prelude::*;

    fn user(id: i64, first: &str, last: &str) -> User {
        User {
            id: UserId::new(id),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: format!("{}@example.com", first.to_lowercase()),
            organisation_id: OrganisationId::new(1),
            state: UserState::Enabled,
        }
    }

    fn fixture() -> Vec<User> {
        vec![
            user(1, "John", "McClane"),
            user(2, "Hans", "Gruber"),
            user(3, "Holly", "Genaro"),
            user(4, "Zeus", "Carver"),
        ]
    }

    fn names(page: &Page<User>) -> Vec<String> {
        page.items.iter().map(User::display_name).collect()
    }

    fn run(params: CollectionParams) -> Page<User> {
        match User::LISTING.plan(&params) {
            Some(plan) => plan.apply(fixture()),
            None => Page::empty(),
        }
    }

    #[test]
    fn no_params_lists_everything_in_insertion_order() {
        let page = run(CollectionParams::default());
        assert_eq!(page.total, 4);
        assert_eq!(
            names(&page),
            vec!["John McClane", "Hans Gruber", "Holly Genaro", "Zeus Carver"]
        );
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let page = run(CollectionParams {
            search: vec!["hans".into()],
            ..Default::default()
        });
        assert_eq!(names(&page), vec!["Hans Gruber"]);
        assert_eq!(page.total, 1);

        let page = run(CollectionParams {
            search: vec!["hanso".into()],
            ..Default::default()
        });
        assert_eq!(page, Page::empty());
    }

    #[test]
    fn search_terms_are_anded_and_trimmed() {
        let page = run(CollectionParams {
            search: vec![" ho ".into(), "genaro".into()],
            ..Default::default()
        });
        assert_eq!(names(&page), vec!["Holly Genaro"]);

        let page = run(CollectionParams {
            search: vec!["ho".into(), "gruber".into()],
            ..Default::default()
        });
        assert_eq!(page.total, 0);
    }

    #[test]
    fn search_matches_id_rendering() {
        let page = run(CollectionParams {
            search: vec!["3".into()],
            ..Default::default()
        });
        assert_eq!(names(&page), vec!["Holly Genaro"]);
    }

    #[test]
    fn sorts_by_mapped_key() {
        let page = run(CollectionParams {
            sorting: Some("first_name".into()),
            ..Default::default()
        });
        assert_eq!(
            names(&page),
            vec!["Hans Gruber", "Holly Genaro", "John McClane", "Zeus Carver"]
        );

        let page = run(CollectionParams {
            sorting: Some("last_name".into()),
            ..Default::default()
        });
        assert_eq!(
            names(&page),
            vec!["Zeus Carver", "Holly Genaro", "Hans Gruber", "John McClane"]
        );
    }

    #[test]
    fn unknown_sort_key_yields_empty_page() {
        assert!(User::LISTING
            .plan(&CollectionParams {
                sorting: Some("agehh".into()),
                ..Default::default()
            })
            .is_none());

        let page = run(CollectionParams {
            sorting: Some("agehh".into()),
            ..Default::default()
        });
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn paginates_after_counting() {
        let page = run(CollectionParams {
            page: Some(0),
            size: Some(2),
            ..Default::default()
        });
        assert_eq!(names(&page), vec!["John McClane", "Hans Gruber"]);
        assert_eq!(page.total, 4);

        let page = run(CollectionParams {
            page: Some(1),
            size: Some(3),
            ..Default::default()
        });
        assert_eq!(names(&page), vec!["Zeus Carver"]);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn page_without_size_is_unbounded() {
        let params = CollectionParams {
            page: Some(3),
            ..Default::default()
        };
        assert_eq!(params.pagination(), None);
        assert_eq!(run(params).items.len(), 4);
    }

    proptest! {
        #[test]
        fn total_ignores_pagination(page in 0u64..6, size in 0u64..6) {
            let unpaged = run(CollectionParams::default());
            let paged = run(CollectionParams { page: Some(page), size: Some(size), ..Default::default() });

            prop_assert_eq!(paged.total, unpaged.total);
            prop_assert!(paged.items.len() as u64 <= size);

            let start = (page * size).min(unpaged.total) as usize;
            let end = (page * size + size).min(unpaged.total) as usize;
            prop_assert_eq!(&paged.items[..], &unpaged.items[start..end]);
        }
    }
}
