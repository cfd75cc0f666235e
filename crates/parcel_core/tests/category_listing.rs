use parcel_core::db::open_db_in_memory;
use parcel_core::storage::StorageResult;
use parcel_core::{
    CategoryFilter, FileStore, ImagePayload, ListingConfig, NewCategory, PageRequest, Parcel,
    ParcelCategory, ParcelCategoryRepository, ParcelRepository, Payer,
    SqliteParcelCategoryRepository, SqliteParcelRepository, StatusValue, TrashRepository,
};
use rusqlite::{params, Connection};
use std::cell::Cell;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Default)]
struct CountingFileStore {
    stored: Cell<usize>,
}

impl FileStore for CountingFileStore {
    fn store(
        &self,
        folder: &str,
        extension: &str,
        _payload: &[u8],
        _previous: Option<&str>,
    ) -> StorageResult<String> {
        let n = self.stored.get() + 1;
        self.stored.set(n);
        Ok(format!("{folder}{n}.{extension}"))
    }

    fn remove(&self, _path: &str) -> StorageResult<()> {
        Ok(())
    }
}

type Repo<'a> = SqliteParcelCategoryRepository<'a, &'a CountingFileStore>;

fn repo<'a>(conn: &'a Connection, files: &'a CountingFileStore) -> Repo<'a> {
    SqliteParcelCategoryRepository::try_new(conn, files)
        .unwrap()
        .with_listing_config(ListingConfig {
            default_page_size: 10,
            max_page_size: 100,
        })
}

fn seed(repo: &Repo<'_>, conn: &Connection, name: &str, created_at: i64) -> ParcelCategory {
    let created = repo
        .create(&NewCategory::new(
            name,
            format!("{name} parcels"),
            ImagePayload::new(vec![1, 2, 3]),
        ))
        .unwrap();
    conn.execute(
        "UPDATE parcel_categories SET created_at = ?1 WHERE id = ?2;",
        params![created_at, created.id.to_string()],
    )
    .unwrap();
    repo.get(created.id).unwrap()
}

fn names(items: &[parcel_core::CategoryListItem]) -> Vec<&str> {
    items.iter().map(|item| item.category.name.as_str()).collect()
}

fn first_page() -> PageRequest {
    PageRequest::page(1, 10)
}

#[test]
fn unfiltered_list_excludes_trashed_and_orders_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 3_000);
    let trashed = seed(&repo, &conn, "Furniture", 4_000);
    seed(&repo, &conn, "Clothing", 2_000);
    repo.delete(trashed.id).unwrap();

    let page = repo.list(&CategoryFilter::default(), first_page()).unwrap();
    assert_eq!(names(&page.items), vec!["Electronics", "Clothing", "Documents"]);
    assert_eq!(page.total, 3);
}

#[test]
fn equal_creation_times_are_ordered_by_id_descending() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    let a = seed(&repo, &conn, "A", 5_000);
    let b = seed(&repo, &conn, "B", 5_000);
    let c = seed(&repo, &conn, "C", 5_000);

    let page = repo.list(&CategoryFilter::default(), first_page()).unwrap();
    let mut expected = vec![a.id, b.id, c.id];
    expected.sort_by(|left, right| right.to_string().cmp(&left.to_string()));
    let actual: Vec<Uuid> = page.items.iter().map(|item| item.category.id).collect();
    assert_eq!(actual, expected);
}

#[test]
fn search_requires_every_token_in_name() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    seed(&repo, &conn, "Red car parts", 1_000);
    seed(&repo, &conn, "Red bicycle", 2_000);
    seed(&repo, &conn, "Blue car", 3_000);
    seed(&repo, &conn, "Scarred Carpets", 4_000);

    let filter = CategoryFilter::new().with_search("red car");
    let page = repo.list(&filter, first_page()).unwrap();

    assert_eq!(names(&page.items), vec!["Scarred Carpets", "Red car parts"]);
    assert_eq!(page.total, 2);
}

#[test]
fn search_tokens_match_wildcard_characters_literally() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    seed(&repo, &conn, "Discount 50% boxes", 1_000);
    seed(&repo, &conn, "Discount 500 boxes", 2_000);
    seed(&repo, &conn, "snake_case labels", 3_000);
    seed(&repo, &conn, "snakeXcase labels", 4_000);

    let percent = repo
        .list(&CategoryFilter::new().with_search("50%"), first_page())
        .unwrap();
    assert_eq!(names(&percent.items), vec!["Discount 50% boxes"]);

    let underscore = repo
        .list(&CategoryFilter::new().with_search("snake_case"), first_page())
        .unwrap();
    assert_eq!(names(&underscore.items), vec!["snake_case labels"]);
}

#[test]
fn blank_search_is_not_applied() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 2_000);

    let page = repo
        .list(&CategoryFilter::new().with_search("   "), first_page())
        .unwrap();
    assert_eq!(page.total, 2);
}

#[test]
fn status_all_matches_unfiltered_listing() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    let inactive = seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 2_000);
    repo.update(&parcel_core::CategoryUpdate::Status(false), inactive.id)
        .unwrap();

    let unfiltered = repo.list(&CategoryFilter::default(), first_page()).unwrap();
    let all = repo
        .list(
            &CategoryFilter::new().with_status("is_active", StatusValue::All),
            first_page(),
        )
        .unwrap();

    assert_eq!(unfiltered.items, all.items);
    assert_eq!(unfiltered.total, 2);
}

#[test]
fn status_active_and_inactive_map_to_flag() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    let inactive = seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 2_000);
    repo.update(&parcel_core::CategoryUpdate::Status(false), inactive.id)
        .unwrap();

    let active = repo
        .list(
            &CategoryFilter::new().with_status_value(StatusValue::Active),
            first_page(),
        )
        .unwrap();
    assert_eq!(names(&active.items), vec!["Electronics"]);

    let inactive_page = repo
        .list(
            &CategoryFilter::new().with_status("is_active", StatusValue::Inactive),
            first_page(),
        )
        .unwrap();
    assert_eq!(names(&inactive_page.items), vec!["Documents"]);

    let unknown_value = repo
        .list(
            &CategoryFilter::new().with_status_value(StatusValue::parse("paused")),
            first_page(),
        )
        .unwrap();
    assert_eq!(names(&unknown_value.items), vec!["Documents"]);
}

#[test]
fn empty_status_value_lists_only_inactive() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    let inactive = seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 2_000);
    repo.update(&parcel_core::CategoryUpdate::Status(false), inactive.id)
        .unwrap();

    let filter: CategoryFilter =
        serde_json::from_value(serde_json::json!({ "search": "", "value": "" })).unwrap();
    let page = repo.list(&filter, first_page()).unwrap();

    assert_eq!(names(&page.items), vec!["Documents"]);
    assert_eq!(page.query.get("value").map(String::as_str), Some(""));
}

#[test]
fn unknown_status_column_is_ignored() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 2_000);

    for column in ["status", "is_active OR 1=1"] {
        let filter = CategoryFilter::new().with_status(column, StatusValue::Inactive);
        let page = repo.list(&filter, first_page()).unwrap();
        assert_eq!(page.total, 2, "column `{column}` should be skipped");
    }
}

#[test]
fn excluded_ids_never_appear() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    let documents = seed(&repo, &conn, "Documents", 1_000);
    let electronics = seed(&repo, &conn, "Electronics", 2_000);
    seed(&repo, &conn, "Clothing", 3_000);

    let filter = CategoryFilter::new()
        .with_search("o")
        .excluding([documents.id, electronics.id]);
    let page = repo.list(&filter, first_page()).unwrap();

    assert_eq!(names(&page.items), vec!["Clothing"]);
    assert_eq!(page.total, 1);
}

#[test]
fn related_filter_requires_matching_parcel() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);
    let parcels = SqliteParcelRepository::try_new(&conn).unwrap();

    let documents = seed(&repo, &conn, "Documents", 1_000);
    let electronics = seed(&repo, &conn, "Electronics", 2_000);
    seed(&repo, &conn, "Clothing", 3_000);
    parcels
        .create_parcel(&Parcel::new(documents.id, "TRK-1", Payer::Sender))
        .unwrap();
    parcels
        .create_parcel(&Parcel::new(electronics.id, "TRK-2", Payer::Receiver))
        .unwrap();

    let filter = CategoryFilter::new().with_related("parcels", "payer", "sender");
    let page = repo.list(&filter, first_page()).unwrap();
    assert_eq!(names(&page.items), vec!["Documents"]);
    assert_eq!(page.total, 1);
}

#[test]
fn incomplete_or_unknown_related_filter_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 2_000);

    let missing_relation = CategoryFilter {
        related_column: Some("payer".to_string()),
        related_value: Some("sender".to_string()),
        ..CategoryFilter::default()
    };
    let unknown_relation = CategoryFilter::new().with_related("vehicles", "payer", "sender");
    let unknown_column = CategoryFilter::new().with_related("parcels", "weight", "10");

    for filter in [missing_relation, unknown_relation, unknown_column] {
        let page = repo.list(&filter, first_page()).unwrap();
        assert_eq!(page.total, 2);
    }
}

#[test]
fn page_number_pagination_splits_filtered_set() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    for i in 0..25 {
        seed(&repo, &conn, &format!("Box {i:02}"), 1_000 + i);
    }
    seed(&repo, &conn, "Envelope", 5_000);

    let filter = CategoryFilter::new().with_search("box");
    let sizes: Vec<usize> = (1..=3)
        .map(|page| {
            repo.list(&filter, PageRequest::page(page, 10))
                .unwrap()
                .len()
        })
        .collect();
    assert_eq!(sizes, vec![10, 10, 5]);

    let third = repo.list(&filter, PageRequest::page(3, 10)).unwrap();
    assert_eq!(third.total, 25);
    assert_eq!(third.last_page, 3);
    assert_eq!(third.current_page, 3);
    assert!(!third.has_more_pages());
    assert_eq!(third.items[4].category.name, "Box 00");

    let beyond = repo.list(&filter, PageRequest::page(4, 10)).unwrap();
    assert!(beyond.is_empty());
    assert_eq!(beyond.total, 25);
}

#[test]
fn stateful_pages_echo_filters_into_links() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    for i in 0..12 {
        seed(&repo, &conn, &format!("Red car {i}"), 1_000 + i);
    }

    let filter = CategoryFilter::new().with_search("red car");
    let page = repo.list(&filter, PageRequest::page(1, 10)).unwrap();

    let expected = BTreeMap::from([
        ("query".to_string(), "is_active".to_string()),
        ("search".to_string(), "red car".to_string()),
        ("value".to_string(), "all".to_string()),
    ]);
    assert_eq!(page.query, expected);
    assert_eq!(
        page.next_page_query().as_deref(),
        Some("page=2&query=is_active&search=red%20car&value=all")
    );
}

#[test]
fn direct_offset_mode_reads_from_raw_offset() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);

    for i in 0..7 {
        seed(&repo, &conn, &format!("Category {i}"), 1_000 + i);
    }

    let page = repo
        .list(&CategoryFilter::default(), PageRequest::new(3, 5, true))
        .unwrap();

    assert_eq!(names(&page.items), vec!["Category 1", "Category 0"]);
    assert_eq!(page.offset, 5);
    assert_eq!(page.total, 7);
    assert!(page.query.is_empty());
}

#[test]
fn zero_page_size_config_falls_back_to_single_row_pages() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = SqliteParcelCategoryRepository::try_new(&conn, &files)
        .unwrap()
        .with_listing_config(ListingConfig {
            default_page_size: 0,
            max_page_size: 5,
        });

    for i in 0..4 {
        seed(&repo, &conn, &format!("Category {i}"), 1_000 + i);
    }

    let by_offset = repo
        .list(&CategoryFilter::default(), PageRequest::new(0, 3, true))
        .unwrap();
    assert_eq!(names(&by_offset.items), vec!["Category 0"]);
    assert_eq!(by_offset.per_page, 1);
    assert_eq!(by_offset.current_page, 4);
    assert_eq!(by_offset.total, 4);

    let by_number = repo
        .list(&CategoryFilter::default(), PageRequest::page(1, 0))
        .unwrap();
    assert_eq!(names(&by_number.items), vec!["Category 3"]);
    assert_eq!(by_number.last_page, 4);
}

#[test]
fn eager_parcels_are_loaded_only_when_requested() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);
    let parcels = SqliteParcelRepository::try_new(&conn).unwrap();

    let documents = seed(&repo, &conn, "Documents", 1_000);
    seed(&repo, &conn, "Electronics", 2_000);
    parcels
        .create_parcel(&Parcel::new(documents.id, "TRK-1", Payer::Sender))
        .unwrap();
    parcels
        .create_parcel(&Parcel::new(documents.id, "TRK-2", Payer::Receiver))
        .unwrap();

    let plain = repo.list(&CategoryFilter::default(), first_page()).unwrap();
    assert!(plain.items.iter().all(|item| item.parcels.is_none()));

    let eager = repo
        .list(
            &CategoryFilter::new().with_relations(["parcels", "unknown"]),
            first_page(),
        )
        .unwrap();
    let loaded: Vec<usize> = eager
        .items
        .iter()
        .map(|item| item.parcels.as_ref().map_or(0, Vec::len))
        .collect();
    assert_eq!(names(&eager.items), vec!["Electronics", "Documents"]);
    assert_eq!(loaded, vec![0, 2]);
    assert!(eager.items.iter().all(|item| item.parcels.is_some()));
}

#[test]
fn trashed_list_only_returns_trashed_records_at_default_page_size() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = SqliteParcelCategoryRepository::try_new(&conn, &files)
        .unwrap()
        .with_listing_config(ListingConfig {
            default_page_size: 2,
            max_page_size: 100,
        });

    for (i, name) in ["Red box", "Red bag", "Blue box", "Red crate"].iter().enumerate() {
        let category = seed(&repo, &conn, name, 1_000 + i as i64);
        repo.delete(category.id).unwrap();
    }
    seed(&repo, &conn, "Red visible", 9_000);

    let first = repo.trashed_list(&CategoryFilter::default(), 1).unwrap();
    assert_eq!(first.total, 4);
    assert_eq!(first.per_page, 2);
    assert_eq!(first.len(), 2);
    assert!(first.items.iter().all(|item| item.category.lifecycle.is_trashed()));

    let red = repo
        .trashed_list(&CategoryFilter::new().with_search("red"), 1)
        .unwrap();
    assert_eq!(red.total, 3);
    assert_eq!(names(&red.items), vec!["Red crate", "Red bag"]);
    assert_eq!(
        red.query,
        BTreeMap::from([("search".to_string(), "red".to_string())])
    );
}

#[test]
fn combined_filters_intersect() {
    let conn = open_db_in_memory().unwrap();
    let files = CountingFileStore::default();
    let repo = repo(&conn, &files);
    let parcels = SqliteParcelRepository::try_new(&conn).unwrap();

    let red_box = seed(&repo, &conn, "Red box", 1_000);
    let red_bag = seed(&repo, &conn, "Red bag", 2_000);
    let red_crate = seed(&repo, &conn, "Red crate", 3_000);
    seed(&repo, &conn, "Blue box", 4_000);
    for category in [&red_box, &red_bag, &red_crate] {
        parcels
            .create_parcel(&Parcel::new(category.id, "TRK", Payer::Sender))
            .unwrap();
    }
    repo.update(&parcel_core::CategoryUpdate::Status(false), red_bag.id)
        .unwrap();

    let filter = CategoryFilter::new()
        .with_search("red")
        .with_status_value(StatusValue::Active)
        .with_related("parcels", "payer", "sender")
        .excluding([red_crate.id]);
    let page = repo.list(&filter, first_page()).unwrap();

    assert_eq!(names(&page.items), vec!["Red box"]);
    assert_eq!(page.total, 1);
}
