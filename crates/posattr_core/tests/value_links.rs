use chrono::NaiveDate;
use posattr_core::db::open_db_in_memory;
use posattr_core::{
    DefinitionDraft, DefinitionFlags, DefinitionRepository, DefinitionType, LinkScope, RepoError,
    SnapshotTarget, SqliteAttributeRepository, ValueRepository,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

fn define(
    repo: &mut SqliteAttributeRepository<'_>,
    name: &str,
    definition_type: DefinitionType,
) -> i64 {
    repo.save_definition(
        &DefinitionDraft::new(name, definition_type).with_flags(
            DefinitionFlags::SHOW_IN_ITEMS
                | DefinitionFlags::SHOW_IN_SALES
                | DefinitionFlags::SHOW_IN_RECEIVINGS,
        ),
        None,
    )
    .unwrap()
    .definition_id
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

#[test]
fn save_value_is_idempotent_for_item_and_definition() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Text);

    let first = repo
        .save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();
    let second = repo
        .save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();
    assert_eq!(first, second);

    let conn = repo.connection();
    assert_eq!(count(conn, "SELECT COUNT(*) FROM attribute_values;"), 1);
    assert_eq!(count(conn, "SELECT COUNT(*) FROM attribute_links;"), 1);
}

#[test]
fn save_link_upserts_single_item_link() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let size = define(&mut repo, "size", DefinitionType::Dropdown);
    let small = repo
        .save_value("S", size, None, None, DefinitionType::Dropdown)
        .unwrap();
    let large = repo
        .save_value("L", size, None, None, DefinitionType::Dropdown)
        .unwrap();

    repo.save_link(3, size, small).unwrap();
    repo.save_link(3, size, small).unwrap();
    repo.save_link(3, size, large).unwrap();

    let link = repo.get_link_value(3, size).unwrap().unwrap();
    assert_eq!(link.attribute_id, Some(large));
    assert_eq!(
        count(
            repo.connection(),
            "SELECT COUNT(*) FROM attribute_links WHERE item_id = 3;"
        ),
        1
    );
    assert!(repo.link_exists(3, Some(size)).unwrap());
    assert!(repo.link_exists(3, None).unwrap());
    assert!(!repo.link_exists(4, None).unwrap());
}

#[test]
fn replacing_shared_value_does_not_touch_other_items() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Text);
    let red = repo
        .save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("red", color, Some(2), None, DefinitionType::Text)
        .unwrap();

    let blue = repo
        .save_value("blue", color, Some(1), Some(red), DefinitionType::Text)
        .unwrap();
    assert_ne!(blue, red);
    let item_two = repo.get_attribute_value(2, color).unwrap().unwrap();
    assert_eq!(item_two.attribute_value.as_deref(), Some("red"));

    // Item 1 is the only holder of "blue", so the row is edited in place.
    let green = repo
        .save_value("green", color, Some(1), Some(blue), DefinitionType::Text)
        .unwrap();
    assert_eq!(green, blue);
    let item_one = repo.get_attribute_value(1, color).unwrap().unwrap();
    assert_eq!(item_one.attribute_value.as_deref(), Some("green"));
    assert_eq!(
        count(repo.connection(), "SELECT COUNT(*) FROM attribute_values;"),
        2
    );
}

#[test]
fn typed_values_use_their_own_columns() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let expiry = define(&mut repo, "expiry", DefinitionType::Date);
    let weight = define(&mut repo, "weight", DefinitionType::Decimal);

    repo.save_value("03/15/2024", expiry, Some(9), None, DefinitionType::Date)
        .unwrap();
    repo.save_value("2.50", weight, Some(9), None, DefinitionType::Decimal)
        .unwrap();

    let date_value = repo.get_attribute_value(9, expiry).unwrap().unwrap();
    assert_eq!(date_value.attribute_value, None);
    assert_eq!(
        date_value.attribute_date,
        NaiveDate::from_ymd_opt(2024, 3, 15)
    );
    let decimal_value = repo.get_attribute_value(9, weight).unwrap().unwrap();
    assert_eq!(decimal_value.attribute_decimal, Decimal::from_str("2.5").ok());

    assert_eq!(
        repo.value_exists("03/15/2024", DefinitionType::Date).unwrap(),
        Some(date_value.attribute_id)
    );
    assert_eq!(
        repo.value_exists("2.5", DefinitionType::Decimal).unwrap(),
        Some(decimal_value.attribute_id)
    );
    assert_eq!(repo.value_exists("03/16/2024", DefinitionType::Date).unwrap(), None);

    assert!(matches!(
        repo.save_value("soon", expiry, Some(9), None, DefinitionType::Date),
        Err(RepoError::InvalidValue { .. })
    ));
    assert!(matches!(
        repo.value_exists("2,5", DefinitionType::Decimal),
        Err(RepoError::InvalidValue { .. })
    ));

    let values = repo.get_attribute_values(9).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].definition_id, expiry);
}

#[test]
fn save_value_requires_active_definition() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Text);
    repo.delete_definition(color).unwrap();

    assert!(matches!(
        repo.save_value("red", color, Some(1), None, DefinitionType::Text),
        Err(RepoError::DefinitionNotFound(id)) if id == color
    ));
    assert!(matches!(
        repo.save_link(1, color, 1),
        Err(RepoError::DefinitionNotFound(_))
    ));
}

#[test]
fn group_definitions_reject_values_and_links() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let group = define(&mut repo, "physical", DefinitionType::Group);
    let color = define(&mut repo, "color", DefinitionType::Text);
    let red = repo
        .save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();

    assert!(matches!(
        repo.save_value("x", group, Some(1), None, DefinitionType::Group),
        Err(RepoError::GroupDefinition(id)) if id == group
    ));
    assert!(matches!(
        repo.save_value("x", group, None, None, DefinitionType::Text),
        Err(RepoError::GroupDefinition(_))
    ));
    assert!(matches!(
        repo.save_link(2, group, red),
        Err(RepoError::GroupDefinition(_))
    ));
    assert_eq!(
        count(
            repo.connection(),
            &format!("SELECT COUNT(*) FROM attribute_links WHERE definition_id = {group};")
        ),
        0
    );
}

#[test]
fn snapshots_skip_deleted_definitions() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Text);
    let size = define(&mut repo, "size", DefinitionType::Text);
    repo.save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("XL", size, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.delete_definition(color).unwrap();

    assert_eq!(
        repo.copy_attribute_links(1, SnapshotTarget::Sale(9))
            .unwrap(),
        1
    );
    assert_eq!(
        repo.copy_attribute_links(1, SnapshotTarget::Receiving(4))
            .unwrap(),
        1
    );
    assert_eq!(
        count(
            repo.connection(),
            &format!(
                "SELECT COUNT(*) FROM attribute_links
                 WHERE definition_id = {color}
                   AND (sale_id IS NOT NULL OR receiving_id IS NOT NULL);"
            )
        ),
        0
    );
    assert_eq!(
        count(
            repo.connection(),
            &format!("SELECT COUNT(*) FROM attribute_links WHERE sale_id = 9 AND definition_id = {size};")
        ),
        1
    );
}

#[test]
fn delete_link_removes_only_item_scope() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Text);
    let size = define(&mut repo, "size", DefinitionType::Text);
    repo.save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("XL", size, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.copy_attribute_links(1, SnapshotTarget::Sale(100))
        .unwrap();

    assert_eq!(repo.delete_link(1, Some(color)).unwrap(), 1);
    assert!(!repo.link_exists(1, Some(color)).unwrap());
    assert!(repo.link_exists(1, Some(size)).unwrap());

    assert_eq!(repo.delete_link(1, None).unwrap(), 1);
    assert!(!repo.link_exists(1, None).unwrap());
    assert_eq!(
        count(
            repo.connection(),
            "SELECT COUNT(*) FROM attribute_links WHERE sale_id = 100;"
        ),
        2
    );
}

#[test]
fn delete_value_removes_links_and_unreferenced_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Dropdown);
    let shade = define(&mut repo, "shade", DefinitionType::Text);
    let red = repo
        .save_value("red", color, None, None, DefinitionType::Dropdown)
        .unwrap();
    repo.save_link(1, color, red).unwrap();
    repo.save_link(2, color, red).unwrap();
    repo.save_value("red", shade, Some(1), None, DefinitionType::Text)
        .unwrap();

    assert_eq!(repo.delete_value("red", color).unwrap(), 3);
    assert!(repo.get_link_value(1, color).unwrap().is_none());
    // Still referenced by the other definition.
    assert_eq!(
        repo.get_attribute_value(1, shade)
            .unwrap()
            .unwrap()
            .attribute_id,
        red
    );

    assert_eq!(repo.delete_value("red", shade).unwrap(), 1);
    assert_eq!(
        count(repo.connection(), "SELECT COUNT(*) FROM attribute_values;"),
        0
    );
    assert_eq!(repo.delete_value("red", shade).unwrap(), 0);
}

#[test]
fn snapshots_keep_values_after_item_changes() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Text);
    let expiry = define(&mut repo, "expiry", DefinitionType::Date);
    let red = repo
        .save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("01/31/2025", expiry, Some(1), None, DefinitionType::Date)
        .unwrap();

    assert_eq!(
        repo.copy_attribute_links(1, SnapshotTarget::Sale(10))
            .unwrap(),
        2
    );
    assert_eq!(
        repo.copy_attribute_links(1, SnapshotTarget::Receiving(20))
            .unwrap(),
        2
    );

    repo.save_value("blue", color, Some(1), Some(red), DefinitionType::Text)
        .unwrap();

    let sale = repo
        .get_link_values(1, LinkScope::Sale(10), DefinitionFlags::SHOW_IN_SALES)
        .unwrap();
    assert_eq!(sale.attribute_values.as_deref(), Some("red"));
    assert_eq!(sale.attribute_dtvalues.as_deref(), Some("01/31/2025"));

    let receiving = repo
        .get_link_values(
            1,
            LinkScope::Receiving(20),
            DefinitionFlags::SHOW_IN_RECEIVINGS,
        )
        .unwrap();
    assert_eq!(receiving.attribute_values.as_deref(), Some("red"));

    let live = repo
        .get_link_values(1, LinkScope::Item, DefinitionFlags::SHOW_IN_ITEMS)
        .unwrap();
    assert_eq!(live.attribute_values.as_deref(), Some("blue"));

    let hidden = repo
        .get_link_values(1, LinkScope::Item, DefinitionFlags::NONE)
        .unwrap();
    assert_eq!(hidden.attribute_values, None);
    assert_eq!(hidden.attribute_dtvalues, None);
}

#[test]
fn get_link_values_renders_dates_with_configured_format() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute(
        "UPDATE app_config SET value = 'd.m.Y' WHERE key = 'dateformat';",
        [],
    )
    .unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let expiry = define(&mut repo, "expiry", DefinitionType::Date);
    let made = define(&mut repo, "made", DefinitionType::Date);

    repo.save_value("31.01.2025", expiry, Some(4), None, DefinitionType::Date)
        .unwrap();
    repo.save_value("02.03.2020", made, Some(4), None, DefinitionType::Date)
        .unwrap();

    let summary = repo
        .get_link_values(4, LinkScope::Item, DefinitionFlags::SHOW_IN_ITEMS)
        .unwrap();
    assert_eq!(summary.attribute_values, None);
    assert_eq!(
        summary.attribute_dtvalues.as_deref(),
        Some("31.01.2025, 02.03.2020")
    );
}

#[test]
fn suggestions_match_substrings_of_one_definition() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let brand = define(&mut repo, "brand", DefinitionType::Text);
    let model = define(&mut repo, "model", DefinitionType::Text);
    repo.save_value("Acme", brand, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("Acme", brand, Some(2), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("Macmillan", brand, Some(3), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("Zenith", brand, Some(4), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("Acme 2000", model, Some(1), None, DefinitionType::Text)
        .unwrap();

    let labels: Vec<String> = repo
        .get_suggestions(brand, "acm")
        .unwrap()
        .into_iter()
        .map(|suggestion| suggestion.label)
        .collect();
    assert_eq!(labels, vec!["Acme".to_string(), "Macmillan".to_string()]);
    assert!(repo.get_suggestions(brand, "%").unwrap().is_empty());
}

#[test]
fn get_attributes_by_definition_lists_every_scope() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let color = define(&mut repo, "color", DefinitionType::Text);
    repo.save_value("red", color, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("blue", color, Some(2), None, DefinitionType::Text)
        .unwrap();
    repo.copy_attribute_links(2, SnapshotTarget::Sale(5))
        .unwrap();

    let linked = repo.get_attributes_by_definition(color).unwrap();
    assert_eq!(linked.len(), 3);
    assert!(linked
        .iter()
        .all(|value| value.definition_id == color && value.item_id.is_some()));
}

#[test]
fn orphan_sweeps_never_remove_referenced_rows() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteAttributeRepository::try_new(&mut conn).unwrap();
    let notes = define(&mut repo, "notes", DefinitionType::Text);
    let color = define(&mut repo, "color", DefinitionType::Dropdown);
    repo.save_value("kept", notes, Some(1), None, DefinitionType::Text)
        .unwrap();
    repo.save_value("stray", notes, None, None, DefinitionType::Text)
        .unwrap();
    repo.save_value("green", color, None, None, DefinitionType::Dropdown)
        .unwrap();
    repo.connection()
        .execute(
            "INSERT INTO attribute_values (attribute_value) VALUES ('loose'), ('lost');",
            [],
        )
        .unwrap();

    assert_eq!(repo.delete_orphaned_values().unwrap(), 2);
    // DROPDOWN anchors are the option list.
    assert_eq!(repo.delete_orphaned_links(color).unwrap(), 0);
    assert_eq!(repo.delete_orphaned_links(notes).unwrap(), 1);
    assert_eq!(repo.delete_orphaned_values().unwrap(), 1);
    assert_eq!(repo.delete_orphaned_values().unwrap(), 0);

    let remaining: Vec<String> = {
        let mut stmt = repo
            .connection()
            .prepare("SELECT attribute_value FROM attribute_values ORDER BY attribute_value;")
            .unwrap();
        let values: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        values
    };
    assert_eq!(remaining, vec!["green".to_string(), "kept".to_string()]);
    assert!(matches!(
        repo.delete_orphaned_links(999),
        Err(RepoError::DefinitionNotFound(999))
    ));
}
