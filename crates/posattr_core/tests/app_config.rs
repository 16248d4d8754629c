use posattr_core::db::open_db_in_memory;
use posattr_core::repo::config_repo::DATE_FORMAT_KEY;
use posattr_core::{ConfigRepository, SqliteConfigRepository};

#[test]
fn date_format_defaults_to_month_day_year() {
    let conn = open_db_in_memory().unwrap();
    let config = SqliteConfigRepository::new(&conn);

    assert_eq!(config.get(DATE_FORMAT_KEY).unwrap().as_deref(), Some("m/d/Y"));
    let format = config.date_format().unwrap();
    assert_eq!(format.source(), "m/d/Y");
    assert_eq!(format.chrono_format(), "%m/%d/%Y");
}

#[test]
fn set_overwrites_and_delete_falls_back_to_default() {
    let conn = open_db_in_memory().unwrap();
    let config = SqliteConfigRepository::new(&conn);

    config.set(DATE_FORMAT_KEY, "Y-m-d").unwrap();
    assert_eq!(config.date_format().unwrap().chrono_format(), "%Y-%m-%d");

    assert!(config.delete(DATE_FORMAT_KEY).unwrap());
    assert!(!config.delete(DATE_FORMAT_KEY).unwrap());
    assert_eq!(config.get(DATE_FORMAT_KEY).unwrap(), None);
    assert_eq!(config.date_format().unwrap().source(), "m/d/Y");

    config.set(DATE_FORMAT_KEY, "  ").unwrap();
    assert_eq!(config.date_format().unwrap().source(), "m/d/Y");
}

#[test]
fn batch_save_writes_every_setting() {
    let conn = open_db_in_memory().unwrap();
    let config = SqliteConfigRepository::new(&conn);

    config
        .batch_save(&[("company", "Corner Shop"), ("dateformat", "d/m/Y")])
        .unwrap();

    let all = config.get_all().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("company").map(String::as_str), Some("Corner Shop"));
    assert_eq!(all.get("dateformat").map(String::as_str), Some("d/m/Y"));
    assert_eq!(config.get_or("currency", "USD").unwrap(), "USD");
    assert_eq!(config.get_or("company", "none").unwrap(), "Corner Shop");
}
