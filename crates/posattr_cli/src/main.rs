//! Maintenance entry point for a posattr database.
//!
//! # Responsibility
//! - Print the core health-check line when run without arguments.
//! - Open (and migrate) a database and run one maintenance command on it.
//!
//! Usage: `posattr_cli [<db-path> [definitions|sweep|info <id>|dateformat [<format>]]]`
//!
//! `POSATTR_LOG_DIR` (absolute path) enables file logging.

use log::info;
use posattr_core::db::open_db;
use posattr_core::{
    AttributeService, ConfigRepository, DefinitionRepository, SqliteAttributeRepository,
    SqliteConfigRepository,
};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        println!("posattr_core ping={}", posattr_core::ping());
        println!("posattr_core version={}", posattr_core::core_version());
        return ExitCode::SUCCESS;
    }

    if let Ok(log_dir) = std::env::var("POSATTR_LOG_DIR") {
        if let Err(err) = posattr_core::init_logging(posattr_core::default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {
    let db_path = &args[0];
    let command = args.get(1).map(String::as_str).unwrap_or("definitions");
    let mut conn = open_db(db_path)?;
    info!("event=cli_command module=cli status=start command={command}");

    match command {
        "definitions" => {
            let repo = SqliteAttributeRepository::try_new(&mut conn)?;
            for definition in repo.get_definition_names(true)? {
                println!("{}\t{}", definition.definition_id, definition.definition_name);
            }
        }
        "info" => {
            let id = args
                .get(2)
                .ok_or("info requires a definition id")?
                .parse::<i64>()?;
            let service = AttributeService::new(SqliteAttributeRepository::try_new(&mut conn)?);
            let detail = service.definition_info(id)?;
            if detail.is_placeholder() {
                println!("definition {id} not found");
            } else {
                println!(
                    "{}\t{}\t{}\tflags={}\tgroup={}",
                    id,
                    detail.definition_name,
                    detail.definition_type,
                    detail.definition_flags.names().join("|"),
                    detail.definition_group.as_deref().unwrap_or("-")
                );
            }
        }
        "sweep" => {
            let service = AttributeService::new(SqliteAttributeRepository::try_new(&mut conn)?);
            let response = service.purge_orphaned_values();
            println!("{}", response.message);
            if !response.success {
                return Err(response.message.into());
            }
        }
        "dateformat" => {
            let config = SqliteConfigRepository::new(&conn);
            if let Some(format) = args.get(2) {
                config.set(posattr_core::repo::config_repo::DATE_FORMAT_KEY, format)?;
            }
            println!("{}", config.date_format()?.source());
        }
        other => return Err(format!("unknown command `{other}`").into()),
    }

    info!("event=cli_command module=cli status=ok command={command}");
    Ok(())
}
