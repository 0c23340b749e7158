//! Applies the embedded SQL migrations to `DATABASE_URL`.
//!
//!   cargo run -p huddle-api --bin huddle-migrate
//!   cargo run -p huddle-api --bin huddle-migrate -- --revert

use std::path::Path;
use std::process::ExitCode;

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

fn main() -> ExitCode {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    let Some(database_url) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) else {
        eprintln!("DATABASE_URL is required");
        return ExitCode::FAILURE;
    };
    let revert = std::env::args().any(|arg| arg == "--revert");

    let mut conn = match PgConnection::establish(&database_url) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("failed to connect to database: {e}");
            return ExitCode::FAILURE;
        }
    };

    if revert {
        return match conn.revert_last_migration(MIGRATIONS) {
            Ok(version) => {
                println!("Reverted: {version}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("failed to revert migration: {e}");
                ExitCode::FAILURE
            }
        };
    }

    match conn.run_pending_migrations(MIGRATIONS) {
        Ok(applied) if applied.is_empty() => println!("No pending migrations."),
        Ok(applied) => {
            for version in &applied {
                println!("  Applied: {version}");
            }
            println!("{} migration(s) applied.", applied.len());
        }
        Err(e) => {
            eprintln!("failed to run migrations: {e}");
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
