//! Maintenance commands for the destination sheet.

use std::env;
use std::process::exit;

use chrono::Utc;
use reaction_module::config::{log_filter_from_env, SheetAccess};
use reaction_module::maintenance::{append_test_row, format_headers, last_row};
use reaction_module::sheet_store::GoogleSheetStore;

fn print_usage() {
    eprintln!(
        r##"Usage: reaction-sheet <command>

Commands:
  last-row          Print the data row the next reaction would be written to
  append-test       Append a dated test row through the normal write path
  format-headers    Bold the header row on a grey background

Environment Variables:
  GOOGLE_SPREADSHEET_ID        - Destination spreadsheet
  GOOGLE_SERVICE_ACCOUNT_KEY   - Service account key JSON
  GOOGLE_ACCESS_TOKEN          - Pre-generated access token
  GOOGLE_CLIENT_ID             - Google OAuth client ID
  GOOGLE_CLIENT_SECRET         - Google OAuth client secret
  GOOGLE_REFRESH_TOKEN         - Google OAuth refresh token
  RECORDER_CONFIG_PATH         - (optional) TOML file with a [sheet] table
"##
    );
}

fn store() -> Result<(SheetAccess, GoogleSheetStore), String> {
    let access = SheetAccess::from_env().map_err(|e| e.to_string())?;
    let store = GoogleSheetStore::from_config(&access)
        .map_err(|e| format!("Failed to initialize Google auth: {}", e))?;
    Ok((access, store))
}

fn cmd_last_row() -> Result<String, String> {
    let (_, store) = store()?;
    let row = last_row(&store).map_err(|e| format!("Failed to read sheet: {}", e))?;
    Ok(format!(
        "Next reaction goes to data row {} (sheet row {})",
        row,
        row.sheet_row()
    ))
}

fn cmd_append_test() -> Result<String, String> {
    let (access, store) = store()?;
    let defaults = access
        .settings
        .record_defaults()
        .map_err(|e| e.to_string())?;
    let row = append_test_row(&store, &defaults, Utc::now())
        .map_err(|e| format!("Failed to append test row: {}", e))?;
    let next = last_row(&store).map_err(|e| format!("Failed to read sheet: {}", e))?;
    Ok(format!(
        "Appended test row at data row {}; next insertion row is {}",
        row, next
    ))
}

fn cmd_format_headers() -> Result<String, String> {
    let (_, store) = store()?;
    let sheet = format_headers(&store).map_err(|e| format!("Failed to format headers: {}", e))?;
    Ok(format!("Formatted header row of '{}'", sheet.title))
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(log_filter_from_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        exit(1);
    }

    let result = match args[1].as_str() {
        "last-row" => cmd_last_row(),
        "append-test" => cmd_append_test(),
        "format-headers" => cmd_format_headers(),
        "help" | "--help" | "-h" => {
            print_usage();
            exit(0);
        }
        other => {
            eprintln!("Error: unknown command '{}'", other);
            print_usage();
            exit(1);
        }
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            exit(1);
        }
    }
}
