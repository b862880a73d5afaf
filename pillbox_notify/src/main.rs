use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::Parser;
use pillbox_core::*;
use rand::Rng;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pillbox-notify")]
#[command(about = "Send dose reminders through OneSignal", long_about = None)]
struct Cli {
    /// Override data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print the reminders instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Check against this instant (RFC 3339) instead of the wall clock
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

/// OneSignal credentials come from the environment, never from the
/// config file.
struct Credentials {
    app_id: String,
    rest_api_key: String,
}

fn load_credentials() -> Result<Credentials> {
    let app_id = std::env::var("ONESIGNAL_APP_ID")
        .map_err(|_| Error::Notify("ONESIGNAL_APP_ID is not set".into()))?;
    let rest_api_key = std::env::var("ONESIGNAL_REST_API_KEY")
        .map_err(|_| Error::Notify("ONESIGNAL_REST_API_KEY is not set".into()))?;
    Ok(Credentials {
        app_id,
        rest_api_key,
    })
}

fn main() -> Result<()> {
    pillbox_core::logging::init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    let tz: Tz = config
        .notify
        .timezone
        .parse()
        .map_err(|_| Error::Config(format!("unknown timezone '{}'", config.notify.timezone)))?;

    let now = cli.now.unwrap_or_else(Utc::now).with_timezone(&tz);
    let today = now.date_naive();
    let minute = now.format("%H:%M").to_string();

    let book = MedicineBook::load(&data_dir.join("medicines.json"))?;
    let due = due_medicines(&book.medicines, today, &minute);

    tracing::info!("Checking doses for {} {} ({})", today, minute, tz);

    if due.is_empty() {
        tracing::info!("Nothing due this minute");
        return Ok(());
    }

    if cli.dry_run {
        let app_id = std::env::var("ONESIGNAL_APP_ID").unwrap_or_else(|_| "app-id".into());
        for medicine in due {
            let payload = build_payload(&app_id, medicine, config.notify.site_url.as_deref());
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        return Ok(());
    }

    let credentials = load_credentials()?;
    let client = reqwest::blocking::Client::new();

    // One reminder per medicine; a failed send never blocks the rest
    let mut failed = 0usize;
    let total = due.len();
    for medicine in due {
        let payload = build_payload(
            &credentials.app_id,
            medicine,
            config.notify.site_url.as_deref(),
        );
        match send_notification(
            &client,
            &config.notify.api_url,
            &credentials.rest_api_key,
            &payload,
        ) {
            Ok(()) => tracing::info!("Reminder sent for {}", medicine.name),
            Err(e) => {
                failed += 1;
                tracing::warn!("Reminder for {} failed: {}", medicine.name, e);
            }
        }
    }

    if failed > 0 {
        tracing::warn!("{} of {} reminders failed", failed, total);
    }

    Ok(())
}

/// Medicines scheduled for exactly this day and minute.
fn due_medicines<'a>(medicines: &'a [Medicine], day: NaiveDate, minute: &str) -> Vec<&'a Medicine> {
    schedule::required_on(medicines, day)
        .into_iter()
        .filter(|m| m.time == minute)
        .collect()
}

const REMINDER_LINES: [&str; 6] = [
    "Your buddy is waiting. Time for your dose!",
    "A quick dose keeps your buddy smiling.",
    "Don't make your buddy beg. Water and pill, go!",
    "Health check! This reminder is free, the habit is priceless.",
    "You promised you'd take care of yourself, remember?",
    "Don't make me notify you again...",
];

fn build_payload(
    app_id: &str,
    medicine: &Medicine,
    site_url: Option<&str>,
) -> serde_json::Value {
    let mut rng = rand::rng();
    let line = REMINDER_LINES[rng.random_range(0..REMINDER_LINES.len())];

    let mut payload = serde_json::json!({
        "app_id": app_id,
        "included_segments": ["All"],
        "headings": { "en": format!("Time for {} 💊", medicine.name) },
        "contents": { "en": line },
    });
    if let Some(url) = site_url {
        payload["url"] = serde_json::Value::String(url.to_string());
    }
    payload
}

fn send_notification(
    client: &reqwest::blocking::Client,
    api_url: &str,
    rest_api_key: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let response = client
        .post(api_url)
        .header("Authorization", format!("Bearer {}", rest_api_key))
        .json(payload)
        .send()
        .map_err(|e| Error::Notify(format!("request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(Error::Notify(format!(
            "OneSignal returned {}: {}",
            status, body
        )));
    }

    Ok(())
}
