use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use once_cell::sync::Lazy;
use pillbox_core::*;
use rand::Rng;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pillbox")]
#[command(about = "Medication schedule and adherence tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show today's doses and your pet's mood (default)
    Today,

    /// List every medicine and its schedule
    List,

    /// Add a medicine
    Add {
        /// Medicine name
        name: String,

        /// Scheduled time, 24h HH:MM
        #[arg(long)]
        time: String,

        /// Days: "daily", "weekdays", "weekends", or a list like mon,wed,fri
        #[arg(long, default_value = "daily")]
        days: String,

        /// Why you take it (shown in lists)
        #[arg(long)]
        reason: Option<String>,
    },

    /// Change a medicine's schedule
    Edit {
        /// Medicine name or id prefix
        medicine: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New time, 24h HH:MM
        #[arg(long)]
        time: Option<String>,

        /// New day set (same formats as add)
        #[arg(long)]
        days: Option<String>,

        /// New reason; pass an empty string to clear it
        #[arg(long)]
        reason: Option<String>,
    },

    /// Remove a medicine and its dose history
    Remove {
        /// Medicine name or id prefix
        medicine: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Record a dose
    Take {
        /// Medicine name or id prefix
        medicine: String,

        /// Record as late even inside the grace window
        #[arg(long)]
        late: bool,

        /// Log for a past day (YYYY-MM-DD) instead of now
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show this week's adherence, Monday through Sunday
    Week,

    /// Mark every unlogged dose on a missed day as taken late
    Catchup {
        /// The missed day (YYYY-MM-DD)
        date: NaiveDate,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Export the dose history as CSV
    Export {
        /// Output path (default: history.csv in the data directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    pillbox_core::logging::init();

    let cli = Cli::parse();

    // Determine data directory
    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Today) | None => cmd_today(&data_dir, &config),
        Some(Commands::List) => cmd_list(&data_dir),
        Some(Commands::Add {
            name,
            time,
            days,
            reason,
        }) => cmd_add(&data_dir, name, time, &days, reason),
        Some(Commands::Edit {
            medicine,
            name,
            time,
            days,
            reason,
        }) => cmd_edit(&data_dir, &medicine, name, time, days, reason),
        Some(Commands::Remove { medicine, yes }) => cmd_remove(&data_dir, &medicine, yes),
        Some(Commands::Take {
            medicine,
            late,
            date,
        }) => cmd_take(&data_dir, &config, &medicine, late, date),
        Some(Commands::Week) => cmd_week(&data_dir),
        Some(Commands::Catchup { date, yes }) => cmd_catchup(&data_dir, date, yes),
        Some(Commands::Export { out }) => cmd_export(&data_dir, out),
    }
}

/// Standard file layout under the data directory.
fn data_paths(data_dir: &Path) -> (PathBuf, PathBuf) {
    (data_dir.join("medicines.json"), data_dir.join("doses.jsonl"))
}

fn cmd_today(data_dir: &Path, config: &Config) -> Result<()> {
    let (book_path, journal_path) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;
    let logs = journal::read_logs(&journal_path)?;
    let now = Local::now();
    let today = now.date_naive();

    if let Some(skew) = detect_clock_skew(&logs, &now) {
        tracing::warn!(
            "Newest dose ({}) postdates the system clock; adherence may look wrong",
            skew.latest_taken_at
        );
    }

    println!("╭─────────────────────────────────────────╮");
    println!("│  TODAY  {}", now.format("%a %Y-%m-%d"));
    println!("╰─────────────────────────────────────────╯");
    println!();

    if book.medicines.is_empty() {
        println!("  No medicines yet. Add one with: pillbox add NAME --time HH:MM");
        println!();
    }

    let mut required = schedule::required_on(&book.medicines, today);
    required.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.name.cmp(&b.name)));

    if required.is_empty() && !book.medicines.is_empty() {
        println!("  Nothing scheduled today.");
        println!();
    }

    let mut all_taken = !required.is_empty();
    for medicine in &required {
        let today_log = logs
            .iter()
            .find(|l| l.medicine_id == medicine.id && l.local_day(&Local) == today);

        let state = match today_log {
            Some(log) => {
                let at = log.taken_at.with_timezone(&Local).format("%H:%M");
                match log.status {
                    LogStatus::Taken => format!("✓ taken {}", at),
                    LogStatus::Late => format!("⏰ taken late {}", at),
                }
            }
            None => {
                all_taken = false;
                if schedule::is_overdue(medicine, &now, config.schedule.late_after_minutes) {
                    "⏰ overdue".to_string()
                } else {
                    "• due".to_string()
                }
            }
        };
        println!("  {}  {:<20} {}", medicine.time, medicine.name, state);
    }
    if !required.is_empty() {
        println!();
    }

    let adherence = compute_adherence(&book.medicines, &logs, &now, &config.mascot);
    println!(
        "  {} {} (streak: {})",
        mascot_emoji(adherence.status),
        adherence.status,
        adherence.streak
    );
    let message = if all_taken {
        ALL_TAKEN_MESSAGE
    } else {
        pick_message(adherence.status)
    };
    println!("  {}", message);

    Ok(())
}

fn cmd_list(data_dir: &Path) -> Result<()> {
    let (book_path, _) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;

    if book.medicines.is_empty() {
        println!("No medicines yet. Add one with: pillbox add NAME --time HH:MM");
        return Ok(());
    }

    for medicine in book.list() {
        let id = medicine.id.to_string();
        println!(
            "  {}  {:<20} {:<18} {:<24} [{}]",
            medicine.time,
            medicine.name,
            format_days(&medicine.days_of_week),
            medicine.reason.as_deref().unwrap_or(""),
            &id[..8]
        );
    }

    Ok(())
}

fn cmd_add(
    data_dir: &Path,
    name: String,
    time: String,
    days: &str,
    reason: Option<String>,
) -> Result<()> {
    let (book_path, _) = data_paths(data_dir);

    let medicine = Medicine {
        id: Uuid::new_v4(),
        name,
        reason: reason.filter(|r| !r.trim().is_empty()),
        time,
        days_of_week: parse_days(days)?,
        created_at: Utc::now(),
    };
    validate_medicine(&medicine)?;

    let summary = format!(
        "{} at {} ({})",
        medicine.name,
        medicine.time,
        format_days(&medicine.days_of_week)
    );
    MedicineBook::update(&book_path, |book| {
        book.upsert(medicine);
        Ok(())
    })?;

    println!("✓ Added {}", summary);
    Ok(())
}

fn cmd_edit(
    data_dir: &Path,
    query: &str,
    name: Option<String>,
    time: Option<String>,
    days: Option<String>,
    reason: Option<String>,
) -> Result<()> {
    let (book_path, _) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;
    let mut medicine = book.resolve(query)?.clone();

    if let Some(name) = name {
        medicine.name = name;
    }
    if let Some(time) = time {
        medicine.time = time;
    }
    if let Some(days) = days {
        medicine.days_of_week = parse_days(&days)?;
    }
    if let Some(reason) = reason {
        medicine.reason = if reason.trim().is_empty() {
            None
        } else {
            Some(reason)
        };
    }
    validate_medicine(&medicine)?;

    let summary = format!(
        "{} at {} ({})",
        medicine.name,
        medicine.time,
        format_days(&medicine.days_of_week)
    );
    MedicineBook::update(&book_path, |book| {
        book.upsert(medicine);
        Ok(())
    })?;

    println!("✓ Updated {}", summary);
    Ok(())
}

fn cmd_remove(data_dir: &Path, query: &str, yes: bool) -> Result<()> {
    let (book_path, journal_path) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;
    let medicine = book.resolve(query)?.clone();

    if !yes
        && !prompt_confirm(&format!(
            "Remove {} and all of its dose history?",
            medicine.name
        ))?
    {
        println!("Cancelled.");
        return Ok(());
    }

    let purged = store::delete_medicine(&book_path, &journal_path, medicine.id)?;
    println!("✓ Removed {} ({} dose entries)", medicine.name, purged);
    Ok(())
}

fn cmd_take(
    data_dir: &Path,
    config: &Config,
    query: &str,
    late: bool,
    date: Option<NaiveDate>,
) -> Result<()> {
    let (book_path, journal_path) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;
    let medicine = book.resolve(query)?.clone();

    let mut logs = journal::read_logs(&journal_path)?;
    let now = Local::now();
    let today = now.date_naive();
    let day = date.unwrap_or(today);

    if day > today {
        return Err(Error::Other(format!("{} is in the future", day)));
    }

    // One dose per medicine per day; repeat takes are a no-op
    if let Some(existing) = logs
        .iter()
        .find(|l| l.medicine_id == medicine.id && l.local_day(&Local) == day)
    {
        println!(
            "{} was already logged for {} at {}.",
            medicine.name,
            day,
            existing.taken_at.with_timezone(&Local).format("%H:%M")
        );
        return Ok(());
    }

    let (taken_at, status) = if day == today {
        let is_late =
            late || schedule::is_overdue(&medicine, &now, config.schedule.late_after_minutes);
        let status = if is_late {
            LogStatus::Late
        } else {
            LogStatus::Taken
        };
        (now.with_timezone(&Utc), status)
    } else {
        // Backdated doses anchor to the start of that day and always count as late
        let anchor = schedule::day_start(day, &Local)
            .ok_or_else(|| Error::Other(format!("no valid local time on {}", day)))?;
        (anchor.with_timezone(&Utc), LogStatus::Late)
    };

    let log = DoseLog {
        id: Uuid::new_v4(),
        medicine_id: medicine.id,
        taken_at,
        status,
    };

    let mut journal = JsonlJournal::new(&journal_path);
    journal.append(&log)?;
    logs.push(log);

    match (status, day == today) {
        (LogStatus::Taken, _) => println!("✓ {} taken at {}", medicine.name, now.format("%H:%M")),
        (LogStatus::Late, true) => {
            println!("⏰ {} taken late at {}", medicine.name, now.format("%H:%M"))
        }
        (LogStatus::Late, false) => println!("⏰ {} logged late for {}", medicine.name, day),
    }

    let adherence = compute_adherence(&book.medicines, &logs, &now, &config.mascot);
    println!(
        "  {} {} (streak: {})",
        mascot_emoji(adherence.status),
        adherence.status,
        adherence.streak
    );

    Ok(())
}

fn cmd_week(data_dir: &Path) -> Result<()> {
    let (book_path, journal_path) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;
    let logs = journal::read_logs(&journal_path)?;
    let now = Local::now();
    let today = now.date_naive();

    let days = week_days(today);
    println!("Week of {}", days[0]);
    println!("─────────────────────────────────────────");

    for day in days {
        let status = classify_day(day, &book.medicines, &logs, &now);
        let marker = if day == today { "▸" } else { " " };
        print!(
            "{} {}  {}  {}",
            marker,
            day.format("%a %d"),
            day_symbol(status),
            status
        );
        if status == DayStatus::Missed {
            print!("   (pillbox catchup {})", day);
        }
        println!();
    }

    Ok(())
}

fn cmd_catchup(data_dir: &Path, date: NaiveDate, yes: bool) -> Result<()> {
    let (book_path, journal_path) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;
    let logs = journal::read_logs(&journal_path)?;
    let now = Local::now();

    let status = classify_day(date, &book.medicines, &logs, &now);
    if status != DayStatus::Missed {
        return Err(Error::Other(format!(
            "{} is {}; only missed days can be caught up",
            date, status
        )));
    }

    let entries = bulk_mark_late(date, &book.medicines, &logs, &Local);

    println!("Catching up {}:", date);
    for entry in &entries {
        let name = book
            .get(entry.medicine_id)
            .map(|m| m.name.as_str())
            .unwrap_or("(unknown)");
        println!("  ⏰ {}", name);
    }

    if !yes && !prompt_confirm(&format!("Mark {} doses as taken late?", entries.len()))? {
        println!("Cancelled.");
        return Ok(());
    }

    let mut journal = JsonlJournal::new(&journal_path);
    for entry in &entries {
        journal.append(entry)?;
    }

    println!("✓ Caught up {} doses for {}", entries.len(), date);
    Ok(())
}

fn cmd_export(data_dir: &Path, out: Option<PathBuf>) -> Result<()> {
    let (book_path, journal_path) = data_paths(data_dir);
    let book = MedicineBook::load(&book_path)?;
    let logs = journal::read_logs(&journal_path)?;

    let out_path = out.unwrap_or_else(|| data_dir.join("history.csv"));
    let count = export::write_history_csv(&out_path, &book, &logs, &Local)?;

    if count == 0 {
        println!("No dose history yet - nothing to export.");
    } else {
        println!("✓ Exported {} doses to {}", count, out_path.display());
    }

    Ok(())
}

fn mascot_emoji(status: MascotStatus) -> &'static str {
    match status {
        MascotStatus::Thriving => "🌱",
        MascotStatus::Healthy => "🙂",
        MascotStatus::Worried => "😟",
        MascotStatus::Dead => "💀",
    }
}

const ALL_TAKEN_MESSAGE: &str = "Everything taken today. Your buddy is beaming!";

static MASCOT_MESSAGES: Lazy<HashMap<MascotStatus, Vec<&'static str>>> = Lazy::new(|| {
    let mut map = HashMap::new();
    map.insert(
        MascotStatus::Thriving,
        vec![
            "Your buddy is thriving. Keep the streak alive!",
            "Full bloom! Every dose on schedule lately.",
            "Peak health. Your buddy couldn't be happier.",
        ],
    );
    map.insert(
        MascotStatus::Healthy,
        vec![
            "Your buddy is doing fine. Next dose when it's due.",
            "Steady as ever. A few more good days to full bloom.",
            "All good here. Keep it up!",
        ],
    );
    map.insert(
        MascotStatus::Worried,
        vec![
            "Your buddy looks worried. A dose was missed recently.",
            "A wobble in the schedule. Today's doses will cheer it up.",
            "Not feeling great. Take today's doses to recover.",
        ],
    );
    map.insert(
        MascotStatus::Dead,
        vec![
            "Oh no, your buddy didn't make it. Take any dose to revive it!",
            "It's gone quiet in the pillbox. One dose brings your buddy back.",
        ],
    );
    map
});

fn pick_message(status: MascotStatus) -> &'static str {
    let pool = &MASCOT_MESSAGES[&status];
    let mut rng = rand::rng();
    pool[rng.random_range(0..pool.len())]
}

fn day_symbol(status: DayStatus) -> &'static str {
    match status {
        DayStatus::Taken => "✓",
        DayStatus::Late => "⏰",
        DayStatus::Missed => "✗",
        DayStatus::Pending => "•",
        DayStatus::NoDoseRequired => "·",
    }
}

/// Parse a day-of-week spec: a preset word or a comma list of
/// names/numbers (0 = Sunday).
fn parse_days(spec: &str) -> Result<Vec<u8>> {
    let normalized = spec.trim().to_lowercase();
    let mut days: Vec<u8> = match normalized.as_str() {
        "daily" | "everyday" => (0..=6).collect(),
        "weekdays" => vec![1, 2, 3, 4, 5],
        "weekends" => vec![0, 6],
        _ => {
            let mut days = Vec::new();
            for token in normalized.split(',') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                days.push(parse_day_token(token)?);
            }
            days
        }
    };

    days.sort_unstable();
    days.dedup();
    if days.is_empty() {
        return Err(Error::InvalidSchedule(format!("'{}' names no days", spec)));
    }
    Ok(days)
}

fn parse_day_token(token: &str) -> Result<u8> {
    match token {
        "sun" | "sunday" => Ok(0),
        "mon" | "monday" => Ok(1),
        "tue" | "tuesday" => Ok(2),
        "wed" | "wednesday" => Ok(3),
        "thu" | "thursday" => Ok(4),
        "fri" | "friday" => Ok(5),
        "sat" | "saturday" => Ok(6),
        _ => token
            .parse::<u8>()
            .ok()
            .filter(|d| *d <= 6)
            .ok_or_else(|| {
                Error::InvalidSchedule(format!("unknown day '{}' (use mon..sun or 0-6)", token))
            }),
    }
}

fn format_days(days: &[u8]) -> String {
    const NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

    let mut sorted: Vec<u8> = days.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    if sorted.len() == 7 {
        return "daily".into();
    }
    if sorted == [1, 2, 3, 4, 5] {
        return "weekdays".into();
    }
    if sorted == [0, 6] {
        return "weekends".into();
    }

    // Monday-first, to line up with the week view
    sorted.sort_by_key(|d| (d + 6) % 7);
    sorted
        .iter()
        .map(|d| NAMES[*d as usize])
        .collect::<Vec<_>>()
        .join(",")
}

fn prompt_confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(matches!(
        input.trim().to_lowercase().as_str(),
        "y" | "yes"
    ))
}
