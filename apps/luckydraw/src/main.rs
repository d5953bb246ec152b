use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use draw_core::{
    save_requirements, ConfirmRequest, CsvImporter, DrawSession, DrawStore, ImportOutcome,
    MemoryStore, OperatorPrompt, PrepareOutcome, PrizeLogStore, RequirementsStore, RevealStep,
    SessionState, StorageWorker,
};
use rand::{rngs::StdRng, SeedableRng};
use shared::{
    domain::{Requirements, UserId},
    error::{DrawError, ErrorCode},
    protocol::{CommitOutcome, ReportFilter, UserSummary},
};
use storage::Storage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use config::{load_settings, normalize_database_url, Settings};
use console::{format_record, format_slot, StdinPrompt};

const COMMIT_RETRIES: u32 = 3;

#[derive(Parser, Debug)]
#[command(name = "luckydraw", about = "Lucky draw operator console")]
struct Cli {
    #[arg(long, default_value = "luckydraw.toml")]
    config: PathBuf,
    #[arg(long)]
    database_url: Option<String>,
    /// Registered operator id, e.g. IIPL-0001.
    #[arg(long)]
    operator: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    RegisterUser {
        name: String,
    },
    /// List registered operators.
    Users,
    Configure {
        #[arg(long)]
        event: String,
        #[arg(long)]
        main: u32,
        #[arg(long)]
        consolation: u32,
        #[arg(long)]
        digits: u32,
        #[arg(long)]
        from: i64,
        #[arg(long)]
        to: i64,
    },
    ShowConfig,
    /// Replace the coupon inventory with the first column of a CSV sheet.
    Import {
        path: PathBuf,
        #[arg(long)]
        yes: bool,
    },
    /// Delete every coupon, stamped or not. The prize log is kept.
    ClearCoupons {
        #[arg(long)]
        yes: bool,
    },
    Draw {
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        yes: bool,
        /// Draw against an in-memory copy and write nothing back.
        #[arg(long)]
        rehearse: bool,
    },
    Report {
        #[arg(long)]
        event: Option<String>,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    Events,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(database_url) = &cli.database_url {
        settings.database_url = database_url.clone();
    }
    if let Some(operator) = &cli.operator {
        settings.operator_id = Some(operator.clone());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(%database_url, "failed to open database: {error:#}");
        error
    })?;
    storage.health_check().await?;
    let storage = Arc::new(storage);
    let handle = Arc::new(StorageWorker::spawn(
        storage.clone(),
        settings.worker_options(),
    ));

    match cli.command {
        Command::RegisterUser { name } => {
            let user_id = storage.register_user(&name).await?;
            info!(%user_id, "registered operator");
            println!("registered {name} as {user_id}");
        }
        Command::Users => {
            let users = storage.list_users().await?;
            if users.is_empty() {
                println!("no operators registered yet");
            }
            for user in &users {
                println!("{:<10} {}", user.user_id, user.user_name);
            }
        }
        Command::Configure {
            event,
            main,
            consolation,
            digits,
            from,
            to,
        } => {
            let requirements = Requirements {
                event_name: event.trim().to_string(),
                main_prize_count: main,
                consolation_prize_count: consolation,
                total_digits: digits,
                min_range: from,
                max_range: to,
            };
            save_requirements(handle.as_ref(), &requirements)
                .await
                .map_err(explain)?;
            println!("saved settings for {}", requirements.event_name);
        }
        Command::ShowConfig => match handle.get_requirements().await? {
            Some(requirements) => print_requirements(&requirements),
            None => println!("no draw settings saved yet"),
        },
        Command::Import { path, yes } => {
            let operator = resolve_operator(&storage, &settings).await?;
            let prompt = StdinPrompt::new(yes);
            let mut session = DrawSession::new(handle.clone(), operator);
            let importer = CsvImporter::new(path);
            match session
                .import_inventory(&importer, &prompt)
                .await
                .map_err(explain)?
            {
                ImportOutcome::Imported { count } => {
                    println!("imported {count} coupons from {}", importer.path().display())
                }
                ImportOutcome::Declined => println!("import cancelled; existing coupons kept"),
            }
        }
        Command::ClearCoupons { yes } => {
            if StdinPrompt::new(yes).confirm(ConfirmRequest::ClearInventory) {
                let removed = storage.clear_coupons().await?;
                info!(removed, "cleared coupon inventory");
                println!("removed {removed} coupons");
            } else {
                println!("clear cancelled; coupons kept");
            }
        }
        Command::Draw {
            seed,
            yes,
            rehearse,
        } => {
            let operator = resolve_operator(&storage, &settings).await?;
            let prompt = StdinPrompt::new(yes);
            let seed = seed.or(settings.draw_seed).unwrap_or_else(rand::random);
            if rehearse {
                let snapshot = MemoryStore::snapshot_of(handle.as_ref())
                    .await
                    .context("failed to copy stored draw data for rehearsal")?;
                info!(seed, "rehearsing draw against an in-memory copy");
                run_draw(Arc::new(snapshot), operator, &prompt, seed).await?;
                println!("rehearsal only; nothing was written");
            } else {
                run_draw(handle.clone(), operator, &prompt, seed).await?;
            }
        }
        Command::Report {
            event,
            from,
            to,
            json,
        } => {
            let filter = ReportFilter {
                event_name: event,
                from,
                to,
            };
            let records = handle.list_prize_records(&filter).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("no prize records match");
            } else {
                for record in &records {
                    println!("{}", format_record(record));
                }
            }
        }
        Command::Events => {
            for name in handle.list_event_names().await? {
                println!("{name}");
            }
        }
    }

    Ok(())
}

async fn resolve_operator(storage: &Storage, settings: &Settings) -> anyhow::Result<UserSummary> {
    let operator_id = settings.operator_id.as_deref().ok_or_else(|| {
        anyhow!("no operator set; pass --operator or LUCKYDRAW__OPERATOR_ID (see register-user)")
    })?;
    storage
        .find_user(&UserId(operator_id.to_string()))
        .await?
        .ok_or_else(|| anyhow!("operator {operator_id} is not registered"))
}

async fn run_draw<S>(
    store: Arc<S>,
    operator: UserSummary,
    prompt: &StdinPrompt,
    seed: u64,
) -> anyhow::Result<()>
where
    S: DrawStore + ?Sized,
{
    let mut session = DrawSession::new(store, operator);
    let report = session.load_inventory().await.map_err(explain)?;
    println!(
        "loaded {} coupons ({} distinct) for {} prizes",
        report.entries, report.distinct, report.required
    );

    match session.prepare(prompt).await.map_err(explain)? {
        PrepareOutcome::Declined => {
            println!("draw cancelled; previous results kept");
            return Ok(());
        }
        PrepareOutcome::Ready { cleared_stamps } if cleared_stamps > 0 => {
            println!("cleared {cleared_stamps} prize stamps from the previous draw");
        }
        PrepareOutcome::Ready { .. } => {}
    }

    info!(seed, operator = %session.operator(), "starting draw");
    let slots = session
        .start_draw(&mut StdRng::seed_from_u64(seed))
        .await
        .map_err(explain)?;
    println!("{slots} prizes to reveal (seed {seed})");

    while session.remaining_slots() > 0 {
        prompt.wait_for_enter("press Enter to reveal the next prize");
        match session.reveal_next().await {
            Ok(RevealStep::Slot(slot)) => println!("{}", format_slot(&slot)),
            Ok(RevealStep::Completed { slot, outcome }) => {
                println!("{}", format_slot(&slot));
                print_outcome(&outcome);
            }
            Err(err)
                if session.remaining_slots() == 0 && session.state() == SessionState::Drawing =>
            {
                if let Some(slot) = session.revealed().last() {
                    println!("{}", format_slot(slot));
                }
                let outcome = retry_commit(&mut session, err).await?;
                print_outcome(&outcome);
            }
            Err(err) => return Err(explain(err)),
        }
    }
    Ok(())
}

/// Every slot is revealed but the commit failed; the session still holds the draw.
/// Only plain storage failures are retried. A diverged commit waits for the operator.
async fn retry_commit<S>(
    session: &mut DrawSession<S>,
    mut last_error: DrawError,
) -> anyhow::Result<CommitOutcome>
where
    S: DrawStore + ?Sized,
{
    for attempt in 1..=COMMIT_RETRIES {
        if !should_retry_commit(&last_error) {
            break;
        }
        warn!(attempt, "commit failed, retrying: {last_error}");
        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
        match session.commit().await {
            Ok(outcome) => return Ok(outcome),
            Err(err) => last_error = err,
        }
    }
    error!("draw could not be committed: {last_error}");
    let event_name = session
        .requirements()
        .map(|requirements| requirements.event_name.as_str())
        .unwrap_or_default();
    if let Some(guidance) = reconciliation_guidance(&last_error, event_name) {
        eprintln!("{guidance}");
    }
    Err(explain(last_error))
}

fn should_retry_commit(err: &DrawError) -> bool {
    err.code() == ErrorCode::Storage
}

fn reconciliation_guidance(err: &DrawError, event_name: &str) -> Option<String> {
    let DrawError::CommitDiverged { logged, stamped, .. } = err else {
        return None;
    };
    Some(format!(
        "the commit stopped after writing {logged} prize records and {stamped} coupon stamps.\n\
         compare `luckydraw report --event {event_name}` with the coupon table, \
         then run `luckydraw draw` again to replace the partial results"
    ))
}

fn explain(err: DrawError) -> anyhow::Error {
    if let DrawError::InvalidRequirements(violations) = &err {
        for violation in violations {
            eprintln!("  - {violation}");
        }
    }
    if let DrawError::InventoryInvalid { values } = &err {
        for value in values {
            eprintln!("  - {value:?}");
        }
    }
    if err.is_recoverable() {
        eprintln!("fix the settings or the coupon sheet and run the command again");
    }
    anyhow::Error::new(err)
}

fn print_requirements(requirements: &Requirements) {
    println!("event:              {}", requirements.event_name);
    println!("main prizes:        {}", requirements.main_prize_count);
    println!("consolation prizes: {}", requirements.consolation_prize_count);
    println!("total digits:       {}", requirements.total_digits);
    println!(
        "number range:       {}..={}",
        requirements.min_range, requirements.max_range
    );
}

fn print_outcome(outcome: &CommitOutcome) {
    println!(
        "recorded {} prizes for {}{}",
        outcome.prize_records,
        outcome.event_name,
        if outcome.superseded_previous {
            " (replaced the earlier results for this event)"
        } else {
            ""
        }
    );
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
