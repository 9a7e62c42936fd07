//! ride-tracker: SeniorGo ride lifecycle client.
//!
//! Single-binary Tokio application that:
//! 1. Loads the actor's rides from the SeniorGo backend
//! 2. Refreshes every ride's status concurrently
//! 3. Prints the progress and next action for each ride
//! 4. Advances, cancels or accepts rides on request

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{error, info, warn};

use common::{ActorRole, Error, Ride, RideScope, Session};
use lifecycle::{ActionOutcome, Notice, NoticeKind, RideProjector, Stage};
use seniorgo_client::RideRestClient;

/// SeniorGo ride lifecycle tracker
#[derive(Parser)]
#[command(name = "ride-tracker", about = "SeniorGo ride lifecycle tracker")]
struct Cli {
    /// Path to the optional TOML config file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load rides and print their progress.
    Rides {
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
        /// Print one JSON object per ride.
        #[arg(long)]
        json: bool,
    },
    /// Perform the action currently offered for a ride.
    Advance {
        ride_id: String,
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
    },
    /// Cancel a ride.
    Cancel { ride_id: String },
    /// List open ride requests.
    Requests,
    /// Accept an open ride request.
    Accept { ride_id: String },
    /// Reload rides on an interval until interrupted.
    Watch {
        #[arg(long, value_enum)]
        scope: Option<ScopeArg>,
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Requester,
    Volunteer,
}

impl From<ScopeArg> for RideScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Requester => RideScope::Requester,
            ScopeArg::Volunteer => RideScope::Volunteer,
        }
    }
}

fn default_scope(session: &Session) -> RideScope {
    match session.role {
        ActorRole::Volunteer => RideScope::Volunteer,
        ActorRole::Senior | ActorRole::Admin => RideScope::Requester,
    }
}

fn resolve_scope(arg: Option<ScopeArg>, session: &Session) -> RideScope {
    arg.map(RideScope::from)
        .unwrap_or_else(|| default_scope(session))
}

fn show_notice(notice: &Notice) {
    match notice.kind {
        NoticeKind::Success => println!("{}: {}", notice.title, notice.message),
        NoticeKind::Error => eprintln!("{}: {}", notice.title, notice.message),
    }
}

fn progress_bar(current: Stage) -> String {
    Stage::ALL
        .iter()
        .map(|stage| {
            if *stage == current {
                format!("[{}]", stage.progress_label())
            } else {
                format!(" {} ", stage.progress_label())
            }
        })
        .collect::<Vec<_>>()
        .join("─")
}

fn format_pickup(ride: &Ride) -> String {
    match ride.pickup_at() {
        Some(at) => at
            .with_timezone(&Local)
            .format("%m/%d/%Y %-I:%M %p")
            .to_string(),
        None => ride.pickup_date_time.clone().unwrap_or_default(),
    }
}

fn print_rides(projector: &RideProjector, rides: &[Ride], scope: RideScope, as_json: bool) {
    let visible = projector.visible_rides(rides, scope);
    if visible.is_empty() && !as_json {
        println!("No current rides found.");
        return;
    }

    for ride in visible {
        let state = projector.display_state(ride, scope);
        if as_json {
            let line = json!({
                "id": ride.id,
                "requesterContact": ride.requester_contact,
                "pickupLocation": ride.pickup_location,
                "dropoffLocation": ride.dropoff_location,
                "pickupDateTime": ride.pickup_date_time,
                "acceptedBy": ride.accepted_by,
                "status": state.status.as_str(),
                "stageIndex": state.stage_index,
                "action": state.label,
                "enabled": state.enabled,
                "recognized": state.recognized,
            });
            println!("{line}");
            continue;
        }

        println!("Ride {}", ride.id);
        println!("  Requester: {}", ride.requester_contact);
        println!("  Pickup:    {} at {}", ride.pickup_location, format_pickup(ride));
        println!("  Dropoff:   {}", ride.dropoff_location);
        println!(
            "  Driver:    {}",
            ride.accepted_by.as_deref().unwrap_or("Not Assigned")
        );
        println!("  {}", progress_bar(state.stage));
        println!(
            "  Next:      {}{}",
            state.label,
            if state.enabled { "" } else { " (disabled)" }
        );
    }
}

/// Print an outcome; returns false when the action did not take effect.
fn report_outcome(outcome: &ActionOutcome) -> bool {
    match outcome {
        ActionOutcome::Advanced { notice, .. }
        | ActionOutcome::Cancelled { notice }
        | ActionOutcome::Accepted { notice } => {
            show_notice(notice);
            true
        }
        ActionOutcome::Removed => {
            println!("Ride removed from the list.");
            true
        }
        ActionOutcome::Unavailable => {
            eprintln!("No action is available for this ride.");
            false
        }
        ActionOutcome::Failed { notice } => {
            if let Some(notice) = notice {
                show_notice(notice);
            }
            false
        }
    }
}

fn find_ride<'a>(rides: &'a [Ride], ride_id: &str) -> Option<&'a Ride> {
    rides.iter().find(|r| r.id == ride_id)
}

async fn run(
    command: Command,
    projector: &RideProjector,
    session: &Session,
    poll: Duration,
) -> bool {
    match command {
        Command::Rides { scope, json } => {
            let scope = resolve_scope(scope, session);
            let listing = projector.load(session, scope).await;
            if let Some(notice) = &listing.notice {
                show_notice(notice);
            }
            print_rides(projector, &listing.rides, scope, json);
            listing.notice.is_none()
        }
        Command::Advance { ride_id, scope } => {
            let scope = resolve_scope(scope, session);
            let listing = projector.load(session, scope).await;
            if let Some(notice) = &listing.notice {
                show_notice(notice);
                return false;
            }
            let Some(ride) = find_ride(&listing.rides, &ride_id) else {
                warn!("Not in the {} list: {}", scope.label(), Error::RideNotFound(ride_id));
                return false;
            };
            report_outcome(&projector.perform_action(ride, scope).await)
        }
        Command::Cancel { ride_id } => {
            let listing = projector.load(session, RideScope::Requester).await;
            if let Some(notice) = &listing.notice {
                show_notice(notice);
                return false;
            }
            let Some(ride) = find_ride(&listing.rides, &ride_id) else {
                warn!("Not in the requester list: {}", Error::RideNotFound(ride_id));
                return false;
            };
            report_outcome(&projector.cancel_ride(session, ride).await)
        }
        Command::Requests => {
            let listing = projector.open_requests(session).await;
            if let Some(notice) = &listing.notice {
                show_notice(notice);
                return false;
            }
            if listing.rides.is_empty() {
                println!("No open ride requests.");
            }
            for ride in &listing.rides {
                println!(
                    "{}  {} → {}  {}  ({})",
                    ride.id,
                    ride.pickup_location,
                    ride.dropoff_location,
                    format_pickup(ride),
                    ride.requester_contact
                );
            }
            true
        }
        Command::Accept { ride_id } => {
            report_outcome(&projector.accept_request(session, &ride_id).await)
        }
        Command::Watch {
            scope,
            interval_secs,
        } => {
            let scope = resolve_scope(scope, session);
            let interval = interval_secs.map(Duration::from_secs).unwrap_or(poll);
            info!("Watching {} rides every {}s", scope.label(), interval.as_secs());

            loop {
                let listing = projector.load(session, scope).await;
                println!("── {} ──", Local::now().format("%H:%M:%S"));
                if let Some(notice) = &listing.notice {
                    show_notice(notice);
                }
                print_rides(projector, &listing.rides, scope, false);

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted; stopping watch");
                        break;
                    }
                }
            }
            true
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ride_tracker=info,seniorgo_client=info,lifecycle=info".into()
            }),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let session = Session::new(cfg.actor_email.clone(), cfg.actor_role);
    if session.contact().is_none() {
        warn!("SENIORGO_ACTOR_EMAIL is not set; ride lists will be empty");
    }

    let client = match RideRestClient::new(&cfg) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create SeniorGo client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let projector =
        RideProjector::with_concurrency(Arc::new(client), cfg.limits.refresh_concurrency);
    let poll = Duration::from_secs(cfg.timing.poll_interval_secs);

    if run(cli.command, &projector, &session, poll).await {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
