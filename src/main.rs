use anyhow::Context;
use bookingnotify::firestore::parse_change_event;
use bookingnotify::messaging::{DryRunGateway, FcmClient};
use bookingnotify::set_up_logger;
use clap::{Arg, ArgAction, Command};
use log::debug;

#[derive(Debug)]
struct Args {
    verbose: bool,
    event_path: String,
    dry_run: bool,
}

fn parse_args() -> Args {
    let matches = Command::new("bookingnotify")
        .version("0.1")
        .author("Jacob Luszcz")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Verbose mode. Outputs DEBUG and higher log messages."),
        )
        .arg(
            Arg::new("event")
                .short('e')
                .long("event")
                .env("BOOKINGNOTIFY_EVENT")
                .required(true)
                .help("Path to a booking write event, as plain JSON snapshots or Firestore event data."),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Log the notification rather than sending it to Firebase Cloud Messaging."),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");

    let event_path = matches
        .get_one::<String>("event")
        .cloned()
        .unwrap_or_default();

    let dry_run = matches.get_flag("dry-run");

    Args {
        verbose,
        event_path,
        dry_run,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let args = parse_args();
    set_up_logger(module_path!(), args.verbose)?;
    debug!("{args:?}");

    let payload = std::fs::read_to_string(&args.event_path)
        .with_context(|| format!("failed to read {}", args.event_path))?;
    let event = parse_change_event(&payload)?;
    debug!("{event:?}");

    if args.dry_run {
        bookingnotify::handle(&event, &DryRunGateway).await;
    } else {
        let fcm = FcmClient::from_env().await?;
        bookingnotify::handle(&event, &fcm).await;
    }

    Ok(())
}
