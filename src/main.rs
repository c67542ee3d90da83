use clap::Parser;
use ebs_backup::snapshot::backup_config::BackupConfig;
use ebs_backup::snapshot::cloud::aws_cli::AwsCliProvider;
use ebs_backup::snapshot::command::ShellRunner;
use ebs_backup::snapshot::engine::BackupEngine;
use ebs_backup::snapshot::result_error::error::Error;
use ebs_backup::snapshot::result_error::WithMsg;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Mutex;
use tracing::{error, info, warn};
use validator::Validate;

/// Takes tiered snapshots of the volumes configured in the backup config
/// file and prunes old ones
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long, default_value = "backup_config.json")]
    config: PathBuf,
    /// Persistent log file, appended on every run
    #[arg(short, long, default_value = "backup.log")]
    log: PathBuf,
}

fn init_logging(args: &Args) {
    match OpenOptions::new().create(true).append(true).open(&args.log) {
        Ok(log_file) => tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(Mutex::new(log_file))
            .init(),
        Err(err) => {
            tracing_subscriber::fmt::init();
            warn!(
                "Could not open log file {:?} ({err}), logging to stderr",
                args.log
            );
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let res = File::open(&args.config)
        .map_err(Error::from)
        .with_msg(format!("Could not load backup config file {:?}", &args.config))
        .and_then(|f| {
            serde_json::from_reader::<_, BackupConfig>(f)
                .map_err(Error::from)
                .with_msg(format!("Parse JSON config failed: {:?}", &args.config))
        })
        .and_then(|bc| {
            bc.validate()
                .map_err(Error::from)
                .map(|_| bc)
                .with_msg(format!("Config validation failed: {:?}", &args.config))
        });

    let config = match res {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            exit(1);
        }
    };

    let runner = ShellRunner;
    let provider = AwsCliProvider::new(&runner);
    let engine = BackupEngine::new(&provider, &runner, config.notification.as_ref());
    let outcomes = engine.run(&config);

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(
        "Backup run finished: {} rules processed, {} failed",
        outcomes.len(),
        failed
    );
}
