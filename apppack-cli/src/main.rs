mod cli;
mod output;
mod progress;
mod prompt;

use std::sync::Arc;

use apppack_core::Questionnaire;
use apppack_directory::{Directory, TableConfig, create_table};
use apppack_provider_aws::Aws;
use apppack_stacks::{Context, Session, Settings, Verb};
use colored::Colorize;
use log::{debug, info};

use crate::cli::{Action, Invocation};
use crate::progress::SpinnerReporter;
use crate::prompt::InquirePrompter;

#[tokio::main]
async fn main() {
    let invocation = match cli::parse() {
        Ok(invocation) => invocation,
        Err(e) => e.exit(),
    };

    init_logging(invocation.globals.verbose);

    if let Err(e) = run(invocation).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// RUST_LOG wins over --verbose when set
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(invocation: Invocation) -> Result<(), String> {
    let session = connect(invocation.globals.context()).await?;

    match invocation.action {
        Action::Stacks => {
            let groups = apppack_stacks::list_stacks(&session)
                .await
                .map_err(|e| e.to_string())?;
            print!("{}", output::format_stacks(&groups));
        }
        Action::Apply {
            verb,
            stack_type,
            name,
            flags,
        } => {
            debug!("{} {} '{}'", verb, stack_type, name);
            let outcome = match verb {
                Verb::Create => apppack_stacks::create(&session, stack_type, &name, &flags).await,
                Verb::Modify => apppack_stacks::modify(&session, stack_type, &name, &flags).await,
                Verb::Upgrade => apppack_stacks::upgrade(&session, stack_type, &name).await,
                Verb::Destroy => apppack_stacks::destroy(&session, stack_type, &name).await,
            }
            .map_err(|e| e.to_string())?;
            println!("{}", output::format_outcome(&outcome));
        }
    }
    Ok(())
}

/// Resolve credentials, check the account and open the directory table
async fn connect(context: Context) -> Result<Session, String> {
    let aws = Aws::load(context.region.as_deref())
        .await
        .map_err(|e| e.to_string())?;

    if context.aws_credentials {
        info!("using AWS credentials from the environment");
    }
    if let Some(expected) = context.account.as_deref() {
        let identity = aws
            .verify_account(expected)
            .await
            .map_err(|e| e.to_string())?;
        debug!("operating as {} in {}", identity.arn, identity.account);
    }

    let settings = Settings::from_env();
    let table = create_table(&TableConfig {
        backend_type: "dynamodb".to_string(),
        table_name: settings.table_name.clone(),
        region: aws.region().to_string(),
    })
    .await
    .map_err(|e| format!("directory table {}: {}", settings.table_name, e))?;

    let interactive = !context.non_interactive;
    Ok(Session {
        gateway: aws.gateway(),
        directory: Directory::new(Arc::from(table)),
        questionnaire: Questionnaire::new(Arc::new(InquirePrompter), interactive),
        reporter: Arc::new(SpinnerReporter::new()),
        settings,
        context,
    })
}
