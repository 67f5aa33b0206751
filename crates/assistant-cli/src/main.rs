//! Runs the CloudFormation assistants.
//!
//! Deployed as a Lambda function, pick the handler with `--handler` (or
//! `ASSISTANT_HANDLER`) and CloudFormation's custom-resource events are served
//! until the runtime shuts down:
//!
//! ```sh
//! assistant lambda --handler solution
//! ```
//!
//! The same teardowns can be run by hand:
//!
//! ```sh
//! assistant -v teardown --kind acm-certificate --id arn:aws:acm:... --max-attempts 5
//! ```

#![recursion_limit = "256"]
use std::{
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use assist::{
    aws::Aws,
    certificate::{self, CertificateSubject},
    custom_resource::{dispatch_within, CustomResource, CustomResourceEvent},
    handlers::{
        BucketAssistant, CertificateCleanup, CertificateIssuer, SolutionAssistant,
        StringFunctions, Teardowns,
    },
    BoundedRetryExecutor, Config, Deleted, ResourceKind, RetryPolicy, Settled, TeardownRequest,
};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;

/// Time kept in reserve so a handler that runs out of time can still report
/// its failure before Lambda kills the invocation.
const DEADLINE_MARGIN: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Sets the verbosity level
    #[clap(short, action = clap::ArgAction::Count)]
    verbosity: u8,

    /// TOML file with per-kind retry policies.
    #[clap(long, env = "ASSISTANT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve custom-resource events under the Lambda runtime.
    Lambda {
        #[clap(long, env = "ASSISTANT_HANDLER", value_enum)]
        handler: Handler,
    },
    /// Tear down one resource, retrying while it is in use.
    Teardown {
        /// One of bucket, ecr-repository, sagemaker-model, sagemaker-endpoint,
        /// sagemaker-endpoint-config or acm-certificate.
        #[clap(long)]
        kind: ResourceKind,
        /// Name or ARN of the resource.
        #[clap(long)]
        id: String,
        /// Overrides the configured number of attempts.
        #[clap(long)]
        max_attempts: Option<u32>,
        /// Overrides the configured delay between attempts.
        #[clap(long)]
        delay_secs: Option<u64>,
    },
    /// Print a fresh self-signed certificate and key without importing them.
    Certificate {
        #[clap(long, default_value = "example.com")]
        common_name: String,
        #[clap(long, default_value = "365")]
        validity_days: i64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Handler {
    Bucket,
    Solution,
    StringFunctions,
    SelfSignedCertificate,
    CertificateCleanup,
}

/// Time left until the invocation deadline, given in milliseconds since the
/// unix epoch, minus [`DEADLINE_MARGIN`].
fn budget(deadline_ms: u64) -> Duration {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    Duration::from_millis(deadline_ms)
        .saturating_sub(now)
        .saturating_sub(DEADLINE_MARGIN)
}

async fn handle<H: CustomResource>(
    handler: &H,
    event: LambdaEvent<Value>,
) -> Result<Value, lambda_runtime::Error> {
    let LambdaEvent { payload, context } = event;
    let event = CustomResourceEvent::from_value(payload)?;
    log::debug!("request {} from stack {}", event.request_id, event.stack_id);
    let response = dispatch_within(handler, &event, budget(context.deadline)).await?;
    Ok(serde_json::to_value(response)?)
}

async fn serve<H: CustomResource>(handler: H) -> anyhow::Result<()> {
    lambda_runtime::run(service_fn(|event| handle(&handler, event)))
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
}

async fn lambda(handler: Handler, config: Config) -> anyhow::Result<()> {
    let aws = Aws::from_env().await;
    match handler {
        Handler::Bucket => serve(BucketAssistant::new(Teardowns::new(aws, config))).await,
        Handler::Solution => serve(SolutionAssistant::new(Teardowns::new(aws, config))).await,
        Handler::StringFunctions => serve(StringFunctions).await,
        Handler::SelfSignedCertificate => serve(CertificateIssuer::new(aws)).await,
        Handler::CertificateCleanup => {
            serve(CertificateCleanup::new(Teardowns::new(aws, config))).await
        }
    }
}

async fn teardown(
    request: TeardownRequest,
    max_attempts: Option<u32>,
    delay_secs: Option<u64>,
    config: Config,
) -> anyhow::Result<()> {
    let configured = config.policy(request.kind());
    let policy = RetryPolicy::new(
        max_attempts.unwrap_or(configured.max_attempts()),
        delay_secs
            .map(Duration::from_secs)
            .unwrap_or(configured.delay()),
    )?;
    log::debug!("using {policy:?} for {request}");

    let executor = BoundedRetryExecutor::new(Aws::from_env().await);
    match executor.run(&request, &policy).await {
        Ok(success) => {
            let what = match success.settled {
                Settled::Deleted(Deleted::Count(n)) => format!("emptied ({n} removed)"),
                Settled::Deleted(Deleted::Identifier(_)) => "deleted".to_owned(),
                Settled::AlreadyAbsent => "already gone".to_owned(),
            };
            println!(
                "{} {request} {what} after {} attempt(s)",
                "ok".green().bold(),
                success.attempts
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {e}", "failed".red().bold());
            Err(e.into())
        }
    }
}

#[::tokio::main]
async fn main() -> anyhow::Result<()> {
    let Cli {
        verbosity,
        config,
        command,
    } = Cli::parse();

    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_module("assist", level)
        .filter_module("assistant", level)
        .init();

    let config = match config {
        Some(path) => Config::from_path(&path)
            .with_context(|| format!("could not load config from {}", path.display()))?,
        None => Config::default(),
    };

    match command {
        Command::Lambda { handler } => lambda(handler, config).await,
        Command::Teardown {
            kind,
            id,
            max_attempts,
            delay_secs,
        } => teardown(TeardownRequest::new(kind, id), max_attempts, delay_secs, config).await,
        Command::Certificate {
            common_name,
            validity_days,
        } => {
            let subject = CertificateSubject {
                common_name,
                validity_days,
                ..Default::default()
            };
            let certificate = certificate::generate(&subject)?;
            println!("{}", certificate.certificate_pem);
            println!("{}", certificate.private_key_pem);
            eprintln!("{} {}", "fingerprint".bold(), certificate.fingerprint);
            Ok(())
        }
    }
}
