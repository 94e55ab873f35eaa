//! Provision Eucalyptus and OpenStack identities for a list of users.
//!
//! Usage: `import_users [USERNAME]...` (defaults to the configured core users)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use atmosphere::{
    accounts::{FileAccountDirectory, KeystoneAccounts, ProvisioningWorkflow},
    config::ConfigLoader,
    db, telemetry,
};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "import_users", about = "Import users into Atmosphere")]
struct Args {
    /// Usernames to import; the configured core users when omitted
    usernames: Vec<String>,

    /// JSON export of Eucalyptus users, overriding ATMO_PROVISIONING_EUCA_USERS_FILE
    #[arg(long)]
    euca_users_file: Option<PathBuf>,

    /// Seconds to pause when a backend reports rate limiting
    #[arg(long)]
    backoff_seconds: Option<u64>,

    /// Give up on a user after this many rate-limited attempts
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new().load().context("loading configuration")?;
    if let Some(seconds) = args.backoff_seconds {
        config.provisioning.rate_limit_backoff_seconds = seconds;
    }
    if args.max_attempts.is_some() {
        config.provisioning.rate_limit_max_attempts = args.max_attempts;
    }
    config
        .provisioning
        .validate()
        .context("validating provisioning settings")?;

    telemetry::init_tracing(&config).context("initializing tracing")?;

    let conn = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;
    db::prepare(&conn).await.context("preparing database")?;

    let provisioning = &config.provisioning;
    let Some(users_file) = args
        .euca_users_file
        .or_else(|| provisioning.euca_users_file.clone())
    else {
        bail!("no Eucalyptus user export configured; pass --euca-users-file");
    };
    let eucalyptus = FileAccountDirectory::load(&users_file)
        .await
        .with_context(|| format!("reading {}", users_file.display()))?;

    let keystone_url = provisioning
        .keystone_url
        .as_deref()
        .context("ATMO_PROVISIONING_KEYSTONE_URL is not set")?;
    let keystone_token = provisioning
        .keystone_admin_token
        .as_deref()
        .context("ATMO_PROVISIONING_KEYSTONE_ADMIN_TOKEN is not set")?;
    let openstack = KeystoneAccounts::new(
        keystone_url,
        keystone_token,
        provisioning.keystone_admin_role.clone(),
    )
    .context("building Keystone client")?;

    let workflow = ProvisioningWorkflow::new(
        &conn,
        provisioning,
        &config.default_quota,
        &eucalyptus,
        &openstack,
    )
    .with_backoff(Duration::from_secs(provisioning.rate_limit_backoff_seconds));

    let report = workflow.run(&args.usernames).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing report")?
    );

    if report.failed() > 0 {
        bail!(
            "{} of {} users failed to import",
            report.failed(),
            report.users.len()
        );
    }
    Ok(())
}
