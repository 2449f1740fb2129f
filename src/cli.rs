//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use deckhand_actors::{AwsCredentials, PackagecloudSettings, Settings};
use deckhand_engine::DEFAULT_POOL_SIZE;

/// deckhand - run deployment scripts made of composable actors
#[derive(Parser, Debug)]
#[command(name = "deckhand")]
#[command(version)]
#[command(about = "Run deployment scripts made of composable actors")]
#[command(
    long_about = "deckhand assembles a tree of actors from a JSON or YAML script, validates every actor up front, then runs the tree. Groups run their acts in order (group.Sync) or all at once (group.Async)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log filter, e.g. `debug` or `deckhand_engine=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub level: Option<String>,

    /// Load balancer inventory (JSON or YAML) backing the aws.elb actors
    #[arg(long, global = true)]
    pub inventory: Option<PathBuf>,

    /// Maximum number of concurrent blocking API calls
    #[arg(long, global = true, default_value_t = DEFAULT_POOL_SIZE)]
    pub pool_size: usize,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble and run a script
    Run {
        /// Script file (.json, .yaml or .yml)
        #[arg(short, long)]
        script: PathBuf,

        /// Only read; log the changes that would be made
        #[arg(long, default_value_t = false)]
        dry: bool,
    },

    /// Assemble a script without running it
    Validate {
        /// Script file (.json, .yaml or .yml)
        #[arg(short, long)]
        script: PathBuf,
    },

    /// List the registered actor types
    Actors,
}

/// Credentials, read from the environment.
#[derive(Args, Debug, Default)]
pub struct CredentialArgs {
    #[arg(long, global = true, env = "AWS_ACCESS_KEY_ID", hide_env_values = true, hide = true)]
    pub aws_access_key_id: Option<String>,

    #[arg(long, global = true, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true, hide = true)]
    pub aws_secret_access_key: Option<String>,

    #[arg(long, global = true, env = "PACKAGECLOUD_ACCOUNT", hide = true)]
    pub packagecloud_account: Option<String>,

    #[arg(long, global = true, env = "PACKAGECLOUD_TOKEN", hide_env_values = true, hide = true)]
    pub packagecloud_token: Option<String>,

    /// packagecloud API root
    #[arg(long, global = true, env = "PACKAGECLOUD_ENDPOINT", hide = true)]
    pub packagecloud_endpoint: Option<String>,
}

impl CredentialArgs {
    /// Freeze the collected values into [`Settings`].
    #[must_use]
    pub fn into_settings(self) -> Settings {
        let mut packagecloud = PackagecloudSettings {
            account: self.packagecloud_account,
            token: self.packagecloud_token,
            ..PackagecloudSettings::default()
        };
        if let Some(endpoint) = self.packagecloud_endpoint {
            packagecloud = packagecloud.with_endpoint(endpoint);
        }

        Settings {
            aws: AwsCredentials {
                access_key_id: self.aws_access_key_id,
                secret_access_key: self.aws_secret_access_key,
            },
            packagecloud,
        }
    }
}
