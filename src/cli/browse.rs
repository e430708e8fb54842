//! The `browse` subcommand.

use anyhow::Context;
use clap::Args;

use crate::{
    cli::config::Config,
    git::{self, RemoteIdentity, SystemGit},
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Command-line arguments for the `browse` subcommand.
#[derive(Args, Debug)]
pub struct BrowseCommandArgs {
    /// Open the issues page
    #[arg(short, long, group = "page")]
    issues: bool,

    /// Open the merge requests page
    #[arg(short, long, group = "page", alias = "mrs")]
    merge_requests: bool,

    /// Instead of opening the URL in your browser, print it to stdout
    #[arg(short, long)]
    no_browser: bool,
}

// =============================================================================
// Command Logic
// =============================================================================

/// Execute the `browse` subcommand and either opens the project page in the
/// browser or prints it to stdout.
pub fn browse_repository(args: BrowseCommandArgs) -> anyhow::Result<()> {
    let config = Config::load_from_disk()?;
    let remote = git::discover_remote(&SystemGit, &config.host_pattern)
        .context("Failed to determine the GitLab project of this working copy")?;
    let url = browse_url(&remote, &args);

    print_or_open(&url, args.no_browser)
}

fn browse_url(remote: &RemoteIdentity, args: &BrowseCommandArgs) -> String {
    let home = remote.web_url();

    if args.issues {
        format!("{home}/-/issues")
    } else if args.merge_requests {
        format!("{home}/-/merge_requests")
    } else {
        home
    }
}

fn print_or_open(url: &str, no_browser: bool) -> anyhow::Result<()> {
    if no_browser {
        println!("{url}");
    } else {
        open::that(url).with_context(|| format!("Failed to open {url} in the browser"))?;
    }

    Ok(())
}
