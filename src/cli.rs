pub(crate) mod forge {
    mod forge_client;
    mod gitlab;
    mod http_client;

    pub use forge_client::{ApiError, IssueClient, MergeRequestClient, RepositoryClient, StateEvent};
    pub use gitlab::GitLabClient;
}

pub(crate) mod input {
    mod text_editor;

    pub use text_editor::TextEditor;

    #[cfg(test)]
    pub(crate) use text_editor::tests;
}

pub(crate) mod config;

mod browse;
mod issue;
mod merge_request;
mod operation;

pub use browse::browse_repository;
pub use issue::run_issue_command;
pub use merge_request::run_merge_request_command;

use clap::{Parser, Subcommand};

use crate::cli::{
    browse::BrowseCommandArgs, issue::IssueCommandArgs, merge_request::MergeRequestCommandArgs,
};

#[derive(Parser)]
#[command(name = "lab", version, about, long_about = None)]
pub struct Cli {
    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub subcommand: LabCommand,
}

#[derive(Subcommand)]
pub enum LabCommand {
    /// List, show, create or update merge requests.
    #[command(alias = "mr", about = "List, show, create or update merge requests")]
    MergeRequest(MergeRequestCommandArgs),

    /// List, show, create or update issues.
    #[command(alias = "i", about = "List, show, create or update issues")]
    Issue(IssueCommandArgs),

    /// Open the GitLab project in the browser.
    #[command(alias = "b", about = "Open the GitLab project in the browser")]
    Browse(BrowseCommandArgs),
}
