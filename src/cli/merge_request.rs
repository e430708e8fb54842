//! The `merge-request` subcommand.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{
        config::Config,
        forge::{GitLabClient, MergeRequestClient, RepositoryClient, StateEvent},
        input::TextEditor,
        operation::{
            self, CommandOptions, ContentArgs, ListFilters, Operation, ScopeArgs, ShorthandRule,
        },
    },
    git::{GitClient, RemoteIdentity, SystemGit},
    io::{self, OutputFormat},
};

// =============================================================================
// CLI Arguments
// =============================================================================

const DEFAULT_TARGET_BRANCH: &str = "master";
const TEMPLATE_DIR: &str = ".gitlab/merge_request_templates";

/// Command-line arguments for the `merge-request` subcommand.
///
/// Without an IID, lists merge requests or creates one if a title is given.
/// With an IID, shows the merge request or updates it if any create/update
/// option is given.
#[derive(Args)]
pub struct MergeRequestCommandArgs {
    #[command(flatten)]
    pub create_update: MergeRequestCreateUpdateArgs,

    #[command(flatten)]
    pub list: MergeRequestListArgs,

    /// IID of the merge request to show or update
    #[arg(value_name = "IID")]
    pub iid: Vec<String>,
}

/// Options for creating and updating a merge request.
#[derive(Args)]
#[command(next_help_heading = "Create, Update Options")]
pub struct MergeRequestCreateUpdateArgs {
    #[command(flatten)]
    pub content: ContentArgs,

    /// Name of a description template in .gitlab/merge_request_templates
    #[arg(short = 'p', long, value_name = "NAME")]
    pub template: Option<String>,

    /// The source branch (defaults to the current branch)
    #[arg(short, long)]
    pub source: Option<String>,

    /// The target branch
    #[arg(short, long, default_value = DEFAULT_TARGET_BRANCH)]
    pub target: String,
}

/// Options for listing merge requests.
#[derive(Args)]
#[command(next_help_heading = "List Options")]
pub struct MergeRequestListArgs {
    /// Limit the number of merge requests to output
    #[arg(short, long, default_value_t = 20, value_name = "NUMBER")]
    pub num: u32,

    /// Print only merge requests in this state
    #[arg(long, default_value = "all", value_parser = ["opened", "closed", "merged", "all"])]
    pub state: String,

    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Order merge requests by this field
    #[arg(long = "orderby", default_value = "updated_at", value_parser = ["created_at", "updated_at"])]
    pub order_by: String,

    /// Sort order
    #[arg(long, default_value = "desc", value_parser = ["asc", "desc"])]
    pub sort: String,

    /// Shorthand for --state=opened
    #[arg(short, long)]
    pub opened: bool,

    /// Shorthand for --state=closed
    #[arg(short, long)]
    pub closed: bool,

    /// Shorthand for --state=merged
    #[arg(short = 'g', long)]
    pub merged: bool,

    /// List merge requests of all projects
    #[arg(short = 'A', long)]
    pub all_project: bool,

    /// Fields to include in output (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<MergeRequestField>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

const STATE_RULES: &[ShorthandRule<MergeRequestListArgs>] = &[
    ShorthandRule {
        enabled: |args| args.opened,
        value: "opened",
    },
    ShorthandRule {
        enabled: |args| args.closed,
        value: "closed",
    },
    ShorthandRule {
        enabled: |args| args.merged,
        value: "merged",
    },
];

impl CommandOptions for MergeRequestCommandArgs {
    fn edit(&self) -> bool {
        self.create_update.content.edit
    }

    fn title(&self) -> &str {
        self.create_update.content.title()
    }

    fn has_create_update_content(&self) -> bool {
        self.create_update.content.has_content()
    }

    fn all_project(&self) -> bool {
        self.list.all_project
    }

    fn list_filters(&self) -> ListFilters {
        let args = &self.list;

        ListFilters {
            state: operation::resolve_shorthand(args, STATE_RULES, &args.state),
            scope: args.scope.resolve(),
            order_by: args.order_by.clone(),
            sort: args.sort.clone(),
            limit: args.num,
        }
    }
}

// =============================================================================
// Domain Types
// =============================================================================

#[derive(Clone, Debug, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MergeRequestField {
    Iid,
    Reference,
    Title,
    State,
    Author,
    Assignee,
    Source,
    Target,
    Created,
    Updated,
    Url,
}

/// A merge request. Serialized names match [`MergeRequestField`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MergeRequest {
    /// The project-local ID (e.g. !42).
    pub iid: u64,
    /// Reference including the project path (e.g. group/project!42).
    pub reference: String,
    pub title: String,
    #[serde(skip)]
    pub description: String,
    /// The current state (opened, closed, merged, locked).
    pub state: String,
    pub author: String,
    pub assignee: Option<String>,
    #[serde(rename = "source")]
    pub source_branch: String,
    #[serde(rename = "target")]
    pub target_branch: String,
    #[serde(rename = "created")]
    pub created_at: String,
    #[serde(rename = "updated")]
    pub updated_at: String,
    pub url: String,
}

pub struct CreateMergeRequestOptions<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub source_branch: &'a str,
    pub target_branch: &'a str,
    pub assignee_id: Option<u64>,
}

/// Fields to change. `None` leaves a field untouched.
pub struct UpdateMergeRequestOptions<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub state_event: Option<StateEvent>,
    pub assignee_id: Option<u64>,
}

/// External collaborators the operations run against.
pub struct MergeRequestContext<'a> {
    pub client: &'a dyn MergeRequestClient,
    pub repository: &'a dyn RepositoryClient,
    pub git: &'a dyn GitClient,
    pub editor: &'a TextEditor,
}

// =============================================================================
// Command Logic
// =============================================================================

/// Runs the `merge-request` subcommand against the GitLab remote of the
/// working copy.
pub fn run_merge_request_command(args: MergeRequestCommandArgs) -> anyhow::Result<()> {
    let mut config = Config::load_from_disk()?;
    let system_git = SystemGit;
    let (remote, operation) =
        operation::prepare(&args, &args.iid, &system_git, &config.host_pattern)?;
    let client = GitLabClient::new(config.api_url_for(&remote), config.ensure_private_token()?);
    let editor = TextEditor::new(config.editor.clone());
    let context = MergeRequestContext {
        client: &client,
        repository: &client,
        git: &system_git,
        editor: &editor,
    };
    let output = execute(operation, &args, &context)?;

    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}

/// Executes the selected operation and returns the text to print.
pub fn execute(
    operation: Operation,
    args: &MergeRequestCommandArgs,
    context: &MergeRequestContext,
) -> anyhow::Result<String> {
    match operation {
        Operation::ListAll { filters } => list(context.client, None, &filters, &args.list),
        Operation::ListForProject { project, filters } => list(
            context.client,
            Some(&project.full_name()),
            &filters,
            &args.list,
        ),
        Operation::Show { project, iid } => {
            let mr = context.client.get_merge_request(&project.full_name(), iid)?;

            Ok(format_merge_request_detail(&mr))
        }
        Operation::Create { project } => {
            let opts = &args.create_update;
            let description = resolve_description(context, &project, opts)?;

            create(context, &project, opts, args.title(), &description)
        }
        Operation::CreateViaEditor { project } => {
            let opts = &args.create_update;
            let description = resolve_description(context, &project, opts)?;
            let message = context
                .editor
                .edit_title_and_description(args.title(), &description)?;

            create(context, &project, opts, &message.title, &message.body)
        }
        Operation::Update { project, iid } => {
            let content = &args.create_update.content;

            update(
                context,
                &project,
                iid,
                &UpdateMergeRequestOptions {
                    title: Some(content.title()).filter(|t| !t.is_empty()),
                    description: content.message(),
                    state_event: content.state_event,
                    assignee_id: content.assignee_id,
                },
            )
        }
        Operation::UpdateViaEditor { project, iid } => {
            let content = &args.create_update.content;
            let current = context
                .client
                .get_merge_request(&project.full_name(), iid)?;
            let title = Some(content.title())
                .filter(|t| !t.is_empty())
                .unwrap_or(&current.title);
            let message = context.editor.edit_title_and_description(
                title,
                content.message().unwrap_or(&current.description),
            )?;

            update(
                context,
                &project,
                iid,
                &UpdateMergeRequestOptions {
                    title: Some(&message.title),
                    description: Some(&message.body),
                    state_event: content.state_event,
                    assignee_id: content.assignee_id,
                },
            )
        }
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

fn list(
    client: &dyn MergeRequestClient,
    project: Option<&str>,
    filters: &ListFilters,
    args: &MergeRequestListArgs,
) -> anyhow::Result<String> {
    let mrs = client
        .list_merge_requests(project, filters)
        .context("Failed fetching merge requests")?;
    let fields = if !args.fields.is_empty() {
        args.fields.clone()
    } else if project.is_none() {
        vec![
            MergeRequestField::Reference,
            MergeRequestField::Title,
            MergeRequestField::Url,
        ]
    } else {
        vec![
            MergeRequestField::Iid,
            MergeRequestField::Title,
            MergeRequestField::Url,
        ]
    };

    io::format(&mrs, &fields, args.format)
}

fn create(
    context: &MergeRequestContext,
    project: &RemoteIdentity,
    opts: &MergeRequestCreateUpdateArgs,
    title: &str,
    description: &str,
) -> anyhow::Result<String> {
    let source_branch = match opts.source.as_deref().filter(|s| !s.is_empty()) {
        Some(source) => source.to_string(),
        None => context
            .git
            .get_current_branch()
            .context("Couldn't determine the source branch. Use --source to set it explicitly.")?,
    };

    if source_branch == opts.target {
        anyhow::bail!(
            "Cannot create merge request: source branch \"{source_branch}\" is the same as the target branch."
        );
    }

    let mr = context.client.create_merge_request(
        &project.full_name(),
        &CreateMergeRequestOptions {
            title,
            description,
            source_branch: &source_branch,
            target_branch: &opts.target,
            assignee_id: opts.content.assignee_id,
        },
    )?;

    Ok(format!("Merge request created at {}", mr.url))
}

fn update(
    context: &MergeRequestContext,
    project: &RemoteIdentity,
    iid: u64,
    options: &UpdateMergeRequestOptions,
) -> anyhow::Result<String> {
    let mr = context
        .client
        .update_merge_request(&project.full_name(), iid, options)?;

    Ok(format!("Merge request updated at {}", mr.url))
}

/// The description given with --message, else the content of --template.
fn resolve_description(
    context: &MergeRequestContext,
    project: &RemoteIdentity,
    opts: &MergeRequestCreateUpdateArgs,
) -> anyhow::Result<String> {
    if let Some(message) = opts.content.message() {
        return Ok(message.to_string());
    }

    let Some(template) = opts.template.as_deref() else {
        return Ok(String::new());
    };
    let path = format!("{TEMPLATE_DIR}/{template}.md");

    context
        .repository
        .get_raw_file(&project.full_name(), &path, &opts.target)
        .with_context(|| format!("Failed to fetch merge request template '{path}'"))
}

fn format_merge_request_detail(mr: &MergeRequest) -> String {
    let mut detail = format!(
        "!{} {}\n\
         State:    {}\n\
         Author:   {}\n\
         Assignee: {}\n\
         Branch:   {} -> {}\n\
         Created:  {}\n\
         Updated:  {}\n\
         URL:      {}",
        mr.iid,
        mr.title,
        mr.state,
        mr.author,
        mr.assignee.as_deref().unwrap_or("-"),
        mr.source_branch,
        mr.target_branch,
        mr.created_at,
        mr.updated_at,
        mr.url,
    );

    if !mr.description.is_empty() {
        detail.push_str("\n\n");
        detail.push_str(&mr.description);
    }

    detail
}
