//! The `issue` subcommand.

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{
        config::Config,
        forge::{GitLabClient, IssueClient, StateEvent},
        input::TextEditor,
        operation::{
            self, CommandOptions, ContentArgs, ListFilters, Operation, ScopeArgs, ShorthandRule,
        },
    },
    git::{RemoteIdentity, SystemGit},
    io::{self, OutputFormat},
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Command-line arguments for the `issue` subcommand.
///
/// Without an IID, lists issues or creates one if a title is given. With an
/// IID, shows the issue or updates it if any create/update option is given.
#[derive(Args)]
pub struct IssueCommandArgs {
    #[command(flatten)]
    pub create_update: ContentArgs,

    #[command(flatten)]
    pub list: IssueListArgs,

    /// IID of the issue to show or update
    #[arg(value_name = "IID")]
    pub iid: Vec<String>,
}

/// Options for listing issues.
#[derive(Args)]
#[command(next_help_heading = "List Options")]
pub struct IssueListArgs {
    /// Limit the number of issues to output
    #[arg(short, long, default_value_t = 20, value_name = "NUMBER")]
    pub num: u32,

    /// Print only issues in this state
    #[arg(long, default_value = "all", value_parser = ["opened", "closed", "all"])]
    pub state: String,

    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Order issues by this field
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

    /// List issues of all projects
    #[arg(short = 'A', long)]
    pub all_project: bool,

    /// Fields to include in output (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub fields: Vec<IssueField>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

const STATE_RULES: &[ShorthandRule<IssueListArgs>] = &[
    ShorthandRule {
        enabled: |args| args.opened,
        value: "opened",
    },
    ShorthandRule {
        enabled: |args| args.closed,
        value: "closed",
    },
];

impl CommandOptions for IssueCommandArgs {
    fn edit(&self) -> bool {
        self.create_update.edit
    }

    fn title(&self) -> &str {
        self.create_update.title()
    }

    fn has_create_update_content(&self) -> bool {
        self.create_update.has_content()
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
pub enum IssueField {
    Iid,
    Reference,
    Title,
    State,
    Author,
    Assignee,
    Labels,
    Created,
    Updated,
    Url,
}

/// An issue. Serialized names match [`IssueField`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Issue {
    /// The project-local ID (e.g. #42).
    pub iid: u64,
    /// Reference including the project path (e.g. group/project#42).
    pub reference: String,
    pub title: String,
    #[serde(skip)]
    pub description: String,
    /// The current state (opened, closed).
    pub state: String,
    pub author: String,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    #[serde(rename = "created")]
    pub created_at: String,
    #[serde(rename = "updated")]
    pub updated_at: String,
    pub url: String,
}

pub struct CreateIssueOptions<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub assignee_id: Option<u64>,
}

/// Fields to change. `None` leaves a field untouched.
pub struct UpdateIssueOptions<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub state_event: Option<StateEvent>,
    pub assignee_id: Option<u64>,
}

// =============================================================================
// Command Logic
// =============================================================================

/// Runs the `issue` subcommand against the GitLab remote of the working
/// copy.
pub fn run_issue_command(args: IssueCommandArgs) -> anyhow::Result<()> {
    let mut config = Config::load_from_disk()?;
    let (remote, operation) =
        operation::prepare(&args, &args.iid, &SystemGit, &config.host_pattern)?;
    let client = GitLabClient::new(config.api_url_for(&remote), config.ensure_private_token()?);
    let editor = TextEditor::new(config.editor.clone());
    let output = execute(operation, &args, &client, &editor)?;

    if !output.is_empty() {
        println!("{output}");
    }

    Ok(())
}

/// Executes the selected operation and returns the text to print.
pub fn execute(
    operation: Operation,
    args: &IssueCommandArgs,
    client: &dyn IssueClient,
    editor: &TextEditor,
) -> anyhow::Result<String> {
    let opts = &args.create_update;
    let message = opts.message();

    match operation {
        Operation::ListAll { filters } => list(client, None, &filters, &args.list),
        Operation::ListForProject { project, filters } => {
            list(client, Some(&project.full_name()), &filters, &args.list)
        }
        Operation::Show { project, iid } => {
            let issue = client.get_issue(&project.full_name(), iid)?;

            Ok(format_issue_detail(&issue))
        }
        Operation::Create { project } => create(
            client,
            &project,
            &CreateIssueOptions {
                title: args.title(),
                description: message.unwrap_or_default(),
                assignee_id: opts.assignee_id,
            },
        ),
        Operation::CreateViaEditor { project } => {
            let edited =
                editor.edit_title_and_description(args.title(), message.unwrap_or_default())?;

            create(
                client,
                &project,
                &CreateIssueOptions {
                    title: &edited.title,
                    description: &edited.body,
                    assignee_id: opts.assignee_id,
                },
            )
        }
        Operation::Update { project, iid } => update(
            client,
            &project,
            iid,
            &UpdateIssueOptions {
                title: Some(opts.title()).filter(|t| !t.is_empty()),
                description: message,
                state_event: opts.state_event,
                assignee_id: opts.assignee_id,
            },
        ),
        Operation::UpdateViaEditor { project, iid } => {
            let current = client.get_issue(&project.full_name(), iid)?;
            let title = Some(opts.title())
                .filter(|t| !t.is_empty())
                .unwrap_or(&current.title);
            let edited =
                editor.edit_title_and_description(title, message.unwrap_or(&current.description))?;

            update(
                client,
                &project,
                iid,
                &UpdateIssueOptions {
                    title: Some(&edited.title),
                    description: Some(&edited.body),
                    state_event: opts.state_event,
                    assignee_id: opts.assignee_id,
                },
            )
        }
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

fn list(
    client: &dyn IssueClient,
    project: Option<&str>,
    filters: &ListFilters,
    args: &IssueListArgs,
) -> anyhow::Result<String> {
    let issues = client
        .list_issues(project, filters)
        .context("Failed fetching issues")?;
    let fields = if !args.fields.is_empty() {
        args.fields.clone()
    } else if project.is_none() {
        vec![IssueField::Reference, IssueField::Title, IssueField::Url]
    } else {
        vec![IssueField::Iid, IssueField::Title, IssueField::Url]
    };

    io::format(&issues, &fields, args.format)
}

fn create(
    client: &dyn IssueClient,
    project: &RemoteIdentity,
    options: &CreateIssueOptions,
) -> anyhow::Result<String> {
    let issue = client.create_issue(&project.full_name(), options)?;

    Ok(format!("Issue created at {}", issue.url))
}

fn update(
    client: &dyn IssueClient,
    project: &RemoteIdentity,
    iid: u64,
    options: &UpdateIssueOptions,
) -> anyhow::Result<String> {
    let issue = client.update_issue(&project.full_name(), iid, options)?;

    Ok(format!("Issue updated at {}", issue.url))
}

fn format_issue_detail(issue: &Issue) -> String {
    let labels = if issue.labels.is_empty() {
        "-".to_string()
    } else {
        issue.labels.join(", ")
    };
    let mut detail = format!(
        "#{} {}\n\
         State:    {}\n\
         Author:   {}\n\
         Assignee: {}\n\
         Labels:   {}\n\
         Created:  {}\n\
         Updated:  {}\n\
         URL:      {}",
        issue.iid,
        issue.title,
        issue.state,
        issue.author,
        issue.assignee.as_deref().unwrap_or("-"),
        labels,
        issue.created_at,
        issue.updated_at,
        issue.url,
    );

    if !issue.description.is_empty() {
        detail.push_str("\n\n");
        detail.push_str(&issue.description);
    }

    detail
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use clap::Parser;

    use super::*;
    use crate::{
        cli::{Cli, LabCommand, forge::ApiError, input::tests::scripted_editor},
        git,
    };

    #[derive(Default)]
    struct FakeGitLab {
        issues: Vec<Issue>,
        listed: RefCell<Vec<(Option<String>, ListFilters)>>,
        created: RefCell<Vec<(String, String, Option<u64>)>>,
        updated: RefCell<Vec<(u64, Option<String>, Option<String>, Option<StateEvent>)>>,
    }

    impl IssueClient for FakeGitLab {
        fn get_issue(&self, project: &str, iid: u64) -> Result<Issue, ApiError> {
            self.issues
                .iter()
                .find(|issue| issue.iid == iid)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("{project}#{iid}")))
        }

        fn list_issues(
            &self,
            project: Option<&str>,
            filters: &ListFilters,
        ) -> Result<Vec<Issue>, ApiError> {
            self.listed
                .borrow_mut()
                .push((project.map(str::to_string), filters.clone()));

            Ok(self.issues.clone())
        }

        fn create_issue(
            &self,
            _project: &str,
            options: &CreateIssueOptions,
        ) -> Result<Issue, ApiError> {
            self.created.borrow_mut().push((
                options.title.to_string(),
                options.description.to_string(),
                options.assignee_id,
            ));

            Ok(issue(5, options.title))
        }

        fn update_issue(
            &self,
            project: &str,
            iid: u64,
            options: &UpdateIssueOptions,
        ) -> Result<Issue, ApiError> {
            let issue = self.get_issue(project, iid)?;

            self.updated.borrow_mut().push((
                iid,
                options.title.map(str::to_string),
                options.description.map(str::to_string),
                options.state_event,
            ));

            Ok(issue)
        }
    }

    fn issue(iid: u64, title: &str) -> Issue {
        Issue {
            iid,
            reference: format!("acme/widgets#{iid}"),
            title: title.to_string(),
            description: String::new(),
            state: "opened".to_string(),
            author: "alice".to_string(),
            assignee: Some("bob".to_string()),
            labels: vec!["bug".to_string(), "ui".to_string()],
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-02T00:00:00Z".to_string(),
            url: format!("https://gitlab.com/acme/widgets/-/issues/{iid}"),
        }
    }

    fn parse(args: &[&str]) -> IssueCommandArgs {
        let cli = Cli::try_parse_from(["lab", "issue"].into_iter().chain(args.iter().copied()))
            .unwrap();

        match cli.subcommand {
            LabCommand::Issue(args) => args,
            _ => unreachable!(),
        }
    }

    fn run(args: &[&str], gitlab: &FakeGitLab, editor: &TextEditor) -> anyhow::Result<String> {
        let args = parse(args);
        let project = git::parse_remote_url("ssh://git@gitlab.com/acme/widgets.git")?;
        let operation = operation::select_operation(&args, &args.iid, &project)?;

        execute(operation, &args, gitlab, editor)
    }

    #[test]
    fn test_issue_state_shorthands() {
        let args = parse(&["-c", "--state", "opened"]);

        assert_eq!(args.list_filters().state, "closed");
        assert!(Cli::try_parse_from(["lab", "issue", "--merged"]).is_err());
        assert!(Cli::try_parse_from(["lab", "issue", "--state", "merged"]).is_err());
    }

    #[test]
    fn test_list_issues_with_fields() {
        let gitlab = FakeGitLab {
            issues: vec![issue(1, "Broken button")],
            ..Default::default()
        };
        let editor = scripted_editor("");
        let output = run(&["-a", "--fields", "iid,labels,assignee"], &gitlab, &editor).unwrap();

        assert_eq!(output, "1\tbug,ui\tbob");
        assert_eq!(gitlab.listed.borrow()[0].1.scope, "assigned-to-me");
    }

    #[test]
    fn test_show_issue() {
        let gitlab = FakeGitLab {
            issues: vec![issue(7, "Broken button")],
            ..Default::default()
        };
        let editor = scripted_editor("");
        let output = run(&["7"], &gitlab, &editor).unwrap();

        assert!(output.starts_with("#7 Broken button\n"));
        assert!(output.contains("Labels:   bug, ui"));
    }

    #[test]
    fn test_create_issue() {
        let gitlab = FakeGitLab::default();
        let editor = scripted_editor("");
        let output = run(
            &["-i", "Broken button", "-m", "Clicking does nothing", "--assignee-id", "3"],
            &gitlab,
            &editor,
        )
        .unwrap();

        assert_eq!(output, "Issue created at https://gitlab.com/acme/widgets/-/issues/5");
        assert_eq!(
            gitlab.created.borrow().as_slice(),
            [(
                "Broken button".to_string(),
                "Clicking does nothing".to_string(),
                Some(3)
            )]
        );
    }

    #[test]
    fn test_create_issue_via_editor() {
        let gitlab = FakeGitLab::default();
        let editor = scripted_editor(
            "From editor\n\nDetails\n# ------------------------ >8 ------------------------\n",
        );

        run(&["-e", "-i", "ignored"], &gitlab, &editor).unwrap();

        assert_eq!(gitlab.created.borrow()[0].0, "From editor");
        assert_eq!(gitlab.created.borrow()[0].1, "Details");
    }

    #[test]
    fn test_update_missing_issue_is_not_found() {
        let gitlab = FakeGitLab::default();
        let editor = scripted_editor("");
        let error = run(&["9", "--state-event", "close"], &gitlab, &editor).unwrap_err();

        assert!(matches!(
            error.downcast_ref::<ApiError>(),
            Some(ApiError::NotFound(_))
        ));
        assert!(gitlab.updated.borrow().is_empty());
    }

    #[test]
    fn test_update_issue() {
        let gitlab = FakeGitLab {
            issues: vec![issue(9, "Old")],
            ..Default::default()
        };
        let editor = scripted_editor("");

        run(&["9", "-i", "New"], &gitlab, &editor).unwrap();

        assert_eq!(
            gitlab.updated.borrow().as_slice(),
            [(9, Some("New".to_string()), None, None)]
        );
    }
}
