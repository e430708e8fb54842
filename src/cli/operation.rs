//! Selection of the single operation a resource command runs.
//!
//! Both `merge-request` and `issue` accept the same shape of input: list
//! options, create/update options and an optional positional IID. Which of
//! them wins is decided here, once, in a fixed order:
//!
//! | IID     | `--edit` | content flags | `--all-project` | operation           |
//! |---------|----------|---------------|-----------------|---------------------|
//! | present | yes      | any           | any             | `UpdateViaEditor`   |
//! | present | no       | yes           | any             | `Update`            |
//! | present | no       | no            | any             | `Show`              |
//! | absent  | yes      | any           | any             | `CreateViaEditor`   |
//! | absent  | no       | title set     | any             | `Create`            |
//! | absent  | no       | no title      | yes             | `ListAll`           |
//! | absent  | no       | no title      | no              | `ListForProject`    |

use anyhow::Context;
use clap::Args;
use thiserror::Error;
use tracing::debug;

use crate::{
    cli::forge::StateEvent,
    git::{self, GitClient, RemoteIdentity},
};

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("invalid IID '{0}': expected a non-negative integer")]
    InvalidIdentifier(String),
}

/// Filters passed to the list capability after shorthand flags are resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct ListFilters {
    pub state: String,
    pub scope: String,
    pub order_by: String,
    pub sort: String,
    pub limit: u32,
}

/// The operation selected for one invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum Operation {
    ListAll {
        filters: ListFilters,
    },
    ListForProject {
        project: RemoteIdentity,
        filters: ListFilters,
    },
    Show {
        project: RemoteIdentity,
        iid: u64,
    },
    Create {
        project: RemoteIdentity,
    },
    CreateViaEditor {
        project: RemoteIdentity,
    },
    Update {
        project: RemoteIdentity,
        iid: u64,
    },
    UpdateViaEditor {
        project: RemoteIdentity,
        iid: u64,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ListAll { .. } => "list-all",
            Operation::ListForProject { .. } => "list",
            Operation::Show { .. } => "show",
            Operation::Create { .. } => "create",
            Operation::CreateViaEditor { .. } => "create-via-editor",
            Operation::Update { .. } => "update",
            Operation::UpdateViaEditor { .. } => "update-via-editor",
        }
    }
}

/// The parts of a resource command's options that drive the selection.
pub trait CommandOptions {
    /// Whether `--edit` was given.
    fn edit(&self) -> bool;

    /// The `--title` value, empty if not given.
    fn title(&self) -> &str;

    /// Whether any create/update field differs from its default.
    fn has_create_update_content(&self) -> bool;

    /// Whether `--all-project` was given.
    fn all_project(&self) -> bool;

    /// List filters with shorthand flags applied.
    fn list_filters(&self) -> ListFilters;
}

/// A boolean flag that stands in for a fixed option value.
pub struct ShorthandRule<T> {
    pub enabled: fn(&T) -> bool,
    pub value: &'static str,
}

/// Create and update options every resource command accepts.
#[derive(Args)]
#[command(next_help_heading = "Create, Update Options")]
pub struct ContentArgs {
    /// Edit in your text editor, starting with the given title and message
    #[arg(short, long)]
    pub edit: bool,

    /// The title
    #[arg(short = 'i', long)]
    pub title: Option<String>,

    /// The description
    #[arg(short, long)]
    pub message: Option<String>,

    /// Close or reopen
    #[arg(long, value_name = "EVENT")]
    pub state_event: Option<StateEvent>,

    /// The ID of the assignee
    #[arg(long, value_name = "ID")]
    pub assignee_id: Option<u64>,
}

impl ContentArgs {
    /// The `--title` value, empty if not given.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    /// The `--message` value, `None` if not given or empty.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    /// Whether any field differs from its default. An assignee ID of 0
    /// counts as unset.
    pub fn has_content(&self) -> bool {
        !self.title().is_empty()
            || self.message().is_some()
            || self.state_event.is_some()
            || self.assignee_id.is_some_and(|id| id != 0)
    }
}

/// The `--scope` filter and its shorthand flags.
#[derive(Args)]
pub struct ScopeArgs {
    /// Print only entries in this scope
    #[arg(long, default_value = "all", value_parser = ["created-by-me", "assigned-to-me", "all"])]
    pub scope: String,

    /// Shorthand for --scope=created-by-me
    #[arg(short = 'r', long)]
    pub created_me: bool,

    /// Shorthand for --scope=assigned-to-me
    #[arg(short, long)]
    pub assigned_me: bool,
}

const SCOPE_RULES: &[ShorthandRule<ScopeArgs>] = &[
    ShorthandRule {
        enabled: |args| args.created_me,
        value: "created-by-me",
    },
    ShorthandRule {
        enabled: |args| args.assigned_me,
        value: "assigned-to-me",
    },
];

impl ScopeArgs {
    /// The scope with shorthand flags applied.
    pub fn resolve(&self) -> String {
        resolve_shorthand(self, SCOPE_RULES, &self.scope)
    }
}

/// Returns the value of the first enabled rule, or `explicit` if none is.
pub fn resolve_shorthand<T>(options: &T, rules: &[ShorthandRule<T>], explicit: &str) -> String {
    rules
        .iter()
        .find(|rule| (rule.enabled)(options))
        .map_or(explicit, |rule| rule.value)
        .to_string()
}

/// Parses the IID from the first positional argument. Further arguments are
/// ignored.
pub fn parse_iid(args: &[String]) -> Result<Option<u64>, SelectionError> {
    match args.first() {
        None => Ok(None),
        Some(arg) => arg
            .parse::<u64>()
            .map(Some)
            .map_err(|_| SelectionError::InvalidIdentifier(arg.clone())),
    }
}

/// Finds the GitLab project of the working copy and selects the operation.
///
/// Needs no credentials, so nothing is prompted for or sent when this fails.
///
/// # Errors
///
/// Fails if no GitLab remote can be discovered or the IID is invalid.
pub fn prepare(
    options: &impl CommandOptions,
    args: &[String],
    git: &impl GitClient,
    host_pattern: &str,
) -> anyhow::Result<(RemoteIdentity, Operation)> {
    let remote = git::discover_remote(git, host_pattern)
        .context("Failed to determine the GitLab project of this working copy")?;
    let operation = select_operation(options, args, &remote)?;

    Ok((remote, operation))
}

/// Selects the operation for the given options and positional arguments.
///
/// # Errors
///
/// Fails with [`SelectionError::InvalidIdentifier`] if the first positional
/// argument isn't a non-negative integer.
pub fn select_operation(
    options: &impl CommandOptions,
    args: &[String],
    project: &RemoteIdentity,
) -> Result<Operation, SelectionError> {
    let project = project.clone();
    let operation = match parse_iid(args)? {
        Some(iid) if options.edit() => Operation::UpdateViaEditor { project, iid },
        Some(iid) if options.has_create_update_content() => Operation::Update { project, iid },
        Some(iid) => Operation::Show { project, iid },
        None if options.edit() => Operation::CreateViaEditor { project },
        None if !options.title().is_empty() => Operation::Create { project },
        None if options.all_project() => Operation::ListAll {
            filters: options.list_filters(),
        },
        None => Operation::ListForProject {
            project,
            filters: options.list_filters(),
        },
    };

    debug!(operation = operation.name(), "selected operation");

    Ok(operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{DiscoveryError, tests::FakeGit};

    #[derive(Default)]
    struct TestOptions {
        edit: bool,
        title: String,
        message: String,
        all_project: bool,
        opened: bool,
        closed: bool,
        state: String,
    }

    const STATE_RULES: &[ShorthandRule<TestOptions>] = &[
        ShorthandRule {
            enabled: |o| o.opened,
            value: "opened",
        },
        ShorthandRule {
            enabled: |o| o.closed,
            value: "closed",
        },
    ];

    impl CommandOptions for TestOptions {
        fn edit(&self) -> bool {
            self.edit
        }

        fn title(&self) -> &str {
            &self.title
        }

        fn has_create_update_content(&self) -> bool {
            !self.title.is_empty() || !self.message.is_empty()
        }

        fn all_project(&self) -> bool {
            self.all_project
        }

        fn list_filters(&self) -> ListFilters {
            ListFilters {
                state: resolve_shorthand(self, STATE_RULES, &self.state),
                scope: "all".to_string(),
                order_by: "updated_at".to_string(),
                sort: "desc".to_string(),
                limit: 20,
            }
        }
    }

    fn project() -> RemoteIdentity {
        RemoteIdentity {
            raw_url: "https://gitlab.com/acme/widgets".to_string(),
            host: "gitlab.com".to_string(),
            owner: "acme".to_string(),
            project: "widgets".to_string(),
        }
    }

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_iid() {
        assert_eq!(parse_iid(&[]), Ok(None));
        assert_eq!(parse_iid(&args(&["42"])), Ok(Some(42)));
        assert_eq!(parse_iid(&args(&["7", "abc"])), Ok(Some(7)));
        assert_eq!(
            parse_iid(&args(&["abc"])),
            Err(SelectionError::InvalidIdentifier("abc".to_string()))
        );
        assert_eq!(
            parse_iid(&args(&["-1"])),
            Err(SelectionError::InvalidIdentifier("-1".to_string()))
        );
    }

    #[test]
    fn test_edit_wins_over_content_with_iid() {
        let options = TestOptions {
            edit: true,
            title: "x".to_string(),
            ..Default::default()
        };

        assert_eq!(
            select_operation(&options, &args(&["3"]), &project()),
            Ok(Operation::UpdateViaEditor {
                project: project(),
                iid: 3
            })
        );
    }

    #[test]
    fn test_edit_wins_over_title_without_iid() {
        let options = TestOptions {
            edit: true,
            title: "x".to_string(),
            ..Default::default()
        };

        assert_eq!(
            select_operation(&options, &[], &project()),
            Ok(Operation::CreateViaEditor { project: project() })
        );
    }

    #[test]
    fn test_content_with_iid_is_update() {
        let options = TestOptions {
            message: "new description".to_string(),
            ..Default::default()
        };

        assert_eq!(
            select_operation(&options, &args(&["3"]), &project()),
            Ok(Operation::Update {
                project: project(),
                iid: 3
            })
        );
    }

    #[test]
    fn test_iid_alone_is_show() {
        let options = TestOptions {
            all_project: true,
            ..Default::default()
        };

        assert_eq!(
            select_operation(&options, &args(&["3"]), &project()),
            Ok(Operation::Show {
                project: project(),
                iid: 3
            })
        );
    }

    #[test]
    fn test_title_without_iid_is_create() {
        let options = TestOptions {
            title: "x".to_string(),
            all_project: true,
            ..Default::default()
        };

        assert_eq!(
            select_operation(&options, &[], &project()),
            Ok(Operation::Create { project: project() })
        );
    }

    #[test]
    fn test_message_without_title_is_a_list() {
        let options = TestOptions {
            message: "body only".to_string(),
            state: "all".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            select_operation(&options, &[], &project()),
            Ok(Operation::ListForProject { .. })
        ));
    }

    #[test]
    fn test_all_project_is_list_all() {
        let options = TestOptions {
            all_project: true,
            state: "all".to_string(),
            ..Default::default()
        };

        assert!(matches!(
            select_operation(&options, &[], &project()),
            Ok(Operation::ListAll { .. })
        ));
    }

    #[test]
    fn test_no_flags_is_list_for_project() {
        let options = TestOptions {
            state: "all".to_string(),
            ..Default::default()
        };

        match select_operation(&options, &[], &project()) {
            Ok(Operation::ListForProject { project: p, filters }) => {
                assert_eq!(p, project());
                assert_eq!(filters.state, "all");
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_iid_is_rejected_before_selection() {
        let options = TestOptions {
            edit: true,
            ..Default::default()
        };

        assert_eq!(
            select_operation(&options, &args(&["abc"]), &project()),
            Err(SelectionError::InvalidIdentifier("abc".to_string()))
        );
    }

    #[test]
    fn test_resolve_shorthand_first_match_wins() {
        let options = TestOptions {
            opened: true,
            closed: true,
            state: "merged".to_string(),
            ..Default::default()
        };

        assert_eq!(resolve_shorthand(&options, STATE_RULES, &options.state), "opened");

        let options = TestOptions {
            closed: true,
            state: "merged".to_string(),
            ..Default::default()
        };

        assert_eq!(resolve_shorthand(&options, STATE_RULES, &options.state), "closed");
    }

    #[test]
    fn test_resolve_shorthand_falls_back_to_explicit_value() {
        let options = TestOptions {
            state: "merged".to_string(),
            ..Default::default()
        };

        assert_eq!(resolve_shorthand(&options, STATE_RULES, &options.state), "merged");
    }

    #[test]
    fn test_prepare_rejects_invalid_iid_after_discovery() {
        let git = FakeGit::with_remotes(vec![("origin", "ssh://git@gitlab.com/acme/widgets.git")]);
        let error = prepare(&TestOptions::default(), &args(&["x1"]), &git, "gitlab").unwrap_err();

        assert_eq!(
            error.downcast_ref::<SelectionError>(),
            Some(&SelectionError::InvalidIdentifier("x1".to_string()))
        );
    }

    #[test]
    fn test_prepare_fails_without_gitlab_remote() {
        let git = FakeGit::with_remotes(vec![("origin", "https://github.com/acme/widgets")]);
        let error = prepare(&TestOptions::default(), &args(&["3"]), &git, "gitlab").unwrap_err();

        assert!(matches!(
            error.downcast_ref::<DiscoveryError>(),
            Some(DiscoveryError::NoMatchingRemote { .. })
        ));
    }

    #[test]
    fn test_prepare_returns_remote_and_operation() {
        let git = FakeGit::with_remotes(vec![("origin", "https://gitlab.example.com/acme/widgets")]);
        let (remote, operation) =
            prepare(&TestOptions::default(), &args(&["3"]), &git, "gitlab").unwrap();

        assert_eq!(remote.host, "gitlab.example.com");
        assert_eq!(operation.name(), "show");
    }

    #[test]
    fn test_content_args() {
        let mut content = ContentArgs {
            edit: false,
            title: Some(String::new()),
            message: Some(String::new()),
            state_event: None,
            assignee_id: Some(0),
        };

        assert!(!content.has_content());
        assert_eq!(content.message(), None);

        content.assignee_id = Some(4);

        assert!(content.has_content());
    }

    #[test]
    fn test_scope_shorthands() {
        let scope = |created_me, assigned_me| ScopeArgs {
            scope: "all".to_string(),
            created_me,
            assigned_me,
        };

        assert_eq!(scope(true, true).resolve(), "created-by-me");
        assert_eq!(scope(false, true).resolve(), "assigned-to-me");
        assert_eq!(scope(false, false).resolve(), "all");
    }
}
