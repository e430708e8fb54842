use anyhow::Context;
use dialoguer::Editor;
use tracing::debug;

const CUT_MARKER: &str = "# ------------------------ >8 ------------------------";
const HELP_TEXT: &str = "# Do not modify or remove the line above.
# Everything below it will be ignored.

## Help

Enter a message above the cut marker (the line containing -- >8 --).
The first line of your message will be used as the title.
The remaining text will be used for the description.
Save and exit your editor to continue.
";
const FILE_EXTENSION: &str = ".md";

/// Title and description entered in the text editor.
#[derive(Debug, PartialEq)]
pub struct Message {
    pub title: String,
    pub body: String,
}

/// Lets the user edit the given template and returns the saved content, or
/// `None` if the editor was closed without saving.
pub type Launcher = dyn Fn(&str) -> anyhow::Result<Option<String>>;

pub struct TextEditor {
    launcher: Box<Launcher>,
}

impl TextEditor {
    /// Creates an editor running `program`. Without one, `$VISUAL`, `$EDITOR`
    /// or the platform default is used.
    pub fn new(program: Option<String>) -> Self {
        Self::with_launcher(Box::new(move |template: &str| -> anyhow::Result<Option<String>> {
            let mut editor = Editor::new();

            editor.extension(FILE_EXTENSION);

            if let Some(program) = program.as_deref().filter(|p| !p.trim().is_empty()) {
                editor.executable(program);
            }

            debug!(program = ?program, "opening text editor");

            editor
                .edit(template)
                .context("Failed opening text editor to enter message")
        }))
    }

    pub fn with_launcher(launcher: Box<Launcher>) -> Self {
        TextEditor { launcher }
    }

    /// Lets the user edit a message pre-filled with `title` and
    /// `description`.
    ///
    /// # Errors
    ///
    /// Fails if the editor can't be run, is closed without saving, or the
    /// saved message has no title or lost its cut marker.
    pub fn edit_title_and_description(
        &self,
        title: &str,
        description: &str,
    ) -> anyhow::Result<Message> {
        let Some(content) = (self.launcher)(&build_template(title, description))? else {
            anyhow::bail!("Aborting: No message provided (editor closed without saving)")
        };

        parse_message(&content)
    }
}

fn build_template(title: &str, description: &str) -> String {
    format!("{title}\n\n{description}\n\n{CUT_MARKER}\n{HELP_TEXT}")
}

fn parse_message(content: &str) -> anyhow::Result<Message> {
    let Some((content, _)) = content.rsplit_once(CUT_MARKER) else {
        anyhow::bail!("The cut marker has been removed. Aborting...");
    };
    let (title, body) = match content.trim_start().split_once('\n') {
        Some((title, body)) => (title.trim(), body.trim()),
        None => (content.trim(), ""),
    };

    if title.is_empty() {
        anyhow::bail!("Aborting due to empty title.");
    }

    Ok(Message {
        title: title.to_string(),
        body: body.to_string(),
    })
}
