pub mod controller;
pub mod conversation_state;
pub mod instructions;
pub mod prompt;
pub mod render;

use std::io::Write;
use std::process::ExitCode;

use color_print::cstr;
use controller::{ConversationController, TurnOutcome, MAX_DRAFT_CHARS};
use eyre::Result;
use prompt::{generate_prompt, placeholder, CONTINUATION_PROMPT};
use render::MarkdownRenderer;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::gateway_client::CompletionGateway;

const WELCOME_TEXT: &str = cstr!(
    "
<bold>GradeFlow</bold>

Paste the assignment instructions and get back a numbered task list.
End a line with <cyan>\\</cyan> to keep typing on the next one.

/help         Show the help dialogue
/quit         Quit the application
"
);

const HELP_TEXT: &str = cstr!(
    "
<bold>GradeFlow</bold>

/clear        Start over with a fresh conversation
/transcript   Show the assistant side of the conversation again
/help         Show this help dialogue
/quit         Quit the application
"
);

pub struct ChatContext {
    output: Box<dyn Write>,
    input: Option<String>,
    interactive: bool,
    controller: ConversationController,
    gateway: Box<dyn CompletionGateway>,
    renderer: MarkdownRenderer,
}

impl ChatContext {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        gateway: Box<dyn CompletionGateway>,
        renderer: MarkdownRenderer,
    ) -> Self {
        Self {
            output,
            input,
            interactive,
            controller: ConversationController::new(),
            gateway,
            renderer,
        }
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        // Single query: always a chat turn, never a slash command. The exit
        // status tells whether an answer came back.
        if let Some(input) = self.input.take() {
            self.compose(&input)?;
            let outcome = self.process_chat_input().await?;
            return Ok(match outcome {
                TurnOutcome::Answered => ExitCode::SUCCESS,
                TurnOutcome::Failed | TurnOutcome::Rejected => ExitCode::FAILURE,
            });
        }

        if self.interactive {
            self.print_welcome()?;
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        writeln!(self.output, "{}", WELCOME_TEXT)?;
        self.print_transcript()?;
        writeln!(self.output, "\n{}", placeholder(false))?;
        Ok(())
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = if self.controller.session().draft_input.is_empty() {
                generate_prompt(None)
            } else {
                generate_prompt(Some(CONTINUATION_PROMPT))
            };

            match rl.readline(&prompt_text) {
                Ok(line) => {
                    let mut draft = self.controller.session().draft_input.clone();
                    let complete = append_line(&mut draft, &line);
                    self.compose(&draft)?;
                    if !complete {
                        continue;
                    }

                    let submitted = self.controller.session().draft_input.clone();
                    if submitted.trim().is_empty() {
                        self.controller.clear_draft();
                        continue;
                    }

                    rl.add_history_entry(submitted.as_str());

                    if submitted.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input().await {
                        writeln!(self.output, "Error: {}", e)?;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    self.controller.clear_draft();
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    writeln!(self.output, "Error: {}", e)?;
                    break;
                }
            }
        }

        Ok(())
    }

    /// Store `text` as the draft, telling the user if it was cut.
    fn compose(&mut self, text: &str) -> Result<()> {
        if self.controller.set_draft(text) {
            writeln!(
                self.output,
                "Input truncated to {} characters.",
                MAX_DRAFT_CHARS
            )?;
        }
        Ok(())
    }

    /// Dispatch the finished draft. Returns the turn outcome for chat input
    /// and `None` for slash commands.
    async fn handle_input(&mut self) -> Result<Option<TurnOutcome>> {
        let command = self.controller.session().draft_input.trim().to_string();

        match command.as_str() {
            "/help" => {
                self.controller.clear_draft();
                writeln!(self.output, "{}", HELP_TEXT)?;
            }
            "/clear" => {
                self.controller.clear_draft();
                if self.controller.reset() {
                    writeln!(self.output, "Conversation cleared.")?;
                    self.print_transcript()?;
                } else {
                    writeln!(self.output, "{}", placeholder(true))?;
                }
            }
            "/transcript" => {
                self.controller.clear_draft();
                self.print_transcript()?;
            }
            _ => return self.process_chat_input().await.map(Some),
        }

        Ok(None)
    }

    async fn process_chat_input(&mut self) -> Result<TurnOutcome> {
        let session = self.controller.session();
        if !session.draft_input.trim().is_empty() && !session.busy {
            writeln!(self.output, "{}", placeholder(true))?;
        }

        let outcome = self.controller.converse(self.gateway.as_ref()).await;
        debug!("Turn finished: {:?}", outcome);

        if outcome != TurnOutcome::Rejected {
            self.display_response()?;
        }

        Ok(outcome)
    }

    fn display_response(&mut self) -> Result<()> {
        if let Some(rendered) = self
            .controller
            .messages()
            .last()
            .and_then(|m| self.renderer.render_message(m))
        {
            writeln!(self.output, "\n{}\n", rendered)?;
        }
        Ok(())
    }

    fn print_transcript(&mut self) -> Result<()> {
        debug!("Rendering {} messages", self.controller.messages().len());
        let rendered = self.renderer.render_transcript(self.controller.messages());
        writeln!(self.output, "{}", rendered)?;
        Ok(())
    }
}

/// Feed one line from the editor into `draft`. A trailing backslash means the
/// draft continues on the next line; returns `true` once the draft is complete.
fn append_line(draft: &mut String, line: &str) -> bool {
    match line.strip_suffix('\\') {
        Some(head) => {
            draft.push_str(head);
            draft.push('\n');
            false
        }
        None => {
            draft.push_str(line);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};

    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    use super::controller::tests::FakeGateway;
    use super::controller::ERROR_TEXT;
    use super::instructions::INSTRUCTIONS;
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn context(bodies: &[&'static str]) -> (ChatContext, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let context = ChatContext::new(
            Box::new(buffer.clone()),
            None,
            false,
            Box::new(FakeGateway::replying(bodies)),
            MarkdownRenderer::new(false),
        );
        (context, buffer)
    }

    /// Compose `text` and dispatch it the way the prompt loop does.
    async fn send(chat: &mut ChatContext, text: &str) -> Option<TurnOutcome> {
        chat.compose(text).unwrap();
        chat.handle_input().await.unwrap()
    }

    #[tokio::test]
    async fn prints_answer_but_not_the_user_message() {
        let (mut chat, buffer) = context(&[r#"{"result":{"content":"**Task 1.1**: Outline"}}"#]);

        let outcome = send(&mut chat, "Write a 5-paragraph essay.").await;

        assert_eq!(outcome, Some(TurnOutcome::Answered));
        assert_eq!(chat.controller.messages().len(), 3);
        let out = buffer.contents();
        assert!(out.contains("Task 1.1: Outline"));
        assert!(!out.contains(INSTRUCTIONS));
    }

    #[tokio::test]
    async fn failure_prints_apology() {
        let (mut chat, buffer) = context(&["{}"]);

        let outcome = send(&mut chat, "Write a 5-paragraph essay.").await;

        assert_eq!(outcome, Some(TurnOutcome::Failed));
        assert!(buffer.contents().contains(ERROR_TEXT));
        assert!(!chat.controller.is_busy());
        assert!(chat.controller.session().draft_input.is_empty());
    }

    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failure_logs_nothing_at_info() {
        let logs = LogCapture::default();
        let writer = logs.clone();
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (mut chat, buffer) = context(&["{}"]);
        let outcome = send(&mut chat, "Write a 5-paragraph essay.").await;

        assert_eq!(outcome, Some(TurnOutcome::Failed));
        assert!(buffer.contents().contains(ERROR_TEXT));
        assert!(logs.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn commands_do_not_reach_the_gateway() {
        let (mut chat, buffer) = context(&[r#"{"result":{"content":"one"}}"#]);
        send(&mut chat, "essay").await;

        assert_eq!(send(&mut chat, "/transcript").await, None);
        assert!(buffer.contents().contains("Hi there! How can I help?\n\none"));

        assert_eq!(send(&mut chat, "/clear").await, None);
        assert_eq!(chat.controller.messages().len(), 1);
        assert!(buffer.contents().contains("Conversation cleared."));

        assert_eq!(send(&mut chat, " /help ").await, None);
        assert!(buffer.contents().contains("/transcript"));
        assert!(chat.controller.session().draft_input.is_empty());
    }

    #[tokio::test]
    async fn oversized_input_is_truncated_before_sending() {
        let (mut chat, buffer) = context(&[r#"{"result":{"content":"ok"}}"#]);
        let long = "a".repeat(MAX_DRAFT_CHARS + 1);

        send(&mut chat, &long).await;

        assert!(buffer.contents().contains("Input truncated"));
        let sent = &chat.controller.messages()[1].content;
        assert_eq!(sent.len(), INSTRUCTIONS.len() + MAX_DRAFT_CHARS);
    }

    fn single_query(input: &str, body: &'static str) -> (ChatContext, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let chat = ChatContext::new(
            Box::new(buffer.clone()),
            Some(input.to_string()),
            false,
            Box::new(FakeGateway::replying(&[body])),
            MarkdownRenderer::new(false),
        );
        (chat, buffer)
    }

    #[tokio::test]
    async fn single_query_mode_reports_failure() {
        let (mut chat, buffer) = single_query("essay", "not json");

        let code = chat.run().await.unwrap();

        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::FAILURE));
        assert!(buffer.contents().contains(ERROR_TEXT));
    }

    #[tokio::test]
    async fn single_query_sends_slash_text_as_a_question() {
        let (mut chat, buffer) = single_query("/help", r#"{"result":{"content":"Task 1.1"}}"#);

        let code = chat.run().await.unwrap();

        assert_eq!(format!("{:?}", code), format!("{:?}", ExitCode::SUCCESS));
        assert_eq!(chat.controller.messages().len(), 3);
        assert!(chat.controller.messages()[1].content.ends_with("/help"));
        let out = buffer.contents();
        assert!(out.contains("Task 1.1"));
        assert!(!out.contains("Show this help dialogue"));
    }

    #[test]
    fn trailing_backslash_continues_the_draft() {
        let mut draft = String::new();
        assert!(!append_line(&mut draft, "Write an essay\\"));
        assert!(append_line(&mut draft, "with 5 paragraphs"));
        assert_eq!(draft, "Write an essay\nwith 5 paragraphs");
    }
}
