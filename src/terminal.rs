// ABOUTME: Synchronous terminal chat front-end reading stdin and writing stdout.
// ABOUTME: Every client call runs on one lazily started bridge worker so the live transport keeps running between prompts.

use anyhow::Result;
use pinion_client::{ClientConfig, ClientError, ClientRegistry, ConversationClient};
use pinion_core::conversation::{Conversation, HandoffStatus, TurnOutcome};
use pinion_core::session_registry::seed_greeting;
use pinion_core::text::describe_wait;
use pinion_core::{LazyBridge, UpdatePoller};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

const KEY_SECRET_ATTEMPTS: usize = 3;

/// Why the chat loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The user typed /end
    Ended,
    /// Input closed
    Eof,
    /// No agent could be loaded
    NoAgent,
}

pub struct Terminal<R, W> {
    input: R,
    output: W,
    bridge: LazyBridge,
    clients: Arc<ClientRegistry>,
    poller: UpdatePoller,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(
        input: R,
        output: W,
        clients: Arc<ClientRegistry>,
        poller: UpdatePoller,
    ) -> Self {
        Self {
            input,
            output,
            bridge: LazyBridge::new("terminal"),
            clients,
            poller,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Worker every client call runs on; started by the first call
    pub fn bridge(&self) -> &LazyBridge {
        &self.bridge
    }

    /// Load an agent and chat until /end or end of input
    pub fn run(&mut self, config: &ClientConfig) -> Result<ExitReason> {
        match self.bootstrap(config)? {
            Some(client) => self.chat(client),
            None => Ok(ExitReason::NoAgent),
        }
    }

    /// Create the client: agent file flag first, then credentials, then ask
    /// the user for an agent file path.
    pub fn bootstrap(&mut self, config: &ClientConfig) -> Result<Option<Arc<dyn ConversationClient>>> {
        if let Some(path) = config.aia_file.clone() {
            writeln!(self.output, "Loading agent from file: {}", path.display())?;
            if let Some(client) = self.load_agent_file(&path, config)? {
                return Ok(Some(client));
            }
        }

        if config.has_credentials() {
            let mut credentials = config.clone();
            credentials.aia_file = None;
            match self.create(credentials) {
                Ok(client) => return Ok(Some(client)),
                Err(e) => writeln!(
                    self.output,
                    "Failed to initialize client from configuration: {:#}",
                    e
                )?,
            }
        } else {
            writeln!(
                self.output,
                "Credentials (agent_id, host_url, client_id, client_secret) not found."
            )?;
        }

        self.prompt("Enter path to .aia file to load the agent (or leave empty to abort): ")?;
        match self.read_line()? {
            Some(path) if !path.trim().is_empty() => {
                self.load_agent_file(Path::new(path.trim()), config)
            }
            _ => {
                writeln!(self.output, "No .aia file provided. Exiting.")?;
                Ok(None)
            }
        }
    }

    /// Load an agent file, asking for the key secret if it is private
    pub fn load_agent_file(
        &mut self,
        path: &Path,
        config: &ClientConfig,
    ) -> Result<Option<Arc<dyn ConversationClient>>> {
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                writeln!(self.output, "Error: File not found at '{}'", path.display())?;
                return Ok(None);
            }
            Err(e) => {
                writeln!(self.output, "Could not read agent file: {}", e)?;
                return Ok(None);
            }
        };

        match self.create(config.with_agent_source(source.clone(), None)) {
            Ok(client) => return Ok(Some(client)),
            Err(e) if ClientError::is_key_secret_required(&e) => {
                writeln!(self.output, "This AIA file requires a key_secret to decrypt.")?;
            }
            Err(e) => {
                writeln!(self.output, "Could not create agent from file: {}", e)?;
                return Ok(None);
            }
        }

        for _ in 0..KEY_SECRET_ATTEMPTS {
            self.prompt("Enter key_secret: ")?;
            let secret = match self.read_line()? {
                Some(secret) => secret.trim().to_string(),
                None => break,
            };
            if secret.is_empty() {
                writeln!(self.output, "No key_secret entered; try again.")?;
                continue;
            }
            match self.create(config.with_agent_source(source.clone(), Some(secret))) {
                Ok(client) => return Ok(Some(client)),
                Err(e) => writeln!(self.output, "Failed to load agent: {}", e)?,
            }
        }

        writeln!(self.output, "Exceeded key_secret attempts. Aborting.")?;
        Ok(None)
    }

    /// Chat with `client` until /end or end of input
    pub fn chat(&mut self, client: Arc<dyn ConversationClient>) -> Result<ExitReason> {
        let vars = client.agent_vars();
        writeln!(
            self.output,
            "{} PinionAI Terminal Chat",
            vars.title.as_deref().unwrap_or("Agent")
        )?;
        if let Some(subtitle) = vars.subtitle.as_deref() {
            writeln!(self.output, "{}", subtitle)?;
        }
        writeln!(self.output, "Type your message and press Enter. Use /end to quit.")?;

        seed_greeting(client.as_ref());
        let conversation = Conversation::new(client, self.poller.clone());
        let mut shown = self.show_messages(&conversation, 0, usize::MAX)?;

        loop {
            self.prompt("You: ")?;
            let Some(line) = self.read_line()? else {
                writeln!(self.output, "EOF received, exiting.")?;
                self.close(&conversation)?;
                return Ok(ExitReason::Eof);
            };
            let text = line.trim();
            if text.is_empty() {
                continue;
            }

            match text.to_lowercase().as_str() {
                "/end" => {
                    let ending = conversation.clone();
                    if let Err(e) = self.bridge.run_blocking(async move { ending.end().await }) {
                        tracing::warn!(error = %e, "Failed to end live session");
                    }
                    writeln!(self.output, "Chat ended.")?;
                    self.close(&conversation)?;
                    return Ok(ExitReason::Ended);
                }
                "/continue" => {
                    writeln!(self.output, "Continuing / refreshing...")?;
                    let updated = self.poller.poll_client_blocking(
                        self.bridge.get()?,
                        Arc::clone(conversation.client()),
                        self.poller.config().continue_wait(),
                    )?;
                    if updated {
                        shown = self.show_messages(&conversation, shown, usize::MAX)?;
                    }
                    continue;
                }
                _ => {}
            }

            // The user's own message lands at `before`; replies follow it
            let before = conversation.client().messages().len();
            let turn = {
                let conversation = conversation.clone();
                let text = text.to_string();
                self.bridge
                    .run_blocking(async move { conversation.send(&text).await })
            };

            match turn {
                Ok(outcome) => self.show_outcome(&conversation, before + 1, outcome)?,
                Err(e) => {
                    tracing::error!(error = %e, "Agent turn failed");
                    writeln!(self.output, "Agent Error: {:#}", e)?;
                }
            }
            shown = conversation.client().messages().len();
        }
    }

    fn show_outcome(
        &mut self,
        conversation: &Conversation,
        from: usize,
        outcome: TurnOutcome,
    ) -> Result<()> {
        let timed_out = format!(
            "No new messages in the last {}. Type /continue or /end.",
            describe_wait(self.poller.config().live_wait())
        );

        match outcome {
            TurnOutcome::Replied { replies, handoff } => {
                let after_replies = self.show_messages(conversation, from, replies.len())?;
                match handoff {
                    None => {}
                    Some(HandoffStatus::Unavailable) => writeln!(
                        self.output,
                        "Could not connect to live agent service for transfer."
                    )?,
                    Some(status) => {
                        writeln!(
                            self.output,
                            "Transfer to live agent initiated... Waiting for agent to connect."
                        )?;
                        self.show_messages(conversation, after_replies, usize::MAX)?;
                        if status == HandoffStatus::TimedOut {
                            writeln!(self.output, "{}", timed_out)?;
                        }
                    }
                }
            }
            TurnOutcome::Live(HandoffStatus::Updated) => {
                self.show_messages(conversation, from, usize::MAX)?;
            }
            TurnOutcome::Live(HandoffStatus::TimedOut) => {
                writeln!(self.output, "{}", timed_out)?;
            }
            TurnOutcome::Live(HandoffStatus::Unavailable) => {
                writeln!(self.output, "Could not connect to live agent service.")?;
            }
        }
        Ok(())
    }

    /// Print up to `limit` history entries starting at `from`; returns the
    /// index after the last one printed.
    fn show_messages(
        &mut self,
        conversation: &Conversation,
        from: usize,
        limit: usize,
    ) -> Result<usize> {
        let messages = conversation.client().messages();
        let mut next = from;
        for message in messages.iter().skip(from).take(limit) {
            writeln!(self.output, "{}: {}", message.role.label(), message.content)?;
            next += 1;
        }
        Ok(next)
    }

    fn close(&mut self, conversation: &Conversation) -> Result<()> {
        let client = Arc::clone(conversation.client());
        if let Err(e) = self.bridge.run_blocking(async move { client.close().await }) {
            writeln!(self.output, "Warning: Error closing client: {}", e)?;
        }
        Ok(())
    }

    fn create(&self, config: ClientConfig) -> Result<Arc<dyn ConversationClient>> {
        let clients = Arc::clone(&self.clients);
        self.bridge
            .run_blocking(async move { clients.create(&config).await })
    }

    fn prompt(&mut self, text: &str) -> Result<()> {
        write!(self.output, "{}", text)?;
        self.output.flush()?;
        Ok(())
    }

    /// Next input line without its newline, or `None` at end of input
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
