//! In-memory playground driving several users against one ledger
//!
//! Script lines, one command each:
//!
//! ```text
//! as <name>                 switch user (created on first use)
//! whoami
//! publish <title> | <body>  `\n` in the body is a line break
//! like <id>
//! grant <id>
//! reveal <id>
//! likes <id>
//! list
//! ranking
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use anonpoetry_client::{ClientConfig, MockPoemLedger, PoemId, PoetryClient};
use anonpoetry_core::{Clock, PoetryError, Signer};
use anonpoetry_crypto::{LocalSigner, MockConfidentialCompute};
use anonpoetry_logging::SessionContextGuard;
use uuid::Uuid;

/// Script for the `demo` command
pub const DEMO_SCRIPT: &str = "\
# Two poets publish, a reader likes and ranks
as alice
publish Quiet Night Thought | Moonlight before my bed,\\nperhaps frost upon the ground.
publish 秋 | 枯藤老树昏鸦，小桥流水人家。
as bob
publish Untitled | Some poems are better left anonymous.
as carol
like 0
like 2
list
reveal 0
ranking
as alice
likes 0
";

const DEFAULT_USER: &str = "alice";

/// Errors parsing a script line
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Missing argument for {command}: {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },

    #[error("Invalid poem id: {0}")]
    InvalidPoemId(String),
}

/// One playground command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    As(String),
    WhoAmI,
    Publish { title: String, body: String },
    Like(PoemId),
    Grant(PoemId),
    Reveal(PoemId),
    Likes(PoemId),
    List,
    Ranking,
}

impl Action {
    /// Parse a line; `None` for blanks and comments
    pub fn parse(line: &str) -> Result<Option<Self>, ScriptError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let action = match command {
            "as" => {
                if rest.is_empty() {
                    return Err(ScriptError::MissingArgument {
                        command: "as",
                        expected: "<name>",
                    });
                }
                Action::As(rest.to_string())
            }
            "whoami" => Action::WhoAmI,
            "publish" => {
                let (title, body) = rest.split_once('|').ok_or(ScriptError::MissingArgument {
                    command: "publish",
                    expected: "<title> | <body>",
                })?;
                Action::Publish {
                    title: title.trim().to_string(),
                    body: body.trim().replace("\\n", "\n"),
                }
            }
            "like" => Action::Like(poem_id("like", rest)?),
            "grant" => Action::Grant(poem_id("grant", rest)?),
            "reveal" => Action::Reveal(poem_id("reveal", rest)?),
            "likes" => Action::Likes(poem_id("likes", rest)?),
            "list" => Action::List,
            "ranking" => Action::Ranking,
            other => return Err(ScriptError::UnknownCommand(other.to_string())),
        };
        Ok(Some(action))
    }
}

fn poem_id(command: &'static str, arg: &str) -> Result<PoemId, ScriptError> {
    if arg.is_empty() {
        return Err(ScriptError::MissingArgument {
            command,
            expected: "<id>",
        });
    }
    arg.parse()
        .map_err(|_| ScriptError::InvalidPoemId(arg.to_string()))
}

/// One named user's client and log session id
struct Session {
    client: PoetryClient,
    id: Uuid,
}

/// Shared in-memory chain plus one client session per named user
///
/// Every action runs inside the acting user's session context, so its log
/// lines carry that user's address and session id.
pub struct Playground {
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    compute: Arc<MockConfidentialCompute>,
    ledger: MockPoemLedger,
    sessions: HashMap<String, Session>,
    active: String,
}

impl Playground {
    pub fn new(config: ClientConfig, clock: Arc<dyn Clock>) -> Self {
        let compute = Arc::new(MockConfidentialCompute::with_domain(
            Arc::clone(&clock),
            config.decryption_domain(),
        ));
        let deployer = Self::signer_for("deployer");
        let ledger = MockPoemLedger::new(
            config.contract_address,
            deployer.address(),
            Arc::clone(&compute),
            Arc::clone(&clock),
        );

        Self {
            config,
            clock,
            compute,
            ledger,
            sessions: HashMap::new(),
            active: DEFAULT_USER.to_string(),
        }
    }

    /// Deterministic signer per user name
    fn signer_for(name: &str) -> LocalSigner {
        let seed = blake3::derive_key("anonpoetry playground user", name.as_bytes());
        LocalSigner::from_seed(seed)
    }

    pub fn active_user(&self) -> &str {
        &self.active
    }

    fn session(&mut self) -> &Session {
        let name = self.active.clone();
        self.sessions.entry(name).or_insert_with_key(|name| {
            let signer = Arc::new(Self::signer_for(name));
            let ledger = self.ledger.connect(signer.address());
            let id = Uuid::new_v4();
            debug!(
                user = %name,
                address = %signer.address(),
                session_id = %id,
                "Opened playground session"
            );
            let client = PoetryClient::new(
                self.config.clone(),
                Arc::new(ledger),
                self.compute.clone(),
                signer,
                Arc::clone(&self.clock),
            );
            Session { client, id }
        })
    }

    /// Run one action and describe its result as JSON
    pub async fn execute(&mut self, action: Action) -> Result<Value, PoetryError> {
        if let Action::As(name) = &action {
            self.active = name.clone();
        }
        let session = self.session();
        let client = &session.client;
        let _context = SessionContextGuard::with_session_id(&client.user(), session.id);

        let result = match action {
            Action::As(_) | Action::WhoAmI => json!({
                "address": client.user(),
                "session_id": session.id.to_string(),
            }),
            Action::Publish { title, body } => {
                let published = client.publish(&title, &body).await?;
                json!({
                    "poem_id": published.poem_id,
                    "timestamp": published.timestamp,
                    "tx_hash": published.tx_hash,
                })
            }
            Action::Like(id) => {
                client.like(id).await?;
                json!({ "liked": id })
            }
            Action::Grant(id) => {
                let grant = client.ensure_read_access(id).await?;
                json!({ "poem_id": id, "grant": format!("{:?}", grant) })
            }
            Action::Reveal(id) => json!(client.reveal(id).await?),
            Action::Likes(id) => json!({ "poem_id": id, "likes": client.reveal_likes(id).await? }),
            Action::List => json!(client.list_recent().await?),
            Action::Ranking => json!(client.ranking_recent().await?),
        };
        Ok(result)
    }
}
