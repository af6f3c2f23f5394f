use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tubesync::config::{ClientConfig, ConfigError};
use tubesync::controller::SubscriptionContext;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and mutate video platform lists through the tubesync controllers", long_about = None)]
pub struct Args {
    /// TOML config file. Values there are overridden by TUBESYNC_* variables, then by flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// REST API base, e.g. <http://localhost:8000/api/v1>
    #[arg(long)]
    pub base_url: Option<String>,

    /// Where the signed-in session is persisted between runs
    #[arg(long)]
    pub session: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Tweets fetched per feed
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Logging level for all subsystems {off, error, warn, info, debug, trace}
    ///  -- You may also specify `<subsystem>=<level>,<subsystem2>=<level>,...` to set the log level for individual subsystems
    #[arg(long = "loglevel")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the comments of a video, optionally with the replies of one comment
    Comments {
        video: String,
        #[arg(long)]
        replies: Option<String>,
    },
    /// Post a comment on a video
    Comment { video: String, text: String },
    /// Reply to a comment
    Reply { comment: String, text: String },
    /// Show a user's tweets
    Tweets { user: String },
    /// Post a tweet to the signed-in user's feed
    Tweet { user: String, text: String },
    /// Show who subscribes to a channel
    Subscribers { channel: String },
    /// Show which channels a channel subscribes to
    Subscribed { channel: String },
    /// Toggle the subscription to a user listed for a channel
    Toggle {
        channel: String,
        user: String,
        #[arg(long, value_enum, default_value_t = ListArg::Subscribers)]
        from: ListArg,
    },
    /// Show a user's playlists
    Playlists { user: String },
    /// Show the videos of one playlist
    Playlist { id: String },
    /// Inspect or edit the persisted session
    Session {
        #[command(subcommand)]
        action: SessionCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    Show,
    /// Store credentials obtained from the login page
    Set {
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    Clear,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ListArg {
    Subscribers,
    Subscribed,
}

impl From<ListArg> for SubscriptionContext {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::Subscribers => SubscriptionContext::Subscribers,
            ListArg::Subscribed => SubscriptionContext::SubscribedTo,
        }
    }
}

impl Args {
    /// Config file (or defaults), then environment, then flags.
    pub fn resolve_config(&self) -> Result<ClientConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        let config = self.merge_into_config(base.with_env()?);
        config.validate()?;
        Ok(config)
    }

    pub fn merge_into_config(&self, mut cfg: ClientConfig) -> ClientConfig {
        if let Some(v) = &self.base_url {
            cfg.base_url = v.clone();
        }
        if let Some(v) = &self.session {
            cfg.session_path = Some(v.clone());
        }
        if let Some(v) = self.timeout_secs {
            cfg.request_timeout_secs = v;
        }
        if let Some(v) = self.page_size {
            cfg.tweet_page_size = v;
        }
        if let Some(v) = &self.log_level {
            cfg.log_level = v.clone();
        }
        cfg
    }
}
