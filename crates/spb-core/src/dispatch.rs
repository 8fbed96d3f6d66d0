//! Command / callback routing.
//!
//! The set of routes is closed (`Command` + `Action`). A `HandlerTable` maps
//! each route to one handler and is checked for completeness when the
//! dispatcher is built, so a forgotten registration fails at startup instead
//! of silently dropping updates.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    content,
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{OutgoingMessage, Update, UpdateKind},
    },
    pipeline::{Endpoint, Outcome, UpdateContext},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Tiers,
    Price,
    Supply,
    Phase,
    Mint,
    Help,
}

impl Command {
    pub const ALL: [Command; 7] = [
        Command::Start,
        Command::Tiers,
        Command::Price,
        Command::Supply,
        Command::Phase,
        Command::Mint,
        Command::Help,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Tiers => "tiers",
            Command::Price => "price",
            Command::Supply => "supply",
            Command::Phase => "phase",
            Command::Mint => "mint",
            Command::Help => "help",
        }
    }

    /// Short description for the client's command menu.
    pub fn description(self) -> &'static str {
        match self {
            Command::Start => "Welcome and launchpad link",
            Command::Tiers => "View all NFT tiers and benefits",
            Command::Price => "Check current pricing",
            Command::Supply => "View supply information",
            Command::Phase => "Learn about pricing phases",
            Command::Mint => "Get instructions to mint NFTs",
            Command::Help => "Show this help message",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

/// Inline-button action ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Tiers,
    Price,
    Supply,
    Phase,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Tiers, Action::Price, Action::Supply, Action::Phase];

    pub fn id(self) -> &'static str {
        match self {
            Action::Tiers => "tiers",
            Action::Price => "price",
            Action::Supply => "supply",
            Action::Phase => "phase",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.id() == id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    Command(Command),
    Action(Action),
}

impl Route {
    pub fn all() -> impl Iterator<Item = Route> {
        Command::ALL
            .into_iter()
            .map(Route::Command)
            .chain(Action::ALL.into_iter().map(Route::Action))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Command(c) => write!(f, "/{}", c.name()),
            Route::Action(a) => write!(f, "callback:{}", a.id()),
        }
    }
}

/// A parsed `/name[@bot]` command. Trailing arguments are accepted and dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub mention: Option<String>,
}

pub fn parse_command(text: &str) -> Option<ParsedCommand> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    // Telegram may send `/cmd@botname arg1 ...`
    let first = text.split(char::is_whitespace).next().unwrap_or("");

    let (name, mention) = match first[1..].split_once('@') {
        Some((name, bot)) => (name, Some(bot.to_string())),
        None => (&first[1..], None),
    };
    if name.is_empty() {
        return None;
    }

    Some(ParsedCommand {
        name: name.to_lowercase(),
        mention,
    })
}

/// Map an update to its route, if any.
pub fn resolve(update: &Update, bot_username: Option<&str>) -> Option<Route> {
    match &update.kind {
        UpdateKind::Message { text: Some(text) } => {
            let cmd = parse_command(text)?;
            if let (Some(mention), Some(me)) = (cmd.mention.as_deref(), bot_username) {
                if !mention.eq_ignore_ascii_case(me) {
                    return None;
                }
            }
            Command::from_name(&cmd.name).map(Route::Command)
        }
        UpdateKind::Callback {
            data: Some(data), ..
        } => Action::from_id(data).map(Route::Action),
        _ => None,
    }
}

pub struct HandlerContext<'a> {
    pub update: &'a Update,
    pub route: Route,
    pub messenger: &'a dyn MessagingPort,
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// Reply to the update. Failures are returned, not reported to the user;
    /// the recovery stage owns user-facing error notices.
    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<()>;
}

/// Sends one composed reply. Callback presses are acknowledged first so the
/// client drops its loading indicator regardless of how long the reply takes.
pub struct ReplyHandler {
    launchpad_url: Url,
    compose: fn(&Url) -> OutgoingMessage,
}

impl ReplyHandler {
    pub fn new(launchpad_url: Url, compose: fn(&Url) -> OutgoingMessage) -> Self {
        Self {
            launchpad_url,
            compose,
        }
    }
}

#[async_trait]
impl Handler for ReplyHandler {
    async fn handle(&self, ctx: HandlerContext<'_>) -> Result<()> {
        if let Some(callback_id) = ctx.update.callback_id() {
            ctx.messenger.answer_callback_query(callback_id, None).await?;
        }

        let chat_id = ctx
            .update
            .chat_id()
            .ok_or_else(|| Error::Handler(format!("{}: update has no chat", ctx.route)))?;

        let reply = (self.compose)(&self.launchpad_url);
        ctx.messenger.send_message(chat_id, &reply).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct HandlerTable {
    handlers: HashMap<Route, Arc<dyn Handler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command and action of the launchpad bot.
    pub fn launchpad(launchpad_url: &Url) -> Self {
        let reply = |compose: fn(&Url) -> OutgoingMessage| -> Arc<dyn Handler> {
            Arc::new(ReplyHandler::new(launchpad_url.clone(), compose))
        };

        let mut table = Self::new();
        table
            .register(Route::Command(Command::Start), reply(content::welcome))
            .register(Route::Command(Command::Tiers), reply(content::tiers))
            .register(Route::Command(Command::Price), reply(content::price))
            .register(Route::Command(Command::Supply), reply(content::supply))
            .register(Route::Command(Command::Phase), reply(content::phase))
            .register(Route::Command(Command::Mint), reply(content::mint))
            .register(Route::Command(Command::Help), reply(content::help))
            .register(Route::Action(Action::Tiers), reply(content::tiers))
            .register(Route::Action(Action::Price), reply(content::price))
            .register(Route::Action(Action::Supply), reply(content::supply))
            .register(Route::Action(Action::Phase), reply(content::phase));
        table
    }

    /// Register (or replace) the handler for `route`.
    pub fn register(&mut self, route: Route, handler: Arc<dyn Handler>) -> &mut Self {
        self.handlers.insert(route, handler);
        self
    }

    pub fn get(&self, route: Route) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(&route)
    }

    pub fn ensure_complete(&self) -> Result<()> {
        let missing: Vec<String> = Route::all()
            .filter(|r| !self.handlers.contains_key(r))
            .map(|r| r.to_string())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::Config(format!(
            "no handler registered for: {}",
            missing.join(", ")
        )))
    }
}

/// Pipeline endpoint: resolves the route, runs its handler and records the
/// command log entry.
pub struct Dispatcher {
    table: HandlerTable,
    messenger: Arc<dyn MessagingPort>,
    bot_username: Option<String>,
}

impl Dispatcher {
    pub fn new(
        table: HandlerTable,
        messenger: Arc<dyn MessagingPort>,
        bot_username: Option<String>,
    ) -> Result<Self> {
        table.ensure_complete()?;
        Ok(Self {
            table,
            messenger,
            bot_username,
        })
    }
}

#[async_trait]
impl Endpoint for Dispatcher {
    async fn call(&self, ctx: &mut UpdateContext) -> Result<()> {
        let Some(route) = resolve(&ctx.update, self.bot_username.as_deref()) else {
            debug!(
                update_type = ctx.update.update_type(),
                "no handler for update"
            );
            ctx.outcome = Outcome::Ignored;
            return Ok(());
        };
        let handler = self
            .table
            .get(route)
            .ok_or_else(|| Error::Handler(format!("{route}: handler missing")))?;

        let update = &ctx.update;
        let result = handler
            .handle(HandlerContext {
                update,
                route,
                messenger: self.messenger.as_ref(),
            })
            .await;

        let user_id = update.user_id().map(|u| u.0);
        let username = update.username();
        let chat_type = update.chat_kind().map(|k| k.as_str());
        match &result {
            Ok(()) => info!(
                command = %route,
                user_id,
                username,
                chat_type,
                success = true,
                "Command: {route}"
            ),
            Err(e) => warn!(
                command = %route,
                user_id,
                username,
                chat_type,
                success = false,
                error = %e,
                "Command: {route}"
            ),
        }

        result?;
        ctx.outcome = Outcome::Handled(route);
        Ok(())
    }
}
