use std::error::Error;

use log::debug;
use serde::Serialize;
use serde_json::json;
use tubesync::controller::SubscriptionContext;
use tubesync::model::UserSummary;
use tubesync::{AppContext, Session, SessionAction};

use super::parser::{Args, Command, SessionCommand};

fn init_logger(filters: &str) {
    env_logger::Builder::new().parse_filters(filters).format_timestamp_millis().init();
}

fn print<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn redacted(session: &Session) -> serde_json::Value {
    json!({
        "user": session.user,
        "loggedIn": session.logged_in,
        "accessToken": session.access_token.as_ref().map(|_| "<set>"),
    })
}

pub async fn handle_command(args: Args) -> Result<(), Box<dyn Error>> {
    let config = args.resolve_config()?;
    init_logger(&config.log_level);
    debug!("resolved config: {config:?}");

    let ctx = AppContext::connect(&config)?;

    match args.command {
        Command::Comments { video, replies } => {
            let thread = ctx.comment_thread(video);
            thread.mount().await?;
            if let Some(parent) = replies {
                thread.load_replies(&parent).await?;
            }
            print(&thread.view())
        }
        Command::Comment { video, text } => {
            let thread = ctx.comment_thread(video);
            thread.mount().await?;
            thread.post(&text).await?;
            print(&thread.view())
        }
        Command::Reply { comment, text } => {
            let thread = ctx.comment_thread(String::new());
            thread.add_reply(&comment, &text).await?;
            print(&thread.replies(&comment).view())
        }
        Command::Tweets { user } => {
            let feed = ctx.tweet_feed(user);
            feed.mount().await?;
            print(&feed.view())
        }
        Command::Tweet { user, text } => {
            let feed = ctx.tweet_feed(user);
            feed.mount().await?;
            feed.post(&text).await?;
            print(&feed.view())
        }
        Command::Subscribers { channel } => {
            let list = ctx.subscription_list(channel, SubscriptionContext::Subscribers);
            list.mount().await?;
            print(&list.view())
        }
        Command::Subscribed { channel } => {
            let list = ctx.subscription_list(channel, SubscriptionContext::SubscribedTo);
            list.mount().await?;
            print(&list.view())
        }
        Command::Toggle { channel, user, from } => {
            let subscribers = ctx.subscription_list(channel.clone(), SubscriptionContext::Subscribers);
            let subscribed = ctx.subscription_list(channel, SubscriptionContext::SubscribedTo);
            subscribers.mount().await?;
            subscribed.mount().await?;
            let target = match SubscriptionContext::from(from) {
                SubscriptionContext::Subscribers => &subscribers,
                SubscriptionContext::SubscribedTo => &subscribed,
            };
            let state = target.toggle(&user).await?;
            print(&json!({
                "user": user,
                "subscribed": state,
                "subscribers": subscribers.view(),
                "subscribedTo": subscribed.view(),
            }))
        }
        Command::Playlists { user } => {
            let library = ctx.playlist_library(user);
            library.mount().await?;
            print(&library.view())
        }
        Command::Playlist { id } => {
            let videos = ctx.playlist_videos(id);
            videos.mount().await?;
            print(&videos.view())
        }
        Command::Session { action } => {
            let session = ctx.session();
            match action {
                SessionCommand::Show => {}
                SessionCommand::Set { token, user_id, username } => {
                    if let Some(token) = token {
                        session.dispatch(SessionAction::SetToken(Some(token)))?;
                    }
                    if let Some(id) = user_id {
                        let user = UserSummary { username: username.unwrap_or_default(), ..UserSummary::from_id(id) };
                        session.dispatch(SessionAction::SetUserDetails(Some(user)))?;
                    }
                    session.dispatch(SessionAction::SetLoggedIn(true))?;
                }
                SessionCommand::Clear => ctx.logout()?,
            }
            print(&redacted(&session.current()))
        }
    }
}
