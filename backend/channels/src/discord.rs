use async_trait::async_trait;
use chrono::Utc;
use serenity::all::{ChannelId, Client, Context, EventHandler, GatewayIntents, Guild, GuildId, Member, Ready, VoiceState};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use voxledger_core::{PresenceEvent, Presentation};

use crate::reconnect::{run_with_reconnect, ReconnectPolicy};
use crate::PresenceSource;

struct Handler {
    sink: mpsc::Sender<PresenceEvent>,
    guild_filter: Option<u64>,
}

impl Handler {
    async fn emit(&self, event: PresenceEvent) {
        debug!(
            subject = %event.subject_id,
            change = ?event.change(),
            "Voice state observed"
        );
        if self.sink.send(event).await.is_err() {
            warn!("Presence sink closed, dropping voice event");
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn voice_state_update(&self, _ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if !accepts_guild(self.guild_filter, new.guild_id) {
            return;
        }
        let previous = old.as_ref().and_then(|s| channel_key(s.channel_id));
        let next = channel_key(new.channel_id);
        let event = PresenceEvent::new(
            new.user_id.to_string(),
            previous.as_deref(),
            next.as_deref(),
            Utc::now(),
        )
        .with_presentation(member_presentation(new.member.as_ref()));
        self.emit(event).await;
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        if !accepts_guild(self.guild_filter, Some(guild.id)) {
            return;
        }
        let now = Utc::now();
        let mut joined = 0;
        for (user_id, state) in &guild.voice_states {
            let Some(channel) = channel_key(state.channel_id) else {
                continue;
            };
            let member = state.member.as_ref().or_else(|| guild.members.get(user_id));
            let event = PresenceEvent::new(user_id.to_string(), None, Some(&channel), now)
                .with_presentation(member_presentation(member));
            self.emit(event).await;
            joined += 1;
        }
        info!(guild = %guild.name, in_voice = joined, "Guild available, tracking members already in voice");
    }

    async fn ready(&self, _: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "Discord connected");
    }
}

/// Discord voice presence via the serenity gateway client.
pub struct DiscordSource {
    token: String,
    guild_filter: Option<u64>,
    reconnect: ReconnectPolicy,
}

impl DiscordSource {
    pub fn new(token: String) -> Self {
        Self {
            token,
            guild_filter: None,
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Only report voice activity from this guild.
    pub fn with_guild(mut self, guild_id: Option<u64>) -> Self {
        self.guild_filter = guild_id;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    async fn connect(&self, sink: mpsc::Sender<PresenceEvent>) -> anyhow::Result<()> {
        let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
        let mut client = Client::builder(&self.token, intents)
            .event_handler(Handler {
                sink,
                guild_filter: self.guild_filter,
            })
            .await?;

        if let Err(why) = client.start().await {
            error!("Discord client error: {:?}", why);
            anyhow::bail!("Discord client error: {:?}", why);
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceSource for DiscordSource {
    fn name(&self) -> &str {
        "discord"
    }

    async fn start(&self, sink: mpsc::Sender<PresenceEvent>) -> anyhow::Result<()> {
        info!(guild = ?self.guild_filter, "Starting Discord presence source");
        run_with_reconnect(self.name(), &self.reconnect, || self.connect(sink.clone())).await
    }
}

fn accepts_guild(filter: Option<u64>, guild: Option<GuildId>) -> bool {
    match filter {
        None => true,
        Some(wanted) => guild.map(|g| g.get()) == Some(wanted),
    }
}

fn channel_key(channel: Option<ChannelId>) -> Option<String> {
    channel.map(|c| c.get().to_string())
}

fn member_presentation(member: Option<&Member>) -> Presentation {
    match member {
        Some(m) => presentation(m.nick.as_deref(), &m.user.name, m.user.avatar_url()),
        None => Presentation::default(),
    }
}

/// Guild nickname wins over the account name.
fn presentation(nick: Option<&str>, username: &str, avatar: Option<String>) -> Presentation {
    Presentation {
        display_name: Some(nick.unwrap_or(username).to_string()),
        avatar_ref: avatar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guild_filter() {
        assert!(accepts_guild(None, None));
        assert!(accepts_guild(None, Some(GuildId::new(7))));
        assert!(accepts_guild(Some(7), Some(GuildId::new(7))));
        assert!(!accepts_guild(Some(7), Some(GuildId::new(8))));
        assert!(!accepts_guild(Some(7), None));
    }

    #[test]
    fn test_channel_key() {
        assert_eq!(channel_key(Some(ChannelId::new(99))), Some("99".to_string()));
        assert_eq!(channel_key(None), None);
    }

    #[test]
    fn test_presentation_prefers_nickname() {
        let p = presentation(Some("Ada"), "ada_l", Some("https://cdn/a.png".into()));
        assert_eq!(p.display_name.as_deref(), Some("Ada"));
        assert_eq!(p.avatar_ref.as_deref(), Some("https://cdn/a.png"));

        let p = presentation(None, "ada_l", None);
        assert_eq!(p.display_name.as_deref(), Some("ada_l"));
        assert!(p.avatar_ref.is_none());
    }

    #[test]
    fn test_missing_member_gives_empty_presentation() {
        assert!(member_presentation(None).is_empty());
    }
}
