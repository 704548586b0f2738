//! Who may control a guild's player.
//!
//! Both checks are pure functions over a snapshot of voice membership, so the
//! commands gather the data from the cache and the rules stay testable.

use serenity::model::id::{ChannelId, UserId};

use super::music_manager::{MusicError, MusicResult};
use super::music_player::PlayerSnapshot;

/// A guild member as far as the permission checks care.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceMember {
    pub user_id: UserId,
    pub is_bot: bool,
    pub can_manage_channels: bool,
}

/// Any human with Manage Channels in the given member list.
fn moderator_present(members: &[VoiceMember]) -> bool {
    members.iter().any(|m| !m.is_bot && m.can_manage_channels)
}

/// Requester check used to gate skipping.
///
/// Passes when there is no player, when the actor can manage channels, when
/// no human moderator is listening in the bot's channel, or when the actor
/// queued the current track. Everything else is denied.
pub fn may_skip(
    actor: &VoiceMember,
    player: Option<&PlayerSnapshot>,
    bot_channel_members: &[VoiceMember],
) -> bool {
    let Some(player) = player else {
        return true;
    };

    if actor.can_manage_channels {
        return true;
    }

    if !moderator_present(bot_channel_members) {
        return true;
    }

    player
        .current
        .as_ref()
        .and_then(|track| track.requester_id())
        .is_some_and(|requester| requester == actor.user_id)
}

/// Guard for stopping the player: the bot must be connected, the actor must
/// be in the same channel, and if a moderator is listening the actor must be
/// one too.
pub fn may_stop(
    actor: &VoiceMember,
    actor_channel: Option<ChannelId>,
    bot_channel: Option<ChannelId>,
    bot_channel_members: &[VoiceMember],
) -> MusicResult<()> {
    let bot_channel = bot_channel.ok_or(MusicError::NotConnected)?;

    if actor_channel != Some(bot_channel) {
        return Err(MusicError::NotInBotChannel);
    }

    if moderator_present(bot_channel_members) && !actor.can_manage_channels {
        return Err(MusicError::PermissionDenied);
    }

    Ok(())
}
