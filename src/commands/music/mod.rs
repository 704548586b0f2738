pub mod nightcore;
pub mod play;
pub mod queue;
pub mod repeat;
pub mod shuffle;
pub mod skip;
pub mod stop;

pub mod audio_sources;
pub mod utils;

use poise::CreateReply;
use tracing::{info, warn};
use utils::embedded_messages;
use utils::music_manager::{ErrorCategory, MusicError};

use crate::{CommandResult, Context, Error};

fn guild_only_error() -> Error {
    Box::new(MusicError::NotInGuild)
}

/// Replies with `err`, logged by category. User mistakes are not warnings.
async fn reply_error(ctx: Context<'_>, err: MusicError) -> CommandResult {
    match err.category() {
        ErrorCategory::UserInput | ErrorCategory::Permission => {
            info!("/{} refused for {}: {}", ctx.command().name, ctx.author().name, err)
        }
        ErrorCategory::Resolution | ErrorCategory::Transport => {
            warn!("/{} failed for {}: {}", ctx.command().name, ctx.author().name, err)
        }
    }

    ctx.send(embedded_messages::music_error(&err)).await?;
    Ok(())
}

async fn reply(ctx: Context<'_>, reply: CreateReply) -> CommandResult {
    ctx.send(reply).await?;
    Ok(())
}
