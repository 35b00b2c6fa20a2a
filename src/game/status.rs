//! Status-bar text and countdown cue thresholds

use crate::config::Settings;
use crate::game::Phase;
use crate::util::time::format_clock;

/// Inputs for one status-bar render
#[derive(Debug, Clone, Copy)]
pub struct StatusContext<'a> {
    pub arena: &'a str,
    pub phase: Phase,
    pub players: usize,
    pub min_players: usize,
    pub max_players: usize,
    pub countdown: u32,
    /// `None` when the match clock is disabled
    pub clock: Option<i64>,
}

pub fn render(messages: &dyn Settings, ctx: &StatusContext<'_>) -> String {
    let arena = ("arena", ctx.arena.to_string());
    match ctx.phase {
        Phase::Waiting => messages.message(
            "actionbar-waiting",
            &[
                arena,
                ("needed", ctx.min_players.saturating_sub(ctx.players).to_string()),
                ("current", ctx.players.to_string()),
                ("max", ctx.max_players.to_string()),
            ],
        ),
        Phase::Starting => messages.message(
            "actionbar-starting",
            &[arena, ("time", ctx.countdown.to_string())],
        ),
        Phase::InGame => {
            let time = ctx.clock.map(format_clock).unwrap_or_else(|| "--:--".to_string());
            messages.message(
                "actionbar-ingame",
                &[arena, ("players", ctx.players.to_string()), ("time", time)],
            )
        }
        Phase::Ending => messages.message("actionbar-ending", &[arena]),
        Phase::Regenerating => messages.message("actionbar-regenerating", &[arena]),
        Phase::Disabled => messages.message("actionbar-disabled", &[arena]),
    }
}

/// Presentation for one countdown second
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CountdownCue {
    pub announce: bool,
    pub pitch: Option<f32>,
}

pub fn countdown_cue(seconds_left: u32) -> CountdownCue {
    let announce = seconds_left > 0 && (seconds_left <= 5 || seconds_left % 5 == 0);
    let pitch = match seconds_left {
        0 => None,
        1..=3 => Some(1.0 + (4 - seconds_left) as f32 * 0.2),
        _ if announce => Some(1.0),
        _ => None,
    };
    CountdownCue { announce, pitch }
}
