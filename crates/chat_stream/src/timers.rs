//! Per-turn pacing clocks.

use std::time::Duration;

use chat_core::PacerConfig;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    Type,
    Render,
}

/// The typing and render intervals of one turn. Dropping the value stops both.
#[derive(Debug)]
pub struct TurnTimers {
    typing: Interval,
    render: Interval,
}

impl TurnTimers {
    pub fn new(config: &PacerConfig) -> Self {
        Self {
            typing: clock(config.tick_interval_ms),
            render: clock(config.render_interval_ms),
        }
    }

    /// Wait for the next tick. Typing wins when both are due.
    pub async fn next(&mut self) -> TimerTick {
        tokio::select! {
            biased;
            _ = self.typing.tick() => TimerTick::Type,
            _ = self.render.tick() => TimerTick::Render,
        }
    }
}

fn clock(period_ms: u64) -> Interval {
    let period = Duration::from_millis(period_ms.max(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn typing_ticks_outpace_render_ticks() {
        let config = PacerConfig {
            chars_per_second: 100,
            tick_interval_ms: 10,
            render_interval_ms: 30,
        };
        let mut timers = TurnTimers::new(&config);

        let mut ticks = Vec::new();
        for _ in 0..4 {
            ticks.push(timers.next().await);
        }
        assert_eq!(
            ticks,
            vec![TimerTick::Type, TimerTick::Type, TimerTick::Type, TimerTick::Render]
        );
    }
}
