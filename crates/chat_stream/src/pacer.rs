//! Typewriter pacing of streamed text.
//!
//! Arriving text goes into a buffer; a fixed-rate typing tick reveals up to
//! `chars_per_tick` characters at a time and a slower render tick hands the
//! revealed text to the renderer only when it changed. The pacer holds no
//! timers itself; the owner drives both ticks (see [`crate::timers`]).

use chat_core::PacerConfig;

use crate::error::PacerError;

/// Result of one typing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTick {
    /// Nothing to reveal (buffer empty and more input may come, or stopped).
    Idle,
    /// More characters became visible.
    Advanced,
    /// Input is finished and everything has been revealed. Reported once; the
    /// caller makes the final push of [`TypewriterPacer::visible`].
    Drained,
}

#[derive(Debug, Clone)]
pub struct TypewriterPacer {
    chars_per_tick: usize,
    /// Everything appended so far. The visible text is `received[..shown]`,
    /// so it is always a prefix of the input.
    received: String,
    shown: usize,
    finished: bool,
    stopped: bool,
    drained: bool,
    dirty: bool,
}

impl TypewriterPacer {
    pub fn new(config: &PacerConfig) -> Self {
        Self::with_chars_per_tick(config.chars_per_tick())
    }

    pub fn with_chars_per_tick(chars_per_tick: usize) -> Self {
        Self {
            chars_per_tick: chars_per_tick.max(1),
            received: String::new(),
            shown: 0,
            finished: false,
            stopped: false,
            drained: false,
            dirty: false,
        }
    }

    /// Buffer more text. Rejected once `finish()` or `cancel()` was called.
    pub fn append(&mut self, text: &str) -> Result<(), PacerError> {
        if self.stopped {
            return Err(PacerError::Cancelled);
        }
        if self.finished {
            return Err(PacerError::AppendAfterFinish);
        }
        self.received.push_str(text);
        Ok(())
    }

    /// No more input will arrive; the pacer drains what it has.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Stop immediately and drop unrevealed text. Returns the visible text,
    /// which stays as the final result.
    pub fn cancel(&mut self) -> String {
        self.stopped = true;
        self.received.truncate(self.shown);
        self.dirty = false;
        self.visible().to_string()
    }

    pub fn type_tick(&mut self) -> TypeTick {
        if self.stopped || self.drained {
            return TypeTick::Idle;
        }
        if self.shown < self.received.len() {
            let rest = &self.received[self.shown..];
            let step = rest
                .char_indices()
                .nth(self.chars_per_tick)
                .map_or(rest.len(), |(offset, _)| offset);
            self.shown += step;
            self.dirty = true;
            return TypeTick::Advanced;
        }
        if self.finished {
            self.drained = true;
            self.dirty = false;
            return TypeTick::Drained;
        }
        TypeTick::Idle
    }

    /// Visible text if it changed since the last render.
    pub fn render_tick(&mut self) -> Option<String> {
        if self.stopped || !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(self.visible().to_string())
    }

    pub fn visible(&self) -> &str {
        &self.received[..self.shown]
    }

    pub fn pending_len(&self) -> usize {
        self.received.len() - self.shown
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tick until drained, rendering every `render_every` typing ticks, and
    /// return every frame the sink would receive (including the final push).
    fn drain(pacer: &mut TypewriterPacer, render_every: usize) -> Vec<String> {
        let mut frames = Vec::new();
        for tick in 1.. {
            match pacer.type_tick() {
                TypeTick::Drained => {
                    frames.push(pacer.visible().to_string());
                    return frames;
                }
                TypeTick::Idle | TypeTick::Advanced => {}
            }
            if tick % render_every == 0 {
                frames.extend(pacer.render_tick());
            }
            assert!(tick < 100_000, "pacer never drained");
        }
        unreachable!()
    }

    #[test]
    fn delivers_everything_in_order_as_growing_prefixes() {
        let parts = ["Hel", "lo, ", "wörld ", "🎉🎉", "", " tail"];
        let expected: String = parts.concat();

        let mut pacer = TypewriterPacer::with_chars_per_tick(2);
        for part in parts {
            pacer.append(part).unwrap();
        }
        pacer.finish();

        let frames = drain(&mut pacer, 3);
        assert_eq!(frames.last().unwrap(), &expected);
        for pair in frames.windows(2) {
            assert!(pair[0].len() <= pair[1].len());
        }
        for frame in &frames {
            assert!(expected.starts_with(frame.as_str()));
        }
    }

    #[test]
    fn reveals_chars_per_tick() {
        let mut pacer = TypewriterPacer::with_chars_per_tick(2);
        pacer.append("abcde").unwrap();
        assert_eq!(pacer.type_tick(), TypeTick::Advanced);
        assert_eq!(pacer.visible(), "ab");
        pacer.type_tick();
        pacer.type_tick();
        assert_eq!(pacer.visible(), "abcde");
        // not finished yet: waits for more input
        assert_eq!(pacer.type_tick(), TypeTick::Idle);
    }

    #[test]
    fn multibyte_characters_are_never_split() {
        let mut pacer = TypewriterPacer::with_chars_per_tick(1);
        pacer.append("ñé").unwrap();
        pacer.type_tick();
        assert_eq!(pacer.visible(), "ñ");
    }

    #[test]
    fn render_tick_only_pushes_changes() {
        let mut pacer = TypewriterPacer::with_chars_per_tick(4);
        assert_eq!(pacer.render_tick(), None);
        pacer.append("abc").unwrap();
        pacer.type_tick();
        assert_eq!(pacer.render_tick().as_deref(), Some("abc"));
        assert_eq!(pacer.render_tick(), None);
    }

    #[test]
    fn drained_is_reported_once() {
        let mut pacer = TypewriterPacer::with_chars_per_tick(10);
        pacer.append("x").unwrap();
        pacer.finish();
        assert_eq!(pacer.type_tick(), TypeTick::Advanced);
        assert_eq!(pacer.type_tick(), TypeTick::Drained);
        assert_eq!(pacer.type_tick(), TypeTick::Idle);
        assert!(pacer.is_drained());
    }

    #[test]
    fn append_after_finish_is_rejected() {
        let mut pacer = TypewriterPacer::with_chars_per_tick(1);
        pacer.append("a").unwrap();
        pacer.finish();
        assert_eq!(pacer.append("b"), Err(PacerError::AppendAfterFinish));
        assert_eq!(drain(&mut pacer, 1).last().unwrap(), "a");
    }

    #[test]
    fn cancel_keeps_visible_and_drops_pending() {
        let mut pacer = TypewriterPacer::with_chars_per_tick(2);
        pacer.append("abcdef").unwrap();
        pacer.type_tick();

        assert_eq!(pacer.cancel(), "ab");
        assert_eq!(pacer.pending_len(), 0);
        assert_eq!(pacer.type_tick(), TypeTick::Idle);
        assert_eq!(pacer.render_tick(), None);
        assert_eq!(pacer.append("more"), Err(PacerError::Cancelled));
    }

    #[test]
    fn config_drives_rate() {
        let pacer = TypewriterPacer::new(&PacerConfig::default());
        assert_eq!(pacer.chars_per_tick, 2);
    }
}
