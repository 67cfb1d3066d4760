use std::time::SystemTime;

/// One key-press event as delivered by the input source.
///
/// Only the key value and the three modifier flags are consulted; anything
/// pressed together with ctrl/alt/meta is chrome, not typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl KeyPress {
    pub fn char(c: char) -> Self {
        Self {
            key: Key::Char(c),
            ctrl: false,
            alt: false,
            meta: false,
        }
    }

    pub fn named(key: Key) -> Self {
        Self {
            key,
            ctrl: false,
            alt: false,
            meta: false,
        }
    }

    pub fn has_modifier(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// Key values the session distinguishes. Named keys never match a prompt
/// character, so pressing them mid-run counts as a mistake (there is no
/// backspace correction).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Tab,
    Other,
}

impl Key {
    fn matches(&self, expected: char) -> bool {
        matches!(self, Key::Char(c) if *c == expected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    InProgress,
    Completed,
}

/// What a single call to [`Session::handle_key`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Not in progress, or a modifier was held: no state change.
    Ignored,
    /// The key matched the expected character; cursor advanced.
    Advanced,
    /// The key did not match; mistake counter incremented, cursor unchanged.
    Mistake,
    /// The last character was typed; the run is over.
    Completed(Summary),
}

/// Result record emitted once per completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub elapsed_secs: f64,
    pub mistakes: usize,
    pub wpm: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("target text must not be empty")]
    EmptyText,
}

/// Words per minute over `chars` characters, using the standard
/// five-characters-per-word convention. Zero or negative elapsed time
/// reports 0 rather than a division blowup.
pub fn wpm(chars: usize, elapsed_secs: f64) -> u32 {
    if elapsed_secs <= 0.0 {
        return 0;
    }
    ((chars as f64 / 5.0) / (elapsed_secs / 60.0)).round() as u32
}

/// One run of the trainer: owns the target text, the cursor, the mistake
/// counter, and the run timer.
///
/// Lifecycle: `start` -> (`handle_key`)* -> Completed. A second `start` fully
/// replaces the previous run; nothing carries over.
#[derive(Debug)]
pub struct Session {
    text: Vec<char>,
    cursor: usize,
    mistakes: usize,
    started_at: Option<SystemTime>,
    status: Status,
}

impl Session {
    pub fn new() -> Self {
        Self {
            text: Vec::new(),
            cursor: 0,
            mistakes: 0,
            started_at: None,
            status: Status::Idle,
        }
    }

    /// Begin a fresh run over `text`. Empty text is rejected so completion
    /// can never be reached without a first keystroke stamping the timer.
    pub fn start(&mut self, text: &str) -> Result<(), SessionError> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Err(SessionError::EmptyText);
        }
        self.text = chars;
        self.cursor = 0;
        self.mistakes = 0;
        self.started_at = None;
        self.status = Status::InProgress;
        Ok(())
    }

    /// Process one key-press. The status gate lives here, so keystrokes
    /// delivered after completion (or before a text is loaded) are inert
    /// even if the caller keeps forwarding events.
    pub fn handle_key(&mut self, press: KeyPress) -> KeyOutcome {
        if self.status != Status::InProgress || press.has_modifier() {
            return KeyOutcome::Ignored;
        }

        // The timer starts on the first processed keystroke, before any
        // cursor movement from that same keystroke.
        if self.started_at.is_none() {
            self.started_at = Some(SystemTime::now());
        }

        if press.key.matches(self.text[self.cursor]) {
            self.cursor += 1;
            if self.cursor == self.text.len() {
                let summary = self.finish();
                return KeyOutcome::Completed(summary);
            }
            KeyOutcome::Advanced
        } else {
            self.mistakes += 1;
            KeyOutcome::Mistake
        }
    }

    fn finish(&mut self) -> Summary {
        self.status = Status::Completed;
        let elapsed_secs = self.elapsed_secs().unwrap_or(0.0);
        Summary {
            elapsed_secs,
            mistakes: self.mistakes,
            wpm: wpm(self.text.len(), elapsed_secs),
        }
    }

    /// Seconds since the first processed keystroke, if any.
    pub fn elapsed_secs(&self) -> Option<f64> {
        self.started_at
            .map(|t| t.elapsed().unwrap_or_default().as_secs_f64())
    }

    pub fn chars(&self) -> &[char] {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mistakes(&self) -> usize {
        self.mistakes
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn has_started(&self) -> bool {
        self.started_at.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
