//! Passage provider: downloads a work from Aozora Bunko, strips the ruby
//! annotations and editorial notation, and cuts a typing-sized excerpt at
//! sentence boundaries. Cleaned texts are cached per book for the process
//! lifetime, and a built-in excerpt stands in whenever the network or the
//! page lets us down, so a session can always start.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use clap::ValueEnum;
use rand::seq::SliceRandom;
use regex::Regex;
use scraper::{Html, Selector};

/// Minimum excerpt length, in characters, unless overridden.
pub const DEFAULT_MIN_CHARS: usize = 100;

/// Cleaned texts shorter than this are treated as a failed extraction and
/// are neither cached nor served.
const CACHE_MIN_CHARS: usize = 100;

/// Opening of "Wagahai wa Neko de Aru", served when a fetch fails.
pub const FALLBACK_TEXT: &str = "吾輩は猫である。名前はまだ無い。どこで生れたかとんと見当がつかぬ。何でも薄暗いじめじめした所でニャーニャー泣いていた事だけは記憶している。";

/// The works on offer. Values double as CLI arguments and as the `book` key
/// in the config file and results log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Book {
    Wagahai,
    Rashomon,
    Kokoro,
    Botchan,
    RunMelos,
}

impl Book {
    pub const ALL: [Book; 5] = [
        Book::Wagahai,
        Book::Rashomon,
        Book::Kokoro,
        Book::Botchan,
        Book::RunMelos,
    ];

    pub fn url(&self) -> &'static str {
        match self {
            Book::Wagahai => "https://www.aozora.gr.jp/cards/000148/files/789_14547.html",
            Book::Rashomon => "https://www.aozora.gr.jp/cards/000879/files/127_15260.html",
            Book::Kokoro => "https://www.aozora.gr.jp/cards/000148/files/773_14560.html",
            Book::Botchan => "https://www.aozora.gr.jp/cards/000148/files/752_14964.html",
            Book::RunMelos => "https://www.aozora.gr.jp/cards/000035/files/1567_14913.html",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Book::Wagahai => "吾輩は猫である",
            Book::Rashomon => "羅生門",
            Book::Kokoro => "こころ",
            Book::Botchan => "坊っちゃん",
            Book::RunMelos => "走れメロス",
        }
    }

    /// Parse the key used in the config file; `None` for unknown keys.
    pub fn from_key(key: &str) -> Option<Book> {
        Book::ALL.into_iter().find(|b| b.to_string() == key)
    }

    pub fn pick_random() -> Book {
        Book::ALL
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(Book::Wagahai)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("page has no main text body")]
    MissingBody,
    #[error("cleaned text too short ({0} chars)")]
    TooShort(usize),
}

#[derive(Debug)]
pub struct Library {
    client: reqwest::blocking::Client,
    cache: HashMap<Book, String>,
}

impl Library {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("taipo/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    /// A typing-sized excerpt for `book`, at least `min_chars` characters
    /// when the source allows. Falls back to the built-in text on any fetch
    /// or extraction failure.
    pub fn passage(&mut self, book: Book, min_chars: usize) -> String {
        let text = match self.load(book) {
            Ok(text) => excerpt(&text, min_chars),
            Err(_) => String::new(),
        };
        if text.is_empty() {
            excerpt(FALLBACK_TEXT, min_chars)
        } else {
            text
        }
    }

    /// Full cleaned text of `book`, from cache if present.
    fn load(&mut self, book: Book) -> Result<String, LibraryError> {
        if let Some(text) = self.cache.get(&book) {
            return Ok(text.clone());
        }
        let html = self.fetch(book.url())?;
        let body = main_text(&html).ok_or(LibraryError::MissingBody)?;
        let cleaned = clean_text(&body);
        let len = cleaned.chars().count();
        if len < CACHE_MIN_CHARS {
            return Err(LibraryError::TooShort(len));
        }
        self.cache.insert(book, cleaned.clone());
        Ok(cleaned)
    }

    fn fetch(&self, url: &str) -> Result<String, LibraryError> {
        let resp = self.client.get(url).send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LibraryError::Status(status.as_u16()));
        }
        // Aozora pages declare Shift_JIS in a meta tag, not always in the
        // Content-Type header, so give the decoder that default.
        Ok(resp.text_with_charset("shift_jis")?)
    }

    #[cfg(test)]
    fn seed(&mut self, book: Book, text: String) {
        self.cache.insert(book, text);
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}

fn ruby_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<rt[^>]*>.*?</rt>|<rp[^>]*>.*?</rp>").unwrap())
}

fn notation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"［＃[^］]*］|《[^》]*》|〔[^〕]*〕|https?://\S+|[｜※]").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Drop ruby reading elements before text extraction, so furigana does not
/// end up interleaved with the prose.
fn strip_ruby(html: &str) -> String {
    ruby_re().replace_all(html, "").into_owned()
}

/// The prose body of an Aozora XHTML page.
fn main_text(html: &str) -> Option<String> {
    let stripped = strip_ruby(html);
    let doc = Html::parse_document(&stripped);
    let sel = Selector::parse("div.main_text").unwrap();
    let node = doc.select(&sel).next()?;
    Some(node.text().collect::<String>())
}

/// Remove Aozora editorial notation and collapse whitespace (including
/// ideographic spaces and line breaks) to single spaces.
pub fn clean_text(text: &str) -> String {
    let text = notation_re().replace_all(text, "");
    let text = whitespace_re().replace_all(&text, " ");
    text.trim().to_string()
}

/// Accumulate whole sentences (split on 。) until the excerpt passes
/// `min_chars` characters. Every piece gets its terminator back, so text
/// with no 。 at all comes out as a single terminated sentence.
pub fn excerpt(text: &str, min_chars: usize) -> String {
    let mut out = String::new();
    for sentence in text.split('。') {
        let s = sentence.trim();
        if s.is_empty() {
            continue;
        }
        out.push_str(s);
        out.push('。');
        if out.chars().count() > min_chars {
            break;
        }
    }
    out
}
