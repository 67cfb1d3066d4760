mod ui;

use taipo::config::{Config, ConfigStore, FileConfigStore};
use taipo::history::{HistoryLog, RunRecord};
use taipo::library::{excerpt, Book, Library, FALLBACK_TEXT};
use taipo::runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner};
use taipo::session::{Key, KeyOutcome, KeyPress, Session, Status, Summary};
use taipo::TICK_RATE_MS;

use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    sync::mpsc::Sender,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

/// terminal typing trainer over Aozora Bunko classics
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing trainer that fetches an excerpt from a Japanese classic, checks every keystroke against it, and reports elapsed time, mistakes, and words per minute."
)]
pub struct Cli {
    /// book to pull an excerpt from (random pick when omitted)
    #[clap(short = 'b', long, value_enum)]
    book: Option<Book>,

    /// custom text to type instead of a fetched excerpt
    #[clap(short = 't', long)]
    text: Option<String>,

    /// minimum excerpt length in characters
    #[clap(short = 'm', long)]
    min_chars: Option<usize>,
}

#[derive(Debug)]
pub struct App {
    pub session: Session,
    /// Fixed book choice; `None` means a random pick per fetch.
    pub book: Option<Book>,
    pub custom_text: Option<String>,
    pub min_chars: usize,
    /// Label of the passage currently loaded or being fetched.
    pub current_book: String,
    /// The loaded passage, kept for retries of the same text.
    pub current_text: String,
    /// Fetch counter; responses carrying an older value are stale.
    pub generation: u64,
    pub last_summary: Option<Summary>,
    pub best_wpm: Option<u32>,
    library: Arc<Mutex<Library>>,
    history: HistoryLog,
    tx: Sender<AppEvent>,
}

impl App {
    pub fn new(
        book: Option<Book>,
        custom_text: Option<String>,
        min_chars: usize,
        history: HistoryLog,
        tx: Sender<AppEvent>,
    ) -> Self {
        let best_wpm = history.best_wpm();
        Self {
            session: Session::new(),
            book,
            custom_text,
            min_chars,
            current_book: String::new(),
            current_text: String::new(),
            generation: 0,
            last_summary: None,
            best_wpm,
            library: Arc::new(Mutex::new(Library::new())),
            history,
            tx,
        }
    }

    /// Kick off a passage fetch on a background thread. Bumping the
    /// generation first means any response still in flight from an earlier
    /// request arrives stale and gets dropped.
    pub fn request_text(&mut self) {
        self.generation += 1;
        self.session = Session::new();
        self.last_summary = None;

        let generation = self.generation;
        let tx = self.tx.clone();

        if let Some(text) = &self.custom_text {
            self.current_book = "custom".to_string();
            let _ = tx.send(AppEvent::TextLoaded {
                generation,
                book: "custom".to_string(),
                text: text.clone(),
            });
            return;
        }

        let book = self.book.unwrap_or_else(Book::pick_random);
        self.current_book = book.to_string();
        let library = Arc::clone(&self.library);
        let min_chars = self.min_chars;
        thread::spawn(move || {
            let text = match library.lock() {
                Ok(mut lib) => lib.passage(book, min_chars),
                Err(_) => excerpt(FALLBACK_TEXT, min_chars),
            };
            let _ = tx.send(AppEvent::TextLoaded {
                generation,
                book: book.to_string(),
                text,
            });
        });
    }

    /// Apply a fetch response; returns false (no state change) when the
    /// response belongs to a superseded request.
    pub fn on_text_loaded(&mut self, generation: u64, book: String, text: String) -> bool {
        if generation != self.generation {
            return false;
        }
        self.current_book = book;
        self.current_text = text;
        if self.session.start(&self.current_text).is_err() {
            // A provider bug handed us an empty payload; fall back rather
            // than leaving the app stuck on the loading screen.
            self.current_text = excerpt(FALLBACK_TEXT, self.min_chars);
            let _ = self.session.start(&self.current_text);
        }
        true
    }

    /// Re-run the currently loaded passage from scratch. Starting a run
    /// supersedes any fetch still in flight, so the generation moves here
    /// too; otherwise a late response could swap the text mid-retry.
    pub fn retry(&mut self) {
        if self.current_text.is_empty() {
            self.request_text();
            return;
        }
        self.generation += 1;
        self.last_summary = None;
        let _ = self.session.start(&self.current_text);
    }

    pub fn on_completed(&mut self, summary: Summary) {
        let record = RunRecord::from_summary(&self.current_book, self.session.len(), &summary);
        let _ = self.history.append(&record);
        self.best_wpm = self.history.best_wpm().or(Some(summary.wpm));
        self.last_summary = Some(summary);
    }
}

fn to_key_press(key: &KeyEvent) -> KeyPress {
    let value = match key.code {
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Enter => Key::Enter,
        KeyCode::Tab => Key::Tab,
        _ => Key::Other,
    };
    KeyPress {
        key: value,
        ctrl: key.modifiers.contains(KeyModifiers::CONTROL),
        alt: key.modifiers.contains(KeyModifiers::ALT),
        meta: key.modifiers.contains(KeyModifiers::META)
            || key.modifiers.contains(KeyModifiers::SUPER),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if cli.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, "--text must not be empty")
            .exit();
    }

    let store = FileConfigStore::new();
    let mut config = store.load();
    if let Some(book) = cli.book {
        // An explicit choice becomes the new default.
        config.book = book.to_string();
        let _ = store.save(&config);
    }
    if let Some(min_chars) = cli.min_chars {
        config.min_chars = min_chars.max(1);
    }
    let book = resolve_book(&cli, &config);

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let events = CrosstermEventSource::new();
    let tx = events.sender();
    let mut app = App::new(book, cli.text.clone(), config.min_chars, HistoryLog::new(), tx);
    start_tui(&mut terminal, &mut app, events)?;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(())
}

fn resolve_book(cli: &Cli, config: &Config) -> Option<Book> {
    cli.book.or_else(|| Book::from_key(&config.book))
}

#[derive(Debug)]
enum ExitType {
    Restart,
    New,
    Quit,
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: CrosstermEventSource,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(events, FixedTicker::new(Duration::from_millis(TICK_RATE_MS)));

    app.request_text();

    loop {
        let mut exit_type: ExitType = ExitType::Quit;
        terminal.draw(|f| ui(app, f))?;

        loop {
            match runner.step() {
                AppEvent::Tick => {
                    // Redraw during a run so the elapsed readout advances.
                    if app.session.status() == Status::InProgress && app.session.has_started() {
                        terminal.draw(|f| ui(app, f))?;
                    }
                }
                AppEvent::Resize => {
                    terminal.draw(|f| ui(app, f))?;
                }
                AppEvent::TextLoaded {
                    generation,
                    book,
                    text,
                } => {
                    if app.on_text_loaded(generation, book, text) {
                        terminal.draw(|f| ui(app, f))?;
                    }
                }
                AppEvent::Key(key) => {
                    match key.code {
                        KeyCode::Esc => {
                            break;
                        }
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            // ctrl+c to quit
                            break;
                        }
                        KeyCode::Left => {
                            exit_type = ExitType::Restart;
                            break;
                        }
                        KeyCode::Right => {
                            exit_type = ExitType::New;
                            break;
                        }
                        _ => match app.session.status() {
                            Status::InProgress => {
                                if let KeyOutcome::Completed(summary) =
                                    app.session.handle_key(to_key_press(&key))
                                {
                                    app.on_completed(summary);
                                }
                            }
                            Status::Completed => match key.code {
                                KeyCode::Char('r') => {
                                    exit_type = ExitType::Restart;
                                    break;
                                }
                                KeyCode::Char('n') => {
                                    exit_type = ExitType::New;
                                    break;
                                }
                                _ => {}
                            },
                            Status::Idle => {}
                        },
                    }
                    terminal.draw(|f| ui(app, f))?;
                }
            }
        }

        match exit_type {
            ExitType::Restart => {
                app.retry();
            }
            ExitType::New => {
                app.request_text();
            }
            ExitType::Quit => {
                break;
            }
        }
    }

    Ok(())
}

fn ui(app: &mut App, f: &mut Frame) {
    f.render_widget(&*app, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::tempdir;

    fn test_app(custom_text: Option<String>) -> (App, mpsc::Receiver<AppEvent>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let history = HistoryLog::with_path(dir.path().join("log.csv"));
        let (tx, rx) = mpsc::channel();
        let app = App::new(None, custom_text, 100, history, tx);
        (app, rx, dir)
    }

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::parse_from(["taipo"]);

        assert_eq!(cli.book, None);
        assert_eq!(cli.text, None);
        assert_eq!(cli.min_chars, None);
    }

    #[test]
    fn test_cli_book_values() {
        let cli = Cli::parse_from(["taipo", "-b", "kokoro"]);
        assert_eq!(cli.book, Some(Book::Kokoro));

        let cli = Cli::parse_from(["taipo", "--book", "run-melos"]);
        assert_eq!(cli.book, Some(Book::RunMelos));
    }

    #[test]
    fn test_cli_custom_text() {
        let cli = Cli::parse_from(["taipo", "-t", "hello world"]);
        assert_eq!(cli.text, Some("hello world".to_string()));

        let cli = Cli::parse_from(["taipo", "--min-chars", "150"]);
        assert_eq!(cli.min_chars, Some(150));
    }

    #[test]
    fn test_resolve_book_prefers_cli() {
        let cli = Cli::parse_from(["taipo", "-b", "botchan"]);
        let config = Config {
            book: "kokoro".into(),
            min_chars: 100,
        };
        assert_eq!(resolve_book(&cli, &config), Some(Book::Botchan));
    }

    #[test]
    fn test_resolve_book_falls_back_to_config() {
        let cli = Cli::parse_from(["taipo"]);
        let config = Config {
            book: "rashomon".into(),
            min_chars: 100,
        };
        assert_eq!(resolve_book(&cli, &config), Some(Book::Rashomon));

        let random = Config::default();
        assert_eq!(resolve_book(&cli, &random), None);
    }

    #[test]
    fn custom_text_loads_through_event_channel() {
        let (mut app, rx, _dir) = test_app(Some("こんにちは。".to_string()));

        app.request_text();
        assert_eq!(app.session.status(), Status::Idle);

        match rx.recv().unwrap() {
            AppEvent::TextLoaded {
                generation,
                book,
                text,
            } => {
                assert!(app.on_text_loaded(generation, book, text));
            }
            other => panic!("expected TextLoaded, got {:?}", other),
        }

        assert_eq!(app.session.status(), Status::InProgress);
        assert_eq!(app.current_book, "custom");
        assert_eq!(app.current_text, "こんにちは。");
    }

    #[test]
    fn stale_fetch_response_is_discarded() {
        let (mut app, rx, _dir) = test_app(Some("first".to_string()));

        app.request_text();
        let first = match rx.recv().unwrap() {
            AppEvent::TextLoaded {
                generation,
                book,
                text,
            } => (generation, book, text),
            other => panic!("expected TextLoaded, got {:?}", other),
        };

        // A restart supersedes the outstanding request before it lands.
        app.custom_text = Some("second".to_string());
        app.request_text();

        assert!(!app.on_text_loaded(first.0, first.1, first.2));
        assert_eq!(app.session.status(), Status::Idle, "stale text must not start a run");

        match rx.recv().unwrap() {
            AppEvent::TextLoaded {
                generation,
                book,
                text,
            } => assert!(app.on_text_loaded(generation, book, text)),
            other => panic!("expected TextLoaded, got {:?}", other),
        }
        assert_eq!(app.current_text, "second");
    }

    #[test]
    fn empty_payload_falls_back_instead_of_sticking() {
        let (mut app, _rx, _dir) = test_app(None);
        app.generation = 1;

        assert!(app.on_text_loaded(1, "wagahai".to_string(), String::new()));
        assert_eq!(app.session.status(), Status::InProgress);
        assert!(!app.current_text.is_empty());
    }

    #[test]
    fn retry_restarts_same_passage() {
        let (mut app, rx, _dir) = test_app(Some("abc".to_string()));
        app.request_text();
        if let AppEvent::TextLoaded {
            generation,
            book,
            text,
        } = rx.recv().unwrap()
        {
            app.on_text_loaded(generation, book, text);
        }

        app.session.handle_key(KeyPress::char('a'));
        app.session.handle_key(KeyPress::char('x'));
        assert_eq!(app.session.cursor(), 1);
        assert_eq!(app.session.mistakes(), 1);

        app.retry();
        assert_eq!(app.session.status(), Status::InProgress);
        assert_eq!(app.session.cursor(), 0);
        assert_eq!(app.session.mistakes(), 0);
        assert_eq!(app.current_text, "abc");
    }

    #[test]
    fn retry_discards_in_flight_fetch() {
        let (mut app, rx, _dir) = test_app(Some("first".to_string()));
        app.request_text();
        if let AppEvent::TextLoaded {
            generation,
            book,
            text,
        } = rx.recv().unwrap()
        {
            app.on_text_loaded(generation, book, text);
        }

        // Ask for a new passage, then go back to the loaded one before the
        // response lands; the run in progress must not be clobbered.
        app.custom_text = Some("second".to_string());
        app.request_text();
        app.retry();

        app.session.handle_key(KeyPress::char('f'));
        assert_eq!(app.session.cursor(), 1);

        let pending = match rx.recv().unwrap() {
            AppEvent::TextLoaded {
                generation,
                book,
                text,
            } => (generation, book, text),
            other => panic!("expected TextLoaded, got {:?}", other),
        };
        assert!(!app.on_text_loaded(pending.0, pending.1, pending.2));
        assert_eq!(app.current_text, "first");
        assert_eq!(app.session.status(), Status::InProgress);
        assert_eq!(app.session.cursor(), 1, "active run must keep its progress");
    }

    #[test]
    fn completion_is_logged_and_updates_best() {
        let (mut app, rx, _dir) = test_app(Some("ab".to_string()));
        app.request_text();
        if let AppEvent::TextLoaded {
            generation,
            book,
            text,
        } = rx.recv().unwrap()
        {
            app.on_text_loaded(generation, book, text);
        }
        assert_eq!(app.best_wpm, None);

        app.session.handle_key(KeyPress::char('a'));
        let summary = match app.session.handle_key(KeyPress::char('b')) {
            KeyOutcome::Completed(s) => s,
            other => panic!("expected completion, got {:?}", other),
        };
        app.on_completed(summary.clone());

        assert_eq!(app.last_summary, Some(summary));
        assert!(app.best_wpm.is_some());
        assert_eq!(app.history.records().unwrap().len(), 1);
        assert_eq!(app.history.records().unwrap()[0].book, "custom");
    }

    #[test]
    fn to_key_press_maps_modifiers_and_named_keys() {
        let plain = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(to_key_press(&plain), KeyPress::char('a'));

        let ctrl = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL);
        assert!(to_key_press(&ctrl).ctrl);

        let alt = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::ALT);
        assert!(to_key_press(&alt).alt);

        let meta = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::SUPER);
        assert!(to_key_press(&meta).meta);

        let backspace = KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(to_key_press(&backspace).key, Key::Backspace);

        let arrow = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        assert_eq!(to_key_press(&arrow).key, Key::Other);
    }

    #[test]
    fn test_exit_type_debug() {
        assert_eq!(format!("{:?}", ExitType::Restart), "Restart");
        assert_eq!(format!("{:?}", ExitType::New), "New");
        assert_eq!(format!("{:?}", ExitType::Quit), "Quit");
    }

    #[test]
    fn test_ui_renders_all_screens() {
        use ratatui::{backend::TestBackend, Terminal};

        let (mut app, rx, _dir) = test_app(Some("test".to_string()));
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();

        // Loading screen
        app.request_text();
        terminal.draw(|f| ui(&mut app, f)).unwrap();

        // Typing screen
        if let AppEvent::TextLoaded {
            generation,
            book,
            text,
        } = rx.recv().unwrap()
        {
            app.on_text_loaded(generation, book, text);
        }
        terminal.draw(|f| ui(&mut app, f)).unwrap();
        let buffer = terminal.backend().buffer();
        let content: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(content.contains('t'));

        // Results screen
        for c in "test".chars() {
            if let KeyOutcome::Completed(summary) = app.session.handle_key(KeyPress::char(c)) {
                app.on_completed(summary);
            }
        }
        assert_eq!(app.session.status(), Status::Completed);
        terminal.draw(|f| ui(&mut app, f)).unwrap();
        let buffer = terminal.backend().buffer();
        let content: String = buffer.content.iter().map(|c| c.symbol()).collect();
        assert!(content.contains("wpm"));
    }
}
