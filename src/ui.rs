use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use taipo::render::{char_tags, CharTag};
use taipo::session::Status;

use crate::App;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // styles
        let bold_style = Style::default().add_modifier(Modifier::BOLD);

        let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);

        let dim_bold_style = Style::default()
            .patch(bold_style)
            .add_modifier(Modifier::DIM);

        let underlined_dim_bold_style = Style::default()
            .patch(dim_bold_style)
            .add_modifier(Modifier::UNDERLINED);

        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        match self.session.status() {
            Status::Idle => {
                let message = Paragraph::new(Span::styled(
                    format!("fetching 「{}」 from Aozora Bunko...", self.current_book),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD | Modifier::ITALIC),
                ))
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });

                message.render(area, buf);
            }
            Status::InProgress => {
                let prompt: String = self.session.chars().iter().collect();

                let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
                let mut prompt_occupied_lines =
                    ((prompt.width() as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16;

                if prompt.width() <= max_chars_per_line as usize {
                    prompt_occupied_lines = 1;
                }

                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .horizontal_margin(HORIZONTAL_MARGIN)
                    .constraints(
                        [
                            Constraint::Length(
                                ((area.height as f64 - prompt_occupied_lines as f64) / 2.0) as u16,
                            ),
                            Constraint::Length(2),
                            Constraint::Length(prompt_occupied_lines),
                            Constraint::Length(
                                ((area.height as f64 - prompt_occupied_lines as f64) / 2.0) as u16,
                            ),
                        ]
                        .as_ref(),
                    )
                    .split(area);

                let tags = char_tags(self.session.len(), self.session.cursor());
                let spans = self
                    .session
                    .chars()
                    .iter()
                    .zip(tags.iter())
                    .map(|(c, tag)| {
                        let glyph = c.to_string();
                        match tag {
                            CharTag::Correct => Span::styled(glyph, green_bold_style),
                            CharTag::Current => Span::styled(glyph, underlined_dim_bold_style),
                            CharTag::Untyped => Span::styled(glyph, dim_bold_style),
                        }
                    })
                    .collect::<Vec<Span>>();

                let widget = Paragraph::new(Line::from(spans))
                    .alignment(if prompt_occupied_lines == 1 {
                        // when the prompt is small enough to fit on one line
                        // centering the text gives a nice zen feeling
                        Alignment::Center
                    } else {
                        Alignment::Left
                    })
                    .wrap(Wrap { trim: true });

                widget.render(chunks[2], buf);

                if let Some(elapsed) = self.session.elapsed_secs() {
                    let timer =
                        Paragraph::new(Span::styled(format!("{:.1}", elapsed), dim_bold_style))
                            .alignment(Alignment::Center);

                    timer.render(chunks[1], buf);
                }
            }
            Status::Completed => {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .horizontal_margin(HORIZONTAL_MARGIN)
                    .vertical_margin(VERTICAL_MARGIN)
                    .constraints(
                        [
                            Constraint::Min(1),
                            Constraint::Length(1), // result line
                            Constraint::Length(1), // source line
                            Constraint::Length(1), // personal best
                            Constraint::Length(1), // padding
                            Constraint::Length(1), // legend
                        ]
                        .as_ref(),
                    )
                    .split(area);

                if let Some(summary) = &self.last_summary {
                    let stats = Paragraph::new(Span::styled(
                        format!(
                            "{:.2} s   {} mistakes   {} wpm",
                            summary.elapsed_secs, summary.mistakes, summary.wpm
                        ),
                        bold_style,
                    ))
                    .alignment(Alignment::Center);
                    stats.render(chunks[1], buf);

                    let source = Paragraph::new(Span::styled(
                        format!("「{}」 {} chars", self.current_book, self.session.len()),
                        dim_bold_style,
                    ))
                    .alignment(Alignment::Center);
                    source.render(chunks[2], buf);

                    let best_line = match self.best_wpm {
                        Some(best) if summary.wpm >= best => "new personal best!".to_string(),
                        Some(best) => format!("personal best: {} wpm", best),
                        None => String::new(),
                    };
                    let best = Paragraph::new(Span::styled(
                        best_line,
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
                    ))
                    .alignment(Alignment::Center);
                    best.render(chunks[3], buf);
                }

                let legend = Paragraph::new(Span::styled(
                    "(r)etry / ← repeat passage   (n)ew / → new passage   (esc)ape",
                    italic_style,
                ))
                .alignment(Alignment::Center);
                legend.render(chunks[5], buf);
            }
        }
    }
}
