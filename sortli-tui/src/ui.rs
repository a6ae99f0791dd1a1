use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Wrap},
};
use sortli_core::{AdviceBlock, BinIcon, pipeline::PipelineState};

use crate::app::{App, Screen};

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new("sortli – snap your waste, get the right bin")
        .block(Block::default().borders(Borders::ALL).title("Recycling Assistant"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::Capture => draw_capture(frame, app, *content_area),
        Screen::Results => draw_results(frame, app, *content_area),
        Screen::Sites => draw_sites(frame, app, *content_area),
    }

    let nav_hint = match app.screen {
        Screen::Capture => "Type image path · Enter analyze · Ctrl-F/F2 nearby sites · Esc/Ctrl-C quit",
        Screen::Results | Screen::Sites => {
            "↑/↓ scroll · Tab/Esc/← new photo · Ctrl-F/F2 nearby sites · q/Ctrl-C quit"
        }
    };

    let status_text = if app.is_loading {
        format!("{}… · {nav_hint}", app.activity)
    } else if let Some(msg) = &app.error_message {
        format!("{msg} · {nav_hint}")
    } else {
        nav_hint.to_owned()
    };

    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else if app.is_loading {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });

    frame.render_widget(status, *status_area);
}

fn draw_capture(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // input
            Constraint::Min(0),    // info
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [input_area, info_area] = chunks else {
        return;
    };

    let input = Paragraph::new(app.image_input.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Take a picture of the item (path to a JPEG, Enter)"),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(input, *input_area);

    let info = vec![
        Line::from(format!(
            "{} recycling rules loaded.",
            app.service.rules().len()
        )),
        Line::from(format!(
            "Nearby sites are searched around {}.",
            app.service.location()
        )),
        stage_line(app.pipeline_state),
        Line::from(""),
        Line::from("Ask how to properly sort and recycle the items in your photo."),
    ];
    let paragraph = Paragraph::new(info)
        .block(Block::default().borders(Borders::ALL).title("Session"))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, *info_area);
}

fn draw_results(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(session) = &app.session else {
        let paragraph = Paragraph::new("No analysis yet.")
            .block(Block::default().borders(Borders::ALL).title("Recycling Instructions"));
        frame.render_widget(paragraph, area);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [items_area, blocks_area] = chunks else {
        return;
    };

    let source = session
        .image
        .source()
        .map_or_else(|| "<camera>".to_owned(), |path| path.display().to_string());
    let items = Paragraph::new(session.identified_items.as_str())
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Detected items in {source} ({})",
            session.captured_at.format("%H:%M:%S")
        )))
        .wrap(Wrap { trim: true });
    frame.render_widget(items, *items_area);

    if session.blocks.is_empty() {
        let paragraph = Paragraph::new("The assistant returned no instructions.")
            .block(Block::default().borders(Borders::ALL).title("Recycling Instructions"));
        frame.render_widget(paragraph, *blocks_area);
        return;
    }

    // Text column takes three quarters of the width, minus its borders.
    let text_width = (blocks_area.width.saturating_mul(3) / 4).saturating_sub(2);
    let mut top = blocks_area.y;

    for block in session.blocks.iter().skip(usize::from(app.scroll)) {
        let remaining = blocks_area.bottom().saturating_sub(top);
        if remaining == 0 {
            break;
        }
        let height = block_height(&block.text, text_width).min(remaining);
        let row = Rect::new(blocks_area.x, top, blocks_area.width, height);
        draw_advice_row(frame, app, block, row);
        top = top.saturating_add(height);
    }
}

fn draw_advice_row(frame: &mut Frame<'_>, app: &App, block: &AdviceBlock, area: Rect) {
    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(75), Constraint::Percentage(25)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [text_area, icon_area] = chunks else {
        return;
    };

    let text = Paragraph::new(block.text.as_str())
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false });
    frame.render_widget(text, *text_area);

    // No keyword match: leave the icon column empty.
    let Some(icon) = block.icon else {
        return;
    };

    let color = icon_color(icon);
    let lines = vec![
        Line::from(Span::styled(
            "■■■",
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            icon.label(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            icon.asset_path(&app.images_dir).display().to_string(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, *icon_area);
}

fn draw_sites(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let title = format!("Recycling sites near {}", app.service.location());
    let text = app
        .sites
        .as_deref()
        .unwrap_or("Press Ctrl-F or F2 to search for nearby sites.");

    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((app.scroll, 0));
    frame.render_widget(paragraph, area);
}

fn stage_line(state: PipelineState) -> Line<'static> {
    let style = match state {
        PipelineState::Failed => Style::default().fg(Color::Red),
        PipelineState::Classifying | PipelineState::Generating | PipelineState::Rendering => {
            Style::default().fg(Color::Yellow)
        }
        PipelineState::Idle | PipelineState::AwaitingImage => Style::default().fg(Color::DarkGray),
    };
    Line::from(Span::styled(format!("Pipeline: {state}"), style))
}

/// Rows needed to show `text` wrapped at `width`, including the borders.
fn block_height(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let lines: usize = text
        .lines()
        .map(|line| line.chars().count().div_ceil(width).max(1))
        .sum();
    u16::try_from(lines)
        .unwrap_or(u16::MAX)
        .saturating_add(2)
        .max(5)
}

fn icon_color(icon: BinIcon) -> Color {
    match icon {
        BinIcon::GreyBin => Color::Gray,
        BinIcon::BrownBin => Color::Rgb(139, 90, 43),
        BinIcon::YellowBin => Color::Yellow,
        BinIcon::BlueBin => Color::Blue,
        BinIcon::RedBin => Color::Red,
        BinIcon::GreenBin => Color::Green,
        BinIcon::YellowStreet => Color::LightYellow,
        BinIcon::OilSymbol => Color::Rgb(184, 134, 11),
        BinIcon::BatterySymbol => Color::LightRed,
        BinIcon::Pharmacy => Color::LightGreen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_height_counts_wrapped_lines() {
        assert_eq!(block_height("short", 40), 5);
        let long = "x".repeat(100);
        assert_eq!(block_height(&format!("{long}\n{long}\nend"), 40), 3 + 3 + 1 + 2);
    }

    #[test]
    fn stage_line_highlights_failure() {
        let line = stage_line(PipelineState::Failed);
        let span = line.spans.first().unwrap();
        assert_eq!(span.content, "Pipeline: failed");
        assert_eq!(span.style.fg, Some(Color::Red));

        let line = stage_line(PipelineState::Generating);
        let span = line.spans.first().unwrap();
        assert_eq!(span.content, "Pipeline: generating advice");
        assert_eq!(span.style.fg, Some(Color::Yellow));
    }
}
