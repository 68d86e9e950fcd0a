use std::ops::Range;

use crossterm::style::{Attribute, Color, ContentStyle};
use pulldown_cmark::{Event, LinkType, Options, Parser, Tag, TagEnd};

use super::conversation_state::{Message, Role};

/// Terminal renderer for the transcript view.
///
/// Only assistant messages are shown; user messages are skipped even though
/// they are part of what gets sent to the backend.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownRenderer {
    styled: bool,
}

impl MarkdownRenderer {
    pub fn new(styled: bool) -> Self {
        Self { styled }
    }

    /// Render one message, or `None` for messages the view does not show.
    pub fn render_message(&self, message: &Message) -> Option<String> {
        match message.role {
            Role::Assistant => Some(self.render(&message.content)),
            Role::User => None,
        }
    }

    pub fn render_transcript(&self, messages: &[Message]) -> String {
        messages
            .iter()
            .filter_map(|m| self.render_message(m))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Render markdown as terminal lines.
    ///
    /// Without styling, emphasis markers are dropped while code spans and
    /// strikethrough keep their delimiters as written.
    pub fn render(&self, markdown: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut writer = TermWriter::new(markdown, self.styled);
        for (event, range) in Parser::new_ext(markdown, options).into_offset_iter() {
            writer.event(event, range);
        }
        writer.finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Emphasis,
    Strong,
    Strikethrough,
}

/// Walks parser events and accumulates output lines.
struct TermWriter<'a> {
    source: &'a str,
    styled: bool,
    lines: Vec<String>,
    line: String,
    strong: usize,
    emphasis: usize,
    strikethrough: usize,
    heading: bool,
    inline_code: bool,
    quote_depth: usize,
    // One entry per open list; `Some(n)` is the next ordered number.
    lists: Vec<Option<u64>>,
    code_block: Option<String>,
    links: Vec<(LinkType, String)>,
    // One entry per open emphasis/strong/strikethrough; `Some` holds the
    // closing delimiter when the span is printed literally.
    marks: Vec<Option<String>>,
}

impl<'a> TermWriter<'a> {
    fn new(source: &'a str, styled: bool) -> Self {
        Self {
            source,
            styled,
            lines: Vec::new(),
            line: String::new(),
            strong: 0,
            emphasis: 0,
            strikethrough: 0,
            heading: false,
            inline_code: false,
            quote_depth: 0,
            lists: Vec::new(),
            code_block: None,
            links: Vec::new(),
            marks: Vec::new(),
        }
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(Tag::Heading { .. }) => {
                self.flush();
                self.heading = true;
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush();
                self.heading = false;
            }
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::HtmlBlock) => self.flush(),
            Event::Start(Tag::BlockQuote(_)) => {
                self.flush();
                self.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.code_block = Some(String::new());
            }
            Event::End(TagEnd::CodeBlock) => {
                let code = self.code_block.take().unwrap_or_default();
                for code_line in code.trim_end_matches('\n').lines() {
                    self.begin_line();
                    self.line.push_str("    ");
                    let rendered = self.paint(code_line, code_style());
                    self.line.push_str(&rendered);
                    self.flush();
                }
            }
            Event::Start(Tag::List(start)) => {
                self.flush();
                self.lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{}. ", number);
                        *number += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                self.line = format!("{}{}{}", self.quote_prefix(), indent, marker);
            }
            Event::End(TagEnd::Item) => self.flush(),
            Event::TaskListMarker(checked) => {
                self.text(if checked { "[x] " } else { "[ ] " });
            }
            Event::Start(Tag::Emphasis) => self.open_mark(&range, Mark::Emphasis),
            Event::Start(Tag::Strong) => self.open_mark(&range, Mark::Strong),
            Event::Start(Tag::Strikethrough) => self.open_mark(&range, Mark::Strikethrough),
            Event::End(TagEnd::Emphasis) => self.close_mark(Mark::Emphasis),
            Event::End(TagEnd::Strong) => self.close_mark(Mark::Strong),
            Event::End(TagEnd::Strikethrough) => self.close_mark(Mark::Strikethrough),
            Event::Start(Tag::Link {
                link_type, dest_url, ..
            }) => {
                self.links.push((link_type, dest_url.to_string()));
            }
            Event::End(TagEnd::Link) => {
                if let Some((link_type, url)) = self.links.pop() {
                    if !matches!(link_type, LinkType::Autolink | LinkType::Email) && !url.is_empty()
                    {
                        self.text(&format!(" ({})", url));
                    }
                }
            }
            Event::Text(text) => match self.code_block.as_mut() {
                Some(code) => code.push_str(&text),
                None => self.text(&text),
            },
            Event::Code(code) => {
                if self.styled {
                    self.inline_code = true;
                    self.text(&code);
                    self.inline_code = false;
                } else {
                    let written = self.source.get(range).unwrap_or(&*code).to_string();
                    self.text(&written);
                }
            }
            Event::Html(html) | Event::InlineHtml(html) => match self.code_block.as_mut() {
                Some(code) => code.push_str(&html),
                None => {
                    for (i, part) in html.trim_end_matches('\n').split('\n').enumerate() {
                        if i > 0 {
                            self.flush();
                        }
                        self.text(part);
                    }
                }
            },
            Event::SoftBreak | Event::HardBreak => match self.code_block.as_mut() {
                Some(code) => code.push('\n'),
                None => self.flush(),
            },
            Event::Rule => {
                self.flush();
                self.begin_line();
                self.line.push_str("───");
                self.flush();
            }
            _ => {}
        }
    }

    /// Open an emphasis-like span. Intraword spans such as `2*3*4` are kept
    /// as literal text, as is strikethrough when there is no styling to show it.
    fn open_mark(&mut self, range: &Range<usize>, mark: Mark) {
        let width = match mark {
            Mark::Emphasis => 1,
            Mark::Strong => 2,
            Mark::Strikethrough => self.source[range.start..]
                .chars()
                .take_while(|c| *c == '~')
                .take(2)
                .count()
                .max(1),
        };
        let literal = is_intraword(self.source, range)
            || (mark == Mark::Strikethrough && !self.styled);

        if literal {
            let open = self.source.get(range.start..range.start + width).unwrap_or("");
            let close = self
                .source
                .get(range.end.saturating_sub(width)..range.end)
                .unwrap_or("")
                .to_string();
            let open = open.to_string();
            self.text(&open);
            self.marks.push(Some(close));
            return;
        }

        *self.counter(mark) += 1;
        self.marks.push(None);
    }

    fn close_mark(&mut self, mark: Mark) {
        match self.marks.pop() {
            Some(Some(close)) => self.text(&close),
            _ => {
                let count = self.counter(mark);
                *count = count.saturating_sub(1);
            }
        }
    }

    fn counter(&mut self, mark: Mark) -> &mut usize {
        match mark {
            Mark::Emphasis => &mut self.emphasis,
            Mark::Strong => &mut self.strong,
            Mark::Strikethrough => &mut self.strikethrough,
        }
    }

    fn quote_prefix(&self) -> String {
        "│ ".repeat(self.quote_depth)
    }

    /// Start a fresh line with the quote and list indentation.
    fn begin_line(&mut self) {
        if self.line.is_empty() {
            self.line = format!("{}{}", self.quote_prefix(), "  ".repeat(self.lists.len()));
        }
    }

    fn text(&mut self, text: &str) {
        self.begin_line();
        let rendered = self.paint(text, self.current_style());
        self.line.push_str(&rendered);
    }

    fn flush(&mut self) {
        if !self.line.trim().is_empty() {
            self.lines.push(std::mem::take(&mut self.line));
        }
        self.line.clear();
    }

    fn current_style(&self) -> Option<ContentStyle> {
        if self.inline_code {
            return code_style();
        }

        let mut style = ContentStyle::new();
        let mut any = false;
        let mut set = |attribute: Attribute, on: bool| {
            if on {
                style.attributes.set(attribute);
                any = true;
            }
        };
        set(Attribute::Bold, self.strong > 0 || self.heading);
        set(Attribute::Italic, self.emphasis > 0 || self.quote_depth > 0);
        set(Attribute::Underlined, self.heading || !self.links.is_empty());
        set(Attribute::CrossedOut, self.strikethrough > 0);

        any.then_some(style)
    }

    fn paint(&self, text: &str, style: Option<ContentStyle>) -> String {
        match style {
            Some(style) if self.styled => style.apply(text).to_string(),
            _ => text.to_string(),
        }
    }

    fn finish(mut self) -> String {
        self.flush();
        self.lines.join("\n")
    }
}

fn code_style() -> Option<ContentStyle> {
    let mut style = ContentStyle::new();
    style.foreground_color = Some(Color::Cyan);
    Some(style)
}

fn is_intraword(source: &str, range: &Range<usize>) -> bool {
    let before = source[..range.start].chars().next_back();
    let after = source[range.end..].chars().next();
    matches!((before, after), (Some(b), Some(a)) if b.is_alphanumeric() && a.is_alphanumeric())
}
