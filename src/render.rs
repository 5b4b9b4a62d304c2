use async_trait::async_trait;
use pulldown_cmark::{ html, CowStr, Event, Options, Parser, Tag };

use crate::models::chat::{ Conversation, Role };

/// Displays a conversation. Called after every change to it, always with the
/// complete conversation.
#[async_trait]
pub trait Renderer: Send {
    async fn render(&mut self, conversation: &Conversation);

    /// Shows or hides the "thinking" indicator while a reply is pending.
    async fn set_busy(&mut self, _busy: bool) {}
}

/// Role-tagged plain-text transcript, one turn per line.
pub fn render_text(conversation: &Conversation) -> String {
    let mut result = String::new();
    for turn in conversation.turns() {
        let role_display = match turn.role() {
            Role::User => "User",
            Role::Assistant => "Assistant",
        };
        result.push_str(&format!("{}: {}\n", role_display, turn.content()));
    }
    result
}

/// Markdown to HTML for the page. Raw HTML in the source is shown as text
/// and script-capable link targets are dropped.
pub fn render_markdown(text: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let events = Parser::new_ext(text, options).map(|event| {
        match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link { link_type, dest_url, title, id }) => {
                Event::Start(Tag::Link { link_type, dest_url: safe_url(dest_url), title, id })
            }
            Event::Start(Tag::Image { link_type, dest_url, title, id }) => {
                Event::Start(Tag::Image { link_type, dest_url: safe_url(dest_url), title, id })
            }
            other => other,
        }
    });

    let mut out = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    let scheme = url.trim_start().to_ascii_lowercase();
    if ["javascript:", "vbscript:", "data:"].iter().any(|s| scheme.starts_with(s)) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}
