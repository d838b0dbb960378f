//! HTML layout for the wallpaper canvas.
//!
//! `render_document` is pure: the same entries and options always produce the
//! same document. All text coming from the dictionary provider is escaped
//! before it is embedded.

use crate::{Viewport, WordEntry, DEFAULT_TARGET_ID};
use std::fmt::Write;
use std::str::FromStr;

const DISPLAY_FONT: &str = "'Playfair Display', 'Georgia', 'Times New Roman', serif";
const BODY_FONT: &str = "-apple-system, BlinkMacSystemFont, 'SF Pro Display', 'Segoe UI', sans-serif";
const FONT_STYLESHEET: &str =
    "https://fonts.googleapis.com/css2?family=Playfair+Display:wght@700&display=swap";

/// Reserved space for the notch / dynamic island
const SAFE_AREA_TOP: u32 = 120;
/// Reserved space above the home indicator
const SAFE_AREA_BOTTOM: u32 = 80;

/// Colour scheme of the wallpaper
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    /// Warm paper background with dark ink
    #[default]
    Light,
    Dark,
    Midnight,
}

/// Colours used by a theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub background: &'static str,
    pub word: &'static str,
    pub part_of_speech: &'static str,
    pub definition: &'static str,
    pub example: &'static str,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Light => Palette {
                background: "#efebe0",
                word: "#111827",
                part_of_speech: "#6B7280",
                definition: "#111827",
                example: "#4B5563",
            },
            Theme::Dark => Palette {
                background: "#111111",
                word: "#F9FAFB",
                part_of_speech: "#9CA3AF",
                definition: "#E5E7EB",
                example: "#9CA3AF",
            },
            Theme::Midnight => Palette {
                background: "#0B1026",
                word: "#E0E7FF",
                part_of_speech: "#818CF8",
                definition: "#C7D2FE",
                example: "#A5B4FC",
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::Midnight => "midnight",
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "midnight" => Ok(Theme::Midnight),
            other => Err(format!("unknown theme '{}' (expected light, dark or midnight)", other)),
        }
    }
}

/// Inputs that shape the document besides the entries themselves
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub viewport: Viewport,
    pub theme: Theme,
    /// Id of the root element the compositor captures
    pub target_id: String,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            theme: Theme::default(),
            target_id: DEFAULT_TARGET_ID.to_string(),
        }
    }
}

/// Escape `& < > " '` for embedding in HTML text or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_entry(out: &mut String, entry: &WordEntry, palette: &Palette) {
    // `write!` into a String cannot fail
    let _ = write!(
        out,
        r#"
    <div class="entry" style="margin-bottom: 46px; padding: 0 40px">
      <div style="display: flex; align-items: baseline; gap: 12px; margin-bottom: 12px;">
        <span class="word" style="font-size: 72px; font-weight: 700; letter-spacing: -0.02em; color: {word_color}; font-family: {display};">{word}</span>
        <span class="part-of-speech" style="color: {pos_color}; font-size: 36px; font-style: italic; font-weight: 400; font-family: {body};">({pos})</span>
      </div>
      <p class="definition" style="color: {def_color}; font-size: 36px; line-height: 1.5; font-weight: 400; margin-bottom: 16px; font-family: {body};">
        {definition}
      </p>
      <p class="example" style="color: {ex_color}; font-size: 32px; font-style: italic; font-weight: 400; line-height: 1.6; padding-left: 4px; font-family: {body};">
        "{example}"
      </p>
    </div>
"#,
        word_color = palette.word,
        pos_color = palette.part_of_speech,
        def_color = palette.definition,
        ex_color = palette.example,
        display = DISPLAY_FONT,
        body = BODY_FONT,
        word = escape_html(&entry.word),
        pos = escape_html(&entry.part_of_speech),
        definition = escape_html(&entry.definition),
        example = escape_html(&entry.example),
    );
}

/// Build the wallpaper document for `entries`, top to bottom in order.
pub fn render_document(entries: &[WordEntry], options: &LayoutOptions) -> String {
    let palette = options.theme.palette();
    let mut words_html = String::new();
    for entry in entries {
        render_entry(&mut words_html, entry, &palette);
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <link href="{fonts}" rel="stylesheet">
  <style>
    * {{
      margin: 0;
      padding: 0;
      box-sizing: border-box;
    }}
    html, body {{
      font-family: {body};
      width: {width}px;
      height: {height}px;
      overflow: hidden;
      background-color: {background};
    }}
  </style>
</head>
<body>
  <div id="{target}" data-theme="{theme}" style="display: flex; flex-direction: column; height: 100%; width: 100%; background-color: {background}; padding: 64px 48px; position: relative; overflow: hidden;">
    <div class="safe-area-top" style="height: {top}px;"></div>
    <div class="word-list" style="flex: 1 1 0%; display: flex; flex-direction: column; justify-content: center;">
{words}
    </div>
    <div class="safe-area-bottom" style="height: {bottom}px;"></div>
  </div>
</body>
</html>
"#,
        fonts = FONT_STYLESHEET,
        body = BODY_FONT,
        width = options.viewport.width,
        height = options.viewport.height,
        background = palette.background,
        target = escape_html(&options.target_id),
        theme = options.theme.as_str(),
        top = SAFE_AREA_TOP,
        bottom = SAFE_AREA_BOTTOM,
        words = words_html,
    )
}
