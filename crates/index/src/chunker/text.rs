use std::path::Path;

use loupe_core::{Chunk, ChunkKind, Language, estimate_tokens};

use super::Chunker;

/// Paragraph chunker for markdown and plain text.
///
/// Paragraphs are blank-line separated; consecutive paragraphs merge
/// until the group reaches `target_tokens`. A markdown heading always
/// starts a new group and becomes the group's summary.
pub struct TextChunker {
  target_tokens: u32,
  languages: Vec<Language>,
}

impl Default for TextChunker {
  fn default() -> Self {
    Self {
      target_tokens: 200,
      languages: vec![Language::Markdown, Language::Text, Language::Html],
    }
  }
}

struct Paragraph {
  start_line: usize,
  end_line: usize,
  text: String,
  heading: bool,
}

impl TextChunker {
  fn paragraphs(text: &str) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<(usize, &str)> = Vec::new();

    let flush = |current: &mut Vec<(usize, &str)>, paragraphs: &mut Vec<Paragraph>| {
      if current.is_empty() {
        return;
      }
      let start_line = current[0].0;
      let end_line = current[current.len() - 1].0;
      let body: Vec<&str> = current.iter().map(|(_, l)| *l).collect();
      let heading = body.len() == 1 && body[0].trim_start().starts_with('#');
      paragraphs.push(Paragraph {
        start_line,
        end_line,
        text: body.join("\n"),
        heading,
      });
      current.clear();
    };

    for (i, line) in text.lines().enumerate() {
      let is_heading = line.trim_start().starts_with('#') && line.trim_start().chars().take_while(|c| *c == '#').count() <= 6;
      if line.trim().is_empty() {
        flush(&mut current, &mut paragraphs);
      } else if is_heading {
        flush(&mut current, &mut paragraphs);
        current.push((i + 1, line));
        flush(&mut current, &mut paragraphs);
      } else {
        current.push((i + 1, line));
      }
    }
    flush(&mut current, &mut paragraphs);
    paragraphs
  }
}

impl Chunker for TextChunker {
  fn id(&self) -> &'static str {
    "text"
  }

  fn supported_languages(&self) -> &[Language] {
    &self.languages
  }

  fn chunk(&self, text: &str, _path: &Path, _language: Option<Language>) -> Vec<Chunk> {
    if text.trim().is_empty() {
      return Vec::new();
    }

    let paragraphs = Self::paragraphs(text);
    let mut chunks: Vec<Chunk> = Vec::new();

    let mut group: Vec<&Paragraph> = Vec::new();
    let mut group_tokens = 0u32;
    let mut group_heading: Option<String> = None;

    let flush_group =
      |group: &mut Vec<&Paragraph>, group_tokens: &mut u32, group_heading: &mut Option<String>, chunks: &mut Vec<Chunk>| {
        if group.is_empty() {
          return;
        }
        let start = group[0].start_line as u32;
        let end = group[group.len() - 1].end_line as u32;
        let body = group.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n\n");
        let mut chunk = Chunk::new(ChunkKind::Paragraph, start, end, body);
        if let Some(heading) = group_heading.take() {
          chunk = chunk.with_summary(heading);
        }
        chunks.push(chunk);
        group.clear();
        *group_tokens = 0;
      };

    for paragraph in &paragraphs {
      let tokens = estimate_tokens(&paragraph.text);
      if paragraph.heading {
        flush_group(&mut group, &mut group_tokens, &mut group_heading, &mut chunks);
        group_heading = Some(paragraph.text.trim_start_matches(['#', ' ']).to_string());
        group.push(paragraph);
        group_tokens = tokens;
        continue;
      }
      if group_tokens > 0 && group_tokens + tokens > self.target_tokens {
        flush_group(&mut group, &mut group_tokens, &mut group_heading, &mut chunks);
      }
      group.push(paragraph);
      group_tokens += tokens;
    }
    flush_group(&mut group, &mut group_tokens, &mut group_heading, &mut chunks);

    chunks
  }
}
