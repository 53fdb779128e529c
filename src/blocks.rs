//! Markdown → Notion block compilation.
//!
//! This is a line scanner, not a markdown parser: only block structure
//! (paragraphs, ATX headings, flat list items, quotes, fenced code) survives.
//! Inline emphasis and links are passed through as literal text.
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

/// Largest text run Notion accepts is 2000 characters; leave headroom.
pub const MAX_TEXT_RUN: usize = 1900;

pub const DEFAULT_CODE_LANGUAGE: &str = "plain text";

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").expect("valid heading regex"));
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*]\s+").expect("valid bullet regex"));
static ORDERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\s+").expect("valid ordered-list regex"));

/// One length-bounded chunk of text inside a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    /// Level is always within 1..=3.
    Heading(u8),
    BulletedItem,
    NumberedItem,
    Quote,
    Code { language: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentBlock {
    pub kind: BlockKind,
    pub runs: Vec<TextRun>,
}

impl DocumentBlock {
    pub fn new(kind: BlockKind, text: &str, max_run: usize) -> Self {
        let kind = match kind {
            BlockKind::Heading(level) => BlockKind::Heading(level.clamp(1, 3)),
            other => other,
        };
        let runs = chunk_text(text, max_run)
            .into_iter()
            .map(|c| TextRun {
                content: c.to_string(),
            })
            .collect();
        Self { kind, runs }
    }

    pub fn paragraph(text: &str) -> Self {
        Self::new(BlockKind::Paragraph, text, MAX_TEXT_RUN)
    }

    /// Concatenated text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.content.as_str()).collect()
    }

    /// Notion block type name.
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading(1) => "heading_1",
            BlockKind::Heading(2) => "heading_2",
            BlockKind::Heading(_) => "heading_3",
            BlockKind::BulletedItem => "bulleted_list_item",
            BlockKind::NumberedItem => "numbered_list_item",
            BlockKind::Quote => "quote",
            BlockKind::Code { .. } => "code",
        }
    }

    /// Render as a Notion block object for page create / children append.
    pub fn to_notion(&self) -> Value {
        let rich_text: Vec<Value> = self.runs.iter().map(|r| text_run_json(&r.content)).collect();
        let body = match &self.kind {
            BlockKind::Code { language } => json!({ "rich_text": rich_text, "language": language }),
            _ => json!({ "rich_text": rich_text }),
        };
        let type_name = self.type_name();
        json!({
            "object": "block",
            "type": type_name,
            type_name: body,
        })
    }
}

fn text_run_json(content: &str) -> Value {
    json!({ "type": "text", "text": { "content": content } })
}

/// Notion rich-text array for `text`, chunked to `max_run` characters.
pub fn rich_text(text: &str, max_run: usize) -> Vec<Value> {
    chunk_text(text, max_run)
        .into_iter()
        .map(text_run_json)
        .collect()
}

/// Split `text` into consecutive pieces of at most `max` characters.
/// Splits fall on char boundaries, never on words. Empty text yields no pieces.
pub fn chunk_text(text: &str, max: usize) -> Vec<&str> {
    let max = max.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == max {
            chunks.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Compile markdown into blocks with the default run size.
pub fn compile(markdown: &str) -> Vec<DocumentBlock> {
    compile_with(markdown, MAX_TEXT_RUN)
}

/// Compile markdown into blocks, chunking every text payload to `max_run`.
///
/// Empty input gives no blocks. Any other input gives at least one block: if
/// the scan finds nothing, the trimmed input becomes a single paragraph.
pub fn compile_with(markdown: &str, max_run: usize) -> Vec<DocumentBlock> {
    if markdown.is_empty() {
        return Vec::new();
    }

    let mut scanner = Scanner::new(max_run);
    for line in markdown.lines() {
        scanner.feed(line);
    }
    let mut blocks = scanner.finish();

    if blocks.is_empty() {
        blocks.push(DocumentBlock::new(
            BlockKind::Paragraph,
            markdown.trim(),
            max_run,
        ));
    }
    blocks
}

struct CodeBuffer {
    language: String,
    lines: Vec<String>,
}

struct Scanner {
    max_run: usize,
    blocks: Vec<DocumentBlock>,
    paragraph: Vec<String>,
    code: Option<CodeBuffer>,
}

impl Scanner {
    fn new(max_run: usize) -> Self {
        Self {
            max_run,
            blocks: Vec::new(),
            paragraph: Vec::new(),
            code: None,
        }
    }

    fn push(&mut self, kind: BlockKind, text: &str) {
        self.blocks.push(DocumentBlock::new(kind, text, self.max_run));
    }

    fn feed(&mut self, line: &str) {
        let stripped = line.trim();

        if let Some(code) = self.code.as_mut() {
            if stripped.starts_with("```") {
                self.flush_code();
            } else {
                code.lines.push(line.to_string());
            }
            return;
        }

        if stripped.is_empty() {
            self.flush_paragraph();
            return;
        }

        if stripped.starts_with("```") {
            self.flush_paragraph();
            self.code = Some(CodeBuffer {
                language: normalize_language(stripped.trim_matches('`')),
                lines: Vec::new(),
            });
            return;
        }

        if let Some(caps) = HEADING_RE.captures(stripped) {
            self.flush_paragraph();
            let level = caps[1].len().min(3) as u8;
            let content = caps[2].trim();
            if !content.is_empty() {
                self.push(BlockKind::Heading(level), content);
            }
            return;
        }

        if let Some(m) = BULLET_RE.find(stripped) {
            self.flush_paragraph();
            self.push_item(BlockKind::BulletedItem, &stripped[m.end()..]);
            return;
        }

        if let Some(m) = ORDERED_RE.find(stripped) {
            self.flush_paragraph();
            self.push_item(BlockKind::NumberedItem, &stripped[m.end()..]);
            return;
        }

        if let Some(rest) = stripped.strip_prefix('>') {
            self.flush_paragraph();
            let content = rest.trim_start_matches('>').trim();
            if !content.is_empty() {
                self.push(BlockKind::Quote, content);
            }
            return;
        }

        self.paragraph.push(stripped.to_string());
    }

    fn push_item(&mut self, kind: BlockKind, content: &str) {
        let content = content.trim();
        if !content.is_empty() {
            self.push(kind, content);
        }
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = self.paragraph.join(" ");
        self.paragraph.clear();
        let text = text.trim();
        if !text.is_empty() {
            self.push(BlockKind::Paragraph, text);
        }
    }

    fn flush_code(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };
        let text = code.lines.join("\n");
        let text = text.trim_end_matches('\n');
        if !text.is_empty() {
            self.push(
                BlockKind::Code {
                    language: code.language,
                },
                text,
            );
        }
    }

    fn finish(mut self) -> Vec<DocumentBlock> {
        self.flush_code();
        self.flush_paragraph();
        self.blocks
    }
}

const NOTION_LANGUAGES: &[&str] = &[
    "abap", "agda", "arduino", "ascii art", "assembly", "bash", "basic", "bnf", "c", "c#", "c++",
    "clojure", "coffeescript", "coq", "css", "dart", "dhall", "diff", "docker", "ebnf", "elixir",
    "elm", "erlang", "f#", "flow", "fortran", "gherkin", "glsl", "go", "graphql", "groovy",
    "haskell", "hcl", "html", "idris", "java", "javascript", "json", "julia", "kotlin", "latex",
    "less", "lisp", "livescript", "llvm ir", "lua", "makefile", "markdown", "markup", "matlab",
    "mathematica", "mermaid", "nix", "notion formula", "objective-c", "ocaml", "pascal", "perl",
    "php", "plain text", "powershell", "prolog", "protobuf", "purescript", "python", "r",
    "racket", "reason", "ruby", "rust", "sass", "scala", "scheme", "scss", "shell", "smalltalk",
    "solidity", "sql", "swift", "toml", "typescript", "vb.net", "verilog", "vhdl",
    "visual basic", "webassembly", "xml", "yaml", "java/c/c++/c#",
];

/// Map a fence info string to a language Notion accepts.
/// Unknown or missing languages become `plain text`.
pub fn normalize_language(info: &str) -> String {
    let token = info
        .split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .find(|t| !t.is_empty())
        .unwrap_or("")
        .to_ascii_lowercase();
    let alias = match token.as_str() {
        "" => DEFAULT_CODE_LANGUAGE,
        "js" | "jsx" | "mjs" | "node" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" | "python3" => "python",
        "rs" => "rust",
        "rb" => "ruby",
        "sh" | "zsh" | "console" | "shell-session" => "shell",
        "ps1" | "pwsh" => "powershell",
        "yml" => "yaml",
        "cpp" | "cxx" | "hpp" => "c++",
        "cs" | "csharp" => "c#",
        "fs" | "fsharp" => "f#",
        "golang" => "go",
        "dockerfile" => "docker",
        "md" => "markdown",
        "htm" | "xhtml" => "html",
        "jsonc" | "json5" => "json",
        "objc" | "objectivec" => "objective-c",
        "kt" | "kts" => "kotlin",
        "hs" => "haskell",
        "ex" | "exs" => "elixir",
        "ml" => "ocaml",
        "clj" | "cljs" => "clojure",
        "tf" | "terraform" => "hcl",
        "tex" => "latex",
        "wasm" | "wat" => "webassembly",
        "proto" => "protobuf",
        "patch" => "diff",
        "make" => "makefile",
        "text" | "txt" | "plaintext" | "plain" => DEFAULT_CODE_LANGUAGE,
        other => other,
    };
    if NOTION_LANGUAGES.contains(&alias) {
        alias.to_string()
    } else {
        DEFAULT_CODE_LANGUAGE.to_string()
    }
}
