use anyhow::Result;
use html5ever::tendril::TendrilSink;
use html5ever::{Attribute, LocalName, parse_document};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use porter_stemmer::stem;
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::OnceLock;

static STOP_WORDS: OnceLock<HashSet<String>> = OnceLock::new();

fn get_stop_words() -> &'static HashSet<String> {
    STOP_WORDS.get_or_init(|| {
        stop_words::get(stop_words::LANGUAGE::English)
            .into_iter()
            .map(|x| x.to_string())
            .collect()
    })
}

pub fn is_stop_word(word: &str) -> bool {
    get_stop_words().contains(word)
}

#[derive(Clone, Default, Debug)]
pub struct ExtractedText {
    pub title: String,
    pub headings: Vec<String>,
    /// Readable text in document order, headings and inline links included.
    pub body: String,
    pub anchors: Vec<String>,
    /// Number of `<h1>` elements outside boilerplate containers.
    pub h1_count: usize,
}

#[derive(Debug, Clone, PartialEq, Copy)]
pub enum Context {
    Title,
    Heading,
    Anchor,
    Body,
}

/// A character filter receives the original text as a stream of characters and can transform the stream by adding,
/// removing, or changing characters. For instance, a character filter could be used to strip HTML elements
/// like <b> from the stream.
pub trait CharacterFilter: Send + Sync {
    fn filter(&self, text: String) -> String;
}

/// Make sure you are giving it a valid html text.
#[derive(Debug, Default)]
pub struct HTMLTagFilter;

impl HTMLTagFilter {
    pub fn get_dom(html: &str) -> std::io::Result<RcDom> {
        parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut std::io::Cursor::new(html))
    }

    /// Parses `html` and walks it, dropping scripts, styles and boilerplate containers.
    pub fn extract(html: &str) -> ExtractedText {
        let mut out = ExtractedText::default();
        match Self::get_dom(html) {
            Ok(dom) => Self::walk_html(&dom.document, Context::Body, &mut out),
            Err(e) => log::warn!("failed to parse html, treating as empty: {e}"),
        }
        out
    }

    pub fn has_boilerplate_class_or_id(attrs: &RefCell<Vec<Attribute>>) -> bool {
        for attr in attrs.borrow().iter() {
            let name = &*attr.name.local;
            if name != "class" && name != "id" {
                continue;
            }
            let v = attr.value.to_lowercase();
            if v.contains("nav")
                || v.contains("menu")
                || v.contains("sidebar")
                || v.contains("footer")
                || v.contains("cookie")
                || v.contains("banner")
                || v.contains("promo")
                || v.contains("ads")
                || v.contains("badge")
            {
                return true;
            }
        }

        false
    }

    pub fn is_skipped_element(local: &LocalName) -> bool {
        matches!(
            &**local,
            "script" | "style" | "noscript" | "template" | "svg" | "nav" | "footer" | "aside"
        )
    }

    pub fn is_block_like(local: &LocalName) -> bool {
        matches!(
            &**local,
            "p" | "div"
                | "section"
                | "article"
                | "li"
                | "ul"
                | "ol"
                | "header"
                | "main"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "br"
                | "tr"
        )
    }

    fn push_body(out: &mut ExtractedText, s: &str) {
        if !out.body.is_empty() && !out.body.ends_with(' ') && !out.body.ends_with('\n') {
            out.body.push(' ');
        }
        out.body.push_str(s);
    }

    fn push_to_last(entries: &mut Vec<String>, s: &str) {
        match entries.last_mut() {
            Some(last) => {
                if !last.is_empty() {
                    last.push(' ');
                }
                last.push_str(s);
            }
            None => entries.push(s.to_string()),
        }
    }

    pub fn walk_html(handle: &Handle, ctx: Context, out: &mut ExtractedText) {
        let node = handle;
        match &node.data {
            NodeData::Text { contents } => {
                let s = contents.borrow();
                let s = s.trim();
                if s.is_empty() {
                    return;
                }

                match ctx {
                    Context::Title => {
                        if !out.title.is_empty() {
                            out.title.push(' ');
                        }
                        out.title.push_str(s);
                    }
                    Context::Heading => {
                        Self::push_to_last(&mut out.headings, s);
                        Self::push_body(out, s);
                    }
                    Context::Anchor => {
                        Self::push_to_last(&mut out.anchors, s);
                        Self::push_body(out, s);
                    }
                    Context::Body => Self::push_body(out, s),
                }
            }
            NodeData::Element { name, attrs, .. } => {
                let local = &name.local;

                if Self::is_skipped_element(local) || Self::has_boilerplate_class_or_id(attrs) {
                    return;
                }

                let new_ctx = if &**local == "title" {
                    Context::Title
                } else if matches!(&**local, "h1" | "h2" | "h3" | "h4" | "h5" | "h6") {
                    if &**local == "h1" {
                        out.h1_count += 1;
                    }
                    out.headings.push(String::new());
                    Context::Heading
                } else if &**local == "a" {
                    out.anchors.push(String::new());
                    match ctx {
                        // link inside a heading still belongs to the heading
                        Context::Heading => Context::Heading,
                        _ => Context::Anchor,
                    }
                } else {
                    match ctx {
                        Context::Title => Context::Body,
                        other => other,
                    }
                };

                if ctx == Context::Body && Self::is_block_like(local) && !out.body.is_empty() {
                    if !out.body.ends_with('\n') {
                        out.body.push('\n');
                    }
                }

                for child in node.children.borrow().iter() {
                    Self::walk_html(child, new_ctx, out);
                }
            }
            _ => {
                for child in node.children.borrow().iter() {
                    Self::walk_html(child, ctx, out);
                }
            }
        }
    }
}

impl CharacterFilter for HTMLTagFilter {
    fn filter(&self, html: String) -> String {
        Self::extract(&html).body
    }
}

/// A tokenizer receives a stream of characters, breaks it up into individual tokens (usually individual words),
/// and outputs a stream of tokens.
/// For instance, a whitespace tokenizer breaks text into tokens whenever it sees any whitespace.
/// It would convert the text "Quick brown fox!" into the terms [Quick, brown, fox!].
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: String) -> Vec<String>;
}

pub struct WhiteSpaceTokenizer;

impl Tokenizer for WhiteSpaceTokenizer {
    fn tokenize(&self, text: String) -> Vec<String> {
        text.split_whitespace()
            .map(|w| w.to_string())
            .collect::<Vec<String>>()
    }
}

/// A token filter receives the token stream and may add, remove, or change tokens.
/// For example, a lowercase token filter converts all tokens to lowercase, a stop token
/// filter removes common words (stop words) like the from the token stream.
pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken>;
}

pub struct LowerCaseTokenFilter;

impl TokenFilter for LowerCaseTokenFilter {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken> {
        tokens
            .into_iter()
            .map(|mut t| {
                t.term = t.term.to_lowercase();
                t
            })
            .collect()
    }
}

pub struct StopWordTokenFilter;

impl TokenFilter for StopWordTokenFilter {
    fn filter(&self, mut tokens: Vec<TextToken>) -> Vec<TextToken> {
        let stop_words = get_stop_words();
        tokens.retain(|w| !stop_words.contains(&w.term));
        tokens
    }
}

pub struct PorterStemmerTokenFilter;

impl TokenFilter for PorterStemmerTokenFilter {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken> {
        tokens
            .into_iter()
            .map(|mut w| {
                w.term = stem(&w.term);
                w
            })
            .collect::<Vec<TextToken>>()
    }
}

/// Removes every non-alphanumeric character from each token ("don't" -> "dont",
/// "e-mail," -> "email") and drops tokens left shorter than `min_length`.
pub struct PunctuationStripFilter {
    min_length: usize,
}

impl PunctuationStripFilter {
    pub fn new(min_length: usize) -> Self {
        Self {
            min_length: min_length.max(1),
        }
    }
}

impl Default for PunctuationStripFilter {
    fn default() -> Self {
        Self { min_length: 2 }
    }
}

impl TokenFilter for PunctuationStripFilter {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken> {
        tokens
            .into_iter()
            .filter_map(|mut token| {
                let stripped: String = token.term.chars().filter(|c| c.is_alphanumeric()).collect();
                if stripped.chars().count() >= self.min_length {
                    token.term = stripped;
                    Some(token)
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Filters out tokens that are purely numeric (like "123", "2024", etc.)
pub struct NumericTokenFilter;

impl TokenFilter for NumericTokenFilter {
    fn filter(&self, tokens: Vec<TextToken>) -> Vec<TextToken> {
        tokens
            .into_iter()
            .filter(|token| token.term.chars().any(|c| c.is_alphabetic()))
            .collect()
    }
}

/// Pure text analysis pipeline - no async, no I/O, just text transformations
pub struct TextAnalyzer {
    char_filters: Vec<Box<dyn CharacterFilter>>,
    tokenizer: Box<dyn Tokenizer>,
    token_filters: Vec<Box<dyn TokenFilter>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextToken {
    pub term: String,
    pub pos: usize,
}

impl std::ops::Deref for TextToken {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.term
    }
}

impl TextAnalyzer {
    pub fn new(
        char_filters: Vec<Box<dyn CharacterFilter>>,
        tokenizer: Box<dyn Tokenizer>,
        token_filters: Vec<Box<dyn TokenFilter>>,
    ) -> Self {
        Self {
            char_filters,
            tokenizer,
            token_filters,
        }
    }

    /// Canonical token stream used for shingling: lowercase, punctuation
    /// stripped, whitespace collapsed. Every word survives, stop words included.
    pub fn canonical() -> Self {
        Self::new(
            vec![],
            Box::new(WhiteSpaceTokenizer),
            vec![
                Box::new(LowerCaseTokenFilter),
                Box::new(PunctuationStripFilter::new(1)),
            ],
        )
    }

    /// Keyword pipeline for content heuristics: no stop words, no numbers, stemmed.
    pub fn keywords() -> Self {
        Self::new(
            vec![],
            Box::new(WhiteSpaceTokenizer),
            vec![
                Box::new(PunctuationStripFilter::default()),
                Box::new(LowerCaseTokenFilter),
                Box::new(NumericTokenFilter),
                Box::new(StopWordTokenFilter),
                Box::new(PorterStemmerTokenFilter),
            ],
        )
    }

    pub fn char_filter(&self, mut content: String) -> String {
        for filter in self.char_filters.iter() {
            content = filter.filter(content);
        }
        content
    }

    pub fn tokenize(&self, content: String) -> Vec<TextToken> {
        let tokens = self.tokenizer.tokenize(content);
        tokens
            .into_iter()
            .enumerate()
            .map(|(idx, term)| TextToken { term, pos: idx })
            .collect()
    }

    pub fn token_filter(&self, mut tokens: Vec<TextToken>) -> Vec<TextToken> {
        for filter in self.token_filters.iter() {
            tokens = filter.filter(tokens);
        }
        tokens
    }

    /// Analyzes raw content and returns a list of tokens
    pub fn analyze(&self, raw_content: String) -> Result<Vec<TextToken>> {
        let content = self.char_filter(raw_content);

        let mut tokens = self.tokenize(content);

        tokens = self.token_filter(tokens);
        Ok(tokens)
    }

    /// Same as [`TextAnalyzer::analyze`] but returns only the terms.
    pub fn terms(&self, raw_content: &str) -> Vec<String> {
        let content = self.char_filter(raw_content.to_string());
        let tokens = self.token_filter(self.tokenize(content));
        tokens.into_iter().map(|t| t.term).collect()
    }
}
