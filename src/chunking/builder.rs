use std::mem;

use anyhow::{Result, bail};
use tracing::debug;

use super::sentences::{looks_like_marker, split_sentences};
use super::structure::mentions_annex;
use super::types::{AnnotatedRecord, Chunk, ChunkMetadata, RecordKind, token_count};

pub const DEFAULT_MAX_TOKENS: usize = 500;
pub const DEFAULT_OVERLAP_TOKENS: usize = 100;
const LIST_OVERLAP_ITEMS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    max_tokens: usize,
    overlap_tokens: usize,
}

impl ChunkingConfig {
    pub fn new(max_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if max_tokens == 0 {
            bail!("max_tokens must be greater than zero");
        }
        if overlap_tokens >= max_tokens {
            bail!(
                "overlap_tokens ({}) must be smaller than max_tokens ({})",
                overlap_tokens,
                max_tokens
            );
        }

        Ok(Self {
            max_tokens,
            overlap_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap_tokens: DEFAULT_OVERLAP_TOKENS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkBuilder {
    config: ChunkingConfig,
}

impl ChunkBuilder {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn build(&self, records: &[AnnotatedRecord]) -> Vec<Chunk> {
        let mut assembler = ChunkAssembler::new(self.config);
        for record in records {
            if record.text.trim().is_empty() {
                continue;
            }
            assembler.push(record);
        }
        assembler.finish()
    }
}

#[derive(Debug, Clone)]
struct Sentence<'r> {
    text: String,
    tokens: usize,
    starts_clause: bool,
    record: &'r AnnotatedRecord,
}

#[derive(Debug)]
struct Window<'r> {
    heading: Option<&'r str>,
    heading_tokens: usize,
    sentences: Vec<Sentence<'r>>,
    tokens: usize,
    fresh: usize,
    first_fresh: Option<&'r AnnotatedRecord>,
    last_record: Option<&'r AnnotatedRecord>,
    last_clause_tokens: usize,
}

impl<'r> Window<'r> {
    fn new(heading: Option<&'r str>) -> Self {
        let heading_tokens = heading.map(token_count).unwrap_or(0);
        Self {
            heading,
            heading_tokens,
            sentences: Vec::new(),
            tokens: heading_tokens,
            fresh: 0,
            first_fresh: None,
            last_record: None,
            last_clause_tokens: 0,
        }
    }

    fn push(&mut self, sentence: Sentence<'r>) {
        self.tokens += sentence.tokens;
        self.fresh += 1;
        self.first_fresh.get_or_insert(sentence.record);
        self.last_record = Some(sentence.record);
        self.sentences.push(sentence);
    }

    fn render(&self) -> Option<Chunk> {
        let first = self.first_fresh?;
        let last = self.last_record.unwrap_or(first);

        let mut parts = Vec::<String>::new();
        if let Some(prefix) = qualifier_prefix(&last.context) {
            parts.push(prefix);
        }
        if let Some(heading) = self.heading {
            parts.push(heading.to_string());
        }
        parts.extend(self.sentences.iter().map(|sentence| sentence.text.clone()));

        Some(Chunk {
            chunk_text: parts.join(" "),
            heading: first.heading.clone(),
            metadata: ChunkMetadata {
                section: first.section.clone(),
                clause: first.clause.clone(),
                page: first.page,
                context: last.context.clone(),
                references: Vec::new(),
            },
        })
    }

    /// Starts the next window with the heading and the trailing sentences of
    /// this one: one sentence when the last clause was shorter than
    /// `overlap_tokens`, otherwise two. Sentences are carried whole.
    fn reseed(&mut self, overlap_tokens: usize) {
        let wanted = if self.last_clause_tokens < overlap_tokens {
            1
        } else {
            2
        };
        let start = self.sentences.len().saturating_sub(wanted);
        self.sentences.drain(..start);
        self.tokens = self.heading_tokens + self.carried_tokens();
        self.fresh = 0;
        self.first_fresh = None;
    }

    /// Drops carried sentences, oldest first, until `incoming` more tokens fit
    /// within `limit`. Only called before the first new sentence lands.
    fn shed_carry(&mut self, incoming: usize, limit: usize) {
        while self.fresh == 0 && !self.sentences.is_empty() && self.tokens + incoming > limit {
            let dropped = self.sentences.remove(0);
            self.tokens -= dropped.tokens;
        }
    }

    fn carried_tokens(&self) -> usize {
        self.sentences.iter().map(|sentence| sentence.tokens).sum()
    }
}

#[derive(Debug, Default)]
struct ListBuffer<'r> {
    items: Vec<&'r AnnotatedRecord>,
    tokens: usize,
    fresh: usize,
}

struct ChunkAssembler<'r> {
    config: ChunkingConfig,
    chunks: Vec<Chunk>,
    run_heading: Option<&'r str>,
    run_heading_record: Option<&'r AnnotatedRecord>,
    run_emitted: bool,
    section: Vec<&'r AnnotatedRecord>,
    list: ListBuffer<'r>,
}

impl<'r> ChunkAssembler<'r> {
    fn new(config: ChunkingConfig) -> Self {
        Self {
            config,
            chunks: Vec::new(),
            run_heading: None,
            run_heading_record: None,
            run_emitted: false,
            section: Vec::new(),
            list: ListBuffer::default(),
        }
    }

    fn push(&mut self, record: &'r AnnotatedRecord) {
        let is_heading = record.kind == RecordKind::Heading;
        if is_heading || record.heading.as_deref() != self.run_heading {
            self.finish_run();
            self.run_heading = record.heading.as_deref();
            self.run_heading_record = is_heading.then_some(record);
            self.run_emitted = false;
        }

        match record.kind {
            RecordKind::Heading => {}
            RecordKind::Table => {
                self.flush_pending();
                self.emit(Chunk::from_record(record.text.clone(), record));
            }
            RecordKind::ListItem => {
                self.flush_section();
                self.push_list_item(record);
            }
            _ if record.kind == RecordKind::Annex || mentions_annex(&record.text) => {
                self.flush_pending();
                self.emit(Chunk::from_record(record.text.clone(), record));
            }
            _ => {
                self.flush_list();
                self.section.push(record);
            }
        }
    }

    fn finish(mut self) -> Vec<Chunk> {
        self.finish_run();
        self.chunks
    }

    fn emit(&mut self, chunk: Chunk) {
        self.run_emitted = true;
        self.chunks.push(chunk);
    }

    fn flush_pending(&mut self) {
        self.flush_section();
        self.flush_list();
    }

    fn finish_run(&mut self) {
        self.flush_pending();
        if self.run_emitted {
            return;
        }

        if let Some(record) = self.run_heading_record.take() {
            self.emit(Chunk::from_record(record.text.clone(), record));
        }
    }

    fn push_list_item(&mut self, record: &'r AnnotatedRecord) {
        self.list.items.push(record);
        self.list.tokens += token_count(&record.text);
        self.list.fresh += 1;

        if self.list.tokens < self.config.max_tokens {
            return;
        }

        self.emit_list();
        let keep_from = self.list.items.len().saturating_sub(LIST_OVERLAP_ITEMS);
        self.list.items.drain(..keep_from);
        self.list.tokens = self
            .list
            .items
            .iter()
            .map(|item| token_count(&item.text))
            .sum();
        self.list.fresh = 0;
    }

    fn flush_list(&mut self) {
        if self.list.fresh > 0 {
            self.emit_list();
        }
        self.list = ListBuffer::default();
    }

    fn emit_list(&mut self) {
        let (Some(first), Some(last)) = (self.list.items.first(), self.list.items.last()) else {
            return;
        };

        let mut parts = Vec::<String>::new();
        if let Some(prefix) = qualifier_prefix(&last.context) {
            parts.push(prefix);
        }
        parts.extend(self.list.items.iter().map(|item| item.text.clone()));

        let mut chunk = Chunk::from_record(parts.join(" "), first);
        chunk.metadata.context = last.context.clone();
        self.emit(chunk);
    }

    fn flush_section(&mut self) {
        if self.section.is_empty() {
            return;
        }

        let records = mem::take(&mut self.section);
        let sentences = section_sentences(&records);
        debug!(
            records = records.len(),
            sentences = sentences.len(),
            heading = self.run_heading.unwrap_or(""),
            "windowing section"
        );

        let mut window = Window::new(self.run_heading);
        let mut clause = Vec::<Sentence<'r>>::new();

        for sentence in sentences {
            if sentence.starts_clause && !clause.is_empty() {
                self.commit_clause(&mut window, mem::take(&mut clause));
            }
            clause.push(sentence);
        }
        if !clause.is_empty() {
            self.commit_clause(&mut window, clause);
        }

        if window.fresh > 0 {
            if let Some(chunk) = window.render() {
                self.emit(chunk);
            }
        }
    }

    fn commit_clause(&mut self, window: &mut Window<'r>, clause: Vec<Sentence<'r>>) {
        let clause_tokens = clause.iter().map(|sentence| sentence.tokens).sum::<usize>();
        let prefix_tokens = clause
            .last()
            .map(|sentence| qualifier_prefix_tokens(&sentence.record.context))
            .unwrap_or(0);

        if window.fresh > 0
            && prefix_tokens + window.tokens + clause_tokens > self.config.max_tokens
        {
            self.rotate(window);
        }

        window.last_clause_tokens = clause_tokens;
        for sentence in clause {
            let prefix_tokens = qualifier_prefix_tokens(&sentence.record.context);
            if window.fresh > 0
                && prefix_tokens + window.tokens + sentence.tokens > self.config.max_tokens
            {
                self.rotate(window);
            }
            window.shed_carry(
                prefix_tokens + sentence.tokens,
                self.config.max_tokens + self.config.overlap_tokens,
            );
            window.push(sentence);
        }
    }

    fn rotate(&mut self, window: &mut Window<'r>) {
        if let Some(chunk) = window.render() {
            self.emit(chunk);
        }
        window.reseed(self.config.overlap_tokens);
    }
}

fn section_sentences<'r>(records: &[&'r AnnotatedRecord]) -> Vec<Sentence<'r>> {
    let mut out = Vec::<Sentence<'r>>::new();
    for &record in records {
        for (index, text) in split_sentences(&record.text).into_iter().enumerate() {
            let opens_with_marker = text
                .split_whitespace()
                .next()
                .map(looks_like_marker)
                .unwrap_or(false);
            out.push(Sentence {
                tokens: token_count(&text),
                starts_clause: opens_with_marker
                    || (index == 0 && record.kind == RecordKind::Clause),
                text,
                record,
            });
        }
    }
    out
}

fn qualifier_prefix(context: &[String]) -> Option<String> {
    if context.is_empty() {
        return None;
    }

    Some(
        context
            .iter()
            .map(|qualifier| format!("[{qualifier}]"))
            .collect::<Vec<String>>()
            .join(" "),
    )
}

fn qualifier_prefix_tokens(context: &[String]) -> usize {
    context.iter().map(|qualifier| token_count(qualifier)).sum()
}
