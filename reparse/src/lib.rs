//! Classify a command line against getopt-style specs and re-emit it as
//! shell source.
//!
//! The pieces, leaves first:
//! - [`long_spec_tokens`] splits a free-form long-option spec
//!   (`"--foo-bar: verbose,level::"`) into names and arities.
//! - [`LongOptionTable`] collects those names, with optional
//!   punctuation-free aliases.
//! - [`ShortOptionSpec`] reads a getopt short spec (`":ab:c::"`).
//! - [`Scanner`] walks the tokens the way `getopt_long` does in permute mode
//!   and yields one [`ClassifiedEvent`] per step.
//! - [`reparse`] folds the events into a single string of shell words that
//!   can be handed to `eval` or `set --`.

use std::fmt;

// ============================================================================
// Result and Error types
// ============================================================================

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    EmptyName,
    LeadingDash(String),
    TrailingColon(String),
    /// A long-option spec had `rejected` tokens that could not be registered.
    LongSpec { spec: String, rejected: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyName => write!(f, "empty long option name"),
            Error::LeadingDash(s) => write!(f, "long option name starts with '-': {}", s),
            Error::TrailingColon(s) => write!(f, "long option name ends with ':': {}", s),
            Error::LongSpec { spec, rejected } => write!(
                f,
                "empty or illegal long option spec: {} ({} rejected)",
                spec, rejected
            ),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Arity
// ============================================================================

/// Whether an option takes a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    NoArgument,
    Required,
    Optional,
}

// ============================================================================
// Long-option spec tokenizer
// ============================================================================

fn is_spec_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | ',' | '|')
}

/// Split a long-option spec into `(name, arity)` pairs.
///
/// Tokens are separated by runs of whitespace, commas or pipes. A token may
/// start with `--`; a trailing `:` makes the argument required and `::`
/// makes it optional. Names are returned as they are: validation happens in
/// [`LongOptionTable::insert`].
pub fn long_spec_tokens(spec: &str) -> impl Iterator<Item = (&str, Arity)> + '_ {
    spec.split(is_spec_separator)
        .filter(|token| !token.is_empty())
        .filter_map(split_long_token)
}

fn split_long_token(token: &str) -> Option<(&str, Arity)> {
    let mut name = token;

    if name.len() >= 3 && name.starts_with("--") {
        name = &name[2..];
    }

    let arity = if name.len() >= 3 && name.ends_with("::") {
        name = &name[..name.len() - 2];
        Arity::Optional
    } else if name.len() >= 2 && name.ends_with(':') {
        name = &name[..name.len() - 1];
        Arity::Required
    } else {
        Arity::NoArgument
    };

    if name.is_empty() {
        None
    } else {
        Some((name, arity))
    }
}

/// Remove every ASCII punctuation character from `name`.
///
/// The same classification is used for building aliases and for printing
/// matched names, so the two always agree.
pub fn strip_punctuation(name: &str) -> String {
    name.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

// ============================================================================
// LongOptionTable
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongOpt {
    pub name: String,
    pub arity: Arity,
}

/// Result of looking a (possibly abbreviated) name up in the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(usize),
    Ambiguous(Vec<usize>),
    Missing,
}

/// Ordered set of long options. An entry's index never changes once it has
/// been assigned.
#[derive(Debug, Clone, Default)]
pub struct LongOptionTable {
    entries: Vec<LongOpt>,
}

impl LongOptionTable {
    pub fn new() -> Self {
        LongOptionTable {
            entries: Vec::new(),
        }
    }

    /// Register `name`, or overwrite the arity of an existing entry with the
    /// same name. Returns the entry's index.
    pub fn insert(&mut self, name: &str, arity: Arity) -> Result<usize> {
        if name.is_empty() {
            return Err(Error::EmptyName);
        }
        if name.starts_with('-') {
            return Err(Error::LeadingDash(name.to_string()));
        }
        if name.ends_with(':') {
            return Err(Error::TrailingColon(name.to_string()));
        }

        if let Some(idx) = self.position(name) {
            log::debug!("long option --{} redefined as {:?}", name, arity);
            self.entries[idx].arity = arity;
            return Ok(idx);
        }

        self.entries.push(LongOpt {
            name: name.to_string(),
            arity,
        });
        log::debug!(
            "long option --{} ({:?}) registered at {}",
            name,
            arity,
            self.entries.len() - 1
        );
        Ok(self.entries.len() - 1)
    }

    /// Register every token of `spec`. With `normalize_punctuation`, a name
    /// containing punctuation also gets its stripped form registered.
    ///
    /// Returns how many tokens were rejected. Failed aliases are not counted.
    pub fn insert_from_spec(&mut self, spec: &str, normalize_punctuation: bool) -> usize {
        let mut rejected = 0;

        for (name, arity) in long_spec_tokens(spec) {
            if let Err(e) = self.insert(name, arity) {
                log::debug!("rejected long option token {:?}: {}", name, e);
                rejected += 1;
                continue;
            }

            if normalize_punctuation {
                let alias = strip_punctuation(name);
                if alias.len() < name.len() {
                    if let Err(e) = self.insert(&alias, arity) {
                        log::debug!("skipped alias {:?} of --{}: {}", alias, name, e);
                    }
                }
            }
        }

        rejected
    }

    /// Like [`insert_from_spec`](Self::insert_from_spec), but a single bad
    /// token rejects the whole spec.
    pub fn add_spec(&mut self, spec: &str, normalize_punctuation: bool) -> Result<()> {
        match self.insert_from_spec(spec, normalize_punctuation) {
            0 => Ok(()),
            rejected => Err(Error::LongSpec {
                spec: spec.to_string(),
                rejected,
            }),
        }
    }

    pub fn get(&self, idx: usize) -> Option<&LongOpt> {
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LongOpt> {
        self.entries.iter()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Exact match first, then a unique prefix.
    pub fn lookup(&self, name: &str) -> Lookup {
        if let Some(idx) = self.position(name) {
            return Lookup::Found(idx);
        }

        let candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.name.starts_with(name))
            .map(|(idx, _)| idx)
            .collect();

        match candidates.len() {
            0 => Lookup::Missing,
            1 => Lookup::Found(candidates[0]),
            _ => Lookup::Ambiguous(candidates),
        }
    }
}

// ============================================================================
// ShortOptionSpec
// ============================================================================

/// A getopt short-option spec such as `":ab:c::"`.
///
/// A leading `:` (or [`quiet`](Self::quiet)) makes missing arguments come back
/// as [`ClassifiedEvent::MissingArgument`] without diagnostics; a leading `+`
/// stops scanning at the first operand.
///
/// GNU's `W;` (`-W foo` read as `--foo`) is not supported: `;` is skipped and
/// `W` is an ordinary option letter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortOptionSpec {
    quiet: bool,
    in_order: bool,
    options: Vec<(char, Arity)>,
}

impl ShortOptionSpec {
    pub fn parse(spec: &str) -> Self {
        let mut parsed = ShortOptionSpec::default();
        let mut chars = spec.chars().peekable();

        while let Some(&c) = chars.peek() {
            match c {
                ':' => parsed.quiet = true,
                '+' => parsed.in_order = true,
                _ => break,
            }
            chars.next();
        }

        while let Some(c) = chars.next() {
            if c == ':' || c == ';' {
                continue;
            }

            let mut arity = Arity::NoArgument;
            if chars.next_if_eq(&':').is_some() {
                arity = Arity::Required;
                if chars.next_if_eq(&':').is_some() {
                    arity = Arity::Optional;
                }
            }

            if parsed.arity(c).is_none() {
                parsed.options.push((c, arity));
            }
        }

        parsed
    }

    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Make `0`-`9` available as flags, unless the spec already mentions a
    /// digit.
    pub fn with_digits(mut self) -> Self {
        if !self.options.iter().any(|(c, _)| c.is_ascii_digit()) {
            self.options
                .extend(('0'..='9').map(|c| (c, Arity::NoArgument)));
        }
        self
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn is_in_order(&self) -> bool {
        self.in_order
    }

    pub fn arity(&self, c: char) -> Option<Arity> {
        self.options
            .iter()
            .find(|(opt, _)| *opt == c)
            .map(|(_, arity)| *arity)
    }
}

// ============================================================================
// Events
// ============================================================================

/// Why a token could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    InvalidShort(char),
    ShortNeedsArgument(char),
    /// Everything after `--`, including any `=value`.
    UnknownLong(String),
    Ambiguous {
        name: String,
        candidates: Vec<String>,
    },
    LongTakesNoArgument(String),
    LongNeedsArgument(String),
}

impl Fault {
    /// The offending option as it would be typed.
    pub fn token(&self) -> String {
        match self {
            Fault::InvalidShort(c) | Fault::ShortNeedsArgument(c) => format!("-{}", c),
            Fault::UnknownLong(s)
            | Fault::LongTakesNoArgument(s)
            | Fault::LongNeedsArgument(s)
            | Fault::Ambiguous { name: s, .. } => format!("--{}", s),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::InvalidShort(c) => write!(f, "invalid option -- '{}'", c),
            Fault::ShortNeedsArgument(c) => write!(f, "option requires an argument -- '{}'", c),
            Fault::UnknownLong(s) => write!(f, "unrecognized option '--{}'", s),
            Fault::Ambiguous { name, candidates } => {
                write!(f, "option '--{}' is ambiguous; possibilities:", name)?;
                for c in candidates {
                    write!(f, " '--{}'", c)?;
                }
                Ok(())
            }
            Fault::LongTakesNoArgument(s) => {
                write!(f, "option '--{}' doesn't allow an argument", s)
            }
            Fault::LongNeedsArgument(s) => write!(f, "option '--{}' requires an argument", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    ShortOption(char, Option<String>),
    /// Index into the [`LongOptionTable`].
    LongOption(usize, Option<String>),
    MissingArgument(Fault),
    UnrecognizedOption(Fault),
    EndOfOptions,
}

// ============================================================================
// Scanner
// ============================================================================

fn looks_like_option(token: &str) -> bool {
    token.len() > 1 && token.starts_with('-')
}

/// Step-wise option scanner over a token list.
///
/// Operands between options are skipped and kept for the end, so the same
/// input yields the same events as `getopt_long` in permute mode.
pub struct Scanner<'a> {
    args: &'a [String],
    short: &'a ShortOptionSpec,
    long: &'a LongOptionTable,
    // Index of the next token to look at; stays on a cluster until its
    // last character has been used.
    next: usize,
    // Byte offset of the next character inside args[next].
    cluster: Option<usize>,
    skipped: Vec<usize>,
    rest_from: Option<usize>,
}

impl<'a> Scanner<'a> {
    pub fn new(args: &'a [String], short: &'a ShortOptionSpec, long: &'a LongOptionTable) -> Self {
        Scanner {
            args,
            short,
            long,
            next: 0,
            cluster: None,
            skipped: Vec::new(),
            rest_from: None,
        }
    }

    /// Raw cursor, the equivalent of `optind` (zero-based).
    pub fn index(&self) -> usize {
        self.next
    }

    pub fn is_done(&self) -> bool {
        self.rest_from.is_some()
    }

    pub fn step(&mut self) -> ClassifiedEvent {
        if let Some(offset) = self.cluster {
            return self.short_step(offset);
        }

        let args = self.args;
        loop {
            if self.rest_from.is_some() {
                return ClassifiedEvent::EndOfOptions;
            }

            let Some(token) = args.get(self.next) else {
                self.rest_from = Some(self.next);
                return ClassifiedEvent::EndOfOptions;
            };

            if token == "--" {
                self.next += 1;
                self.rest_from = Some(self.next);
                return ClassifiedEvent::EndOfOptions;
            }

            if !looks_like_option(token) {
                if self.short.is_in_order() {
                    self.rest_from = Some(self.next);
                    return ClassifiedEvent::EndOfOptions;
                }
                self.skipped.push(self.next);
                self.next += 1;
                continue;
            }

            if let Some(body) = token.strip_prefix("--") {
                self.next += 1;
                return self.long_step(body);
            }

            return self.short_step(1);
        }
    }

    fn short_step(&mut self, offset: usize) -> ClassifiedEvent {
        let args = self.args;
        let token = &args[self.next];
        let c = match token[offset..].chars().next() {
            Some(c) => c,
            None => {
                self.cluster = None;
                self.next += 1;
                return self.step();
            }
        };
        let after = offset + c.len_utf8();
        let attached = &token[after..];

        // Whatever happens, this character is used up.
        if attached.is_empty() {
            self.cluster = None;
            self.next += 1;
        } else {
            self.cluster = Some(after);
        }

        let arity = match self.short.arity(c) {
            Some(arity) => arity,
            None => return ClassifiedEvent::UnrecognizedOption(Fault::InvalidShort(c)),
        };

        match arity {
            Arity::NoArgument => ClassifiedEvent::ShortOption(c, None),
            Arity::Required if !attached.is_empty() => {
                self.cluster = None;
                self.next += 1;
                ClassifiedEvent::ShortOption(c, Some(attached.to_string()))
            }
            Arity::Required => match args.get(self.next) {
                Some(value) => {
                    self.next += 1;
                    ClassifiedEvent::ShortOption(c, Some(value.clone()))
                }
                None => ClassifiedEvent::MissingArgument(Fault::ShortNeedsArgument(c)),
            },
            Arity::Optional if !attached.is_empty() => {
                self.cluster = None;
                self.next += 1;
                ClassifiedEvent::ShortOption(c, Some(attached.to_string()))
            }
            Arity::Optional => ClassifiedEvent::ShortOption(c, None),
        }
    }

    fn long_step(&mut self, body: &str) -> ClassifiedEvent {
        let long = self.long;
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        let idx = match long.lookup(name) {
            Lookup::Found(idx) => idx,
            Lookup::Missing => {
                return ClassifiedEvent::UnrecognizedOption(Fault::UnknownLong(body.to_string()))
            }
            Lookup::Ambiguous(candidates) => {
                let candidates = candidates
                    .into_iter()
                    .filter_map(|i| long.get(i))
                    .map(|e| e.name.clone())
                    .collect();
                return ClassifiedEvent::UnrecognizedOption(Fault::Ambiguous {
                    name: name.to_string(),
                    candidates,
                });
            }
        };

        let Some(entry) = long.get(idx) else {
            return ClassifiedEvent::UnrecognizedOption(Fault::UnknownLong(body.to_string()));
        };

        match (entry.arity, inline) {
            (Arity::NoArgument, Some(_)) => ClassifiedEvent::UnrecognizedOption(
                Fault::LongTakesNoArgument(entry.name.clone()),
            ),
            (Arity::NoArgument, None) | (Arity::Optional, None) => {
                ClassifiedEvent::LongOption(idx, None)
            }
            (_, Some(value)) => ClassifiedEvent::LongOption(idx, Some(value.to_string())),
            (Arity::Required, None) => match self.args.get(self.next) {
                Some(value) => {
                    self.next += 1;
                    ClassifiedEvent::LongOption(idx, Some(value.clone()))
                }
                None => ClassifiedEvent::MissingArgument(Fault::LongNeedsArgument(
                    entry.name.clone(),
                )),
            },
        }
    }

    /// Operands left once scanning ended: the skipped ones first, then
    /// everything from the stopping point on. Empty until then.
    pub fn operands(&self) -> Vec<&'a str> {
        let args = self.args;
        let Some(rest_from) = self.rest_from else {
            return Vec::new();
        };

        self.skipped
            .iter()
            .map(|&i| args[i].as_str())
            .chain(args[rest_from.min(args.len())..].iter().map(String::as_str))
            .collect()
    }
}

// ============================================================================
// Output
// ============================================================================

/// Single-quote `value` so that one round of shell evaluation yields it back
/// unchanged.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Growable output buffer. Every word is stored with a leading space, which
/// is dropped on [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct OutputBuilder {
    buf: String,
}

impl OutputBuilder {
    pub fn new() -> Self {
        OutputBuilder { buf: String::new() }
    }

    pub fn push_word(&mut self, word: &str) {
        self.buf.push(' ');
        self.buf.push_str(word);
    }

    pub fn push_quoted(&mut self, value: &str) {
        self.buf.push(' ');
        self.buf.push_str(&quote(value));
    }

    /// Glue `text` onto the previous word.
    pub fn append(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub fn finish(self, discard: bool) -> String {
        if discard || self.buf.is_empty() {
            return String::new();
        }
        self.buf[1..].to_string()
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Output policies. Quiet scanning lives on [`ShortOptionSpec`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Policy {
    /// Leave `':'`/`'?'` markers out of the output.
    pub elide_errors: bool,
    /// Stop at the first error and return nothing.
    pub abort_on_error: bool,
    /// Print long options without punctuation.
    pub normalize_punctuation: bool,
    /// Merge adjacent digit flags (`-1 -2` becomes `-12`).
    pub concat_numeric: bool,
}

/// Cursor bookkeeping for digit concatenation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseState {
    /// Scanner cursor after the latest event.
    pub current_index: usize,
    /// Logical position of the token the latest event came from.
    pub last_observed_index: usize,
    /// Cursor reached right after the latest digit flag.
    pub last_numeric_index: Option<usize>,
    pub saw_numeric_last: bool,
}

impl ParseState {
    /// Catch up with the scanner: if the cursor moved, walk forward from the
    /// last known position over operands until a token that looks like an
    /// option.
    pub fn recover(&mut self, args: &[String], cursor: usize) {
        self.current_index = cursor;
        if cursor == self.last_observed_index {
            return;
        }
        while self.last_observed_index < args.len()
            && !args[self.last_observed_index].starts_with('-')
        {
            self.last_observed_index += 1;
        }
    }

    fn continues_number(&self) -> bool {
        self.saw_numeric_last && self.last_numeric_index == Some(self.last_observed_index)
    }
}

/// Outcome of one classification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reparsed {
    /// Shell words, or empty after an aborted run.
    pub text: String,
    /// At least one token could not be classified.
    pub failed: bool,
    /// Scanning stopped early because of `abort_on_error`.
    pub aborted: bool,
}

/// Classify `args` and rebuild them as shell words.
///
/// `report` is called once for every error event, before the policy decides
/// what to do with it.
pub fn reparse<F>(
    short: &ShortOptionSpec,
    long: &LongOptionTable,
    args: &[String],
    policy: Policy,
    mut report: F,
) -> Reparsed
where
    F: FnMut(&Fault),
{
    let mut scanner = Scanner::new(args, short, long);
    let mut state = ParseState::default();
    let mut out = OutputBuilder::new();
    let mut failed = false;
    let mut aborted = false;

    loop {
        let event = scanner.step();
        log::trace!("{:?} (cursor {})", event, scanner.index());

        if event == ClassifiedEvent::EndOfOptions {
            break;
        }

        if policy.concat_numeric {
            state.recover(args, scanner.index());
        }

        match event {
            ClassifiedEvent::MissingArgument(ref fault)
            | ClassifiedEvent::UnrecognizedOption(ref fault) => {
                failed = true;
                report(fault);
                state.saw_numeric_last = false;

                if !policy.elide_errors {
                    if matches!(event, ClassifiedEvent::MissingArgument(_)) {
                        out.push_quoted(":");
                    } else {
                        out.push_quoted("?");
                    }
                }
                if policy.abort_on_error {
                    aborted = true;
                    break;
                }
            }
            ClassifiedEvent::LongOption(idx, value) => {
                state.saw_numeric_last = false;
                if let Some(entry) = long.get(idx) {
                    if policy.normalize_punctuation {
                        out.push_word(&format!("--{}", strip_punctuation(&entry.name)));
                    } else {
                        out.push_word(&format!("--{}", entry.name));
                    }
                }
                if let Some(value) = value {
                    out.push_quoted(&value);
                }
            }
            ClassifiedEvent::ShortOption(c, value) => {
                if policy.concat_numeric && c.is_ascii_digit() {
                    if state.continues_number() {
                        out.append(c.encode_utf8(&mut [0; 4]));
                    } else {
                        out.push_word(&format!("-{}", c));
                    }
                    state.saw_numeric_last = value.is_none();
                    state.last_numeric_index = Some(scanner.index());
                } else {
                    state.saw_numeric_last = false;
                    out.push_word(&format!("-{}", c));
                }
                if let Some(value) = value {
                    out.push_quoted(&value);
                }
            }
            ClassifiedEvent::EndOfOptions => break,
        }

        state.last_observed_index = scanner.index();
    }

    if !aborted {
        out.push_word("--");
        for operand in scanner.operands() {
            out.push_quoted(operand);
        }
    }

    let discard = policy.abort_on_error && failed;
    Reparsed {
        text: out.finish(discard),
        failed,
        aborted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn run(short: &str, long: &[&str], args: &[&str], policy: Policy) -> Reparsed {
        let short = ShortOptionSpec::parse(short);
        let short = if policy.concat_numeric {
            short.with_digits()
        } else {
            short
        };
        let mut table = LongOptionTable::new();
        for spec in long {
            table
                .add_spec(spec, policy.normalize_punctuation)
                .unwrap();
        }
        reparse(&short, &table, &strings(args), policy, |_| {})
    }

    fn events(short: &str, long: &str, args: &[&str]) -> Vec<ClassifiedEvent> {
        let short = ShortOptionSpec::parse(short);
        let mut table = LongOptionTable::new();
        table.add_spec(long, false).unwrap();
        let args = strings(args);
        let mut scanner = Scanner::new(&args, &short, &table);
        let mut out = Vec::new();
        loop {
            let event = scanner.step();
            if event == ClassifiedEvent::EndOfOptions {
                break;
            }
            out.push(event);
        }
        out
    }

    // Undo `quote` for the round-trip checks: single-quoted words and
    // backslash escapes only.
    fn shell_words(text: &str) -> Vec<String> {
        let mut words = Vec::new();
        let mut current = String::new();
        let mut in_word = false;
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match c {
                ' ' => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                '\'' => {
                    in_word = true;
                    for q in chars.by_ref() {
                        if q == '\'' {
                            break;
                        }
                        current.push(q);
                    }
                }
                '\\' => {
                    in_word = true;
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                _ => {
                    in_word = true;
                    current.push(c);
                }
            }
        }
        if in_word {
            words.push(current);
        }
        words
    }

    // -- tokenizer --

    #[test]
    fn tokens_split_on_every_separator() {
        let tokens: Vec<_> = long_spec_tokens("alpha beta,gamma|delta\tepsilon\r\nzeta").collect();
        let names: Vec<&str> = tokens.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"]);
    }

    #[test]
    fn tokens_strip_dashes_and_colons() {
        let tokens: Vec<_> = long_spec_tokens("--foo --bar: baz:: ,, q:").collect();
        assert_eq!(
            tokens,
            [
                ("foo", Arity::NoArgument),
                ("bar", Arity::Required),
                ("baz", Arity::Optional),
                ("q", Arity::Required),
            ]
        );
    }

    #[test]
    fn short_tokens_keep_their_dashes() {
        // Too short to strip, so the name stays invalid.
        let tokens: Vec<_> = long_spec_tokens("-- -").collect();
        assert_eq!(tokens, [("--", Arity::NoArgument), ("-", Arity::NoArgument)]);
    }

    #[test]
    fn strip_punctuation_keeps_letters_and_digits() {
        assert_eq!(strip_punctuation("foo-bar_baz.2"), "foobarbaz2");
        assert_eq!(strip_punctuation("plain"), "plain");
    }

    // -- long option table --

    #[test]
    fn duplicate_insert_keeps_one_entry_with_last_arity() {
        let mut table = LongOptionTable::new();
        assert_eq!(table.insert("foo", Arity::NoArgument), Ok(0));
        assert_eq!(table.insert("bar", Arity::Required), Ok(1));
        assert_eq!(table.insert("foo", Arity::Optional), Ok(0));
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0).unwrap().arity, Arity::Optional);
    }

    #[test]
    fn insert_rejects_bad_names() {
        let mut table = LongOptionTable::new();
        assert_eq!(table.insert("", Arity::NoArgument), Err(Error::EmptyName));
        assert!(matches!(
            table.insert("-x", Arity::NoArgument),
            Err(Error::LeadingDash(_))
        ));
        assert!(matches!(
            table.insert("x:", Arity::NoArgument),
            Err(Error::TrailingColon(_))
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn punctuation_alias_is_registered() {
        let mut table = LongOptionTable::new();
        assert_eq!(table.insert_from_spec("--foo-bar:", true), 0);
        let entries: Vec<_> = table.iter().cloned().collect();
        assert_eq!(
            entries,
            [
                LongOpt {
                    name: "foo-bar".into(),
                    arity: Arity::Required
                },
                LongOpt {
                    name: "foobar".into(),
                    arity: Arity::Required
                },
            ]
        );
    }

    #[test]
    fn bad_token_rejects_spec_but_others_still_load() {
        let mut table = LongOptionTable::new();
        assert_eq!(table.insert_from_spec("good -- also", false), 1);
        assert_eq!(table.len(), 2);

        let mut table = LongOptionTable::new();
        let err = table.add_spec("good ---", false).unwrap_err();
        assert_eq!(
            err,
            Error::LongSpec {
                spec: "good ---".into(),
                rejected: 1
            }
        );
    }

    #[test]
    fn failed_alias_is_not_counted() {
        // "--." strips to "." whose alias is empty.
        let mut table = LongOptionTable::new();
        assert_eq!(table.insert_from_spec("--.", true), 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn lookup_prefers_exact_then_unique_prefix() {
        let mut table = LongOptionTable::new();
        table.add_spec("foo foobar fob", false).unwrap();
        assert_eq!(table.lookup("foo"), Lookup::Found(0));
        assert_eq!(table.lookup("foob"), Lookup::Found(1));
        assert_eq!(table.lookup("fo"), Lookup::Ambiguous(vec![0, 1, 2]));
        assert_eq!(table.lookup("x"), Lookup::Missing);
    }

    // -- short spec --

    #[test]
    fn short_spec_reads_prefix_and_arities() {
        let spec = ShortOptionSpec::parse("+:ab:c::");
        assert!(spec.is_quiet());
        assert!(spec.is_in_order());
        assert_eq!(spec.arity('a'), Some(Arity::NoArgument));
        assert_eq!(spec.arity('b'), Some(Arity::Required));
        assert_eq!(spec.arity('c'), Some(Arity::Optional));
        assert_eq!(spec.arity(':'), None);
        assert_eq!(spec.arity('d'), None);
    }

    #[test]
    fn w_semicolon_is_a_plain_flag() {
        let spec = ShortOptionSpec::parse("W;a");
        assert_eq!(spec.arity('W'), Some(Arity::NoArgument));
        assert_eq!(spec.arity(';'), None);
        assert_eq!(
            events("W;a", "foo", &["-W", "foo", "-a"]),
            [
                ClassifiedEvent::ShortOption('W', None),
                ClassifiedEvent::ShortOption('a', None),
            ]
        );
    }

    #[test]
    fn digits_are_added_only_when_absent() {
        let spec = ShortOptionSpec::parse("a").with_digits();
        assert_eq!(spec.arity('7'), Some(Arity::NoArgument));

        let spec = ShortOptionSpec::parse("a5:").with_digits();
        assert_eq!(spec.arity('5'), Some(Arity::Required));
        assert_eq!(spec.arity('7'), None);
    }

    #[test]
    fn quiet_is_idempotent() {
        assert_eq!(
            ShortOptionSpec::parse(":ab").quiet(),
            ShortOptionSpec::parse(":ab")
        );
        assert_eq!(
            ShortOptionSpec::parse("ab").quiet(),
            ShortOptionSpec::parse(":ab")
        );
    }

    // -- scanner --

    #[test]
    fn scanner_handles_clusters_and_attached_values() {
        assert_eq!(
            events("ab:c::", "", &["-abVAL", "-c", "-cOPT", "-b", "next"]),
            [
                ClassifiedEvent::ShortOption('a', None),
                ClassifiedEvent::ShortOption('b', Some("VAL".into())),
                ClassifiedEvent::ShortOption('c', None),
                ClassifiedEvent::ShortOption('c', Some("OPT".into())),
                ClassifiedEvent::ShortOption('b', Some("next".into())),
            ]
        );
    }

    #[test]
    fn scanner_reports_short_errors() {
        assert_eq!(
            events("ab:", "", &["-za", "-b"]),
            [
                ClassifiedEvent::UnrecognizedOption(Fault::InvalidShort('z')),
                ClassifiedEvent::ShortOption('a', None),
                ClassifiedEvent::MissingArgument(Fault::ShortNeedsArgument('b')),
            ]
        );
    }

    #[test]
    fn scanner_handles_long_forms() {
        assert_eq!(
            events(
                "",
                "verbose file: level::",
                &["--verb", "--file=a", "--file", "b", "--level", "--level=3"]
            ),
            [
                ClassifiedEvent::LongOption(0, None),
                ClassifiedEvent::LongOption(1, Some("a".into())),
                ClassifiedEvent::LongOption(1, Some("b".into())),
                ClassifiedEvent::LongOption(2, None),
                ClassifiedEvent::LongOption(2, Some("3".into())),
            ]
        );
    }

    #[test]
    fn scanner_reports_long_errors() {
        assert_eq!(
            events("", "foo fob bar file:", &["--fo", "--bar=1", "--nope=2", "--file"]),
            [
                ClassifiedEvent::UnrecognizedOption(Fault::Ambiguous {
                    name: "fo".into(),
                    candidates: vec!["foo".into(), "fob".into()],
                }),
                ClassifiedEvent::UnrecognizedOption(Fault::LongTakesNoArgument("bar".into())),
                ClassifiedEvent::UnrecognizedOption(Fault::UnknownLong("nope=2".into())),
                ClassifiedEvent::MissingArgument(Fault::LongNeedsArgument("file".into())),
            ]
        );
    }

    #[test]
    fn scanner_permutes_operands() {
        let short = ShortOptionSpec::parse("a");
        let table = LongOptionTable::new();
        let args = strings(&["x", "-a", "-", "y", "--", "-a", "z"]);
        let mut scanner = Scanner::new(&args, &short, &table);
        assert_eq!(scanner.step(), ClassifiedEvent::ShortOption('a', None));
        assert_eq!(scanner.step(), ClassifiedEvent::EndOfOptions);
        assert!(scanner.is_done());
        assert_eq!(scanner.operands(), ["x", "-", "y", "-a", "z"]);
    }

    #[test]
    fn plus_prefix_stops_at_first_operand() {
        let short = ShortOptionSpec::parse("+a");
        let table = LongOptionTable::new();
        let args = strings(&["-a", "x", "-a"]);
        let mut scanner = Scanner::new(&args, &short, &table);
        assert_eq!(scanner.step(), ClassifiedEvent::ShortOption('a', None));
        assert_eq!(scanner.step(), ClassifiedEvent::EndOfOptions);
        assert_eq!(scanner.operands(), ["x", "-a"]);
    }

    #[test]
    fn cursor_stays_on_cluster_until_used_up() {
        let short = ShortOptionSpec::parse("ab");
        let table = LongOptionTable::new();
        let args = strings(&["-ab", "-a"]);
        let mut scanner = Scanner::new(&args, &short, &table);
        scanner.step();
        assert_eq!(scanner.index(), 0);
        scanner.step();
        assert_eq!(scanner.index(), 1);
        scanner.step();
        assert_eq!(scanner.index(), 2);
    }

    // -- reparse --

    #[test]
    fn basic_reassembly() {
        let out = run("ab:", &[], &["-a", "-b", "val", "x"], Policy::default());
        assert_eq!(out.text, "-a -b 'val' -- 'x'");
        assert!(!out.failed);
    }

    #[test]
    fn values_are_quoted() {
        let out = run("b:", &[], &["-b", "it's", "a b"], Policy::default());
        assert_eq!(out.text, "-b 'it'\\''s' -- 'a b'");
    }

    #[test]
    fn empty_input_still_ends_with_separator() {
        let out = run("a", &[], &[], Policy::default());
        assert_eq!(out.text, "--");
    }

    #[test]
    fn adjacent_digits_merge() {
        let policy = Policy {
            concat_numeric: true,
            ..Policy::default()
        };
        assert_eq!(run("", &[], &["-1", "-2", "foo"], policy).text, "-12 -- 'foo'");
        assert_eq!(run("", &[], &["-12", "foo"], policy).text, "-12 -- 'foo'");
        assert_eq!(run("v", &[], &["-1v2"], policy).text, "-1 -v -2 --");
    }

    #[test]
    fn operand_between_digits_breaks_the_number() {
        let policy = Policy {
            concat_numeric: true,
            ..Policy::default()
        };
        assert_eq!(
            run("", &[], &["-1", "foo", "-2"], policy).text,
            "-1 -2 -- 'foo'"
        );
        assert_eq!(
            run("", &[], &["-1", "foo", "bar", "-23", "-4"], policy).text,
            "-1 -234 -- 'foo' 'bar'"
        );
    }

    #[test]
    fn digits_stay_apart_without_concat() {
        let out = run("12", &[], &["-1", "-2"], Policy::default());
        assert_eq!(out.text, "-1 -2 --");
    }

    #[test]
    fn error_markers_and_elision() {
        let out = run("a", &[], &["-z", "-a"], Policy::default());
        assert_eq!(out.text, "'?' -a --");
        assert!(out.failed);

        let policy = Policy {
            elide_errors: true,
            ..Policy::default()
        };
        let out = run("a", &[], &["-z", "-a"], policy);
        assert_eq!(out.text, "-a --");
        assert!(out.failed);
    }

    #[test]
    fn missing_argument_marker() {
        let out = run("ab:", &[], &["-a", "-b"], Policy::default());
        assert_eq!(out.text, "-a ':' --");
        assert!(out.failed);
    }

    #[test]
    fn abort_stops_and_discards() {
        let policy = Policy {
            abort_on_error: true,
            ..Policy::default()
        };
        let short = ShortOptionSpec::parse("ab:");
        let table = LongOptionTable::new();
        let args = strings(&["-a", "x", "-b"]);
        let mut seen = Vec::new();
        let out = reparse(&short, &table, &args, policy, |f| seen.push(f.clone()));
        assert_eq!(out.text, "");
        assert!(out.failed);
        assert!(out.aborted);
        assert_eq!(seen, [Fault::ShortNeedsArgument('b')]);

        // Tokens after the error are never classified.
        let args = strings(&["-z", "-q"]);
        let mut count = 0;
        let out = reparse(&short, &table, &args, policy, |_| count += 1);
        assert_eq!(count, 1);
        assert_eq!(out.text, "");
    }

    #[test]
    fn abort_without_errors_keeps_output() {
        let policy = Policy {
            abort_on_error: true,
            ..Policy::default()
        };
        assert_eq!(run("a", &[], &["-a", "x"], policy).text, "-a -- 'x'");
    }

    #[test]
    fn normalized_long_options() {
        let policy = Policy {
            normalize_punctuation: true,
            ..Policy::default()
        };
        let out = run("", &["--foo-bar:"], &["--foobar", "v"], policy);
        assert_eq!(out.text, "--foobar 'v' --");
        let out = run("", &["--foo-bar:"], &["--foo-bar=v"], policy);
        assert_eq!(out.text, "--foobar 'v' --");

        let out = run("", &["--foo-bar:"], &["--foo-bar=v"], Policy::default());
        assert_eq!(out.text, "--foo-bar 'v' --");
    }

    #[test]
    fn output_rescans_to_the_same_events() {
        let long = "file: level:: verbose";
        let args = [
            "in", "-ab", "it's", "--file", "x y", "--lev", "-c", "--verb", "--", "-a",
        ];
        let first = run("ab:c", &[long], &args, Policy::default());
        let words = shell_words(&first.text);
        let words: Vec<&str> = words.iter().map(String::as_str).collect();
        let second = run("ab:c", &[long], &words, Policy::default());
        assert_eq!(first.text, second.text);
        assert_eq!(events("ab:c", long, &args), events("ab:c", long, &words));
    }

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a'b"), "'a'\\''b'");
    }
}
