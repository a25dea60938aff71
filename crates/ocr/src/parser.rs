use std::collections::BTreeMap;
use std::ops::Range;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::NaiveDate;
use nota_core::{Field, Locale, Money, ParsedTransaction};
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use thiserror::Error;

pub const DEFAULT_MAX_DESCRIPTION_LEN: usize = 100;

/// Bytes before an amount searched for its label, padding included.
const LABEL_WINDOW: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Could not extract a usable transaction: no amount or description found")]
    NothingUsable,
}

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

const MONTHS: &str = "januari|january|februari|february|maret|march|april|mei|may|juni|june|juli|july|\
agustus|august|september|oktober|october|november|desember|december|\
jan|feb|mar|apr|jun|jul|agu|agt|aug|sept|sep|okt|oct|nov|des|dec";

re!(re_amount,
    r"(?i)(?P<neg>-[ \t]*|\([ \t]*)?(?P<cur>rp\.?|idr|usd|eur|\$|€)?[ \t]*(?P<num>[0-9]{1,3}(?:[.,][0-9]{3})+(?:[.,][0-9]{1,2})?|[0-9]+[.,][0-9]{1,2}|[0-9]+)(?P<close>[ \t]*\))?(?:[ \t]*(?P<dc>cr|db|dr)\b)?");
re!(re_amount_label_before,
    r"(?i)\b(?P<kw>grand\s+total|total\s+bayar|total\s+belanja|total|amount\s+due|balance\s+due|amount|jumlah|nominal|tagihan|bayar)\s*[:=]?\s*$");
re!(re_amount_label,
    r"(?i)\b(?:grand\s+total|total\s+bayar|total\s+belanja|total|amount\s+due|balance\s+due|amount|jumlah|nominal|tagihan|bayar)\b");

re!(re_date_iso,
    r"\b([0-9]{4})[-/]([0-9]{1,2})[-/]([0-9]{1,2})\b");
fn re_date_day_month() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b([0-9]{{1,2}})[\s\-]+({MONTHS})\.?[\s\-,]+([0-9]{{4}})\b"))
            .expect("invalid regex")
    })
}
fn re_date_month_day() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b({MONTHS})\.?\s+([0-9]{{1,2}}),?\s+([0-9]{{4}})\b"))
            .expect("invalid regex")
    })
}
re!(re_date_numeric,
    r"\b([0-9]{1,2})[/.\-]([0-9]{1,2})[/.\-]([0-9]{4})\b");
re!(re_date_numeric_short,
    r"\b([0-9]{1,2})[/.\-]([0-9]{1,2})[/.\-]([0-9]{2})\b");

re!(re_description_marker,
    r"(?i)\b(?:nama\s+toko|merchant\s+name|merchant|payee|vendor|description|deskripsi|keterangan|toko|penerima|berita)\b\s*[:\-]\s*(?P<value>[^\n]+)");

// ── Tokens ───────────────────────────────────────────────────────────────────

/// How strongly an amount keyword points at the transaction total. Lower
/// ranks win; magnitude only breaks ties inside a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LabelRank {
    /// total, grand total, total bayar, amount due, balance due
    Total,
    /// jumlah, nominal, tagihan, amount
    Amount,
    /// bayar: on receipts this is usually the cash tendered.
    Paid,
}

impl LabelRank {
    fn of(keyword: &str) -> Self {
        let keyword = keyword.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match keyword.as_str() {
            "bayar" => LabelRank::Paid,
            "jumlah" | "nominal" | "tagihan" | "amount" => LabelRank::Amount,
            _ => LabelRank::Total,
        }
    }
}

#[derive(Debug, Clone)]
struct AmountToken {
    value: Money,
    span: Range<usize>,
    label: Option<LabelRank>,
    confidence: f32,
}

#[derive(Debug, Clone)]
struct DateToken {
    value: NaiveDate,
    span: Range<usize>,
    confidence: f32,
}

#[derive(Debug)]
struct DateScan {
    tokens: Vec<DateToken>,
    /// Every date-shaped span, valid or not, in text order.
    claimed: Vec<Range<usize>>,
}

// ── Public parsing API ───────────────────────────────────────────────────────

/// Turns raw document text into a candidate transaction.
///
/// Amount, date and description are derived independently so that a failure
/// on one field never hides the others.
#[derive(Debug, Clone)]
pub struct TransactionParser {
    locale: Locale,
    max_description_len: usize,
}

impl TransactionParser {
    pub fn new(locale: Locale) -> Self {
        Self { locale, max_description_len: DEFAULT_MAX_DESCRIPTION_LEN }
    }

    pub fn with_max_description_len(mut self, len: usize) -> Self {
        self.max_description_len = len.max(1);
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// `None` when neither an amount nor a description can be derived.
    pub fn parse(&self, raw_text: &str) -> Option<ParsedTransaction> {
        let dates = self.find_dates(raw_text);
        let masked = mask(raw_text, dates.claimed.iter().cloned());
        let amounts = self.find_amounts(&masked);

        let amount = pick_amount(&amounts);
        let date = pick_date(&dates.tokens, amount.map(|a| &a.span));
        let description = self.description(raw_text, &amounts, &dates.claimed);

        let mut tx = ParsedTransaction::default();
        if let Some(a) = amount {
            tx.amount = Some(a.value);
            tx.set_confidence(Field::Amount, a.confidence);
        }
        if let Some(d) = date {
            tx.date = Some(d.value);
            tx.set_confidence(Field::Date, d.confidence);
        }
        if let Some((text, confidence)) = description {
            tx.description = Some(text);
            tx.set_confidence(Field::Description, confidence);
        }

        tx.is_usable().then_some(tx)
    }

    /// Like [`parse`](Self::parse) but reports the rejection as an error.
    pub fn try_parse(&self, raw_text: &str) -> Result<ParsedTransaction, ParseError> {
        self.parse(raw_text).ok_or(ParseError::NothingUsable)
    }

    // ── Amounts ───────────────────────────────────────────────────────────────

    fn find_amounts(&self, text: &str) -> Vec<AmountToken> {
        re_amount()
            .captures_iter(text)
            .filter_map(|c| self.amount_token(text, &c))
            .collect()
    }

    fn amount_token(&self, text: &str, c: &Captures<'_>) -> Option<AmountToken> {
        let num = c.name("num")?;
        let cur = c.name("cur");
        let neg = c.name("neg");
        let head = neg.or(cur).unwrap_or(num);

        // Reject digits glued to words ("K24", "x2") or followed by more letters.
        if text[..head.start()].chars().next_back().is_some_and(char::is_alphanumeric) {
            return None;
        }
        let dc = c.name("dc");
        if dc.is_none() && text[num.end()..].chars().next().is_some_and(char::is_alphanumeric) {
            return None;
        }

        // Labels are looked for in a bounded window so flattened single-line
        // pages stay linear.
        let mut window = head.start().saturating_sub(LABEL_WINDOW);
        while !text.is_char_boundary(window) {
            window += 1;
        }
        let line_start = text[window..head.start()].rfind('\n').map_or(window, |i| window + i + 1);
        let label = re_amount_label_before()
            .captures_at(&text[..head.start()], line_start)
            .and_then(|c| c.name("kw"))
            .map(|kw| LabelRank::of(kw.as_str()));
        let labeled = label.is_some();
        let separated = num.as_str().contains(['.', ',']);
        if cur.is_none() && !separated && !labeled {
            return None;
        }

        let mut value = Money::from_decimal(normalize_number(num.as_str(), self.locale)?);
        let hyphen = neg.is_some_and(|n| n.as_str().starts_with('-'));
        let paren = neg.is_some_and(|n| n.as_str().starts_with('(')) && c.name("close").is_some();
        let debit = dc.is_some_and(|d| matches!(d.as_str().to_lowercase().as_str(), "db" | "dr"));
        if hyphen || paren || debit {
            value = -value;
        }

        let confidence = match (labeled, cur.is_some()) {
            (true, true) => 0.95,
            (true, false) => 0.90,
            (false, true) => 0.80,
            (false, false) => 0.50,
        };
        let span = head.start()..c.get(0)?.end();
        Some(AmountToken { value, span, label, confidence })
    }

    // ── Dates ────────────────────────────────────────────────────────────────

    /// Patterns run from most to least specific; a later pattern never claims
    /// text already matched by an earlier one. Date-shaped text is claimed even
    /// when it is not a real calendar date so its digits never become amounts.
    fn find_dates(&self, text: &str) -> DateScan {
        let mut tokens = Vec::new();
        // Claimed spans keyed by start. They never overlap, so only the
        // neighbours of a new span can collide with it.
        let mut claimed: BTreeMap<usize, usize> = BTreeMap::new();
        let mut push = |span: Range<usize>, value: Option<NaiveDate>, confidence: f32| {
            let before = claimed.range(..=span.start).next_back();
            let after = claimed.range(span.start..).next();
            if before.into_iter().chain(after).any(|(&s, &e)| overlaps(&(s..e), &span)) {
                return;
            }
            claimed.insert(span.start, span.end);
            if let Some(value) = value {
                tokens.push(DateToken { value, span, confidence });
            }
        };

        for c in re_date_iso().captures_iter(text) {
            push(span_of(&c), ymd(num(&c, 1), num(&c, 2), num(&c, 3)), 0.95);
        }
        for c in re_date_day_month().captures_iter(text) {
            let month = c.get(2).and_then(|m| month_to_num(m.as_str()));
            push(span_of(&c), ymd(num(&c, 3), month, num(&c, 1)), 0.90);
        }
        for c in re_date_month_day().captures_iter(text) {
            let month = c.get(1).and_then(|m| month_to_num(m.as_str()));
            push(span_of(&c), ymd(num(&c, 3), month, num(&c, 2)), 0.90);
        }
        for c in re_date_numeric().captures_iter(text) {
            let (date, confidence) = self.numeric_date(num(&c, 1), num(&c, 2), num(&c, 3), 0.75);
            push(span_of(&c), date, confidence);
        }
        for c in re_date_numeric_short().captures_iter(text) {
            let year = num(&c, 3).map(|y| y + 2000);
            let (date, confidence) = self.numeric_date(num(&c, 1), num(&c, 2), year, 0.65);
            push(span_of(&c), date, confidence);
        }

        DateScan {
            tokens,
            claimed: claimed.into_iter().map(|(start, end)| start..end).collect(),
        }
    }

    /// Reads `a/b/year` in locale order, falling back to the other order (with
    /// less confidence) when the locale reading is not a real date.
    fn numeric_date(
        &self,
        a: Option<u32>,
        b: Option<u32>,
        year: Option<u32>,
        confidence: f32,
    ) -> (Option<NaiveDate>, f32) {
        let (day, month) = if self.locale.day_first() { (a, b) } else { (b, a) };
        match ymd(year, month, day) {
            Some(d) => (Some(d), confidence),
            None => (ymd(year, day, month), confidence - 0.10),
        }
    }

    // ── Description ──────────────────────────────────────────────────────────

    fn description(
        &self,
        text: &str,
        amounts: &[AmountToken],
        date_spans: &[Range<usize>],
    ) -> Option<(String, f32)> {
        let mut cuts: Vec<Range<usize>> = amounts.iter().map(|a| a.span.clone()).collect();
        cuts.extend(date_spans.iter().cloned());
        cuts.extend(re_amount_label().find_iter(text).map(|m| m.range()));

        if let Some(c) = re_description_marker().captures(text) {
            let value = c.name("value")?;
            // Stop at the next token on the same line: on flattened PDF pages a
            // marker line often runs straight into the total.
            let end = cuts
                .iter()
                .map(|r| r.start)
                .filter(|&s| s > value.start() && s < value.end())
                .min()
                .unwrap_or(value.end());
            if let Some(desc) = self.clean(&text[value.start()..end]) {
                return Some((desc, 0.85));
            }
        }

        let residual = mask(text, cuts.into_iter());
        let lines: Vec<String> = residual.lines().filter_map(|l| self.clean(l)).collect();
        if lines.is_empty() {
            return None;
        }
        self.clean(&lines.join(" ")).map(|d| (d, 0.40))
    }

    /// Collapse whitespace, trim separator noise and truncate. `None` when
    /// nothing with letters remains.
    fn clean(&self, raw: &str) -> Option<String> {
        let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        let trimmed = collapsed.trim_matches(|c: char| c.is_whitespace() || ":;,-=|*#".contains(c));
        if !trimmed.chars().any(char::is_alphabetic) {
            return None;
        }
        let truncated: String = trimmed.chars().take(self.max_description_len).collect();
        Some(truncated.trim_end().to_string())
    }
}

impl Default for TransactionParser {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

// ── Selection ────────────────────────────────────────────────────────────────

/// Largest amount under the strongest keyword, else the largest amount overall.
fn pick_amount(amounts: &[AmountToken]) -> Option<&AmountToken> {
    let best_rank = amounts.iter().filter_map(|a| a.label).min();
    match best_rank {
        Some(rank) => amounts
            .iter()
            .filter(|a| a.label == Some(rank))
            .max_by_key(|a| a.value.abs()),
        None => amounts.iter().max_by_key(|a| a.value.abs()),
    }
}

/// Date closest to the chosen amount; ties, or no amount, go to the most recent.
fn pick_date<'a>(dates: &'a [DateToken], anchor: Option<&Range<usize>>) -> Option<&'a DateToken> {
    match anchor {
        Some(anchor) => dates
            .iter()
            .min_by(|a, b| distance(&a.span, anchor).cmp(&distance(&b.span, anchor)).then(b.value.cmp(&a.value))),
        None => dates.iter().max_by_key(|d| d.value),
    }
}

fn distance(a: &Range<usize>, b: &Range<usize>) -> usize {
    if a.end <= b.start {
        b.start - a.end
    } else if b.end <= a.start {
        a.start - b.end
    } else {
        0
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Blank out `ranges` with spaces, keeping byte offsets and line breaks intact.
/// Runs in one pass over `text` after sorting the ranges.
fn mask(text: &str, ranges: impl Iterator<Item = Range<usize>>) -> String {
    let mut ranges: Vec<_> = ranges.filter(|r| r.start < r.end).collect();
    ranges.sort_unstable_by_key(|r| r.start);

    let mut out = String::with_capacity(text.len());
    let mut pending = ranges.iter().peekable();
    let mut covered_until = 0;
    for (i, ch) in text.char_indices() {
        while let Some(r) = pending.next_if(|r| r.start <= i) {
            covered_until = covered_until.max(r.end);
        }
        if ch != '\n' && i < covered_until {
            out.extend(std::iter::repeat(' ').take(ch.len_utf8()));
        } else {
            out.push(ch);
        }
    }
    out
}

// ── Number helpers ───────────────────────────────────────────────────────────

/// Normalize a matched number using the locale's separators.
///
/// A final separator followed by one or two digits is always the decimal
/// point. Otherwise the final separator is grouping if it is the locale's
/// thousands separator, and the decimal point if not.
fn normalize_number(raw: &str, locale: Locale) -> Option<Decimal> {
    let Some(idx) = raw.rfind(['.', ',']) else {
        return Decimal::from_str(raw).ok();
    };
    let sep = raw[idx..].chars().next()?;
    let frac = &raw[idx + 1..];
    let decimal_at_idx = matches!(frac.len(), 1 | 2) || sep != locale.thousands_separator();

    let int_digits: String = (if decimal_at_idx { &raw[..idx] } else { raw })
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    let normalized = if decimal_at_idx { format!("{int_digits}.{frac}") } else { int_digits };
    Decimal::from_str(&normalized).ok()
}

// ── Date helpers ─────────────────────────────────────────────────────────────

fn span_of(c: &Captures<'_>) -> Range<usize> {
    c.get(0).map_or(0..0, |m| m.range())
}

fn num(c: &Captures<'_>, group: usize) -> Option<u32> {
    c.get(group)?.as_str().parse().ok()
}

fn ymd(year: Option<u32>, month: Option<u32>, day: Option<u32>) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year?).ok()?, month?, day?)
}

fn month_to_num(name: &str) -> Option<u32> {
    let n = match name.to_lowercase().as_str() {
        "januari" | "january" | "jan" => 1,
        "februari" | "february" | "feb" => 2,
        "maret" | "march" | "mar" => 3,
        "april" | "apr" => 4,
        "mei" | "may" => 5,
        "juni" | "june" | "jun" => 6,
        "juli" | "july" | "jul" => 7,
        "agustus" | "august" | "agu" | "agt" | "aug" => 8,
        "september" | "sept" | "sep" => 9,
        "oktober" | "october" | "okt" | "oct" => 10,
        "november" | "nov" => 11,
        "desember" | "december" | "des" | "dec" => 12,
        _ => return None,
    };
    Some(n)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
