//! Line-based prompts for `biz interactive`.
//!
//! Generic over the reader and writer so prompts can be driven from tests.
//! Invalid answers re-ask; end of input is an error.

use anyhow::Result;
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::ops::RangeInclusive;
use std::str::FromStr;

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `question` with an optional default and read one trimmed line.
    /// An empty answer yields the default (or an empty string).
    fn ask(&mut self, question: &str, default: Option<&str>) -> Result<String> {
        match default {
            Some(d) => write!(self.output, "{} [{}]: ", question, d)?,
            None => write!(self.output, "{}: ", question)?,
        }
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            anyhow::bail!("input closed while waiting for an answer");
        }
        let answer = line.trim();
        if answer.is_empty() {
            return Ok(default.unwrap_or_default().to_string());
        }
        Ok(answer.to_string())
    }

    /// Ask until the answer is non-empty.
    pub fn text(&mut self, question: &str, default: &str) -> Result<String> {
        loop {
            let answer = self.ask(question, Some(default).filter(|d| !d.is_empty()))?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            writeln!(self.output, "Please enter a value.")?;
        }
    }

    /// Ask for a number within `range`.
    pub fn number<T>(&mut self, question: &str, range: RangeInclusive<T>, default: T) -> Result<T>
    where
        T: FromStr + PartialOrd + Display + Copy,
    {
        let default_text = default.to_string();
        loop {
            let answer = self.ask(question, Some(&default_text))?;
            match answer.parse::<T>() {
                Ok(n) if range.contains(&n) => return Ok(n),
                _ => writeln!(
                    self.output,
                    "Please enter a number between {} and {}.",
                    range.start(),
                    range.end()
                )?,
            }
        }
    }

    /// Pick exactly one of `options`; returns its index.
    pub fn choose(&mut self, question: &str, options: &[&str], default: usize) -> Result<usize> {
        writeln!(self.output, "{}", question)?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, option)?;
        }
        self.number("Choice", 1..=options.len(), default + 1)
            .map(|n| n - 1)
    }

    /// Pick one or more of `options`; returns sorted, distinct indices.
    pub fn multi_select<S: Display>(&mut self, question: &str, options: &[S]) -> Result<Vec<usize>> {
        writeln!(self.output, "{}", question)?;
        for (i, option) in options.iter().enumerate() {
            writeln!(self.output, "  {}) {}", i + 1, option)?;
        }
        loop {
            let answer = self.ask("Selection (e.g. 1,3 or 2-4 or all)", None)?;
            match parse_selection(&answer, options.len()) {
                Some(picked) => return Ok(picked),
                None => writeln!(
                    self.output,
                    "Select at least one entry between 1 and {}.",
                    options.len()
                )?,
            }
        }
    }
}

/// Parse "1,3", "2-4", "all" (1-based) into sorted 0-based indices.
/// `None` if anything is out of range, malformed, or nothing is selected.
pub fn parse_selection(answer: &str, count: usize) -> Option<Vec<usize>> {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case("all") {
        return (count > 0).then(|| (0..count).collect());
    }
    let mut picked = Vec::new();
    for part in answer.split(|c: char| c == ',' || c.is_whitespace()) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (lo, hi) = match part.split_once('-') {
            Some((a, b)) => (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?),
            None => {
                let n = part.parse::<usize>().ok()?;
                (n, n)
            }
        };
        if lo == 0 || hi > count || lo > hi {
            return None;
        }
        picked.extend(lo - 1..hi);
    }
    picked.sort_unstable();
    picked.dedup();
    (!picked.is_empty()).then_some(picked)
}
