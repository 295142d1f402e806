//! Human name parsing.
//!
//! Splits a single line into title, first, middle, last, suffix and nickname
//! components. Lines carrying digits or email fragments are not names.

use std::fmt;

const TITLES: &[&str] = &[
    "mr", "mrs", "ms", "miss", "mx", "dr", "prof", "professor", "sir", "dame", "rev", "hon",
    "capt", "col", "gen", "lt", "sgt", "fr", "madam", "lord", "lady",
];

const SUFFIXES: &[&str] = &[
    "jr", "sr", "ii", "iii", "iv", "v", "phd", "md", "esq", "mba", "cpa", "dds", "jd", "pe",
];

/// Lowercase particles that belong to the following last name.
const LAST_NAME_PARTICLES: &[&str] = &[
    "van", "von", "der", "den", "de", "del", "della", "da", "di", "du", "la", "le", "st", "bin",
    "al", "el", "ibn",
];

/// Parsed components of a person's name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HumanName {
    pub title: String,
    pub first: String,
    pub middle: Vec<String>,
    pub last: String,
    pub suffix: String,
    pub nickname: String,
}

impl HumanName {
    /// Parse a line. Unparseable input yields an empty name.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::default();
        }

        let (line, nickname) = take_nickname(line);
        if !line.split_whitespace().all(is_name_token) {
            return Self::default();
        }

        let mut name = match line.split_once(',') {
            Some((before, after)) => parse_with_comma(before, after),
            None => parse_ordered(&line.split_whitespace().collect::<Vec<_>>()),
        };
        name.nickname = nickname;
        name
    }

    /// Both a first and a last name were found.
    pub fn is_complete(&self) -> bool {
        !self.first.is_empty() && !self.last.is_empty()
    }
}

impl fmt::Display for HumanName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        parts.push(&self.title);
        parts.push(&self.first);
        parts.extend(self.middle.iter().map(String::as_str));
        parts.push(&self.last);
        parts.push(&self.suffix);
        let joined = parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if self.nickname.is_empty() {
            write!(f, "{}", joined)
        } else {
            write!(f, "{} ({})", joined, self.nickname)
        }
    }
}

/// "First Middle Last" order, with optional title and suffixes.
fn parse_ordered(tokens: &[&str]) -> HumanName {
    let mut name = HumanName::default();
    let mut tokens = tokens.to_vec();

    let mut titles = Vec::new();
    while tokens.len() > 1 && is_title(tokens[0]) {
        titles.push(tokens.remove(0));
    }
    name.title = titles.join(" ");

    let mut suffixes = Vec::new();
    while tokens.len() > 1 && is_suffix(tokens[tokens.len() - 1]) {
        if let Some(s) = tokens.pop() {
            suffixes.insert(0, s);
        }
    }
    name.suffix = suffixes.join(" ");

    match tokens.len() {
        0 => {}
        1 => name.first = tokens[0].to_string(),
        n => {
            let mut last_start = n - 1;
            while last_start > 1 && is_particle(tokens[last_start - 1]) {
                last_start -= 1;
            }
            name.first = tokens[0].to_string();
            name.middle = tokens[1..last_start].iter().map(|t| t.to_string()).collect();
            name.last = tokens[last_start..].join(" ");
        }
    }
    name
}

/// "Last, First Middle" or "First Last, Suffix".
fn parse_with_comma(before: &str, after: &str) -> HumanName {
    let before: Vec<&str> = before.split_whitespace().collect();
    let after: Vec<&str> = after
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if !after.is_empty() && after.iter().all(|t| is_suffix(t)) {
        let mut name = parse_ordered(&before);
        let mut suffixes: Vec<String> =
            name.suffix.split_whitespace().map(str::to_string).collect();
        suffixes.extend(after.iter().map(|t| t.to_string()));
        name.suffix = suffixes.join(" ");
        return name;
    }

    let mut name = parse_ordered(&after);
    let last = before.join(" ");
    if !name.last.is_empty() {
        name.middle.push(std::mem::take(&mut name.last));
    }
    name.last = last;
    name
}

/// Strip a quoted or parenthesised nickname from the line.
fn take_nickname(line: &str) -> (String, String) {
    for (open, close) in [('"', '"'), ('(', ')'), ('“', '”')] {
        if let Some(start) = line.find(open) {
            let inner = start + open.len_utf8();
            if let Some(len) = line[inner..].find(close) {
                let end = inner + len;
                let nickname = line[inner..end].trim().to_string();
                let rest = format!("{} {}", &line[..start], &line[end + close.len_utf8()..]);
                return (rest.split_whitespace().collect::<Vec<_>>().join(" "), nickname);
            }
        }
    }
    (line.to_string(), String::new())
}

fn is_name_token(token: &str) -> bool {
    token.chars().any(char::is_alphabetic)
        && token
            .chars()
            .all(|c| c.is_alphabetic() || matches!(c, '\'' | '-' | '.' | ',' | '’'))
}

fn normalized(token: &str) -> String {
    token.trim_end_matches(&['.', ','][..]).replace('.', "").to_lowercase()
}

fn is_title(token: &str) -> bool {
    TITLES.contains(&normalized(token).as_str())
}

fn is_suffix(token: &str) -> bool {
    SUFFIXES.contains(&normalized(token).as_str())
}

fn is_particle(token: &str) -> bool {
    token.chars().next().is_some_and(char::is_lowercase)
        && LAST_NAME_PARTICLES.contains(&normalized(token).as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_last() {
        let name = HumanName::parse("John Smith");
        assert_eq!(name.first, "John");
        assert_eq!(name.last, "Smith");
        assert!(name.middle.is_empty());
        assert!(name.is_complete());
        assert_eq!(name.to_string(), "John Smith");
    }

    #[test]
    fn test_single_token_is_incomplete() {
        let name = HumanName::parse("ACME");
        assert_eq!(name.first, "ACME");
        assert!(!name.is_complete());
    }

    #[test]
    fn test_title_middle_and_suffix() {
        let name = HumanName::parse("Dr. Jane Q. Public PhD");
        assert_eq!(name.title, "Dr.");
        assert_eq!(name.first, "Jane");
        assert_eq!(name.middle, vec!["Q."]);
        assert_eq!(name.last, "Public");
        assert_eq!(name.suffix, "PhD");
        assert_eq!(name.to_string(), "Dr. Jane Q. Public PhD");
    }

    #[test]
    fn test_last_comma_first() {
        let name = HumanName::parse("Smith, John Paul");
        assert_eq!(name.first, "John");
        assert_eq!(name.middle, vec!["Paul"]);
        assert_eq!(name.last, "Smith");
    }

    #[test]
    fn test_comma_suffix() {
        let name = HumanName::parse("Martin Luther King, Jr.");
        assert_eq!(name.first, "Martin");
        assert_eq!(name.middle, vec!["Luther"]);
        assert_eq!(name.last, "King");
        assert_eq!(name.suffix, "Jr.");
    }

    #[test]
    fn test_last_name_particle() {
        let name = HumanName::parse("Ludwig van Beethoven");
        assert_eq!(name.first, "Ludwig");
        assert_eq!(name.last, "van Beethoven");
        assert!(name.middle.is_empty());
    }

    #[test]
    fn test_nickname() {
        let name = HumanName::parse("Robert \"Bob\" Jones");
        assert_eq!(name.first, "Robert");
        assert_eq!(name.last, "Jones");
        assert_eq!(name.nickname, "Bob");
        assert_eq!(name.to_string(), "Robert Jones (Bob)");
    }

    #[test]
    fn test_lines_with_digits_or_email_are_not_names() {
        assert!(!HumanName::parse("+1 555 123 4567").is_complete());
        assert!(!HumanName::parse("john.doe@example.com").is_complete());
        assert!(!HumanName::parse("221B Baker Street").is_complete());
    }

    #[test]
    fn test_empty_line() {
        assert_eq!(HumanName::parse("   "), HumanName::default());
    }
}
