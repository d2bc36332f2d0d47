//! Fortran namelist documents: the plain-text parameter files read by the grid preprocessor
//! and the model.
//!
//! ```text
//! &domains
//!     max_dom = 2
//!     e_we = 100, 130
//! /
//! ```
//!
//! Array values are consumed positionally, one per domain, so entries keep the order in which
//! they were set.

use {
    crate::{
        error::{Error, Result},
        value::{Field, Value},
    },
    std::{fmt, fs, path::Path, str::FromStr},
};

/// A named group of `key = value` entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    name: String,
    entries: Vec<(String, Field)>,
}

impl Section {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            entries: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, field)| field)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key`, replacing an existing entry in place
    pub fn set<K: Into<String>, F: Into<Field>>(&mut self, key: K, field: F) {
        let key = key.into();
        let field = field.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = field,
            None => self.entries.push((key, field)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Field> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "&{}", self.name)?;
        for (key, field) in &self.entries {
            writeln!(f, "    {} = {}", key, field)?;
        }
        writeln!(f, "/")
    }
}

/// Ordered sections of a namelist file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Namelist {
    sections: Vec<Section>,
}

impl Namelist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Section `name`, appended empty if absent
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        let i = match self.sections.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[i]
    }

    /// Appends `section`, replacing one of the same name in place
    pub fn push(&mut self, section: Section) {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&Field> {
        self.section(section).and_then(|s| s.get(key))
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        fs::read_to_string(path)?.parse()
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }
}

impl fmt::Display for Namelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", section)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Group(String),
    End,
    Equals,
    Comma,
    Quoted(String),
    Bare(String),
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>> {
    let mut tokens = vec![];
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        match c {
            '\n' => line += 1,
            c if c.is_whitespace() => {}
            '!' => {
                while let Some(&c) = chars.peek() {
                    if c == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            '&' | '$' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if name.eq_ignore_ascii_case("end") {
                    tokens.push((line, Token::End));
                } else {
                    tokens.push((line, Token::Group(name.to_lowercase())));
                }
            }
            '/' => tokens.push((line, Token::End)),
            '=' => tokens.push((line, Token::Equals)),
            ',' => tokens.push((line, Token::Comma)),
            '\'' | '"' => {
                let quote = c;
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => {
                            if chars.peek() == Some(&quote) {
                                s.push(quote);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        Some(c) => {
                            if c == '\n' {
                                line += 1;
                            }
                            s.push(c);
                        }
                        None => {
                            return Err(Error::NamelistSyntax {
                                line,
                                reason: "unterminated string".to_owned(),
                            })
                        }
                    }
                }
                tokens.push((line, Token::Quoted(s)));
            }
            c => {
                let mut word = c.to_string();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, ',' | '=' | '/' | '!' | '\'' | '"') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push((line, Token::Bare(word)));
            }
        }
    }

    Ok(tokens)
}

/// Parses an unquoted value, expanding `n*value` repeats
fn parse_bare(word: &str, line: usize) -> Result<Vec<Value>> {
    if let Some(star) = word.find('*') {
        if let Ok(count) = word[..star].parse::<usize>() {
            let value = parse_bare(&word[star + 1..], line)?;
            return Ok(value
                .into_iter()
                .cycle()
                .take(count)
                .collect::<Vec<Value>>());
        }
    }

    let lower = word.to_lowercase();
    let value = match lower.trim_matches('.') {
        "true" | "t" => Value::Bool(true),
        "false" | "f" => Value::Bool(false),
        _ => {
            if let Ok(i) = lower.parse::<i64>() {
                Value::Int(i)
            } else if let Ok(x) = lower.replace('d', "e").parse::<f64>() {
                Value::Float(x)
            } else {
                return Err(Error::NamelistSyntax {
                    line,
                    reason: format!("unrecognised value {:?}", word),
                });
            }
        }
    };

    Ok(vec![value])
}

impl FromStr for Namelist {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens = tokenize(s)?;
        let mut namelist = Namelist::new();

        let mut section: Option<Section> = None;
        let mut key: Option<(usize, String)> = None;
        let mut values: Vec<Value> = vec![];

        fn flush(
            section: &mut Option<Section>,
            key: &mut Option<(usize, String)>,
            values: &mut Vec<Value>,
        ) -> Result<()> {
            if let Some((line, key)) = key.take() {
                let field = match values.len() {
                    0 => {
                        return Err(Error::NamelistSyntax {
                            line,
                            reason: format!("{} has no value", key),
                        })
                    }
                    1 => Field::Scalar(values.remove(0)),
                    _ => Field::PerDomain(values.drain(..).collect()),
                };
                if let Some(section) = section {
                    section.set(key, field);
                }
            }
            Ok(())
        }

        let mut i = 0;
        while i < tokens.len() {
            let (line, token) = &tokens[i];
            let line = *line;

            match token {
                Token::Group(name) => {
                    if section.is_some() {
                        return Err(Error::NamelistSyntax {
                            line,
                            reason: format!("&{} starts before the previous group ended", name),
                        });
                    }
                    section = Some(Section::new(name.as_str()));
                }
                Token::End => {
                    flush(&mut section, &mut key, &mut values)?;
                    match section.take() {
                        Some(s) => namelist.push(s),
                        None => {
                            return Err(Error::NamelistSyntax {
                                line,
                                reason: "'/' outside of a group".to_owned(),
                            })
                        }
                    }
                }
                _ if section.is_none() => {
                    return Err(Error::NamelistSyntax {
                        line,
                        reason: "value outside of a group".to_owned(),
                    })
                }
                Token::Bare(word) if matches!(tokens.get(i + 1), Some((_, Token::Equals))) => {
                    flush(&mut section, &mut key, &mut values)?;
                    key = Some((line, word.to_lowercase()));
                    i += 1;
                }
                Token::Equals => {
                    return Err(Error::NamelistSyntax {
                        line,
                        reason: "'=' without a name".to_owned(),
                    })
                }
                Token::Comma => {}
                _ if key.is_none() => {
                    return Err(Error::NamelistSyntax {
                        line,
                        reason: "value without a name".to_owned(),
                    })
                }
                Token::Quoted(s) => values.push(Value::Str(s.clone())),
                Token::Bare(word) => values.extend(parse_bare(word, line)?),
            }

            i += 1;
        }

        if let Some(section) = section {
            return Err(Error::NamelistSyntax {
                line: tokens.last().map_or(1, |(line, _)| *line),
                reason: format!("&{} is not terminated", section.name),
            });
        }

        Ok(namelist)
    }
}

#[cfg(test)]
mod test {
    use {super::*, insta::assert_snapshot};

    fn sample() -> Namelist {
        let mut share = Section::new("share");
        share.set("wrf_core", Field::scalar("ARW"));
        share.set("max_dom", Field::scalar(2i64));
        share.set(
            "start_date",
            Field::per_domain(vec!["2020-01-01_00:00:00", "2020-01-01_00:00:00"]),
        );

        let mut geogrid = Section::new("geogrid");
        geogrid.set("e_we", Field::per_domain(vec![100i64, 130]));
        geogrid.set("dx", Field::scalar(27000.0));
        geogrid.set("ref_lat", Field::scalar(-40.5));

        let mut namelist = Namelist::new();
        namelist.push(share);
        namelist.push(geogrid);
        namelist.push(Section::new("ungrib"));
        namelist
    }

    #[test]
    fn render() {
        assert_eq!(
            sample().to_string(),
            "&share\n    wrf_core = 'ARW'\n    max_dom = 2\n    start_date = '2020-01-01_00:00:00', '2020-01-01_00:00:00'\n/\n\n&geogrid\n    e_we = 100, 130\n    dx = 27000.0\n    ref_lat = -40.5\n/\n\n&ungrib\n/\n"
        );
    }

    #[test]
    fn render_entry() {
        let mut physics = Section::new("physics");
        physics.set("usemonalb", Field::per_domain(vec![true, false]));
        assert_snapshot!(physics.get("usemonalb").unwrap().to_string(), @".true., .false.");
    }

    #[test]
    fn set_replaces_in_place() {
        let mut section = Section::new("domains");
        section.set("a", Field::scalar(1i64));
        section.set("b", Field::scalar(2i64));
        section.set("a", Field::scalar(3i64));

        assert_eq!(
            section.entries().map(|(k, _)| k).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
        assert_eq!(section.get("a"), Some(&Field::scalar(3i64)));
        assert_eq!(section.remove("b"), Some(Field::scalar(2i64)));
        assert_eq!(section.len(), 1);
    }

    #[test]
    fn parse_written() {
        let namelist = sample();
        assert_eq!(namelist.to_string().parse::<Namelist>().unwrap(), namelist);
    }

    #[test]
    fn parse_handwritten() {
        let namelist: Namelist = r#"
 &share
  wrf_core = 'ARW',
  max_dom = 3,   ! three nests
 /

 &geogrid
  parent_id         =   1,   1,   2,
  parent_grid_ratio =   1,   3,
                        3,
  geog_data_res     = "default", 'modis''s',
  dx = 2.7d4
  map_proj  = 'lambert',
  e_vert = 3*33
  usemonalb = .TRUE., F
 /
"#
        .parse()
        .unwrap();

        assert_eq!(namelist.get("share", "max_dom"), Some(&Field::scalar(3i64)));
        assert_eq!(
            namelist.get("geogrid", "parent_id"),
            Some(&Field::per_domain(vec![1i64, 1, 2]))
        );
        assert_eq!(
            namelist.get("geogrid", "parent_grid_ratio"),
            Some(&Field::per_domain(vec![1i64, 3, 3]))
        );
        assert_eq!(
            namelist.get("geogrid", "geog_data_res"),
            Some(&Field::per_domain(vec!["default", "modis's"]))
        );
        assert_eq!(namelist.get("geogrid", "dx"), Some(&Field::scalar(27000.0)));
        assert_eq!(
            namelist.get("geogrid", "e_vert"),
            Some(&Field::per_domain(vec![33i64, 33, 33]))
        );
        assert_eq!(
            namelist.get("geogrid", "usemonalb"),
            Some(&Field::per_domain(vec![true, false]))
        );
    }

    #[test]
    fn parse_errors() {
        assert!(matches!(
            "&share\n max_dom = 1\n".parse::<Namelist>(),
            Err(Error::NamelistSyntax { .. })
        ));
        assert!(matches!(
            "&share\n max_dom = \n/\n".parse::<Namelist>(),
            Err(Error::NamelistSyntax { line: 2, .. })
        ));
        assert!(matches!(
            "&share\n max_dom = 1x\n/\n".parse::<Namelist>(),
            Err(Error::NamelistSyntax { line: 2, .. })
        ));
    }
}
